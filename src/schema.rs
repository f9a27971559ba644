use schemars::schema_for;

use crate::model::ConfigBundle;

/// Print the JSON schema for admin configuration bundles.
pub fn run() -> anyhow::Result<()> {
    let schema = schema_for!(ConfigBundle);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
