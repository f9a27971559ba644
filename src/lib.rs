pub mod api;
pub mod cli;
pub mod engine;
pub mod example;
pub mod flows;
pub mod model;
pub mod notify;
pub mod scheduler;
pub mod schema;
pub mod seed;
pub mod store;
pub mod trigger;
pub mod validate;
