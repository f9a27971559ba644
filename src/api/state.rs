use std::sync::Arc;

use tokio::sync::RwLock;

use crate::engine::{PayoutEngine, RunSummary};
use crate::notify::NotificationSink;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub engine: Arc<PayoutEngine>,
    pub notifier: Arc<dyn NotificationSink>,
    /// Last completed daily run, written by whichever trigger ran it.
    pub last_summary: Arc<RwLock<Option<RunSummary>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        engine: Arc<PayoutEngine>,
        notifier: Arc<dyn NotificationSink>,
        last_summary: Arc<RwLock<Option<RunSummary>>>,
    ) -> Self {
        AppState {
            store,
            engine,
            notifier,
            last_summary,
        }
    }
}
