//! Shared collector state: every report received since startup.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::Received;

#[derive(Clone, Default)]
pub struct AppState {
    pub received: Arc<RwLock<Vec<Received>>>,
}
