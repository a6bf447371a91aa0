use crate::call_flow::FlowConfig;
use crate::store::CallStore;

use serde::Deserialize;
use std::sync::Arc;

pub struct AppState {
    pub flow: FlowConfig,
    pub store: Arc<dyn CallStore>,
}

/// Query string accepted by the activity listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}
