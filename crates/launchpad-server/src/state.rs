use std::sync::Arc;

use launchpad_coordinator::Coordinator;
use launchpad_events::SharedEventBus;
use launchpad_store::RecipeStore;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecipeStore>,
    pub events: SharedEventBus,
    pub coordinator: Arc<Coordinator>,
    pub metrics: Arc<Metrics>,
    pub inference_api_key: Option<String>,
}
