use crate::review::ReviewStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReviewStore>,
}
