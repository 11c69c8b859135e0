use crate::config::Config;
use crate::deletion::DeletionWorkflow;
use crate::services::supabase::{AuthApi, DataStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub auth: Arc<dyn AuthApi>,
    pub deletion: Arc<DeletionWorkflow>,
    pub config: Arc<Config>,
}
