use crate::config::Settings;
use crate::site::SiteDirectory;
use std::sync::Arc;

pub struct AppState {
    pub settings: Settings,
    pub directory: Arc<dyn SiteDirectory>,
}
