use std::sync::Arc;

use epm_pipeline::{AuthService, IntelligenceService};

pub struct AppState {
    pub service: Arc<IntelligenceService>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(service: IntelligenceService, auth: AuthService) -> Self {
        Self {
            service: Arc::new(service),
            auth: Arc::new(auth),
        }
    }
}
