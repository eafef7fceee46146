//! Application state shared with the HTTP handlers

use std::sync::Arc;

use crate::application::orchestrator::ResyncOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ResyncOrchestrator>,

    /// Bearer token required on every `/api` request when set
    pub auth_token: Option<Arc<str>>,
}

impl AppState {
    #[must_use]
    pub fn new(orchestrator: Arc<ResyncOrchestrator>, auth_token: Option<String>) -> Self {
        Self {
            orchestrator,
            auth_token: auth_token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }

    /// `true` when no token is configured or `presented` matches it
    #[must_use]
    pub fn is_authorized(&self, presented: Option<&str>) -> bool {
        match (&self.auth_token, presented) {
            (None, _) => true,
            (Some(expected), Some(given)) => expected.as_ref() == given,
            (Some(_), None) => false,
        }
    }
}
