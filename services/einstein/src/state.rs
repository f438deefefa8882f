//! Application state shared across request handlers.

use std::sync::Arc;

use crate::authz::AuthorizationPolicy;
use crate::backends::BackendProvider;
use crate::orchestrator::Settings;

/// Shared application state.
///
/// Handlers open one orchestrator per request from the provider; nothing
/// else is shared between requests.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    provider: Box<dyn BackendProvider>,
    policy: Box<dyn AuthorizationPolicy>,
    settings: Settings,
}

impl AppState {
    pub fn new(
        provider: Box<dyn BackendProvider>,
        policy: Box<dyn AuthorizationPolicy>,
        settings: Settings,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                provider,
                policy,
                settings,
            }),
        }
    }

    pub fn provider(&self) -> &dyn BackendProvider {
        self.inner.provider.as_ref()
    }

    pub fn policy(&self) -> &dyn AuthorizationPolicy {
        self.inner.policy.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }
}
