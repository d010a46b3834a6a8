//! Shared handler state.

use services::{BroadcastPublisher, Services};

use crate::metrics::Metrics;

/// Cloned into every handler. All fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub hub: BroadcastPublisher,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(services: Services, hub: BroadcastPublisher, metrics: Metrics) -> Self {
        Self {
            services,
            hub,
            metrics,
        }
    }
}
