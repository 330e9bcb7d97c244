//! # Web API Application State

use std::sync::Arc;

use crate::service::ConversionService;

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct WebState {
    service: Arc<ConversionService>,
}

impl WebState {
    pub fn new(service: Arc<ConversionService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<ConversionService> {
        &self.service
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.service.uptime().as_secs_f64()
    }
}
