//! HTTP handler definitions.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports the handler functions used by the router.

pub mod health;
pub mod operation;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use operation::operation_handler;

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::service::Service;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The service every matched operation path dispatches into.
    pub service: Arc<Service>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(service: Arc<Service>, shutdown: Arc<ShutdownController>) -> Self {
        Self {
            service,
            shutdown,
            start_time: Instant::now(),
        }
    }
}
