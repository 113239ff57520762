//! Shared application state for the Axum API server.

use std::sync::Arc;

use herald_delivery::DeliverySystem;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub system: Arc<DeliverySystem>,
}

impl AppState {
    pub fn new(system: Arc<DeliverySystem>) -> Self {
        Self { system }
    }
}
