//! Notification delivery pipeline.
//!
//! Audience resolution, the courier that renders and enqueues one job per
//! recipient, the in-memory delivery queue, the worker pool that performs SMTP
//! sends, and the per-message status ledger.

pub mod courier;
pub mod error;
pub mod ledger;
pub mod loaders;
pub mod queue;
pub mod strategy;
pub mod system;
pub mod template;
pub mod transport;
pub mod worker;

pub use courier::{Courier, DispatchRequest};
pub use strategy::Audience;
pub use system::{DeliverySettings, DeliverySystem};
