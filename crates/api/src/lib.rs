//! Herald HTTP surface: notification dispatch and message status lookup.

pub mod routes;
pub mod state;
