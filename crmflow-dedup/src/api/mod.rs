//! HTTP API handlers for crmflow-dedup

pub mod actions;
pub mod health;

pub use actions::{action_routes, report_response};
pub use health::health_routes;
