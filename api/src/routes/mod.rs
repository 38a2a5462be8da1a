//! API route definitions.
//!
//! This module organizes all HTTP routes for the Raven Relay API server.

mod health;
mod test;
mod tunnel;

pub use health::health_routes;
pub use test::{test_routes, TestResponse};
pub use tunnel::tunnel_routes;
