//! Tubedrop API Library
//!
//! HTTP surface of the service: routes, shared-secret middleware, the JSON
//! error envelope and application setup.

mod api_doc;
mod handlers;
mod middleware;
mod telemetry;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
