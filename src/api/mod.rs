//! HTTP surface.
//!
//! A browser upload form, a JSON analysis endpoint and retrieval of
//! exported reports. The router is composable: `api_router()` returns a
//! `Router` that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve, serve_on};
pub use types::ApiContext;
