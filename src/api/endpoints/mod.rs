//! HTTP endpoint handlers.

pub mod analyze;
pub mod download;
pub mod health;
pub mod index;
