//! Potiron Serve - HTTP API for the sensor dashboard
//!
//! This crate exposes the daily top values of every enabled field and the
//! evolution of individual values as JSON. Charts and pages are rendered by
//! the dashboard front-end from these responses.
//!
//! # Architecture
//!
//! - **AppState**: Shared application state (session over the sensor store, configuration, cache)
//! - **Routes**: Endpoint handlers grouped by page
//! - **Cache**: Short-lived response cache in front of the store

pub mod cache;
mod error;
mod routes;
mod state;

pub use self::cache::{ResponseCache, get_or_compute, new_cache};
pub use self::error::ApiError;
pub use self::routes::router;
pub use self::state::{AppState, Config};
