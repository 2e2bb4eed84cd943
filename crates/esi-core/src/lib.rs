//! Core ESI client library (controller, artifacts, backend, store, config).

pub mod artifacts;
pub mod backend;
pub mod config;
pub mod core;
pub mod logging;
pub mod store;
