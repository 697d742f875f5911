//! Shared building blocks for the Tessera crates.
//!
//! - **Configuration**: layered application settings (`config`).
//! - **Models**: query templates and connection configs (`models`).
//! - **Stores**: template and config lookups with change events (`store`, `events`).
//! - **Logging**: tracing subscriber setup (`logging`).
pub mod config;
pub mod events;
pub mod hashing;
pub mod logging;
pub mod models;
pub mod retry;
pub mod store;
pub mod validation;
