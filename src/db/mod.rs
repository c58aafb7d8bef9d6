//! Database access layer.
//!
//! This module provides:
//! - The registry owning every open database
//! - Database handles for SQL execution and table introspection
//! - Parameter binding and value decoding

pub mod handle;
pub mod params;
pub mod registry;
pub mod types;

pub use handle::DatabaseHandle;
pub use params::quote_ident;
pub use registry::{ConnectionRegistry, DEFAULT_ACQUIRE_TIMEOUT_SECS, RegistryOptions};
