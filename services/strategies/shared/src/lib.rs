//! Shared Strategy Framework
//!
//! Common utilities and traits for trading strategy implementations.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod testing;
pub mod traits;

pub use config::*;
pub use logging::*;
pub use metrics::*;
pub use traits::*;
