//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod analyses;
pub mod audit;
pub mod dashboard;
pub mod health;

// Re-export all handlers for use in router
pub use analyses::*;
pub use audit::*;
pub use dashboard::*;
pub use health::*;
