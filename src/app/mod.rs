//! Application module
//!
//! This module contains application-level functionality including:
//! - Configuration handling
//! - Logging setup
//! - Opening the workspace the binary operates on

pub mod config;
pub mod error_handling;
pub mod logging;
pub mod workspace;

// Re-export main application functions
pub use config::AppConfig;
pub use error_handling::{handle_fatal_error, report_warning};
pub use logging::{diagnostic_line, init_logging, init_logging_to, init_tracing, LogDestination};
pub use workspace::Workspace;
