//! Error handling utilities
//!
//! This module provides centralized error handling for the binary.

use tracing::{error, warn};

use super::logging::diagnostic_line;
use crate::error::LineageError;

/// Handle fatal errors and exit with appropriate status code
///
/// For a [`LineageError`] the user message is always shown and the developer
/// message with the full error chain is added in verbose mode. Other errors
/// print their chain in verbose mode and exit with status 1.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);

    let exit_code = if let Some(lineage_err) = error.downcast_ref::<LineageError>() {
        diagnostic_line(&lineage_err.user_message());

        if verbose >= 1 {
            diagnostic_line(&format!("\nContext Chain:\n{}", lineage_err.developer_message()));
        }

        lineage_err.exit_code()
    } else {
        diagnostic_line(&format!("Error: {error}"));

        if verbose >= 1 {
            diagnostic_line("\nError chain:");
            for (i, cause) in error.chain().enumerate() {
                diagnostic_line(&format!("  {}: {}", i, cause));
            }
        }

        1
    };

    std::process::exit(exit_code)
}

/// Report an error that left the repository consistent
pub fn report_warning(error: &LineageError) {
    warn!("{}", error);
    diagnostic_line(&format!("warning: {}", error.user_message()));
}
