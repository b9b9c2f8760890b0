//! Error handling utilities

use crate::error::{describe_error_code, CovtreeError};
use tracing::error;

/// Report a fatal error and exit with the status matching its kind
///
/// `CovtreeError`s print their user message; with `-v` the code's description
/// and the full source chain follow. Other errors exit with status 1.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);

    let exit_code = if let Some(covtree_err) = error.downcast_ref::<CovtreeError>() {
        eprintln!("[E{:04}] {}", covtree_err.code(), covtree_err.user_message());
        if verbose >= 1 {
            eprintln!("  ({})", describe_error_code(covtree_err.code()));
        }
        covtree_err.exit_code()
    } else {
        eprintln!("Error: {error}");
        1
    };

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    std::process::exit(exit_code)
}
