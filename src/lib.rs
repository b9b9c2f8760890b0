//! # covtree
//!
//! Statement coverage for a tree of source files, collected by an external
//! coverage tool and aggregated per folder.
//!
//! ## Usage
//!
//! ```bash
//! covtree refresh <ROOT> [--show PATH]... [--format text|json]
//! covtree erase
//! ```
//!
//! ## Modules
//!
//! - `app` - Logging setup and fatal error reporting for the binary
//! - `config` - Layered TOML/environment configuration of the coverage tool
//! - `coverage` - Output parsing, the aggregated coverage tree and collection passes
//! - `error` - Crate error type with numeric error codes
//! - `subprocess` - Process abstraction with a tokio runner and a mock for tests
pub mod app;
pub mod config;
pub mod coverage;
pub mod error;
pub mod subprocess;

pub use error::{CovtreeError, Result};
