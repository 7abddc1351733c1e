//! Handoff Common Library
//!
//! Shared utilities and error handling for the handoff workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Checksums**: digests recorded for every uploaded artifact
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use handoff_common::checksum::fingerprint_file;
//!
//! fn describe(path: &str) -> handoff_common::Result<()> {
//!     let fp = fingerprint_file(path)?;
//!     println!("{path}: {} ({} bytes)", fp.sha256, fp.size);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
