//! Handoff Agent Library
//!
//! Moves data from a customer site to a remote ETL platform.
//!
//! # Overview
//!
//! A run is driven entirely by configuration:
//!
//! - **Extraction**: SQL datasets written to CSV files (`jdbc.*`, `data.*.sql`)
//! - **Collection**: files matched by a glob in an input directory (`filesystem.*`)
//! - **Packaging**: one zip archive, or the files plus a manifest (`store.upload_*`)
//! - **Upload**: WebDAV `PUT` under a temporary name, then `MOVE` (`store.*`)
//! - **Trigger**: start a job on the ETL platform with derived parameters (`etl.*`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod collector;
pub mod config;
pub mod error;
pub mod etl;
pub mod extract;
pub mod http;
pub mod naming;
pub mod pipeline;
pub mod progress;
pub mod upload;

// Re-export commonly used types
pub use config::Configuration;
pub use error::{AgentError, Result, ValidationErrors};
pub use pipeline::{Pipeline, RunReport};

use clap::Parser;
use config::{dashed, keys, properties::parse_assignment, Properties};
use std::path::{Path, PathBuf};

/// Configuration file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "handoff.toml";

/// Handoff - collect, upload and process customer data
#[derive(Parser, Debug)]
#[command(name = "handoff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or .properties)
    pub config: Option<PathBuf>,

    /// File store user
    #[arg(long, env = "HANDOFF_STORE_USERNAME")]
    pub store_username: Option<String>,

    /// File store password
    #[arg(long, env = "HANDOFF_STORE_PASSWORD", hide_env_values = true)]
    pub store_password: Option<String>,

    /// Database driver name (postgres, mysql, sqlite)
    #[arg(long)]
    pub jdbc_driver: Option<String>,

    /// Driver library location, checked for readability
    #[arg(long)]
    pub jdbc_driver_path: Option<String>,

    /// Database user
    #[arg(long)]
    pub jdbc_username: Option<String>,

    /// Database password
    #[arg(long, env = "HANDOFF_JDBC_PASSWORD", hide_env_values = true)]
    pub jdbc_password: Option<String>,

    /// Database connection URL
    #[arg(long)]
    pub jdbc_url: Option<String>,

    /// Override any configuration key (repeatable)
    #[arg(short = 'D', long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,

    /// Validate the configuration and print it, without running
    #[arg(long)]
    pub check: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Command-line values, taking precedence over the configuration file
    ///
    /// Named flags are stored under their dashed key, `--set` pairs under
    /// the key as written.
    pub fn overrides(&self) -> Properties {
        let mut overrides: Properties = self.set.iter().cloned().collect();
        let flags = [
            (keys::STORE_USERNAME, &self.store_username),
            (keys::STORE_PASSWORD, &self.store_password),
            (keys::JDBC_DRIVER, &self.jdbc_driver),
            (keys::JDBC_DRIVER_PATH, &self.jdbc_driver_path),
            (keys::JDBC_USERNAME, &self.jdbc_username),
            (keys::JDBC_PASSWORD, &self.jdbc_password),
            (keys::JDBC_URL, &self.jdbc_url),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                overrides.insert(dashed(key), value.clone());
            }
        }
        overrides
    }

    /// Load the configuration file
    ///
    /// Without an explicit path, `handoff.toml` in the working directory is
    /// used when present; otherwise everything must come from flags.
    pub fn defaults(&self) -> Result<Properties> {
        match &self.config {
            Some(path) => Properties::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Properties::load(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Properties::new()),
        }
    }
}
