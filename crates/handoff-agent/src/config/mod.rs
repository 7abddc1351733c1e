//! Run configuration
//!
//! A [`Configuration`] is produced once by [`resolve`] from two flat
//! property sources and is never mutated afterwards.

pub mod properties;
pub mod resolve;

pub use properties::Properties;
pub use resolve::{dashed, resolve, Sources};

use crate::naming::OutputTemplate;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Configuration keys, dotted spelling
pub mod keys {
    pub const STORE_USERNAME: &str = "store.username";
    pub const STORE_PASSWORD: &str = "store.password";
    pub const STORE_UPLOAD_URL: &str = "store.upload_url";
    pub const STORE_UPLOAD_ARCHIVE: &str = "store.upload_archive";
    pub const STORE_UPLOAD_MANIFEST: &str = "store.upload_manifest";
    pub const STORE_SEND_CREDENTIALS: &str = "store.send_credentials";

    pub const ETL_PROCESS_URL: &str = "etl.process_url";
    pub const ETL_GRAPH: &str = "etl.graph";
    pub const ETL_PARAM_PREFIX: &str = "etl.param.";
    pub const ETL_HIDDEN_PARAM_PREFIX: &str = "etl.hidden_param.";

    pub const PARAM_NAME_ARCHIVE: &str = "etl.param_name.archive";
    pub const PARAM_NAME_ARCHIVE_URL: &str = "etl.param_name.archive_url";
    pub const PARAM_NAME_ARCHIVE_URL_NOCREDS: &str = "etl.param_name.archive_url_nocreds";
    pub const PARAM_NAME_MANIFEST: &str = "etl.param_name.manifest";
    pub const PARAM_NAME_MANIFEST_URL: &str = "etl.param_name.manifest_url";
    pub const PARAM_NAME_MANIFEST_URL_NOCREDS: &str = "etl.param_name.manifest_url_nocreds";
    pub const PARAM_NAME_USERNAME: &str = "etl.param_name.username";
    pub const PARAM_NAME_PASSWORD: &str = "etl.param_name.password";
    pub const PARAM_NAME_NOW: &str = "etl.param_name.now";

    pub const FILESYSTEM_INPUT_DIR: &str = "filesystem.input_dir";
    pub const FILESYSTEM_WILDCARD: &str = "filesystem.wildcard";

    pub const JDBC_DRIVER: &str = "jdbc.driver";
    pub const JDBC_DRIVER_PATH: &str = "jdbc.driver_path";
    pub const JDBC_USERNAME: &str = "jdbc.username";
    pub const JDBC_PASSWORD: &str = "jdbc.password";
    pub const JDBC_URL: &str = "jdbc.url";

    pub const DATA_PREFIX: &str = "data.";
    pub const DATA_SQL_SUFFIX: &str = ".sql";
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_PARAM_ARCHIVE: &str = "agent_archive";
pub const DEFAULT_PARAM_ARCHIVE_URL: &str = "agent_archive_url";
pub const DEFAULT_PARAM_ARCHIVE_URL_NOCREDS: &str = "agent_archive_url_nocreds";
pub const DEFAULT_PARAM_MANIFEST: &str = "agent_manifest";
pub const DEFAULT_PARAM_MANIFEST_URL: &str = "agent_manifest_url";
pub const DEFAULT_PARAM_MANIFEST_URL_NOCREDS: &str = "agent_manifest_url_nocreds";
pub const DEFAULT_PARAM_USERNAME: &str = "agent_username";
pub const DEFAULT_PARAM_PASSWORD: &str = "agent_password";
pub const DEFAULT_PARAM_NOW: &str = "agent_now";

/// Glob used when `filesystem.wildcard` is not set
pub const DEFAULT_WILDCARD: &str = "*";

/// Store credentials, shared by the upload client and the job API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A parsed HTTP(S) location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
    /// Scheme, e.g. `https`
    pub protocol: String,
    /// Host name, with `:port` when one was given explicitly
    pub host: String,
    /// Path without a trailing slash; empty for the root
    pub path: String,
}

impl Endpoint {
    /// Parse and decompose `raw`; only `http` and `https` are accepted
    pub fn parse(raw: &str) -> Result<Self, String> {
        let url = Url::parse(raw.trim()).map_err(|e| format!("'{raw}' is not a valid URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "'{raw}' uses unsupported protocol '{}'",
                url.scheme()
            ));
        }
        let Some(host_name) = url.host_str() else {
            return Err(format!("'{raw}' has no host"));
        };
        let host = match url.port() {
            Some(port) => format!("{host_name}:{port}"),
            None => host_name.to_string(),
        };

        Ok(Self {
            protocol: url.scheme().to_string(),
            host,
            path: url.path().trim_end_matches('/').to_string(),
            url,
        })
    }

    /// URL as configured, without any trailing slash
    pub fn base(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    /// `<base>/<name>` as plain text
    pub fn plain_child(&self, name: &str) -> String {
        format!("{}/{}", self.base(), name)
    }

    /// `<base>/<name>` with the name percent-encoded as a path segment
    pub fn child_url(&self, name: &str) -> Result<Url, String> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| format!("'{}' cannot carry a path", self.url))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }
}

/// Which packaging strategy a run uses, with its naming template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packaging {
    Archive(OutputTemplate),
    Manifest(OutputTemplate),
}

impl Packaging {
    pub fn template(&self) -> &OutputTemplate {
        match self {
            Packaging::Archive(t) | Packaging::Manifest(t) => t,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Packaging::Archive(_) => "archive",
            Packaging::Manifest(_) => "manifest",
        }
    }
}

/// Remote job to fire after the upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlTarget {
    pub process: Endpoint,
    pub graph: String,
}

/// Names under which generated values are injected into the job parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamNames {
    pub archive: String,
    pub archive_url: String,
    pub archive_url_nocreds: String,
    pub manifest: String,
    pub manifest_url: String,
    pub manifest_url_nocreds: String,
    pub username: String,
    pub password: String,
    pub now: String,
}

impl Default for ParamNames {
    fn default() -> Self {
        Self {
            archive: DEFAULT_PARAM_ARCHIVE.to_string(),
            archive_url: DEFAULT_PARAM_ARCHIVE_URL.to_string(),
            archive_url_nocreds: DEFAULT_PARAM_ARCHIVE_URL_NOCREDS.to_string(),
            manifest: DEFAULT_PARAM_MANIFEST.to_string(),
            manifest_url: DEFAULT_PARAM_MANIFEST_URL.to_string(),
            manifest_url_nocreds: DEFAULT_PARAM_MANIFEST_URL_NOCREDS.to_string(),
            username: DEFAULT_PARAM_USERNAME.to_string(),
            password: DEFAULT_PARAM_PASSWORD.to_string(),
            now: DEFAULT_PARAM_NOW.to_string(),
        }
    }
}

/// Directory scanned for files to hand off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemSource {
    pub input_dir: PathBuf,
    pub wildcard: String,
}

/// Database connection plus the datasets to extract from it
#[derive(Clone, PartialEq, Eq)]
pub struct RelationalSource {
    pub driver: String,
    pub driver_path: PathBuf,
    pub username: String,
    pub password: Option<String>,
    pub url: String,
    /// Dataset name to SQL text
    pub datasets: BTreeMap<String, String>,
}

impl fmt::Debug for RelationalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalSource")
            .field("driver", &self.driver)
            .field("driver_path", &self.driver_path)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("url", &self.url)
            .field("datasets", &self.datasets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Fully resolved run configuration
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
    pub credentials: Credentials,
    pub upload: Option<Endpoint>,
    pub packaging: Option<Packaging>,
    pub send_credentials: bool,
    pub etl: Option<EtlTarget>,
    pub etl_params: BTreeMap<String, String>,
    pub etl_hidden_params: BTreeMap<String, String>,
    pub param_names: ParamNames,
    pub filesystem: Option<FilesystemSource>,
    pub relational: Option<RelationalSource>,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("credentials", &self.credentials)
            .field("upload", &self.upload.as_ref().map(|e| e.url.as_str()))
            .field("packaging", &self.packaging)
            .field("send_credentials", &self.send_credentials)
            .field("etl", &self.etl)
            .field("etl_params", &self.etl_params)
            .field(
                "etl_hidden_params",
                &self.etl_hidden_params.keys().collect::<Vec<_>>(),
            )
            .field("param_names", &self.param_names)
            .field("filesystem", &self.filesystem)
            .field("relational", &self.relational)
            .finish()
    }
}

impl Configuration {
    /// Upload location and packaging, when both are configured
    pub fn upload_plan(&self) -> Option<(&Endpoint, &Packaging)> {
        self.upload.as_ref().zip(self.packaging.as_ref())
    }

    /// Human-readable summary with secrets left out
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let or_unset = |v: Option<String>| v.unwrap_or_else(|| "(not set)".to_string());
        vec![
            ("store user", self.credentials.username.clone()),
            (
                "upload url",
                or_unset(self.upload.as_ref().map(|e| e.url.to_string())),
            ),
            (
                "packaging",
                or_unset(
                    self.packaging
                        .as_ref()
                        .map(|p| format!("{} ({})", p.label(), p.template())),
                ),
            ),
            ("send credentials", self.send_credentials.to_string()),
            (
                "etl",
                or_unset(
                    self.etl
                        .as_ref()
                        .map(|e| format!("{} graph {}", e.process.url, e.graph)),
                ),
            ),
            (
                "filesystem",
                or_unset(
                    self.filesystem
                        .as_ref()
                        .map(|s| format!("{} ({})", s.input_dir.display(), s.wildcard)),
                ),
            ),
            (
                "datasets",
                or_unset(self.relational.as_ref().map(|r| {
                    format!(
                        "{} via {}",
                        r.datasets.keys().cloned().collect::<Vec<_>>().join(", "),
                        r.driver
                    )
                })),
            ),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_decomposition() {
        let e = Endpoint::parse("https://dav.example.com:8443/incoming/agent/").unwrap();
        assert_eq!(e.protocol, "https");
        assert_eq!(e.host, "dav.example.com:8443");
        assert_eq!(e.path, "/incoming/agent");
        assert_eq!(
            e.plain_child("data.zip"),
            "https://dav.example.com:8443/incoming/agent/data.zip"
        );
    }

    #[test]
    fn test_endpoint_root_path_is_empty() {
        let e = Endpoint::parse("http://store.local").unwrap();
        assert_eq!(e.host, "store.local");
        assert_eq!(e.path, "");
        assert_eq!(e.plain_child("x.csv"), "http://store.local/x.csv");
    }

    #[test]
    fn test_endpoint_child_url_encodes_name() {
        let e = Endpoint::parse("http://store.local/in").unwrap();
        let url = e.child_url("my file#1.csv").unwrap();
        assert_eq!(url.as_str(), "http://store.local/in/my%20file%231.csv");
    }

    #[test]
    fn test_endpoint_rejects_other_protocols() {
        assert!(Endpoint::parse("ftp://store.local/in").is_err());
        assert!(Endpoint::parse("not a url").is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials {
            username: "agent".to_string(),
            password: "s3cret".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("agent"));
        assert!(!rendered.contains("s3cret"));
    }
}
