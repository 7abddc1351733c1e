//! Atomic uploads to a WebDAV file store
//!
//! Each file is first written under a throwaway name
//! (`<name>.<millis>`) and then moved onto its final name, so a consumer
//! never sees a partially written file under the real name.
//!
//! Protocol per file:
//!
//! 1. `PUT <base>/<name>.<millis>`, expecting `201 Created`
//! 2. `MOVE` to `<base>/<name>` with `Overwrite: T`, expecting `201` or `204`
//!
//! Credentials go out with every request instead of waiting for a
//! challenge. The first failure stops the run; nothing is retried.

use crate::collector::CollectionResult;
use crate::config::{Credentials, Endpoint};
use crate::error::{AgentError, Result};
use crate::naming::temporary_name;
use crate::progress::create_upload_progress;
use handoff_common::checksum::fingerprint_file;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Method, StatusCode};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use url::Url;

const MOVE: &[u8] = b"MOVE";
const DESTINATION: &str = "Destination";
const OVERWRITE: &str = "Overwrite";

/// A file that is now live on the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub local: PathBuf,
    pub remote_name: String,
    pub url: String,
    pub size: u64,
    pub sha256: String,
}

pub struct WebDavUploader {
    client: Client,
    base: Endpoint,
    credentials: Credentials,
}

impl WebDavUploader {
    pub fn new(client: Client, base: Endpoint, credentials: Credentials) -> Self {
        Self {
            client,
            base,
            credentials,
        }
    }

    /// Upload every entry of a collection, in order
    #[instrument(skip(self, collected), fields(base = %self.base.url, files = collected.entries.len()))]
    pub async fn upload(&self, collected: &CollectionResult) -> Result<Vec<UploadReceipt>> {
        let progress = create_upload_progress(collected.entries.len() as u64, "Uploading");
        let mut receipts = Vec::with_capacity(collected.entries.len());

        for entry in &collected.entries {
            progress.set_message(entry.remote_name.clone());
            let receipt = match self.upload_file(&entry.local, &entry.remote_name).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    progress.abandon();
                    return Err(e);
                }
            };
            receipts.push(receipt);
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(receipts)
    }

    /// Put one file under a temporary name and move it onto `remote_name`
    #[instrument(skip(self, local), fields(local = %local.display()))]
    pub async fn upload_file(&self, local: &Path, remote_name: &str) -> Result<UploadReceipt> {
        let fingerprint = fingerprint_file(local)?;
        let millis = chrono::Utc::now().timestamp_millis();

        let temp_url = self.child_url(&temporary_name(remote_name, millis))?;
        let target_url = self.child_url(remote_name)?;

        debug!(
            "Uploading {} bytes to {} (final name {})",
            fingerprint.size, temp_url, remote_name
        );
        self.put(local, fingerprint.size, &temp_url).await?;
        self.move_to(local, &temp_url, &target_url).await?;

        info!("Successfully uploaded {}", target_url);

        Ok(UploadReceipt {
            local: local.to_path_buf(),
            remote_name: remote_name.to_string(),
            url: target_url.to_string(),
            size: fingerprint.size,
            sha256: fingerprint.sha256,
        })
    }

    fn child_url(&self, name: &str) -> Result<Url> {
        self.base.child_url(name).map_err(AgentError::Protocol)
    }

    async fn put(&self, local: &Path, size: u64, temp_url: &Url) -> Result<()> {
        let file = tokio::fs::File::open(local).await?;
        let response = self
            .client
            .put(temp_url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(CONTENT_LENGTH, size)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(file))
            .send()
            .await
            .map_err(|source| AgentError::UploadTransport {
                file: local.display().to_string(),
                temp_url: temp_url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(AgentError::UploadRejected {
                file: local.display().to_string(),
                temp_url: temp_url.to_string(),
                status: status.as_u16(),
                status_text: status_text(status),
            });
        }
        Ok(())
    }

    async fn move_to(&self, local: &Path, temp_url: &Url, target_url: &Url) -> Result<()> {
        let method = Method::from_bytes(MOVE)
            .map_err(|e| AgentError::Protocol(format!("MOVE method unavailable: {e}")))?;

        // replacing an existing final name is allowed
        let response = self
            .client
            .request(method, temp_url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(DESTINATION, target_url.as_str())
            .header(OVERWRITE, "T")
            .send()
            .await
            .map_err(|source| AgentError::MoveTransport {
                temp_url: temp_url.to_string(),
                target_url: target_url.to_string(),
                source,
            })?;

        let status = response.status();
        if !matches!(status, StatusCode::CREATED | StatusCode::NO_CONTENT) {
            return Err(AgentError::MoveRejected {
                file: local.display().to_string(),
                temp_url: temp_url.to_string(),
                target_url: target_url.to_string(),
                status: status.as_u16(),
                status_text: status_text(status),
            });
        }
        Ok(())
    }
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown").to_string()
}
