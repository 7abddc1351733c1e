//! One hand-off run
//!
//! Steps run strictly in sequence and the first failure ends the run:
//!
//! 1. relational extraction, then the filesystem source, into the collector
//! 2. packaging
//! 3. upload
//! 4. job trigger
//!
//! Status lines for the operator go to stdout prefixed with `OK:`.

use crate::collector::{self, CollectionResult, Collector};
use crate::config::{Configuration, Endpoint, Packaging};
use crate::error::Result;
use crate::etl::{self, JobTrigger, RestJobClient};
use crate::extract::{DriverRegistry, JdbcExtractor};
use crate::http::build_client;
use crate::naming::RunInstant;
use crate::progress::format_bytes;
use crate::upload::{UploadReceipt, WebDavUploader};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What a run produced
#[derive(Debug, Default)]
pub struct RunReport {
    pub main_name: Option<String>,
    pub uploaded: Vec<UploadReceipt>,
    pub log_url: Option<String>,
}

pub struct Pipeline {
    client: Client,
    registry: DriverRegistry,
    trigger: Arc<dyn JobTrigger>,
}

impl Pipeline {
    /// Pipeline with the HTTP job client and the built-in database drivers
    pub fn new(config: &Configuration) -> Result<Self> {
        let client = build_client()?;
        let trigger = Arc::new(RestJobClient::new(client.clone(), config.credentials.clone()));
        Ok(Self::with_parts(client, DriverRegistry::with_builtin(), trigger))
    }

    pub fn with_parts(client: Client, registry: DriverRegistry, trigger: Arc<dyn JobTrigger>) -> Self {
        Self {
            client,
            registry,
            trigger,
        }
    }

    #[instrument(skip(self, config), fields(run = %instant.compact()))]
    pub async fn run(&self, config: &Configuration, instant: RunInstant) -> Result<RunReport> {
        let mut report = RunReport::default();

        let collected = match (config.upload.as_ref(), config.packaging.as_ref()) {
            (None, _) => {
                status("Upload URL is not set up, skipping");
                None
            }
            (Some(_), None) => {
                status("No archive or manifest template set up, skipping upload");
                None
            }
            (Some(endpoint), Some(packaging)) => {
                let collected = self.collect(config, packaging, &instant).await?;
                report.uploaded = self.upload(config, endpoint, &collected).await?;
                report.main_name = Some(collected.main_name.clone());
                Some(collected)
            }
        };

        match config.etl.as_ref() {
            Some(target) => {
                let params = etl::build(config, collected.as_ref(), &instant);
                let outcome = self.trigger.trigger(target, &params).await?;
                status(&format!(
                    "Graph {} under {} executed, log at {}",
                    target.graph, target.process.url, outcome.log_url
                ));
                report.log_url = Some(outcome.log_url);
            }
            None => status("ETL not set up, skipping"),
        }

        Ok(report)
    }

    async fn collect(
        &self,
        config: &Configuration,
        packaging: &Packaging,
        instant: &RunInstant,
    ) -> Result<CollectionResult> {
        let mut collector = collector::for_packaging(packaging, instant);
        debug!(strategy = %collector.strategy(), main = collector.main_name(), "Collecting");

        let extracts = match config.relational.as_ref() {
            Some(source) => JdbcExtractor::new(self.registry.clone()).extract(source).await?,
            None => {
                status("JDBC data source not configured, skipping");
                None
            }
        };
        if let Some(dir) = extracts.as_ref() {
            collector.add(dir.path(), "*.csv")?;
        }
        if let Some(fs) = config.filesystem.as_ref() {
            collector.add(&fs.input_dir, &fs.wildcard)?;
        }
        if extracts.is_none() && config.filesystem.is_none() {
            warn!("No data source configured, the {} will be empty", packaging.label());
        }

        let mut collected = collector.collect()?;
        if let Some(dir) = extracts {
            collected.retain_dir(dir);
        }
        info!(
            strategy = %collected.strategy,
            main = %collected.main_name,
            entries = collected.entries.len(),
            "Collected files"
        );
        Ok(collected)
    }

    async fn upload(
        &self,
        config: &Configuration,
        endpoint: &Endpoint,
        collected: &CollectionResult,
    ) -> Result<Vec<UploadReceipt>> {
        let uploader = WebDavUploader::new(
            self.client.clone(),
            endpoint.clone(),
            config.credentials.clone(),
        );
        let receipts = uploader.upload(collected).await?;
        let total: u64 = receipts.iter().map(|r| r.size).sum();
        status(&format!(
            "{} file(s) uploaded under {} ({})",
            receipts.len(),
            endpoint.url,
            format_bytes(total)
        ));
        Ok(receipts)
    }
}

fn status(message: &str) {
    println!("OK: {message}");
}
