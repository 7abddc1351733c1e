//! Dataset extraction to CSV
//!
//! Each configured dataset runs on one shared connection, in name order,
//! and lands in `<dataset>.csv` inside a fresh temporary directory. The
//! first row is always the column header, even for empty results.
//!
//! Cells are written as the database's own text rendering of the value,
//! whatever the column type; `NULL` becomes an empty field.

use super::driver::DriverRegistry;
use crate::config::RelationalSource;
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{
    Column, Connection, Executor, MySqlConnection, PgConnection, Row, SqliteConnection, Statement,
};
use std::path::Path;
use tempfile::TempDir;
use tracing::{info, instrument, warn};

/// Prefix of the scratch directory holding the CSV extracts
pub const EXTRACT_DIR_PREFIX: &str = "handoff-jdbc-";

/// An open connection able to dump query results as CSV
#[async_trait]
pub trait DatasetConnection: Send {
    /// Run `sql` and write its header and rows to `path`, returning the row count
    async fn export(&mut self, dataset: &str, sql: &str, path: &Path) -> Result<u64>;

    async fn close(self: Box<Self>) -> Result<()>;
}

// Raw `&str` queries go through the text protocol on postgres and mysql,
// so every value arrives already rendered. The statement is prepared
// first only to learn the column names of empty results.
macro_rules! dataset_connection {
    ($($conn:ty),+) => {
        $(
            #[async_trait]
            impl DatasetConnection for $conn {
                async fn export(&mut self, dataset: &str, sql: &str, path: &Path) -> Result<u64> {
                    let query_failed = |source: sqlx::Error| AgentError::Query {
                        dataset: dataset.to_string(),
                        source,
                    };

                    let statement = (&mut *self).prepare(sql).await.map_err(query_failed)?;
                    let headers: Vec<String> = statement
                        .columns()
                        .iter()
                        .map(|c| c.name().to_string())
                        .collect();

                    let mut writer = csv::Writer::from_path(path)?;
                    writer.write_record(&headers)?;

                    let mut rows = (&mut *self).fetch(sql);
                    let mut count = 0u64;
                    while let Some(row) = rows.try_next().await.map_err(query_failed)? {
                        let record: Vec<String> = (0..row.len())
                            .map(|i| {
                                row.try_get_unchecked::<Option<String>, _>(i)
                                    .unwrap_or_else(|_| {
                                        row.try_get_unchecked::<Option<Vec<u8>>, _>(i)
                                            .ok()
                                            .flatten()
                                            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                                    })
                                    .unwrap_or_default()
                            })
                            .collect();
                        writer.write_record(&record)?;
                        count += 1;
                    }
                    writer.flush()?;

                    Ok(count)
                }

                async fn close(self: Box<Self>) -> Result<()> {
                    Ok(Connection::close(*self).await?)
                }
            }
        )+
    };
}

dataset_connection!(PgConnection, MySqlConnection, SqliteConnection);

pub struct JdbcExtractor {
    registry: DriverRegistry,
}

impl JdbcExtractor {
    pub fn new(registry: DriverRegistry) -> Self {
        Self { registry }
    }

    /// Run every dataset query and write the results as CSV
    ///
    /// Returns `None` when no dataset is configured. The directory is
    /// removed when the returned handle is dropped, and on any error.
    #[instrument(skip(self, source), fields(driver = %source.driver, datasets = source.datasets.len()))]
    pub async fn extract(&self, source: &RelationalSource) -> Result<Option<TempDir>> {
        if source.datasets.is_empty() {
            info!("No datasets configured, nothing to add");
            return Ok(None);
        }

        check_driver_path(&source.driver_path)?;
        let provider = self.registry.get(&source.driver)?;

        let dir = tempfile::Builder::new()
            .prefix(EXTRACT_DIR_PREFIX)
            .tempdir()?;

        let mut conn = provider.connect(source).await?;
        let outcome = write_datasets(conn.as_mut(), source, dir.path()).await;
        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close database connection");
        }
        outcome?;

        Ok(Some(dir))
    }
}

fn check_driver_path(path: &Path) -> Result<()> {
    let unreadable = |reason: String| AgentError::DriverPath {
        path: path.display().to_string(),
        reason,
    };
    let metadata = std::fs::metadata(path).map_err(|e| unreadable(e.to_string()))?;
    if metadata.is_dir() {
        std::fs::read_dir(path).map_err(|e| unreadable(e.to_string()))?;
    } else {
        std::fs::File::open(path).map_err(|e| unreadable(e.to_string()))?;
    }
    Ok(())
}

async fn write_datasets(
    conn: &mut dyn DatasetConnection,
    source: &RelationalSource,
    dir: &Path,
) -> Result<()> {
    for (dataset, sql) in &source.datasets {
        let path = dir.join(format!("{dataset}.csv"));
        let rows = conn.export(dataset, sql, &path).await?;
        info!(dataset = %dataset, rows, "Extracted dataset");
    }
    Ok(())
}
