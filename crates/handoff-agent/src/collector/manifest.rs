//! File-list packaging
//!
//! Every collected file is shipped as `<name>.<millis>.csv`, and an index
//! file named from the template lists those remote names one per line.
//! The millisecond stamp keeps repeated runs from colliding remotely.

use super::{scratch_dir, CollectionResult, Collector, FileSet, Strategy, UploadEntry};
use crate::error::Result;
use crate::naming::{OutputTemplate, RunInstant};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug)]
pub struct ManifestCollector {
    files: FileSet,
    name: String,
    millis: i64,
}

impl ManifestCollector {
    pub fn new(template: &OutputTemplate, instant: &RunInstant) -> Self {
        Self {
            files: FileSet::new(),
            name: template.render(instant),
            millis: instant.epoch_millis(),
        }
    }

    /// Remote name a data file is shipped under
    pub fn remote_name_for(&self, logical_name: &str) -> String {
        format!("{logical_name}.{}.csv", self.millis)
    }
}

impl Collector for ManifestCollector {
    fn strategy(&self) -> Strategy {
        Strategy::Manifest
    }

    fn main_name(&self) -> &str {
        &self.name
    }

    fn add(&mut self, dir: &Path, pattern: &str) -> Result<usize> {
        self.files.add(dir, pattern)
    }

    fn collect(&mut self) -> Result<CollectionResult> {
        let files = std::mem::take(&mut self.files).into_files();

        let scratch = scratch_dir()?;
        let manifest_path = scratch.path().join(&self.name);
        let mut writer = BufWriter::new(File::create(&manifest_path)?);

        let mut entries = Vec::with_capacity(files.len() + 1);
        for file in files {
            let remote_name = self.remote_name_for(&file.name);
            writeln!(writer, "{remote_name}")?;
            entries.push(UploadEntry {
                local: file.path,
                remote_name,
            });
        }
        writer.flush()?;

        info!(manifest = %self.name, files = entries.len(), "Manifest written");

        // the index goes last so it only becomes visible after its data files
        entries.push(UploadEntry {
            local: manifest_path,
            remote_name: self.name.clone(),
        });

        Ok(CollectionResult::new(
            Strategy::Manifest,
            self.name.clone(),
            entries,
            Some(scratch),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use tempfile::TempDir;

    fn instant() -> RunInstant {
        RunInstant::at(
            FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2013, 1, 31, 3, 14, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_n_files_give_n_plus_one_entries() {
        let input = TempDir::new().unwrap();
        for name in ["customers.csv", "orders.csv", "items.csv"] {
            std::fs::write(input.path().join(name), name).unwrap();
        }

        let template = OutputTemplate::parse("manifest-${yyyyMMdd}.txt").unwrap();
        let mut collector = ManifestCollector::new(&template, &instant());
        collector.add(input.path(), "*.csv").unwrap();
        let result = collector.collect().unwrap();

        assert_eq!(result.strategy, Strategy::Manifest);
        assert_eq!(result.main_name, "manifest-20130131.txt");
        assert_eq!(result.entries.len(), 4);

        let manifest = result.entries.last().unwrap();
        assert_eq!(manifest.remote_name, "manifest-20130131.txt");
        let listed = std::fs::read_to_string(&manifest.local).unwrap();
        assert_eq!(
            listed,
            "customers.csv.1359602040000.csv\nitems.csv.1359602040000.csv\norders.csv.1359602040000.csv\n"
        );

        let data_names: Vec<&str> = result.entries[..3]
            .iter()
            .map(|e| e.remote_name.as_str())
            .collect();
        assert_eq!(listed.lines().collect::<Vec<_>>(), data_names);
        assert_eq!(result.entries[0].local, input.path().join("customers.csv"));
    }

    #[test]
    fn test_empty_collection_has_empty_manifest() {
        let template = OutputTemplate::parse("index.txt").unwrap();
        let mut collector = ManifestCollector::new(&template, &instant());
        let result = collector.collect().unwrap();

        assert_eq!(result.entries.len(), 1);
        assert_eq!(std::fs::read_to_string(&result.entries[0].local).unwrap(), "");
    }
}
