//! File collection and packaging
//!
//! Sources feed files into a collector with [`Collector::add`]; the
//! collector then packages them once with [`Collector::collect`]:
//!
//! - [`ArchiveCollector`] packs everything into a single zip
//! - [`ManifestCollector`] ships each file on its own plus an index file
//!
//! Either way the result is a list of local files with their remote
//! names and one "main" name the job parameters point at.

pub mod archive;
pub mod manifest;

pub use archive::ArchiveCollector;
pub use manifest::ManifestCollector;

use crate::config::Packaging;
use crate::error::{AgentError, Result};
use crate::naming::RunInstant;
use globset::{GlobBuilder, GlobMatcher};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Prefix for the scratch directories holding generated artifacts
pub const SCRATCH_PREFIX: &str = "handoff-";

/// A local file with the logical name it travels under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFile {
    pub name: String,
    pub path: PathBuf,
}

/// Files gathered so far, keyed by logical name
///
/// Adding a name that is already present replaces its path but keeps its
/// original position.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<NamedFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: NamedFile) {
        match self.files.iter_mut().find(|f| f.name == file.name) {
            Some(existing) => existing.path = file.path,
            None => self.files.push(file),
        }
    }

    /// Add the regular files of `dir` whose names match `pattern`
    ///
    /// The directory is not searched recursively. Matching nothing is an
    /// error, as is an unreadable directory.
    pub fn add(&mut self, dir: &Path, pattern: &str) -> Result<usize> {
        let matcher = build_matcher(pattern)?;
        let no_match = || AgentError::no_matching_files(pattern, dir.display().to_string());

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(no_match()),
            Err(e) => return Err(e.into()),
        };

        let mut matched = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if matcher.is_match(&name) {
                matched.push(NamedFile {
                    name,
                    path: entry.path(),
                });
            }
        }

        if matched.is_empty() {
            return Err(no_match());
        }

        matched.sort_by(|a, b| a.name.cmp(&b.name));
        let count = matched.len();
        for file in matched {
            debug!(name = %file.name, path = %file.path.display(), "Collected file");
            self.insert(file);
        }
        Ok(count)
    }

    pub fn files(&self) -> &[NamedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_files(self) -> Vec<NamedFile> {
        self.files
    }
}

fn build_matcher(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| AgentError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Packaging strategy of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Archive,
    Manifest,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Archive => f.write_str("archive"),
            Strategy::Manifest => f.write_str("manifest"),
        }
    }
}

/// One file to upload and the name it must end up under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    pub local: PathBuf,
    pub remote_name: String,
}

/// Output of a collector, ready for upload
///
/// Generated artifacts live in scratch directories owned by the result
/// and are deleted when it is dropped.
#[derive(Debug)]
pub struct CollectionResult {
    pub strategy: Strategy,
    pub main_name: String,
    pub entries: Vec<UploadEntry>,
    scratch: Vec<TempDir>,
}

impl CollectionResult {
    pub fn new(
        strategy: Strategy,
        main_name: String,
        entries: Vec<UploadEntry>,
        scratch: Option<TempDir>,
    ) -> Self {
        Self {
            strategy,
            main_name,
            entries,
            scratch: scratch.into_iter().collect(),
        }
    }

    /// Directory holding the generated archive or manifest
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.first().map(TempDir::path)
    }

    /// Keep `dir` alive for as long as the result, e.g. extracted files
    /// the entries point into
    pub fn retain_dir(&mut self, dir: TempDir) {
        self.scratch.push(dir);
    }
}

/// Packaging capability shared by both strategies
pub trait Collector: Send {
    fn strategy(&self) -> Strategy;

    /// Remote name of the artifact the job parameters reference
    fn main_name(&self) -> &str;

    /// Accumulate matching files from `dir`
    fn add(&mut self, dir: &Path, pattern: &str) -> Result<usize>;

    /// Package everything added so far
    fn collect(&mut self) -> Result<CollectionResult>;
}

/// Build the collector matching the configured packaging
pub fn for_packaging(packaging: &Packaging, instant: &RunInstant) -> Box<dyn Collector> {
    match packaging {
        Packaging::Archive(template) => Box::new(ArchiveCollector::new(template, instant)),
        Packaging::Manifest(template) => Box::new(ManifestCollector::new(template, instant)),
    }
}

fn scratch_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::naming::OutputTemplate;
    use chrono::{FixedOffset, TimeZone};

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_add_matches_file_names_only() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.csv", "b");
        write(dir.path(), "a.csv", "a");
        write(dir.path(), "notes.txt", "n");
        std::fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let mut set = FileSet::new();
        assert_eq!(set.add(dir.path(), "*.csv").unwrap(), 2);
        let names: Vec<&str> = set.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_add_without_matches_names_pattern_and_dir() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "data.txt", "x");

        let err = FileSet::new().add(dir.path(), "*.csv").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("*.csv"));
        assert!(msg.contains(&dir.path().display().to_string()));
        assert!(matches!(err, AgentError::NoMatchingFiles { .. }));
    }

    #[test]
    fn test_add_missing_directory() {
        let err = FileSet::new()
            .add(Path::new("/nonexistent/handoff-input"), "*")
            .unwrap_err();
        assert!(matches!(err, AgentError::NoMatchingFiles { .. }));
    }

    #[test]
    fn test_last_write_wins_on_name_collision() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(first.path(), "orders.csv", "old");
        write(first.path(), "items.csv", "items");
        write(second.path(), "orders.csv", "new");

        let mut set = FileSet::new();
        set.add(first.path(), "*.csv").unwrap();
        set.add(second.path(), "orders.csv").unwrap();

        assert_eq!(set.len(), 2);
        let orders = set.files().iter().find(|f| f.name == "orders.csv").unwrap();
        assert_eq!(orders.path, second.path().join("orders.csv"));
        assert_eq!(set.files()[0].name, "items.csv");
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let err = FileSet::new().add(dir.path(), "[a-").unwrap_err();
        assert!(matches!(err, AgentError::InvalidPattern { .. }));
    }

    #[test]
    fn test_for_packaging_picks_strategy() {
        let instant = RunInstant::at(
            FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2013, 1, 31, 3, 14, 0)
                .unwrap(),
        );
        let template = OutputTemplate::parse("out-${yyyyMMdd}.zip").unwrap();

        let archive = for_packaging(&Packaging::Archive(template.clone()), &instant);
        assert_eq!(archive.strategy(), Strategy::Archive);
        assert_eq!(archive.main_name(), "out-20130131.zip");

        let manifest = for_packaging(&Packaging::Manifest(template), &instant);
        assert_eq!(manifest.strategy(), Strategy::Manifest);
    }
}
