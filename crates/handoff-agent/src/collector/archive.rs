//! Single-archive packaging

use super::{scratch_dir, CollectionResult, Collector, FileSet, Strategy, UploadEntry};
use crate::error::Result;
use crate::naming::{OutputTemplate, RunInstant};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Packs every collected file into one deflated zip
///
/// Entries are named by their logical names; the archive itself is named
/// from the template once, at construction.
#[derive(Debug)]
pub struct ArchiveCollector {
    files: FileSet,
    name: String,
}

impl ArchiveCollector {
    pub fn new(template: &OutputTemplate, instant: &RunInstant) -> Self {
        Self {
            files: FileSet::new(),
            name: template.render(instant),
        }
    }
}

impl Collector for ArchiveCollector {
    fn strategy(&self) -> Strategy {
        Strategy::Archive
    }

    fn main_name(&self) -> &str {
        &self.name
    }

    fn add(&mut self, dir: &Path, pattern: &str) -> Result<usize> {
        self.files.add(dir, pattern)
    }

    fn collect(&mut self) -> Result<CollectionResult> {
        let files = std::mem::take(&mut self.files);
        if files.is_empty() {
            warn!(archive = %self.name, "No files collected, the archive will be empty");
        }

        let scratch = scratch_dir()?;
        let archive_path = scratch.path().join(&self.name);

        let mut zip = ZipWriter::new(BufWriter::new(File::create(&archive_path)?));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(6));

        for file in files.files() {
            zip.start_file(file.name.as_str(), options)?;
            let mut source = File::open(&file.path)?;
            std::io::copy(&mut source, &mut zip)?;
        }
        let mut writer = zip.finish()?;
        std::io::Write::flush(&mut writer)?;

        info!(archive = %self.name, files = files.len(), "Archive created");

        Ok(CollectionResult::new(
            Strategy::Archive,
            self.name.clone(),
            vec![UploadEntry {
                local: archive_path,
                remote_name: self.name.clone(),
            }],
            Some(scratch),
        ))
    }
}
