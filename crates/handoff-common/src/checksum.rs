//! SHA-256 digests for local artifacts

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Digest and byte count of a readable source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub sha256: String,
    pub size: u64,
}

/// Hash any reader to completion
pub fn fingerprint<R: Read>(reader: &mut R) -> Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        size += bytes_read as u64;
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Fingerprint {
        sha256: hex::encode(hasher.finalize()),
        size,
    })
}

/// Hash a file on disk
pub fn fingerprint_file(path: impl AsRef<Path>) -> Result<Fingerprint> {
    let mut file = std::fs::File::open(path)?;
    fingerprint(&mut file)
}
