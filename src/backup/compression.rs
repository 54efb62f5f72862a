//! Gzip streaming between files
//!
//! Artifacts can be larger than memory comfortably holds, so both directions
//! stream through `flate2` with buffered readers and writers.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{GastroError, GastroResult};

/// Compress `source` into a new gzip file at `dest`, syncing it to disk
///
/// Returns the number of uncompressed bytes read.
pub fn gzip_file(source: &Path, dest: &Path) -> GastroResult<u64> {
    let input = File::open(source).map_err(|e| {
        GastroError::Io(format!("Failed to open {}: {}", source.display(), e))
    })?;
    let output = File::create(dest).map_err(|e| {
        GastroError::Io(format!("Failed to create {}: {}", dest.display(), e))
    })?;

    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    let copied = io::copy(&mut BufReader::new(input), &mut encoder)
        .map_err(|e| GastroError::Io(format!("Failed to compress backup: {}", e)))?;

    let mut writer = encoder
        .finish()
        .map_err(|e| GastroError::Io(format!("Failed to finish compression: {}", e)))?;
    writer.flush()?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| GastroError::Io(format!("Failed to sync {}: {}", dest.display(), e)))?;

    Ok(copied)
}

/// Decompress the gzip file `source` into `dest`
pub fn gunzip_file(source: &Path, dest: &Path) -> GastroResult<u64> {
    let input = File::open(source).map_err(|e| {
        GastroError::Io(format!("Failed to open {}: {}", source.display(), e))
    })?;
    let output = File::create(dest).map_err(|e| {
        GastroError::Io(format!("Failed to create {}: {}", dest.display(), e))
    })?;

    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut writer = BufWriter::new(output);
    let copied = io::copy(&mut decoder, &mut writer)
        .map_err(|e| GastroError::Io(format!("Failed to decompress backup: {}", e)))?;
    writer.flush()?;

    Ok(copied)
}
