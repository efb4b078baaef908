//! Gzip-compressed tar extraction for tarball-based adapters.

use crate::{Error, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use tar::Archive;

/// What to do with a regular file found in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Select {
    /// Ignore the entry.
    Skip,
    /// Read the entry body into memory.
    Read,
}

/// A file read from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path of the entry inside the archive.
    pub path: String,
    /// Entry contents.
    pub data: Vec<u8>,
}

/// Walk the regular files of a `.tar.gz` payload, reading the ones `select`
/// asks for.
pub fn read_tar_gz<F>(bytes: &[u8], mut select: F) -> Result<Vec<ArchiveEntry>>
where
    F: FnMut(&str) -> Select,
{
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let entries = archive.entries().map_err(invalid_archive)?;

    let mut selected = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(invalid_archive)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(invalid_archive)?
            .to_string_lossy()
            .into_owned();
        if select(&path) == Select::Skip {
            continue;
        }
        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(invalid_archive)?;
        selected.push(ArchiveEntry { path, data });
    }
    Ok(selected)
}

fn invalid_archive(err: std::io::Error) -> Error {
    Error::Other(format!("invalid archive: {err}"))
}

/// Build a `.tar.gz` payload from `(path, contents)` pairs.
#[cfg(test)]
pub(crate) fn build_tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap_or_else(|e| panic!("append {path}: {e}"));
    }
    let encoder = builder
        .into_inner()
        .unwrap_or_else(|e| panic!("finish tar: {e}"));
    encoder
        .finish()
        .unwrap_or_else(|e| panic!("finish gzip: {e}"))
}
