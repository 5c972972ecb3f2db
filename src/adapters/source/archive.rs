//! Source inputs: plain files, gzip streams and `.tar.gz` archives
//!
//! A [`SourceInput`] can be opened more than once, which is how the counting
//! pre-scan reads the data ahead of the real pass. Gzip files are decoded as a
//! stream; a tarball entry is decompressed once and kept in memory.

use crate::config::schema::{is_archive, FileFormat};
use crate::domain::errors::SourceError;
use crate::domain::Result;
use flate2::read::{GzDecoder, MultiGzDecoder};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Something a source can (re)open for reading
#[derive(Debug, Clone)]
pub enum SourceInput {
    /// Uncompressed file
    Plain(PathBuf),
    /// Gzip-compressed file
    Gzip(PathBuf),
    /// Entry extracted from an archive
    Memory { name: String, data: Arc<Vec<u8>> },
}

impl SourceInput {
    /// Resolve `path` into an input, extracting the archive entry if needed
    ///
    /// Returns the input and the name of the data it carries, which is what
    /// format inference looks at.
    pub fn resolve(path: &Path, archive_entry: Option<&str>) -> Result<(Self, String)> {
        if !path.exists() {
            return Err(SourceError::NotFound(path.display().to_string()).into());
        }

        if is_archive(path) {
            let (name, data) = extract_entry(path, archive_entry)?;
            debug!(
                archive = %path.display(),
                entry = %name,
                bytes = data.len(),
                "Extracted archive entry"
            );
            let input = SourceInput::Memory {
                name: name.clone(),
                data: Arc::new(data),
            };
            return Ok((input, name));
        }

        let name = path.display().to_string();
        let is_gzip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);
        if is_gzip {
            Ok((SourceInput::Gzip(path.to_path_buf()), name))
        } else {
            Ok((SourceInput::Plain(path.to_path_buf()), name))
        }
    }

    /// Human-readable location used in error messages
    pub fn location(&self) -> String {
        match self {
            SourceInput::Plain(path) | SourceInput::Gzip(path) => path.display().to_string(),
            SourceInput::Memory { name, .. } => name.clone(),
        }
    }

    /// Open a fresh reader positioned at the start of the data
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match self {
            SourceInput::Plain(path) => Ok(Box::new(BufReader::new(open_file(path)?))),
            SourceInput::Gzip(path) => Ok(Box::new(BufReader::new(MultiGzDecoder::new(
                BufReader::new(open_file(path)?),
            )))),
            SourceInput::Memory { data, .. } => Ok(Box::new(Cursor::new(SharedBytes(
                Arc::clone(data),
            )))),
        }
    }
}

/// Lets a `Cursor` read from shared bytes without copying them
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        SourceError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

fn read_failed(path: &Path, e: impl std::fmt::Display) -> SourceError {
    SourceError::ReadFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Pull one regular-file entry out of a `.tar.gz`
///
/// With `wanted` set, the entry whose full path or file name matches is
/// used. Otherwise the first entry with a recognizable data extension wins,
/// falling back to the first regular file.
fn extract_entry(path: &Path, wanted: Option<&str>) -> Result<(String, Vec<u8>)> {
    let file = open_file(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut fallback: Option<(String, Vec<u8>)> = None;

    for entry in archive.entries().map_err(|e| read_failed(path, e))? {
        let mut entry = entry.map_err(|e| read_failed(path, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let entry_path = entry
            .path()
            .map_err(|e| read_failed(path, e))?
            .to_string_lossy()
            .to_string();
        let file_name = entry_path
            .rsplit('/')
            .next()
            .unwrap_or(&entry_path)
            .to_string();

        let selected = match wanted {
            Some(wanted) => entry_path == wanted || file_name == wanted,
            None => FileFormat::from_path(Path::new(&file_name)).is_some(),
        };
        let keep_as_fallback = wanted.is_none() && fallback.is_none();
        if !selected && !keep_as_fallback {
            continue;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| read_failed(path, e))?;

        if selected {
            return Ok((entry_path, contents));
        }
        fallback = Some((entry_path, contents));
    }

    match (wanted, fallback) {
        (Some(wanted), _) => Err(SourceError::ReadFailed {
            path: path.display().to_string(),
            message: format!("archive has no entry named '{wanted}'"),
        }
        .into()),
        (None, Some(entry)) => Ok(entry),
        (None, None) => Err(SourceError::EmptyArchive(path.display().to_string()).into()),
    }
}
