//! Upload cache: maps a resume to the remote handle it was uploaded as, so
//! reruns over the same folder skip the upload.
//!
//! The map lives in a JSON file (`{"<key>": "<file_id>"}`) that is rewritten
//! after every mutation. A crash mid-batch therefore loses at most the upload
//! in flight, never earlier ones.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::{FileStore, LlmError};

/// Files must be strictly larger than this; anything smaller is almost certainly empty.
pub const MIN_UPLOAD_BYTES: u64 = 100;
/// Provider upload limit.
pub const MAX_UPLOAD_BYTES: u64 = 512 * 1024 * 1024;

/// How cache entries are keyed.
///
/// `FileName` treats two different files with the same name as identical: the
/// second one reuses the first one's handle. `ContentHash` keys on
/// `<name>@sha256:<digest>` so renamed or edited files upload again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheKeyMode {
    #[default]
    FileName,
    ContentHash,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File too small (likely empty): {size} bytes")]
    TooSmall { size: u64 },

    #[error("File too large (max 512MB): {size} bytes")]
    TooLarge { size: u64 },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload failed: {0}")]
    Remote(#[from] LlmError),
}

#[derive(Debug)]
pub struct UploadCache {
    path: PathBuf,
    mode: CacheKeyMode,
    entries: BTreeMap<String, String>,
}

impl UploadCache {
    /// Loads the cache file. A missing file starts empty; an unreadable or
    /// corrupt one is logged and also starts empty.
    pub fn load(path: &Path, mode: CacheKeyMode) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring corrupt upload cache {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Could not read upload cache {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            mode,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Writes the full map to disk.
    pub fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Could not save cache: {}", self.path.display()))
    }

    /// Returns the cached handle for `path`, uploading the file on a miss.
    ///
    /// On a miss the size bounds are checked first; nothing is cached unless
    /// the upload returned a handle. There is no retry here: an error means
    /// this file fails for the current run.
    pub async fn get_or_upload(
        &mut self,
        path: &Path,
        store: &dyn FileStore,
    ) -> Result<String, UploadError> {
        let filename = file_name(path);
        let io_err = |source| UploadError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut contents = None;
        let key = match self.mode {
            CacheKeyMode::FileName => filename.clone(),
            CacheKeyMode::ContentHash => {
                // Bounds before reading: an oversized file is never loaded.
                check_size(tokio::fs::metadata(path).await.map_err(io_err)?.len())?;
                let bytes = tokio::fs::read(path).await.map_err(io_err)?;
                let key = content_key(&filename, &bytes);
                contents = Some(bytes);
                key
            }
        };

        if let Some(file_id) = self.entries.get(&key) {
            info!("Using cached file ID for {}", filename);
            return Ok(file_id.clone());
        }

        let bytes = match contents {
            Some(bytes) => bytes,
            None => {
                check_size(tokio::fs::metadata(path).await.map_err(io_err)?.len())?;
                tokio::fs::read(path).await.map_err(io_err)?
            }
        };
        let size = bytes.len();

        info!("Uploading {} ({} bytes)...", filename, size);
        let file_id = store.upload(&filename, bytes).await?;
        info!("Uploaded successfully: {}", file_id);

        self.entries.insert(key, file_id.clone());
        if let Err(e) = self.persist() {
            warn!("{e:#}");
        }

        Ok(file_id)
    }

    /// Drops every entry and persists the empty map.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.persist()
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn content_key(filename: &str, bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{}@sha256:{}", filename, hex::encode(digest))
}

fn check_size(size: u64) -> Result<(), UploadError> {
    if size <= MIN_UPLOAD_BYTES {
        return Err(UploadError::TooSmall { size });
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { size });
    }
    Ok(())
}
