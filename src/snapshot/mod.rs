// Snapshot persistence
// Passage store and index artifact files, written atomically and read leniently


use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::embeddings::Passage;
use crate::manifest::SourceManifest;
use crate::{DocsError, Result};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Every passage of one build, tagged with the manifest it was fetched for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageStore {
    pub manifest: SourceManifest,
    pub passages: Vec<Passage>,
}

/// Marker written after a successful build; its mtime gates freshness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexArtifact {
    pub built_at: DateTime<Utc>,
    pub embedding_model: String,
    pub dimension: usize,
    pub passage_count: usize,
    pub manifest: SourceManifest,
}

/// Outcome of reading a snapshot; everything but `Loaded` counts as absent
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotState<T> {
    Missing,
    /// The file exists but holds only whitespace, e.g. a fresh placeholder
    Empty,
    Malformed(String),
    Loaded(T),
}

impl<T> SnapshotState<T> {
    #[inline]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    #[inline]
    pub fn loaded(self) -> Option<T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::Missing | Self::Empty | Self::Malformed(_) => None,
        }
    }

    #[inline]
    pub fn as_loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::Missing | Self::Empty | Self::Malformed(_) => None,
        }
    }
}

/// Create an empty placeholder (and its directory) unless the file exists
///
/// Returns whether a placeholder was created.
#[inline]
pub fn ensure_placeholder(path: &Path) -> Result<bool> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            debug!("Created empty snapshot placeholder at {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Read and parse a JSON snapshot without ever failing
#[inline]
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> SnapshotState<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return SnapshotState::Missing,
        Err(e) => {
            warn!("Failed to read snapshot {}: {}", path.display(), e);
            return SnapshotState::Malformed(e.to_string());
        }
    };

    if content.trim().is_empty() {
        return SnapshotState::Empty;
    }

    match serde_json::from_str(&content) {
        Ok(value) => SnapshotState::Loaded(value),
        Err(e) => {
            warn!("Snapshot {} is malformed: {}", path.display(), e);
            SnapshotState::Malformed(e.to_string())
        }
    }
}

/// Replace a snapshot through a temporary file and rename
///
/// Readers observe either the previous file or the complete new one.
#[inline]
pub fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| DocsError::Snapshot(format!("Failed to serialize {}: {}", path.display(), e)))?;

    let temp_path = temp_path_for(path);
    let write_result = (|| -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = write_result {
        // Best effort; the previous snapshot is untouched either way
        let _ = fs::remove_file(&temp_path);
        return Err(DocsError::Snapshot(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }

    debug!("Wrote snapshot {} ({} bytes)", path.display(), json.len());
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "snapshot".into(), |name| name.to_string_lossy());
    path.with_file_name(format!(".{}.tmp", file_name))
}

/// Last modification time, if the file exists
#[inline]
pub fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Age of a file modified at `modified`; timestamps in the future count as age zero
#[inline]
pub fn snapshot_age(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}

/// Whether a snapshot modified at `modified` is younger than `freshness_days`
#[inline]
pub fn is_fresh(modified: SystemTime, now: SystemTime, freshness_days: u32) -> bool {
    snapshot_age(modified, now) < Duration::from_secs(u64::from(freshness_days) * SECONDS_PER_DAY)
}
