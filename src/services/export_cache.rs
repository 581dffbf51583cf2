//! Memo of the most recent export, used to skip re-running Blender when
//! nothing that affects the output has changed.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::time::SystemTime;

/// 128-bit digest of a source file's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Hash an in-memory buffer
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::truncate(blake3::hash(data))
    }

    /// Hash a file's contents without loading it all into memory
    pub fn of_file(path: &Utf8Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(Self::truncate(hasher.finalize()))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    fn truncate(hash: blake3::Hash) -> Self {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Self(bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Fingerprint of one export: what was exported, and with which options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_path: Utf8PathBuf,
    pub modified_time: SystemTime,
    pub content_hash: ContentHash,
    /// Serialized [`ImportOptions`](crate::models::ImportOptions)
    pub options_signature: String,
}

impl CacheEntry {
    /// Fingerprint `path` as it currently is on disk
    pub fn for_source(path: &Utf8Path, options_signature: impl Into<String>) -> io::Result<Self> {
        let modified_time = fs::metadata(path)?.modified()?;
        let content_hash = ContentHash::of_file(path)?;

        Ok(Self {
            source_path: path.to_path_buf(),
            modified_time,
            content_hash,
            options_signature: options_signature.into(),
        })
    }
}

/// Holds at most one entry: the last successful export
#[derive(Debug, Clone, Default)]
pub struct ExportCache {
    last_export: Option<CacheEntry>,
}

impl ExportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff the last recorded export matches all four fields exactly
    pub fn should_skip_export(
        &self,
        source_path: &Utf8Path,
        modified_time: SystemTime,
        content_hash: &ContentHash,
        options_signature: &str,
    ) -> bool {
        let Some(last) = &self.last_export else {
            return false;
        };

        last.modified_time == modified_time
            && last.source_path == source_path
            && last.options_signature == options_signature
            && last.content_hash == *content_hash
    }

    /// [`should_skip_export`](Self::should_skip_export) for a prepared fingerprint
    pub fn matches(&self, candidate: &CacheEntry) -> bool {
        self.should_skip_export(
            &candidate.source_path,
            candidate.modified_time,
            &candidate.content_hash,
            &candidate.options_signature,
        )
    }

    /// Replace the retained entry
    pub fn record_export(&mut self, entry: CacheEntry) {
        tracing::debug!(
            "Recording export of {} (hash {})",
            entry.source_path,
            entry.content_hash
        );
        self.last_export = Some(entry);
    }

    pub fn last_export(&self) -> Option<&CacheEntry> {
        self.last_export.as_ref()
    }

    pub fn clear(&mut self) {
        self.last_export = None;
    }
}
