//! Storage service for file operations.
//!
//! # File Organization
//!
//! Files are organized in a hierarchical structure using the leading hex
//! characters of the media UUID, so no single directory grows too large.
//!
//! ```text
//! data/
//! ├── audio/               # Riff audio, stored as uploaded
//! │   └── ab/cd/           # First 2 chars / next 2 chars of UUID
//! │       └── abcd1234-...-5678.mp3
//! └── covers/              # Processed cover images
//!     └── ab/cd/
//!         └── abcd1234-...-5678.webp
//! ```

use crate::config::StorageConfig;
use crate::error::Result;
use crate::models::{Media, MediaKind};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Service for managing file storage operations
#[derive(Debug, Clone)]
pub struct StorageService {
    audio_dir: PathBuf,
    covers_dir: PathBuf,
    /// Number of directory nesting levels (0-4)
    directory_levels: u8,
}

impl StorageService {
    /// Create a new storage service and initialize directories
    ///
    /// # Errors
    /// Returns error if directories cannot be created
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let service = Self {
            audio_dir: config.audio_path(),
            covers_dir: config.covers_path(),
            directory_levels: config.directory_levels,
        };

        for dir in [&service.audio_dir, &service.covers_dir] {
            fs::create_dir_all(dir).await?;
        }

        info!(
            audio = %service.audio_dir.display(),
            covers = %service.covers_dir.display(),
            directory_levels = service.directory_levels,
            "Storage service initialized"
        );

        Ok(service)
    }

    fn base_dir(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Audio => &self.audio_dir,
            MediaKind::Image => &self.covers_dir,
        }
    }

    /// Subdirectory for a UUID at the configured nesting depth
    ///
    /// For UUID "550e8400-e29b-41d4-a716-446655440000":
    /// - level 0: ""
    /// - level 1: "55"
    /// - level 2: "55/0e"
    /// - level 4: "55/0e/84/00"
    fn subdir_path(&self, id: Uuid) -> PathBuf {
        let hex = id.as_simple().to_string();

        (0..self.directory_levels.min(4) as usize)
            .map(|level| &hex[level * 2..level * 2 + 2])
            .collect()
    }

    /// Full path of a stored file
    pub fn file_path(&self, kind: MediaKind, id: Uuid, extension: &str) -> PathBuf {
        self.base_dir(kind)
            .join(self.subdir_path(id))
            .join(format!("{}.{}", id, extension))
    }

    /// Path of the file backing a media record
    pub fn media_path(&self, media: &Media) -> PathBuf {
        self.file_path(media.kind, media.id, &media.extension)
    }

    /// Write a file, creating its subdirectory as needed
    pub async fn save(
        &self,
        kind: MediaKind,
        id: Uuid,
        extension: &str,
        data: &[u8],
    ) -> Result<PathBuf> {
        let path = self.file_path(kind, id, extension);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        debug!(
            id = %id,
            kind = kind.as_str(),
            path = %path.display(),
            size = data.len(),
            "Saved file"
        );

        Ok(path)
    }

    /// Delete a stored file; missing files are ignored
    pub async fn delete(&self, kind: MediaKind, id: Uuid, extension: &str) -> Result<()> {
        let path = self.file_path(kind, id, extension);

        if path.exists() {
            fs::remove_file(&path).await?;
            debug!(id = %id, path = %path.display(), "Deleted file");
        }

        Ok(())
    }

    /// Get storage statistics
    pub async fn get_stats(&self) -> Result<StorageStats> {
        let (audio_size, audio_count) = Self::dir_usage(&self.audio_dir).await?;
        let (covers_size, covers_count) = Self::dir_usage(&self.covers_dir).await?;

        Ok(StorageStats {
            audio_size,
            covers_size,
            total_size: audio_size + covers_size,
            audio_count,
            covers_count,
        })
    }

    /// Total size and file count of a directory tree
    async fn dir_usage(path: &Path) -> Result<(u64, usize)> {
        if !path.exists() {
            return Ok((0, 0));
        }

        let mut size = 0;
        let mut count = 0;
        let mut entries = fs::read_dir(path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                size += metadata.len();
                count += 1;
            } else if metadata.is_dir() {
                let (sub_size, sub_count) = Box::pin(Self::dir_usage(&entry.path())).await?;
                size += sub_size;
                count += sub_count;
            }
        }

        Ok((size, count))
    }
}

/// Storage statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageStats {
    /// Size of the audio directory in bytes
    pub audio_size: u64,
    /// Size of the covers directory in bytes
    pub covers_size: u64,
    /// Total storage size in bytes
    pub total_size: u64,
    pub audio_count: usize,
    pub covers_count: usize,
}
