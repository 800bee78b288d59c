//! Stored media files (riff audio and cover images).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Media classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Riff audio
    Audio,
    /// Cover image
    Image,
}

impl MediaKind {
    /// Get media kind from MIME type string
    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("audio/") {
            Some(Self::Audio)
        } else if mime.starts_with("image/") {
            Some(Self::Image)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }
}

/// A stored file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    /// Unique identifier (UUID v4)
    pub id: Uuid,

    pub kind: MediaKind,

    /// Filename provided during upload
    pub original_filename: Option<String>,

    /// MIME type of the stored file
    pub mime_type: String,

    /// Extension of the stored file
    pub extension: String,

    /// Stored file size in bytes
    pub size: u64,

    /// Pixel dimensions, images only
    pub width: Option<u32>,
    pub height: Option<u32>,

    /// Hash of the uploaded bytes (for deduplication)
    pub content_hash: String,

    pub created_at: DateTime<Utc>,
}

impl Media {
    pub fn new(
        kind: MediaKind,
        original_filename: Option<String>,
        mime_type: String,
        extension: String,
        size: u64,
        content_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            original_filename,
            mime_type,
            extension,
            size,
            width: None,
            height: None,
            content_hash,
            created_at: Utc::now(),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Filename of the stored file
    pub fn storage_filename(&self) -> String {
        format!("{}.{}", self.id, self.extension)
    }
}
