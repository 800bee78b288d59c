//! Media inspection and cover processing.
//!
//! Uploaded files are classified from their magic bytes, never from the
//! client-supplied content type or filename.
//!
//! - Audio is stored as uploaded once its detected type is allowed.
//! - Covers are decoded, bounded to `max_image_dimension` and re-encoded to the
//!   configured output format (webp, jpeg, png).

use crate::config::{ProcessingConfig, UploadConfig};
use crate::error::{AppError, Result};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use tracing::{debug, info};

/// Audio file accepted for storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedAudio {
    pub mime_type: String,
    pub extension: String,
}

/// Cover image ready for storage
#[derive(Debug)]
pub struct ProcessedCover {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
    pub width: u32,
    pub height: u32,
    pub was_resized: bool,
}

/// Service for inspecting and converting uploaded media
#[derive(Debug, Clone)]
pub struct MediaProcessor {
    /// Output format for covers (webp, jpeg, png)
    output_format: String,
    /// Maximum allowed cover dimension (width or height)
    max_dimension: u32,
    upload: UploadConfig,
}

impl MediaProcessor {
    pub fn new(processing: &ProcessingConfig, upload: &UploadConfig) -> Self {
        Self {
            output_format: processing.output_format.clone(),
            max_dimension: processing.max_image_dimension,
            upload: upload.clone(),
        }
    }

    /// Detect the audio type and check it against `allowed_audio_types`
    pub fn inspect_audio(&self, data: &[u8]) -> Result<DetectedAudio> {
        let mime = detect_mime_type(data)?;

        if !mime.starts_with("audio/") || !self.upload.is_allowed_audio_type(&mime) {
            return Err(AppError::unsupported_media_type(format!(
                "Audio type '{}' is not in allowed_audio_types",
                mime
            )));
        }

        debug!(mime = %mime, size = data.len(), "Detected audio format");

        Ok(DetectedAudio {
            extension: mime_to_extension(&mime),
            mime_type: mime,
        })
    }

    /// Validate, bound and re-encode a cover image
    pub fn process_cover(&self, data: &[u8]) -> Result<ProcessedCover> {
        let mime = detect_mime_type(data)?;

        if !self.upload.is_allowed_image_type(&mime) {
            return Err(AppError::unsupported_media_type(format!(
                "Image type '{}' is not in allowed_image_types",
                mime
            )));
        }

        let format = mime_to_format(&mime)?;
        let mut img = image::load_from_memory_with_format(data, format)
            .map_err(|e| AppError::unsupported_media_type(format!("Failed to decode image: {}", e)))?;

        let was_resized = img.width() > self.max_dimension || img.height() > self.max_dimension;
        if was_resized {
            img = self.resize(img);
        }

        let output = self.encode(&img)?;
        let output_mime = self.output_mime_type();

        info!(
            source_mime = %mime,
            input_size = data.len(),
            output_size = output.len(),
            width = img.width(),
            height = img.height(),
            was_resized,
            "Processed cover image"
        );

        Ok(ProcessedCover {
            data: output,
            extension: mime_to_extension(output_mime),
            mime_type: output_mime.to_string(),
            width: img.width(),
            height: img.height(),
            was_resized,
        })
    }

    fn output_image_format(&self) -> ImageFormat {
        match self.output_format.as_str() {
            "jpeg" | "jpg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            _ => ImageFormat::WebP,
        }
    }

    fn output_mime_type(&self) -> &'static str {
        match self.output_image_format() {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            _ => "image/webp",
        }
    }

    /// Fit within `max_dimension`, keeping the aspect ratio
    fn resize(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = img.dimensions();

        let (new_width, new_height) = if width > height {
            let ratio = self.max_dimension as f64 / width as f64;
            (self.max_dimension, ((height as f64 * ratio) as u32).max(1))
        } else {
            let ratio = self.max_dimension as f64 / height as f64;
            (((width as f64 * ratio) as u32).max(1), self.max_dimension)
        };

        img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
    }

    fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let format = self.output_image_format();

        // jpeg has no alpha channel; the webp encoder only takes 8-bit RGBA
        let img = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            ImageFormat::WebP => DynamicImage::ImageRgba8(img.to_rgba8()),
            _ => img.clone(),
        };

        img.write_to(&mut Cursor::new(&mut buffer), format)
            .map_err(|e| {
                AppError::image_processing(format!("Encoding to {} failed: {}", self.output_format, e))
            })?;

        Ok(buffer)
    }
}

/// Detect the MIME type from magic bytes
pub fn detect_mime_type(data: &[u8]) -> Result<String> {
    let kind = infer::get(data).ok_or_else(|| {
        AppError::unsupported_media_type("Could not detect file type from content")
    })?;

    Ok(kind.mime_type().to_string())
}

fn mime_to_format(mime: &str) -> Result<ImageFormat> {
    match mime {
        "image/jpeg" => Ok(ImageFormat::Jpeg),
        "image/png" => Ok(ImageFormat::Png),
        "image/gif" => Ok(ImageFormat::Gif),
        "image/webp" => Ok(ImageFormat::WebP),
        _ => Err(AppError::unsupported_media_type(format!(
            "Unsupported image format: {}",
            mime
        ))),
    }
}

/// File extension for a MIME type
pub fn mime_to_extension(mime: &str) -> String {
    let known = match mime {
        "audio/mpeg" => Some("mp3"),
        "audio/x-wav" | "audio/wav" => Some("wav"),
        "audio/ogg" => Some("ogg"),
        "audio/x-flac" | "audio/flac" => Some("flac"),
        "audio/m4a" | "audio/mp4" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    };

    known
        .or_else(|| mime_guess::get_mime_extensions_str(mime).and_then(|exts| exts.first().copied()))
        .unwrap_or("bin")
        .to_string()
}

/// Content hash used for deduplication and ETags
pub fn calculate_hash(data: &[u8]) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
