//! Multipart upload extraction.
//!
//! Accepts exactly the file fields `audio` and `cover`, one file each. Every
//! other part without a filename is a text field validated like a form body.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        FromRequest, Multipart, Request,
    },
    http::StatusCode,
};
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use super::{FieldError, FieldMap, FieldReader, FromFields, Location};
use crate::error::{AppError, Result};
use crate::models::UploadRiffRequest;
use crate::state::RiffApi;

/// Multipart field carrying the audio file
pub const AUDIO_FIELD: &str = "audio";
/// Multipart field carrying the cover image
pub const COVER_FIELD: &str = "cover";

/// A file received in a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied filename
    pub file_name: Option<String>,
    /// Client-supplied content type (not trusted, content is sniffed later)
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Files attached to an upload request
#[derive(Debug, Clone, Default)]
pub struct UploadFiles {
    pub audio: Option<UploadedFile>,
    pub cover: Option<UploadedFile>,
}

/// Validated upload: text fields plus the attached files
#[derive(Debug, Clone)]
pub struct ValidUpload {
    pub request: UploadRiffRequest,
    pub files: UploadFiles,
}

impl FromRequest<RiffApi> for ValidUpload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &RiffApi) -> Result<Self> {
        let mut multipart = Multipart::from_request(req, state).await.map_err(|e| {
            AppError::validation(format!("Expected multipart/form-data: {}", e.body_text()))
        })?;

        let mut fields = FieldMap::new();
        let mut files = UploadFiles::default();
        let mut file_errors = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or("").to_string();

            match name.as_str() {
                AUDIO_FIELD | COVER_FIELD => {
                    let limit = if name == AUDIO_FIELD {
                        state.uploads.max_audio_size
                    } else {
                        state.uploads.max_cover_size
                    };
                    let file = read_file(field, &name, limit).await?;

                    let slot = if name == AUDIO_FIELD {
                        &mut files.audio
                    } else {
                        &mut files.cover
                    };

                    if slot.is_some() {
                        file_errors.push(FieldError::new(
                            name,
                            Location::Files,
                            "accepts a single file",
                            None,
                        ));
                    } else if !file.data.is_empty() {
                        *slot = Some(file);
                    }
                }
                _ if field.file_name().is_some() => {
                    file_errors.push(FieldError::new(
                        name,
                        Location::Files,
                        "is not an accepted file field",
                        None,
                    ));
                }
                _ => {
                    let text = field.text().await.map_err(multipart_error)?;
                    fields.insert(name, Value::String(text));
                }
            }
        }

        debug!(
            text_fields = fields.len(),
            has_audio = files.audio.is_some(),
            has_cover = files.cover.is_some(),
            "Parsed upload form"
        );

        let mut reader = FieldReader::new(Location::Body, &fields);
        let request = UploadRiffRequest::from_fields(&mut reader);
        for error in file_errors {
            reader.push_error(error);
        }
        let request = reader.finish(request)?;

        Ok(ValidUpload { request, files })
    }
}

/// Body limit overruns surface as multipart errors; keep their 413
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large(err.body_text())
    } else {
        AppError::validation(format!("Invalid multipart data: {}", err.body_text()))
    }
}

async fn read_file(field: Field<'_>, name: &str, limit: u64) -> Result<UploadedFile> {
    let file_name = field.file_name().map(|s| s.to_string());
    let content_type = field.content_type().map(|s| s.to_string());

    let data = field.bytes().await.map_err(multipart_error)?;

    if data.len() as u64 > limit {
        return Err(AppError::payload_too_large(format!(
            "File {} of {} bytes exceeds maximum allowed size {}",
            name,
            data.len(),
            limit
        )));
    }

    Ok(UploadedFile {
        file_name,
        content_type,
        data,
    })
}
