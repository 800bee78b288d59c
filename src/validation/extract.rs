//! Axum extractors that validate a request location before the handler runs.

use axum::{
    body::Bytes,
    extract::{Form, FromRequest, FromRequestParts, Path, Query, Request},
    http::{header, request::Parts},
    Json,
};
use std::collections::HashMap;

use super::{parse_fields, string_fields, FieldMap, FromFields, Location};
use crate::error::{AppError, Result};

/// Validated query string
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: FromFields,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Query(raw) = Query::<HashMap<String, String>>::from_request_parts(parts, state).await?;
        parse_fields(Location::Query, &string_fields(raw)).map(ValidQuery)
    }
}

/// Validated path parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidParams<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidParams<T>
where
    T: FromFields,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Path(raw) = Path::<HashMap<String, String>>::from_request_parts(parts, state).await?;
        parse_fields(Location::Params, &string_fields(raw)).map(ValidParams)
    }
}

/// Validated request body, JSON object or urlencoded form.
///
/// A request without a body is read as having no fields, so required fields
/// are reported as missing instead of failing on the content type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidBody<T>(pub T);

impl<T, S> FromRequest<S> for ValidBody<T>
where
    T: FromFields,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let fields = if content_type.starts_with("application/json") {
            let Json(map) = Json::<FieldMap>::from_request(req, state).await?;
            map
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(raw) = Form::<HashMap<String, String>>::from_request(req, state).await?;
            string_fields(raw)
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| AppError::validation(format!("Failed to read body: {}", e.body_text())))?;
            if !body.is_empty() {
                return Err(AppError::unsupported_media_type(
                    "Expected an application/json or application/x-www-form-urlencoded body",
                ));
            }
            FieldMap::new()
        };

        parse_fields(Location::Body, &fields).map(ValidBody)
    }
}

/// Validated path parameters and body, with the failures of both reported together
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidParamsBody<P, B>(pub P, pub B);

impl<P, B, S> FromRequest<S> for ValidParamsBody<P, B>
where
    P: FromFields + Send,
    B: FromFields,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let (mut parts, body) = req.into_parts();
        let params = ValidParams::<P>::from_request_parts(&mut parts, state).await;
        let body = ValidBody::<B>::from_request(Request::from_parts(parts, body), state).await;

        match (params, body) {
            (Ok(ValidParams(params)), Ok(ValidBody(body))) => Ok(Self(params, body)),
            (Err(AppError::InvalidFields(mut errors)), Err(AppError::InvalidFields(more))) => {
                errors.extend(more);
                errors.sort_by(|a, b| a.field.cmp(&b.field));
                Err(AppError::InvalidFields(errors))
            }
            (Err(err), _) | (_, Err(err)) => Err(err),
        }
    }
}
