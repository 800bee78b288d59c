//! Application state management.
//!
//! This module defines the shared application state that is accessible
//! from all request handlers via Axum's State extractor.
//!
//! The riff routes get their own, smaller state ([`RiffApi`]): they only need
//! the controller and the upload limits, which lets tests mount them over any
//! [`RiffController`].

use crate::config::{Config, UploadConfig};
use crate::error::Result;
use crate::services::{DatabaseService, RiffController, RiffService, StorageService};
use std::sync::Arc;

/// State of the riff route table
#[derive(Clone)]
pub struct RiffApi {
    /// Operations the routes dispatch to
    pub controller: Arc<dyn RiffController>,

    /// Upload size limits, checked while the multipart body is read
    pub uploads: Arc<UploadConfig>,
}

impl RiffApi {
    pub fn new(controller: Arc<dyn RiffController>, uploads: UploadConfig) -> Self {
        Self {
            controller,
            uploads: Arc::new(uploads),
        }
    }
}

impl std::fmt::Debug for RiffApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiffApi")
            .field("controller", &"<RiffController>")
            .field("uploads", &self.uploads)
            .finish()
    }
}

/// Shared application state
///
/// Cloned into each request handler; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,

    /// Database service for riff and media metadata
    pub db: DatabaseService,

    /// Storage service for file operations
    pub storage: StorageService,

    /// Riff route state
    pub riffs: RiffApi,
}

impl AppState {
    /// Create a new application state
    ///
    /// # Errors
    /// Returns error if services cannot be initialized
    pub async fn new(config: Config) -> Result<Self> {
        let db = DatabaseService::new(&config.storage)?;
        let storage = StorageService::new(&config.storage).await?;

        let service = RiffService::new(&config, db.clone(), storage.clone());
        let riffs = RiffApi::new(Arc::new(service), config.upload.clone());

        Ok(Self {
            config: Arc::new(config),
            db,
            storage,
            riffs,
        })
    }

    /// Get cache max age in seconds
    pub fn cache_max_age(&self) -> u64 {
        self.config.server.cache_max_age
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"<Config>")
            .field("db", &self.db)
            .field("storage", &self.storage)
            .field("riffs", &self.riffs)
            .finish()
    }
}
