//! Service layer for the riff marketplace server.
//!
//! This module contains business logic services that handle:
//! - Marketplace operations behind the [`RiffController`] trait
//! - Database operations
//! - File storage operations
//! - Audio detection and cover image processing

pub mod controller;
pub mod database;
pub mod media_processor;
pub mod riff_service;
pub mod storage;

pub use controller::RiffController;
pub use database::DatabaseService;
pub use media_processor::MediaProcessor;
pub use riff_service::RiffService;
pub use storage::{StorageService, StorageStats};
