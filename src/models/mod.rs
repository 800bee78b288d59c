//! Data models for the riff marketplace server.
//!
//! This module contains all domain models and data transfer objects (DTOs)
//! used throughout the application.

mod activity;
mod media;
mod requests;
mod riff;
mod staking;

pub use activity::*;
pub use media::*;
pub use requests::*;
pub use riff::*;
pub use staking::*;
