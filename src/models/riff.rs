//! Riff and collection entities and their API representations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// On-record mint state of a riff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintRecord {
    pub token_id: u64,
    pub owner_address: String,
    pub minted_at: DateTime<Utc>,
}

/// A stored riff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Riff {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub instrument: Option<String>,
    pub key_signature: Option<String>,
    pub time_signature: Option<String>,
    pub is_bargain_bin: bool,
    pub collection_id: Option<u64>,
    pub price: Option<f64>,
    pub currency: String,
    pub royalty_percentage: u8,
    pub is_stakable: bool,
    pub staking_royalty_share: u8,
    pub unlock_source_files: bool,
    pub unlock_remix_rights: bool,
    pub unlock_private_messages: bool,
    pub unlock_backstage_content: bool,
    /// Uploading wallet
    pub wallet_address: String,
    pub audio_id: Uuid,
    pub cover_id: Option<Uuid>,
    pub favorites_count: u64,
    pub mint: Option<MintRecord>,
    pub created_at: DateTime<Utc>,
}

impl Riff {
    /// Wallet addresses compare case-insensitively
    pub fn is_creator(&self, wallet: &str) -> bool {
        self.wallet_address.eq_ignore_ascii_case(wallet)
    }

    /// Whether any gated content is attached
    pub fn has_unlockables(&self) -> bool {
        self.unlock_source_files
            || self.unlock_remix_rights
            || self.unlock_private_messages
            || self.unlock_backstage_content
    }

    pub fn is_minted(&self) -> bool {
        self.mint.is_some()
    }
}

/// Riff as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiffResponse {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub instrument: Option<String>,
    pub key_signature: Option<String>,
    pub time_signature: Option<String>,
    pub is_bargain_bin: bool,
    pub collection_id: Option<u64>,
    pub price: Option<f64>,
    pub currency: String,
    pub royalty_percentage: u8,
    pub is_stakable: bool,
    pub staking_royalty_share: u8,
    pub unlock_source_files: bool,
    pub unlock_remix_rights: bool,
    pub unlock_private_messages: bool,
    pub unlock_backstage_content: bool,
    pub wallet_address: String,
    pub audio_url: String,
    pub cover_url: Option<String>,
    pub favorites_count: u64,
    pub is_minted: bool,
    pub token_id: Option<u64>,
    pub owner_address: Option<String>,
    pub minted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RiffResponse {
    /// Build the response, resolving media ids to URLs under `base_url`
    pub fn from_riff(riff: &Riff, base_url: &str) -> Self {
        let media_url = |id: Uuid| format!("{}/media/{}", base_url, id);

        Self {
            id: riff.id,
            title: riff.title.clone(),
            description: riff.description.clone(),
            genre: riff.genre.clone(),
            mood: riff.mood.clone(),
            instrument: riff.instrument.clone(),
            key_signature: riff.key_signature.clone(),
            time_signature: riff.time_signature.clone(),
            is_bargain_bin: riff.is_bargain_bin,
            collection_id: riff.collection_id,
            price: riff.price,
            currency: riff.currency.clone(),
            royalty_percentage: riff.royalty_percentage,
            is_stakable: riff.is_stakable,
            staking_royalty_share: riff.staking_royalty_share,
            unlock_source_files: riff.unlock_source_files,
            unlock_remix_rights: riff.unlock_remix_rights,
            unlock_private_messages: riff.unlock_private_messages,
            unlock_backstage_content: riff.unlock_backstage_content,
            wallet_address: riff.wallet_address.clone(),
            audio_url: media_url(riff.audio_id),
            cover_url: riff.cover_id.map(media_url),
            favorites_count: riff.favorites_count,
            is_minted: riff.is_minted(),
            token_id: riff.mint.as_ref().map(|m| m.token_id),
            owner_address: riff.mint.as_ref().map(|m| m.owner_address.clone()),
            minted_at: riff.mint.as_ref().map(|m| m.minted_at),
            created_at: riff.created_at,
        }
    }
}

/// One page of the riff listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiffPage {
    pub riffs: Vec<RiffResponse>,
    /// Number of riffs matching the filters, across all pages
    pub total: u64,
    pub limit: u32,
    pub offset: u64,
}

/// A named group of riffs owned by one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: u64,
    pub name: String,
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a mint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintResponse {
    pub riff_id: u64,
    pub token_id: u64,
    pub owner_address: String,
    pub minted_at: DateTime<Utc>,
}

/// Result of a favorite change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteResponse {
    pub riff_id: u64,
    pub wallet_address: String,
    pub is_favorite: bool,
    pub favorites_count: u64,
}
