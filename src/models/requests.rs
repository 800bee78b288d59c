//! Request DTOs.
//!
//! Each DTO reads its fields through a [`FieldReader`] (type checks) and declares
//! its bounds with `validator` attributes. Field names are the camelCase names
//! clients send.

use validator::Validate;

use crate::validation::{FieldReader, FromFields};

/// Query filters for the riff listing
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct RiffFilter {
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub instrument: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub stakable: Option<bool>,
    pub backstage: Option<bool>,
    pub unlockable: Option<bool>,
    pub sort_by: Option<String>,
    #[validate(range(min = 1, max = 100, message = "must be an integer between 1 and 100"))]
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "must be a non-negative integer"))]
    pub offset: Option<i64>,
}

impl FromFields for RiffFilter {
    fn from_fields(reader: &mut FieldReader<'_>) -> Self {
        Self {
            genre: reader.optional_string("genre"),
            mood: reader.optional_string("mood"),
            instrument: reader.optional_string("instrument"),
            price_min: reader.optional_number("priceMin"),
            price_max: reader.optional_number("priceMax"),
            stakable: reader.optional_bool("stakable"),
            backstage: reader.optional_bool("backstage"),
            unlockable: reader.optional_bool("unlockable"),
            sort_by: reader.optional_string("sortBy"),
            limit: reader.optional_int("limit"),
            offset: reader.optional_int("offset"),
        }
    }
}

/// Ordering of the riff listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    Popular,
}

impl SortOrder {
    /// Parse a `sortBy` value; unknown keys fall back to newest first
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("oldest") => Self::Oldest,
            Some("price_asc") => Self::PriceAsc,
            Some("price_desc") => Self::PriceDesc,
            Some("popular") => Self::Popular,
            _ => Self::Newest,
        }
    }
}

/// `:id` path parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct RiffIdParams {
    pub id: i64,
}

impl FromFields for RiffIdParams {
    fn from_fields(reader: &mut FieldReader<'_>) -> Self {
        Self {
            id: reader.required_int("id"),
        }
    }
}

/// `:id/:walletAddress` path parameters
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct RiffWalletParams {
    pub id: i64,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub wallet_address: String,
}

impl FromFields for RiffWalletParams {
    fn from_fields(reader: &mut FieldReader<'_>) -> Self {
        Self {
            id: reader.required_int("id"),
            wallet_address: reader.required_string("walletAddress"),
        }
    }
}

/// Body carrying the acting wallet
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct WalletBody {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub wallet_address: String,
}

impl FromFields for WalletBody {
    fn from_fields(reader: &mut FieldReader<'_>) -> Self {
        Self {
            wallet_address: reader.required_string("walletAddress"),
        }
    }
}

/// Body of a stake request
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct StakeBody {
    #[validate(range(exclusive_min = 0.0, message = "must be a number greater than 0"))]
    pub amount: f64,
}

impl FromFields for StakeBody {
    fn from_fields(reader: &mut FieldReader<'_>) -> Self {
        Self {
            amount: reader.required_number("amount"),
        }
    }
}

/// Text fields of the multipart upload form
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct UploadRiffRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub wallet_address: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub instrument: Option<String>,
    pub key_signature: Option<String>,
    pub time_signature: Option<String>,
    pub is_bargain_bin: Option<bool>,
    pub collection_id: Option<i64>,
    pub new_collection_name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    #[validate(range(min = 0, max = 100, message = "must be an integer between 0 and 100"))]
    pub royalty_percentage: Option<i64>,
    pub is_stakable: Option<bool>,
    #[validate(range(min = 0, max = 100, message = "must be an integer between 0 and 100"))]
    pub staking_royalty_share: Option<i64>,
    pub unlock_source_files: Option<bool>,
    pub unlock_remix_rights: Option<bool>,
    pub unlock_private_messages: Option<bool>,
    pub unlock_backstage_content: Option<bool>,
}

impl FromFields for UploadRiffRequest {
    fn from_fields(reader: &mut FieldReader<'_>) -> Self {
        Self {
            title: reader.required_string("title"),
            wallet_address: reader.required_string("walletAddress"),
            description: reader.optional_string("description"),
            genre: reader.optional_string("genre"),
            mood: reader.optional_string("mood"),
            instrument: reader.optional_string("instrument"),
            key_signature: reader.optional_string("keySignature"),
            time_signature: reader.optional_string("timeSignature"),
            is_bargain_bin: reader.optional_bool("isBargainBin"),
            collection_id: reader.optional_int("collectionId"),
            new_collection_name: reader.optional_string("newCollectionName"),
            price: reader.optional_number("price"),
            currency: reader.optional_string("currency"),
            royalty_percentage: reader.optional_int("royaltyPercentage"),
            is_stakable: reader.optional_bool("isStakable"),
            staking_royalty_share: reader.optional_int("stakingRoyaltyShare"),
            unlock_source_files: reader.optional_bool("unlockSourceFiles"),
            unlock_remix_rights: reader.optional_bool("unlockRemixRights"),
            unlock_private_messages: reader.optional_bool("unlockPrivateMessages"),
            unlock_backstage_content: reader.optional_bool("unlockBackstageContent"),
        }
    }
}
