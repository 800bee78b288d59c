//! Marketplace operations backed by RocksDB and file storage.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

use super::controller::RiffController;
use super::database::{DatabaseService, COUNTER_COLLECTION, COUNTER_RIFF, COUNTER_TOKEN};
use super::media_processor::{calculate_hash, MediaProcessor};
use super::storage::StorageService;
use crate::config::{Config, MarketplaceConfig, StakingConfig};
use crate::error::{AppError, Result};
use crate::models::{
    ActivityEvent, ActivityKind, ActivityResponse, ClaimResponse, Collection, FavoriteResponse,
    Media, MediaKind, MintRecord, MintResponse, RewardTerms, Riff, RiffFilter, RiffPage,
    RiffResponse, SortOrder, StakePosition, StakeResponse, StakingRewardsResponse,
    UnstakeResponse, UploadRiffRequest,
};
use crate::validation::{FieldError, Location, UploadFiles};

/// Riff marketplace backed by the database and media storage
#[derive(Debug, Clone)]
pub struct RiffService {
    db: DatabaseService,
    storage: StorageService,
    processor: MediaProcessor,
    base_url: String,
    marketplace: MarketplaceConfig,
    staking: StakingConfig,
}

fn load_riff(db: &DatabaseService, id: i64) -> Result<Riff> {
    let riff = match u64::try_from(id) {
        Ok(id) => db.get_riff(id)?,
        Err(_) => None,
    };
    riff.ok_or_else(|| AppError::not_found(format!("Riff not found: {}", id)))
}

fn ensure_stakable(riff: &Riff) -> Result<()> {
    if riff.is_stakable {
        Ok(())
    } else {
        Err(AppError::NotStakable(format!("Riff {} does not accept stakes", riff.id)))
    }
}

/// Reject a position that could no longer be stored
fn ensure_representable(position: &StakePosition, pending: f64) -> Result<()> {
    if position.is_finite() && pending.is_finite() {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Stake on riff {} would exceed the supported amount",
            position.riff_id
        )))
    }
}

fn missing_file(field: &str) -> AppError {
    AppError::InvalidFields(vec![FieldError::new(field, Location::Files, "is required", None)])
}

fn same_text(filter: &Option<String>, value: &Option<String>) -> bool {
    match (filter, value) {
        (None, _) => true,
        (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
        (Some(_), None) => false,
    }
}

/// Whether a riff passes every filter that is set
fn matches_filter(riff: &Riff, filter: &RiffFilter) -> bool {
    if !same_text(&filter.genre, &riff.genre)
        || !same_text(&filter.mood, &riff.mood)
        || !same_text(&filter.instrument, &riff.instrument)
    {
        return false;
    }

    if filter.price_min.is_some() || filter.price_max.is_some() {
        let Some(price) = riff.price else {
            return false;
        };
        if filter.price_min.is_some_and(|min| price < min)
            || filter.price_max.is_some_and(|max| price > max)
        {
            return false;
        }
    }

    let flag = |wanted: Option<bool>, actual: bool| wanted.map_or(true, |w| w == actual);

    flag(filter.stakable, riff.is_stakable)
        && flag(filter.backstage, riff.unlock_backstage_content)
        && flag(filter.unlockable, riff.has_unlockables())
}

/// Riffs without a price sort after priced ones in both price orders
fn compare_price(a: &Riff, b: &Riff, descending: bool) -> Ordering {
    match (a.price, b.price) {
        (Some(x), Some(y)) if descending => y.total_cmp(&x),
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn sort_riffs(riffs: &mut [Riff], order: SortOrder) {
    // ids grow with upload time, so they double as the recency key
    match order {
        SortOrder::Newest => riffs.sort_by(|a, b| b.id.cmp(&a.id)),
        SortOrder::Oldest => riffs.sort_by(|a, b| a.id.cmp(&b.id)),
        SortOrder::PriceAsc => {
            riffs.sort_by(|a, b| compare_price(a, b, false).then(b.id.cmp(&a.id)))
        }
        SortOrder::PriceDesc => {
            riffs.sort_by(|a, b| compare_price(a, b, true).then(b.id.cmp(&a.id)))
        }
        SortOrder::Popular => riffs.sort_by(|a, b| {
            b.favorites_count
                .cmp(&a.favorites_count)
                .then(b.id.cmp(&a.id))
        }),
    }
}

impl RiffService {
    pub fn new(config: &Config, db: DatabaseService, storage: StorageService) -> Self {
        Self {
            db,
            storage,
            processor: MediaProcessor::new(&config.processing, &config.upload),
            base_url: config.server.base_url.clone(),
            marketplace: config.marketplace.clone(),
            staking: config.staking.clone(),
        }
    }

    fn response(&self, riff: &Riff) -> RiffResponse {
        RiffResponse::from_riff(riff, &self.base_url)
    }

    fn terms(&self, riff: &Riff) -> RewardTerms {
        RewardTerms {
            share_percent: riff.staking_royalty_share,
            annual_rate: self.staking.annual_reward_rate,
        }
    }

    /// Store a file unless identical content is already stored.
    ///
    /// Newly written media is appended to `fresh`.
    async fn store_media(
        &self,
        media: Media,
        data: &[u8],
        fresh: &mut Vec<Media>,
    ) -> Result<Media> {
        if let Some(existing) = self.db.find_media_by_hash(&media.content_hash)? {
            if existing.kind == media.kind && self.storage.media_path(&existing).exists() {
                debug!(id = %existing.id, hash = %existing.content_hash, "Reusing stored media");
                return Ok(existing);
            }
        }

        self.storage
            .save(media.kind, media.id, &media.extension, data)
            .await?;
        fresh.push(media.clone());
        self.db.insert_media(&media)?;
        Ok(media)
    }

    /// Remove media written by an upload that did not complete
    async fn discard_media(&self, fresh: &[Media]) {
        for media in fresh {
            if let Err(e) = self.storage.delete(media.kind, media.id, &media.extension).await {
                warn!(id = %media.id, error = %e, "Failed to remove orphaned file");
            }
            if let Err(e) = self.db.delete_media(media) {
                warn!(id = %media.id, error = %e, "Failed to remove orphaned media record");
            }
        }
    }

    /// Store the upload's media and write the riff with its activity entry
    async fn record_upload(
        &self,
        request: UploadRiffRequest,
        collection_id: Option<u64>,
        audio: (Media, &[u8]),
        cover: Option<(Media, Vec<u8>)>,
        fresh: &mut Vec<Media>,
    ) -> Result<Riff> {
        let audio_media = self.store_media(audio.0, audio.1, fresh).await?;
        let cover_media = match cover {
            Some((media, data)) => Some(self.store_media(media, &data, fresh).await?),
            None => None,
        };

        let defaults = &self.marketplace;
        self.db.transaction(|txn| {
            let collection_id = match (collection_id, request.new_collection_name) {
                (Some(id), _) => Some(id),
                (None, Some(name)) if !name.trim().is_empty() => {
                    let collection = Collection {
                        id: txn.next_id(COUNTER_COLLECTION)?,
                        name: name.trim().to_string(),
                        wallet_address: request.wallet_address.clone(),
                        created_at: Utc::now(),
                    };
                    txn.put_collection(&collection)?;
                    Some(collection.id)
                }
                _ => None,
            };

            let riff = Riff {
                id: txn.next_id(COUNTER_RIFF)?,
                title: request.title,
                description: request.description,
                genre: request.genre,
                mood: request.mood,
                instrument: request.instrument,
                key_signature: request.key_signature,
                time_signature: request.time_signature,
                is_bargain_bin: request.is_bargain_bin.unwrap_or(false),
                collection_id,
                price: request.price,
                currency: request
                    .currency
                    .unwrap_or_else(|| defaults.default_currency.clone()),
                royalty_percentage: request
                    .royalty_percentage
                    .and_then(|p| u8::try_from(p).ok())
                    .unwrap_or(defaults.default_royalty_percentage),
                is_stakable: request.is_stakable.unwrap_or(false),
                staking_royalty_share: request
                    .staking_royalty_share
                    .and_then(|p| u8::try_from(p).ok())
                    .unwrap_or(defaults.default_staking_royalty_share),
                unlock_source_files: request.unlock_source_files.unwrap_or(false),
                unlock_remix_rights: request.unlock_remix_rights.unwrap_or(false),
                unlock_private_messages: request.unlock_private_messages.unwrap_or(false),
                unlock_backstage_content: request.unlock_backstage_content.unwrap_or(false),
                wallet_address: request.wallet_address,
                audio_id: audio_media.id,
                cover_id: cover_media.as_ref().map(|m| m.id),
                favorites_count: 0,
                mint: None,
                created_at: Utc::now(),
            };

            txn.put_riff(&riff)?;
            txn.push_activity(ActivityEvent::new(
                riff.id,
                ActivityKind::Upload,
                riff.wallet_address.clone(),
            ))?;
            Ok(riff)
        })
    }

    /// Resolve `collectionId` to a collection owned by `wallet`
    fn owned_collection(&self, collection_id: i64, wallet: &str) -> Result<u64> {
        let collection = match u64::try_from(collection_id) {
            Ok(id) => self.db.get_collection(id)?,
            Err(_) => None,
        }
        .ok_or_else(|| AppError::not_found(format!("Collection not found: {}", collection_id)))?;

        if !collection.wallet_address.eq_ignore_ascii_case(wallet) {
            return Err(AppError::not_authorized(format!(
                "Collection {} belongs to another wallet",
                collection.id
            )));
        }

        Ok(collection.id)
    }
}

#[async_trait]
impl RiffController for RiffService {
    async fn get_all_riffs(&self, filter: RiffFilter) -> Result<RiffPage> {
        let mut riffs: Vec<Riff> = self
            .db
            .list_riffs()?
            .into_iter()
            .filter(|riff| matches_filter(riff, &filter))
            .collect();
        sort_riffs(&mut riffs, SortOrder::parse(filter.sort_by.as_deref()));

        let limit = filter
            .limit
            .and_then(|l| u32::try_from(l).ok())
            .unwrap_or(self.marketplace.default_page_size);
        let offset = filter.offset.and_then(|o| u64::try_from(o).ok()).unwrap_or(0);

        let page = riffs
            .iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .map(|riff| self.response(riff))
            .collect();

        Ok(RiffPage {
            riffs: page,
            total: riffs.len() as u64,
            limit,
            offset,
        })
    }

    async fn get_riff_by_id(&self, id: i64) -> Result<RiffResponse> {
        let riff = load_riff(&self.db, id)?;
        Ok(self.response(&riff))
    }

    async fn get_riff_activity(&self, id: i64) -> Result<ActivityResponse> {
        let riff = load_riff(&self.db, id)?;
        Ok(ActivityResponse {
            riff_id: riff.id,
            events: self.db.list_activity(riff.id)?,
        })
    }

    async fn upload_riff(
        &self,
        request: UploadRiffRequest,
        files: UploadFiles,
    ) -> Result<RiffResponse> {
        let audio = files
            .audio
            .ok_or_else(|| missing_file("audio"))?;

        if let Some(price) = request.price {
            if price < 0.0 {
                return Err(AppError::InvalidFields(vec![FieldError::new(
                    "price",
                    Location::Body,
                    "must be greater than or equal to 0",
                    Some(price.to_string()),
                )]));
            }
        }

        let collection_id = request
            .collection_id
            .map(|id| self.owned_collection(id, &request.wallet_address))
            .transpose()?;

        let detected = self.processor.inspect_audio(&audio.data)?;
        let cover = match &files.cover {
            Some(file) => Some((file, self.processor.process_cover(&file.data)?)),
            None => None,
        };

        let audio_media = Media::new(
            MediaKind::Audio,
            audio.file_name.clone(),
            detected.mime_type,
            detected.extension,
            audio.data.len() as u64,
            calculate_hash(&audio.data),
        );
        let cover_media = cover.map(|(file, processed)| {
            let media = Media::new(
                MediaKind::Image,
                file.file_name.clone(),
                processed.mime_type,
                processed.extension,
                processed.data.len() as u64,
                calculate_hash(&file.data),
            )
            .with_dimensions(processed.width, processed.height);
            (media, processed.data)
        });

        let mut fresh = Vec::new();
        let audio_media = (audio_media, &audio.data[..]);
        let riff = match self
            .record_upload(request, collection_id, audio_media, cover_media, &mut fresh)
            .await
        {
            Ok(riff) => riff,
            Err(e) => {
                self.discard_media(&fresh).await;
                return Err(e);
            }
        };

        info!(
            riff_id = riff.id,
            wallet = %riff.wallet_address,
            audio_id = %riff.audio_id,
            has_cover = riff.cover_id.is_some(),
            collection_id = ?riff.collection_id,
            "Riff uploaded"
        );

        Ok(self.response(&riff))
    }

    async fn mint_riff(&self, id: i64, wallet_address: String) -> Result<MintResponse> {
        let response = self.db.transaction(|txn| {
            let mut riff = load_riff(txn, id)?;

            if !riff.is_creator(&wallet_address) {
                return Err(AppError::not_authorized(format!(
                    "Only the creator can mint riff {}",
                    riff.id
                )));
            }
            if let Some(mint) = &riff.mint {
                return Err(AppError::conflict(format!(
                    "Riff {} is already minted as token {}",
                    riff.id, mint.token_id
                )));
            }

            let record = MintRecord {
                token_id: txn.next_id(COUNTER_TOKEN)?,
                owner_address: wallet_address.clone(),
                minted_at: Utc::now(),
            };
            riff.mint = Some(record.clone());

            txn.put_riff(&riff)?;
            txn.push_activity(ActivityEvent::new(riff.id, ActivityKind::Mint, wallet_address.clone()))?;

            Ok(MintResponse {
                riff_id: riff.id,
                token_id: record.token_id,
                owner_address: record.owner_address,
                minted_at: record.minted_at,
            })
        })?;

        info!(riff_id = response.riff_id, token_id = response.token_id, "Riff minted");
        Ok(response)
    }

    async fn stake_riff(
        &self,
        id: i64,
        wallet_address: String,
        amount: f64,
    ) -> Result<StakeResponse> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::validation("Stake amount must be a positive number"));
        }

        let response = self.db.transaction(|txn| {
            let riff = load_riff(txn, id)?;
            ensure_stakable(&riff)?;

            let now = Utc::now();
            let terms = self.terms(&riff);
            let mut position = txn
                .get_stake(riff.id, &wallet_address)?
                .unwrap_or_else(|| StakePosition::new(riff.id, wallet_address.clone(), now));
            position.stake(amount, &terms, now);
            let pending = position.pending_rewards(&terms, now);
            ensure_representable(&position, pending)?;

            txn.put_stake(&position)?;
            txn.push_activity(
                ActivityEvent::new(riff.id, ActivityKind::Stake, wallet_address.clone())
                    .with_amount(amount),
            )?;

            Ok(StakeResponse {
                riff_id: riff.id,
                wallet_address: wallet_address.clone(),
                staked_amount: position.amount,
                pending_rewards: pending,
            })
        })?;

        info!(
            riff_id = response.riff_id,
            wallet = %response.wallet_address,
            amount,
            staked = response.staked_amount,
            "Stake added"
        );
        Ok(response)
    }

    async fn unstake_riff(&self, id: i64, wallet_address: String) -> Result<UnstakeResponse> {
        let response = self.db.transaction(|txn| {
            let riff = load_riff(txn, id)?;

            let mut position = txn
                .get_stake(riff.id, &wallet_address)?
                .filter(StakePosition::is_active)
                .ok_or_else(|| {
                    AppError::not_found(format!(
                        "No active stake on riff {} for {}",
                        riff.id, wallet_address
                    ))
                })?;

            let now = Utc::now();
            let terms = self.terms(&riff);
            let released = position.unstake(&terms, now);
            ensure_representable(&position, released)?;

            txn.put_stake(&position)?;
            txn.push_activity(
                ActivityEvent::new(riff.id, ActivityKind::Unstake, wallet_address.clone())
                    .with_amount(released),
            )?;

            Ok(UnstakeResponse {
                riff_id: riff.id,
                wallet_address: wallet_address.clone(),
                unstaked_amount: released,
                pending_rewards: position.pending_rewards(&terms, now),
            })
        })?;

        info!(
            riff_id = response.riff_id,
            wallet = %response.wallet_address,
            amount = response.unstaked_amount,
            "Stake released"
        );
        Ok(response)
    }

    async fn get_staking_rewards(
        &self,
        id: i64,
        wallet_address: String,
    ) -> Result<StakingRewardsResponse> {
        let riff = load_riff(&self.db, id)?;
        ensure_stakable(&riff)?;

        let position = self.db.get_stake(riff.id, &wallet_address)?;
        Ok(StakingRewardsResponse::new(
            riff.id,
            &wallet_address,
            position.as_ref(),
            &self.terms(&riff),
            Utc::now(),
        ))
    }

    async fn claim_rewards(&self, id: i64, wallet_address: String) -> Result<ClaimResponse> {
        let response = self.db.transaction(|txn| {
            let riff = load_riff(txn, id)?;

            let mut position = txn.get_stake(riff.id, &wallet_address)?.ok_or_else(|| {
                AppError::not_found(format!(
                    "No stake on riff {} for {}",
                    riff.id, wallet_address
                ))
            })?;

            let claimed = position.claim(&self.terms(&riff), Utc::now());
            ensure_representable(&position, claimed)?;
            if claimed <= 0.0 {
                return Err(AppError::NothingToClaim(format!(
                    "No pending rewards on riff {}",
                    riff.id
                )));
            }

            txn.put_stake(&position)?;
            txn.push_activity(
                ActivityEvent::new(riff.id, ActivityKind::RewardClaim, wallet_address.clone())
                    .with_amount(claimed),
            )?;

            Ok(ClaimResponse {
                riff_id: riff.id,
                wallet_address: wallet_address.clone(),
                claimed,
                total_claimed: position.total_claimed,
            })
        })?;

        info!(
            riff_id = response.riff_id,
            wallet = %response.wallet_address,
            claimed = response.claimed,
            "Rewards claimed"
        );
        Ok(response)
    }

    async fn add_to_favorites(&self, id: i64, wallet_address: String) -> Result<FavoriteResponse> {
        self.db.transaction(|txn| {
            let mut riff = load_riff(txn, id)?;

            if txn.is_favorite(riff.id, &wallet_address)? {
                return Err(AppError::conflict(format!(
                    "Riff {} is already a favorite of {}",
                    riff.id, wallet_address
                )));
            }

            riff.favorites_count += 1;
            txn.put_favorite(riff.id, &wallet_address)?;
            txn.put_riff(&riff)?;
            txn.push_activity(ActivityEvent::new(
                riff.id,
                ActivityKind::Favorite,
                wallet_address.clone(),
            ))?;

            Ok(FavoriteResponse {
                riff_id: riff.id,
                wallet_address: wallet_address.clone(),
                is_favorite: true,
                favorites_count: riff.favorites_count,
            })
        })
    }

    async fn remove_from_favorites(
        &self,
        id: i64,
        wallet_address: String,
    ) -> Result<FavoriteResponse> {
        self.db.transaction(|txn| {
            let mut riff = load_riff(txn, id)?;

            if !txn.is_favorite(riff.id, &wallet_address)? {
                return Err(AppError::not_found(format!(
                    "Riff {} is not a favorite of {}",
                    riff.id, wallet_address
                )));
            }

            riff.favorites_count = riff.favorites_count.saturating_sub(1);
            txn.delete_favorite(riff.id, &wallet_address)?;
            txn.put_riff(&riff)?;
            txn.push_activity(ActivityEvent::new(
                riff.id,
                ActivityKind::Unfavorite,
                wallet_address.clone(),
            ))?;

            Ok(FavoriteResponse {
                riff_id: riff.id,
                wallet_address: wallet_address.clone(),
                is_favorite: false,
                favorites_count: riff.favorites_count,
            })
        })
    }

    async fn get_latest_riff(&self) -> Result<RiffResponse> {
        let riff = self
            .db
            .latest_riff()?
            .ok_or_else(|| AppError::not_found("No riffs have been uploaded"))?;
        Ok(self.response(&riff))
    }

    async fn get_random_riff(&self) -> Result<RiffResponse> {
        let riffs = self.db.list_riffs()?;
        if riffs.is_empty() {
            return Err(AppError::not_found("No riffs have been uploaded"));
        }

        let index = rand::rng().random_range(0..riffs.len());
        Ok(self.response(&riffs[index]))
    }
}
