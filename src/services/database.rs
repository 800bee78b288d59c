//! Database service using RocksDB.
//!
//! RocksDB provides crash safety through its write-ahead log, and every
//! multi-key change is applied as one atomic `WriteBatch`.
//!
//! # Data Organization
//!
//! Uses column families to separate data types. Records are stored as JSON.
//! - `riffs`: Riff records (key: big-endian u64 id, so iteration is id order)
//! - `collections`: Collections (key: big-endian u64 id)
//! - `favorites`: Favorite markers (key: `{riff:020}:{wallet}`)
//! - `stakes`: Stake positions (key: `{riff:020}:{wallet}`)
//! - `activity`: Activity log (key: `{riff:020}:{seq:020}`)
//! - `media`: Media records (key: UUID)
//! - `media_hash`: Content hash → UUID mapping (for deduplication)
//! - `counters`: Id sequences (key: counter name, value: big-endian u64)
//!
//! Wallet addresses in keys are lowercased, so lookups ignore case.
//!
//! # Writes
//!
//! Changes that read before they write go through [`DatabaseService::transaction`],
//! which holds the write lock for the whole read-modify-write and commits a
//! single batch.

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::models::{ActivityEvent, Collection, Media, Riff, StakePosition};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

type DB = DBWithThreadMode<MultiThreaded>;

/// Column family names
const CF_RIFFS: &str = "riffs";
const CF_COLLECTIONS: &str = "collections";
const CF_FAVORITES: &str = "favorites";
const CF_STAKES: &str = "stakes";
const CF_ACTIVITY: &str = "activity";
const CF_MEDIA: &str = "media";
const CF_MEDIA_HASH: &str = "media_hash";
const CF_COUNTERS: &str = "counters";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_RIFFS,
    CF_COLLECTIONS,
    CF_FAVORITES,
    CF_STAKES,
    CF_ACTIVITY,
    CF_MEDIA,
    CF_MEDIA_HASH,
    CF_COUNTERS,
];

/// Id sequences
pub const COUNTER_RIFF: &str = "riff";
pub const COUNTER_COLLECTION: &str = "collection";
pub const COUNTER_TOKEN: &str = "token";
const COUNTER_ACTIVITY: &str = "activity";

/// Database service for riffs, their social and staking state, and media metadata
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<DB>,
    db_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService")
            .field("path", &self.db_path)
            .finish()
    }
}

fn wallet_key(riff_id: u64, wallet: &str) -> String {
    format!("{:020}:{}", riff_id, wallet.to_ascii_lowercase())
}

fn riff_prefix(riff_id: u64) -> String {
    format!("{:020}:", riff_id)
}

impl DatabaseService {
    /// Create a new database service
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let db_path = config.database_path();

        std::fs::create_dir_all(&db_path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        opts.set_max_open_files(256);
        opts.set_keep_log_file_num(3);
        opts.set_max_total_wal_size(64 * 1024 * 1024); // 64MB
        opts.set_write_buffer_size(32 * 1024 * 1024); // 32MB
        opts.set_max_write_buffer_number(3);

        let cf_descriptors: Vec<_> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &db_path, cf_descriptors)
            .map_err(|e| AppError::internal(format!("Failed to open RocksDB: {}", e)))?;

        info!(path = %db_path.display(), "Database initialized (RocksDB)");

        Ok(Self {
            db: Arc::new(db),
            db_path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| AppError::internal(format!("Missing column family: {}", name)))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        match self.db.get_cf(&self.cf(cf)?, key)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Values of every key starting with `prefix`, in key order
    fn scan_prefix<T: DeserializeOwned>(&self, cf: &str, prefix: &str) -> Result<Vec<T>> {
        let handle = self.cf(cf)?;
        let iter = self
            .db
            .iterator_cf(&handle, IteratorMode::From(prefix.as_bytes(), Direction::Forward));

        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn count(&self, cf: &str) -> Result<u64> {
        let handle = self.cf(cf)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(&handle, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn read_counter(&self, name: &str) -> Result<u64> {
        match self.db.get_cf(&self.cf(CF_COUNTERS)?, name.as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    AppError::internal(format!("Corrupt counter value: {}", name))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Run a read-modify-write under the write lock and commit it atomically.
    ///
    /// Nothing is written when `f` returns an error.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::internal("Database write lock poisoned"))?;

        let mut txn = Transaction {
            service: self,
            batch: WriteBatch::default(),
            counters: HashMap::new(),
        };
        let value = f(&mut txn)?;

        let Transaction { batch, .. } = txn;
        self.db.write(batch)?;
        Ok(value)
    }

    /// Check that the database answers reads
    pub fn ping(&self) -> Result<()> {
        self.read_counter(COUNTER_RIFF).map(|_| ())
    }

    // =========================================================================
    // Riffs and collections
    // =========================================================================

    pub fn get_riff(&self, id: u64) -> Result<Option<Riff>> {
        self.get_json(CF_RIFFS, id.to_be_bytes())
    }

    /// All riffs, oldest first
    pub fn list_riffs(&self) -> Result<Vec<Riff>> {
        let handle = self.cf(CF_RIFFS)?;
        let mut riffs = Vec::new();
        for item in self.db.iterator_cf(&handle, IteratorMode::Start) {
            let (_, value) = item?;
            riffs.push(serde_json::from_slice(&value)?);
        }
        Ok(riffs)
    }

    /// Riff with the highest id
    pub fn latest_riff(&self) -> Result<Option<Riff>> {
        let handle = self.cf(CF_RIFFS)?;
        match self.db.iterator_cf(&handle, IteratorMode::End).next() {
            Some(item) => {
                let (_, value) = item?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }

    pub fn get_riff_count(&self) -> Result<u64> {
        self.count(CF_RIFFS)
    }

    pub fn get_collection(&self, id: u64) -> Result<Option<Collection>> {
        self.get_json(CF_COLLECTIONS, id.to_be_bytes())
    }

    // =========================================================================
    // Favorites, stakes and activity
    // =========================================================================

    pub fn is_favorite(&self, riff_id: u64, wallet: &str) -> Result<bool> {
        let key = wallet_key(riff_id, wallet);
        Ok(self.db.get_cf(&self.cf(CF_FAVORITES)?, key.as_bytes())?.is_some())
    }

    pub fn get_stake(&self, riff_id: u64, wallet: &str) -> Result<Option<StakePosition>> {
        self.get_json(CF_STAKES, wallet_key(riff_id, wallet).as_bytes())
    }

    /// Activity of a riff, newest first
    pub fn list_activity(&self, riff_id: u64) -> Result<Vec<ActivityEvent>> {
        let mut events: Vec<ActivityEvent> = self.scan_prefix(CF_ACTIVITY, &riff_prefix(riff_id))?;
        events.reverse();
        Ok(events)
    }

    // =========================================================================
    // Media
    // =========================================================================

    /// Insert a media record together with its hash index entry
    pub fn insert_media(&self, media: &Media) -> Result<()> {
        let data = serde_json::to_vec(media)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&self.cf(CF_MEDIA)?, media.id.to_string().as_bytes(), &data);
        batch.put_cf(
            &self.cf(CF_MEDIA_HASH)?,
            media.content_hash.as_bytes(),
            media.id.to_string().as_bytes(),
        );
        self.db.write(batch)?;

        debug!(id = %media.id, kind = media.kind.as_str(), "Inserted media record");
        Ok(())
    }

    pub fn get_media(&self, id: Uuid) -> Result<Option<Media>> {
        self.get_json(CF_MEDIA, id.to_string().as_bytes())
    }

    /// Find media by content hash (for deduplication)
    pub fn find_media_by_hash(&self, hash: &str) -> Result<Option<Media>> {
        match self.db.get_cf(&self.cf(CF_MEDIA_HASH)?, hash.as_bytes())? {
            Some(id_bytes) => {
                let id = Uuid::parse_str(&String::from_utf8_lossy(&id_bytes))?;
                self.get_media(id)
            }
            None => Ok(None),
        }
    }

    /// Remove a media record and its hash index entry
    pub fn delete_media(&self, media: &Media) -> Result<()> {
        let id = media.id.to_string();
        let hash_cf = self.cf(CF_MEDIA_HASH)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&self.cf(CF_MEDIA)?, id.as_bytes());
        // The index may already point at a newer copy of the same content
        let indexed = self.db.get_cf(&hash_cf, media.content_hash.as_bytes())?;
        if indexed.as_deref() == Some(id.as_bytes()) {
            batch.delete_cf(&hash_cf, media.content_hash.as_bytes());
        }
        self.db.write(batch)?;

        debug!(id = %media.id, "Deleted media record");
        Ok(())
    }

    pub fn get_media_count(&self) -> Result<u64> {
        self.count(CF_MEDIA)
    }
}

/// Pending writes of a [`DatabaseService::transaction`].
///
/// Reads go to the committed state (through `Deref`); writes are staged in the
/// batch. Read every key before staging a write to it.
pub struct Transaction<'a> {
    service: &'a DatabaseService,
    batch: WriteBatch,
    counters: HashMap<&'static str, u64>,
}

impl Deref for Transaction<'_> {
    type Target = DatabaseService;

    fn deref(&self) -> &DatabaseService {
        self.service
    }
}

impl Transaction<'_> {
    fn put_json<T: serde::Serialize>(
        &mut self,
        cf: &str,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        let handle = self.service.cf(cf)?;
        self.batch.put_cf(&handle, key, data);
        Ok(())
    }

    /// Allocate the next value of a sequence, starting at 1
    pub fn next_id(&mut self, counter: &'static str) -> Result<u64> {
        let current = match self.counters.get(counter) {
            Some(value) => *value,
            None => self.service.read_counter(counter)?,
        };
        let next = current + 1;

        self.counters.insert(counter, next);
        let handle = self.service.cf(CF_COUNTERS)?;
        self.batch.put_cf(&handle, counter.as_bytes(), next.to_be_bytes());
        Ok(next)
    }

    pub fn put_riff(&mut self, riff: &Riff) -> Result<()> {
        self.put_json(CF_RIFFS, riff.id.to_be_bytes(), riff)
    }

    pub fn put_collection(&mut self, collection: &Collection) -> Result<()> {
        self.put_json(CF_COLLECTIONS, collection.id.to_be_bytes(), collection)
    }

    pub fn put_stake(&mut self, position: &StakePosition) -> Result<()> {
        let key = wallet_key(position.riff_id, &position.wallet_address);
        self.put_json(CF_STAKES, key.as_bytes(), position)
    }

    pub fn put_favorite(&mut self, riff_id: u64, wallet: &str) -> Result<()> {
        let handle = self.service.cf(CF_FAVORITES)?;
        self.batch
            .put_cf(&handle, wallet_key(riff_id, wallet).as_bytes(), b"");
        Ok(())
    }

    pub fn delete_favorite(&mut self, riff_id: u64, wallet: &str) -> Result<()> {
        let handle = self.service.cf(CF_FAVORITES)?;
        self.batch
            .delete_cf(&handle, wallet_key(riff_id, wallet).as_bytes());
        Ok(())
    }

    /// Append an event to its riff's log, assigning its sequence number
    pub fn push_activity(&mut self, mut event: ActivityEvent) -> Result<ActivityEvent> {
        event.seq = self.next_id(COUNTER_ACTIVITY)?;
        let key = format!("{}{:020}", riff_prefix(event.riff_id), event.seq);
        self.put_json(CF_ACTIVITY, key.as_bytes(), &event)?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityKind, MediaKind};
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_db() -> (DatabaseService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            audio_dir: "audio".to_string(),
            covers_dir: "covers".to_string(),
            directory_levels: 2,
        };

        let db = DatabaseService::new(&config).unwrap();
        (db, temp_dir)
    }

    fn riff(id: u64, wallet: &str) -> Riff {
        Riff {
            id,
            title: format!("Riff {}", id),
            description: None,
            genre: None,
            mood: None,
            instrument: None,
            key_signature: None,
            time_signature: None,
            is_bargain_bin: false,
            collection_id: None,
            price: None,
            currency: "ETH".to_string(),
            royalty_percentage: 10,
            is_stakable: true,
            staking_royalty_share: 50,
            unlock_source_files: false,
            unlock_remix_rights: false,
            unlock_private_messages: false,
            unlock_backstage_content: false,
            wallet_address: wallet.to_string(),
            audio_id: Uuid::new_v4(),
            cover_id: None,
            favorites_count: 0,
            mint: None,
            created_at: Utc::now(),
        }
    }

    fn insert(db: &DatabaseService, wallet: &str) -> Riff {
        db.transaction(|txn| {
            let riff = riff(txn.next_id(COUNTER_RIFF)?, wallet);
            txn.put_riff(&riff)?;
            Ok(riff)
        })
        .unwrap()
    }

    #[test]
    fn test_ids_are_sequential() {
        let (db, _temp) = create_test_db();

        assert_eq!(insert(&db, "0xa").id, 1);
        assert_eq!(insert(&db, "0xb").id, 2);
        assert_eq!(insert(&db, "0xc").id, 3);

        assert_eq!(db.get_riff_count().unwrap(), 3);
        assert_eq!(db.latest_riff().unwrap().unwrap().id, 3);

        let ids: Vec<u64> = db.list_riffs().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_ids_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            audio_dir: "audio".to_string(),
            covers_dir: "covers".to_string(),
            directory_levels: 2,
        };

        {
            let db = DatabaseService::new(&config).unwrap();
            insert(&db, "0xa");
        }

        let db = DatabaseService::new(&config).unwrap();
        assert_eq!(insert(&db, "0xa").id, 2);
    }

    #[test]
    fn test_failed_transaction_writes_nothing() {
        let (db, _temp) = create_test_db();

        let result: Result<()> = db.transaction(|txn| {
            let riff = riff(txn.next_id(COUNTER_RIFF)?, "0xa");
            txn.put_riff(&riff)?;
            Err(AppError::conflict("abort"))
        });

        assert!(result.is_err());
        assert!(db.latest_riff().unwrap().is_none());
        assert_eq!(insert(&db, "0xa").id, 1);
    }

    #[test]
    fn test_favorites_ignore_wallet_case() {
        let (db, _temp) = create_test_db();
        let riff = insert(&db, "0xa");

        db.transaction(|txn| txn.put_favorite(riff.id, "0xABC")).unwrap();
        assert!(db.is_favorite(riff.id, "0xabc").unwrap());

        db.transaction(|txn| txn.delete_favorite(riff.id, "0xabc")).unwrap();
        assert!(!db.is_favorite(riff.id, "0xABC").unwrap());
    }

    #[test]
    fn test_wallet_keys_fold_ascii_only() {
        let (db, _temp) = create_test_db();
        let riff = insert(&db, "0xÄB");

        // Same rule as Riff::is_creator
        assert!(riff.is_creator("0xÄb"));
        assert!(!riff.is_creator("0xäb"));

        db.transaction(|txn| txn.put_favorite(riff.id, "0xÄB")).unwrap();
        assert!(db.is_favorite(riff.id, "0xÄb").unwrap());
        assert!(!db.is_favorite(riff.id, "0xäb").unwrap());
    }

    #[test]
    fn test_activity_newest_first_per_riff() {
        let (db, _temp) = create_test_db();
        let first = insert(&db, "0xa");
        let second = insert(&db, "0xa");

        db.transaction(|txn| {
            txn.push_activity(ActivityEvent::new(first.id, ActivityKind::Upload, "0xa"))?;
            txn.push_activity(ActivityEvent::new(second.id, ActivityKind::Upload, "0xa"))?;
            txn.push_activity(ActivityEvent::new(first.id, ActivityKind::Favorite, "0xb"))?;
            Ok(())
        })
        .unwrap();

        let kinds: Vec<ActivityKind> = db
            .list_activity(first.id)
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![ActivityKind::Favorite, ActivityKind::Upload]);
        assert_eq!(db.list_activity(second.id).unwrap().len(), 1);
    }

    #[test]
    fn test_stake_round_trip() {
        let (db, _temp) = create_test_db();
        let mut position = StakePosition::new(4, "0xAbC", Utc::now());
        position.amount = 12.5;

        db.transaction(|txn| txn.put_stake(&position)).unwrap();

        let stored = db.get_stake(4, "0xabc").unwrap().unwrap();
        assert_eq!(stored.amount, 12.5);
        assert!(db.get_stake(5, "0xabc").unwrap().is_none());
    }

    #[test]
    fn test_media_hash_lookup() {
        let (db, _temp) = create_test_db();
        let media = Media::new(
            MediaKind::Audio,
            Some("loop.mp3".to_string()),
            "audio/mpeg".to_string(),
            "mp3".to_string(),
            1000,
            "abc123".to_string(),
        );

        db.insert_media(&media).unwrap();

        assert_eq!(db.get_media(media.id).unwrap().unwrap(), media);
        assert_eq!(db.find_media_by_hash("abc123").unwrap().unwrap().id, media.id);
        assert!(db.find_media_by_hash("other").unwrap().is_none());
        assert_eq!(db.get_media_count().unwrap(), 1);

        db.delete_media(&media).unwrap();
        assert!(db.get_media(media.id).unwrap().is_none());
        assert!(db.find_media_by_hash("abc123").unwrap().is_none());
        assert_eq!(db.get_media_count().unwrap(), 0);
    }
}
