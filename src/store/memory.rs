//! Thread-safe in-memory [`VerificationStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{GuildConfig, GuildId, UserId, VerificationRecord},
	store::{StoreError, StoreFuture, StoreKey, VerificationStore, merge_upsert},
};

type RecordMap = Arc<RwLock<HashMap<StoreKey, VerificationRecord>>>;
type GuildMap = Arc<RwLock<HashMap<GuildId, GuildConfig>>>;

/// Thread-safe storage backend that keeps records in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	records: RecordMap,
	guilds: GuildMap,
}
impl MemoryStore {
	/// Seeds (or replaces) the settings of a guild.
	pub fn put_guild_config(&self, config: GuildConfig) {
		self.guilds.write().insert(config.guild_id.clone(), config);
	}

	/// Number of stored verification records.
	pub fn len(&self) -> usize {
		self.records.read().len()
	}

	/// Returns `true` when no verification has been recorded.
	pub fn is_empty(&self) -> bool {
		self.records.read().is_empty()
	}

	fn upsert_now(map: RecordMap, record: VerificationRecord) -> VerificationRecord {
		let key = StoreKey::of(&record);
		let mut guard = map.write();
		let stored = merge_upsert(guard.get(&key), record, OffsetDateTime::now_utc());

		guard.insert(key, stored.clone());

		stored
	}

	fn fetch_now(map: RecordMap, key: StoreKey) -> Option<VerificationRecord> {
		map.read().get(&key).cloned()
	}
}
impl VerificationStore for MemoryStore {
	fn upsert_verification(
		&self,
		record: VerificationRecord,
	) -> StoreFuture<'_, VerificationRecord> {
		let map = self.records.clone();

		Box::pin(async move { Ok(Self::upsert_now(map, record)) })
	}

	fn fetch_verification<'a>(
		&'a self,
		user_id: &'a UserId,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<VerificationRecord>> {
		let map = self.records.clone();
		let key = StoreKey::new(user_id, guild_id);

		Box::pin(async move { Ok(Self::fetch_now(map, key)) })
	}

	fn fetch_guild_config<'a>(
		&'a self,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<GuildConfig>> {
		let guilds = self.guilds.clone();

		Box::pin(async move { Ok::<_, StoreError>(guilds.read().get(guild_id).cloned()) })
	}
}
