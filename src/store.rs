//! Storage contracts and built-in store implementations for verification records.

pub mod cache;
pub mod file;
pub mod memory;
#[cfg(feature = "sqlx")] pub mod postgres;

pub use cache::ConnectionCache;
pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlx")] pub use postgres::PgStore;

// self
use crate::{
	_prelude::*,
	auth::{GuildConfig, GuildId, UserId, VerificationRecord},
};

/// Boxed future returned by [`VerificationStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by verification stores.
///
/// Implementations keep exactly one record per `(user_id, guild_id)` and make each upsert
/// atomic with respect to concurrent writers of the same key (last write wins).
pub trait VerificationStore
where
	Self: Send + Sync,
{
	/// Inserts or replaces the record for its `(user_id, guild_id)` pair.
	///
	/// The store stamps `verified_at` with its own clock and keeps the existing
	/// `added_servers` list when the incoming record carries none. Returns the stored row.
	fn upsert_verification(&self, record: VerificationRecord)
	-> StoreFuture<'_, VerificationRecord>;

	/// Fetches the record for the provided user + guild, if present.
	fn fetch_verification<'a>(
		&'a self,
		user_id: &'a UserId,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<VerificationRecord>>;

	/// Fetches the verification settings of `guild_id`, if any were configured.
	fn fetch_guild_config<'a>(
		&'a self,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<GuildConfig>>;
}

/// Error type produced by [`VerificationStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures (e.g., serde or column decoding) surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for StoreError {
	fn from(e: sqlx::Error) -> Self {
		match e {
			sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) =>
				Self::Serialization { message: e.to_string() },
			_ => Self::Backend { message: e.to_string() },
		}
	}
}

/// Unique key identifying a stored verification record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
	/// Verified user.
	pub user_id: UserId,
	/// Guild the user was verified into.
	pub guild_id: GuildId,
}
impl StoreKey {
	/// Builds a key for the provided user + guild pair.
	pub fn new(user_id: &UserId, guild_id: &GuildId) -> Self {
		Self { user_id: user_id.clone(), guild_id: guild_id.clone() }
	}

	/// Builds the key a record is stored under.
	pub fn of(record: &VerificationRecord) -> Self {
		Self::new(&record.user_id, &record.guild_id)
	}
}

/// Applies upsert semantics shared by the in-process stores.
pub(crate) fn merge_upsert(
	existing: Option<&VerificationRecord>,
	mut incoming: VerificationRecord,
	now: OffsetDateTime,
) -> VerificationRecord {
	if let Some(previous) = existing.filter(|_| incoming.added_servers.is_empty()) {
		incoming.added_servers = previous.added_servers.clone();
	}

	incoming.stamp_verified(now);

	incoming
}
