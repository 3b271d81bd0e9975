//! Postgres-backed [`VerificationStore`] built on `sqlx`.

// crates.io
use sqlx::{
	Row,
	postgres::{PgPool, PgPoolOptions, PgRow},
};
// self
use crate::{
	_prelude::*,
	auth::{GuildConfig, GuildId, RoleId, UserId, VerificationRecord},
	store::{ConnectionCache, StoreError, StoreFuture, VerificationStore},
};

const MAX_CONNECTIONS: u32 = 5;

static POOL: ConnectionCache<PgPool> = ConnectionCache::new();

/// Returns the process-wide pool for `uri`, connecting on first use.
pub async fn get_connection(uri: &str) -> Result<PgPool, StoreError> {
	POOL.get_or_connect(uri, |uri| async move {
		PgPoolOptions::new()
			.max_connections(MAX_CONNECTIONS)
			.connect(&uri)
			.await
			.map_err(StoreError::from)
	})
	.await
}

/// Verification store persisting into the `verifications` and `guild_configs` tables.
#[derive(Clone, Debug)]
pub struct PgStore {
	pool: PgPool,
}
impl PgStore {
	/// Wraps an existing pool.
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Builds a store on top of the process-wide pool for `uri`.
	pub async fn connect(uri: &str) -> Result<Self, StoreError> {
		Ok(Self::new(get_connection(uri).await?))
	}

	/// Creates the tables when they do not exist yet.
	pub async fn migrate(&self) -> Result<(), StoreError> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS verifications(
				user_id TEXT NOT NULL,
				guild_id TEXT NOT NULL,
				access_token TEXT NOT NULL,
				refresh_token TEXT NOT NULL,
				expires_at TIMESTAMPTZ NOT NULL,
				verified_at TIMESTAMPTZ NOT NULL,
				added_servers TEXT[] NOT NULL DEFAULT '{}',
				PRIMARY KEY (user_id, guild_id)
			);
			"#,
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS guild_configs(
				guild_id TEXT PRIMARY KEY,
				verified_role_id TEXT,
				guild_name TEXT
			);
			"#,
		)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	async fn upsert_now(&self, record: VerificationRecord) -> Result<VerificationRecord, StoreError> {
		let added_servers: Vec<String> =
			record.added_servers.iter().map(|guild| guild.to_string()).collect();
		let row = sqlx::query(
			r#"
			INSERT INTO
				verifications(
					user_id,
					guild_id,
					access_token,
					refresh_token,
					expires_at,
					verified_at,
					added_servers
				)
			VALUES
				($1, $2, $3, $4, $5, NOW(), $6)
			ON CONFLICT (user_id, guild_id) DO UPDATE SET
				access_token = EXCLUDED.access_token,
				refresh_token = EXCLUDED.refresh_token,
				expires_at = EXCLUDED.expires_at,
				verified_at = EXCLUDED.verified_at,
				added_servers = CASE
					WHEN cardinality(EXCLUDED.added_servers) = 0 THEN verifications.added_servers
					ELSE EXCLUDED.added_servers
				END
			RETURNING
				user_id,
				guild_id,
				access_token,
				refresh_token,
				expires_at,
				verified_at,
				added_servers;
			"#,
		)
		.bind(record.user_id.as_ref())
		.bind(record.guild_id.as_ref())
		.bind(record.access_token.expose())
		.bind(record.refresh_token.expose())
		.bind(record.expires_at)
		.bind(&added_servers)
		.fetch_one(&self.pool)
		.await?;

		record_from_row(&row)
	}

	async fn fetch_now(
		&self,
		user_id: &UserId,
		guild_id: &GuildId,
	) -> Result<Option<VerificationRecord>, StoreError> {
		let row = sqlx::query(
			r#"
			SELECT
				user_id,
				guild_id,
				access_token,
				refresh_token,
				expires_at,
				verified_at,
				added_servers
			FROM
				verifications
			WHERE
				user_id = $1 AND
				guild_id = $2;
			"#,
		)
		.bind(user_id.as_ref())
		.bind(guild_id.as_ref())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(record_from_row).transpose()
	}

	async fn fetch_guild_now(&self, guild_id: &GuildId) -> Result<Option<GuildConfig>, StoreError> {
		let row = sqlx::query(
			r#"
			SELECT
				guild_id,
				verified_role_id,
				guild_name
			FROM
				guild_configs
			WHERE
				guild_id = $1;
			"#,
		)
		.bind(guild_id.as_ref())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(guild_config_from_row).transpose()
	}
}
impl VerificationStore for PgStore {
	fn upsert_verification(
		&self,
		record: VerificationRecord,
	) -> StoreFuture<'_, VerificationRecord> {
		Box::pin(self.upsert_now(record))
	}

	fn fetch_verification<'a>(
		&'a self,
		user_id: &'a UserId,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<VerificationRecord>> {
		Box::pin(self.fetch_now(user_id, guild_id))
	}

	fn fetch_guild_config<'a>(
		&'a self,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<GuildConfig>> {
		Box::pin(self.fetch_guild_now(guild_id))
	}
}

fn record_from_row(row: &PgRow) -> Result<VerificationRecord, StoreError> {
	let added_servers: Vec<String> = row.try_get("added_servers")?;

	Ok(VerificationRecord {
		user_id: decode_id(UserId::new(row.try_get::<String, _>("user_id")?))?,
		guild_id: decode_id(GuildId::new(row.try_get::<String, _>("guild_id")?))?,
		access_token: row.try_get::<String, _>("access_token")?.into(),
		refresh_token: row.try_get::<String, _>("refresh_token")?.into(),
		expires_at: row.try_get("expires_at")?,
		verified_at: row.try_get("verified_at")?,
		added_servers: added_servers
			.into_iter()
			.map(|guild| decode_id(GuildId::new(guild)))
			.collect::<Result<_, _>>()?,
	})
}

fn guild_config_from_row(row: &PgRow) -> Result<GuildConfig, StoreError> {
	let verified_role_id = row
		.try_get::<Option<String>, _>("verified_role_id")?
		.map(|role| decode_id(RoleId::new(role)))
		.transpose()?;

	Ok(GuildConfig {
		guild_id: decode_id(GuildId::new(row.try_get::<String, _>("guild_id")?))?,
		verified_role_id,
		guild_name: row.try_get("guild_name")?,
	})
}

fn decode_id<T>(value: Result<T, crate::auth::IdentifierError>) -> Result<T, StoreError> {
	value.map_err(|e| StoreError::Serialization { message: format!("Stored identifier is invalid: {e}") })
}
