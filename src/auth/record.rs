//! Verification records, guild configuration, and the record builder.

// self
use crate::{
	_prelude::*,
	auth::{GuildId, RoleId, TokenSecret, UserId},
};

/// Errors produced by [`VerificationRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum VerificationRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the relative expiry overflows the supported date range.
	#[error("Expiry is outside the supported date range.")]
	ExpiryOutOfRange,
}

/// Durable proof that a user was verified into a guild.
///
/// Exactly one record exists per `(user_id, guild_id)`; stores replace the previous row
/// on every successful verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
	/// Verified user.
	pub user_id: UserId,
	/// Guild the user was verified into.
	pub guild_id: GuildId,
	/// OAuth access token issued for the user; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// OAuth refresh token issued for the user.
	pub refresh_token: TokenSecret,
	/// Access token expiry, computed as issuance time plus the provider-reported lifetime.
	pub expires_at: OffsetDateTime,
	/// Instant of the latest successful upsert; stores overwrite it on every write.
	pub verified_at: OffsetDateTime,
	/// Informational list of guilds the user was added to elsewhere.
	#[serde(default)]
	pub added_servers: Vec<GuildId>,
}
impl VerificationRecord {
	/// Returns a builder for the provided user + guild pair.
	pub fn builder(user_id: UserId, guild_id: GuildId) -> VerificationRecordBuilder {
		VerificationRecordBuilder::new(user_id, guild_id)
	}

	/// Returns `true` once the stored access token has expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Stamps the verification instant, as done by stores on every upsert.
	pub fn stamp_verified(&mut self, instant: OffsetDateTime) {
		self.verified_at = instant;
	}
}
impl Debug for VerificationRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VerificationRecord")
			.field("user_id", &self.user_id)
			.field("guild_id", &self.guild_id)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("verified_at", &self.verified_at)
			.field("added_servers", &self.added_servers)
			.finish()
	}
}

/// Builder for [`VerificationRecord`].
#[derive(Clone, Debug)]
pub struct VerificationRecordBuilder {
	user_id: UserId,
	guild_id: GuildId,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	added_servers: Vec<GuildId>,
}
impl VerificationRecordBuilder {
	fn new(user_id: UserId, guild_id: GuildId) -> Self {
		Self {
			user_id,
			guild_id,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
			added_servers: Vec::new(),
		}
	}

	/// Sets the token issuance instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.access_token = Some(token.into());

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Sets the informational list of additional guilds.
	pub fn added_servers(mut self, guilds: impl IntoIterator<Item = GuildId>) -> Self {
		self.added_servers = guilds.into_iter().collect();

		self
	}

	/// Consumes the builder and produces a [`VerificationRecord`].
	///
	/// `verified_at` starts at the issuance instant; stores replace it when persisting.
	pub fn build(self) -> Result<VerificationRecord, VerificationRecordBuilderError> {
		let access_token =
			self.access_token.ok_or(VerificationRecordBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(VerificationRecordBuilderError::MissingRefreshToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at
				.checked_add(delta)
				.ok_or(VerificationRecordBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(VerificationRecordBuilderError::MissingExpiry),
		};

		Ok(VerificationRecord {
			user_id: self.user_id,
			guild_id: self.guild_id,
			access_token,
			refresh_token,
			expires_at,
			verified_at: issued_at,
			added_servers: self.added_servers,
		})
	}
}

/// Per-guild verification settings, maintained by an external admin surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
	/// Guild the settings apply to.
	pub guild_id: GuildId,
	/// Role granted after a successful verification; `None` disables role assignment.
	#[serde(default)]
	pub verified_role_id: Option<RoleId>,
	/// Display name used to personalize confirmations.
	#[serde(default)]
	pub guild_name: Option<String>,
}
impl GuildConfig {
	/// Creates a configuration without a role or display name.
	pub fn new(guild_id: GuildId) -> Self {
		Self { guild_id, verified_role_id: None, guild_name: None }
	}

	/// Sets the role granted after verification.
	pub fn with_verified_role(mut self, role: RoleId) -> Self {
		self.verified_role_id = Some(role);

		self
	}

	/// Sets the guild display name.
	pub fn with_guild_name(mut self, name: impl Into<String>) -> Self {
		self.guild_name = Some(name.into());

		self
	}
}
