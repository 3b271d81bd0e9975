//! Authorization-code verification flow.
//!
//! [`Verifier::verify`] runs the steps strictly in order: token exchange, identity fetch,
//! membership grant, and record upsert are fatal; role assignment and the confirmation
//! message are best-effort and never turn a success into a failure. The returned
//! [`VerificationOutcome`] carries the [`StepReport`] for diagnostics.

mod metrics;

pub use metrics::VerifyMetrics;

// self
use crate::{
	_prelude::*,
	auth::{GuildConfig, GuildId, UserId, VerificationRecord},
	error::ValidationError,
	flows::{Step, StepReport, Verifier},
	obs::obs_event,
	platform::Identity,
	render,
};

/// Validated callback parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationRequest {
	/// One-time authorization code.
	pub code: String,
	/// Guild the user is verified into, carried by the OAuth `state` parameter.
	pub guild_id: GuildId,
}
impl VerificationRequest {
	/// Validates raw callback parameters; absent or blank values are rejected.
	pub fn from_query(code: Option<&str>, state: Option<&str>) -> Result<Self, ValidationError> {
		let code = non_blank(code).ok_or(ValidationError::MissingParameter { name: "code" })?;
		let state = non_blank(state).ok_or(ValidationError::MissingParameter { name: "state" })?;
		let guild_id = GuildId::new(state).map_err(ValidationError::InvalidState)?;

		Ok(Self { code: code.to_owned(), guild_id })
	}
}

/// Result of the best-effort role step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoleOutcome {
	/// The guild has no settings or no verified role.
	NotConfigured,
	/// The configured role was granted.
	Assigned,
	/// The role grant (or the settings lookup) failed; see the step report.
	Failed,
}

/// Successful verification.
#[derive(Clone, Debug)]
pub struct VerificationOutcome {
	/// User resolved from the access token.
	pub identity: Identity,
	/// Record as stored.
	pub record: VerificationRecord,
	/// Guild display name, when the guild settings carry one.
	pub guild_name: Option<String>,
	/// What happened to the verified role.
	pub role: RoleOutcome,
	/// Whether the confirmation message was delivered.
	pub notified: bool,
	/// Per-step outcomes in execution order.
	pub report: StepReport,
}

impl Verifier {
	/// Verifies the user behind `request.code` into `request.guild_id`.
	pub async fn verify(&self, request: VerificationRequest) -> Result<VerificationOutcome> {
		self.metrics.record_attempt();

		let result = self.verify_inner(request).await;

		match &result {
			Ok(outcome) => {
				self.metrics.record_success();

				if outcome.role == RoleOutcome::Failed {
					self.metrics.record_best_effort_failure();
				}
				if !outcome.notified {
					self.metrics.record_best_effort_failure();
				}
			},
			Err(_) => self.metrics.record_failure(),
		}

		result
	}

	/// Grants the verified role configured in `config`, if any.
	pub async fn maybe_assign_role(
		&self,
		config: Option<&GuildConfig>,
		user_id: &UserId,
	) -> Result<RoleOutcome> {
		let Some((guild_id, role_id)) =
			config.and_then(|config| Some((&config.guild_id, config.verified_role_id.as_ref()?)))
		else {
			return Ok(RoleOutcome::NotConfigured);
		};

		self.platform
			.add_role(guild_id, user_id, role_id, &self.bot_token)
			.await
			.map_err(Error::RoleAssignment)?;

		Ok(RoleOutcome::Assigned)
	}

	/// Sends the confirmation message to `user_id` over a direct-message channel.
	pub async fn notify(
		&self,
		user_id: &UserId,
		username: &str,
		guild_name: Option<&str>,
	) -> Result<()> {
		let channel_id =
			self.platform.open_dm(user_id, &self.bot_token).await.map_err(Error::Notification)?;
		let content = render::confirmation_message(username, guild_name);

		self.platform
			.send_message(&channel_id, &content, &self.bot_token)
			.await
			.map_err(Error::Notification)
	}

	async fn verify_inner(&self, request: VerificationRequest) -> Result<VerificationOutcome> {
		let VerificationRequest { code, guild_id } = request;
		let mut report = StepReport::default();
		let grant =
			report.run_fatal(Step::TokenExchange, self.exchange.exchange_code(&code)).await?;
		let identity = report
			.run_fatal(Step::IdentityFetch, async {
				self.platform.fetch_identity(&grant.access_token).await.map_err(Error::IdentityFetch)
			})
			.await?;

		report
			.run_fatal(Step::MembershipGrant, async {
				self.platform
					.add_member(&guild_id, &identity.user_id, &grant.access_token, &self.bot_token)
					.await
					.map_err(Error::MembershipGrant)
			})
			.await?;

		let record = report
			.run_fatal(Step::RecordUpsert, async {
				let record = grant.into_record(identity.user_id.clone(), guild_id.clone())?;

				Ok(self.store.upsert_verification(record).await?)
			})
			.await?;

		obs_event!(
			info,
			user_id = %record.user_id,
			guild_id = %record.guild_id,
			"User verified."
		);

		let mut guild_config = None;
		let role = report
			.run_best_effort(Step::RoleAssignment, async {
				guild_config = self.store.fetch_guild_config(&guild_id).await?;

				self.maybe_assign_role(guild_config.as_ref(), &identity.user_id).await
			})
			.await
			.unwrap_or(RoleOutcome::Failed);

		if role == RoleOutcome::NotConfigured {
			report.mark_skipped(Step::RoleAssignment);
		}

		let guild_name = guild_config.and_then(|config| config.guild_name);
		let notified = report
			.run_best_effort(
				Step::Notification,
				self.notify(&identity.user_id, &identity.username, guild_name.as_deref()),
			)
			.await
			.is_some();

		Ok(VerificationOutcome { identity, record, guild_name, role, notified, report })
	}
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}
