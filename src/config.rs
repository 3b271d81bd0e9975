//! Typed service settings loaded from an optional `guild-gate.toml` file and
//! `GUILD_GATE_*` environment variables (the environment wins).

// std
use std::{net::SocketAddr, path::PathBuf};
// crates.io
use ::config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	flows::VerifierCredentials,
	provider::{DEFAULT_AUTHORIZATION_ENDPOINT, ProviderEndpoints},
};

/// Settings file looked up in the working directory (extension optional).
pub const CONFIG_FILE: &str = "guild-gate";
/// Environment variable prefix.
pub const ENV_PREFIX: &str = "GUILD_GATE";

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CALLBACK_PATH: &str = "/callback";
const DEFAULT_START_PATH: &str = "/verify";
const DEFAULT_LOG_FILTER: &str = "info";

/// Service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret.
	pub client_secret: TokenSecret,
	/// Bot credential for guild operations.
	pub bot_token: TokenSecret,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Url,
	/// REST API base; the token endpoint is `{api_base}/oauth2/token`.
	pub api_base: Url,
	/// OAuth authorize endpoint users are sent to.
	pub authorize_url: Url,
	/// Postgres connection string; takes precedence over `store_path`.
	#[serde(default)]
	pub database_url: Option<TokenSecret>,
	/// JSON snapshot path used when no database is configured.
	#[serde(default)]
	pub store_path: Option<PathBuf>,
	/// Socket address the HTTP server binds to.
	pub bind_addr: SocketAddr,
	/// Path of the OAuth callback route.
	pub callback_path: String,
	/// Path of the route that redirects users to the authorize endpoint.
	pub start_path: String,
	/// `tracing` filter directive.
	pub log_filter: String,
}
impl AppConfig {
	/// Loads settings from `guild-gate.toml` (optional) and the process environment.
	pub fn load() -> Result<Self, ConfigError> {
		Self::from_builder(
			defaults()?
				.add_source(File::with_name(CONFIG_FILE).required(false))
				.add_source(Environment::with_prefix(ENV_PREFIX)),
		)
	}

	/// Loads settings from an explicit variable map instead of the process environment.
	pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
		Self::from_builder(
			defaults()?.add_source(Environment::with_prefix(ENV_PREFIX).source(Some(vars))),
		)
	}

	/// Rejects empty credentials and malformed paths.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingSetting { name: "client_id" });
		}
		if self.client_secret.is_blank() {
			return Err(ConfigError::MissingSetting { name: "client_secret" });
		}
		if self.bot_token.is_blank() {
			return Err(ConfigError::MissingSetting { name: "bot_token" });
		}
		if self.database_url.as_ref().is_some_and(TokenSecret::is_blank) {
			return Err(ConfigError::MissingSetting { name: "database_url" });
		}

		for (name, path) in
			[("callback_path", &self.callback_path), ("start_path", &self.start_path)]
		{
			if !path.starts_with('/') || path.len() < 2 {
				return Err(ConfigError::MissingSetting { name });
			}
		}

		Ok(())
	}

	/// Provider endpoints derived from `api_base` and `authorize_url`.
	pub fn endpoints(&self) -> Result<ProviderEndpoints, ConfigError> {
		let mut api_base = self.api_base.clone();

		if !api_base.path().ends_with('/') {
			let path = format!("{}/", api_base.path());

			api_base.set_path(&path);
		}

		let token = api_base.join("oauth2/token").map_err(|source| {
			ConfigError::InvalidEndpointPath { path: "oauth2/token".into(), source }
		})?;

		Ok(ProviderEndpoints::builder()
			.authorization_endpoint(self.authorize_url.clone())
			.api_base(api_base)
			.token_endpoint(token)
			.build()?)
	}

	/// Credentials handed to the verifier.
	pub fn credentials(&self) -> VerifierCredentials {
		VerifierCredentials {
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
			bot_token: self.bot_token.clone(),
			redirect_uri: self.redirect_uri.clone(),
		}
	}

	fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
		let config: Self = builder.build()?.try_deserialize()?;

		config.validate()?;

		Ok(config)
	}
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
	Ok(Config::builder()
		.set_default("api_base", DEFAULT_API_BASE)?
		.set_default("authorize_url", DEFAULT_AUTHORIZATION_ENDPOINT)?
		.set_default("bind_addr", DEFAULT_BIND_ADDR)?
		.set_default("callback_path", DEFAULT_CALLBACK_PATH)?
		.set_default("start_path", DEFAULT_START_PATH)?
		.set_default("log_filter", DEFAULT_LOG_FILTER)?)
}
