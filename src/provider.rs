//! Provider endpoint set (REST API base + OAuth token endpoint) and its validated builder.
//!
//! Every outbound call made by the verifier resolves against [`ProviderEndpoints`], so
//! tests point the whole pipeline at a mock server by swapping the base URL. Endpoints
//! must use HTTPS; plain HTTP is accepted only for loopback hosts.

// self
use crate::{_prelude::*, error::ConfigError};

/// Default OAuth 2.0 authorization endpoint.
pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://discord.com/oauth2/authorize";
/// Default REST API base for the Discord v10 API.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10/";
/// Default OAuth 2.0 token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://discord.com/api/v10/oauth2/token";

/// Errors raised while constructing or validating endpoints.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum EndpointsError {
	/// Authorization endpoint is mandatory.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// REST API base URL is mandatory.
	#[error("Missing API base URL.")]
	MissingApiBase,
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTPS unless they target a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The API base cannot carry query strings or fragments.
	#[error("The API base URL must not contain a query or fragment: {url}.")]
	DecoratedApiBase {
		/// API base URL that failed validation.
		url: String,
	},
}

/// Validated endpoint set consumed by the token exchange client and platform adapters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// OAuth 2.0 authorization endpoint users are redirected to.
	pub authorization: Url,
	/// REST API base; always ends with `/` so relative paths join beneath it.
	pub api_base: Url,
	/// OAuth 2.0 token endpoint.
	pub token: Url,
}
impl ProviderEndpoints {
	/// Creates a new builder.
	pub fn builder() -> ProviderEndpointsBuilder {
		ProviderEndpointsBuilder::default()
	}

	/// Returns the production Discord endpoints.
	pub fn discord() -> Result<Self, ConfigError> {
		let authorization = Url::parse(DEFAULT_AUTHORIZATION_ENDPOINT).map_err(|source| {
			ConfigError::InvalidEndpointPath { path: DEFAULT_AUTHORIZATION_ENDPOINT.into(), source }
		})?;
		let api_base = Url::parse(DEFAULT_API_BASE).map_err(|source| {
			ConfigError::InvalidEndpointPath { path: DEFAULT_API_BASE.into(), source }
		})?;
		let token = Url::parse(DEFAULT_TOKEN_ENDPOINT)
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;

		Ok(Self { authorization, api_base, token })
	}

	/// Resolves a relative REST path (for example `users/@me`) beneath the API base.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		self.api_base
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidEndpointPath { path: path.to_owned(), source })
	}
}

/// Builder for [`ProviderEndpoints`] values.
#[derive(Debug, Default)]
pub struct ProviderEndpointsBuilder {
	/// Authorization endpoint URL.
	pub authorization_endpoint: Option<Url>,
	/// REST API base URL.
	pub api_base: Option<Url>,
	/// Token endpoint URL.
	pub token_endpoint: Option<Url>,
}
impl ProviderEndpointsBuilder {
	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the REST API base.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting endpoint set.
	pub fn build(self) -> Result<ProviderEndpoints, EndpointsError> {
		let authorization =
			self.authorization_endpoint.ok_or(EndpointsError::MissingAuthorizationEndpoint)?;
		let mut api_base = self.api_base.ok_or(EndpointsError::MissingApiBase)?;
		let token = self.token_endpoint.ok_or(EndpointsError::MissingTokenEndpoint)?;

		if api_base.query().is_some() || api_base.fragment().is_some() {
			return Err(EndpointsError::DecoratedApiBase { url: api_base.to_string() });
		}
		if !api_base.path().ends_with('/') {
			let path = format!("{}/", api_base.path());

			api_base.set_path(&path);
		}

		validate_endpoint("authorization", &authorization)?;
		validate_endpoint("api", &api_base)?;
		validate_endpoint("token", &token)?;

		Ok(ProviderEndpoints { authorization, api_base, token })
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), EndpointsError> {
	let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(EndpointsError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}
