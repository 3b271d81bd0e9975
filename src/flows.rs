//! Verification orchestration: the [`Verifier`] facade, the step runner, and the verify flow.

pub mod pipeline;
pub mod verify;

pub use pipeline::*;
pub use verify::*;

// self
use crate::{
	_prelude::*,
	auth::{GuildId, TokenSecret},
	http::ReqwestHttpClient,
	oauth::TokenExchangeClient,
	platform::PlatformClient,
	provider::ProviderEndpoints,
	store::VerificationStore,
};

/// Confidential credentials shared by every verification.
#[derive(Clone, Debug)]
pub struct VerifierCredentials {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret, sent in the token request body.
	pub client_secret: TokenSecret,
	/// Bot credential used for privileged guild operations.
	pub bot_token: TokenSecret,
	/// Redirect URI registered with the provider; must match the authorize request.
	pub redirect_uri: Url,
}

/// Coordinates a verification against one provider and one store.
///
/// The verifier owns the token exchange client, the platform adapters, and the store handle
/// so [`Verifier::verify`] can focus on step ordering and failure policy. Cloning is cheap;
/// every clone shares the same transport, store, and metrics.
#[derive(Clone)]
pub struct Verifier {
	/// Store receiving verification records and serving guild settings.
	pub store: Arc<dyn VerificationStore>,
	/// Shared counters for verification outcomes.
	pub metrics: Arc<VerifyMetrics>,
	exchange: Arc<TokenExchangeClient>,
	platform: PlatformClient,
	bot_token: TokenSecret,
}
impl Verifier {
	/// Creates a verifier that provisions its own reqwest transport (redirects disabled).
	pub fn new(
		store: Arc<dyn VerificationStore>,
		endpoints: ProviderEndpoints,
		credentials: VerifierCredentials,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::without_redirects()?;

		Self::with_http_client(store, endpoints, credentials, http_client)
	}

	/// Creates a verifier that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn VerificationStore>,
		endpoints: ProviderEndpoints,
		credentials: VerifierCredentials,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let exchange = TokenExchangeClient::<ReqwestHttpClient>::new(
			&endpoints,
			&credentials.client_id,
			&credentials.client_secret,
			&credentials.redirect_uri,
			http_client.clone(),
		)?;
		let platform = PlatformClient::new(http_client, endpoints);

		Ok(Self {
			store,
			metrics: Default::default(),
			exchange: Arc::new(exchange),
			platform,
			bot_token: credentials.bot_token,
		})
	}

	/// Builds the provider authorize URL that starts a verification for `guild_id`.
	pub fn authorize_url(&self, guild_id: &GuildId) -> Url {
		self.exchange.authorize_url(guild_id)
	}
}
impl Debug for Verifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Verifier")
			.field("exchange", &self.exchange)
			.field("platform", &self.platform)
			.field("bot_token", &self.bot_token)
			.finish()
	}
}
