//! Token exchange client built on the `oauth2` crate.
//!
//! [`TokenExchangeClient`] trades a one-time authorization code for an access/refresh
//! token pair (`grant_type=authorization_code`, client credentials in the form body) and
//! builds the authorize URL users are sent to. Failures keep the provider's HTTP status
//! and body so operators can see why a code was rejected.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{GuildId, TokenSecret, UserId, VerificationRecord},
	error::{ConfigError, TokenExchangeError, TransportError},
	http::{
		ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient, body_preview,
	},
	provider::ProviderEndpoints,
};

/// Scopes requested when sending users to the authorize endpoint.
pub const VERIFY_SCOPES: &str = "identify guilds.join";

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Token pair returned by a successful authorization code exchange.
#[derive(Clone)]
pub struct TokenGrant {
	/// Access token used for identity and membership calls.
	pub access_token: TokenSecret,
	/// Refresh token persisted alongside the verification.
	pub refresh_token: TokenSecret,
	/// Provider-reported access token lifetime.
	pub expires_in: Duration,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
}
impl TokenGrant {
	/// Absolute expiry instant (`issued_at + expires_in`), clamped to the supported range.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at.saturating_add(self.expires_in)
	}

	/// Builds the record persisted for `user_id` in `guild_id`.
	pub fn into_record(self, user_id: UserId, guild_id: GuildId) -> Result<VerificationRecord> {
		VerificationRecord::builder(user_id, guild_id)
			.access_token(self.access_token)
			.refresh_token(self.refresh_token)
			.issued_at(self.issued_at)
			.expires_in(self.expires_in)
			.build()
			.map_err(|err| ConfigError::from(err).into())
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("expires_in", &self.expires_in)
			.field("issued_at", &self.issued_at)
			.finish()
	}
}

/// Confidential OAuth client that exchanges authorization codes.
pub struct TokenExchangeClient<C = ReqwestHttpClient>
where
	C: ?Sized + TokenHttpClient,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	client_id: String,
	redirect_uri: Url,
	authorization: Url,
}
impl<C> TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Builds a client for the provided endpoints and confidential credentials.
	pub fn new(
		endpoints: &ProviderEndpoints,
		client_id: &str,
		client_secret: &TokenSecret,
		redirect_uri: &Url,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.expose().to_owned()))
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			client_id: client_id.to_owned(),
			redirect_uri: redirect_uri.clone(),
			authorization: endpoints.authorization.clone(),
		})
	}

	/// Builds the authorize URL for `guild_id`, carried through the flow in `state`.
	pub fn authorize_url(&self, guild_id: &GuildId) -> Url {
		let mut url = self.authorization.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", &self.client_id);
		pairs.append_pair("redirect_uri", self.redirect_uri.as_str());
		pairs.append_pair("scope", VERIFY_SCOPES);
		pairs.append_pair("state", guild_id.as_ref());

		drop(pairs);

		url
	}

	/// Trades `code` for a token pair.
	pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err))?;

		map_token_response(response)
	}
}
impl<C> Debug for TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenExchangeClient")
			.field("client_id", &self.client_id)
			.field("redirect_uri", &self.redirect_uri)
			.finish()
	}
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = response
		.expires_in()
		.ok_or(TokenExchangeError::MissingField { field: "expires_in" })?
		.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| TokenExchangeError::InvalidExpiresIn)?;

	if expires_in <= 0 {
		return Err(TokenExchangeError::InvalidExpiresIn.into());
	}

	let expires_in = Duration::seconds(expires_in);
	let issued_at = OffsetDateTime::now_utc();

	issued_at.checked_add(expires_in).ok_or(TokenExchangeError::InvalidExpiresIn)?;

	let refresh_token = response
		.refresh_token()
		.ok_or(TokenExchangeError::MissingField { field: "refresh_token" })?
		.secret()
		.to_owned();
	let access_token = response.access_token().secret().to_owned();

	if access_token.is_empty() {
		return Err(TokenExchangeError::MissingField { field: "access_token" }.into());
	}

	Ok(TokenGrant {
		access_token: TokenSecret::new(access_token),
		refresh_token: TokenSecret::new(refresh_token),
		expires_in,
		issued_at,
	})
}

fn map_request_error<E>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	let status = meta.as_ref().and_then(|value| value.status);
	let body = meta.and_then(|value| value.body);

	match err {
		RequestTokenError::ServerResponse(response) =>
			TokenExchangeError::Rejected { reason: server_reason(&response), status, body }.into(),
		RequestTokenError::Request(error) => map_transport_error(error, status, body),
		RequestTokenError::Parse(source, raw) => match status {
			Some(code) if !(200..300).contains(&code) => TokenExchangeError::Rejected {
				reason: format!("HTTP {code}"),
				status,
				body: body.or_else(|| Some(body_preview(&raw))),
			}
			.into(),
			_ => TokenExchangeError::MalformedResponse {
				source,
				status,
				body: Some(body_preview(&raw)),
			}
			.into(),
		},
		RequestTokenError::Other(message) =>
			TokenExchangeError::Rejected { reason: message, status, body }.into(),
	}
}

fn server_reason(response: &BasicErrorResponse) -> String {
	match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	}
}

fn map_transport_error<E>(
	err: HttpClientError<E>,
	status: Option<u16>,
	body: Option<String>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) =>
			TokenExchangeError::from(TransportError::network(*inner)).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TokenExchangeError::from(TransportError::Io(inner)).into(),
		HttpClientError::Other(message) =>
			TokenExchangeError::Rejected { reason: message, status, body }.into(),
		_ => TokenExchangeError::Rejected {
			reason: "HTTP client error occurred while calling the token endpoint".into(),
			status,
			body,
		}
		.into(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn client() -> TokenExchangeClient {
		let endpoints = ProviderEndpoints::discord().expect("Default endpoints should parse.");
		let redirect =
			Url::parse("https://verify.example.com/callback").expect("Redirect should parse.");

		TokenExchangeClient::new(
			&endpoints,
			"client-id",
			&TokenSecret::new("secret"),
			&redirect,
			Arc::new(ReqwestHttpClient::default()),
		)
		.expect("Token exchange client should build.")
	}

	#[test]
	fn authorize_url_carries_guild_in_state() {
		let guild = GuildId::new("81384788765712384").expect("Guild fixture should be valid.");
		let url = client().authorize_url(&guild);
		let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

		assert!(url.as_str().starts_with("https://discord.com/oauth2/authorize?"));
		assert_eq!(pairs.get("response_type"), Some(&"code".into()));
		assert_eq!(pairs.get("client_id"), Some(&"client-id".into()));
		assert_eq!(
			pairs.get("redirect_uri"),
			Some(&"https://verify.example.com/callback".into())
		);
		assert_eq!(pairs.get("scope"), Some(&VERIFY_SCOPES.into()));
		assert_eq!(pairs.get("state"), Some(&"81384788765712384".into()));
	}

	#[test]
	fn grant_converts_into_record_with_expiry() {
		let grant = TokenGrant {
			access_token: TokenSecret::new("access"),
			refresh_token: TokenSecret::new("refresh"),
			expires_in: Duration::seconds(604_800),
			issued_at: time::macros::datetime!(2025-03-01 12:00 UTC),
		};
		let expected_expiry = grant.expires_at();
		let record = grant
			.into_record(
				UserId::new("1").expect("User fixture should be valid."),
				GuildId::new("2").expect("Guild fixture should be valid."),
			)
			.expect("Grant should convert into a record.");

		assert_eq!(record.expires_at, expected_expiry);
		assert_eq!(record.expires_at, time::macros::datetime!(2025-03-08 12:00 UTC));
		assert_eq!(record.refresh_token.expose(), "refresh");
	}

	#[test]
	fn grant_debug_redacts_tokens() {
		let grant = TokenGrant {
			access_token: TokenSecret::new("leak-me"),
			refresh_token: TokenSecret::new("leak-me-too"),
			expires_in: Duration::hours(1),
			issued_at: OffsetDateTime::now_utc(),
		};

		assert!(!format!("{grant:?}").contains("leak-me"));
	}
}
