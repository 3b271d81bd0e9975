//! REST adapters for the chat platform: identity lookup, guild membership, role grants,
//! and direct messages.
//!
//! Every call resolves against [`ProviderEndpoints::api_base`]. User-scoped calls use the
//! OAuth access token as a bearer credential; privileged calls use the bot credential.
//! Non-success responses surface as [`UpstreamError::Status`] with the body preserved for
//! operator logs.

// crates.io
use reqwest::{RequestBuilder, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{ChannelId, GuildId, RoleId, TokenSecret, UserId},
	error::UpstreamError,
	http::{ReqwestHttpClient, body_preview},
	provider::ProviderEndpoints,
};

/// Endpoint label for the current-user lookup.
pub const CURRENT_USER: &str = "current user";
/// Endpoint label for the guild membership grant.
pub const GUILD_MEMBER: &str = "guild member";
/// Endpoint label for the guild role grant.
pub const GUILD_MEMBER_ROLE: &str = "guild member role";
/// Endpoint label for opening a direct-message channel.
pub const DM_CHANNEL: &str = "dm channel";
/// Endpoint label for sending a channel message.
pub const CHANNEL_MESSAGE: &str = "channel message";

/// Authenticated user resolved from an access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
	/// Stable provider-assigned identifier.
	pub user_id: UserId,
	/// Display name (global display name when set, otherwise the account name).
	pub username: String,
}

/// Result of a membership grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipOutcome {
	/// The user joined the guild (HTTP 201).
	Added,
	/// The user was already a member (HTTP 204).
	AlreadyMember,
}

#[derive(Deserialize)]
struct CurrentUserPayload {
	id: UserId,
	username: String,
	#[serde(default)]
	global_name: Option<String>,
}

#[derive(Deserialize)]
struct ChannelPayload {
	id: ChannelId,
}

/// Client for the platform REST API.
#[derive(Clone, Debug)]
pub struct PlatformClient {
	http: ReqwestHttpClient,
	endpoints: ProviderEndpoints,
}
impl PlatformClient {
	/// Creates a client that resolves every call against `endpoints`.
	pub fn new(http: ReqwestHttpClient, endpoints: ProviderEndpoints) -> Self {
		Self { http, endpoints }
	}

	/// Fetches the user that owns `access_token`.
	pub async fn fetch_identity(
		&self,
		access_token: &TokenSecret,
	) -> Result<Identity, UpstreamError> {
		let url = self.url(CURRENT_USER, "users/@me")?;
		let request = self.http.get(url).header(AUTHORIZATION, access_token.bearer());
		let (_, body) = self.send(CURRENT_USER, request).await?;
		let payload: CurrentUserPayload = decode(CURRENT_USER, &body)?;
		let username = payload
			.global_name
			.filter(|name| !name.trim().is_empty())
			.unwrap_or(payload.username);

		Ok(Identity { user_id: payload.id, username })
	}

	/// Adds `user_id` to `guild_id` using the bot credential and the user's access token.
	pub async fn add_member(
		&self,
		guild_id: &GuildId,
		user_id: &UserId,
		access_token: &TokenSecret,
		bot_token: &TokenSecret,
	) -> Result<MembershipOutcome, UpstreamError> {
		let url = self.url(GUILD_MEMBER, &format!("guilds/{guild_id}/members/{user_id}"))?;
		let request = self
			.http
			.put(url)
			.header(AUTHORIZATION, bot_token.bot())
			.json(&serde_json::json!({ "access_token": access_token.expose() }));
		let (status, _) = self.send(GUILD_MEMBER, request).await?;

		Ok(if status == 204 { MembershipOutcome::AlreadyMember } else { MembershipOutcome::Added })
	}

	/// Grants `role_id` to `user_id` in `guild_id`.
	pub async fn add_role(
		&self,
		guild_id: &GuildId,
		user_id: &UserId,
		role_id: &RoleId,
		bot_token: &TokenSecret,
	) -> Result<(), UpstreamError> {
		let url = self.url(
			GUILD_MEMBER_ROLE,
			&format!("guilds/{guild_id}/members/{user_id}/roles/{role_id}"),
		)?;
		let request = self.http.put(url).header(AUTHORIZATION, bot_token.bot());

		self.send(GUILD_MEMBER_ROLE, request).await?;

		Ok(())
	}

	/// Opens (or reuses) a direct-message channel with `user_id`.
	pub async fn open_dm(
		&self,
		user_id: &UserId,
		bot_token: &TokenSecret,
	) -> Result<ChannelId, UpstreamError> {
		let url = self.url(DM_CHANNEL, "users/@me/channels")?;
		let request = self
			.http
			.post(url)
			.header(AUTHORIZATION, bot_token.bot())
			.json(&serde_json::json!({ "recipient_id": user_id.as_ref() }));
		let (_, body) = self.send(DM_CHANNEL, request).await?;
		let payload: ChannelPayload = decode(DM_CHANNEL, &body)?;

		Ok(payload.id)
	}

	/// Posts `content` into `channel_id`.
	pub async fn send_message(
		&self,
		channel_id: &ChannelId,
		content: &str,
		bot_token: &TokenSecret,
	) -> Result<(), UpstreamError> {
		let url = self.url(CHANNEL_MESSAGE, &format!("channels/{channel_id}/messages"))?;
		let request = self
			.http
			.post(url)
			.header(AUTHORIZATION, bot_token.bot())
			.json(&serde_json::json!({ "content": content }));

		self.send(CHANNEL_MESSAGE, request).await?;

		Ok(())
	}

	fn url(&self, endpoint: &'static str, path: &str) -> Result<Url, UpstreamError> {
		self.endpoints.resolve(path).map_err(|source| UpstreamError::Endpoint { endpoint, source })
	}

	async fn send(
		&self,
		endpoint: &'static str,
		request: RequestBuilder,
	) -> Result<(u16, Vec<u8>), UpstreamError> {
		let response =
			request.send().await.map_err(|err| UpstreamError::transport(endpoint, err))?;
		let status = response.status().as_u16();
		let body = response.bytes().await.map_err(|err| UpstreamError::transport(endpoint, err))?;

		if !(200..300).contains(&status) {
			return Err(UpstreamError::Status { endpoint, status, body: body_preview(&body) });
		}

		Ok((status, body.to_vec()))
	}
}

fn decode<T>(endpoint: &'static str, body: &[u8]) -> Result<T, UpstreamError>
where
	T: DeserializeOwned,
{
	let deserializer = &mut serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(deserializer)
		.map_err(|source| UpstreamError::Decode { endpoint, source })
}
