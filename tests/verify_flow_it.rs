#![cfg(feature = "test")]

// crates.io
use httpmock::{Mock, prelude::*};
use serde_json::json;
// self
use guild_gate::{
	_preludet::*,
	auth::{GuildConfig, GuildId, RoleId, UserId, VerificationRecord},
	error::{ErrorCategory, TokenExchangeError},
	flows::{RoleOutcome, Step, StepStatus, VerificationRequest, Verifier},
	http::ReqwestHttpClient,
	store::{MemoryStore, StoreError, StoreFuture, VerificationStore},
};

const GUILD: &str = "81384788765712384";
const USER: &str = "80351110224678912";
const ROLE: &str = "41771983423143936";
const CHANNEL: &str = "319674150115610528";
const TOKEN_BODY: &str = "{\"access_token\":\"access-it\",\"refresh_token\":\"refresh-it\",\"token_type\":\"Bearer\",\"expires_in\":604800,\"scope\":\"identify guilds.join\"}";
const GUILD_MESSAGE: &str = "Hi Ferris the Crab, you have been verified in **Rustaceans**.";
const GENERIC_MESSAGE: &str = "Hi Ferris the Crab, your verification is complete.";

struct Upstream<'a> {
	token: Mock<'a>,
	identity: Mock<'a>,
	member: Mock<'a>,
	role: Mock<'a>,
	dm: Mock<'a>,
	message: Mock<'a>,
}

async fn mount<'a>(
	server: &'a MockServer,
	member_status: u16,
	role_status: u16,
	dm_status: u16,
	content: &str,
) -> Upstream<'a> {
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v10/oauth2/token")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "code-it");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let identity = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v10/users/@me").header("authorization", "Bearer access-it");
			then.status(200).json_body(json!({
				"id": USER,
				"username": "ferris",
				"global_name": "Ferris the Crab"
			}));
		})
		.await;
	let member = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path(format!("/api/v10/guilds/{GUILD}/members/{USER}"))
				.header("authorization", format!("Bot {TEST_BOT_TOKEN}"))
				.json_body(json!({ "access_token": "access-it" }));
			then.status(member_status).body("{\"message\":\"Missing Access\",\"code\":50001}");
		})
		.await;
	let role = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path(format!("/api/v10/guilds/{GUILD}/members/{USER}/roles/{ROLE}"))
				.header("authorization", format!("Bot {TEST_BOT_TOKEN}"));
			then.status(role_status);
		})
		.await;
	let dm = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v10/users/@me/channels")
				.json_body(json!({ "recipient_id": USER }));
			then.status(dm_status).json_body(json!({ "id": CHANNEL, "type": 1 }));
		})
		.await;
	let message = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(format!("/api/v10/channels/{CHANNEL}/messages"))
				.json_body(json!({ "content": content }));
			then.status(200).json_body(json!({ "id": "1" }));
		})
		.await;

	Upstream { token, identity, member, role, dm, message }
}

/// Store whose writes or guild lookups can be switched to fail.
struct FailingStore {
	inner: MemoryStore,
	fail_upsert: bool,
	fail_guild_lookup: bool,
}
impl FailingStore {
	fn unreachable() -> StoreError {
		StoreError::Backend { message: "database unreachable".into() }
	}
}
impl VerificationStore for FailingStore {
	fn upsert_verification(
		&self,
		record: VerificationRecord,
	) -> StoreFuture<'_, VerificationRecord> {
		if self.fail_upsert {
			return Box::pin(async { Err(Self::unreachable()) });
		}

		self.inner.upsert_verification(record)
	}

	fn fetch_verification<'a>(
		&'a self,
		user_id: &'a UserId,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<VerificationRecord>> {
		self.inner.fetch_verification(user_id, guild_id)
	}

	fn fetch_guild_config<'a>(
		&'a self,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<GuildConfig>> {
		if self.fail_guild_lookup {
			return Box::pin(async { Err(Self::unreachable()) });
		}

		self.inner.fetch_guild_config(guild_id)
	}
}

fn verifier_with_store(server: &MockServer, store: Arc<FailingStore>) -> Verifier {
	Verifier::with_http_client(
		store,
		test_endpoints(&server.base_url()),
		test_credentials(),
		ReqwestHttpClient::default(),
	)
	.expect("Verifier should build.")
}

fn request() -> VerificationRequest {
	VerificationRequest::from_query(Some("code-it"), Some(GUILD))
		.expect("Callback parameters should validate.")
}

fn seed_guild(store: &MemoryStore, name: Option<&str>) {
	let mut config = GuildConfig::new(GuildId::new(GUILD).expect("Guild fixture should be valid."))
		.with_verified_role(RoleId::new(ROLE).expect("Role fixture should be valid."));

	config.guild_name = name.map(str::to_owned);

	store.put_guild_config(config);
}

async fn has_record(store: &MemoryStore) -> bool {
	let user = UserId::new(USER).expect("User fixture should be valid.");
	let guild = GuildId::new(GUILD).expect("Guild fixture should be valid.");

	store.fetch_verification(&user, &guild).await.expect("Store lookup should succeed.").is_some()
}

#[tokio::test]
async fn successful_verification_records_user_and_runs_side_effects() {
	let server = MockServer::start_async().await;
	let upstream = mount(&server, 201, 204, 200, GUILD_MESSAGE).await;
	let (verifier, store) = build_test_verifier(&server.base_url());

	seed_guild(&store, Some("Rustaceans"));

	let started = OffsetDateTime::now_utc();
	let outcome = verifier.verify(request()).await.expect("Verification should succeed.");

	upstream.token.assert_calls_async(1).await;
	upstream.identity.assert_calls_async(1).await;
	upstream.member.assert_calls_async(1).await;
	upstream.role.assert_calls_async(1).await;
	upstream.dm.assert_calls_async(1).await;
	upstream.message.assert_calls_async(1).await;

	assert_eq!(outcome.identity.username, "Ferris the Crab");
	assert_eq!(outcome.guild_name.as_deref(), Some("Rustaceans"));
	assert_eq!(outcome.role, RoleOutcome::Assigned);
	assert!(outcome.notified);
	assert!(outcome.report.entries().iter().all(|entry| entry.status == StepStatus::Succeeded));
	assert_eq!(outcome.report.entries().len(), 6);

	let stored = store
		.fetch_verification(&outcome.record.user_id, &outcome.record.guild_id)
		.await
		.expect("Store lookup should succeed.")
		.expect("Record should be stored.");

	assert_eq!(stored.guild_id.as_ref(), GUILD);
	assert_eq!(stored.access_token.expose(), "access-it");
	assert_eq!(stored.refresh_token.expose(), "refresh-it");
	assert!(stored.verified_at >= started);
	assert!(stored.expires_at > started + Duration::days(6));
	assert_eq!(verifier.metrics.successes(), 1);
	assert_eq!(verifier.metrics.best_effort_failures(), 0);
}

#[tokio::test]
async fn repeated_verification_keeps_a_single_record() {
	let server = MockServer::start_async().await;
	let _upstream = mount(&server, 204, 204, 200, GENERIC_MESSAGE).await;
	let (verifier, store) = build_test_verifier(&server.base_url());
	let first = verifier.verify(request()).await.expect("First verification should succeed.");
	let second = verifier.verify(request()).await.expect("Second verification should succeed.");

	assert_eq!(store.len(), 1);
	assert!(second.record.verified_at >= first.record.verified_at);

	let stored = store
		.fetch_verification(&second.record.user_id, &second.record.guild_id)
		.await
		.expect("Store lookup should succeed.")
		.expect("Record should be stored.");

	assert_eq!(stored.verified_at, second.record.verified_at);
}

#[tokio::test]
async fn token_exchange_failure_aborts_before_membership() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v10/oauth2/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Invalid \\\"code\\\" in request.\"}");
		})
		.await;
	let member = server
		.mock_async(|when, then| {
			when.method(PUT).path(format!("/api/v10/guilds/{GUILD}/members/{USER}"));
			then.status(201);
		})
		.await;
	let (verifier, store) = build_test_verifier(&server.base_url());
	let err = verifier.verify(request()).await.expect_err("Rejected codes should fail.");

	token.assert_calls_async(1).await;
	member.assert_calls_async(0).await;

	assert_eq!(err.category(), ErrorCategory::FatalUpstream);
	assert_eq!(err.status_code(), 500);

	match err {
		Error::TokenExchange(inner) => {
			assert_eq!(inner.status(), Some(400));
			assert!(inner.body().is_some_and(|body| body.contains("invalid_grant")));
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	assert!(!has_record(&store).await);
	assert_eq!(verifier.metrics.failures(), 1);
}

#[tokio::test]
async fn token_response_without_refresh_token_is_rejected() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v10/oauth2/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-it\",\"token_type\":\"Bearer\",\"expires_in\":604800}");
		})
		.await;

	let (verifier, store) = build_test_verifier(&server.base_url());
	let err = verifier.verify(request()).await.expect_err("Missing refresh tokens should fail.");

	assert!(matches!(
		err,
		Error::TokenExchange(TokenExchangeError::MissingField { field: "refresh_token" })
	));
	assert!(store.is_empty());
}

#[tokio::test]
async fn identity_failure_aborts_before_membership() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v10/oauth2/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v10/users/@me");
			then.status(401).body("{\"message\":\"401: Unauthorized\",\"code\":0}");
		})
		.await;

	let member = server
		.mock_async(|when, then| {
			when.method(PUT).path(format!("/api/v10/guilds/{GUILD}/members/{USER}"));
			then.status(201);
		})
		.await;
	let (verifier, store) = build_test_verifier(&server.base_url());
	let err = verifier.verify(request()).await.expect_err("Identity failures should be fatal.");

	member.assert_calls_async(0).await;

	assert!(matches!(&err, Error::IdentityFetch(inner) if inner.status() == Some(401)));
	assert!(store.is_empty());
}

#[tokio::test]
async fn membership_failure_writes_no_record() {
	let server = MockServer::start_async().await;
	let upstream = mount(&server, 403, 204, 200, GENERIC_MESSAGE).await;
	let (verifier, store) = build_test_verifier(&server.base_url());

	seed_guild(&store, None);

	let err = verifier.verify(request()).await.expect_err("Membership failures should be fatal.");

	assert!(matches!(&err, Error::MembershipGrant(inner) if inner.status() == Some(403)));
	assert_eq!(err.status_code(), 500);
	assert!(store.is_empty());

	upstream.role.assert_calls_async(0).await;
	upstream.dm.assert_calls_async(0).await;
}

#[tokio::test]
async fn role_failure_still_records_and_notifies() {
	let server = MockServer::start_async().await;
	let upstream = mount(&server, 201, 403, 200, GUILD_MESSAGE).await;
	let (verifier, store) = build_test_verifier(&server.base_url());

	seed_guild(&store, Some("Rustaceans"));

	let outcome = verifier.verify(request()).await.expect("Role failures should be swallowed.");

	assert_eq!(outcome.role, RoleOutcome::Failed);
	assert!(outcome.notified);
	assert!(outcome.report.failed(Step::RoleAssignment));
	assert!(has_record(&store).await);
	assert_eq!(verifier.metrics.best_effort_failures(), 1);

	upstream.dm.assert_calls_async(1).await;
	upstream.message.assert_calls_async(1).await;
}

#[tokio::test]
async fn notification_failure_does_not_fail_verification() {
	let server = MockServer::start_async().await;
	let upstream = mount(&server, 201, 204, 403, GENERIC_MESSAGE).await;
	let (verifier, store) = build_test_verifier(&server.base_url());

	seed_guild(&store, None);

	let outcome =
		verifier.verify(request()).await.expect("Notification failures should be swallowed.");

	assert!(!outcome.notified);
	assert_eq!(outcome.role, RoleOutcome::Assigned);
	assert!(outcome.report.failed(Step::Notification));
	assert!(has_record(&store).await);

	upstream.message.assert_calls_async(0).await;
}

#[tokio::test]
async fn missing_guild_config_skips_role_and_uses_generic_message() {
	let server = MockServer::start_async().await;
	let upstream = mount(&server, 201, 204, 200, GENERIC_MESSAGE).await;
	let (verifier, _store) = build_test_verifier(&server.base_url());
	let outcome = verifier.verify(request()).await.expect("Verification should succeed.");

	assert_eq!(outcome.role, RoleOutcome::NotConfigured);
	assert_eq!(outcome.guild_name, None);
	assert_eq!(outcome.report.status(Step::RoleAssignment), Some(&StepStatus::Skipped));
	assert!(outcome.notified);

	upstream.role.assert_calls_async(0).await;
	upstream.message.assert_calls_async(1).await;
}

#[tokio::test]
async fn failed_upsert_aborts_before_side_effects() {
	let server = MockServer::start_async().await;
	let upstream = mount(&server, 201, 204, 200, GUILD_MESSAGE).await;
	let inner = MemoryStore::default();

	seed_guild(&inner, Some("Rustaceans"));

	let store = Arc::new(FailingStore { inner, fail_upsert: true, fail_guild_lookup: false });
	let verifier = verifier_with_store(&server, store.clone());
	let err = verifier.verify(request()).await.expect_err("Store failures should be fatal.");

	assert_eq!(err.category(), ErrorCategory::Persistence);
	assert_eq!(err.status_code(), 500);
	assert!(store.inner.is_empty());
	assert_eq!(verifier.metrics.failures(), 1);

	upstream.member.assert_calls_async(1).await;
	upstream.role.assert_calls_async(0).await;
	upstream.dm.assert_calls_async(0).await;
	upstream.message.assert_calls_async(0).await;
}

#[tokio::test]
async fn failed_guild_lookup_still_verifies_with_generic_message() {
	let server = MockServer::start_async().await;
	let upstream = mount(&server, 201, 204, 200, GENERIC_MESSAGE).await;
	let store = Arc::new(FailingStore {
		inner: MemoryStore::default(),
		fail_upsert: false,
		fail_guild_lookup: true,
	});
	let verifier = verifier_with_store(&server, store.clone());
	let outcome =
		verifier.verify(request()).await.expect("Guild lookup failures should be swallowed.");

	assert_eq!(outcome.role, RoleOutcome::Failed);
	assert_eq!(outcome.guild_name, None);
	assert!(outcome.notified);
	assert!(matches!(
		outcome.report.status(Step::RoleAssignment),
		Some(StepStatus::Failed { category: ErrorCategory::Persistence, .. })
	));
	assert_eq!(store.inner.len(), 1);

	upstream.role.assert_calls_async(0).await;
	upstream.message.assert_calls_async(1).await;
}
