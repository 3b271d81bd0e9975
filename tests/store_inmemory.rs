#![cfg(feature = "test")]

// std
use std::{
	env, fs, process,
	sync::atomic::{AtomicUsize, Ordering},
};
// crates.io
use time::macros;
// self
use guild_gate::{
	_preludet::*,
	auth::{GuildConfig, GuildId, RoleId, UserId, VerificationRecord},
	store::{ConnectionCache, FileStore, MemoryStore, StoreError, VerificationStore},
};

fn make_ids() -> (UserId, GuildId) {
	(
		UserId::new("80351110224678912").expect("Failed to build user identifier for store tests."),
		GuildId::new("81384788765712384")
			.expect("Failed to build guild identifier for store tests."),
	)
}

fn build_record(access: &str, added: &[&str]) -> VerificationRecord {
	let (user, guild) = make_ids();
	let issued = macros::datetime!(2025-11-10 12:00 UTC);

	VerificationRecord::builder(user, guild)
		.access_token(access)
		.refresh_token(format!("refresh-{access}"))
		.issued_at(issued)
		.expires_in(Duration::days(7))
		.added_servers(
			added.iter().map(|id| GuildId::new(*id).expect("Added guild fixture should be valid.")),
		)
		.build()
		.expect("Verification record fixture should build successfully.")
}

fn temp_path(label: &str) -> std::path::PathBuf {
	env::temp_dir().join(format!(
		"guild_gate_{label}_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos()
	))
}

async fn upsert_concurrently<S>(store: S, rounds: usize)
where
	S: VerificationStore + Clone + 'static,
{
	let tasks = (0..rounds)
		.map(|round| {
			let store = store.clone();

			tokio::spawn(async move {
				store
					.upsert_verification(build_record(&format!("access-{round}"), &[]))
					.await
					.expect("Concurrent upsert should succeed.")
			})
		})
		.collect::<Vec<_>>();

	for task in tasks {
		task.await.expect("Upsert task should not panic.");
	}
}

#[tokio::test]
async fn upsert_replaces_record_and_stamps_verification_time() {
	let store = MemoryStore::default();
	let (user, guild) = make_ids();
	let first = store
		.upsert_verification(build_record("access-1", &["175928847299117063"]))
		.await
		.expect("First upsert should succeed.");

	assert!(first.verified_at > macros::datetime!(2025-11-10 12:00 UTC));

	let second = store
		.upsert_verification(build_record("access-2", &[]))
		.await
		.expect("Second upsert should succeed.");
	let fetched = store
		.fetch_verification(&user, &guild)
		.await
		.expect("Fetching the record should succeed.")
		.expect("Record should remain present.");

	assert_eq!(store.len(), 1);
	assert_eq!(fetched.access_token.expose(), "access-2");
	assert_eq!(fetched.refresh_token.expose(), "refresh-access-2");
	assert_eq!(fetched.added_servers.len(), 1, "Empty lists keep the stored guilds.");
	assert!(second.verified_at >= first.verified_at);
}

#[tokio::test]
async fn missing_rows_and_guilds_are_absent() {
	let store = MemoryStore::default();
	let (user, guild) = make_ids();

	assert!(store.is_empty());
	assert!(
		store
			.fetch_verification(&user, &guild)
			.await
			.expect("Fetching an unknown record should succeed.")
			.is_none()
	);
	assert!(
		store
			.fetch_guild_config(&guild)
			.await
			.expect("Fetching an unknown guild should succeed.")
			.is_none()
	);

	let config = GuildConfig::new(guild.clone())
		.with_verified_role(RoleId::new("42").expect("Role fixture should be valid."))
		.with_guild_name("Rustaceans");

	store.put_guild_config(config.clone());

	assert_eq!(
		store.fetch_guild_config(&guild).await.expect("Fetching the guild should succeed."),
		Some(config)
	);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_memory_upserts_keep_a_single_row() {
	let store = MemoryStore::default();

	upsert_concurrently(store.clone(), 16).await;

	assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_file_upserts_keep_a_single_row() {
	let path = temp_path("concurrent");
	let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

	upsert_concurrently(store.clone(), 16).await;

	let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
	let (user, guild) = make_ids();
	let fetched = reopened
		.fetch_verification(&user, &guild)
		.await
		.expect("Fetching the persisted record should succeed.")
		.expect("Persisted record should be present.");

	assert!(fetched.access_token.expose().starts_with("access-"));

	let snapshot = fs::read_to_string(&path).expect("Snapshot should be readable.");
	let value: serde_json::Value =
		serde_json::from_str(&snapshot).expect("Snapshot should be valid JSON.");

	assert_eq!(value["verifications"].as_array().map(Vec::len), Some(1));

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
	});
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_callers_share_one_connection() {
	let cache = Arc::new(ConnectionCache::<Arc<String>>::new());
	let connects = Arc::new(AtomicUsize::new(0));
	let tasks = (0..8)
		.map(|_| {
			let cache = cache.clone();
			let connects = connects.clone();

			tokio::spawn(async move {
				cache
					.get_or_connect("postgres://verify", |uri| async move {
						connects.fetch_add(1, Ordering::SeqCst);
						tokio::time::sleep(std::time::Duration::from_millis(50)).await;

						Ok::<_, StoreError>(Arc::new(uri))
					})
					.await
					.expect("Connection should be established.")
			})
		})
		.collect::<Vec<_>>();
	let mut handles = Vec::new();

	for task in tasks {
		handles.push(task.await.expect("Connect task should not panic."));
	}

	assert_eq!(connects.load(Ordering::SeqCst), 1);
	assert!(handles.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}
