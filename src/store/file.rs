//! Simple file-backed [`VerificationStore`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{GuildConfig, GuildId, UserId, VerificationRecord},
	store::{StoreError, StoreFuture, StoreKey, VerificationStore, merge_upsert},
};

#[derive(Debug, Default)]
struct Contents {
	records: HashMap<StoreKey, VerificationRecord>,
	guilds: HashMap<GuildId, GuildConfig>,
}

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
	#[serde(default)]
	verifications: Vec<VerificationRecord>,
	#[serde(default)]
	guild_configs: Vec<GuildConfig>,
}

/// Persists verification records and guild settings to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Contents>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let contents = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(contents)) })
	}

	/// Seeds (or replaces) the settings of a guild and persists the snapshot.
	pub fn put_guild_config(&self, config: GuildConfig) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		guard.guilds.insert(config.guild_id.clone(), config);

		self.persist_locked(&guard)
	}

	fn load_snapshot(path: &Path) -> Result<Contents, StoreError> {
		if !path.exists() {
			return Ok(Contents::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(Contents::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let snapshot: Snapshot =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(Contents {
			records: snapshot
				.verifications
				.into_iter()
				.map(|record| (StoreKey::of(&record), record))
				.collect(),
			guilds: snapshot
				.guild_configs
				.into_iter()
				.map(|config| (config.guild_id.clone(), config))
				.collect(),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Contents) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot = Snapshot {
			verifications: contents.records.values().cloned().collect(),
			guild_configs: contents.guilds.values().cloned().collect(),
		};
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl VerificationStore for FileStore {
	fn upsert_verification(
		&self,
		record: VerificationRecord,
	) -> StoreFuture<'_, VerificationRecord> {
		Box::pin(async move {
			let key = StoreKey::of(&record);
			let mut guard = self.inner.write();
			let stored = merge_upsert(guard.records.get(&key), record, OffsetDateTime::now_utc());
			let previous = guard.records.insert(key.clone(), stored.clone());

			if let Err(e) = self.persist_locked(&guard) {
				// Keep memory consistent with the file on failed writes.
				match previous {
					Some(previous) => guard.records.insert(key, previous),
					None => guard.records.remove(&key),
				};

				return Err(e);
			}

			Ok(stored)
		})
	}

	fn fetch_verification<'a>(
		&'a self,
		user_id: &'a UserId,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<VerificationRecord>> {
		Box::pin(async move {
			let key = StoreKey::new(user_id, guild_id);

			Ok(self.inner.read().records.get(&key).cloned())
		})
	}

	fn fetch_guild_config<'a>(
		&'a self,
		guild_id: &'a GuildId,
	) -> StoreFuture<'a, Option<GuildConfig>> {
		Box::pin(async move { Ok(self.inner.read().guilds.get(guild_id).cloned()) })
	}
}
