//! `guild-gate` service binary: loads settings, installs logging, opens the store, and serves
//! the verification routes.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use tokio::net::TcpListener;
// self
use guild_gate::{
	config::AppConfig,
	flows::Verifier,
	obs, server,
	store::{FileStore, MemoryStore, VerificationStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = AppConfig::load()?;

	obs::init_subscriber(&config.log_filter);

	let store = open_store(&config).await?;
	let verifier = Verifier::new(store, config.endpoints()?, config.credentials())?;
	let router = server::router(verifier, &config.callback_path, &config.start_path);
	let listener = TcpListener::bind(config.bind_addr).await?;

	tracing::info!(
		addr = %config.bind_addr,
		callback = %config.callback_path,
		start = %config.start_path,
		"Serving verification routes."
	);

	server::serve(listener, router).await?;

	Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn VerificationStore>> {
	if let Some(url) = &config.database_url {
		#[cfg(feature = "sqlx")]
		{
			let store = guild_gate::store::PgStore::connect(url.expose()).await?;

			store.migrate().await?;
			tracing::info!("Using the Postgres store.");

			return Ok(Arc::new(store));
		}
		#[cfg(not(feature = "sqlx"))]
		{
			let _ = url;

			return Err(color_eyre::eyre::eyre!(
				"database_url is set but the `sqlx` feature is disabled"
			));
		}
	}
	if let Some(path) = &config.store_path {
		tracing::info!(path = %path.display(), "Using the file store.");

		return Ok(Arc::new(FileStore::open(path)?));
	}

	tracing::warn!("No store configured; verification records are kept in memory only.");

	Ok(Arc::new(MemoryStore::default()))
}
