//! OAuth 2.0 callback service that verifies chat platform users, adds them to a guild,
//! and records the verification durably, with best-effort role grants and notifications.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod platform;
pub mod provider;
pub mod render;
pub mod server;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::TokenSecret,
		flows::{Verifier, VerifierCredentials},
		http::ReqwestHttpClient,
		provider::ProviderEndpoints,
		store::{MemoryStore, VerificationStore},
	};

	/// OAuth client identifier used by test verifiers.
	pub const TEST_CLIENT_ID: &str = "client-it";
	/// OAuth client secret used by test verifiers.
	pub const TEST_CLIENT_SECRET: &str = "secret-it";
	/// Bot credential used by test verifiers.
	pub const TEST_BOT_TOKEN: &str = "bot-it";
	/// Redirect URI registered for test verifiers.
	pub const TEST_REDIRECT_URI: &str = "https://verify.example.com/callback";

	/// Builds provider endpoints that point every call at a mock server base URL
	/// (for example `httpmock::MockServer::base_url`).
	pub fn test_endpoints(base_url: &str) -> ProviderEndpoints {
		let api_base = Url::parse(&format!("{base_url}/api/v10/"))
			.expect("Mock API base URL should parse successfully.");
		let token = Url::parse(&format!("{base_url}/api/v10/oauth2/token"))
			.expect("Mock token endpoint should parse successfully.");
		let authorization = Url::parse(&format!("{base_url}/oauth2/authorize"))
			.expect("Mock authorization endpoint should parse successfully.");

		ProviderEndpoints::builder()
			.authorization_endpoint(authorization)
			.api_base(api_base)
			.token_endpoint(token)
			.build()
			.expect("Loopback endpoints should pass validation.")
	}

	/// Credentials shared by every test verifier.
	pub fn test_credentials() -> VerifierCredentials {
		VerifierCredentials {
			client_id: TEST_CLIENT_ID.into(),
			client_secret: TokenSecret::new(TEST_CLIENT_SECRET),
			bot_token: TokenSecret::new(TEST_BOT_TOKEN),
			redirect_uri: Url::parse(TEST_REDIRECT_URI)
				.expect("Test redirect URI should parse successfully."),
		}
	}

	/// Constructs a [`Verifier`] backed by an in-memory store and the reqwest transport,
	/// returning the store so tests can inspect persisted records.
	pub fn build_test_verifier(base_url: &str) -> (Verifier, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn VerificationStore> = store_backend.clone();
		let verifier = Verifier::with_http_client(
			store,
			test_endpoints(base_url),
			test_credentials(),
			ReqwestHttpClient::default(),
		)
		.expect("Test verifier should build.");

		(verifier, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(feature = "bin")] use color_eyre as _;
#[cfg(test)] use {httpmock as _, tower as _};
