//! Verification error taxonomy shared by the pipeline, provider adapters, and stores.

// self
use crate::{_prelude::*, auth::IdentifierError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error produced while verifying a user.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Request parameters were missing or malformed.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Authorization code could not be traded for tokens.
	#[error(transparent)]
	TokenExchange(#[from] TokenExchangeError),
	/// Current-user lookup failed.
	#[error("Identity fetch failed: {0}")]
	IdentityFetch(#[source] UpstreamError),
	/// Guild membership could not be granted.
	#[error("Membership grant failed: {0}")]
	MembershipGrant(#[source] UpstreamError),
	/// Storage-layer failure.
	#[error("{0}")]
	Persistence(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Verified role could not be granted.
	#[error("Role assignment failed: {0}")]
	RoleAssignment(#[source] UpstreamError),
	/// Confirmation message could not be delivered.
	#[error("Notification failed: {0}")]
	Notification(#[source] UpstreamError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Classifies the error into the verification taxonomy.
	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::Validation(_) => ErrorCategory::Validation,
			Self::TokenExchange(_) | Self::IdentityFetch(_) | Self::MembershipGrant(_) =>
				ErrorCategory::FatalUpstream,
			Self::Persistence(_) => ErrorCategory::Persistence,
			Self::RoleAssignment(_) | Self::Notification(_) => ErrorCategory::BestEffort,
			Self::Config(_) => ErrorCategory::Configuration,
		}
	}

	/// HTTP status surfaced to the end user when this error reaches the response boundary.
	pub fn status_code(&self) -> u16 {
		match self.category() {
			ErrorCategory::Validation => 400,
			_ => 500,
		}
	}
}

/// Coarse error classes used for response mapping and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
	/// Missing or malformed request parameters.
	Validation,
	/// Token exchange, identity fetch, or membership grant failed.
	FatalUpstream,
	/// The store failed. Fatal for the record upsert; a failed guild settings read inside the
	/// role step keeps this category but is swallowed like any best-effort failure.
	Persistence,
	/// The role grant or the confirmation message failed upstream; never alters the outcome.
	BestEffort,
	/// Local configuration is invalid.
	Configuration,
}
impl ErrorCategory {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Validation => "validation",
			Self::FatalUpstream => "fatal_upstream",
			Self::Persistence => "persistence",
			Self::BestEffort => "best_effort",
			Self::Configuration => "configuration",
		}
	}
}
impl Display for ErrorCategory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request validation failures; raised before any external call.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// A required query parameter was absent or empty.
	#[error("Missing required query parameter `{name}`.")]
	MissingParameter {
		/// Parameter name.
		name: &'static str,
	},
	/// The `state` parameter does not carry a usable guild identifier.
	#[error("The state parameter is not a valid guild identifier.")]
	InvalidState(#[source] IdentifierError),
}

/// Token endpoint failures.
#[derive(Debug, ThisError)]
pub enum TokenExchangeError {
	/// Provider answered with an OAuth error or a non-success status.
	#[error("Token endpoint rejected the authorization code: {reason}.")]
	Rejected {
		/// Provider-supplied reason (`error` / `error_description`).
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Raw response body, when available.
		body: Option<String>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Raw response body.
		body: Option<String>,
	},
	/// Token endpoint response omitted a required field.
	#[error("Token endpoint response is missing `{field}`.")]
	MissingField {
		/// Missing field name.
		field: &'static str,
	},
	/// Token endpoint returned a non-positive or oversized `expires_in`.
	#[error("The expires_in value is outside the supported range.")]
	InvalidExpiresIn,
	/// Transport failure while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl TokenExchangeError {
	/// HTTP status reported by the provider, if one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } | Self::MalformedResponse { status, .. } => *status,
			_ => None,
		}
	}

	/// Raw response body reported by the provider, if one was captured.
	pub fn body(&self) -> Option<&str> {
		match self {
			Self::Rejected { body, .. } | Self::MalformedResponse { body, .. } => body.as_deref(),
			_ => None,
		}
	}
}

/// Failures raised by the platform REST adapters.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Endpoint answered with a non-success status.
	#[error("The {endpoint} endpoint returned HTTP {status}.")]
	Status {
		/// Endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
		/// Response body, for operator diagnostics only.
		body: String,
	},
	/// Endpoint responded with a body that could not be decoded.
	#[error("The {endpoint} endpoint returned a malformed body.")]
	Decode {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Network failure while calling the endpoint.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Transport {
		/// Endpoint label.
		endpoint: &'static str,
		/// Underlying transport failure.
		#[source]
		source: TransportError,
	},
	/// Endpoint URL could not be derived from the API base.
	#[error("The {endpoint} endpoint URL could not be built.")]
	Endpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// Underlying configuration failure.
		#[source]
		source: ConfigError,
	},
}
impl UpstreamError {
	/// Wraps a transport failure for the provided endpoint label.
	pub fn transport(endpoint: &'static str, src: impl Into<TransportError>) -> Self {
		Self::Transport { endpoint, source: src.into() }
	}

	/// HTTP status reported by the endpoint, if one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } => Some(*status),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Token endpoint URL cannot be used by the OAuth client.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A platform endpoint path could not be joined onto the API base.
	#[error("Endpoint path `{path}` cannot be joined onto the API base URL.")]
	InvalidEndpointPath {
		/// Relative path that failed to join.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Provider endpoint set failed validation.
	#[error(transparent)]
	Endpoints(#[from] crate::provider::EndpointsError),
	/// Verification record builder validation failed.
	#[error("Unable to build verification record.")]
	RecordBuild(#[from] crate::auth::VerificationRecordBuilderError),
	/// A required setting is empty or missing.
	#[error("Setting `{name}` must not be empty.")]
	MissingSetting {
		/// Setting name.
		name: &'static str,
	},
	/// Settings sources could not be loaded or deserialized.
	#[error("Settings could not be loaded.")]
	Load(#[from] ::config::ConfigError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
