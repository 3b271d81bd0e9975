//! Transport primitives shared by the token exchange client and the platform adapters.
//!
//! [`TokenHttpClient`] is the seam the OAuth facade depends on: implementations hand out
//! [`AsyncHttpClient`] handles that publish [`ResponseMetadata`] (status and, for failed
//! calls, a body preview) into a [`ResponseMetadataSlot`] so token endpoint failures can be
//! reported with the provider's own status and body. Implementations call
//! [`ResponseMetadataSlot::take`] before dispatching and [`ResponseMetadataSlot::store`]
//! once the response is known.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
// self
use crate::_prelude::*;

/// Maximum number of body bytes retained for diagnostics.
pub const BODY_PREVIEW_LIMIT: usize = 1024;

/// Abstraction over HTTP transports capable of executing OAuth token exchanges while
/// publishing response metadata.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// every concurrent verification, and the handles they return must own whatever state the
/// request future needs so that future stays `Send`.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Metadata captured from the most recent HTTP response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code, if a response was received.
	pub status: Option<u16>,
	/// Body preview for non-success responses, truncated to [`BODY_PREVIEW_LIMIT`] bytes.
	pub body: Option<String>,
}
impl ResponseMetadata {
	/// Builds metadata for a response, keeping the body only when the status is not 2xx.
	pub fn from_response(status: u16, body: &[u8]) -> Self {
		let body = if (200..300).contains(&status) { None } else { Some(body_preview(body)) };

		Self { status: Some(status), body }
	}
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token requests must not follow redirects; configure any custom client accordingly
/// before passing it to [`ReqwestHttpClient::with_client`].
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that never follows redirects.
	pub fn without_redirects() -> Result<Self, crate::error::ConfigError> {
		let client =
			ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`TokenHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let bytes = response.bytes().await.map_err(Box::new)?.to_vec();

			client.slot.store(ResponseMetadata::from_response(status.as_u16(), &bytes));

			let mut response_new = HttpResponse::new(bytes);

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Lossy UTF-8 preview of a response body, capped at [`BODY_PREVIEW_LIMIT`] bytes.
pub fn body_preview(body: &[u8]) -> String {
	let end = body.len().min(BODY_PREVIEW_LIMIT);

	String::from_utf8_lossy(&body[..end]).into_owned()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn metadata_keeps_body_only_for_failures() {
		let ok = ResponseMetadata::from_response(200, b"{\"access_token\":\"secret\"}");

		assert_eq!(ok.status, Some(200));
		assert_eq!(ok.body, None);

		let failed = ResponseMetadata::from_response(400, b"{\"error\":\"invalid_grant\"}");

		assert_eq!(failed.status, Some(400));
		assert_eq!(failed.body.as_deref(), Some("{\"error\":\"invalid_grant\"}"));
	}

	#[test]
	fn body_preview_truncates_long_payloads() {
		let payload = vec![b'a'; BODY_PREVIEW_LIMIT * 2];

		assert_eq!(body_preview(&payload).len(), BODY_PREVIEW_LIMIT);
	}

	#[test]
	fn slot_take_clears_previous_metadata() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(500), body: None });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(500));
		assert!(slot.take().is_none());
	}
}
