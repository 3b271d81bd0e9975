//! Lazily established, process-wide connection handle.
//!
//! The first caller connects and every later caller reuses the retained handle. Concurrent
//! first callers wait on the in-flight initialization instead of racing to connect, and a
//! failed initialization leaves the cache empty so the next caller retries.

// crates.io
use async_lock::OnceCell;
// self
use crate::{_prelude::*, obs::obs_event, store::StoreError};

struct Cached<H> {
	uri: String,
	handle: H,
}

/// Single-flight cache for a cloneable connection handle (for example a pool).
pub struct ConnectionCache<H> {
	cell: OnceCell<Cached<H>>,
}
impl<H> ConnectionCache<H>
where
	H: Clone,
{
	/// Creates an empty cache; usable in `static` items.
	pub const fn new() -> Self {
		Self { cell: OnceCell::new() }
	}

	/// Returns the retained handle, connecting through `connect` on first use.
	///
	/// A retained handle is returned even when `uri` differs from the one it was created
	/// with; the mismatch is logged.
	pub async fn get_or_connect<F, Fut>(&self, uri: &str, connect: F) -> Result<H, StoreError>
	where
		F: FnOnce(String) -> Fut,
		Fut: Future<Output = Result<H, StoreError>>,
	{
		let cached = self
			.cell
			.get_or_try_init(|| async {
				let handle = connect(uri.to_owned()).await?;

				obs_event!(info, "Established store connection.");

				Ok::<_, StoreError>(Cached { uri: uri.to_owned(), handle })
			})
			.await?;

		if cached.uri != uri {
			obs_event!(
				warn,
				"Store connection already established for a different URI; reusing the existing handle."
			);
		}

		Ok(cached.handle.clone())
	}

	/// Returns the retained handle without connecting.
	pub fn get(&self) -> Option<H> {
		self.cell.get().map(|cached| cached.handle.clone())
	}
}
impl<H> Default for ConnectionCache<H>
where
	H: Clone,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<H> Debug for ConnectionCache<H> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectionCache").field("connected", &self.cell.is_initialized()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[tokio::test]
	async fn reuses_handle_without_reconnecting() {
		let cache = ConnectionCache::<Arc<String>>::new();
		let calls = AtomicUsize::new(0);
		let connect = |uri: String| {
			calls.fetch_add(1, Ordering::SeqCst);

			async move { Ok(Arc::new(uri)) }
		};
		let first =
			cache.get_or_connect("postgres://a", connect).await.expect("First connect should succeed.");
		let second = cache
			.get_or_connect("postgres://b", |uri: String| async move { Ok(Arc::new(uri)) })
			.await
			.expect("Cached handle should be returned.");

		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(second.as_str(), "postgres://a");
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failed_initialization_leaves_cache_empty() {
		let cache = ConnectionCache::<u32>::new();
		let err = cache
			.get_or_connect("postgres://down", |_| async {
				Err(StoreError::Backend { message: "refused".into() })
			})
			.await
			.expect_err("Connector failure should propagate.");

		assert_eq!(err, StoreError::Backend { message: "refused".into() });
		assert!(cache.get().is_none());

		let handle = cache
			.get_or_connect("postgres://down", |_| async { Ok(7) })
			.await
			.expect("Retry after failure should connect.");

		assert_eq!(handle, 7);
		assert_eq!(cache.get(), Some(7));
	}
}
