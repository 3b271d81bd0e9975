//! HTTP surface: the OAuth callback route and the route that starts a verification.
//!
//! Every error ends here. Validation failures render the 400 page; any fatal step failure
//! is logged with its detail and renders the generic 500 page.

// std
use std::io;
// crates.io
use axum::{
	Router,
	extract::{Query, State},
	http::{StatusCode, header::CONTENT_TYPE},
	response::{IntoResponse, Redirect, Response},
	routing::get,
};
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	auth::GuildId,
	flows::{VerificationRequest, Verifier},
	obs::obs_event,
	render::{self, Page},
};

/// Raw query of the callback route; both parameters may be absent.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackQuery {
	/// One-time authorization code.
	pub code: Option<String>,
	/// Target guild identifier.
	pub state: Option<String>,
}

/// Raw query of the start route.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StartQuery {
	/// Guild the user wants to be verified into.
	pub guild_id: Option<String>,
}

/// Builds the router serving `callback_path` and `start_path`.
pub fn router(verifier: Verifier, callback_path: &str, start_path: &str) -> Router {
	Router::new()
		.route(callback_path, get(callback))
		.route(start_path, get(start))
		.with_state(verifier)
}

/// Serves `router` on `listener` until Ctrl-C is received.
pub async fn serve(listener: TcpListener, router: Router) -> io::Result<()> {
	axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await
}

/// Runs one verification for raw callback parameters and renders the resulting page.
pub async fn handle_callback(verifier: &Verifier, code: Option<&str>, state: Option<&str>) -> Page {
	let request = match VerificationRequest::from_query(code, state) {
		Ok(request) => request,
		Err(err) => {
			obs_event!(warn, error = %err, "Rejected callback with invalid parameters.");

			#[cfg(not(feature = "tracing"))]
			let _ = err;

			return render::render_bad_request();
		},
	};

	match verifier.verify(request).await {
		Ok(outcome) =>
			render::render_success(&outcome.identity.username, outcome.guild_name.as_deref()),
		Err(err) => {
			obs_event!(
				error,
				category = err.category().as_str(),
				error = ?err,
				"Verification failed."
			);

			if err.status_code() == 400 {
				render::render_bad_request()
			} else {
				render::render_failure()
			}
		},
	}
}

impl IntoResponse for Page {
	fn into_response(self) -> Response {
		let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		(status, [(CONTENT_TYPE, self.content_type)], self.body).into_response()
	}
}

async fn callback(State(verifier): State<Verifier>, Query(query): Query<CallbackQuery>) -> Page {
	handle_callback(&verifier, query.code.as_deref(), query.state.as_deref()).await
}

async fn start(State(verifier): State<Verifier>, Query(query): Query<StartQuery>) -> Response {
	match query.guild_id.as_deref().map(str::trim).map(GuildId::new) {
		Some(Ok(guild_id)) => Redirect::to(verifier.authorize_url(&guild_id).as_str()).into_response(),
		_ => render::render_bad_request().into_response(),
	}
}

async fn shutdown_signal() {
	wait_for_shutdown(tokio::signal::ctrl_c()).await
}

async fn wait_for_shutdown<F>(signal: F)
where
	F: Future<Output = io::Result<()>>,
{
	if let Err(err) = signal.await {
		obs_event!(
			warn,
			error = %err,
			"Failed to listen for Ctrl-C; serving until the process is killed."
		);

		#[cfg(not(feature = "tracing"))]
		let _ = err;

		std::future::pending::<()>().await;
	}
}
