//! Human-facing pages returned by the callback and the confirmation message text.
//!
//! Rendering is pure: every function maps its inputs to a [`Page`] without touching the
//! network or the store. User-provided text is HTML-escaped; failure pages never carry
//! upstream detail.

/// Content type of every rendered page.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Rendered response page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
	/// HTTP status code.
	pub status: u16,
	/// Response content type.
	pub content_type: &'static str,
	/// Response body.
	pub body: String,
}
impl Page {
	fn html(status: u16, title: &str, message: &str) -> Self {
		let body = format!(
			"<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n<p>{message}</p>\n</body>\n</html>\n"
		);

		Self { status, content_type: HTML_CONTENT_TYPE, body }
	}
}

/// Page shown after a successful verification.
pub fn render_success(username: &str, guild_name: Option<&str>) -> Page {
	let username = escape_html(username);
	let message = match guild_name {
		Some(name) => format!(
			"Thanks, {username}! You have been verified in <strong>{}</strong>. You can close this window.",
			escape_html(name)
		),
		None => format!("Thanks, {username}! You have been verified. You can close this window."),
	};

	Page::html(200, "Verification complete", &message)
}

/// Page shown when a fatal step failed.
pub fn render_failure() -> Page {
	Page::html(
		500,
		"Verification failed",
		"Something went wrong while verifying your account. Please try again later.",
	)
}

/// Page shown when the callback is missing required parameters.
pub fn render_bad_request() -> Page {
	Page::html(
		400,
		"Invalid request",
		"The verification link is incomplete. Please restart the verification from the server.",
	)
}

/// Text of the direct-message confirmation.
pub fn confirmation_message(username: &str, guild_name: Option<&str>) -> String {
	match guild_name {
		Some(name) => format!("Hi {username}, you have been verified in **{name}**."),
		None => format!("Hi {username}, your verification is complete."),
	}
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());

	for c in value.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			_ => escaped.push(c),
		}
	}

	escaped
}
