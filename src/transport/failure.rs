//! Non-2xx response normalization.

// self
use crate::{
	_prelude::*,
	error::{ApiError, ApiErrorDetail},
};

/// Maximum number of characters kept from a free-text error body.
const BODY_PREVIEW_LIMIT: usize = 256;

/// Jamf Pro API error document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
	#[serde(default)]
	http_status: Option<u16>,
	#[serde(default)]
	errors: Vec<ApiErrorDetail>,
}

/// Builds an [`ApiError`] from a non-2xx response, decoding the structured error list when
/// present and falling back to a text preview (Classic API endpoints answer with HTML).
pub(crate) fn api_error(
	method: &Method,
	endpoint: &str,
	status: StatusCode,
	body: &[u8],
) -> ApiError {
	let reason = status.canonical_reason().unwrap_or("Unknown Status").to_owned();
	let (errors, message) = match serde_json::from_slice::<ErrorEnvelope>(body) {
		Ok(envelope) if !envelope.errors.is_empty() => {
			if envelope.http_status.is_some_and(|declared| declared != status.as_u16()) {
				tracing::debug!(
					declared = ?envelope.http_status,
					actual = status.as_u16(),
					"Error body status differs from the response status."
				);
			}

			let message = envelope
				.errors
				.iter()
				.filter_map(|detail| detail.description.as_deref())
				.collect::<Vec<_>>()
				.join("; ");

			(envelope.errors, (!message.is_empty()).then_some(message))
		},
		_ => (Vec::new(), text_summary(&String::from_utf8_lossy(body))),
	};

	ApiError {
		status: status.as_u16(),
		reason,
		method: method.to_string(),
		endpoint: endpoint.to_owned(),
		errors,
		message,
	}
}

/// Truncates `body` to the preview limit, appending an ellipsis when cut.
pub(crate) fn truncate_preview(body: &str) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body.to_owned();
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

fn text_summary(body: &str) -> Option<String> {
	let text = if body.trim_start().starts_with('<') { strip_markup(body) } else { body.to_owned() };
	let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

	(!collapsed.is_empty()).then(|| truncate_preview(&collapsed))
}

fn strip_markup(body: &str) -> String {
	let mut text = String::with_capacity(body.len());
	let mut in_tag = false;

	for ch in body.chars() {
		match ch {
			'<' => {
				in_tag = true;
				text.push(' ');
			},
			'>' if in_tag => in_tag = false,
			_ if !in_tag => text.push(ch),
			_ => {},
		}
	}

	text
}
