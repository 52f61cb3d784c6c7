//! Credential values that stay out of logs.

// crates.io
use reqwest::header::HeaderValue;
// self
use crate::_prelude::*;

const REDACTED: &str = "<redacted>";

/// Bearer token or password whose formatters never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Renders the secret for logs, revealing it only when `hide` is `false`.
	pub fn loggable(&self, hide: bool) -> &str {
		if hide { REDACTED } else { self.expose() }
	}

	/// Builds an `Authorization: Bearer` value flagged as sensitive.
	///
	/// Returns `None` when the token holds bytes a header cannot carry.
	pub fn bearer_header(&self) -> Option<HeaderValue> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0)).ok()?;

		value.set_sensitive(true);

		Some(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret({REDACTED})")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(REDACTED)
	}
}
