//! Cached bearer token and its expiry.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// A freshly issued token as returned by one of the acquisition flows.
#[derive(Clone, Debug)]
pub struct IssuedToken {
	/// Bearer token value.
	pub token: TokenSecret,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
}

/// Token cache owned by [`TokenManager`](crate::auth::TokenManager).
///
/// The token is `None` until the first successful fetch and after an invalidation. A cached
/// token is only handed out while the clock is before `expires_at`.
#[derive(Clone, Debug)]
pub struct TokenState {
	token: Option<TokenSecret>,
	expires_at: OffsetDateTime,
}
impl TokenState {
	/// Creates an unauthenticated state.
	pub fn empty() -> Self {
		Self { token: None, expires_at: OffsetDateTime::UNIX_EPOCH }
	}

	/// Returns the absolute expiry of the cached token.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Returns `true` when a token is cached, regardless of its freshness.
	pub fn is_authenticated(&self) -> bool {
		self.token.is_some()
	}

	/// Returns the cached token if it is still valid at `now`.
	pub fn token_at(&self, now: OffsetDateTime) -> Option<&TokenSecret> {
		self.token.as_ref().filter(|_| now < self.expires_at)
	}

	/// Returns the cached token without checking freshness.
	pub(crate) fn current(&self) -> Option<&TokenSecret> {
		self.token.as_ref()
	}

	/// Determines whether a refetch is required before handing out a token at `now`.
	///
	/// A refetch is required when nothing is cached, when the token already expired, or when
	/// it would expire within `buffer`.
	pub fn needs_refresh(&self, now: OffsetDateTime, buffer: Duration) -> bool {
		match &self.token {
			None => true,
			Some(token) if token.is_empty() => true,
			Some(_) => now >= self.expires_at || now + buffer >= self.expires_at,
		}
	}

	/// Replaces the cached token.
	pub fn replace(&mut self, issued: IssuedToken) {
		self.token = Some(issued.token);
		self.expires_at = issued.expires_at;
	}

	/// Drops the cached token.
	pub fn clear(&mut self) {
		*self = Self::empty();
	}
}
impl Default for TokenState {
	fn default() -> Self {
		Self::empty()
	}
}
