//! Shared HTTP transport for the Jamf Pro API.
//!
//! [`transport::Transport`] is the single entry point. It keeps a bearer token alive, retries
//! idempotent calls, caps concurrent requests, and slows down when the server does. List
//! endpoints are walked page by page through [`pagination`], and [`rsql`] builds their filters.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod concurrency;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod pagination;
pub mod retry;
pub mod rsql;
pub mod throttle;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::{AuthConfig, AuthMethod},
		retry::RetryPolicy,
		transport::{Transport, TransportBuilder},
	};

	/// Builds an OAuth2 [`AuthConfig`] pointing at a mock server's base URL.
	pub fn oauth2_test_config(base_url: &str) -> AuthConfig {
		AuthConfig::builder(base_url)
			.auth_method(AuthMethod::OAuth2)
			.client_id("test-client")
			.client_secret("test-secret")
			.build()
			.expect("OAuth2 test configuration should be valid.")
	}

	/// Builds a Basic [`AuthConfig`] pointing at a mock server's base URL.
	pub fn basic_test_config(base_url: &str) -> AuthConfig {
		AuthConfig::builder(base_url)
			.auth_method(AuthMethod::Basic)
			.username("test-user")
			.password("test-password")
			.build()
			.expect("Basic test configuration should be valid.")
	}

	/// Returns a retry policy with millisecond waits so integration tests stay fast.
	pub fn fast_retry_policy() -> RetryPolicy {
		RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20))
	}

	/// Returns a transport builder with fast retries and no mandatory delay.
	pub fn test_transport_builder(config: AuthConfig) -> TransportBuilder {
		Transport::builder(config).retry_policy(fast_retry_policy())
	}

	/// Connects a transport built by [`test_transport_builder`].
	pub async fn connect_test_transport(config: AuthConfig) -> Transport {
		test_transport_builder(config)
			.connect()
			.await
			.expect("Test transport should connect to the mock server.")
	}
}

mod _prelude {
	pub use std::{
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError, Method, StatusCode};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
#[cfg(test)] use wiremock as _;
