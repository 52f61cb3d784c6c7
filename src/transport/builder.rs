//! Construction-time configuration for [`Transport`].

// crates.io
use reqwest::{
	header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
	redirect::Policy,
};
// self
use crate::{
	_prelude::*,
	auth::TokenManager,
	concurrency::ConcurrencyLimiter,
	config::AuthConfig,
	error::ConfigError,
	http,
	retry::RetryPolicy,
	throttle::AdaptiveRateController,
	transport::{Transport, TransportInner},
};

/// Builder for [`Transport`] instances.
///
/// Setters may be called in any order; a later call overrides an earlier one. Nothing is
/// validated until [`TransportBuilder::build`] or [`TransportBuilder::connect`].
#[derive(Clone, Debug)]
pub struct TransportBuilder {
	auth: AuthConfig,
	max_concurrent_requests: usize,
	mandatory_request_delay: Duration,
	total_retry_duration: Option<Duration>,
	retry_policy: RetryPolicy,
	timeout: Option<Duration>,
	user_agent: String,
	global_headers: Vec<(String, String)>,
	cookie_jar: bool,
	strict_release: bool,
	throttle_ceiling: Duration,
	http_client: Option<ReqwestClient>,
}
impl TransportBuilder {
	/// Default budget for one call including every retry.
	pub const DEFAULT_TOTAL_RETRY_DURATION: Duration = Duration::from_secs(60);
	/// Default per-attempt HTTP timeout.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

	/// Creates a builder with recommended defaults.
	pub fn new(auth: AuthConfig) -> Self {
		Self {
			auth,
			max_concurrent_requests: ConcurrencyLimiter::DEFAULT_CAPACITY,
			mandatory_request_delay: Duration::ZERO,
			total_retry_duration: Some(Self::DEFAULT_TOTAL_RETRY_DURATION),
			retry_policy: RetryPolicy::default(),
			timeout: Some(Self::DEFAULT_TIMEOUT),
			user_agent: default_user_agent(),
			global_headers: Vec::new(),
			cookie_jar: false,
			strict_release: false,
			throttle_ceiling: AdaptiveRateController::DEFAULT_CEILING,
			http_client: None,
		}
	}

	/// Caps simultaneous in-flight calls (`0` = unlimited; default 5).
	pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
		self.max_concurrent_requests = limit;

		self
	}

	/// Fixed pause after every successful call, applied before the adaptive delay.
	pub fn mandatory_request_delay(mut self, delay: Duration) -> Self {
		self.mandatory_request_delay = delay;

		self
	}

	/// Budget for one call including retries and backoff; `None` leaves calls bounded only by
	/// the caller's own context.
	pub fn total_retry_duration(mut self, budget: Option<Duration>) -> Self {
		self.total_retry_duration = budget;

		self
	}

	/// Overrides the retry budget and backoff schedule.
	pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Per-attempt HTTP timeout; `None` disables it.
	pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the `User-Agent` sent with every call.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Adds a header sent with every call unless a call overrides it.
	pub fn global_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.global_headers.push((name.into(), value.into()));

		self
	}

	/// Keeps cookies between calls (load-balancer stickiness).
	pub fn cookie_jar(mut self, enabled: bool) -> Self {
		self.cookie_jar = enabled;

		self
	}

	/// Logs a warning whenever a concurrency slot is released while none is held.
	pub fn strict_release(mut self, strict: bool) -> Self {
		self.strict_release = strict;

		self
	}

	/// Upper bound for the adaptive delay (default five seconds).
	pub fn throttle_ceiling(mut self, ceiling: Duration) -> Self {
		self.throttle_ceiling = ceiling;

		self
	}

	/// Uses a preconfigured reqwest client instead of building one; the timeout and cookie
	/// settings are then ignored. The client should not follow redirects.
	pub fn http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = Some(client);

		self
	}

	/// Validates the configuration and builds a transport without contacting the server; the
	/// first call fetches the token.
	pub fn build(self) -> Result<Transport> {
		let mut global_headers = HeaderMap::new();

		global_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		for (name, value) in &self.global_headers {
			let (name, value) = http::header_pair(name, value)?;

			global_headers.insert(name, value);
		}

		let user_agent = HeaderValue::from_str(&self.user_agent)
			.map_err(|_| ConfigError::InvalidHeader { name: USER_AGENT.to_string() })?;
		let http_client = match self.http_client {
			Some(client) => client,
			None => {
				let mut builder =
					ReqwestClient::builder().redirect(Policy::none()).cookie_store(self.cookie_jar);

				if let Some(timeout) = self.timeout {
					builder = builder.timeout(timeout);
				}

				builder.build().map_err(ConfigError::from)?
			},
		};
		let limiter = if self.strict_release {
			ConcurrencyLimiter::strict(self.max_concurrent_requests)
		} else {
			ConcurrencyLimiter::new(self.max_concurrent_requests)
		};

		tracing::debug!(
			base_url = %self.auth.base_url,
			auth_method = %self.auth.auth_method(),
			max_concurrent_requests = self.max_concurrent_requests,
			"Transport configured."
		);

		Ok(Transport {
			inner: Arc::new(TransportInner {
				auth: Arc::new(TokenManager::new(self.auth, http_client.clone())),
				http_client,
				limiter,
				throttle: AdaptiveRateController::new(self.throttle_ceiling),
				retry_policy: self.retry_policy,
				global_headers,
				user_agent,
				mandatory_request_delay: self.mandatory_request_delay,
				total_retry_duration: self.total_retry_duration,
			}),
		})
	}

	/// Builds the transport and fetches the first token, so bad credentials or an
	/// unreachable instance surface here rather than on the first call.
	pub async fn connect(self) -> Result<Transport> {
		let transport = self.build()?;

		transport.inner.auth.token().await?;

		Ok(transport)
	}
}

fn default_user_agent() -> String {
	format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
