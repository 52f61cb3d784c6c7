//! Token manager: lazy refresh behind one async mutex, keep-alive, and invalidation.
//!
//! [`TokenManager::token`] holds the state mutex across the fetch, so concurrent callers that
//! find a stale token queue behind the one in-flight fetch and then reuse its result instead
//! of each hitting the token endpoint.

// crates.io
use reqwest::header::{AUTHORIZATION, HeaderValue};
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{AuthMetrics, IssuedToken, TokenSecret, TokenState},
	config::{AuthConfig, AuthMethod, Credentials},
	error::{AuthError, ConfigError},
	oauth::ClientCredentialsFacade,
	obs::{AuthFlow, FlowOutcome, FlowSpan},
};

/// Body returned by the Basic token exchange and keep-alive endpoints.
#[derive(Debug, Deserialize)]
struct BasicTokenBody {
	token: String,
	expires: String,
}

/// Owns one bearer token and the logic to fetch, refresh, extend, and revoke it.
pub struct TokenManager {
	config: Arc<AuthConfig>,
	http_client: ReqwestClient,
	state: AsyncMutex<TokenState>,
	metrics: Arc<AuthMetrics>,
}
impl TokenManager {
	/// Builds a manager and performs one synchronous fetch so bad credentials or an
	/// unreachable host surface immediately.
	pub async fn connect(config: AuthConfig, http_client: ReqwestClient) -> Result<Self> {
		let manager = Self::new(config, http_client);

		manager.token().await?;

		Ok(manager)
	}

	/// Builds a manager without contacting the token endpoint.
	pub fn new(config: AuthConfig, http_client: ReqwestClient) -> Self {
		Self {
			config: Arc::new(config),
			http_client,
			state: AsyncMutex::new(TokenState::empty()),
			metrics: Default::default(),
		}
	}

	/// Returns the validated configuration.
	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	/// Returns the fetch counters.
	pub fn metrics(&self) -> &AuthMetrics {
		&self.metrics
	}

	/// Returns the expiry of the cached token, if one is cached.
	pub async fn expires_at(&self) -> Option<OffsetDateTime> {
		let state = self.state.lock().await;

		state.is_authenticated().then(|| state.expires_at())
	}

	/// Returns a token guaranteed valid for at least the refresh buffer, fetching a new one
	/// when the cached token is missing, expired, or inside the buffer.
	pub async fn token(&self) -> Result<TokenSecret> {
		let mut state = self.state.lock().await;
		let now = OffsetDateTime::now_utc();

		if let Some(token) =
			state.token_at(now).filter(|_| !state.needs_refresh(now, self.config.refresh_buffer))
		{
			return Ok(token.clone());
		}

		let issued = self.fetch().await?;
		let token = issued.token.clone();

		tracing::debug!(
			method = %self.config.auth_method(),
			expires_at = %issued.expires_at,
			token = token.loggable(self.config.hide_sensitive_data),
			"Bearer token refreshed."
		);

		state.replace(issued);

		Ok(token)
	}

	/// Extends the cached token's lifetime through the keep-alive endpoint.
	pub async fn keep_alive(&self) -> Result<()> {
		const FLOW: AuthFlow = AuthFlow::KeepAlive;

		let mut state = self.state.lock().await;
		let current = state.current().cloned().ok_or(AuthError::NoActiveToken)?;
		let span = FlowSpan::new(FLOW, "keep_alive");

		self.metrics.record(FLOW, FlowOutcome::Attempt);

		let result: Result<IssuedToken> = span
			.instrument(async {
				let endpoint = self.config.resolve(&self.config.endpoints.keep_alive)?;
				let authorization = authorization(&current)?;

				self.exchange_basic_shape(
					self.http_client.post(endpoint.clone()).header(AUTHORIZATION, authorization),
					&endpoint,
				)
				.await
			})
			.await;

		match result {
			Ok(issued) => {
				self.metrics.record(FLOW, FlowOutcome::Success);
				tracing::debug!(expires_at = %issued.expires_at, "Bearer token extended.");
				state.replace(issued);

				Ok(())
			},
			Err(err) => {
				self.metrics.record(FLOW, FlowOutcome::Failure);

				Err(err)
			},
		}
	}

	/// Revokes the cached token server-side and clears it locally.
	///
	/// Local state is cleared whatever the server answers; the error only reports a revoke
	/// call that failed to reach the server or came back non-2xx. Without a cached token this
	/// succeeds without any I/O.
	pub async fn invalidate(&self) -> Result<()> {
		const FLOW: AuthFlow = AuthFlow::Invalidate;

		let mut state = self.state.lock().await;
		let Some(current) = state.current().cloned() else {
			return Ok(());
		};

		state.clear();

		let span = FlowSpan::new(FLOW, "invalidate");

		self.metrics.record(FLOW, FlowOutcome::Attempt);

		let result: Result<()> = span
			.instrument(async {
				let endpoint = self.config.resolve(&self.config.endpoints.invalidate)?;
				let response = self
					.http_client
					.post(endpoint.clone())
					.header(AUTHORIZATION, authorization(&current)?)
					.send()
					.await
					.map_err(|e| network(&endpoint, e))?;
				let status = response.status();

				if !status.is_success() {
					let message = response.text().await.unwrap_or_default();

					return Err(AuthError::Rejected {
						endpoint: endpoint.to_string(),
						status: Some(status.as_u16()),
						message: trimmed_message(&message, status),
					}
					.into());
				}

				Ok::<_, Error>(())
			})
			.await;

		match &result {
			Ok(()) => self.metrics.record(FLOW, FlowOutcome::Success),
			Err(_) => self.metrics.record(FLOW, FlowOutcome::Failure),
		}

		result
	}

	async fn fetch(&self) -> Result<IssuedToken> {
		let flow = AuthFlow::from(self.config.auth_method());
		let span = FlowSpan::new(flow, "fetch");

		self.metrics.record(flow, FlowOutcome::Attempt);

		let result: Result<IssuedToken> = span
			.instrument(async {
				match &self.config.credentials {
					Credentials::OAuth2 { client_id, client_secret } => {
						let endpoint = self.config.resolve(&self.config.endpoints.oauth2)?;
						let facade = ClientCredentialsFacade::new(
							endpoint,
							client_id,
							client_secret,
							self.http_client.clone(),
						)?;

						facade.exchange().await.map_err(Error::from)
					},
					Credentials::Basic { username, password } => {
						let endpoint = self.config.resolve(&self.config.endpoints.basic)?;

						self.exchange_basic_shape(
							self.http_client
								.post(endpoint.clone())
								.basic_auth(username, Some(password.expose())),
							&endpoint,
						)
						.await
					},
				}
			})
			.await;

		match &result {
			Ok(_) => {
				self.metrics.record(flow, FlowOutcome::Success);
			},
			Err(err) => {
				self.metrics.record(flow, FlowOutcome::Failure);
				tracing::warn!(
					method = %self.config.auth_method(),
					error = %err,
					"Token fetch failed."
				);
			},
		}

		result
	}

	/// Sends a request whose success body is `{token, expires}` (Basic exchange, keep-alive).
	async fn exchange_basic_shape(
		&self,
		request: reqwest::RequestBuilder,
		endpoint: &Url,
	) -> Result<IssuedToken> {
		let response = request.send().await.map_err(|e| network(endpoint, e))?;
		let status = response.status();
		let body = response.bytes().await.map_err(|e| network(endpoint, e))?;

		if !status.is_success() {
			return Err(AuthError::Rejected {
				endpoint: endpoint.to_string(),
				status: Some(status.as_u16()),
				message: trimmed_message(&String::from_utf8_lossy(&body), status),
			}
			.into());
		}

		let malformed = |reason: String| AuthError::MalformedResponse {
			endpoint: endpoint.to_string(),
			reason,
		};
		let parsed: BasicTokenBody =
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&body))
				.map_err(|e| malformed(e.to_string()))?;

		if parsed.token.is_empty() {
			return Err(malformed("empty token".into()).into());
		}

		let expires_at = OffsetDateTime::parse(parsed.expires.trim(), &Rfc3339)
			.map_err(|e| malformed(format!("unparseable expires `{}`: {e}", parsed.expires)))?;

		Ok(IssuedToken { token: TokenSecret::new(parsed.token), expires_at })
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("base_url", &self.config.base_url.as_str())
			.field("auth_method", &self.config.auth_method())
			.field("refresh_buffer", &self.config.refresh_buffer)
			.finish()
	}
}

impl From<AuthMethod> for AuthFlow {
	fn from(method: AuthMethod) -> Self {
		match method {
			AuthMethod::OAuth2 => AuthFlow::OAuth2,
			AuthMethod::Basic => AuthFlow::Basic,
		}
	}
}

fn authorization(token: &TokenSecret) -> Result<HeaderValue, ConfigError> {
	token
		.bearer_header()
		.ok_or_else(|| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })
}

fn network(endpoint: &Url, err: ReqwestError) -> Error {
	AuthError::Network { endpoint: endpoint.to_string(), source: Box::new(err) }.into()
}

fn trimmed_message(body: &str, status: StatusCode) -> String {
	let trimmed = body.trim();

	if trimmed.is_empty() {
		status.canonical_reason().unwrap_or("unknown status").to_owned()
	} else {
		crate::transport::truncate_preview(trimmed)
	}
}
