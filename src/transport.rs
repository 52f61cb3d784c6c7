//! Request executor: the single choke point every API call passes through.
//!
//! Each call runs the same pipeline:
//!
//! 1. Tighten the caller's [`RequestContext`] with the transport's total retry budget.
//! 2. Wait for a concurrency slot; the [`SlotPermit`](crate::concurrency::SlotPermit) releases
//!    it on every exit path.
//! 3. Per attempt, fetch a live bearer token, merge global and per-call headers, and send.
//!    Idempotent methods are retried on network failures, 429, and transient 5xx responses
//!    with jittered exponential backoff.
//! 4. Normalize non-2xx responses into [`ApiError`](crate::error::ApiError), warn on
//!    deprecation headers and unexpected content types, and decode the body.
//! 5. After a success, pause for the mandatory delay and then for the adaptive delay.
//!
//! Every suspension point races the call's context, so a deadline or cancellation stops the
//! call promptly.

mod builder;
mod failure;
mod request;

pub use builder::*;
pub use request::*;

pub(crate) use failure::truncate_preview;

// crates.io
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::{TokenManager, TokenSecret},
	concurrency::ConcurrencyLimiter,
	config::AuthConfig,
	context::RequestContext,
	error::{CancelStage, ConfigError, TransportError},
	http::{self, ResponseMetadata},
	obs::{self, FlowOutcome, FlowSpan},
	retry::{self, AttemptOutcome, RetryPolicy},
	rsql::RsqlBuilder,
	throttle::AdaptiveRateController,
};

/// Shared Jamf Pro HTTP transport.
///
/// Cheap to clone; clones share the token, the concurrency slots, and the latency estimate.
#[derive(Clone)]
pub struct Transport {
	inner: Arc<TransportInner>,
}
impl Transport {
	/// Returns a builder for a transport authenticating with `auth`.
	pub fn builder(auth: AuthConfig) -> TransportBuilder {
		TransportBuilder::new(auth)
	}

	/// Returns the authentication configuration.
	pub fn auth_config(&self) -> &AuthConfig {
		self.inner.auth.config()
	}

	/// Returns the token manager.
	pub fn token_manager(&self) -> &TokenManager {
		&self.inner.auth
	}

	/// Returns the concurrency limiter.
	pub fn limiter(&self) -> &ConcurrencyLimiter {
		&self.inner.limiter
	}

	/// Returns the adaptive throttle.
	pub fn throttle(&self) -> &AdaptiveRateController {
		&self.inner.throttle
	}

	/// Returns the retry policy.
	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.inner.retry_policy
	}

	/// Returns a fresh RSQL filter builder.
	pub fn rsql(&self) -> RsqlBuilder {
		RsqlBuilder::new()
	}

	/// Revokes the current token server-side and clears it locally.
	pub async fn invalidate_token(&self) -> Result<()> {
		self.inner.auth.invalidate().await
	}

	/// Extends the current token's lifetime.
	pub async fn keep_alive_token(&self) -> Result<()> {
		self.inner.auth.keep_alive().await
	}

	/// Sends a GET and decodes the JSON body.
	pub async fn get<T>(&self, path: &str, opts: CallOptions) -> Result<ApiResponse<T>>
	where
		T: DeserializeOwned,
	{
		self.send_json(Method::GET, path, RequestBody::Empty, opts).await
	}

	/// Sends a GET and returns the raw body bytes.
	pub async fn get_bytes(&self, path: &str, opts: CallOptions) -> Result<ApiResponse<Vec<u8>>> {
		self.send(Method::GET, path, RequestBody::Empty, opts).await
	}

	/// Sends a POST with a JSON body and decodes the JSON response.
	pub async fn post<B, T>(
		&self,
		path: &str,
		body: &B,
		opts: CallOptions,
	) -> Result<ApiResponse<T>>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.send_json(Method::POST, path, RequestBody::json(body)?, opts).await
	}

	/// Sends a POST with a JSON body after appending `query` to the call's query pairs.
	pub async fn post_with_query<B, T>(
		&self,
		path: &str,
		query: Vec<(String, String)>,
		body: &B,
		opts: CallOptions,
	) -> Result<ApiResponse<T>>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.post(path, body, opts.query_pairs(query)).await
	}

	/// Sends a POST with an urlencoded form body.
	pub async fn post_form<T>(
		&self,
		path: &str,
		form: Vec<(String, String)>,
		opts: CallOptions,
	) -> Result<ApiResponse<T>>
	where
		T: DeserializeOwned,
	{
		self.send_json(Method::POST, path, RequestBody::Form(form), opts).await
	}

	/// Sends a POST with a multipart body.
	pub async fn post_multipart<T>(
		&self,
		path: &str,
		multipart: Multipart,
		opts: CallOptions,
	) -> Result<ApiResponse<T>>
	where
		T: DeserializeOwned,
	{
		self.send_json(Method::POST, path, RequestBody::Multipart(multipart), opts).await
	}

	/// Sends a PUT with a JSON body.
	pub async fn put<B, T>(
		&self,
		path: &str,
		body: &B,
		opts: CallOptions,
	) -> Result<ApiResponse<T>>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.send_json(Method::PUT, path, RequestBody::json(body)?, opts).await
	}

	/// Sends a PATCH with a JSON body.
	pub async fn patch<B, T>(
		&self,
		path: &str,
		body: &B,
		opts: CallOptions,
	) -> Result<ApiResponse<T>>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.send_json(Method::PATCH, path, RequestBody::json(body)?, opts).await
	}

	/// Sends a DELETE without a body.
	pub async fn delete<T>(&self, path: &str, opts: CallOptions) -> Result<ApiResponse<T>>
	where
		T: DeserializeOwned,
	{
		self.send_json(Method::DELETE, path, RequestBody::Empty, opts).await
	}

	/// Sends a DELETE carrying a JSON body (bulk deletions).
	pub async fn delete_with_body<B, T>(
		&self,
		path: &str,
		body: &B,
		opts: CallOptions,
	) -> Result<ApiResponse<T>>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.send_json(Method::DELETE, path, RequestBody::json(body)?, opts).await
	}

	/// Sends any request and decodes the JSON response; an empty body decodes as `null`.
	pub async fn send_json<T>(
		&self,
		method: Method,
		path: &str,
		body: RequestBody,
		opts: CallOptions,
	) -> Result<ApiResponse<T>>
	where
		T: DeserializeOwned,
	{
		let response = self.send(method, path, body, opts).await?;
		let decoded = decode(path, &response.body)?;

		Ok(ApiResponse { metadata: response.metadata, body: decoded })
	}

	/// Sends any request through the full pipeline and returns the raw body.
	pub async fn send(
		&self,
		method: Method,
		path: &str,
		body: RequestBody,
		opts: CallOptions,
	) -> Result<ApiResponse<Vec<u8>>> {
		let span = FlowSpan::request(&method, path);

		obs::record_request_outcome(&method, FlowOutcome::Attempt);

		let result = span.instrument(self.execute(&method, path, &body, &opts)).await;

		match &result {
			Ok(_) => obs::record_request_outcome(&method, FlowOutcome::Success),
			Err(err) => {
				obs::record_request_outcome(&method, FlowOutcome::Failure);
				tracing::debug!(%method, endpoint = path, error = %err, "Request failed.");
			},
		}

		result
	}

	async fn execute(
		&self,
		method: &Method,
		path: &str,
		body: &RequestBody,
		opts: &CallOptions,
	) -> Result<ApiResponse<Vec<u8>>> {
		let endpoint = self.auth_config().resolve(path)?;
		let ctx = match self.inner.total_retry_duration {
			Some(budget) => opts.context.tightened(budget),
			None => opts.context.clone(),
		};
		let _permit = self
			.inner
			.limiter
			.acquire(&ctx)
			.await
			.map_err(|reason| Error::Cancelled { stage: CancelStage::ConcurrencySlot, reason })?;
		let started = Instant::now();
		let Received { status, headers, bytes, latency } = ctx
			.run(self.attempt_loop(method, path, &endpoint, body, opts, &ctx))
			.await
			.map_err(|reason| Error::Cancelled { stage: CancelStage::InFlight, reason })??;
		let metadata = ResponseMetadata {
			status: status.as_u16(),
			headers,
			elapsed: started.elapsed(),
			latency,
		};

		if let Some(notice) = metadata.deprecation() {
			tracing::warn!(
				%method,
				endpoint = path,
				deprecation = %notice.deprecation,
				sunset = notice.sunset.as_deref().unwrap_or("unspecified"),
				"Endpoint is deprecated."
			);
		}
		if !status.is_success() {
			return Err(failure::api_error(method, path, status, &bytes).into());
		}

		check_content_type(method, path, &metadata, &bytes);
		self.pace(&ctx, metadata.latency).await;

		Ok(ApiResponse { metadata, body: bytes })
	}

	/// Attempts the call until it succeeds, fails definitively, or runs out of retries.
	///
	/// Only the final attempt is timed; earlier attempts and backoff waits are not server
	/// latency.
	async fn attempt_loop(
		&self,
		method: &Method,
		path: &str,
		endpoint: &Url,
		body: &RequestBody,
		opts: &CallOptions,
		ctx: &RequestContext,
	) -> Result<Received> {
		let mut retries = 0;

		loop {
			let token = self.inner.auth.token().await?;
			let request = self.prepare(method, endpoint, body, opts, &token)?;
			let sent = Instant::now();
			let result = request.send().await;
			let outcome = match &result {
				Ok(response) => AttemptOutcome::Status(response.status()),
				Err(_) => AttemptOutcome::NoResponse,
			};

			if retry::should_retry(method, outcome) && self.inner.retry_policy.has_budget(retries) {
				let wait = self.inner.retry_policy.backoff(retries);

				if ctx.remaining().is_none_or(|remaining| remaining >= wait) {
					drop(result);

					retries += 1;
					obs::record_request_outcome(method, FlowOutcome::Retry);
					tracing::debug!(
						%method,
						endpoint = path,
						?outcome,
						retry = retries,
						wait_ms = wait.as_millis() as u64,
						"Retrying request."
					);
					ctx.sleep_within(wait).await;

					continue;
				}

				tracing::debug!(%method, endpoint = path, "Deadline leaves no room for another retry.");
			}

			let response = result.map_err(|e| TransportError::network(method, path, e))?;
			let status = response.status();
			let headers = response.headers().clone();
			let bytes =
				response.bytes().await.map_err(|e| TransportError::network(method, path, e))?;

			let latency = sent.elapsed();

			return Ok(Received { status, headers, bytes: bytes.to_vec(), latency });
		}
	}

	fn prepare(
		&self,
		method: &Method,
		endpoint: &Url,
		body: &RequestBody,
		opts: &CallOptions,
		token: &TokenSecret,
	) -> Result<reqwest::RequestBuilder, ConfigError> {
		let mut headers = http::merge_headers(&self.inner.global_headers, &opts.headers);
		let bearer = token
			.bearer_header()
			.ok_or_else(|| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

		headers.insert(USER_AGENT, self.inner.user_agent.clone());
		headers.insert(AUTHORIZATION, bearer);

		let mut request = self.inner.http_client.request(method.clone(), endpoint.clone());

		if !opts.query.is_empty() {
			request = request.query(&opts.query);
		}

		body.apply(request.headers(headers))
	}

	/// Post-success pauses: the mandatory delay, then the adaptive delay. A pause that would
	/// outlive the call's deadline is skipped.
	async fn pace(&self, ctx: &RequestContext, latency: Duration) {
		let mandatory = self.inner.mandatory_request_delay;

		if !mandatory.is_zero() && !ctx.sleep_within(mandatory).await {
			tracing::debug!(delay_ms = mandatory.as_millis() as u64, "Mandatory delay skipped.");
		}

		let adaptive = self.inner.throttle.record(latency);

		if adaptive.is_zero() {
			return;
		}

		tracing::debug!(
			latency_ms = latency.as_millis() as u64,
			delay_ms = adaptive.as_millis() as u64,
			"Throttling after a slow response."
		);

		if !ctx.sleep_within(adaptive).await {
			tracing::debug!("Adaptive delay skipped.");
		}
	}
}
impl Debug for Transport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Transport")
			.field("auth", &self.inner.auth)
			.field("limiter", &self.inner.limiter)
			.field("retry_policy", &self.inner.retry_policy)
			.field("total_retry_duration", &self.inner.total_retry_duration)
			.finish()
	}
}

struct TransportInner {
	http_client: ReqwestClient,
	auth: Arc<TokenManager>,
	limiter: ConcurrencyLimiter,
	throttle: AdaptiveRateController,
	retry_policy: RetryPolicy,
	global_headers: HeaderMap,
	user_agent: HeaderValue,
	mandatory_request_delay: Duration,
	total_retry_duration: Option<Duration>,
}

/// Final attempt of a call, before status normalization.
struct Received {
	status: StatusCode,
	headers: HeaderMap,
	bytes: Vec<u8>,
	latency: Duration,
}

fn decode<T>(endpoint: &str, bytes: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let input: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) { b"null" } else { bytes };

	serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(input))
		.map_err(|source| Error::Decode { endpoint: endpoint.to_owned(), source })
}

fn check_content_type(method: &Method, path: &str, metadata: &ResponseMetadata, bytes: &[u8]) {
	if bytes.is_empty() || metadata.declares_empty_body() {
		return;
	}

	match metadata.content_type() {
		Some(content_type) if http::is_structured_content_type(content_type) => {},
		content_type => tracing::warn!(
			%method,
			endpoint = path,
			content_type = content_type.unwrap_or("none"),
			"Unexpected response content type."
		),
	}
}
