//! Transport-level error types shared across auth, the request executor, and pagination.

// self
use crate::{_prelude::*, http::ResponseMetadata};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for caller-supplied and transport-specific failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical transport error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Bearer token could not be obtained, extended, or revoked.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// No response was received (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The server answered with a non-2xx status.
	#[error(transparent)]
	Api(#[from] Box<ApiError>),
	/// The caller's context ended before the call completed.
	#[error("Request was abandoned while {stage}: {reason}.")]
	Cancelled {
		/// Where the call was suspended when the context ended.
		stage: CancelStage,
		/// Why the context ended.
		reason: CancelReason,
	},
	/// A successful response body could not be decoded into the requested type.
	#[error("Response body from {endpoint} could not be decoded.")]
	Decode {
		/// Endpoint that produced the body.
		endpoint: String,
		/// Structured decoding failure with the JSON path of the offending field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Caller-supplied page accumulation failed; pagination was aborted.
	#[error("Page merge failed after a response with status {}.", .response.status)]
	PageMerge {
		/// Failure returned by the merge callback.
		#[source]
		source: BoxError,
		/// Metadata of the last HTTP response received, kept for diagnostics.
		response: Box<ResponseMetadata>,
	},
}
impl Error {
	/// Returns the [`ApiError`] when the server rejected the request.
	pub fn as_api(&self) -> Option<&ApiError> {
		match self {
			Self::Api(e) => Some(e.as_ref()),
			_ => None,
		}
	}

	/// Returns `true` for HTTP 404 responses.
	pub fn is_not_found(&self) -> bool {
		self.as_api().is_some_and(ApiError::is_not_found)
	}

	/// Returns `true` for HTTP 401 responses.
	pub fn is_unauthorized(&self) -> bool {
		self.as_api().is_some_and(ApiError::is_unauthorized)
	}

	/// Returns `true` for HTTP 400 responses.
	pub fn is_bad_request(&self) -> bool {
		self.as_api().is_some_and(ApiError::is_bad_request)
	}

	/// Returns `true` for HTTP 5xx responses.
	pub fn is_server_error(&self) -> bool {
		self.as_api().is_some_and(ApiError::is_server_error)
	}

	/// Returns `true` when the client gave up rather than the server rejecting the call.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled { .. })
	}
}

impl From<ApiError> for Error {
	fn from(e: ApiError) -> Self {
		Self::Api(Box::new(e))
	}
}

/// Configuration and validation failures raised before any network activity.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequestBuild {
		/// Underlying builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL or endpoint path cannot be parsed.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL was not supplied.
	#[error("Instance base URL is required.")]
	MissingBaseUrl,
	/// Authentication method was not supplied.
	#[error("Authentication method is required.")]
	MissingAuthMethod,
	/// Authentication method is not one of the supported flows.
	#[error("Authentication method `{0}` is not supported; expected `oauth2` or `basic`.")]
	UnknownAuthMethod(String),
	/// A credential required by the selected flow is empty.
	#[error("The {method} flow requires a non-empty `{field}`.")]
	MissingCredential {
		/// Selected flow label.
		method: &'static str,
		/// Missing field name.
		field: &'static str,
	},
	/// Header name or value supplied in configuration is invalid.
	#[error("Header `{name}` is invalid.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a request construction failure inside [`ConfigError`].
	pub fn http_request_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpRequestBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token lifecycle failures. They fail the call in progress but never poison later calls.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// The token endpoint answered with a non-success status.
	#[error("Token endpoint `{endpoint}` rejected the request with status {status:?}: {message}.")]
	Rejected {
		/// Endpoint that rejected the request.
		endpoint: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Provider- or transport-supplied message.
		message: String,
	},
	/// The token endpoint answered 2xx with a body that does not carry a usable token.
	#[error("Token endpoint `{endpoint}` returned a malformed response: {reason}.")]
	MalformedResponse {
		/// Endpoint that produced the body.
		endpoint: String,
		/// What was wrong with the body.
		reason: String,
	},
	/// The token endpoint could not be reached.
	#[error("Network error occurred while calling the token endpoint `{endpoint}`.")]
	Network {
		/// Endpoint that could not be reached.
		endpoint: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Keep-alive was requested without a cached token.
	#[error("No active token is cached; nothing to keep alive.")]
	NoActiveToken,
}

/// Transport-level failures (network, IO) where no response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {method} {endpoint}.")]
	Network {
		/// HTTP method of the failed call.
		method: String,
		/// Endpoint of the failed call.
		endpoint: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		method: &Method,
		endpoint: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network {
			method: method.to_string(),
			endpoint: endpoint.into(),
			source: Box::new(src),
		}
	}
}

/// Where a call was suspended when its context ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelStage {
	/// Waiting for a concurrency slot.
	ConcurrencySlot,
	/// Fetching a token, exchanging HTTP, or backing off between attempts.
	InFlight,
}
impl Display for CancelStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::ConcurrencySlot => f.write_str("waiting for a concurrency limit slot"),
			Self::InFlight => f.write_str("in flight"),
		}
	}
}

/// Why a [`RequestContext`](crate::context::RequestContext) ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
	/// The deadline elapsed.
	Deadline,
	/// The cancellation token fired.
	Cancelled,
}
impl Display for CancelReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Deadline => f.write_str("deadline exceeded"),
			Self::Cancelled => f.write_str("context cancelled"),
		}
	}
}

/// One entry of the server's structured error list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
	/// Server error code (for example `INVALID_ID`).
	#[serde(default)]
	pub code: Option<String>,
	/// Human-readable description.
	#[serde(default)]
	pub description: Option<String>,
	/// Identifier of the offending object, when reported.
	#[serde(default)]
	pub id: Option<String>,
	/// Offending field, when reported.
	#[serde(default)]
	pub field: Option<String>,
}

/// Uniform failure representation for non-2xx responses.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{method} {endpoint} failed with {status} {reason}{}", summary_suffix(.message))]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Canonical reason phrase for the status.
	pub reason: String,
	/// Request method.
	pub method: String,
	/// Request endpoint (path relative to the instance).
	pub endpoint: String,
	/// Structured server errors, when the body carried any.
	pub errors: Vec<ApiErrorDetail>,
	/// Best-effort summary of the server's message.
	pub message: Option<String>,
}
impl ApiError {
	/// Returns `true` for HTTP 404.
	pub fn is_not_found(&self) -> bool {
		self.status == 404
	}

	/// Returns `true` for HTTP 401.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}

	/// Returns `true` for HTTP 400.
	pub fn is_bad_request(&self) -> bool {
		self.status == 400
	}

	/// Returns `true` for HTTP 429.
	pub fn is_rate_limited(&self) -> bool {
		self.status == 429
	}

	/// Returns `true` for HTTP 5xx.
	pub fn is_server_error(&self) -> bool {
		(500..600).contains(&self.status)
	}

	/// Returns the first server-supplied error code, if any.
	pub fn code(&self) -> Option<&str> {
		self.errors.iter().find_map(|e| e.code.as_deref())
	}
}

fn summary_suffix(message: &Option<String>) -> String {
	match message {
		Some(m) => format!(": {m}."),
		None => ".".into(),
	}
}
