//! HTTP primitives shared by the token flows and the request executor.
//!
//! [`ResponseMetadata`] captures what callers need from a response after its body has been
//! consumed (status, headers, timings). [`InstrumentedHandle`] adapts reqwest to the
//! `oauth2` crate's [`AsyncHttpClient`] while publishing the observed status into a
//! [`ResponseMetadataSlot`], so token endpoint failures can be reported with the HTTP status
//! the `oauth2` error types do not carry.

// std
use std::time::Instant;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
// self
use crate::{_prelude::*, error::ConfigError};

/// `Deprecation` response header announced by endpoints scheduled for removal.
pub const DEPRECATION: HeaderName = HeaderName::from_static("deprecation");
/// `Sunset` response header carrying the removal date of a deprecated endpoint.
pub const SUNSET: HeaderName = HeaderName::from_static("sunset");

/// Metadata of a completed HTTP response.
#[derive(Clone, Debug)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Wall-clock time from the first attempt until the body was read, including retry waits.
	pub elapsed: Duration,
	/// Round trip of the final attempt alone, from send until the body was read.
	pub latency: Duration,
}
impl ResponseMetadata {
	/// Returns the `Content-Type` header as a string, if present and valid.
	pub fn content_type(&self) -> Option<&str> {
		self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
	}

	/// Returns `true` when the response explicitly declared an empty body.
	pub fn declares_empty_body(&self) -> bool {
		self.headers
			.get(CONTENT_LENGTH)
			.and_then(|value| value.to_str().ok())
			.is_some_and(|value| value.trim() == "0")
	}

	/// Returns the deprecation notice (`Deprecation` plus optional `Sunset`), if announced.
	pub fn deprecation(&self) -> Option<DeprecationNotice> {
		let deprecation = self.headers.get(DEPRECATION)?.to_str().ok()?.to_owned();
		let sunset = self
			.headers
			.get(SUNSET)
			.and_then(|value| value.to_str().ok())
			.map(ToOwned::to_owned);

		Some(DeprecationNotice { deprecation, sunset })
	}
}

/// Deprecation headers attached to a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeprecationNotice {
	/// Raw `Deprecation` header value.
	pub deprecation: String,
	/// Raw `Sunset` header value, when supplied.
	pub sunset: Option<String>,
}

/// Returns `true` for media types the API is expected to answer with (JSON or XML).
pub fn is_structured_content_type(content_type: &str) -> bool {
	let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

	essence == "application/json"
		|| essence == "application/xml"
		|| essence == "text/xml"
		|| essence.ends_with("+json")
		|| essence.ends_with("+xml")
}

/// Merges per-call headers over global headers; per-call values win on key collisions.
pub fn merge_headers(global: &HeaderMap, per_call: &HeaderMap) -> HeaderMap {
	let mut merged = global.clone();

	for name in per_call.keys() {
		merged.remove(name);
	}
	for (name, value) in per_call.iter() {
		merged.append(name.clone(), value.clone());
	}

	merged
}

/// Parses a `(name, value)` pair into typed header parts.
pub fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ConfigError> {
	let invalid = || ConfigError::InvalidHeader { name: name.to_owned() };
	let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
	let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;

	Ok((header_name, header_value))
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between the `oauth2` adapter and the
/// token flow that maps its errors.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// [`AsyncHttpClient`] handle for the `oauth2` crate that records response metadata.
///
/// Token requests do not follow redirects; the client passed in should be configured that
/// way (the transport builds its client with redirects disabled).
#[derive(Clone)]
pub struct InstrumentedHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
impl InstrumentedHandle {
	/// Wraps `client`, publishing outcomes into `slot`.
	pub fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self { client, slot }
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let started = Instant::now();
			let response = self
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(Box::new)?.to_vec();

			let elapsed = started.elapsed();

			self.slot.store(ResponseMetadata {
				status: status.as_u16(),
				headers: headers.clone(),
				elapsed,
				latency: elapsed,
			});

			let mut response_new = HttpResponse::new(body);

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
