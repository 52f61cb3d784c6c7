//! Per-call inputs and outputs of the request executor.

// crates.io
use reqwest::{
	RequestBuilder,
	header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
	multipart::{Form, Part},
};
// self
use crate::{
	_prelude::*, context::RequestContext, error::ConfigError, http::ResponseMetadata,
	rsql::RsqlBuilder,
};

/// Per-call options: query pairs, headers layered over the global ones, and the cancellation
/// context.
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
	/// Query pairs appended to the URL in insertion order.
	pub query: Vec<(String, String)>,
	/// Headers that override global headers with the same name.
	pub headers: HeaderMap,
	/// Deadline and cancellation for this call.
	pub context: RequestContext,
}
impl CallOptions {
	/// Creates empty options with an unbounded context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends one query pair.
	pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Appends several query pairs.
	pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.query.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));

		self
	}

	/// Adds the RSQL `filter` pair unless `filter` is empty.
	pub fn filter(self, filter: RsqlBuilder) -> Self {
		match filter.into_query() {
			Some((key, value)) => self.query(key, value),
			None => self,
		}
	}

	/// Sets a per-call header, replacing an earlier value of the same name.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Replaces the call context.
	pub fn context(mut self, context: RequestContext) -> Self {
		self.context = context;

		self
	}

	/// Returns the last value supplied for `key`, if any.
	pub fn query_value(&self, key: &str) -> Option<&str> {
		self.query.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	/// Replaces every pair named `key` with a single `key=value` pair.
	pub fn set_query(&mut self, key: &str, value: impl ToString) {
		self.query.retain(|(k, _)| k != key);
		self.query.push((key.to_owned(), value.to_string()));
	}
}

/// Body of an outbound request.
///
/// Bodies are kept as owned data so every retry attempt can rebuild an identical request.
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
	/// No body.
	#[default]
	Empty,
	/// Pre-serialized JSON document.
	Json(Vec<u8>),
	/// Arbitrary bytes with an explicit content type (for example Classic API XML).
	Raw {
		/// Payload bytes.
		bytes: Vec<u8>,
		/// `Content-Type` to send.
		content_type: String,
	},
	/// `application/x-www-form-urlencoded` pairs.
	Form(Vec<(String, String)>),
	/// `multipart/form-data` fields and files.
	Multipart(Multipart),
}
impl RequestBody {
	/// Serializes `value` into a JSON body.
	pub fn json<T>(value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		Ok(Self::Json(serde_json::to_vec(value)?))
	}

	pub(crate) fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder, ConfigError> {
		Ok(match self {
			Self::Empty => request,
			Self::Json(bytes) => request
				.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
				.body(bytes.clone()),
			Self::Raw { bytes, content_type } => {
				let value = HeaderValue::from_str(content_type)
					.map_err(|_| ConfigError::InvalidHeader { name: CONTENT_TYPE.to_string() })?;

				request.header(CONTENT_TYPE, value).body(bytes.clone())
			},
			Self::Form(pairs) => request.form(pairs),
			Self::Multipart(multipart) => request.multipart(multipart.to_form()?),
		})
	}
}

/// Owned multipart payload.
#[derive(Clone, Debug, Default)]
pub struct Multipart {
	fields: Vec<(String, String)>,
	files: Vec<MultipartFile>,
}
impl Multipart {
	/// Creates an empty payload.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a text field.
	pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.fields.push((name.into(), value.into()));

		self
	}

	/// Adds a file part.
	pub fn file(mut self, file: MultipartFile) -> Self {
		self.files.push(file);

		self
	}

	fn to_form(&self) -> Result<Form, ConfigError> {
		let mut form = Form::new();

		for (name, value) in &self.fields {
			form = form.text(name.clone(), value.clone());
		}
		for file in &self.files {
			let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());

			if let Some(content_type) = &file.content_type {
				part = part.mime_str(content_type).map_err(ConfigError::http_request_build)?;
			}

			form = form.part(file.field.clone(), part);
		}

		Ok(form)
	}
}

/// One file inside a [`Multipart`] payload.
#[derive(Clone)]
pub struct MultipartFile {
	/// Form field name.
	pub field: String,
	/// File name reported to the server.
	pub file_name: String,
	/// Optional MIME type; reqwest's default applies when absent.
	pub content_type: Option<String>,
	/// File contents.
	pub bytes: Vec<u8>,
}
impl MultipartFile {
	/// Creates a file part without an explicit MIME type.
	pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
		Self { field: field.into(), file_name: file_name.into(), content_type: None, bytes }
	}

	/// Sets the MIME type.
	pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());

		self
	}
}
impl Debug for MultipartFile {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MultipartFile")
			.field("field", &self.field)
			.field("file_name", &self.file_name)
			.field("content_type", &self.content_type)
			.field("len", &self.bytes.len())
			.finish()
	}
}

/// Successful response: metadata plus the decoded body.
#[derive(Clone, Debug)]
pub struct ApiResponse<T> {
	/// Status, headers, and elapsed time.
	pub metadata: ResponseMetadata,
	/// Decoded body.
	pub body: T,
}
impl<T> ApiResponse<T> {
	/// Returns the HTTP status code.
	pub fn status(&self) -> u16 {
		self.metadata.status
	}

	/// Returns the response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.metadata.headers
	}

	/// Returns the body, discarding the metadata.
	pub fn into_body(self) -> T {
		self.body
	}

	/// Maps the body while keeping the metadata.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
		ApiResponse { metadata: self.metadata, body: f(self.body) }
	}
}
