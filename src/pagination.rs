//! Transparent pagination over `{ totalCount, results }` list endpoints.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::BoxError,
	http::ResponseMetadata,
	transport::{CallOptions, Transport},
};

/// Query key carrying the zero-based page index.
pub const PAGE_PARAM: &str = "page";
/// Query key carrying the page size.
pub const PAGE_SIZE_PARAM: &str = "page-size";
/// Page size used when the caller does not supply one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Page envelope returned by paged endpoints.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope {
	/// Total number of items across every page.
	#[serde(default)]
	pub total_count: u64,
	/// Items of this page, left undecoded for the caller.
	#[serde(default)]
	pub results: Vec<Value>,
}

/// Position of a paginated fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageCursor {
	/// Zero-based index of the next page to request.
	pub page: u32,
	/// Items requested per page.
	pub page_size: u32,
	/// Items merged so far.
	pub fetched: u64,
}
impl PageCursor {
	/// Starts at page zero.
	pub fn new(page_size: u32) -> Self {
		Self { page: 0, page_size: page_size.max(1), fetched: 0 }
	}

	/// Records a received page and returns whether another page should be requested.
	pub fn advance(&mut self, received: usize, total_count: u64) -> bool {
		self.fetched += received as u64;

		let exhausted = received == 0
			|| (u64::from(self.page) + 1) * u64::from(self.page_size) >= total_count;

		self.page += 1;

		!exhausted
	}
}

/// Drives repeated GETs against a paged endpoint.
#[derive(Clone, Debug)]
pub struct Paginator<'a> {
	transport: &'a Transport,
}
impl<'a> Paginator<'a> {
	/// Creates a paginator over `transport`.
	pub fn new(transport: &'a Transport) -> Self {
		Self { transport }
	}

	/// Fetches every page of `path`, handing each page's raw results to `merge_page`.
	///
	/// The caller's `page-size` query value is respected; any `page` value is replaced. The
	/// loop stops on an empty page or once the reported total is covered. A `merge_page`
	/// failure aborts immediately with [`Error::PageMerge`]. Returns the metadata of the last
	/// response.
	pub async fn fetch_all<F>(
		&self,
		path: &str,
		mut opts: CallOptions,
		mut merge_page: F,
	) -> Result<ResponseMetadata>
	where
		F: FnMut(Vec<Value>) -> Result<(), BoxError>,
	{
		let mut cursor = PageCursor::new(page_size(&opts));

		opts.set_query(PAGE_SIZE_PARAM, cursor.page_size);

		loop {
			opts.set_query(PAGE_PARAM, cursor.page);

			let response = self.transport.get::<PageEnvelope>(path, opts.clone()).await?;
			let envelope = response.body;
			let received = envelope.results.len();

			tracing::debug!(
				endpoint = path,
				page = cursor.page,
				received,
				total_count = envelope.total_count,
				"Page fetched."
			);

			if let Err(source) = merge_page(envelope.results) {
				return Err(Error::PageMerge { source, response: Box::new(response.metadata) });
			}
			if !cursor.advance(received, envelope.total_count) {
				return Ok(response.metadata);
			}
		}
	}
}

impl Transport {
	/// Fetches every page of `path`; see [`Paginator::fetch_all`].
	pub async fn get_paginated<F>(
		&self,
		path: &str,
		opts: CallOptions,
		merge_page: F,
	) -> Result<ResponseMetadata>
	where
		F: FnMut(Vec<Value>) -> Result<(), BoxError>,
	{
		Paginator::new(self).fetch_all(path, opts, merge_page).await
	}

	/// Fetches every page of `path` and decodes each item into `T`.
	pub async fn get_all<T>(&self, path: &str, opts: CallOptions) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		let mut items = Vec::new();

		self.get_paginated(path, opts, |page| {
			for value in page {
				items.push(serde_json::from_value(value)?);
			}

			Ok(())
		})
		.await?;

		Ok(items)
	}
}

fn page_size(opts: &CallOptions) -> u32 {
	opts.query_value(PAGE_SIZE_PARAM)
		.and_then(|value| value.trim().parse().ok())
		.filter(|size| *size > 0)
		.unwrap_or(DEFAULT_PAGE_SIZE)
}
