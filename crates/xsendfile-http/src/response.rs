use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};

use crate::body::Body;
use crate::file::FileInfo;

/// HTTP Response representation
///
/// A response carries two header sets. `headers` is sent only with
/// successful responses; `err_headers` is sent with every response,
/// including error responses generated after the handler ran.
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub err_headers: HeaderMap,
	pub body: Body,
	/// Description of the on-disk file backing the body, if any
	pub file_info: Option<FileInfo>,
	/// Downstream caches must not store this response
	pub no_cache: bool,
	/// Downstream caches must not keep a local copy of the body
	pub no_local_copy: bool,
	/// Whether the host may answer a `Range` request with a partial body.
	/// Cleared when an `If-Range` validator no longer matches.
	pub range_allowed: bool,
}

impl Response {
	/// Create a new Response with the given status code
	///
	/// # Examples
	///
	/// ```
	/// use xsendfile_http::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// assert!(response.body.is_empty());
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			err_headers: HeaderMap::new(),
			body: Body::Empty,
			file_info: None,
			no_cache: false,
			no_local_copy: false,
			range_allowed: true,
		}
	}
	/// Create a Response with HTTP 200 OK status
	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}
	/// Set the response body
	///
	/// # Examples
	///
	/// ```
	/// use xsendfile_http::Response;
	///
	/// let response = Response::ok().with_body("Hello, World!");
	/// assert_eq!(response.body.len(), Some(13));
	/// ```
	pub fn with_body(mut self, body: impl Into<Body>) -> Self {
		self.body = body.into();
		self
	}
	/// Add a header to the primary header set
	///
	/// Invalid header names or values are ignored.
	///
	/// # Examples
	///
	/// ```
	/// use xsendfile_http::Response;
	///
	/// let response = Response::ok().with_header("X-Custom", "value");
	/// assert_eq!(response.headers.get("X-Custom").unwrap(), "value");
	/// ```
	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let Ok(name) = HeaderName::from_bytes(name.as_bytes())
			&& let Ok(value) = HeaderValue::from_str(value)
		{
			self.headers.insert(name, value);
		}
		self
	}
	/// Add a header to the error-path header set
	///
	/// # Examples
	///
	/// ```
	/// use xsendfile_http::Response;
	///
	/// let response = Response::ok().with_err_header("X-Trace", "abc");
	/// assert_eq!(response.err_headers.get("X-Trace").unwrap(), "abc");
	/// assert!(response.headers.get("X-Trace").is_none());
	/// ```
	pub fn with_err_header(mut self, name: &str, value: &str) -> Self {
		if let Ok(name) = HeaderName::from_bytes(name.as_bytes())
			&& let Ok(value) = HeaderValue::from_str(value)
		{
			self.err_headers.insert(name, value);
		}
		self
	}
	/// Look up a header in the primary set, then in the error-path set
	pub fn header(&self, name: impl hyper::header::AsHeaderName + Copy) -> Option<&HeaderValue> {
		self.headers.get(name).or_else(|| self.err_headers.get(name))
	}
}

impl std::fmt::Debug for Response {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Response")
			.field("status", &self.status)
			.field("headers", &self.headers)
			.field("err_headers", &self.err_headers)
			.field("body", &self.body)
			.field("file_info", &self.file_info)
			.field("range_allowed", &self.range_allowed)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use hyper::header::CONTENT_LENGTH;
	use rstest::rstest;

	#[rstest]
	fn test_new_response_is_cacheable_and_empty() {
		let response = Response::ok();
		assert!(!response.no_cache);
		assert!(!response.no_local_copy);
		assert!(response.range_allowed);
		assert!(response.body.is_empty());
		assert!(response.file_info.is_none());
	}

	#[rstest]
	fn test_invalid_header_is_ignored() {
		let response = Response::ok().with_header("bad header", "v");
		assert!(response.headers.is_empty());
	}

	#[rstest]
	fn test_header_falls_back_to_err_headers() {
		let response = Response::ok().with_err_header("Content-Length", "12");
		assert_eq!(response.header(&CONTENT_LENGTH).unwrap(), "12");

		let response = response.with_header("Content-Length", "7");
		assert_eq!(response.header(&CONTENT_LENGTH).unwrap(), "7");
	}
}
