//! HTTP request representation.
//!
//! Besides the request line and headers, a [`Request`] carries what the host
//! learned while dispatching it: the filesystem path it mapped to, whether it
//! is an internal sub-request, which content handler served it, and the
//! request-line URI before any internal rewrite.

use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Uri, Version};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};

/// HTTP Request representation
#[derive(Debug, Clone)]
pub struct Request {
	pub method: Method,
	pub uri: Uri,
	pub version: Version,
	pub headers: HeaderMap,
	pub body: Bytes,
	/// URI from the request line, before internal redirects or rewrites
	pub original_uri: Uri,
	/// Filesystem path the request was mapped to
	pub filename: Option<PathBuf>,
	/// Whether `filename` names a directory
	pub is_directory: bool,
	/// Whether this is an internal sub-request
	pub is_subrequest: bool,
	/// Name of the content handler that served the request
	pub handler: Option<String>,
	/// Time the request was received
	pub request_time: SystemTime,
}

impl Request {
	/// Create a new request
	///
	/// # Examples
	///
	/// ```
	/// use xsendfile_http::Request;
	/// use hyper::{Method, Uri, Version, HeaderMap};
	/// use bytes::Bytes;
	///
	/// let request = Request::new(
	///     Method::GET,
	///     Uri::from_static("/reports/q1"),
	///     Version::HTTP_11,
	///     HeaderMap::new(),
	///     Bytes::new(),
	/// );
	/// assert_eq!(request.original_uri, request.uri);
	/// ```
	pub fn new(method: Method, uri: Uri, version: Version, headers: HeaderMap, body: Bytes) -> Self {
		Self {
			method,
			original_uri: uri.clone(),
			uri,
			version,
			headers,
			body,
			filename: None,
			is_directory: false,
			is_subrequest: false,
			handler: None,
			request_time: SystemTime::now(),
		}
	}

	/// Create a request builder
	pub fn builder() -> RequestBuilder {
		RequestBuilder::default()
	}

	/// The path the request was mapped to, if any
	pub fn filename(&self) -> Option<&Path> {
		self.filename.as_deref()
	}
}

/// Builder for [`Request`]
#[derive(Debug, Default)]
pub struct RequestBuilder {
	method: Option<Method>,
	uri: Option<String>,
	original_uri: Option<String>,
	version: Option<Version>,
	headers: HeaderMap,
	body: Bytes,
	filename: Option<PathBuf>,
	is_directory: bool,
	is_subrequest: bool,
	handler: Option<String>,
	request_time: Option<SystemTime>,
	invalid_header: Option<String>,
}

impl RequestBuilder {
	/// Set the request method (default `GET`)
	pub fn method(mut self, method: Method) -> Self {
		self.method = Some(method);
		self
	}

	/// Set the request URI (default `/`)
	pub fn uri(mut self, uri: impl Into<String>) -> Self {
		self.uri = Some(uri.into());
		self
	}

	/// Set the request-line URI when it differs from the current URI
	pub fn original_uri(mut self, uri: impl Into<String>) -> Self {
		self.original_uri = Some(uri.into());
		self
	}

	/// Set the HTTP version (default HTTP/1.1)
	pub fn version(mut self, version: Version) -> Self {
		self.version = Some(version);
		self
	}

	/// Replace all request headers
	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;
		self
	}

	/// Append a single request header
	pub fn header(mut self, name: &str, value: &str) -> Self {
		match (
			HeaderName::from_bytes(name.as_bytes()),
			HeaderValue::from_str(value),
		) {
			(Ok(name), Ok(value)) => {
				self.headers.append(name, value);
			}
			_ => self.invalid_header = Some(name.to_string()),
		}
		self
	}

	/// Set the request body
	pub fn body(mut self, body: Bytes) -> Self {
		self.body = body;
		self
	}

	/// Set the filesystem path the request was mapped to
	pub fn filename(mut self, path: impl Into<PathBuf>) -> Self {
		self.filename = Some(path.into());
		self
	}

	/// Mark the mapped path as a directory
	pub fn directory(mut self, is_directory: bool) -> Self {
		self.is_directory = is_directory;
		self
	}

	/// Mark the request as an internal sub-request
	pub fn subrequest(mut self, is_subrequest: bool) -> Self {
		self.is_subrequest = is_subrequest;
		self
	}

	/// Set the name of the content handler that served the request
	pub fn handler(mut self, name: impl Into<String>) -> Self {
		self.handler = Some(name.into());
		self
	}

	/// Set the time the request was received (default now)
	pub fn request_time(mut self, time: SystemTime) -> Self {
		self.request_time = Some(time);
		self
	}

	/// Build the request
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidRequest`] if a URI or header could not be parsed.
	pub fn build(self) -> Result<Request> {
		if let Some(name) = self.invalid_header {
			return Err(Error::InvalidRequest(format!("invalid header: {name}")));
		}

		let uri = parse_uri(self.uri.as_deref().unwrap_or("/"))?;
		let original_uri = match self.original_uri.as_deref() {
			Some(raw) => parse_uri(raw)?,
			None => uri.clone(),
		};

		Ok(Request {
			method: self.method.unwrap_or(Method::GET),
			uri,
			version: self.version.unwrap_or(Version::HTTP_11),
			headers: self.headers,
			body: self.body,
			original_uri,
			filename: self.filename,
			is_directory: self.is_directory,
			is_subrequest: self.is_subrequest,
			handler: self.handler,
			request_time: self.request_time.unwrap_or_else(SystemTime::now),
		})
	}
}

fn parse_uri(raw: &str) -> Result<Uri> {
	raw.parse::<Uri>()
		.map_err(|e| Error::InvalidRequest(format!("invalid uri {raw:?}: {e}")))
}
