//! Detection of the delivery sentinel in backend response headers.

use hyper::HeaderMap;
use hyper::header::HeaderName;
use std::borrow::Cow;

/// Header asking the server to send a file that stays on disk.
pub const X_SENDFILE: HeaderName = HeaderName::from_static("x-sendfile");

/// Header asking the server to send a file and delete it afterwards.
pub const X_SENDFILE_TEMPORARY: HeaderName = HeaderName::from_static("x-sendfile-temporary");

/// How the delivered file is treated once it has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
	/// The file is left in place
	Persistent,
	/// The file is removed once the response no longer needs it
	Temporary,
}

impl DeliveryMode {
	pub fn is_temporary(self) -> bool {
		self == DeliveryMode::Temporary
	}
}

/// A backend's request to substitute a file for its response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
	/// Raw header value bytes; may still contain URL escapes
	pub sentinel: Vec<u8>,
	pub mode: DeliveryMode,
}

impl DeliveryRequest {
	/// The sentinel for display, with invalid UTF-8 replaced.
	pub fn sentinel_lossy(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.sentinel)
	}
}

/// Extracts the delivery sentinel from a response.
///
/// The primary header set is consulted before the error-path set, and
/// `X-Sendfile` before `X-Sendfile-Temporary`. All sentinel headers are
/// removed from both sets whether or not one was found, so they never reach
/// the client. Values are taken as raw bytes; they need not be ASCII.
///
/// # Examples
///
/// ```
/// use hyper::HeaderMap;
/// use xsendfile_middleware::scanner::{DeliveryMode, scan};
///
/// let mut headers = HeaderMap::new();
/// let mut err_headers = HeaderMap::new();
/// headers.insert("X-Sendfile-Temporary", "/tmp/export.zip".parse().unwrap());
///
/// let found = scan(&mut headers, &mut err_headers).unwrap();
/// assert_eq!(found.sentinel, b"/tmp/export.zip");
/// assert_eq!(found.mode, DeliveryMode::Temporary);
/// assert!(headers.is_empty());
/// ```
pub fn scan(headers: &mut HeaderMap, err_headers: &mut HeaderMap) -> Option<DeliveryRequest> {
	let found = lookup(headers, err_headers, &X_SENDFILE)
		.map(|sentinel| DeliveryRequest {
			sentinel,
			mode: DeliveryMode::Persistent,
		})
		.or_else(|| {
			lookup(headers, err_headers, &X_SENDFILE_TEMPORARY).map(|sentinel| DeliveryRequest {
				sentinel,
				mode: DeliveryMode::Temporary,
			})
		});

	for map in [&mut *headers, &mut *err_headers] {
		map.remove(&X_SENDFILE);
		map.remove(&X_SENDFILE_TEMPORARY);
	}

	found
}

fn lookup(headers: &HeaderMap, err_headers: &HeaderMap, name: &HeaderName) -> Option<Vec<u8>> {
	[headers, err_headers].into_iter().find_map(|map| {
		map.get(name)
			.map(|value| value.as_bytes())
			.filter(|value| !value.is_empty())
			.map(<[u8]>::to_vec)
	})
}
