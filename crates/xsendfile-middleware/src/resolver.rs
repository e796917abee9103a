//! Mapping sentinel values onto files inside the allowed roots.
//!
//! A sentinel is first URL-unescaped (unless disabled), then merged with each
//! candidate root in turn. The first root that yields an existing path which
//! is contained in the root, both lexically and after resolving symlinks,
//! wins. There is no best-match search: root order is significant. The
//! winning path is returned as named, with symlinks left in place.

use hyper::Uri;
use percent_encoding::percent_decode;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::{AllowedRoot, XSendFileConfig};
use crate::error::{Result, SendFileError};
use crate::filter::RequestInfo;
use crate::scanner::{DeliveryMode, DeliveryRequest};

/// Filesystem location a URI maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPath {
	pub path: PathBuf,
	pub is_directory: bool,
}

impl MappedPath {
	/// The directory itself, or the parent directory of a file.
	pub fn directory(&self) -> Option<&Path> {
		if self.is_directory {
			Some(&self.path)
		} else {
			self.path.parent()
		}
	}
}

/// Host lookup used to map the request-line URI of an internally rewritten
/// request back to the filesystem.
pub trait UriMapper: Send + Sync {
	/// Returns the path `uri` would be served from, if any.
	fn map_uri(&self, uri: &Uri) -> Option<MappedPath>;
}

/// Decodes URL escapes in a sentinel value.
///
/// A `%` not followed by two hex digits is rejected, as is any escape that
/// decodes to `/` or NUL: path separators must be literal. Bytes outside
/// ASCII are kept as they are.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use xsendfile_middleware::resolver::unescape;
///
/// assert_eq!(unescape("q1%20report.csv").unwrap(), Path::new("q1 report.csv"));
/// assert_eq!(unescape("donn%C3%A9es.txt").unwrap(), Path::new("données.txt"));
/// assert!(unescape("bad%zzescape").is_err());
/// assert!(unescape("..%2fetc%2fpasswd").is_err());
/// ```
pub fn unescape(raw: impl AsRef<[u8]>) -> Result<PathBuf> {
	let bytes = raw.as_ref();
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			let decoded = bytes
				.get(i + 1..i + 3)
				.and_then(|hex| std::str::from_utf8(hex).ok())
				.and_then(|hex| u8::from_str_radix(hex, 16).ok());
			match decoded {
				Some(b'/') | Some(0) => {
					return Err(SendFileError::BadEncoding(format!(
						"escaped separator or NUL in {:?}",
						String::from_utf8_lossy(bytes)
					)));
				}
				Some(_) => i += 3,
				None => {
					return Err(SendFileError::BadEncoding(format!(
						"malformed escape in {:?}",
						String::from_utf8_lossy(bytes)
					)));
				}
			}
		} else {
			i += 1;
		}
	}

	bytes_to_path(percent_decode(bytes).collect())
}

/// Converts raw sentinel bytes into a path.
#[cfg(unix)]
fn bytes_to_path(bytes: Vec<u8>) -> Result<PathBuf> {
	use std::os::unix::ffi::OsStringExt;
	Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

/// Converts raw sentinel bytes into a path.
#[cfg(not(unix))]
fn bytes_to_path(bytes: Vec<u8>) -> Result<PathBuf> {
	String::from_utf8(bytes).map(PathBuf::from).map_err(|e| {
		SendFileError::BadEncoding(format!(
			"non UTF-8 file name {:?}",
			String::from_utf8_lossy(e.as_bytes())
		))
	})
}

/// Merges `candidate` into `root` without touching the filesystem.
///
/// An absolute candidate that already lies under `root` is used as-is; any
/// other candidate is taken relative to `root`. `.` segments are dropped and
/// `..` segments pop a component, but never above `root`. Returns `None` if
/// the candidate escapes the root or `root` is not absolute.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use xsendfile_middleware::resolver::lexical_contains;
///
/// let root = Path::new("/var/data");
/// assert_eq!(
///     lexical_contains(root, Path::new("/reports/q1.csv")),
///     Some(PathBuf::from("/var/data/reports/q1.csv"))
/// );
/// assert_eq!(
///     lexical_contains(root, Path::new("/var/data/reports/./q1.csv")),
///     Some(PathBuf::from("/var/data/reports/q1.csv"))
/// );
/// assert_eq!(lexical_contains(root, Path::new("../../etc/passwd")), None);
/// ```
pub fn lexical_contains(root: &Path, candidate: &Path) -> Option<PathBuf> {
	if !root.is_absolute() {
		return None;
	}
	let root = normalize(root)?;

	let relative: Vec<Component<'_>> = match normalize(candidate) {
		Some(absolute) if candidate.is_absolute() && absolute.starts_with(&root) => {
			return Some(absolute);
		}
		_ => candidate
			.components()
			.filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
			.collect(),
	};

	let mut merged = root.clone();
	for component in relative {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				if merged == root {
					return None;
				}
				merged.pop();
			}
			Component::Normal(part) => merged.push(part),
			Component::RootDir | Component::Prefix(_) => {}
		}
	}
	Some(merged)
}

/// Lexically normalizes an absolute path; `None` if `..` climbs past the top.
fn normalize(path: &Path) -> Option<PathBuf> {
	if !path.is_absolute() {
		return None;
	}
	let mut out = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				if !out.pop() {
					return None;
				}
			}
			other => out.push(other.as_os_str()),
		}
	}
	Some(out)
}

/// Merges `candidate` into `root` and verifies the result on disk.
///
/// The merged path must exist, and after resolving symlinks in both it and
/// `root`, must still lie inside `root`. Returns the merged path as named,
/// not its symlink target, so deleting it after a temporary delivery
/// removes the entry the backend named.
pub fn contains(root: &Path, candidate: &Path) -> Option<PathBuf> {
	let merged = lexical_contains(root, candidate)?;
	let real_root = fs::canonicalize(root).ok()?;
	let real = fs::canonicalize(&merged).ok()?;
	real.starts_with(&real_root).then_some(merged)
}

/// Resolves delivery requests against a merged configuration.
pub struct PathResolver<'a> {
	config: &'a XSendFileConfig,
	mapper: Option<&'a dyn UriMapper>,
}

impl<'a> PathResolver<'a> {
	pub fn new(config: &'a XSendFileConfig) -> Self {
		Self {
			config,
			mapper: None,
		}
	}

	pub fn with_mapper(mut self, mapper: Option<&'a dyn UriMapper>) -> Self {
		self.mapper = mapper;
		self
	}

	/// Roots tried for `mode`, in order.
	///
	/// Persistent deliveries may also use the directory the request itself
	/// was served from. Temporary deliveries only use roots that permit
	/// deletion.
	pub fn candidate_roots(&self, mode: DeliveryMode, request: &RequestInfo) -> Vec<AllowedRoot> {
		let mut roots = Vec::with_capacity(self.config.allowed_roots.len() + 1);
		if mode == DeliveryMode::Persistent
			&& let Some(root) = self.implicit_root(request)
		{
			roots.push(AllowedRoot::new(root));
		}
		roots.extend(
			self.config
				.allowed_roots
				.iter()
				.filter(|root| mode == DeliveryMode::Persistent || root.allow_delete)
				.cloned(),
		);
		roots
	}

	fn implicit_root(&self, request: &RequestInfo) -> Option<PathBuf> {
		let mapped = match self.mapper {
			Some(mapper) if request.original_uri != request.uri => {
				mapper.map_uri(&request.original_uri)
			}
			_ => request.filename.clone().map(|path| MappedPath {
				path,
				is_directory: request.is_directory,
			}),
		}?;
		mapped.directory().map(Path::to_path_buf)
	}

	/// Resolves a delivery request to a verified file path.
	///
	/// # Errors
	///
	/// [`SendFileError::BadEncoding`] for malformed escapes and
	/// [`SendFileError::BadPath`] when no candidate root contains the file.
	pub fn resolve(&self, delivery: &DeliveryRequest, request: &RequestInfo) -> Result<PathBuf> {
		let candidate = if self.config.unescapes() {
			unescape(&delivery.sentinel)?
		} else {
			bytes_to_path(delivery.sentinel.clone())?
		};

		for root in self.candidate_roots(delivery.mode, request) {
			match contains(&root.path, &candidate) {
				Some(path) => {
					tracing::trace!(root = %root.path.display(), path = %path.display(), "sentinel resolved");
					return Ok(path);
				}
				None => {
					tracing::trace!(root = %root.path.display(), "root does not contain sentinel");
				}
			}
		}

		Err(SendFileError::BadPath(delivery.sentinel_lossy().into_owned()))
	}
}
