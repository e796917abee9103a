//! Pre-compressed sibling artifacts.
//!
//! For text assets requested by a client that accepts gzip, a `<file>.gz`
//! sibling is served instead of the file itself. The sibling is produced on
//! demand and reused for as long as it is not older than its source. New
//! artifacts are written to a temporary file next to the source and renamed
//! into place, so a partially written artifact is never visible.
//!
//! Compression problems never fail the request: the uncompressed file is
//! served instead.

use flate2::Compression;
use flate2::write::GzEncoder;
use hyper::HeaderMap;
use hyper::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, HeaderValue, VARY};
use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::error::CompressionError;

/// Extensions eligible for compression.
pub const COMPRESSIBLE_EXTENSIONS: &[&str] = &["css", "js", "html", "json"];

/// Produces gzip data for a source file.
pub trait Compressor: Send + Sync {
	/// Writes the compressed form of `source` into `out`.
	fn compress(&self, source: &Path, out: &mut dyn Write) -> Result<(), CompressionError>;
}

/// In-process gzip encoder.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
	level: u32,
}

impl GzipCompressor {
	/// Creates an encoder with the given level (clamped to 0..=9).
	pub fn new(level: u32) -> Self {
		Self {
			level: level.min(9),
		}
	}
}

impl Default for GzipCompressor {
	fn default() -> Self {
		Self::new(9)
	}
}

impl Compressor for GzipCompressor {
	fn compress(&self, source: &Path, out: &mut dyn Write) -> Result<(), CompressionError> {
		let mut input = File::open(source)?;
		let mut encoder = GzEncoder::new(out, Compression::new(self.level));
		io::copy(&mut input, &mut encoder)?;
		encoder.finish()?;
		Ok(())
	}
}

/// Runs an external program that writes gzip data to stdout.
///
/// The source path is appended as the last argument.
#[derive(Debug, Clone)]
pub struct CommandCompressor {
	program: PathBuf,
	args: Vec<String>,
	accepted_exit_codes: Vec<i32>,
}

impl CommandCompressor {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			accepted_exit_codes: Vec::new(),
		}
	}

	pub fn with_args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.args = args.into_iter().map(Into::into).collect();
		self
	}

	/// Treats these non-zero exit codes as success as well.
	///
	/// `gzip` exits with 1 when it only emitted a warning; accepting that has
	/// to be requested explicitly.
	pub fn accept_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
		self.accepted_exit_codes = codes.into_iter().collect();
		self
	}
}

impl Default for CommandCompressor {
	/// `gzip --stdout -9 <source>`
	fn default() -> Self {
		Self::new("gzip").with_args(["--stdout", "-9"])
	}
}

impl Compressor for CommandCompressor {
	fn compress(&self, source: &Path, out: &mut dyn Write) -> Result<(), CompressionError> {
		let mut child = Command::new(&self.program)
			.args(&self.args)
			.arg(source)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|e| {
				CompressionError::Unavailable(format!("{}: {e}", self.program.display()))
			})?;

		let copied = match child.stdout.take() {
			Some(mut stdout) => io::copy(&mut stdout, out),
			None => Err(io::Error::other("compressor stdout not captured")),
		};
		let status = child.wait()?;
		copied?;

		match status.code() {
			Some(0) => Ok(()),
			Some(code) if self.accepted_exit_codes.contains(&code) => Ok(()),
			_ => Err(CompressionError::Failed(format!(
				"{} exited with {status}",
				self.program.display()
			))),
		}
	}
}

/// Whether an `Accept-Encoding` value lists gzip.
///
/// Parameters such as `;q=0.5` are ignored.
///
/// # Examples
///
/// ```
/// use xsendfile_middleware::compression::accepts_gzip;
///
/// assert!(accepts_gzip("deflate, GZIP;q=0.8"));
/// assert!(!accepts_gzip("br, deflate"));
/// assert!(!accepts_gzip("x-gzip"));
/// ```
pub fn accepts_gzip(accept_encoding: &str) -> bool {
	accept_encoding
		.split(',')
		.filter_map(|item| item.split(';').next())
		.any(|token| token.trim().eq_ignore_ascii_case("gzip"))
}

/// Adds `token` to the response's `Vary` header unless already listed.
///
/// # Examples
///
/// ```
/// use hyper::HeaderMap;
/// use hyper::header::VARY;
/// use xsendfile_middleware::compression::merge_vary;
///
/// let mut headers = HeaderMap::new();
/// headers.insert(VARY, "Cookie".parse().unwrap());
/// merge_vary(&mut headers, "Accept-Encoding");
/// merge_vary(&mut headers, "accept-encoding");
/// assert_eq!(headers.get(VARY).unwrap(), "Cookie, Accept-Encoding");
/// ```
pub fn merge_vary(headers: &mut HeaderMap, token: &str) {
	let existing: Vec<String> = headers
		.get_all(VARY)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(','))
		.map(|item| item.trim().to_string())
		.filter(|item| !item.is_empty())
		.collect();

	if existing
		.iter()
		.any(|item| item == "*" || item.eq_ignore_ascii_case(token))
	{
		return;
	}

	let mut merged = existing;
	merged.push(token.to_string());
	if let Ok(value) = HeaderValue::from_str(&merged.join(", ")) {
		headers.insert(VARY, value);
	}
}

/// Path of the compressed sibling of `source`.
pub fn artifact_path(source: &Path) -> PathBuf {
	let mut name = source.as_os_str().to_owned();
	name.push(".gz");
	PathBuf::from(name)
}

/// Whether `path` has a compressible extension.
pub fn is_compressible(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| {
			COMPRESSIBLE_EXTENSIONS
				.iter()
				.any(|allowed| ext.eq_ignore_ascii_case(allowed))
		})
}

/// Whether an artifact is at least as new as its source.
pub fn is_fresh(source: &Metadata, artifact: &Metadata) -> bool {
	match (source.modified(), artifact.modified()) {
		(Ok(source), Ok(artifact)) => artifact >= source,
		_ => false,
	}
}

/// Maintains and selects compressed artifacts.
#[derive(Clone)]
pub struct CompressionCache {
	compressor: Arc<dyn Compressor>,
}

impl CompressionCache {
	pub fn new(compressor: Arc<dyn Compressor>) -> Self {
		Self { compressor }
	}

	/// Returns the artifact for `source`, producing it if missing or stale.
	pub fn ensure_artifact(
		&self,
		source: &Path,
		source_meta: &Metadata,
	) -> Result<PathBuf, CompressionError> {
		let artifact = artifact_path(source);
		if let Ok(meta) = fs::metadata(&artifact)
			&& is_fresh(source_meta, &meta)
		{
			return Ok(artifact);
		}

		let dir = source.parent().unwrap_or_else(|| Path::new("."));
		let prefix = match source.file_name() {
			Some(name) => format!("{}.", name.to_string_lossy()),
			None => ".".to_string(),
		};
		// Removed on drop unless persisted
		let mut tmp = tempfile::Builder::new()
			.prefix(&prefix)
			.suffix(".gz.tmp")
			.tempfile_in(dir)?;
		copy_permissions(source_meta, tmp.path())?;

		self.compressor.compress(source, tmp.as_file_mut())?;
		tmp.as_file_mut().flush()?;
		tmp.persist(&artifact).map_err(|e| CompressionError::Io(e.error))?;

		tracing::debug!(source = %source.display(), artifact = %artifact.display(), "compressed artifact written");
		Ok(artifact)
	}

	/// Chooses the file to send for `source`.
	///
	/// Always adds `Accept-Encoding` to `Vary`. When the client accepts gzip
	/// and a fresh artifact exists or can be produced, returns its path and
	/// sets `Content-Length` and `Content-Encoding` on `response_headers`.
	/// Otherwise returns `None` and the source is sent as-is.
	pub fn negotiate(
		&self,
		source: &Path,
		request_headers: &HeaderMap,
		response_headers: &mut HeaderMap,
	) -> Option<PathBuf> {
		merge_vary(response_headers, "Accept-Encoding");

		let accepts = request_headers
			.get_all(ACCEPT_ENCODING)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.any(accepts_gzip);
		if !accepts {
			return None;
		}

		let source_meta = fs::metadata(source).ok()?;
		if !is_compressible(source) {
			return None;
		}

		let artifact = match self.ensure_artifact(source, &source_meta) {
			Ok(artifact) => artifact,
			Err(error) => {
				tracing::debug!(source = %source.display(), %error, "serving uncompressed file");
				return None;
			}
		};

		let artifact_meta = match fs::metadata(&artifact) {
			Ok(meta) => meta,
			Err(error) => {
				tracing::debug!(artifact = %artifact.display(), %error, "cannot stat compressed artifact");
				return None;
			}
		};

		response_headers.insert(CONTENT_LENGTH, HeaderValue::from(artifact_meta.len()));
		response_headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
		Some(artifact)
	}
}

impl Default for CompressionCache {
	fn default() -> Self {
		Self::new(Arc::new(GzipCompressor::default()))
	}
}

impl std::fmt::Debug for CompressionCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CompressionCache").finish_non_exhaustive()
	}
}

#[cfg(unix)]
fn copy_permissions(source: &Metadata, target: &Path) -> io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	let mode = source.permissions().mode() & 0o777;
	fs::set_permissions(target, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn copy_permissions(source: &Metadata, target: &Path) -> io::Result<()> {
	fs::set_permissions(target, source.permissions())
}
