//! Error types for file substitution, compression and configuration.

use hyper::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a file substitution.
///
/// Each variant maps to the status the client receives; the backend's
/// original body is never sent once substitution has started.
#[derive(Debug, Error)]
pub enum SendFileError {
	/// The sentinel value contained a malformed escape sequence.
	#[error("Bad file name encoding: {0}")]
	BadEncoding(String),

	/// No allowed root contains the requested path.
	#[error("Path not allowed: {0}")]
	BadPath(String),

	/// The resolved file could not be opened.
	#[error("Cannot open file {path}: {source}")]
	OpenFailure {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The resolved file could not be stat'd.
	#[error("Cannot stat file {path}: {source}")]
	StatFailure {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The resolved entry is not a regular file.
	#[error("Not a regular file: {0}")]
	NotRegularFile(PathBuf),
}

impl SendFileError {
	/// Status code sent to the client for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			SendFileError::BadEncoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
			SendFileError::BadPath(_)
			| SendFileError::OpenFailure { .. }
			| SendFileError::NotRegularFile(_) => StatusCode::NOT_FOUND,
			SendFileError::StatFailure { .. } => StatusCode::FORBIDDEN,
		}
	}
}

/// Errors raised while producing a compressed artifact.
///
/// These never reach the client: the uncompressed file is served instead.
#[derive(Debug, Error)]
pub enum CompressionError {
	/// The compressor could not be started.
	#[error("Compressor unavailable: {0}")]
	Unavailable(String),

	/// The compressor ran but reported failure.
	#[error("Compressor failed: {0}")]
	Failed(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

/// Errors found while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Unknown directive name.
	#[error("line {line}: unknown directive {name:?}")]
	UnknownDirective { line: usize, name: String },

	/// Directive given the wrong number or kind of arguments.
	#[error("line {line}: {directive}: {message}")]
	InvalidArgument {
		line: usize,
		directive: String,
		message: String,
	},

	/// A `<Directory>` block was opened but not closed, or closed without being opened.
	#[error("line {line}: unbalanced <Directory> block")]
	UnbalancedBlock { line: usize },

	/// A configured path is not absolute.
	#[error("path must be absolute: {0}")]
	RelativePath(PathBuf),

	/// TOML deserialization failed.
	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),
}

/// Result type alias for file substitution.
pub type Result<T> = std::result::Result<T, SendFileError>;
