//! Error types shared by handlers and middleware.

use thiserror::Error;

/// Errors that can occur while building or handling a request.
#[derive(Debug, Error)]
pub enum Error {
	/// The request could not be constructed.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

/// Result type alias for handler operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_invalid_request_message() {
		let error = Error::InvalidRequest("bad uri".into());
		assert_eq!(error.to_string(), "Invalid request: bad uri");
	}

	#[rstest]
	fn test_io_error_conversion() {
		let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
		let error: Error = io.into();
		assert!(error.to_string().starts_with("IO error:"));
	}
}
