//! Turns a resolved file into the response body.

use hyper::header::{CONTENT_ENCODING, CONTENT_LENGTH, ETAG, HeaderName, HeaderValue, LAST_MODIFIED};
use std::path::Path;
use xsendfile_http::{Body, FileBody, FileInfo, OpenFile, Response, TransferHints};

use crate::conditions::{ConditionEvaluator, Precondition, Validators};
use crate::config::{CoreSettings, XSendFileConfig};
use crate::error::{Result, SendFileError};
use crate::filter::RequestInfo;
use crate::scanner::DeliveryMode;
use crate::validators::{format_last_modified, make_etag};

/// Builds the final response for a resolved delivery.
pub struct ResponseAssembler<'a> {
	config: &'a XSendFileConfig,
	core: &'a CoreSettings,
	conditions: &'a dyn ConditionEvaluator,
}

impl<'a> ResponseAssembler<'a> {
	pub fn new(
		config: &'a XSendFileConfig,
		core: &'a CoreSettings,
		conditions: &'a dyn ConditionEvaluator,
	) -> Self {
		Self {
			config,
			core,
			conditions,
		}
	}

	/// Opens `path` and prepares `response` to send it.
	///
	/// Returns [`Precondition::Proceed`] when `response` now carries a file
	/// body, or the short-circuit outcome after replacing the status and
	/// emptying the body. In temporary mode the file is deleted once the
	/// last handle to it is released, including on every error path.
	///
	/// # Errors
	///
	/// [`SendFileError::OpenFailure`], [`SendFileError::StatFailure`] or
	/// [`SendFileError::NotRegularFile`].
	pub fn assemble(
		&self,
		path: &Path,
		mode: DeliveryMode,
		request: &RequestInfo,
		response: &mut Response,
	) -> Result<Precondition> {
		let file =
			OpenFile::open(path, mode.is_temporary()).map_err(|source| SendFileError::OpenFailure {
				path: path.to_path_buf(),
				source,
			})?;

		let stat_failure = |source| SendFileError::StatFailure {
			path: path.to_path_buf(),
			source,
		};
		let metadata = file.metadata().map_err(stat_failure)?;
		if !metadata.is_file() {
			return Err(SendFileError::NotRegularFile(path.to_path_buf()));
		}
		let info = FileInfo::from_metadata(&metadata).map_err(stat_failure)?;

		response.file_info = Some(info);
		response.no_cache = false;
		response.no_local_copy = false;

		self.set_validators(&info, request, response);
		response
			.headers
			.insert(CONTENT_LENGTH, HeaderValue::from(info.size));

		let validators = Validators::from_response(response);
		let outcome = self.conditions.evaluate(
			&request.method,
			&request.headers,
			&validators,
			request.request_time,
		);

		if !outcome.is_proceed() {
			tracing::debug!(path = %path.display(), status = %outcome.status(), "precondition short-circuit");
			drop(file);
			response.status = outcome.status();
			response.body = Body::Empty;
			response.headers.remove(CONTENT_LENGTH);
			response.headers.remove(CONTENT_ENCODING);
			return Ok(outcome);
		}

		let hints = TransferHints {
			sendfile: self.core.enable_sendfile,
			mmap: self.core.enable_mmap,
		};
		let body = FileBody::segmented(file, info.size, self.core.max_segment_size, hints);
		tracing::debug!(
			path = %path.display(),
			size = info.size,
			segments = body.segment_count(),
			"file body prepared"
		);
		response.body = Body::File(body);
		Ok(outcome)
	}

	fn set_validators(&self, info: &FileInfo, request: &RequestInfo, response: &mut Response) {
		if self.config.ignores_last_modified() || !supplied(response, LAST_MODIFIED) {
			let value = format_last_modified(info.modified, request.request_time);
			if let Ok(value) = HeaderValue::from_str(&value) {
				response.headers.insert(LAST_MODIFIED, value);
			}
			response.err_headers.remove(LAST_MODIFIED);
		}

		if self.config.ignores_etag() || !supplied(response, ETAG) {
			response.headers.remove(ETAG);
			response.err_headers.remove(ETAG);
			if let Some(etag) =
				make_etag(info, self.core.etag_components, request.request_time)
				&& let Ok(value) = HeaderValue::from_str(&etag)
			{
				response.headers.insert(ETAG, value);
			}
		}
	}
}

fn supplied(response: &Response, name: HeaderName) -> bool {
	response.headers.contains_key(&name) || response.err_headers.contains_key(&name)
}
