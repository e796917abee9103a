//! One-shot response filter that performs the file substitution.
//!
//! A [`SendFileFilter`] is created per request. It inspects the backend's
//! response once, and when a delivery sentinel is present it replaces the
//! response body with the referenced file:
//!
//! ```text
//! scan headers -> resolve path -> pick compressed artifact -> assemble body
//! ```
//!
//! Failures at any stage replace the response with a bare status response.

use hyper::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use hyper::{HeaderMap, Method, StatusCode, Uri};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use xsendfile_http::{Body, Request, Response};

use crate::assembler::ResponseAssembler;
use crate::compression::{CompressionCache, merge_vary};
use crate::conditions::{ConditionEvaluator, Precondition, StandardConditions};
use crate::config::{CoreSettings, XSendFileConfig};
use crate::error::{Result, SendFileError};
use crate::resolver::{PathResolver, UriMapper};
use crate::scanner::{DeliveryMode, DeliveryRequest, scan};

/// Name of the host's fallback content handler; its responses are never
/// substituted.
pub const DEFAULT_HANDLER: &str = "default-handler";

/// The parts of a request the filter consults after the backend has run.
#[derive(Debug, Clone)]
pub struct RequestInfo {
	pub method: Method,
	pub uri: Uri,
	/// URI from the request line, before any internal rewrite
	pub original_uri: Uri,
	pub headers: HeaderMap,
	/// Filesystem path the request was dispatched to
	pub filename: Option<PathBuf>,
	pub is_directory: bool,
	pub is_subrequest: bool,
	/// Content handler that produced the response
	pub handler: Option<String>,
	pub request_time: SystemTime,
}

impl Default for RequestInfo {
	fn default() -> Self {
		Self {
			method: Method::GET,
			uri: Uri::from_static("/"),
			original_uri: Uri::from_static("/"),
			headers: HeaderMap::new(),
			filename: None,
			is_directory: false,
			is_subrequest: false,
			handler: None,
			request_time: SystemTime::now(),
		}
	}
}

impl From<&Request> for RequestInfo {
	fn from(request: &Request) -> Self {
		Self {
			method: request.method.clone(),
			uri: request.uri.clone(),
			original_uri: request.original_uri.clone(),
			headers: request.headers.clone(),
			filename: request.filename.clone(),
			is_directory: request.is_directory,
			is_subrequest: request.is_subrequest,
			handler: request.handler.clone(),
			request_time: request.request_time,
		}
	}
}

/// Host settings and collaborators shared by every request.
#[derive(Clone)]
pub struct FilterContext {
	pub core: CoreSettings,
	/// `None` disables compressed artifacts entirely
	pub compression: Option<CompressionCache>,
	pub conditions: Arc<dyn ConditionEvaluator>,
	pub mapper: Option<Arc<dyn UriMapper>>,
}

impl FilterContext {
	pub fn new(core: CoreSettings) -> Self {
		Self {
			core,
			compression: Some(CompressionCache::default()),
			conditions: Arc::new(StandardConditions),
			mapper: None,
		}
	}
}

impl Default for FilterContext {
	fn default() -> Self {
		Self::new(CoreSettings::default())
	}
}

impl std::fmt::Debug for FilterContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FilterContext")
			.field("core", &self.core)
			.field("compression", &self.compression)
			.field("mapper", &self.mapper.is_some())
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
	Inactive,
	Engaged,
}

/// What [`SendFileFilter::process`] did with a response.
#[derive(Debug)]
pub enum FilterOutcome {
	/// The response was left as the backend produced it
	PassThrough,
	/// The body now streams `path`
	Sent {
		path: PathBuf,
		/// Whether a range stage may apply the request's `Range` header
		honor_range: bool,
	},
	/// A precondition answered the request without a body
	ShortCircuit(StatusCode),
	/// Substitution failed; the response was replaced by the error status
	Aborted(SendFileError),
}

impl FilterOutcome {
	pub fn is_pass_through(&self) -> bool {
		matches!(self, FilterOutcome::PassThrough)
	}
}

/// Per-request substitution state machine.
pub struct SendFileFilter<'a> {
	state: FilterState,
	config: XSendFileConfig,
	context: &'a FilterContext,
}

impl<'a> SendFileFilter<'a> {
	/// Creates a filter for one request with its merged configuration.
	pub fn new(config: XSendFileConfig, context: &'a FilterContext) -> Self {
		Self {
			state: FilterState::Inactive,
			config,
			context,
		}
	}

	pub fn state(&self) -> FilterState {
		self.state
	}

	/// Inspects `response` and substitutes the delivered file if requested.
	///
	/// Runs at most once: after engaging, further calls pass through.
	pub fn process(&mut self, request: &RequestInfo, response: &mut Response) -> FilterOutcome {
		if self.state == FilterState::Engaged {
			return FilterOutcome::PassThrough;
		}

		if response.status != StatusCode::OK
			|| request.is_subrequest
			|| request.handler.as_deref() == Some(DEFAULT_HANDLER)
		{
			tracing::trace!(status = %response.status, "response not eligible for substitution");
			return FilterOutcome::PassThrough;
		}

		let Some(delivery) = scan(&mut response.headers, &mut response.err_headers) else {
			return FilterOutcome::PassThrough;
		};

		self.state = FilterState::Engaged;
		tracing::debug!(sentinel = %delivery.sentinel_lossy(), mode = ?delivery.mode, uri = %request.uri, "substituting response body");

		response.body = Body::Empty;
		for headers in [&mut response.headers, &mut response.err_headers] {
			headers.remove(CONTENT_LENGTH);
			headers.remove(CONTENT_ENCODING);
		}

		match self.deliver(&delivery, request, response) {
			Ok(outcome) => outcome,
			Err(error) => {
				tracing::error!(sentinel = %delivery.sentinel_lossy(), uri = %request.uri, %error, "file substitution failed");
				*response = Response::new(error.status_code());
				FilterOutcome::Aborted(error)
			}
		}
	}

	fn deliver(
		&self,
		delivery: &DeliveryRequest,
		request: &RequestInfo,
		response: &mut Response,
	) -> Result<FilterOutcome> {
		let source = PathResolver::new(&self.config)
			.with_mapper(self.context.mapper.as_deref())
			.resolve(delivery, request)?;

		// A temporary source is deleted after sending, so it never gets an artifact.
		let path = match (&self.context.compression, delivery.mode) {
			(Some(cache), DeliveryMode::Persistent) => cache
				.negotiate(&source, &request.headers, &mut response.headers)
				.unwrap_or(source),
			(Some(_), DeliveryMode::Temporary) => {
				merge_vary(&mut response.headers, "Accept-Encoding");
				source
			}
			(None, _) => source,
		};

		let outcome = ResponseAssembler::new(
			&self.config,
			&self.context.core,
			self.context.conditions.as_ref(),
		)
		.assemble(&path, delivery.mode, request, response)?;

		Ok(match outcome {
			Precondition::Proceed { honor_range } => {
				response.range_allowed = honor_range;
				FilterOutcome::Sent { path, honor_range }
			}
			other => FilterOutcome::ShortCircuit(other.status()),
		})
	}
}
