//! X-Sendfile Middleware
//!
//! Lets a backend answer with a small response carrying an `X-Sendfile`
//! header, and replaces that response with the named file.

use async_trait::async_trait;
use std::sync::Arc;
use xsendfile_http::{Handler, Middleware, MiddlewareChain, Request, Response, Result};

use crate::compression::{CompressionCache, Compressor};
use crate::conditions::ConditionEvaluator;
use crate::config::{ConfigScopes, CoreSettings, Settings};
use crate::filter::{FilterContext, RequestInfo, SendFileFilter};
use crate::resolver::UriMapper;

/// X-Sendfile middleware
///
/// Runs the wrapped handler, then substitutes the file named by the
/// response's sentinel header. The middleware only takes part in requests
/// whose merged configuration has `XSendFile On`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use xsendfile_middleware::{ConfigScopes, XSendFileConfig, XSendFileMiddleware};
/// use xsendfile_http::{Handler, Middleware, Request, Response};
/// use hyper::StatusCode;
///
/// struct Download;
///
/// #[async_trait::async_trait]
/// impl Handler for Download {
///     async fn handle(&self, _request: Request) -> xsendfile_http::Result<Response> {
///         Ok(Response::ok().with_header("X-Sendfile", "report.txt"))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("report.txt"), "hello").unwrap();
///
/// let config = XSendFileConfig::new().with_active(true).with_root(dir.path());
/// let middleware = XSendFileMiddleware::new(ConfigScopes::new(config));
///
/// let request = Request::builder().uri("/download").build().unwrap();
/// let response = middleware.process(request, Arc::new(Download)).await.unwrap();
///
/// assert_eq!(response.status, StatusCode::OK);
/// assert_eq!(response.headers.get("content-length").unwrap(), "5");
/// assert!(!response.headers.contains_key("x-sendfile"));
/// # });
/// ```
pub struct XSendFileMiddleware {
	scopes: Arc<ConfigScopes>,
	context: Arc<FilterContext>,
}

impl XSendFileMiddleware {
	/// Create middleware with default core settings and collaborators
	pub fn new(scopes: ConfigScopes) -> Self {
		Self::with_context(Arc::new(scopes), Arc::new(FilterContext::default()))
	}

	/// Create middleware sharing existing configuration and collaborators
	pub fn with_context(scopes: Arc<ConfigScopes>, context: Arc<FilterContext>) -> Self {
		Self { scopes, context }
	}
}

#[async_trait]
impl Middleware for XSendFileMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
		let info = RequestInfo::from(&request);
		let config = self.scopes.resolve(info.filename.as_deref());

		let mut response = next.handle(request).await?;

		let mut filter = SendFileFilter::new(config, &self.context);
		let outcome = filter.process(&info, &mut response);
		tracing::trace!(?outcome, range_allowed = response.range_allowed, "x-sendfile stage finished");
		Ok(response)
	}

	fn should_continue(&self, request: &Request) -> bool {
		self.scopes.resolve(request.filename()).is_active()
	}
}

/// Startup wiring for the X-Sendfile stage.
///
/// Collects configuration and collaborators once, then hands out
/// middleware instances that share them.
#[derive(Clone, Debug, Default)]
pub struct XSendFileModule {
	scopes: Arc<ConfigScopes>,
	context: FilterContext,
}

impl XSendFileModule {
	pub fn new(scopes: ConfigScopes) -> Self {
		Self {
			scopes: Arc::new(scopes),
			context: FilterContext::default(),
		}
	}

	/// Builds a module from parsed settings.
	pub fn from_settings(settings: Settings) -> Self {
		Self::new(settings.scopes).with_core(settings.core)
	}

	pub fn with_core(mut self, core: CoreSettings) -> Self {
		self.context.core = core;
		self
	}

	/// Produces compressed artifacts with `compressor`.
	pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
		self.context.compression = Some(CompressionCache::new(compressor));
		self
	}

	/// Always serves the uncompressed file.
	pub fn without_compression(mut self) -> Self {
		self.context.compression = None;
		self
	}

	pub fn with_conditions(mut self, conditions: Arc<dyn ConditionEvaluator>) -> Self {
		self.context.conditions = conditions;
		self
	}

	/// Maps rewritten request URIs back to filesystem paths.
	pub fn with_uri_mapper(mut self, mapper: Arc<dyn UriMapper>) -> Self {
		self.context.mapper = Some(mapper);
		self
	}

	pub fn scopes(&self) -> &ConfigScopes {
		&self.scopes
	}

	pub fn core(&self) -> &CoreSettings {
		&self.context.core
	}

	/// Returns a middleware sharing this module's configuration.
	pub fn middleware(&self) -> Arc<dyn Middleware> {
		Arc::new(XSendFileMiddleware::with_context(
			Arc::clone(&self.scopes),
			Arc::new(self.context.clone()),
		))
	}

	/// Appends the middleware to `chain`.
	pub fn register(&self, chain: MiddlewareChain) -> MiddlewareChain {
		tracing::debug!(
			directories = self.scopes.directories.len(),
			"registering X-Sendfile middleware"
		);
		chain.with_middleware(self.middleware())
	}
}
