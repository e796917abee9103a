//! # XSendFile
//!
//! Lets a backend hand file delivery back to the server: the backend answers
//! with a small response carrying `X-Sendfile: <path>` and the server streams
//! the named file instead, with validators, conditional requests and cached
//! gzip artifacts.
//!
//! ## Crates
//!
//! - [`http`] - Request, response, body and middleware abstractions
//! - [`middleware`] - The substitution stage and its configuration
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//! use xsendfile::prelude::*;
//!
//! struct Export;
//!
//! #[async_trait::async_trait]
//! impl Handler for Export {
//!     async fn handle(&self, _request: Request) -> xsendfile::http::Result<Response> {
//!         Ok(Response::ok().with_header("X-Sendfile-Temporary", "export.csv"))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let spool = tempfile::tempdir().unwrap();
//! std::fs::write(spool.path().join("export.csv"), "id,name\n").unwrap();
//!
//! let scopes = parse_config(&format!(
//!     "XSendFile On\nXSendFilePath \"{}\" AllowFileDelete",
//!     spool.path().display()
//! ))
//! .unwrap();
//! let chain = XSendFileModule::new(scopes).register(MiddlewareChain::new(Arc::new(Export)));
//!
//! let response = chain.handle(Request::builder().build().unwrap()).await.unwrap();
//! assert_eq!(response.status, hyper::StatusCode::OK);
//! drop(response);
//! assert!(!spool.path().join("export.csv").exists());
//! # });
//! ```

/// Request, response and middleware abstractions
pub mod http {
	pub use xsendfile_http::*;
}

/// File substitution middleware
pub mod middleware {
	pub use xsendfile_middleware::*;
}

pub use xsendfile_http::{Body, FileBody, Handler, Middleware, MiddlewareChain, Request, Response};
pub use xsendfile_middleware::{
	ConfigScopes, CoreSettings, SendFileError, Settings, XSendFileConfig, XSendFileMiddleware,
	XSendFileModule, parse_config,
};

/// Commonly used types
pub mod prelude {
	pub use crate::{
		ConfigScopes, CoreSettings, Handler, Middleware, MiddlewareChain, Request, Response,
		Settings, XSendFileConfig, XSendFileModule, parse_config,
	};
}
