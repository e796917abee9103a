//! # XSendFile Middleware
//!
//! Response-side file substitution: a backend names a file in an
//! `X-Sendfile` (or `X-Sendfile-Temporary`) response header and the
//! middleware streams that file to the client instead of the backend's body.
//!
//! ## Features
//!
//! - **Allowed roots**: sentinel paths are confined to configured directories;
//!   `..` and symlinks cannot escape them
//! - **Temporary files**: `X-Sendfile-Temporary` deletes the file after it was
//!   sent, only below roots marked `AllowFileDelete`
//! - **Compression**: `.css`, `.js`, `.html` and `.json` files get a cached
//!   gzip sibling (`<file>.gz`) that is refreshed when the source changes
//! - **Conditional requests**: `ETag` and `Last-Modified` are derived from the
//!   file, and `If-None-Match` / `If-Modified-Since` produce 304 responses
//! - **Scoped configuration**: server defaults with per-directory overrides,
//!   from directive text or TOML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use xsendfile_middleware::{XSendFileModule, directives::parse_config};
//! use xsendfile_http::MiddlewareChain;
//! use std::sync::Arc;
//!
//! let scopes = parse_config(r#"
//!     XSendFile On
//!     XSendFilePath /var/data
//!     XSendFilePath /var/tmp/exports AllowFileDelete
//! "#)?;
//!
//! let module = XSendFileModule::new(scopes);
//! let chain = module.register(MiddlewareChain::new(Arc::new(app)));
//! ```
//!
//! ## Module Structure
//!
//! - [`scanner`] - Sentinel header detection
//! - [`resolver`] - Sentinel to filesystem path resolution
//! - [`compression`] - Compressed artifact cache
//! - [`assembler`] - File body and validator headers
//! - [`conditions`] - Conditional request evaluation
//! - [`filter`] - Per-request state machine
//! - [`middleware`] - Middleware and startup wiring
//! - [`config`] / [`directives`] - Configuration
//! - [`error`] - Error types

pub mod assembler;
pub mod compression;
pub mod conditions;
pub mod config;
pub mod directives;
pub mod error;
pub mod filter;
pub mod middleware;
pub mod resolver;
pub mod scanner;
pub mod validators;

// Re-export main types
pub use assembler::ResponseAssembler;
pub use compression::{CommandCompressor, CompressionCache, Compressor, GzipCompressor};
pub use conditions::{ConditionEvaluator, Precondition, StandardConditions, Validators};
pub use config::{
	AllowedRoot, ConfigScopes, CoreSettings, DirectoryScope, EtagComponents, Settings, TriState,
	XSendFileConfig,
};
pub use directives::parse_config;
pub use error::{CompressionError, ConfigError, Result, SendFileError};
pub use filter::{FilterContext, FilterOutcome, FilterState, RequestInfo, SendFileFilter};
pub use middleware::{XSendFileMiddleware, XSendFileModule};
pub use resolver::{MappedPath, PathResolver, UriMapper};
pub use scanner::{DeliveryMode, DeliveryRequest, X_SENDFILE, X_SENDFILE_TEMPORARY};
