//! # xsendfile-http
//!
//! Request, response and middleware abstractions shared by the X-Sendfile
//! pipeline.
//!
//! ## Components
//!
//! - [`Request`]: the dispatched request, including the filesystem path it
//!   mapped to and its sub-request status
//! - [`Response`]: status, primary and error-path header sets, and a [`Body`]
//! - [`FileBody`] / [`OpenFile`]: file-backed bodies split into segments
//! - [`Handler`] / [`Middleware`] / [`MiddlewareChain`]: request processing

pub mod body;
pub mod error;
pub mod file;
pub mod middleware;
pub mod request;
pub mod response;

pub use body::{Body, BoxError, Bucket, FileBody, StreamBody, TransferHints};
pub use error::{Error, Result};
pub use file::{FileInfo, OpenFile};
pub use middleware::{Handler, Middleware, MiddlewareChain};
pub use request::{Request, RequestBuilder};
pub use response::Response;
