//! Test fixtures for xsendfile-middleware
//!
//! Directory layout created by [`site`]:
//!
//! ```text
//! data/                 allowed root
//!   reports/q1.csv
//!   app.js
//!   with space.txt
//!   shared.txt
//! exports/              allowed root, AllowFileDelete
//!   export.zip
//! mirror/shared.txt     not allowed unless a test adds it
//! outside/secret.txt    never allowed
//! www/index.php         document root of the dispatched request
//! ```

use async_trait::async_trait;
use hyper::StatusCode;
use rstest::fixture;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir as TempDirType;
use xsendfile_http::{Body, Handler, MiddlewareChain, Request, Response, Result};
use xsendfile_middleware::{XSendFileConfig, XSendFileModule};

pub const REPORT: &str = "region,total\nnorth,10\nsouth,12\n";
pub const SCRIPT: &str = "function greet(name) { return 'hello ' + name; }\n";
pub const BACKEND_BODY: &str = "backend body";

/// Wrapper for tempfile TempDir keeping the canonical root path
pub struct TempDir {
	inner: TempDirType,
	root: PathBuf,
}

impl TempDir {
	fn new(temp_dir: TempDirType) -> Self {
		let root = fs::canonicalize(temp_dir.path()).unwrap();
		Self {
			inner: temp_dir,
			root,
		}
	}

	pub fn path(&self) -> &Path {
		&self.root
	}

	pub fn join(&self, relative: &str) -> PathBuf {
		self.root.join(relative)
	}

	pub fn data(&self) -> PathBuf {
		self.join("data")
	}

	pub fn exports(&self) -> PathBuf {
		self.join("exports")
	}
}

/// Creates the directory tree described in the module docs
#[fixture]
pub fn site() -> TempDir {
	let dir = TempDir::new(TempDirType::new().unwrap());

	for sub in ["data/reports", "exports", "mirror", "outside", "www"] {
		fs::create_dir_all(dir.join(sub)).unwrap();
	}
	fs::write(dir.join("data/reports/q1.csv"), REPORT).unwrap();
	fs::write(dir.join("data/app.js"), SCRIPT.repeat(20)).unwrap();
	fs::write(dir.join("data/with space.txt"), "spaced").unwrap();
	fs::write(dir.join("data/shared.txt"), "from data").unwrap();
	fs::write(dir.join("exports/export.zip"), b"PK\x03\x04 export").unwrap();
	fs::write(dir.join("mirror/shared.txt"), "from mirror").unwrap();
	fs::write(dir.join("outside/secret.txt"), "secret").unwrap();
	fs::write(dir.join("www/index.php"), "<?php").unwrap();

	dir
}

/// Active configuration with `data` and a deletable `exports` root
pub fn site_config(site: &TempDir) -> XSendFileConfig {
	XSendFileConfig::new()
		.with_active(true)
		.with_root(site.data())
		.with_deletable_root(site.exports())
}

pub fn site_module(site: &TempDir) -> XSendFileModule {
	XSendFileModule::new(xsendfile_middleware::ConfigScopes::new(site_config(site)))
}

/// Backend handler answering with fixed headers
pub struct SentinelBackend {
	status: StatusCode,
	headers: Vec<(String, String)>,
	err_headers: Vec<(String, String)>,
}

impl SentinelBackend {
	/// A backend that sets no sentinel
	pub fn plain() -> Self {
		Self {
			status: StatusCode::OK,
			headers: vec![("Content-Length".into(), BACKEND_BODY.len().to_string())],
			err_headers: Vec::new(),
		}
	}

	/// A backend asking for `value` to be sent
	pub fn sending(value: impl Into<String>) -> Self {
		Self::plain().with_header("X-Sendfile", value)
	}

	/// A backend asking for `value` to be sent and deleted
	pub fn temporary(value: impl Into<String>) -> Self {
		Self::plain().with_header("X-Sendfile-Temporary", value)
	}

	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status = status;
		self
	}

	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.push((name.to_string(), value.into()));
		self
	}

	pub fn with_err_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.err_headers.push((name.to_string(), value.into()));
		self
	}
}

#[async_trait]
impl Handler for SentinelBackend {
	async fn handle(&self, _request: Request) -> Result<Response> {
		let mut response = Response::new(self.status).with_body(BACKEND_BODY);
		for (name, value) in &self.headers {
			response = response.with_header(name, value);
		}
		for (name, value) in &self.err_headers {
			response = response.with_err_header(name, value);
		}
		Ok(response)
	}
}

/// Creates a GET request for `uri` with extra headers
pub fn create_request(uri: &str, headers: &[(&str, &str)]) -> Request {
	headers
		.iter()
		.fold(Request::builder().uri(uri), |builder, (name, value)| {
			builder.header(name, value)
		})
		.build()
		.unwrap()
}

/// Runs `request` through a chain of `backend` wrapped by `module`
pub async fn run(module: &XSendFileModule, backend: SentinelBackend, request: Request) -> Response {
	let chain = module.register(MiddlewareChain::new(Arc::new(backend)));
	chain.handle(request).await.unwrap()
}

/// Reads the whole response body
pub fn body_bytes(response: &Response) -> Vec<u8> {
	match &response.body {
		Body::Empty => Vec::new(),
		Body::Bytes(bytes) => bytes.to_vec(),
		Body::File(file) => file.read_to_bytes().unwrap().to_vec(),
		Body::Stream(_) => panic!("stream bodies are not produced by the filter"),
	}
}

/// Decompresses gzip data
pub fn gunzip(data: &[u8]) -> String {
	let mut decoded = String::new();
	flate2::read::GzDecoder::new(data)
		.read_to_string(&mut decoded)
		.unwrap();
	decoded
}

pub fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
	response
		.headers
		.get(name)
		.and_then(|value| value.to_str().ok())
}
