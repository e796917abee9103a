//! Happy Path Integration Tests
//!
//! End-to-end deliveries through a middleware chain:
//! - Persistent delivery by absolute and relative sentinel
//! - Gzip artifact selection for compressible files
//! - Temporary delivery and removal after sending
//! - Streaming the file body
//! - Configuration loaded from directive text and TOML


use fixtures::*;
use futures::StreamExt;
use hyper::StatusCode;
use rstest::rstest;
use std::fs;
use xsendfile_middleware::{ConfigScopes, Settings, XSendFileModule, parse_config};

#[rstest]
#[tokio::test]
async fn test_absolute_sentinel_serves_file(site: TempDir) {
	let module = site_module(&site);
	let path = site.join("data/reports/q1.csv");
	let backend = SentinelBackend::sending(path.to_str().unwrap());

	let response = run(&module, backend, create_request("/reports/q1", &[])).await;

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(body_bytes(&response), REPORT.as_bytes());
	assert_eq!(
		header(&response, "content-length"),
		Some(REPORT.len().to_string().as_str())
	);
	assert!(header(&response, "last-modified").is_some());
	assert!(header(&response, "etag").is_some());
	assert!(header(&response, "x-sendfile").is_none());
	assert_eq!(response.file_info.unwrap().size, REPORT.len() as u64);
}

#[rstest]
#[tokio::test]
async fn test_relative_sentinel_resolves_against_root(site: TempDir) {
	let module = site_module(&site);

	let response = run(
		&module,
		SentinelBackend::sending("reports/q1.csv"),
		create_request("/download", &[]),
	)
	.await;

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(body_bytes(&response), REPORT.as_bytes());
}

#[rstest]
#[tokio::test]
async fn test_gzip_artifact_served_when_accepted(site: TempDir) {
	let module = site_module(&site);
	let request = create_request("/app.js", &[("Accept-Encoding", "br, gzip;q=0.8")]);

	let response = run(&module, SentinelBackend::sending("app.js"), request).await;

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(header(&response, "content-encoding"), Some("gzip"));
	assert_eq!(header(&response, "vary"), Some("Accept-Encoding"));
	let artifact = site.join("data/app.js.gz");
	assert!(artifact.exists());
	let artifact_len = fs::metadata(&artifact).unwrap().len();
	assert_eq!(
		header(&response, "content-length"),
		Some(artifact_len.to_string().as_str())
	);
	assert_eq!(gunzip(&body_bytes(&response)), SCRIPT.repeat(20));
}

#[rstest]
#[tokio::test]
async fn test_identity_served_without_accept_encoding(site: TempDir) {
	let module = site_module(&site);

	let response = run(
		&module,
		SentinelBackend::sending("app.js"),
		create_request("/app.js", &[]),
	)
	.await;

	assert!(header(&response, "content-encoding").is_none());
	assert_eq!(header(&response, "vary"), Some("Accept-Encoding"));
	assert_eq!(body_bytes(&response), SCRIPT.repeat(20).as_bytes());
	assert!(!site.join("data/app.js.gz").exists());
}

#[rstest]
#[tokio::test]
async fn test_temporary_file_removed_after_response(site: TempDir) {
	let module = site_module(&site);
	let export = site.join("exports/export.zip");

	let response = run(
		&module,
		SentinelBackend::temporary(export.to_str().unwrap()),
		create_request("/export", &[]),
	)
	.await;

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(body_bytes(&response), b"PK\x03\x04 export");
	assert!(export.exists());

	drop(response);
	assert!(!export.exists());
}

#[rstest]
#[tokio::test]
async fn test_file_body_streams_in_chunks(site: TempDir) {
	let module = site_module(&site);
	let response = run(
		&module,
		SentinelBackend::sending("reports/q1.csv"),
		create_request("/reports/q1", &[]),
	)
	.await;

	let xsendfile_http::Body::File(body) = response.body else {
		panic!("expected a file body");
	};
	let chunks: Vec<_> = body.into_stream(8).collect().await;

	assert_eq!(chunks.len(), REPORT.len().div_ceil(8));
	let joined: Vec<u8> = chunks
		.into_iter()
		.flat_map(|chunk| chunk.unwrap().to_vec())
		.collect();
	assert_eq!(joined, REPORT.as_bytes());
}

#[rstest]
#[tokio::test]
async fn test_directive_configuration(site: TempDir) {
	let text = format!(
		"# downloads\nXSendFile On\nXSendFilePath \"{}\"\n",
		site.data().display()
	);
	let module = XSendFileModule::new(parse_config(&text).unwrap());

	let response = run(
		&module,
		SentinelBackend::sending("with%20space.txt"),
		create_request("/file", &[]),
	)
	.await;

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(body_bytes(&response), b"spaced");
}

#[rstest]
#[tokio::test]
async fn test_toml_configuration(site: TempDir) {
	let text = format!(
		r#"
[server]
active = true
paths = [{{ path = {:?} }}]

[core]
max_segment_size = 16
"#,
		site.data().to_str().unwrap()
	);
	let module = XSendFileModule::from_settings(Settings::from_toml_str(&text).unwrap());

	let response = run(
		&module,
		SentinelBackend::sending("reports/q1.csv"),
		create_request("/reports/q1", &[]),
	)
	.await;

	let body = response.body.as_file().unwrap();
	assert_eq!(body.segment_count(), REPORT.len().div_ceil(16));
	assert_eq!(body.read_to_bytes().unwrap().as_ref(), REPORT.as_bytes());
}

#[rstest]
#[tokio::test]
async fn test_directory_scope_enables_delivery(site: TempDir) {
	let scopes = ConfigScopes::default().with_directory(
		site.join("www"),
		site_config(&site),
	);
	let module = XSendFileModule::new(scopes);
	let request = xsendfile_http::Request::builder()
		.uri("/index.php")
		.filename(site.join("www/index.php"))
		.build()
		.unwrap();

	let response = run(&module, SentinelBackend::sending("shared.txt"), request).await;

	assert_eq!(body_bytes(&response), b"from data");
}
