//! Error Path Integration Tests
//!
//! Sentinels that must not be served:
//! - Paths escaping every allowed root (404)
//! - Malformed escape sequences (500)
//! - Temporary delivery below a root without AllowFileDelete (404)
//! - Directories, missing files and symlinks out of a root (404)
//! - Invalid configuration text


use fixtures::*;
use hyper::StatusCode;
use rstest::rstest;
use xsendfile_middleware::{ConfigError, parse_config};

/// Asserts that the backend response was fully replaced by `status`
fn assert_replaced(response: &xsendfile_http::Response, status: StatusCode) {
	assert_eq!(response.status, status);
	assert!(response.body.is_empty());
	assert!(response.headers.is_empty());
	assert!(response.err_headers.is_empty());
}

#[rstest]
#[case("../outside/secret.txt")]
#[case("reports/../../outside/secret.txt")]
#[case("%2e%2e/outside/secret.txt")]
#[tokio::test]
async fn test_traversal_is_not_found(site: TempDir, #[case] sentinel: &str) {
	let module = site_module(&site);

	let response = run(
		&module,
		SentinelBackend::sending(sentinel),
		create_request("/download", &[]),
	)
	.await;

	assert_replaced(&response, StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn test_absolute_path_outside_roots_is_not_found(site: TempDir) {
	let module = site_module(&site);
	let secret = site.join("outside/secret.txt");

	let response = run(
		&module,
		SentinelBackend::sending(secret.to_str().unwrap()),
		create_request("/download", &[]),
	)
	.await;

	assert_replaced(&response, StatusCode::NOT_FOUND);
}

#[rstest]
#[case("bad%zzname")]
#[case("truncated%4")]
#[case("reports%2Fq1.csv")]
#[tokio::test]
async fn test_bad_encoding_is_server_error(site: TempDir, #[case] sentinel: &str) {
	let module = site_module(&site);

	let response = run(
		&module,
		SentinelBackend::sending(sentinel),
		create_request("/download", &[]),
	)
	.await;

	assert_replaced(&response, StatusCode::INTERNAL_SERVER_ERROR);
}

#[rstest]
#[tokio::test]
async fn test_temporary_requires_deletable_root(site: TempDir) {
	let module = site_module(&site);
	let report = site.join("data/reports/q1.csv");

	let response = run(
		&module,
		SentinelBackend::temporary(report.to_str().unwrap()),
		create_request("/download", &[]),
	)
	.await;

	assert_replaced(&response, StatusCode::NOT_FOUND);
	assert!(report.exists());
}

#[rstest]
#[case("reports")]
#[case("reports/missing.csv")]
#[tokio::test]
async fn test_unservable_entries_are_not_found(site: TempDir, #[case] sentinel: &str) {
	let module = site_module(&site);

	let response = run(
		&module,
		SentinelBackend::sending(sentinel),
		create_request("/download", &[]),
	)
	.await;

	assert_replaced(&response, StatusCode::NOT_FOUND);
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn test_symlink_out_of_root_is_not_found(site: TempDir) {
	std::os::unix::fs::symlink(site.join("outside/secret.txt"), site.join("data/escape.txt"))
		.unwrap();
	let module = site_module(&site);

	let response = run(
		&module,
		SentinelBackend::sending("escape.txt"),
		create_request("/download", &[]),
	)
	.await;

	assert_replaced(&response, StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn test_no_roots_fails_closed(site: TempDir) {
	let module = xsendfile_middleware::XSendFileModule::new(xsendfile_middleware::ConfigScopes::new(
		xsendfile_middleware::XSendFileConfig::new().with_active(true),
	));
	let report = site.join("data/reports/q1.csv");

	let response = run(
		&module,
		SentinelBackend::sending(report.to_str().unwrap()),
		create_request("/download", &[]),
	)
	.await;

	assert_replaced(&response, StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn test_backend_error_headers_dropped_on_failure(site: TempDir) {
	let module = site_module(&site);
	let backend = SentinelBackend::sending("missing.bin")
		.with_err_header("Set-Cookie", "session=abc")
		.with_header("Content-Type", "application/zip");

	let response = run(&module, backend, create_request("/download", &[])).await;

	assert_replaced(&response, StatusCode::NOT_FOUND);
}

#[rstest]
#[case("XSendFile Maybe", 1)]
#[case("XSendFile", 1)]
#[case("XSendFile On\nXSendFilePath /srv/files Sometimes", 2)]
fn test_invalid_argument_reports_line(#[case] text: &str, #[case] line: usize) {
	let error = parse_config(text).unwrap_err();

	match error {
		ConfigError::InvalidArgument { line: found, .. } => assert_eq!(found, line),
		other => panic!("unexpected error: {other}"),
	}
}

#[rstest]
fn test_relative_root_rejected() {
	let error = parse_config("XSendFilePath relative/dir").unwrap_err();

	assert!(matches!(error, ConfigError::RelativePath(path) if path.ends_with("dir")));
}

#[rstest]
#[case("XSendFile On\nXSendFileBogus On", ConfigErrorKind::Unknown)]
#[case("<Directory /srv>\nXSendFile On", ConfigErrorKind::Unbalanced)]
#[case("</Directory>", ConfigErrorKind::Unbalanced)]
fn test_structural_config_errors(#[case] text: &str, #[case] kind: ConfigErrorKind) {
	let error = parse_config(text).unwrap_err();

	let actual = match error {
		ConfigError::UnknownDirective { .. } => ConfigErrorKind::Unknown,
		ConfigError::UnbalancedBlock { .. } => ConfigErrorKind::Unbalanced,
		other => panic!("unexpected error: {other}"),
	};
	assert_eq!(actual, kind);
}

#[derive(Debug, PartialEq, Eq)]
enum ConfigErrorKind {
	Unknown,
	Unbalanced,
}
