//! Evaluation of conditional request headers.
//!
//! Handles If-Match, If-Unmodified-Since, If-None-Match and
//! If-Modified-Since in the order required for conditional GET, and reports
//! whether If-Range allows a later range stage to honour `Range`.

use hyper::header::{
	ETAG, HeaderName, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE,
	LAST_MODIFIED, RANGE,
};
use hyper::{HeaderMap, Method, StatusCode};
use std::time::SystemTime;
use xsendfile_http::Response;

/// Result of checking a request's preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
	/// Send the full response; `honor_range` tells a range stage whether
	/// `Range` may be applied
	Proceed { honor_range: bool },
	/// 304 Not Modified
	NotModified,
	/// 412 Precondition Failed
	Failed,
}

impl Precondition {
	pub fn status(&self) -> StatusCode {
		match self {
			Precondition::Proceed { .. } => StatusCode::OK,
			Precondition::NotModified => StatusCode::NOT_MODIFIED,
			Precondition::Failed => StatusCode::PRECONDITION_FAILED,
		}
	}

	pub fn is_proceed(&self) -> bool {
		matches!(self, Precondition::Proceed { .. })
	}
}

/// Validators of the representation about to be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
	pub etag: Option<String>,
	pub last_modified: Option<SystemTime>,
}

impl Validators {
	/// Reads `ETag` and `Last-Modified` from response headers.
	pub fn from_headers(headers: &HeaderMap) -> Self {
		Self {
			etag: header_str(headers, ETAG).map(str::to_string),
			last_modified: header_str(headers, LAST_MODIFIED).and_then(parse_date),
		}
	}

	/// Reads validators from a response, preferring the primary header set.
	pub fn from_response(response: &Response) -> Self {
		let primary = Self::from_headers(&response.headers);
		let fallback = Self::from_headers(&response.err_headers);
		Self {
			etag: primary.etag.or(fallback.etag),
			last_modified: primary.last_modified.or(fallback.last_modified),
		}
	}
}

/// Decides whether a conditional request can be answered with the full body.
pub trait ConditionEvaluator: Send + Sync {
	fn evaluate(
		&self,
		method: &Method,
		request_headers: &HeaderMap,
		validators: &Validators,
		request_time: SystemTime,
	) -> Precondition;
}

/// Standard HTTP precondition semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConditions;

impl ConditionEvaluator for StandardConditions {
	fn evaluate(
		&self,
		method: &Method,
		request_headers: &HeaderMap,
		validators: &Validators,
		request_time: SystemTime,
	) -> Precondition {
		let header = |name: HeaderName| header_str(request_headers, name);
		let safe = *method == Method::GET || *method == Method::HEAD;

		if let Some(if_match) = header(IF_MATCH) {
			let matched = if_match.trim() == "*"
				|| validators
					.etag
					.as_deref()
					.is_some_and(|etag| etag_list_matches(if_match, etag, true));
			if !matched {
				return Precondition::Failed;
			}
		} else if let Some(since) = header(IF_UNMODIFIED_SINCE).and_then(parse_date)
			&& let Some(modified) = validators.last_modified
			&& modified > since
		{
			return Precondition::Failed;
		}

		if let Some(if_none_match) = header(IF_NONE_MATCH) {
			let matched = if_none_match.trim() == "*"
				|| validators
					.etag
					.as_deref()
					.is_some_and(|etag| etag_list_matches(if_none_match, etag, false));
			if matched {
				return if safe {
					Precondition::NotModified
				} else {
					Precondition::Failed
				};
			}
		} else if safe
			&& let Some(since) = header(IF_MODIFIED_SINCE).and_then(parse_date)
			&& since <= request_time
			&& let Some(modified) = validators.last_modified
			&& modified <= since
		{
			return Precondition::NotModified;
		}

		let honor_range = match (header(IF_RANGE), request_headers.contains_key(RANGE)) {
			(Some(if_range), true) => if_range_matches(if_range, validators),
			_ => true,
		};
		Precondition::Proceed { honor_range }
	}
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
	headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_date(value: &str) -> Option<SystemTime> {
	httpdate::parse_http_date(value).ok()
}

/// Compares one entity tag against a comma-separated list.
///
/// Strong comparison requires both tags to be strong and identical; weak
/// comparison ignores the `W/` prefix.
fn etag_list_matches(list: &str, etag: &str, strong: bool) -> bool {
	let (etag_weak, etag_value) = split_weak(etag.trim());
	if strong && etag_weak {
		return false;
	}
	list.split(',').map(str::trim).any(|candidate| {
		let (weak, value) = split_weak(candidate);
		value == etag_value && !(strong && weak)
	})
}

fn split_weak(tag: &str) -> (bool, &str) {
	match tag.strip_prefix("W/") {
		Some(rest) => (true, rest),
		None => (false, tag),
	}
}

fn if_range_matches(if_range: &str, validators: &Validators) -> bool {
	let if_range = if_range.trim();
	if if_range.starts_with('"') || if_range.starts_with("W/") {
		return validators
			.etag
			.as_deref()
			.is_some_and(|etag| etag_list_matches(if_range, etag, true));
	}
	match (parse_date(if_range), validators.last_modified) {
		(Some(date), Some(modified)) => date == modified,
		_ => false,
	}
}
