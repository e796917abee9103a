//! Conditional-response validators derived from file metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use xsendfile_http::FileInfo;

use crate::config::EtagComponents;

/// Modification time advertised in `Last-Modified`.
///
/// A file modified after the request arrived is reported as modified at
/// the request time, so clients never see a date in the future.
pub fn last_modified(modified: SystemTime, request_time: SystemTime) -> SystemTime {
	modified.min(request_time)
}

/// Formats a `Last-Modified` header value.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use xsendfile_middleware::validators::format_last_modified;
///
/// let mtime = UNIX_EPOCH + Duration::from_secs(1_445_412_480);
/// let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
/// assert_eq!(format_last_modified(mtime, now), "Wed, 21 Oct 2015 07:28:00 GMT");
/// ```
pub fn format_last_modified(modified: SystemTime, request_time: SystemTime) -> String {
	httpdate::fmt_http_date(last_modified(modified, request_time))
}

/// Builds an entity tag from the selected file attributes.
///
/// The tag is `"inode-size-mtime"` with each selected attribute in hex and
/// mtime in microseconds. A file modified less than a second before the
/// request may still be changing, so its tag is weak. Returns `None` when no
/// attribute is selected.
pub fn make_etag(info: &FileInfo, components: EtagComponents, request_time: SystemTime) -> Option<String> {
	if components.is_none() {
		return None;
	}

	let mut parts = Vec::with_capacity(3);
	if components.inode {
		parts.push(format!("{:x}", info.inode));
	}
	if components.size {
		parts.push(format!("{:x}", info.size));
	}
	if components.mtime {
		parts.push(format!("{:x}", micros_since_epoch(info.modified)));
	}

	let weak = match request_time.duration_since(info.modified) {
		Ok(age) => age < Duration::from_secs(1),
		Err(_) => true,
	};

	let tag = format!("\"{}\"", parts.join("-"));
	Some(if weak { format!("W/{tag}") } else { tag })
}

fn micros_since_epoch(time: SystemTime) -> u128 {
	time.duration_since(UNIX_EPOCH)
		.map(|d| d.as_micros())
		.unwrap_or(0)
}
