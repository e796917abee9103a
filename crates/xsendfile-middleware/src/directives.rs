//! Parser for server-style configuration directives.
//!
//! ```text
//! XSendFile On
//! XSendFilePath /var/data
//!
//! <Directory /srv/app/uploads>
//!     XSendFileIgnoreEtag On
//!     XSendFilePath /var/spool/out AllowFileDelete
//! </Directory>
//! ```
//!
//! Directive names and flag values are case-insensitive. Arguments are
//! separated by whitespace and may be double-quoted.

use std::path::PathBuf;

use crate::config::{AllowedRoot, ConfigScopes, DirectoryScope, TriState, XSendFileConfig};
use crate::error::ConfigError;

/// Parses directive text into configuration scopes.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use xsendfile_middleware::directives::parse_config;
///
/// let scopes = parse_config(r#"
/// XSendFile On
/// XSendFilePath /var/data
/// <Directory /srv/app>
///     XSendFileUnescape Off
/// </Directory>
/// "#).unwrap();
///
/// let config = scopes.resolve(Some(Path::new("/srv/app/index.php")));
/// assert!(config.is_active());
/// assert!(!config.unescapes());
/// assert_eq!(config.allowed_roots.len(), 1);
/// ```
pub fn parse_config(text: &str) -> Result<ConfigScopes, ConfigError> {
	let mut scopes = ConfigScopes::default();
	let mut open_block: Option<(usize, PathBuf, XSendFileConfig)> = None;

	for (index, raw) in text.lines().enumerate() {
		let line_no = index + 1;
		let line = raw.trim();
		if line.is_empty() || line.starts_with('#') {
			continue;
		}

		if let Some(rest) = line.strip_prefix("</") {
			if !rest.trim_end_matches('>').trim().eq_ignore_ascii_case("directory") {
				return Err(ConfigError::UnknownDirective {
					line: line_no,
					name: line.to_string(),
				});
			}
			let Some((_, path, config)) = open_block.take() else {
				return Err(ConfigError::UnbalancedBlock { line: line_no });
			};
			scopes.directories.push(DirectoryScope { path, config });
			continue;
		}

		if let Some(rest) = line.strip_prefix('<') {
			let Some(inner) = rest.strip_suffix('>') else {
				return Err(invalid(line_no, "<Directory>", "missing closing '>'"));
			};
			let args = split_args(inner);
			if !args
				.first()
				.is_some_and(|name| name.eq_ignore_ascii_case("directory"))
			{
				return Err(ConfigError::UnknownDirective {
					line: line_no,
					name: args.first().cloned().unwrap_or_default(),
				});
			}
			if open_block.is_some() {
				return Err(ConfigError::UnbalancedBlock { line: line_no });
			}
			let [_, path] = args.as_slice() else {
				return Err(invalid(line_no, "<Directory>", "expects exactly one path"));
			};
			let path = absolute_path(path)?;
			open_block = Some((line_no, path, XSendFileConfig::default()));
			continue;
		}

		let target = match open_block.as_mut() {
			Some((_, _, config)) => config,
			None => &mut scopes.server,
		};
		apply_directive(target, line_no, &split_args(line))?;
	}

	if let Some((line, _, _)) = open_block {
		return Err(ConfigError::UnbalancedBlock { line });
	}

	Ok(scopes)
}

fn apply_directive(
	config: &mut XSendFileConfig,
	line: usize,
	args: &[String],
) -> Result<(), ConfigError> {
	let Some((name, values)) = args.split_first() else {
		return Ok(());
	};

	let flag = |slot: &mut TriState| -> Result<(), ConfigError> {
		let [value] = values else {
			return Err(invalid(line, name, "expects On or Off"));
		};
		*slot = parse_flag(value).ok_or_else(|| invalid(line, name, "expects On or Off"))?;
		Ok(())
	};

	match name.to_ascii_lowercase().as_str() {
		"xsendfile" => flag(&mut config.active),
		"xsendfileignoreetag" => flag(&mut config.ignore_etag),
		"xsendfileignorelastmodified" => flag(&mut config.ignore_last_modified),
		"xsendfileunescape" => flag(&mut config.unescape),
		"xsendfilepath" => {
			let root = match values {
				[path] => AllowedRoot::new(absolute_path(path)?),
				[path, option] if option.eq_ignore_ascii_case("allowfiledelete") => {
					AllowedRoot::deletable(absolute_path(path)?)
				}
				[_, option] => {
					return Err(invalid(
						line,
						name,
						&format!("unknown option {option:?}, expected AllowFileDelete"),
					));
				}
				_ => return Err(invalid(line, name, "expects a path and optional AllowFileDelete")),
			};
			config.allowed_roots.push(root);
			Ok(())
		}
		_ => Err(ConfigError::UnknownDirective {
			line,
			name: name.clone(),
		}),
	}
}

fn parse_flag(value: &str) -> Option<TriState> {
	if value.eq_ignore_ascii_case("on") {
		Some(TriState::Enabled)
	} else if value.eq_ignore_ascii_case("off") {
		Some(TriState::Disabled)
	} else {
		None
	}
}

fn absolute_path(raw: &str) -> Result<PathBuf, ConfigError> {
	let path = PathBuf::from(raw);
	if path.is_absolute() {
		Ok(path)
	} else {
		Err(ConfigError::RelativePath(path))
	}
}

fn invalid(line: usize, directive: &str, message: &str) -> ConfigError {
	ConfigError::InvalidArgument {
		line,
		directive: directive.to_string(),
		message: message.to_string(),
	}
}

/// Splits on whitespace, keeping double-quoted runs together.
fn split_args(line: &str) -> Vec<String> {
	let mut args = Vec::new();
	let mut current = String::new();
	let mut quoted = false;
	let mut has_token = false;

	for ch in line.chars() {
		match ch {
			'"' => {
				quoted = !quoted;
				has_token = true;
			}
			c if c.is_whitespace() && !quoted => {
				if has_token {
					args.push(std::mem::take(&mut current));
					has_token = false;
				}
			}
			c => {
				current.push(c);
				has_token = true;
			}
		}
	}
	if has_token {
		args.push(current);
	}
	args
}
