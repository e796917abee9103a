//! Configuration for file substitution.
//!
//! Settings exist at two levels: a server-wide default and any number of
//! per-directory overrides. Every flag is tri-state so that an override can
//! leave a value unset and inherit it from the enclosing scope. Allowed roots
//! accumulate, with the inner scope's roots tried first.
//!
//! Configuration can be built in code, parsed from directive text
//! (see [`crate::directives`]) or loaded from TOML:
//!
//! ```toml
//! [server]
//! active = true
//! paths = [{ path = "/var/data" }, { path = "/var/spool/out", allow_delete = true }]
//!
//! [[directory]]
//! path = "/srv/app/public"
//! ignore_etag = true
//!
//! [core]
//! enable_mmap = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// A flag that may be explicitly on, explicitly off, or inherited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum TriState {
	#[default]
	Unset,
	Enabled,
	Disabled,
}

impl TriState {
	/// Merges an inner-scope value over an outer-scope value.
	///
	/// # Examples
	///
	/// ```
	/// use xsendfile_middleware::config::TriState;
	///
	/// assert_eq!(TriState::Unset.merge(TriState::Enabled), TriState::Enabled);
	/// assert_eq!(TriState::Disabled.merge(TriState::Enabled), TriState::Disabled);
	/// ```
	pub fn merge(self, parent: TriState) -> TriState {
		match self {
			TriState::Unset => parent,
			set => set,
		}
	}

	/// Resolves the flag, using `default` when it is still unset.
	pub fn unwrap_or(self, default: bool) -> bool {
		match self {
			TriState::Unset => default,
			TriState::Enabled => true,
			TriState::Disabled => false,
		}
	}
}

impl From<bool> for TriState {
	fn from(value: bool) -> Self {
		if value {
			TriState::Enabled
		} else {
			TriState::Disabled
		}
	}
}

impl From<Option<bool>> for TriState {
	fn from(value: Option<bool>) -> Self {
		value.map(TriState::from).unwrap_or_default()
	}
}

impl From<TriState> for Option<bool> {
	fn from(value: TriState) -> Self {
		match value {
			TriState::Unset => None,
			TriState::Enabled => Some(true),
			TriState::Disabled => Some(false),
		}
	}
}

/// A directory that sentinel paths may resolve into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedRoot {
	pub path: PathBuf,
	/// Whether temporary deliveries (which delete the file) may use this root
	#[serde(default)]
	pub allow_delete: bool,
}

impl AllowedRoot {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			allow_delete: false,
		}
	}

	pub fn deletable(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			allow_delete: true,
		}
	}
}

/// Settings for one configuration scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XSendFileConfig {
	pub active: TriState,
	pub ignore_etag: TriState,
	pub ignore_last_modified: TriState,
	pub unescape: TriState,
	#[serde(rename = "paths")]
	pub allowed_roots: Vec<AllowedRoot>,
}

impl XSendFileConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_active(mut self, active: bool) -> Self {
		self.active = active.into();
		self
	}

	pub fn with_ignore_etag(mut self, ignore: bool) -> Self {
		self.ignore_etag = ignore.into();
		self
	}

	pub fn with_ignore_last_modified(mut self, ignore: bool) -> Self {
		self.ignore_last_modified = ignore.into();
		self
	}

	pub fn with_unescape(mut self, unescape: bool) -> Self {
		self.unescape = unescape.into();
		self
	}

	/// Appends an allowed root without delete permission.
	pub fn with_root(mut self, path: impl Into<PathBuf>) -> Self {
		self.allowed_roots.push(AllowedRoot::new(path));
		self
	}

	/// Appends an allowed root that temporary deliveries may use.
	pub fn with_deletable_root(mut self, path: impl Into<PathBuf>) -> Self {
		self.allowed_roots.push(AllowedRoot::deletable(path));
		self
	}

	/// Merges this (inner) scope over `parent`.
	///
	/// Flags set here win; unset flags are inherited. The resulting root
	/// list is this scope's roots followed by the parent's.
	///
	/// # Examples
	///
	/// ```
	/// use xsendfile_middleware::config::XSendFileConfig;
	///
	/// let server = XSendFileConfig::new().with_active(true).with_root("/var/data");
	/// let dir = XSendFileConfig::new().with_ignore_etag(true).with_root("/srv/app/files");
	///
	/// let merged = dir.merge(&server);
	/// assert!(merged.is_active());
	/// assert!(merged.ignores_etag());
	/// assert_eq!(merged.allowed_roots[0].path.to_str(), Some("/srv/app/files"));
	/// assert_eq!(merged.allowed_roots[1].path.to_str(), Some("/var/data"));
	/// ```
	pub fn merge(&self, parent: &XSendFileConfig) -> XSendFileConfig {
		let mut allowed_roots = self.allowed_roots.clone();
		allowed_roots.extend(parent.allowed_roots.iter().cloned());

		XSendFileConfig {
			active: self.active.merge(parent.active),
			ignore_etag: self.ignore_etag.merge(parent.ignore_etag),
			ignore_last_modified: self.ignore_last_modified.merge(parent.ignore_last_modified),
			unescape: self.unescape.merge(parent.unescape),
			allowed_roots,
		}
	}

	/// Whether substitution is enabled (default off).
	pub fn is_active(&self) -> bool {
		self.active.unwrap_or(false)
	}

	/// Whether backend-supplied ETags are replaced (default off).
	pub fn ignores_etag(&self) -> bool {
		self.ignore_etag.unwrap_or(false)
	}

	/// Whether backend-supplied Last-Modified values are replaced (default off).
	pub fn ignores_last_modified(&self) -> bool {
		self.ignore_last_modified.unwrap_or(false)
	}

	/// Whether sentinel values are URL-unescaped (default on).
	pub fn unescapes(&self) -> bool {
		self.unescape.unwrap_or(true)
	}

	/// Checks that every allowed root is absolute.
	pub fn validate(&self) -> Result<(), ConfigError> {
		match self.allowed_roots.iter().find(|r| !r.path.is_absolute()) {
			Some(root) => Err(ConfigError::RelativePath(root.path.clone())),
			None => Ok(()),
		}
	}
}

/// Settings that apply below a directory prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryScope {
	pub path: PathBuf,
	#[serde(flatten)]
	pub config: XSendFileConfig,
}

/// Server default plus per-directory overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigScopes {
	pub server: XSendFileConfig,
	#[serde(rename = "directory")]
	pub directories: Vec<DirectoryScope>,
}

impl ConfigScopes {
	pub fn new(server: XSendFileConfig) -> Self {
		Self {
			server,
			directories: Vec::new(),
		}
	}

	pub fn with_directory(mut self, path: impl Into<PathBuf>, config: XSendFileConfig) -> Self {
		self.directories.push(DirectoryScope {
			path: path.into(),
			config,
		});
		self
	}

	/// Computes the effective configuration for a request mapped to `path`.
	///
	/// Every directory scope containing `path` is merged over the server
	/// settings, shortest prefix first, so the most specific scope wins.
	/// Requests not mapped to the filesystem get the server settings.
	///
	/// # Examples
	///
	/// ```
	/// use std::path::Path;
	/// use xsendfile_middleware::config::{ConfigScopes, XSendFileConfig};
	///
	/// let scopes = ConfigScopes::new(XSendFileConfig::new().with_active(false))
	///     .with_directory("/srv/app", XSendFileConfig::new().with_active(true));
	///
	/// assert!(scopes.resolve(Some(Path::new("/srv/app/index.php"))).is_active());
	/// assert!(!scopes.resolve(Some(Path::new("/srv/other/index.php"))).is_active());
	/// assert!(!scopes.resolve(None).is_active());
	/// ```
	pub fn resolve(&self, path: Option<&Path>) -> XSendFileConfig {
		let Some(path) = path else {
			return self.server.clone();
		};

		let mut matching: Vec<&DirectoryScope> = self
			.directories
			.iter()
			.filter(|scope| path.starts_with(&scope.path))
			.collect();
		matching.sort_by_key(|scope| scope.path.components().count());

		matching
			.into_iter()
			.fold(self.server.clone(), |acc, scope| scope.config.merge(&acc))
	}

	/// Checks every scope for relative paths.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.server.validate()?;
		for scope in &self.directories {
			if !scope.path.is_absolute() {
				return Err(ConfigError::RelativePath(scope.path.clone()));
			}
			scope.config.validate()?;
		}
		Ok(())
	}
}

/// Which file attributes go into generated ETags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtagComponents {
	pub inode: bool,
	pub mtime: bool,
	pub size: bool,
}

impl Default for EtagComponents {
	fn default() -> Self {
		Self {
			inode: false,
			mtime: true,
			size: true,
		}
	}
}

impl EtagComponents {
	/// Returns true if no component is selected, meaning no ETag is generated.
	pub fn is_none(&self) -> bool {
		!(self.inode || self.mtime || self.size)
	}
}

/// Host-level transfer settings consulted when building file bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
	/// Permit zero-copy transmission of file segments
	pub enable_sendfile: bool,
	/// Permit memory-mapping file segments
	pub enable_mmap: bool,
	/// Largest number of bytes a single file segment may cover
	pub max_segment_size: u64,
	pub etag_components: EtagComponents,
}

impl Default for CoreSettings {
	fn default() -> Self {
		Self {
			enable_sendfile: true,
			enable_mmap: false,
			max_segment_size: usize::MAX as u64,
			etag_components: EtagComponents::default(),
		}
	}
}

impl CoreSettings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_sendfile(mut self, enable: bool) -> Self {
		self.enable_sendfile = enable;
		self
	}

	pub fn with_mmap(mut self, enable: bool) -> Self {
		self.enable_mmap = enable;
		self
	}

	pub fn with_max_segment_size(mut self, size: u64) -> Self {
		self.max_segment_size = size.max(1);
		self
	}

	pub fn with_etag_components(mut self, components: EtagComponents) -> Self {
		self.etag_components = components;
		self
	}
}

/// Everything a settings file can carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	#[serde(flatten)]
	pub scopes: ConfigScopes,
	pub core: CoreSettings,
}

impl Settings {
	/// Parses settings from TOML text and validates the paths.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		let settings: Settings = toml::from_str(text)?;
		settings.scopes.validate()?;
		Ok(settings)
	}
}
