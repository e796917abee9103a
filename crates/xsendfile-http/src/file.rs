//! Owned file handles for file-backed response bodies.
//!
//! An [`OpenFile`] is held by whoever is currently responsible for the
//! response: first the stage that opened it, then the [`FileBody`](crate::FileBody)
//! that streams it. When the last owner goes away the handle is closed and,
//! for temporary deliveries, the file is removed from disk.

use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Bookkeeping describing the file that actually backs a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
	/// File size in bytes
	pub size: u64,
	/// Inode number, or 0 where the platform has none
	pub inode: u64,
	/// Last modification time
	pub modified: SystemTime,
}

impl FileInfo {
	/// Builds file info from filesystem metadata.
	pub fn from_metadata(metadata: &Metadata) -> io::Result<Self> {
		Ok(Self {
			size: metadata.len(),
			inode: inode_of(metadata),
			modified: metadata.modified()?,
		})
	}
}

#[cfg(unix)]
fn inode_of(metadata: &Metadata) -> u64 {
	use std::os::unix::fs::MetadataExt;
	metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &Metadata) -> u64 {
	0
}

/// A read-only file handle that may delete its file when closed.
#[derive(Debug)]
pub struct OpenFile {
	file: File,
	path: PathBuf,
	delete_on_close: bool,
}

impl OpenFile {
	/// Opens `path` for reading.
	///
	/// # Examples
	///
	/// ```
	/// use xsendfile_http::OpenFile;
	///
	/// let dir = tempfile::tempdir().unwrap();
	/// let path = dir.path().join("report.csv");
	/// std::fs::write(&path, "a,b\n").unwrap();
	///
	/// let file = OpenFile::open(&path, false).unwrap();
	/// assert_eq!(file.path(), path.as_path());
	/// assert!(!file.delete_on_close());
	/// ```
	pub fn open(path: &Path, delete_on_close: bool) -> io::Result<Self> {
		let file = File::open(path)?;
		Ok(Self {
			file,
			path: path.to_path_buf(),
			delete_on_close,
		})
	}

	/// Stats the open handle.
	pub fn metadata(&self) -> io::Result<Metadata> {
		self.file.metadata()
	}

	/// Path the handle was opened from.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Whether the file is removed once the handle is released.
	pub fn delete_on_close(&self) -> bool {
		self.delete_on_close
	}

	/// Reads up to `len` bytes starting at `offset`.
	///
	/// Reads are positioned, so callers must not interleave reads on the same
	/// handle from several threads.
	pub fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
		let mut handle = &self.file;
		handle.seek(SeekFrom::Start(offset))?;
		let mut buf = Vec::with_capacity(len);
		handle.take(len as u64).read_to_end(&mut buf)?;
		Ok(buf)
	}
}

impl Drop for OpenFile {
	fn drop(&mut self) {
		if self.delete_on_close
			&& let Err(error) = fs::remove_file(&self.path)
			&& error.kind() != io::ErrorKind::NotFound
		{
			tracing::warn!(path = %self.path.display(), %error, "failed to remove temporary file");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use tempfile::TempDir;

	#[rstest]
	fn test_persistent_file_survives_drop() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("keep.txt");
		fs::write(&path, "keep me").unwrap();

		let file = OpenFile::open(&path, false).unwrap();
		drop(file);

		assert!(path.exists());
	}

	#[rstest]
	fn test_temporary_file_removed_on_drop() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("once.txt");
		fs::write(&path, "read once").unwrap();

		let file = OpenFile::open(&path, true).unwrap();
		assert!(path.exists());
		drop(file);

		assert!(!path.exists());
	}

	#[rstest]
	fn test_open_missing_file_fails() {
		let dir = TempDir::new().unwrap();
		assert!(OpenFile::open(&dir.path().join("missing"), false).is_err());
	}

	#[rstest]
	#[case(0, 5, "hello")]
	#[case(6, 5, "world")]
	#[case(6, 100, "world")]
	#[case(20, 4, "")]
	fn test_read_at(#[case] offset: u64, #[case] len: usize, #[case] expected: &str) {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("greeting.txt");
		fs::write(&path, "hello world").unwrap();

		let file = OpenFile::open(&path, false).unwrap();
		assert_eq!(file.read_at(offset, len).unwrap(), expected.as_bytes());
	}

	#[rstest]
	fn test_file_info_from_metadata() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("sized.bin");
		fs::write(&path, [0u8; 42]).unwrap();

		let file = OpenFile::open(&path, false).unwrap();
		let info = FileInfo::from_metadata(&file.metadata().unwrap()).unwrap();
		assert_eq!(info.size, 42);
		#[cfg(unix)]
		assert_ne!(info.inode, 0);
	}
}
