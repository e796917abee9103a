//! Response bodies.
//!
//! Besides in-memory bytes and arbitrary streams, a body can be backed by an
//! open file described as a list of buckets: contiguous file segments
//! followed by an end-of-stream marker. Hosts with zero-copy support can
//! inspect [`TransferHints`] and the segments directly; everyone else can
//! call [`FileBody::into_stream`] or [`FileBody::read_to_bytes`].

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use crate::file::OpenFile;

/// Boxed error carried by streaming bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for streaming body
pub type StreamBody = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Response body
#[derive(Default)]
pub enum Body {
	/// No body at all
	#[default]
	Empty,
	/// In-memory bytes
	Bytes(Bytes),
	/// File-backed body
	File(FileBody),
	/// Arbitrary byte stream
	Stream(StreamBody),
}

impl Body {
	/// Length of the body in bytes, if known without consuming it.
	pub fn len(&self) -> Option<u64> {
		match self {
			Body::Empty => Some(0),
			Body::Bytes(bytes) => Some(bytes.len() as u64),
			Body::File(file) => Some(file.len()),
			Body::Stream(_) => None,
		}
	}

	/// Returns true when the body is known to carry no bytes.
	pub fn is_empty(&self) -> bool {
		self.len() == Some(0)
	}

	/// Returns the in-memory bytes, if this is a bytes body.
	pub fn as_bytes(&self) -> Option<&Bytes> {
		match self {
			Body::Bytes(bytes) => Some(bytes),
			_ => None,
		}
	}

	/// Returns the file body, if this is a file-backed body.
	pub fn as_file(&self) -> Option<&FileBody> {
		match self {
			Body::File(file) => Some(file),
			_ => None,
		}
	}
}

impl std::fmt::Debug for Body {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Body::Empty => f.write_str("Body::Empty"),
			Body::Bytes(bytes) => f.debug_tuple("Body::Bytes").field(&bytes.len()).finish(),
			Body::File(file) => f.debug_tuple("Body::File").field(file).finish(),
			Body::Stream(_) => f.write_str("Body::Stream(..)"),
		}
	}
}

impl From<Bytes> for Body {
	fn from(bytes: Bytes) -> Self {
		Body::Bytes(bytes)
	}
}

impl From<&'static [u8]> for Body {
	fn from(bytes: &'static [u8]) -> Self {
		Body::Bytes(Bytes::from_static(bytes))
	}
}

impl From<&'static str> for Body {
	fn from(text: &'static str) -> Self {
		Body::Bytes(Bytes::from_static(text.as_bytes()))
	}
}

impl From<String> for Body {
	fn from(text: String) -> Self {
		Body::Bytes(Bytes::from(text))
	}
}

impl From<Vec<u8>> for Body {
	fn from(bytes: Vec<u8>) -> Self {
		Body::Bytes(Bytes::from(bytes))
	}
}

/// One element of a file body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
	/// `len` bytes of the file starting at `offset`
	Segment { offset: u64, len: u64 },
	/// End of the response
	EndOfStream,
}

/// Transfer strategy hints for hosts that can bypass user-space copies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferHints {
	/// The host may hand the segments to a zero-copy send primitive
	pub sendfile: bool,
	/// The host may memory-map the segments
	pub mmap: bool,
}

/// A body served from an open file.
#[derive(Debug)]
pub struct FileBody {
	file: Arc<OpenFile>,
	buckets: Vec<Bucket>,
	hints: TransferHints,
}

impl FileBody {
	/// Creates a body from the first `size` bytes of `file`, split into
	/// segments of at most `max_segment` bytes and terminated by
	/// [`Bucket::EndOfStream`].
	///
	/// # Examples
	///
	/// ```
	/// use xsendfile_http::{Bucket, FileBody, OpenFile, TransferHints};
	///
	/// let dir = tempfile::tempdir().unwrap();
	/// let path = dir.path().join("data.bin");
	/// std::fs::write(&path, [7u8; 10]).unwrap();
	///
	/// let file = OpenFile::open(&path, false).unwrap();
	/// let body = FileBody::segmented(file, 10, 4, TransferHints::default());
	/// assert_eq!(body.segment_count(), 3);
	/// assert_eq!(body.buckets().last(), Some(&Bucket::EndOfStream));
	/// ```
	pub fn segmented(file: OpenFile, size: u64, max_segment: u64, hints: TransferHints) -> Self {
		let max_segment = max_segment.max(1);
		let mut buckets = Vec::with_capacity((size / max_segment) as usize + 2);
		let mut offset = 0;
		while offset < size {
			let len = (size - offset).min(max_segment);
			buckets.push(Bucket::Segment { offset, len });
			offset += len;
		}
		buckets.push(Bucket::EndOfStream);

		Self {
			file: Arc::new(file),
			buckets,
			hints,
		}
	}

	/// Buckets in transmission order.
	pub fn buckets(&self) -> &[Bucket] {
		&self.buckets
	}

	/// Number of file segments, excluding the end-of-stream marker.
	pub fn segment_count(&self) -> usize {
		self.buckets
			.iter()
			.filter(|b| matches!(b, Bucket::Segment { .. }))
			.count()
	}

	/// Total number of bytes covered by the segments.
	pub fn len(&self) -> u64 {
		self.buckets
			.iter()
			.map(|b| match b {
				Bucket::Segment { len, .. } => *len,
				Bucket::EndOfStream => 0,
			})
			.sum()
	}

	/// Returns true if the body carries no bytes.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Transfer hints recorded when the body was built.
	pub fn hints(&self) -> TransferHints {
		self.hints
	}

	/// The file backing this body.
	pub fn file(&self) -> &OpenFile {
		&self.file
	}

	/// Reads the whole body into memory, blocking the caller.
	pub fn read_to_bytes(&self) -> io::Result<Bytes> {
		let mut out = Vec::with_capacity(self.len() as usize);
		for bucket in &self.buckets {
			match *bucket {
				Bucket::Segment { offset, len } => {
					let chunk = self.file.read_at(offset, len as usize)?;
					if (chunk.len() as u64) < len {
						return Err(io::Error::new(
							io::ErrorKind::UnexpectedEof,
							"file shrank while being sent",
						));
					}
					out.extend_from_slice(&chunk);
				}
				Bucket::EndOfStream => break,
			}
		}
		Ok(Bytes::from(out))
	}

	/// Converts the body into a byte stream reading at most `chunk_size`
	/// bytes per item. File reads run on the blocking thread pool.
	///
	/// The file handle is released when the stream is dropped, whether or
	/// not it was fully consumed.
	pub fn into_stream(self, chunk_size: usize) -> StreamBody {
		let chunk_size = chunk_size.max(1) as u64;
		let mut reads = Vec::new();
		for bucket in &self.buckets {
			match *bucket {
				Bucket::Segment { offset, len } => {
					let end = offset + len;
					let mut pos = offset;
					while pos < end {
						let n = (end - pos).min(chunk_size);
						reads.push((pos, n));
						pos += n;
					}
				}
				Bucket::EndOfStream => break,
			}
		}

		let file = self.file;
		let stream = stream::iter(reads)
			.then(move |(offset, len)| read_chunk(Arc::clone(&file), offset, len as usize));
		Box::pin(stream)
	}
}

async fn read_chunk(file: Arc<OpenFile>, offset: u64, len: usize) -> Result<Bytes, BoxError> {
	let chunk = tokio::task::spawn_blocking(move || file.read_at(offset, len)).await??;
	if chunk.len() < len {
		return Err(Box::new(io::Error::new(
			io::ErrorKind::UnexpectedEof,
			"file shrank while being sent",
		)));
	}
	Ok(Bytes::from(chunk))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::fs;
	use tempfile::TempDir;

	fn open_with(content: &[u8]) -> (TempDir, OpenFile) {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("body.bin");
		fs::write(&path, content).unwrap();
		let file = OpenFile::open(&path, false).unwrap();
		(dir, file)
	}

	#[rstest]
	#[case(10, 4, vec![(0, 4), (4, 4), (8, 2)])]
	#[case(8, 4, vec![(0, 4), (4, 4)])]
	#[case(3, 100, vec![(0, 3)])]
	#[case(0, 100, vec![])]
	fn test_segmentation(
		#[case] size: u64,
		#[case] max: u64,
		#[case] expected: Vec<(u64, u64)>,
	) {
		let (_dir, file) = open_with(&vec![1u8; size as usize]);
		let body = FileBody::segmented(file, size, max, TransferHints::default());

		let segments: Vec<(u64, u64)> = body
			.buckets()
			.iter()
			.filter_map(|b| match b {
				Bucket::Segment { offset, len } => Some((*offset, *len)),
				Bucket::EndOfStream => None,
			})
			.collect();
		assert_eq!(segments, expected);
		assert_eq!(body.buckets().last(), Some(&Bucket::EndOfStream));
		assert_eq!(body.len(), size);
	}

	#[rstest]
	fn test_read_to_bytes_spans_segments() {
		let (_dir, file) = open_with(b"abcdefghij");
		let body = FileBody::segmented(file, 10, 3, TransferHints::default());
		assert_eq!(body.read_to_bytes().unwrap(), Bytes::from_static(b"abcdefghij"));
	}

	#[rstest]
	fn test_body_len() {
		assert_eq!(Body::Empty.len(), Some(0));
		assert!(Body::Empty.is_empty());
		assert_eq!(Body::from("hello").len(), Some(5));
		let stream: StreamBody = Box::pin(stream::empty());
		assert_eq!(Body::Stream(stream).len(), None);
	}

	#[tokio::test]
	async fn test_into_stream_yields_file_content() {
		let (_dir, file) = open_with(b"0123456789");
		let body = FileBody::segmented(file, 10, 4, TransferHints::default());

		let mut stream = body.into_stream(3);
		let mut collected = Vec::new();
		while let Some(chunk) = stream.next().await {
			let chunk = chunk.unwrap();
			assert!(chunk.len() <= 3);
			collected.extend_from_slice(&chunk);
		}
		assert_eq!(collected, b"0123456789");
	}

	#[tokio::test]
	async fn test_dropping_stream_releases_temporary_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("tmp.bin");
		fs::write(&path, b"temporary").unwrap();
		let file = OpenFile::open(&path, true).unwrap();
		let body = FileBody::segmented(file, 9, 4, TransferHints::default());

		let mut stream = body.into_stream(2);
		let first = stream.next().await.unwrap().unwrap();
		assert_eq!(&first[..], b"te");
		assert!(path.exists());

		drop(stream);
		assert!(!path.exists());
	}
}
