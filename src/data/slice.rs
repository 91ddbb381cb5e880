//! Lazily materialized byte ranges

use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::data::source::Source;
use crate::error::MetalResult;

/// Immutable handle to `length` bytes at `offset` of a [`Source`].
///
/// The bytes are read on first access and cached. Equality and hashing
/// consider only `(source, offset, length)`, never the cached content.
#[derive(Clone)]
pub struct Slice {
    pub source: Source,
    pub offset: u64,
    pub length: u64,
    data: OnceLock<Arc<[u8]>>,
}

impl Slice {
    /// Creates a slice if the source can supply the requested range.
    ///
    /// Returns `Ok(None)` when the range is unavailable.
    pub fn create(source: Source, offset: u64, length: u64) -> MetalResult<Option<Self>> {
        if !source.is_available(offset, length)? {
            return Ok(None);
        }
        Ok(Some(Self::new_unchecked(source, offset, length)))
    }

    fn new_unchecked(source: Source, offset: u64, length: u64) -> Self {
        Self {
            source,
            offset,
            length,
            data: OnceLock::new(),
        }
    }

    /// Creates a slice spanning a fresh constant source over `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let length = bytes.len() as u64;
        let slice = Self::new_unchecked(Source::constant(bytes.clone()), 0, length);
        let _ = slice.data.set(bytes);
        slice
    }

    /// Returns the bytes of this slice, reading them from the source on
    /// first use.
    pub fn data(&self) -> MetalResult<Arc<[u8]>> {
        if let Some(data) = self.data.get() {
            return Ok(data.clone());
        }
        let data: Arc<[u8]> = self.source.get_data(self.offset, self.length)?.into();
        Ok(self.data.get_or_init(|| data).clone())
    }

    /// Returns at most `limit` leading bytes of this slice.
    ///
    /// Only the returned bytes are read when the slice has not been
    /// materialized yet.
    pub fn data_limited(&self, limit: u64) -> MetalResult<Vec<u8>> {
        if let Some(data) = self.data.get() {
            return Ok(data[..limit.min(self.length) as usize].to_vec());
        }
        self.source.get_data(self.offset, limit.min(self.length))
    }

    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.data.get().is_some()
    }
}

impl PartialEq for Slice {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.length == other.length && self.source == other.source
    }
}

impl Eq for Slice {}

impl Hash for Slice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.offset.hash(state);
        self.length.hash(state);
    }
}

impl Debug for Slice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Slice({:?}@{}:{})",
            self.source,
            self.offset,
            self.offset + self.length
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::source::{ByteStream, InMemoryByteStream};

    #[derive(Debug)]
    struct CountingStream {
        inner: InMemoryByteStream,
        reads: std::sync::atomic::AtomicUsize,
    }

    impl ByteStream for CountingStream {
        fn read(&self, offset: u64, length: u64) -> std::io::Result<Vec<u8>> {
            self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.read(offset, length)
        }

        fn is_available(&self, offset: u64, length: u64) -> bool {
            self.inner.is_available(offset, length)
        }
    }

    #[test]
    fn equality_ignores_cache() {
        let source = Source::constant(vec![0, 1, 2, 3]);
        let a = Slice::create(source.clone(), 1, 2).unwrap().unwrap();
        let b = Slice::create(source, 1, 2).unwrap().unwrap();
        a.data().unwrap();
        assert!(a.is_materialized());
        assert!(!b.is_materialized());
        assert_eq!(a, b);
    }

    #[test]
    fn unavailable_range_creates_nothing() {
        let source = Source::constant(vec![0, 1]);
        assert!(Slice::create(source, 1, 2).unwrap().is_none());
    }

    #[test]
    fn reads_are_lazy_and_cached() {
        let stream = Arc::new(CountingStream {
            inner: InMemoryByteStream::new(vec![5, 6, 7]),
            reads: Default::default(),
        });
        let slice = Slice::create(Source::stream(stream.clone()), 1, 2)
            .unwrap()
            .unwrap();
        assert_eq!(stream.reads.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(&*slice.data().unwrap(), &[6, 7]);
        assert_eq!(&*slice.data().unwrap(), &[6, 7]);
        assert_eq!(stream.reads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn limited_reads() {
        let slice = Slice::create(Source::constant(vec![0, 1, 2, 3]), 0, 4)
            .unwrap()
            .unwrap();
        assert_eq!(slice.data_limited(1).unwrap(), vec![0]);
        assert_eq!(slice.data_limited(10).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn debug_format() {
        let slice = Slice::from_bytes(vec![1, 2]);
        assert_eq!(format!("{slice:?}"), "Slice(ConstantSource(0x0102)@0:2)");
    }
}
