//! Address spaces that slices read their bytes from
//!
//! A [`Source`] is an immutable origin of bytes. It offers two operations,
//! [`get_data`](Source::get_data) and [`is_available`](Source::is_available),
//! and comes in four variants:
//!   * [`ConstantSource`], a fixed in-memory buffer
//!   * a stream-backed source, delegating to a caller-supplied [`ByteStream`]
//!   * [`DataExpressionSource`], whose bytes are the value of an expression
//!     at a given result index
//!   * [`ConcatenatedValueSource`], whose bytes are the concatenation of
//!     several previously computed values
//!
//! `Source` is a cheaply clonable handle. Equality is identity for the
//! stream-backed and expression-backed variants and structural for the
//! other two.

use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use crate::data::graph::ParseGraph;
use crate::data::list::PersistentList;
use crate::data::value::Value;
use crate::encoding::Encoding;
use crate::error::{EvaluationError, MetalResult, SourceError};
use crate::expression::value::ValueExpression;
use crate::internal::Trampoline;

/// Capability for reading raw bytes from an external backend.
///
/// Implementations must be idempotent: reading the same range twice yields
/// the same bytes. A stream may report a range as unavailable, in which
/// case the engine treats it as a grammar mismatch and never calls `read`
/// for it.
pub trait ByteStream: Debug + Send + Sync {
    /// Reads exactly `length` bytes starting at `offset`.
    fn read(&self, offset: u64, length: u64) -> std::io::Result<Vec<u8>>;

    /// Returns `true` if `length` bytes can be read starting at `offset`.
    fn is_available(&self, offset: u64, length: u64) -> bool;
}

/// [`ByteStream`] over an owned in-memory buffer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InMemoryByteStream {
    data: Vec<u8>,
}

impl InMemoryByteStream {
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Debug for InMemoryByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InMemoryByteStream({})", self.data.len())
    }
}

impl ByteStream for InMemoryByteStream {
    fn read(&self, offset: u64, length: u64) -> std::io::Result<Vec<u8>> {
        if !self.is_available(offset, length) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "data to read is not available",
            ));
        }
        // both fit in usize once `is_available` holds
        let start = offset as usize;
        Ok(self.data[start..start + length as usize].to_vec())
    }

    fn is_available(&self, offset: u64, length: u64) -> bool {
        offset
            .checked_add(length)
            .map_or(false, |end| end <= self.data.len() as u64)
    }
}

/// Fixed buffer of bytes known at construction.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConstantSource {
    data: Arc<[u8]>,
}

impl ConstantSource {
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Debug for ConstantSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConstantSource(0x")?;
        for byte in self.data.iter() {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// Source whose bytes are the `index`-th result of evaluating an expression
/// against a fixed graph.
///
/// The expression is evaluated at most once; the selected value is cached.
pub struct DataExpressionSource {
    pub expression: ValueExpression,
    pub index: usize,
    pub graph: ParseGraph,
    pub encoding: Encoding,
    cache: OnceLock<Arc<[u8]>>,
}

impl DataExpressionSource {
    fn data(&self) -> MetalResult<Arc<[u8]>> {
        if let Some(data) = self.cache.get() {
            return Ok(data.clone());
        }
        let results = self.expression.eval(&self.graph, &self.encoding)?;
        if results.len() <= self.index {
            log::debug!(
                "data expression yields {} results, requested index {}",
                results.len(),
                self.index
            );
            return Err(EvaluationError::MissingResult {
                index: self.index,
                available: results.len(),
            }
            .into());
        }
        let value = results
            .get(self.index)
            .and_then(Option::as_ref)
            .ok_or(EvaluationError::AbsentResult { index: self.index })?;
        let data: Arc<[u8]> = value.bytes()?;
        Ok(self.cache.get_or_init(|| data).clone())
    }
}

impl Debug for DataExpressionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DataExpressionSource({:?}[{}]({}))",
            self.expression, self.index, self.encoding
        )
    }
}

/// Source whose bytes are the concatenation of a list of values.
///
/// A concatenation of total length zero is never constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct ConcatenatedValueSource {
    /// Constituent values, in byte order from the head
    pub values: PersistentList<Value>,
    pub length: u64,
}

impl ConcatenatedValueSource {
    fn get_data(&self, offset: u64, length: u64) -> MetalResult<Vec<u8>> {
        if !self.is_available(offset, length) {
            return Err(SourceError::Unavailable {
                offset,
                length,
                bound: self.length,
            }
            .into());
        }
        let output = vec![0u8; length as usize];
        copy_overlap(self.values.clone(), 0, 0, offset, length, output).compute_result()
    }

    fn is_available(&self, offset: u64, length: u64) -> bool {
        offset
            .checked_add(length)
            .map_or(false, |end| end <= self.length)
    }
}

impl Debug for ConcatenatedValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConcatenatedValueSource({:?}({}))", self.values, self.length)
    }
}

/// Walks the constituent values, copying the part of each that overlaps the
/// requested range into `output`.
fn copy_overlap<'a>(
    values: PersistentList<Value>,
    current_offset: u64,
    current_dest: usize,
    offset: u64,
    length: u64,
    mut output: Vec<u8>,
) -> Trampoline<'a, MetalResult<Vec<u8>>> {
    if length == 0 {
        return Trampoline::complete(Ok(output));
    }
    let Some((head, tail)) = values.split() else {
        return Trampoline::complete(Err(SourceError::Unavailable {
            offset,
            length,
            bound: current_offset,
        }
        .into()));
    };
    let head_length = head.length();
    let tail = tail.clone();
    if current_offset + head_length <= offset {
        return Trampoline::intermediate(move || {
            copy_overlap(
                tail,
                current_offset + head_length,
                current_dest,
                offset,
                length,
                output,
            )
        });
    }
    let local_offset = offset.saturating_sub(current_offset);
    let to_copy = length.min(head_length - local_offset);
    let data = match head.bytes() {
        Ok(data) => data,
        Err(err) => return Trampoline::complete(Err(err)),
    };
    let (start, count) = (local_offset as usize, to_copy as usize);
    output[current_dest..current_dest + count].copy_from_slice(&data[start..start + count]);
    Trampoline::intermediate(move || {
        copy_overlap(
            tail,
            current_offset + head_length,
            current_dest + count,
            offset,
            length - to_copy,
            output,
        )
    })
}

enum SourceKind {
    Constant(ConstantSource),
    Stream(Arc<dyn ByteStream>),
    DataExpression(DataExpressionSource),
    Concatenated(ConcatenatedValueSource),
}

/// Handle to an immutable address space of bytes.
#[derive(Clone)]
pub struct Source(Arc<SourceKind>);

impl Source {
    /// Source over a fixed buffer.
    #[must_use]
    pub fn constant(data: impl Into<Arc<[u8]>>) -> Self {
        Self(Arc::new(SourceKind::Constant(ConstantSource {
            data: data.into(),
        })))
    }

    /// Source delegating to a caller-supplied byte stream.
    #[must_use]
    pub fn stream(stream: Arc<dyn ByteStream>) -> Self {
        Self(Arc::new(SourceKind::Stream(stream)))
    }

    /// Source over the `index`-th result of `expression` evaluated against
    /// `graph`.
    #[must_use]
    pub fn data_expression(
        expression: ValueExpression,
        index: usize,
        graph: ParseGraph,
        encoding: Encoding,
    ) -> Self {
        Self(Arc::new(SourceKind::DataExpression(DataExpressionSource {
            expression,
            index,
            graph,
            encoding,
            cache: OnceLock::new(),
        })))
    }

    /// Source over the concatenation of the present values in `values`.
    ///
    /// `values` is in result order: the head is the last constituent. Absent
    /// values are skipped. Returns `None` when the total length is zero.
    #[must_use]
    pub fn concatenate(values: &PersistentList<Option<Value>>) -> Option<Self> {
        let values = unwrap_present(values.clone(), PersistentList::new()).compute_result();
        let length = total_length(values.clone(), 0).compute_result();
        if length == 0 {
            return None;
        }
        Some(Self(Arc::new(SourceKind::Concatenated(
            ConcatenatedValueSource { values, length },
        ))))
    }

    /// Reads `length` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with a [`SourceError`] if the range is not available, and with
    /// an [`EvaluationError`] if a data-expression source cannot produce its
    /// value.
    pub fn get_data(&self, offset: u64, length: u64) -> MetalResult<Vec<u8>> {
        match &*self.0 {
            SourceKind::Constant(constant) => {
                slice_range(&constant.data, offset, length).map(<[u8]>::to_vec)
            }
            SourceKind::Stream(stream) => Ok(stream.read(offset, length)?),
            SourceKind::DataExpression(expression) => {
                slice_range(&expression.data()?, offset, length).map(<[u8]>::to_vec)
            }
            SourceKind::Concatenated(concatenated) => concatenated.get_data(offset, length),
        }
    }

    /// Tests whether `length` bytes can be read at `offset`.
    ///
    /// # Errors
    ///
    /// Only a data-expression source can fail here, when evaluating its
    /// expression does.
    pub fn is_available(&self, offset: u64, length: u64) -> MetalResult<bool> {
        let bound = match &*self.0 {
            SourceKind::Constant(constant) => constant.data.len() as u64,
            SourceKind::Stream(stream) => return Ok(stream.is_available(offset, length)),
            SourceKind::DataExpression(expression) => expression.data()?.len() as u64,
            SourceKind::Concatenated(concatenated) => concatenated.length,
        };
        Ok(offset.checked_add(length).map_or(false, |end| end <= bound))
    }

    #[must_use]
    pub fn as_constant(&self) -> Option<&ConstantSource> {
        match &*self.0 {
            SourceKind::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_data_expression(&self) -> Option<&DataExpressionSource> {
        match &*self.0 {
            SourceKind::DataExpression(expression) => Some(expression),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_concatenated(&self) -> Option<&ConcatenatedValueSource> {
        match &*self.0 {
            SourceKind::Concatenated(concatenated) => Some(concatenated),
            _ => None,
        }
    }
}

fn slice_range(data: &[u8], offset: u64, length: u64) -> MetalResult<&[u8]> {
    let bound = data.len() as u64;
    match offset.checked_add(length) {
        Some(end) if end <= bound => Ok(&data[offset as usize..end as usize]),
        _ => Err(SourceError::Unavailable {
            offset,
            length,
            bound,
        }
        .into()),
    }
}

/// Drops absent values while reversing, so the head of the output is the
/// first constituent.
fn unwrap_present<'a>(
    input: PersistentList<Option<Value>>,
    output: PersistentList<Value>,
) -> Trampoline<'a, PersistentList<Value>> {
    match input.split() {
        None => Trampoline::complete(output),
        Some((head, tail)) => {
            let output = match head {
                Some(value) => output.add(value.clone()),
                None => output,
            };
            let tail = tail.clone();
            Trampoline::intermediate(move || unwrap_present(tail, output))
        }
    }
}

fn total_length<'a>(values: PersistentList<Value>, size: u64) -> Trampoline<'a, u64> {
    match values.split() {
        None => Trampoline::complete(size),
        Some((head, tail)) => {
            let size = size + head.length();
            let tail = tail.clone();
            Trampoline::intermediate(move || total_length(tail, size))
        }
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (&*self.0, &*other.0) {
            (SourceKind::Constant(a), SourceKind::Constant(b)) => a == b,
            (SourceKind::Stream(a), SourceKind::Stream(b)) => {
                std::ptr::eq(Arc::as_ptr(a).cast::<u8>(), Arc::as_ptr(b).cast::<u8>())
            }
            (SourceKind::Concatenated(a), SourceKind::Concatenated(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Source {}

impl Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.0 {
            SourceKind::Constant(constant) => Debug::fmt(constant, f),
            SourceKind::Stream(stream) => write!(f, "ByteStreamSource({stream:?})"),
            SourceKind::DataExpression(expression) => Debug::fmt(expression, f),
            SourceKind::Concatenated(concatenated) => Debug::fmt(concatenated, f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::slice::Slice;

    fn value(bytes: &[u8]) -> Option<Value> {
        Some(Value::new(Slice::from_bytes(bytes.to_vec()), Encoding::default()))
    }

    fn concatenation() -> Source {
        let values = PersistentList::new()
            .add(value(&[0x01, 0x02]))
            .add(None)
            .add(value(&[0x10, 0x11, 0x12]))
            .add(value(&[0xff]));
        Source::concatenate(&values).unwrap()
    }

    #[test]
    fn concatenated_read_spans_constituents() {
        let source = concatenation();
        assert_eq!(source.as_concatenated().unwrap().length, 6);
        assert_eq!(
            source.get_data(1, 4).unwrap(),
            vec![0x02, 0x10, 0x11, 0x12]
        );
        assert_eq!(
            source.get_data(0, 6).unwrap(),
            vec![0x01, 0x02, 0x10, 0x11, 0x12, 0xff]
        );
        assert_eq!(source.get_data(5, 1).unwrap(), vec![0xff]);
        assert_eq!(source.get_data(6, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn concatenated_read_past_bound_fails() {
        let source = concatenation();
        assert!(!source.is_available(3, 4).unwrap());
        assert!(matches!(
            source.get_data(3, 4),
            Err(crate::MetalError::Source(SourceError::Unavailable { .. }))
        ));
    }

    #[test]
    fn empty_concatenation_is_no_source() {
        let values = PersistentList::new().add(value(&[])).add(None);
        assert!(Source::concatenate(&values).is_none());
        assert!(Source::concatenate(&PersistentList::new()).is_none());
    }

    #[test]
    fn constant_bounds() {
        let source = Source::constant(vec![1, 2, 3]);
        assert!(source.is_available(1, 2).unwrap());
        assert!(!source.is_available(2, 2).unwrap());
        assert!(!source.is_available(u64::MAX, 2).unwrap());
        assert_eq!(source.get_data(1, 2).unwrap(), vec![2, 3]);
        assert!(source.get_data(2, 2).is_err());
    }

    #[test]
    fn stream_sources_compare_by_identity() {
        let stream: Arc<dyn ByteStream> = Arc::new(InMemoryByteStream::new(vec![1, 2]));
        let a = Source::stream(stream.clone());
        let b = Source::stream(stream);
        let c = Source::stream(Arc::new(InMemoryByteStream::new(vec![1, 2])));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Source::constant(vec![1]), Source::constant(vec![1]));
        assert_ne!(a, Source::constant(vec![1, 2]));
    }

    #[test]
    fn in_memory_stream() {
        let stream = InMemoryByteStream::new(vec![1, 2, 3]);
        assert!(stream.is_available(0, 3));
        assert!(!stream.is_available(1, 3));
        assert_eq!(stream.read(1, 2).unwrap(), vec![2, 3]);
        assert!(stream.read(2, 2).is_err());
        assert_eq!(format!("{stream:?}"), "InMemoryByteStream(3)");
    }
}
