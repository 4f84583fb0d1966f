//! Columnar segment access contract.
//!
//! The predicate executor reads segments only through `SegmentData`: chunked
//! raw values, optional per-chunk scalar indexes, and timestamp visibility.
//! Implementations must be safe for concurrent readers; the executor never
//! writes and never reads past the row count it captured at entry.

use std::sync::Arc;

use crate::expression::operator::CompareOp;
use crate::value::{DataType, GenericValue};

pub mod mem;

pub use mem::MemSegment;

/// Row-visibility timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn min() -> Self {
        Self(0)
    }

    pub fn max() -> Self {
        Self(u64::MAX)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// One chunk of raw column values.
///
/// Sealed chunks are shared via `Arc` so handing one to an executor is
/// zero-copy; a growing tail chunk is snapshotted at read time. Either way
/// the data behind a `ChunkData` never changes after it is returned.
#[derive(Debug, Clone)]
pub enum ChunkData {
    Bool(Arc<[bool]>),
    Int8(Arc<[i8]>),
    Int16(Arc<[i16]>),
    Int32(Arc<[i32]>),
    Int64(Arc<[i64]>),
    Float(Arc<[f32]>),
    Double(Arc<[f64]>),
}

impl ChunkData {
    pub fn data_type(&self) -> DataType {
        match self {
            ChunkData::Bool(_) => DataType::Bool,
            ChunkData::Int8(_) => DataType::Int8,
            ChunkData::Int16(_) => DataType::Int16,
            ChunkData::Int32(_) => DataType::Int32,
            ChunkData::Int64(_) => DataType::Int64,
            ChunkData::Float(_) => DataType::Float,
            ChunkData::Double(_) => DataType::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChunkData::Bool(v) => v.len(),
            ChunkData::Int8(v) => v.len(),
            ChunkData::Int16(v) => v.len(),
            ChunkData::Int32(v) => v.len(),
            ChunkData::Int64(v) => v.len(),
            ChunkData::Float(v) => v.len(),
            ChunkData::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `row` boxed as a `GenericValue`.
    pub fn get(&self, row: usize) -> Option<GenericValue> {
        match self {
            ChunkData::Bool(v) => v.get(row).map(|x| GenericValue::Bool(*x)),
            ChunkData::Int8(v) => v.get(row).map(|x| GenericValue::Int8(*x)),
            ChunkData::Int16(v) => v.get(row).map(|x| GenericValue::Int16(*x)),
            ChunkData::Int32(v) => v.get(row).map(|x| GenericValue::Int32(*x)),
            ChunkData::Int64(v) => v.get(row).map(|x| GenericValue::Int64(*x)),
            ChunkData::Float(v) => v.get(row).map(|x| GenericValue::Float(*x)),
            ChunkData::Double(v) => v.get(row).map(|x| GenericValue::Double(*x)),
        }
    }
}

/// A predicate pushed down to a chunk's scalar index.
///
/// Operand values are already converted to the column's native type by the
/// caller; the index never widens.
#[derive(Debug, Clone)]
pub enum IndexQuery {
    UnaryRange {
        op: CompareOp,
        value: GenericValue,
    },
    BinaryRange {
        lower_inclusive: bool,
        upper_inclusive: bool,
        lower: GenericValue,
        upper: GenericValue,
    },
    Term { values: Vec<GenericValue> },
}

use crate::error::PlanResult;
use crate::schema::FieldOffset;

/// Read-only columnar access to one segment.
///
/// All methods must be safe to call concurrently from multiple executors.
/// `row_count` is a snapshot: rows appended after a caller captured it are
/// simply never read by that caller.
pub trait SegmentData: Send + Sync {
    /// Total rows currently in the segment.
    fn row_count(&self) -> usize;

    /// Fixed chunk capacity; every chunk but the last holds exactly this
    /// many rows.
    fn size_per_chunk(&self) -> usize;

    /// Number of chunks currently backing `field`.
    fn chunk_count(&self, field: FieldOffset) -> usize;

    /// Raw values of one chunk of `field`.
    fn chunk(&self, field: FieldOffset, chunk_id: usize) -> PlanResult<ChunkData>;

    /// How many leading chunks of `field` have a ready scalar index.
    fn indexed_chunk_count(&self, field: FieldOffset) -> usize;

    /// Answer a predicate from the scalar index of one indexed chunk.
    /// The result has one bit per row of that chunk.
    fn query_index(
        &self,
        field: FieldOffset,
        chunk_id: usize,
        query: &IndexQuery,
    ) -> PlanResult<Vec<bool>>;

    /// Rows visible at or before `ts`.
    fn active_count(&self, ts: Timestamp) -> usize;

    /// Per-row visibility over `[0, row_count)`: inserted at or before `ts`
    /// and not deleted.
    fn visibility_mask(&self, ts: Timestamp, row_count: usize) -> Vec<bool>;
}
