//! In-memory chunked segment.
//!
//! Reference implementation of `SegmentData`: rows append into a growing
//! tail per column, a full tail seals into an immutable `Arc` chunk, and
//! scalar indexes (sorted value/row arrays) can be built over any prefix of
//! sealed chunks. One `RwLock` guards the mutable state; `ChunkData`
//! handed to readers is either a shared sealed chunk or a snapshot copy of
//! the tail, so readers never observe a chunk changing underneath them.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;

use crate::error::{PlanError, PlanResult};
use crate::schema::{FieldOffset, Schema};
use crate::segment::{ChunkData, IndexQuery, SegmentData, Timestamp};
use crate::value::{DataType, GenericValue};

pub struct MemSegment {
    size_per_chunk: usize,
    inner: RwLock<Inner>,
}

struct Inner {
    columns: Vec<ColumnState>,
    /// Per-row insert timestamps, nondecreasing.
    timestamps: Vec<u64>,
    deleted: Vec<bool>,
}

struct ColumnState {
    data_type: DataType,
    sealed: Vec<ChunkData>,
    tail: Vec<GenericValue>,
    /// Scalar indexes over the leading sealed chunks; `indexes.len()` is
    /// the indexing barrier for this column.
    indexes: Vec<ChunkIndex>,
}

impl MemSegment {
    pub fn new(schema: &Schema, size_per_chunk: usize) -> Result<Self> {
        if size_per_chunk == 0 {
            bail!("size_per_chunk must be positive");
        }
        let columns = schema
            .fields()
            .iter()
            .map(|f| ColumnState {
                data_type: f.data_type,
                sealed: Vec::new(),
                tail: Vec::new(),
                indexes: Vec::new(),
            })
            .collect();
        Ok(Self {
            size_per_chunk,
            inner: RwLock::new(Inner {
                columns,
                timestamps: Vec::new(),
                deleted: Vec::new(),
            }),
        })
    }

    /// Append one row. `values` must carry exactly one value per scalar
    /// column, typed to match; vector columns carry no scalar payload here.
    /// Timestamps must be nondecreasing across appends.
    pub fn append_row(&self, values: &[(FieldOffset, GenericValue)], ts: Timestamp) -> Result<()> {
        let size_per_chunk = self.size_per_chunk;
        let mut inner = self.inner.write();

        if let Some(last) = inner.timestamps.last() {
            if ts.0 < *last {
                bail!("timestamps must be nondecreasing: {} < {}", ts.0, last);
            }
        }

        // Validate the full row before mutating anything.
        for (i, (offset, _)) in values.iter().enumerate() {
            let col = inner
                .columns
                .get(offset.0)
                .with_context(|| format!("no column at offset {}", offset.0))?;
            if !col.data_type.is_scalar() {
                bail!("column {} is not a scalar column", offset.0);
            }
            if values[..i].iter().any(|(other, _)| other == offset) {
                bail!("duplicate value for column {}", offset.0);
            }
        }
        for (idx, col) in inner.columns.iter().enumerate() {
            if !col.data_type.is_scalar() {
                continue;
            }
            let value = values
                .iter()
                .find(|(offset, _)| offset.0 == idx)
                .map(|(_, v)| v)
                .with_context(|| format!("missing value for column {}", idx))?;
            if value.data_type() != col.data_type {
                bail!(
                    "column {} expects {:?}, got {:?}",
                    idx,
                    col.data_type,
                    value.data_type()
                );
            }
        }

        for (offset, value) in values {
            let col = inner
                .columns
                .get_mut(offset.0)
                .with_context(|| format!("no column at offset {}", offset.0))?;
            col.tail.push(*value);
            if col.tail.len() == size_per_chunk {
                let chunk = seal_chunk(col.data_type, &col.tail);
                col.sealed.push(chunk);
                col.tail.clear();
            }
        }
        inner.timestamps.push(ts.0);
        inner.deleted.push(false);
        Ok(())
    }

    pub fn delete_row(&self, row: usize) -> Result<()> {
        let mut inner = self.inner.write();
        if row >= inner.deleted.len() {
            bail!("row {} out of range", row);
        }
        inner.deleted[row] = true;
        Ok(())
    }

    /// Build scalar indexes for every sealed chunk of `field` that does not
    /// have one yet. Indexes always cover a prefix of the chunk sequence:
    /// they are built in order and the growing tail is never indexed.
    pub fn build_index(&self, field: FieldOffset) -> Result<()> {
        let mut inner = self.inner.write();
        let col = inner
            .columns
            .get_mut(field.0)
            .with_context(|| format!("no column at offset {}", field.0))?;
        if !col.data_type.is_scalar() {
            bail!("cannot index vector column {}", field.0);
        }
        for chunk_id in col.indexes.len()..col.sealed.len() {
            let index = ChunkIndex::build(&col.sealed[chunk_id]);
            col.indexes.push(index);
        }
        Ok(())
    }
}

impl SegmentData for MemSegment {
    fn row_count(&self) -> usize {
        self.inner.read().timestamps.len()
    }

    fn size_per_chunk(&self) -> usize {
        self.size_per_chunk
    }

    fn chunk_count(&self, _field: FieldOffset) -> usize {
        self.inner.read().timestamps.len().div_ceil(self.size_per_chunk)
    }

    fn chunk(&self, field: FieldOffset, chunk_id: usize) -> PlanResult<ChunkData> {
        let inner = self.inner.read();
        let col = inner
            .columns
            .get(field.0)
            .ok_or_else(|| PlanError::DispatchMismatch(format!("no column at offset {}", field.0)))?;
        if !col.data_type.is_scalar() {
            return Err(PlanError::UnsupportedDataType(col.data_type));
        }
        if chunk_id < col.sealed.len() {
            Ok(col.sealed[chunk_id].clone())
        } else if chunk_id == col.sealed.len() && !col.tail.is_empty() {
            // Snapshot of the growing tail at this moment.
            Ok(seal_chunk(col.data_type, &col.tail))
        } else {
            Err(PlanError::DispatchMismatch(format!(
                "chunk {} out of range for column {}",
                chunk_id, field.0
            )))
        }
    }

    fn indexed_chunk_count(&self, field: FieldOffset) -> usize {
        let inner = self.inner.read();
        inner
            .columns
            .get(field.0)
            .map(|col| col.indexes.len())
            .unwrap_or(0)
    }

    fn query_index(
        &self,
        field: FieldOffset,
        chunk_id: usize,
        query: &IndexQuery,
    ) -> PlanResult<Vec<bool>> {
        let inner = self.inner.read();
        let col = inner
            .columns
            .get(field.0)
            .ok_or_else(|| PlanError::DispatchMismatch(format!("no column at offset {}", field.0)))?;
        let index = col.indexes.get(chunk_id).ok_or_else(|| {
            PlanError::DispatchMismatch(format!(
                "chunk {} of column {} has no index",
                chunk_id, field.0
            ))
        })?;
        Ok(index.query(query))
    }

    fn active_count(&self, ts: Timestamp) -> usize {
        let inner = self.inner.read();
        inner.timestamps.partition_point(|t| *t <= ts.0)
    }

    fn visibility_mask(&self, ts: Timestamp, row_count: usize) -> Vec<bool> {
        let inner = self.inner.read();
        (0..row_count)
            .map(|i| match inner.timestamps.get(i) {
                Some(t) => *t <= ts.0 && !inner.deleted[i],
                None => false,
            })
            .collect()
    }
}

fn seal_chunk(data_type: DataType, values: &[GenericValue]) -> ChunkData {
    // Values were type-checked on append.
    match data_type {
        DataType::Bool => ChunkData::Bool(collect(values, |v| v.as_bool())),
        DataType::Int8 => ChunkData::Int8(collect(values, |v| match v {
            GenericValue::Int8(x) => Some(*x),
            _ => None,
        })),
        DataType::Int16 => ChunkData::Int16(collect(values, |v| match v {
            GenericValue::Int16(x) => Some(*x),
            _ => None,
        })),
        DataType::Int32 => ChunkData::Int32(collect(values, |v| match v {
            GenericValue::Int32(x) => Some(*x),
            _ => None,
        })),
        DataType::Int64 => ChunkData::Int64(collect(values, |v| match v {
            GenericValue::Int64(x) => Some(*x),
            _ => None,
        })),
        DataType::Float => ChunkData::Float(collect(values, |v| match v {
            GenericValue::Float(x) => Some(*x),
            _ => None,
        })),
        DataType::Double => ChunkData::Double(collect(values, |v| match v {
            GenericValue::Double(x) => Some(*x),
            _ => None,
        })),
        DataType::FloatVector | DataType::BinaryVector => {
            unreachable!("vector columns are never sealed from scalar values")
        }
    }
}

fn collect<T>(values: &[GenericValue], f: impl Fn(&GenericValue) -> Option<T>) -> Arc<[T]> {
    values
        .iter()
        .map(|v| f(v).expect("value type checked on append"))
        .collect()
}

/// Sorted (value, row) pairs over one sealed chunk.
struct ChunkIndex {
    entries: Vec<(GenericValue, usize)>,
}

impl ChunkIndex {
    fn build(chunk: &ChunkData) -> Self {
        let mut entries: Vec<(GenericValue, usize)> = (0..chunk.len())
            .filter_map(|row| chunk.get(row).map(|v| (v, row)))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.compare(b).unwrap_or(Ordering::Equal));
        Self { entries }
    }

    /// First entry index not less than `v`.
    fn lower_bound(&self, v: &GenericValue) -> usize {
        self.entries
            .partition_point(|(e, _)| e.compare(v) == Some(Ordering::Less))
    }

    /// First entry index greater than `v`.
    fn upper_bound(&self, v: &GenericValue) -> usize {
        self.entries.partition_point(|(e, _)| {
            matches!(e.compare(v), Some(Ordering::Less) | Some(Ordering::Equal))
        })
    }

    fn query(&self, query: &IndexQuery) -> Vec<bool> {
        let len = self.entries.len();
        let mut mask = vec![false; len];
        match query {
            IndexQuery::UnaryRange { op, value } => {
                use crate::expression::operator::CompareOp;
                let (start, end) = match op {
                    CompareOp::Lt => (0, self.lower_bound(value)),
                    CompareOp::Le => (0, self.upper_bound(value)),
                    CompareOp::Gt => (self.upper_bound(value), len),
                    CompareOp::Ge => (self.lower_bound(value), len),
                    CompareOp::Eq => (self.lower_bound(value), self.upper_bound(value)),
                    CompareOp::Ne => {
                        self.mark(&mut mask, 0, self.lower_bound(value));
                        self.mark(&mut mask, self.upper_bound(value), len);
                        return mask;
                    }
                };
                self.mark(&mut mask, start, end);
            }
            IndexQuery::BinaryRange {
                lower_inclusive,
                upper_inclusive,
                lower,
                upper,
            } => {
                let start = if *lower_inclusive {
                    self.lower_bound(lower)
                } else {
                    self.upper_bound(lower)
                };
                let end = if *upper_inclusive {
                    self.upper_bound(upper)
                } else {
                    self.lower_bound(upper)
                };
                if start < end {
                    self.mark(&mut mask, start, end);
                }
            }
            IndexQuery::Term { values } => {
                for value in values {
                    self.mark(&mut mask, self.lower_bound(value), self.upper_bound(value));
                }
            }
        }
        mask
    }

    fn mark(&self, mask: &mut [bool], start: usize, end: usize) {
        for (_, row) in &self.entries[start..end] {
            mask[*row] = true;
        }
    }
}
