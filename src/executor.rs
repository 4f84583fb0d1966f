//! Predicate execution over chunked columnar data.
//!
//! The executor walks a parsed expression tree post-order and returns an
//! `EvalResult` per node: a full-length typed column or a broadcastable
//! scalar. All evaluation state lives in ordinary call frames, so one
//! immutable tree can be evaluated concurrently from many threads.

use crate::error::{PlanError, PlanResult};
use crate::segment::ChunkData;
use crate::value::{DataType, GenericValue};

pub mod compute;
pub mod eval;
pub mod index;

pub use eval::PredicateExecutor;

/// A materialized column of one scalar type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnVector {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl ColumnVector {
    pub fn with_capacity(data_type: DataType, capacity: usize) -> PlanResult<Self> {
        Ok(match data_type {
            DataType::Bool => ColumnVector::Bool(Vec::with_capacity(capacity)),
            DataType::Int8 => ColumnVector::Int8(Vec::with_capacity(capacity)),
            DataType::Int16 => ColumnVector::Int16(Vec::with_capacity(capacity)),
            DataType::Int32 => ColumnVector::Int32(Vec::with_capacity(capacity)),
            DataType::Int64 => ColumnVector::Int64(Vec::with_capacity(capacity)),
            DataType::Float => ColumnVector::Float(Vec::with_capacity(capacity)),
            DataType::Double => ColumnVector::Double(Vec::with_capacity(capacity)),
            other => return Err(PlanError::UnsupportedDataType(other)),
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnVector::Bool(_) => DataType::Bool,
            ColumnVector::Int8(_) => DataType::Int8,
            ColumnVector::Int16(_) => DataType::Int16,
            ColumnVector::Int32(_) => DataType::Int32,
            ColumnVector::Int64(_) => DataType::Int64,
            ColumnVector::Float(_) => DataType::Float,
            ColumnVector::Double(_) => DataType::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnVector::Bool(v) => v.len(),
            ColumnVector::Int8(v) => v.len(),
            ColumnVector::Int16(v) => v.len(),
            ColumnVector::Int32(v) => v.len(),
            ColumnVector::Int64(v) => v.len(),
            ColumnVector::Float(v) => v.len(),
            ColumnVector::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the first `take` rows of a chunk. The chunk's runtime type
    /// must match this vector's type; a disagreement means the parser's
    /// typing invariant was broken somewhere upstream.
    pub fn push_chunk(&mut self, chunk: &ChunkData, take: usize) -> PlanResult<()> {
        match (self, chunk) {
            (ColumnVector::Bool(out), ChunkData::Bool(v)) => out.extend_from_slice(&v[..take]),
            (ColumnVector::Int8(out), ChunkData::Int8(v)) => out.extend_from_slice(&v[..take]),
            (ColumnVector::Int16(out), ChunkData::Int16(v)) => out.extend_from_slice(&v[..take]),
            (ColumnVector::Int32(out), ChunkData::Int32(v)) => out.extend_from_slice(&v[..take]),
            (ColumnVector::Int64(out), ChunkData::Int64(v)) => out.extend_from_slice(&v[..take]),
            (ColumnVector::Float(out), ChunkData::Float(v)) => out.extend_from_slice(&v[..take]),
            (ColumnVector::Double(out), ChunkData::Double(v)) => out.extend_from_slice(&v[..take]),
            (this, chunk) => {
                return Err(PlanError::DispatchMismatch(format!(
                    "column is {:?} but chunk is {:?}",
                    this.data_type(),
                    chunk.data_type()
                )))
            }
        }
        Ok(())
    }

    pub fn get(&self, row: usize) -> Option<GenericValue> {
        match self {
            ColumnVector::Bool(v) => v.get(row).map(|x| GenericValue::Bool(*x)),
            ColumnVector::Int8(v) => v.get(row).map(|x| GenericValue::Int8(*x)),
            ColumnVector::Int16(v) => v.get(row).map(|x| GenericValue::Int16(*x)),
            ColumnVector::Int32(v) => v.get(row).map(|x| GenericValue::Int32(*x)),
            ColumnVector::Int64(v) => v.get(row).map(|x| GenericValue::Int64(*x)),
            ColumnVector::Float(v) => v.get(row).map(|x| GenericValue::Float(*x)),
            ColumnVector::Double(v) => v.get(row).map(|x| GenericValue::Double(*x)),
        }
    }
}

/// Result of evaluating one expression node: a broadcastable scalar or a
/// column shaped to the evaluated row range.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Scalar(GenericValue),
    Column(ColumnVector),
}

impl EvalResult {
    pub fn data_type(&self) -> DataType {
        match self {
            EvalResult::Scalar(v) => v.data_type(),
            EvalResult::Column(c) => c.data_type(),
        }
    }

    /// `None` for a scalar (any length), `Some` for a column.
    pub fn len(&self) -> Option<usize> {
        match self {
            EvalResult::Scalar(_) => None,
            EvalResult::Column(c) => Some(c.len()),
        }
    }

    pub fn scalar_false() -> Self {
        EvalResult::Scalar(GenericValue::Bool(false))
    }
}

/// A boolean selection produced by a predicate: one bit per row, or a
/// constant when the predicate reduced without touching storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Scalar(bool),
    Mask(Vec<bool>),
}

impl Selection {
    /// Convert a predicate root's result. Non-boolean results indicate a
    /// tree the parser should never have produced.
    pub fn from_result(result: EvalResult) -> PlanResult<Selection> {
        match result {
            EvalResult::Scalar(GenericValue::Bool(b)) => Ok(Selection::Scalar(b)),
            EvalResult::Column(ColumnVector::Bool(mask)) => Ok(Selection::Mask(mask)),
            other => Err(PlanError::DispatchMismatch(format!(
                "predicate produced {:?}, expected Bool",
                other.data_type()
            ))),
        }
    }

    pub fn is_const_false(&self) -> bool {
        matches!(self, Selection::Scalar(false))
    }

    /// AND this selection with a per-row mask, producing a full mask.
    pub fn and_mask(self, other: &[bool]) -> Vec<bool> {
        match self {
            Selection::Scalar(true) => other.to_vec(),
            Selection::Scalar(false) => vec![false; other.len()],
            Selection::Mask(mask) => mask
                .iter()
                .zip(other.iter())
                .map(|(a, b)| *a && *b)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_chunk_type_checked() {
        let mut col = ColumnVector::with_capacity(DataType::Int32, 4).unwrap();
        col.push_chunk(&ChunkData::Int32(vec![1, 2, 3].into()), 2)
            .unwrap();
        assert_eq!(col, ColumnVector::Int32(vec![1, 2]));

        assert!(matches!(
            col.push_chunk(&ChunkData::Int64(vec![1].into()), 1),
            Err(PlanError::DispatchMismatch(_))
        ));
    }

    #[test]
    fn test_vector_types_not_materializable() {
        assert!(matches!(
            ColumnVector::with_capacity(DataType::FloatVector, 0),
            Err(PlanError::UnsupportedDataType(DataType::FloatVector))
        ));
    }

    #[test]
    fn test_selection_and_mask() {
        let sel = Selection::Mask(vec![true, true, false]);
        assert_eq!(
            sel.and_mask(&[true, false, true]),
            vec![true, false, false]
        );

        let sel = Selection::Scalar(true);
        assert_eq!(sel.and_mask(&[true, false]), vec![true, false]);

        let sel = Selection::Scalar(false);
        assert_eq!(sel.and_mask(&[true, true]), vec![false, false]);
    }

    #[test]
    fn test_selection_rejects_non_bool() {
        assert!(matches!(
            Selection::from_result(EvalResult::Scalar(GenericValue::Int32(1))),
            Err(PlanError::DispatchMismatch(_))
        ));
    }
}
