//! Scalar-index fast path for range and term nodes.
//!
//! Indexed chunks form a prefix of a column's chunk list. When a range or
//! term node reads a bare column, possibly through a chain of casts, the
//! query can be answered per chunk from the sorted index and only the
//! unindexed remainder is scanned raw. The stitched mask covers exactly the
//! snapshot row count in chunk order.
//!
//! The path only engages when it provably agrees with a raw scan: every
//! cast step in the chain must preserve values, and every operand must
//! convert exactly into the column's native type. Anything else falls back
//! to the scan kernels, which apply the casts row by row.

use log::trace;

use crate::error::{PlanError, PlanResult};
use crate::executor::{compute, ColumnVector, EvalResult};
use crate::expression::operator::{BinaryLogicalOp, CompareOp};
use crate::expression::Expr;
use crate::schema::FieldOffset;
use crate::segment::{ChunkData, IndexQuery, SegmentData};
use crate::value::{DataType, GenericValue};

/// Answer a range or term node from the scalar index where possible.
///
/// `Ok(None)` means the node is not eligible and the caller should scan.
pub(crate) fn try_index_scan<S: SegmentData + ?Sized>(
    segment: &S,
    row_count: usize,
    expr: &Expr,
) -> PlanResult<Option<EvalResult>> {
    let (child, field, native) = match eligible_child(expr) {
        Some(found) => found,
        None => return Ok(None),
    };

    if segment.indexed_chunk_count(field) == 0 {
        return Ok(None);
    }

    // Operands arrive in the cast chain's output type; the index holds
    // native values, so every operand must convert exactly.
    let operand_type = child.data_type();
    let query = match build_query(expr, operand_type, native) {
        Some(query) => query,
        None => {
            trace!(
                "operand has no exact {:?} representation for column {}, scanning",
                native,
                field.0
            );
            return Ok(None);
        }
    };

    trace!(
        "index fast path on column {}: {}/{} chunks indexed",
        field.0,
        segment.indexed_chunk_count(field),
        segment.chunk_count(field)
    );
    let mask = stitched_scan(segment, row_count, field, &query)?;
    Ok(Some(EvalResult::Column(ColumnVector::Bool(mask))))
}

/// The column subtree of a range or term node, when the cast chain above
/// it is value preserving.
fn eligible_child(expr: &Expr) -> Option<(&Expr, FieldOffset, DataType)> {
    let child = match expr {
        Expr::UnaryRange { child, .. } => child,
        Expr::BinaryRange { child, .. } => child,
        Expr::Term { child, values } if !values.is_empty() => child,
        _ => return None,
    };
    let (field, native) = lossless_chain(child)?;
    Some((child, field, native))
}

fn lossless_chain(expr: &Expr) -> Option<(FieldOffset, DataType)> {
    let found = expr.underlying_column()?;
    chain_preserves_values(expr).then_some(found)
}

fn chain_preserves_values(expr: &Expr) -> bool {
    match expr {
        Expr::Column { .. } => true,
        Expr::Cast { data_type, child } => {
            value_preserving(child.data_type(), *data_type) && chain_preserves_values(child)
        }
        _ => false,
    }
}

/// Whether every value of `from` survives a cast to `to` unchanged.
fn value_preserving(from: DataType, to: DataType) -> bool {
    if from == to {
        return true;
    }
    let int_bits = |dt: DataType| match dt {
        DataType::Int8 => Some(8u32),
        DataType::Int16 => Some(16),
        DataType::Int32 => Some(32),
        DataType::Int64 => Some(64),
        _ => None,
    };
    // Mantissa widths bound which integers a float type holds exactly.
    match (int_bits(from), int_bits(to)) {
        (Some(a), Some(b)) => a <= b,
        (Some(a), None) => match to {
            DataType::Float => a <= 24,
            DataType::Double => a <= 53,
            _ => false,
        },
        (None, None) => from == DataType::Float && to == DataType::Double,
        (None, Some(_)) => false,
    }
}

fn convert_operand(
    value: &GenericValue,
    operand_type: DataType,
    native: DataType,
) -> Option<GenericValue> {
    if value.data_type() != operand_type {
        return None;
    }
    value.convert_exact(native)
}

fn build_query(expr: &Expr, operand_type: DataType, native: DataType) -> Option<IndexQuery> {
    match expr {
        Expr::UnaryRange { op, value, .. } => Some(IndexQuery::UnaryRange {
            op: *op,
            value: convert_operand(value, operand_type, native)?,
        }),
        Expr::BinaryRange {
            lower_inclusive,
            upper_inclusive,
            lower,
            upper,
            ..
        } => Some(IndexQuery::BinaryRange {
            lower_inclusive: *lower_inclusive,
            upper_inclusive: *upper_inclusive,
            lower: convert_operand(lower, operand_type, native)?,
            upper: convert_operand(upper, operand_type, native)?,
        }),
        Expr::Term { values, .. } => {
            let converted: Option<Vec<GenericValue>> = values
                .iter()
                .map(|v| convert_operand(v, operand_type, native))
                .collect();
            Some(IndexQuery::Term { values: converted? })
        }
        _ => None,
    }
}

/// Index-answered prefix plus raw-scanned remainder, stitched in chunk
/// order to exactly `row_count` bits.
fn stitched_scan<S: SegmentData + ?Sized>(
    segment: &S,
    row_count: usize,
    field: FieldOffset,
    query: &IndexQuery,
) -> PlanResult<Vec<bool>> {
    let indexed = segment.indexed_chunk_count(field);
    let size_per_chunk = segment.size_per_chunk();
    let chunk_count = segment.chunk_count(field);

    let mut out = Vec::with_capacity(row_count);
    for chunk_id in 0..chunk_count {
        let remaining = row_count - out.len();
        if remaining == 0 {
            break;
        }
        if chunk_id < indexed {
            let take = remaining.min(size_per_chunk);
            let mut bits = segment.query_index(field, chunk_id, query)?;
            // Short answers pad with non-matches, long answers truncate.
            bits.resize(take, false);
            out.extend_from_slice(&bits[..take]);
        } else {
            let chunk = segment.chunk(field, chunk_id)?;
            let take = remaining.min(chunk.len());
            out.extend_from_slice(&scan_chunk(&chunk, take, query)?);
        }
    }

    if out.len() != row_count {
        return Err(PlanError::DispatchMismatch(format!(
            "column {} holds {} rows, snapshot expects {}",
            field.0,
            out.len(),
            row_count
        )));
    }
    Ok(out)
}

/// Apply a native-domain query to one raw chunk with the scan kernels.
fn scan_chunk(chunk: &ChunkData, take: usize, query: &IndexQuery) -> PlanResult<Vec<bool>> {
    let mut col = ColumnVector::with_capacity(chunk.data_type(), take)?;
    col.push_chunk(chunk, take)?;
    let child = EvalResult::Column(col);

    let result = match query {
        IndexQuery::UnaryRange { op, value } => {
            compute::compare(*op, &child, &EvalResult::Scalar(*value))?
        }
        IndexQuery::BinaryRange {
            lower_inclusive,
            upper_inclusive,
            lower,
            upper,
        } => {
            let lower_op = if *lower_inclusive {
                CompareOp::Ge
            } else {
                CompareOp::Gt
            };
            let upper_op = if *upper_inclusive {
                CompareOp::Le
            } else {
                CompareOp::Lt
            };
            let above = compute::compare(lower_op, &child, &EvalResult::Scalar(*lower))?;
            let below = compute::compare(upper_op, &child, &EvalResult::Scalar(*upper))?;
            compute::logical_binary(BinaryLogicalOp::And, &above, &below)?
        }
        IndexQuery::Term { values } => compute::term_membership(&child, values)?,
    };

    match result {
        EvalResult::Column(ColumnVector::Bool(mask)) => Ok(mask),
        other => Err(PlanError::DispatchMismatch(format!(
            "chunk scan produced {:?}, expected a Bool column",
            other.data_type()
        ))),
    }
}
