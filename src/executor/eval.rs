//! Predicate evaluation over a segment snapshot.
//!
//! The executor walks a parsed expression tree post-order and returns each
//! node's value up the stack, a scalar for literal-only subtrees and a
//! column for anything touching storage. Range and term nodes first try the
//! scalar-index fast path in `index`; everything else materializes columns
//! and runs the `compute` kernels.

use crate::error::{PlanError, PlanResult};
use crate::executor::{compute, index, ColumnVector, EvalResult, Selection};
use crate::expression::Expr;
use crate::expression::operator::{CompareOp, UnaryLogicalOp};
use crate::schema::FieldOffset;
use crate::segment::SegmentData;
use crate::value::{DataType, GenericValue};

/// Evaluates predicates against one segment at a fixed row count.
///
/// `row_count` is the snapshot taken by the caller before evaluation began;
/// rows appended afterwards are never read, so concurrent evaluations over
/// the same tree agree on the result length.
pub struct PredicateExecutor<'a, S: SegmentData + ?Sized> {
    segment: &'a S,
    row_count: usize,
}

impl<'a, S: SegmentData + ?Sized> PredicateExecutor<'a, S> {
    pub fn new(segment: &'a S, row_count: usize) -> Self {
        PredicateExecutor { segment, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Evaluate a boolean predicate to a selection over the snapshot.
    pub fn evaluate(&self, expr: &Expr) -> PlanResult<Selection> {
        let result = self.eval_expr(expr)?;
        if let Some(n) = result.len() {
            if n != self.row_count {
                return Err(PlanError::DispatchMismatch(format!(
                    "predicate produced {} rows for a {}-row snapshot",
                    n, self.row_count
                )));
            }
        }
        Selection::from_result(result)
    }

    fn eval_expr(&self, expr: &Expr) -> PlanResult<EvalResult> {
        match expr {
            Expr::Column {
                field_offset,
                data_type,
            } => Ok(EvalResult::Column(
                self.materialize_column(*field_offset, *data_type)?,
            )),

            Expr::Value { value } => Ok(EvalResult::Scalar(*value)),

            Expr::UnaryLogical { op, child } => {
                let child = self.eval_expr(child)?;
                match op {
                    UnaryLogicalOp::Not => compute::logical_not(&child),
                }
            }

            Expr::BinaryLogical { op, left, right } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                compute::logical_binary(*op, &left, &right)
            }

            Expr::Compare { op, left, right } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                compute::compare(*op, &left, &right)
            }

            Expr::UnaryRange { op, value, child } => {
                if let Some(result) = index::try_index_scan(self.segment, self.row_count, expr)? {
                    return Ok(result);
                }
                let child = self.eval_expr(child)?;
                compute::compare(*op, &child, &EvalResult::Scalar(*value))
            }

            Expr::BinaryRange {
                lower_inclusive,
                upper_inclusive,
                lower,
                upper,
                child,
            } => {
                // A provably empty interval short-circuits before any
                // storage access.
                if range_is_empty(*lower_inclusive, *upper_inclusive, lower, upper) {
                    return Ok(EvalResult::scalar_false());
                }
                if let Some(result) = index::try_index_scan(self.segment, self.row_count, expr)? {
                    return Ok(result);
                }
                let child = self.eval_expr(child)?;
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
                compute::logical_binary(
                    crate::expression::operator::BinaryLogicalOp::And,
                    &above,
                    &below,
                )
            }

            Expr::Term { child, values } => {
                // An empty list is the constant false and never touches
                // storage.
                if values.is_empty() {
                    return Ok(EvalResult::scalar_false());
                }
                if let Some(result) = index::try_index_scan(self.segment, self.row_count, expr)? {
                    return Ok(result);
                }
                let child = self.eval_expr(child)?;
                compute::term_membership(&child, values)
            }

            Expr::UnaryArith {
                op,
                data_type,
                child,
            } => {
                let child = self.eval_expr(child)?;
                compute::unary_arith(*op, *data_type, &child)
            }

            Expr::BinaryArith {
                op,
                data_type,
                left,
                right,
            } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                compute::binary_arith(*op, *data_type, &left, &right)
            }

            Expr::Cast { data_type, child } => {
                let child = self.eval_expr(child)?;
                compute::promote(&child, *data_type)
            }
        }
    }

    /// Gather the first `row_count` rows of a column across its chunks.
    fn materialize_column(
        &self,
        field: FieldOffset,
        data_type: DataType,
    ) -> PlanResult<ColumnVector> {
        let mut out = ColumnVector::with_capacity(data_type, self.row_count)?;
        let chunk_count = self.segment.chunk_count(field);
        for chunk_id in 0..chunk_count {
            let remaining = self.row_count - out.len();
            if remaining == 0 {
                break;
            }
            let chunk = self.segment.chunk(field, chunk_id)?;
            out.push_chunk(&chunk, remaining.min(chunk.len()))?;
        }
        if out.len() != self.row_count {
            return Err(PlanError::DispatchMismatch(format!(
                "column {} holds {} rows, snapshot expects {}",
                field.0,
                out.len(),
                self.row_count
            )));
        }
        Ok(out)
    }
}

fn range_is_empty(
    lower_inclusive: bool,
    upper_inclusive: bool,
    lower: &GenericValue,
    upper: &GenericValue,
) -> bool {
    match lower.compare(upper) {
        Some(std::cmp::Ordering::Greater) => true,
        Some(std::cmp::Ordering::Equal) => !(lower_inclusive && upper_inclusive),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::operator::BinaryArithOp;
    use crate::schema::{FieldSchema, Schema};
    use crate::segment::{ChunkData, IndexQuery, MemSegment, Timestamp};

    fn int32_segment(values: &[i32], size_per_chunk: usize) -> (Schema, MemSegment) {
        let schema = Schema::new(vec![FieldSchema::scalar(
            crate::schema::FieldId(100),
            "age",
            DataType::Int32,
        )]);
        let segment = MemSegment::new(&schema, size_per_chunk).unwrap();
        for (i, v) in values.iter().enumerate() {
            segment
                .append_row(
                    &[(FieldOffset(0), GenericValue::Int32(*v))],
                    Timestamp(i as u64 + 1),
                )
                .unwrap();
        }
        (schema, segment)
    }

    fn mask(selection: Selection, row_count: usize) -> Vec<bool> {
        match selection {
            Selection::Scalar(v) => vec![v; row_count],
            Selection::Mask(m) => m,
        }
    }

    #[test]
    fn test_compare_column_to_literal() {
        let (_, segment) = int32_segment(&[10, 20, 30, 40, 50], 2);
        let executor = PredicateExecutor::new(&segment, 5);
        let expr = Expr::compare(
            CompareOp::Ge,
            Expr::column(FieldOffset(0), DataType::Int32),
            Expr::value(GenericValue::Int32(30)),
        );
        assert_eq!(
            mask(executor.evaluate(&expr).unwrap(), 5),
            vec![false, false, true, true, true]
        );
    }

    #[test]
    fn test_conjunction_across_chunks() {
        let values: Vec<i32> = (0..10).map(|i| i * 1000).collect();
        let (_, segment) = int32_segment(&values, 3);
        let executor = PredicateExecutor::new(&segment, 10);
        let expr = Expr::and(
            Expr::compare(
                CompareOp::Gt,
                Expr::column(FieldOffset(0), DataType::Int32),
                Expr::value(GenericValue::Int32(2000)),
            ),
            Expr::compare(
                CompareOp::Lt,
                Expr::column(FieldOffset(0), DataType::Int32),
                Expr::value(GenericValue::Int32(7000)),
            ),
        );
        let expected: Vec<bool> = values.iter().map(|v| *v > 2000 && *v < 7000).collect();
        assert_eq!(mask(executor.evaluate(&expr).unwrap(), 10), expected);
    }

    #[test]
    fn test_unary_range_matches_compare() {
        let (_, segment) = int32_segment(&[5, 15, 25], 8);
        let executor = PredicateExecutor::new(&segment, 3);
        let range = Expr::UnaryRange {
            op: CompareOp::Lt,
            value: GenericValue::Int32(20),
            child: Box::new(Expr::column(FieldOffset(0), DataType::Int32)),
        };
        assert_eq!(
            mask(executor.evaluate(&range).unwrap(), 3),
            vec![true, true, false]
        );
    }

    #[test]
    fn test_degenerate_binary_range_skips_storage() {
        // The segment trait object fails on any chunk access; a degenerate
        // range must still produce the constant false.
        struct NoStorage;
        impl SegmentData for NoStorage {
            fn row_count(&self) -> usize {
                4
            }
            fn size_per_chunk(&self) -> usize {
                4
            }
            fn chunk_count(&self, _field: FieldOffset) -> usize {
                1
            }
            fn chunk(&self, _field: FieldOffset, _chunk_id: usize) -> PlanResult<ChunkData> {
                panic!("storage must not be touched");
            }
            fn indexed_chunk_count(&self, _field: FieldOffset) -> usize {
                0
            }
            fn query_index(
                &self,
                _field: FieldOffset,
                _chunk_id: usize,
                _query: &IndexQuery,
            ) -> PlanResult<Vec<bool>> {
                panic!("index must not be touched");
            }
            fn active_count(&self, _ts: Timestamp) -> usize {
                4
            }
            fn visibility_mask(&self, _ts: Timestamp, row_count: usize) -> Vec<bool> {
                vec![true; row_count]
            }
        }

        let executor = PredicateExecutor::new(&NoStorage, 4);
        let expr = Expr::BinaryRange {
            lower_inclusive: true,
            upper_inclusive: false,
            lower: GenericValue::Int32(10),
            upper: GenericValue::Int32(10),
            child: Box::new(Expr::column(FieldOffset(0), DataType::Int32)),
        };
        let selection = executor.evaluate(&expr).unwrap();
        assert!(selection.is_const_false());

        let term = Expr::Term {
            child: Box::new(Expr::column(FieldOffset(0), DataType::Int32)),
            values: vec![],
        };
        assert!(executor.evaluate(&term).unwrap().is_const_false());
    }

    #[test]
    fn test_binary_range_inclusive_bounds() {
        let (_, segment) = int32_segment(&[1, 2, 3, 4, 5], 2);
        let executor = PredicateExecutor::new(&segment, 5);
        let expr = Expr::BinaryRange {
            lower_inclusive: true,
            upper_inclusive: false,
            lower: GenericValue::Int32(2),
            upper: GenericValue::Int32(4),
            child: Box::new(Expr::column(FieldOffset(0), DataType::Int32)),
        };
        assert_eq!(
            mask(executor.evaluate(&expr).unwrap(), 5),
            vec![false, true, true, false, false]
        );
    }

    #[test]
    fn test_arith_subtree_feeds_compare() {
        let (_, segment) = int32_segment(&[3, 6, 9], 8);
        let executor = PredicateExecutor::new(&segment, 3);
        // (col % 2) == 0
        let expr = Expr::compare(
            CompareOp::Eq,
            Expr::BinaryArith {
                op: BinaryArithOp::Mod,
                data_type: DataType::Int32,
                left: Box::new(Expr::column(FieldOffset(0), DataType::Int32)),
                right: Box::new(Expr::value(GenericValue::Int32(2))),
            },
            Expr::value(GenericValue::Int32(0)),
        );
        assert_eq!(
            mask(executor.evaluate(&expr).unwrap(), 3),
            vec![false, true, false]
        );
    }

    #[test]
    fn test_cast_chain_evaluates() {
        let (_, segment) = int32_segment(&[100, 200], 8);
        let executor = PredicateExecutor::new(&segment, 2);
        let expr = Expr::compare(
            CompareOp::Gt,
            Expr::Cast {
                data_type: DataType::Double,
                child: Box::new(Expr::column(FieldOffset(0), DataType::Int32)),
            },
            Expr::value(GenericValue::Double(150.0)),
        );
        assert_eq!(
            mask(executor.evaluate(&expr).unwrap(), 2),
            vec![false, true]
        );
    }

    #[test]
    fn test_snapshot_shorter_than_storage() {
        let (_, segment) = int32_segment(&[1, 2, 3, 4, 5, 6], 2);
        // A snapshot taken before the last two rows landed.
        let executor = PredicateExecutor::new(&segment, 4);
        let expr = Expr::compare(
            CompareOp::Gt,
            Expr::column(FieldOffset(0), DataType::Int32),
            Expr::value(GenericValue::Int32(0)),
        );
        assert_eq!(mask(executor.evaluate(&expr).unwrap(), 4).len(), 4);
    }
}
