//! Wire plan to AST parser.
//!
//! Single deterministic pass: children are parsed before their parents so
//! types propagate bottom-up, while each node validates its own structural
//! contract on the way back. Wire literals are untyped containers and are
//! decoded here against the type of the column subtree they apply to; by
//! the time a tree leaves the parser every literal carries its final tag.

use std::collections::HashMap;

use log::debug;

use crate::error::{PlanError, PlanResult};
use crate::expression::expr::Expr;
use crate::expression::operator::{
    BinaryArithOp, BinaryLogicalOp, CompareOp, UnaryArithOp, UnaryLogicalOp,
};
use crate::plan::{ExtractedInfo, Plan, PlanNodeKind, RetrieveInfo, SearchInfo};
use crate::schema::{FieldId, FieldOffset, Schema};
use crate::value::{DataType, GenericValue};
use crate::wire;

/// Parser for one schema; cheap to construct per plan.
pub struct PlanParser<'a> {
    schema: &'a Schema,
}

impl<'a> PlanParser<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Parse a complete wire plan into a `Plan`.
    pub fn parse(&self, node: &wire::PlanNode) -> PlanResult<Plan> {
        let kind = node
            .node
            .as_ref()
            .ok_or_else(|| PlanError::UnsupportedNode("plan node unset".into()))?;

        match kind {
            wire::NodeKind::VectorSearch(search) => self.parse_search(search),
            wire::NodeKind::Retrieve(retrieve) => self.parse_retrieve(retrieve),
        }
    }

    fn parse_search(&self, node: &wire::VectorSearchNode) -> PlanResult<Plan> {
        let field_id = FieldId(node.field_id);
        let offset = self.schema.offset_of(field_id)?;
        let field = self.schema.field_at(offset)?;

        let expected = if node.is_binary {
            DataType::BinaryVector
        } else {
            DataType::FloatVector
        };
        if field.data_type != expected {
            return Err(PlanError::SchemaMismatch {
                field_id: field_id.0,
                declared: expected,
                actual: field.data_type,
            });
        }

        if node.query_info.topk < 0 {
            return Err(PlanError::TypeMismatch(format!(
                "topk must be nonnegative, got {}",
                node.query_info.topk
            )));
        }

        let predicate = self.parse_predicate(node.predicate.as_ref())?;
        let target_entries = self.resolve_outputs(&node.output_field_ids)?;
        let extracted_info = ExtractedInfo::extract_opt(predicate.as_ref());

        let mut tag2field = HashMap::new();
        tag2field.insert(node.placeholder_tag.clone(), field_id);

        if let Some(expr) = predicate.as_ref() {
            debug!("parsed search predicate: {}", expr);
        }

        Ok(Plan {
            node: PlanNodeKind::VectorSearch(SearchInfo {
                field: offset,
                is_binary: node.is_binary,
                metric_type: node.query_info.metric_type.clone(),
                topk: node.query_info.topk as usize,
                round_decimal: node.query_info.round_decimal,
                search_params: node.query_info.search_params.clone(),
                predicate,
            }),
            tag2field,
            target_entries,
            extracted_info,
        })
    }

    fn parse_retrieve(&self, node: &wire::RetrieveNode) -> PlanResult<Plan> {
        let predicate = self.parse_predicate(node.predicate.as_ref())?;
        let target_entries = self.resolve_outputs(&node.output_field_ids)?;
        let extracted_info = ExtractedInfo::extract_opt(predicate.as_ref());

        if let Some(expr) = predicate.as_ref() {
            debug!("parsed retrieve predicate: {}", expr);
        }

        Ok(Plan {
            node: PlanNodeKind::Retrieve(RetrieveInfo { predicate }),
            tag2field: HashMap::new(),
            target_entries,
            extracted_info,
        })
    }

    fn parse_predicate(&self, node: Option<&wire::ExprNode>) -> PlanResult<Option<Expr>> {
        let node = match node {
            Some(n) => n,
            None => return Ok(None),
        };
        let expr = self.parse_expr(node)?;
        if expr.data_type() != DataType::Bool {
            return Err(PlanError::TypeMismatch(format!(
                "predicate root must be Bool, got {:?}",
                expr.data_type()
            )));
        }
        Ok(Some(expr))
    }

    fn resolve_outputs(&self, field_ids: &[i64]) -> PlanResult<Vec<FieldOffset>> {
        field_ids
            .iter()
            .map(|id| self.schema.offset_of(FieldId(*id)))
            .collect()
    }

    /// Parse one wire expression node into an owned AST subtree.
    pub fn parse_expr(&self, node: &wire::ExprNode) -> PlanResult<Expr> {
        let kind = node
            .expr
            .as_ref()
            .ok_or_else(|| PlanError::UnsupportedNode("expression unset".into()))?;

        match kind {
            wire::ExprKind::Column(n) => self.parse_column(n),
            wire::ExprKind::Value(n) => {
                let value = decode_natural(&n.value)?;
                Ok(Expr::Value { value })
            }
            wire::ExprKind::UnaryLogical(n) => {
                let op = UnaryLogicalOp::from_wire(n.op)?;
                let child = self.parse_expr(&n.child)?;
                require_bool(&child, "unary logical operand")?;
                Ok(Expr::UnaryLogical {
                    op,
                    child: Box::new(child),
                })
            }
            wire::ExprKind::BinaryLogical(n) => {
                let op = BinaryLogicalOp::from_wire(n.op)?;
                let left = self.parse_expr(&n.left)?;
                let right = self.parse_expr(&n.right)?;
                require_bool(&left, "binary logical left operand")?;
                require_bool(&right, "binary logical right operand")?;
                Ok(Expr::BinaryLogical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            wire::ExprKind::Compare(n) => {
                let op = CompareOp::from_wire(n.op, "compare")?;
                let left = self.parse_expr(&n.left)?;
                let right = self.parse_expr(&n.right)?;
                // Operand types need not match, but they must unify.
                left.data_type().widen(right.data_type())?;
                Ok(Expr::Compare {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            wire::ExprKind::UnaryRange(n) => {
                let op = CompareOp::from_wire(n.op, "unary range")?;
                let child = self.parse_expr(&n.child)?;
                let value = decode_as(&n.value, child.data_type())?;
                Ok(Expr::UnaryRange {
                    op,
                    value,
                    child: Box::new(child),
                })
            }
            wire::ExprKind::BinaryRange(n) => {
                let child = self.parse_expr(&n.child)?;
                let lower = decode_as(&n.lower_value, child.data_type())?;
                let upper = decode_as(&n.upper_value, child.data_type())?;
                Ok(Expr::BinaryRange {
                    lower_inclusive: n.lower_inclusive,
                    upper_inclusive: n.upper_inclusive,
                    lower,
                    upper,
                    child: Box::new(child),
                })
            }
            wire::ExprKind::Term(n) => {
                let child = self.parse_expr(&n.child)?;
                let target = child.data_type();
                let values = n
                    .values
                    .iter()
                    .map(|v| decode_as(v, target))
                    .collect::<PlanResult<Vec<_>>>()?;
                Ok(Expr::Term {
                    child: Box::new(child),
                    values,
                })
            }
            wire::ExprKind::UnaryArith(n) => {
                let op = UnaryArithOp::from_wire(n.op)?;
                let child = self.parse_expr(&n.child)?;
                let data_type = child.data_type();
                match op {
                    UnaryArithOp::Minus if !data_type.is_numeric() => {
                        return Err(PlanError::TypeMismatch(format!(
                            "unary minus needs a numeric operand, got {:?}",
                            data_type
                        )))
                    }
                    UnaryArithOp::BitNot if !data_type.is_integral() => {
                        return Err(PlanError::TypeMismatch(format!(
                            "bitwise not needs an integral operand, got {:?}",
                            data_type
                        )))
                    }
                    _ => {}
                }
                Ok(Expr::UnaryArith {
                    op,
                    data_type,
                    child: Box::new(child),
                })
            }
            wire::ExprKind::BinaryArith(n) => {
                let op = BinaryArithOp::from_wire(n.op)?;
                let left = self.parse_expr(&n.left)?;
                let right = self.parse_expr(&n.right)?;
                let data_type = left.data_type().widen(right.data_type())?;
                if !data_type.is_numeric() {
                    return Err(PlanError::TypeMismatch(format!(
                        "arithmetic needs numeric operands, got {:?}",
                        data_type
                    )));
                }
                if op.requires_integral() && !data_type.is_integral() {
                    return Err(PlanError::TypeMismatch(format!(
                        "operator {} needs integral operands, got {:?}",
                        op.as_str(),
                        data_type
                    )));
                }
                Ok(Expr::BinaryArith {
                    op,
                    data_type,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            wire::ExprKind::Cast(n) => {
                let child = self.parse_expr(&n.child)?;
                if !n.data_type.is_scalar() {
                    return Err(PlanError::UnsupportedDataType(n.data_type));
                }
                // Structurally always valid; conversion semantics apply at
                // evaluation time, including narrowing truncation.
                Ok(Expr::Cast {
                    data_type: n.data_type,
                    child: Box::new(child),
                })
            }
        }
    }

    fn parse_column(&self, node: &wire::ColumnNode) -> PlanResult<Expr> {
        if !node.data_type.is_scalar() {
            return Err(PlanError::UnsupportedDataType(node.data_type));
        }
        let offset = self.schema.resolve(FieldId(node.field_id), node.data_type)?;
        Ok(Expr::Column {
            field_offset: offset,
            data_type: node.data_type,
        })
    }
}

fn require_bool(expr: &Expr, context: &str) -> PlanResult<()> {
    if expr.data_type() != DataType::Bool {
        return Err(PlanError::TypeMismatch(format!(
            "{} must be Bool, got {:?}",
            context,
            expr.data_type()
        )));
    }
    Ok(())
}

/// Decode a wire literal by its own container tag: bool stays Bool, int64
/// stays Int64, float64 stays Double.
fn decode_natural(node: &wire::GenericValueNode) -> PlanResult<GenericValue> {
    match node.value {
        Some(wire::WireValue::Bool(v)) => Ok(GenericValue::Bool(v)),
        Some(wire::WireValue::Int64(v)) => Ok(GenericValue::Int64(v)),
        Some(wire::WireValue::Float(v)) => Ok(GenericValue::Double(v)),
        None => Err(PlanError::MalformedValue),
    }
}

/// Decode a wire literal against the type of the column subtree it binds
/// to. The container kind must be compatible with the target, and integer
/// targets reject values outside their representable range.
fn decode_as(node: &wire::GenericValueNode, target: DataType) -> PlanResult<GenericValue> {
    let wire_value = node.value.as_ref().ok_or(PlanError::MalformedValue)?;

    match (wire_value, target) {
        (wire::WireValue::Bool(v), DataType::Bool) => Ok(GenericValue::Bool(*v)),
        (wire::WireValue::Int64(v), t) if t.is_integral() => GenericValue::Int64(*v)
            .convert_exact(t)
            .ok_or_else(|| {
                PlanError::TypeMismatch(format!("literal {} does not fit {:?}", v, t))
            }),
        (wire::WireValue::Int64(v), DataType::Float) => Ok(GenericValue::Float(*v as f32)),
        (wire::WireValue::Int64(v), DataType::Double) => Ok(GenericValue::Double(*v as f64)),
        (wire::WireValue::Float(v), DataType::Float) => Ok(GenericValue::Float(*v as f32)),
        (wire::WireValue::Float(v), DataType::Double) => Ok(GenericValue::Double(*v)),
        (w, t) => Err(PlanError::TypeMismatch(format!(
            "wire literal {:?} cannot bind to {:?}",
            w, t
        ))),
    }
}
