//! Decoded wire plan message.
//!
//! This module mirrors the proto plan message shape: optional unions are
//! `Option` fields (an unset union is a parse error, never a default) and
//! every operator enum keeps its explicit invalid sentinel so the parser
//! can distinguish "never set" from a real operator. Byte-level framing
//! uses bincode; the proto encoding itself is assumed handled upstream.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::value::DataType;

/// Top-level wire plan: exactly one node kind should be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub node: Option<NodeKind>,
}

impl PlanNode {
    pub fn vector_search(node: VectorSearchNode) -> Self {
        Self {
            node: Some(NodeKind::VectorSearch(node)),
        }
    }

    pub fn retrieve(node: RetrieveNode) -> Self {
        Self {
            node: Some(NodeKind::Retrieve(node)),
        }
    }

    pub fn to_bytes(&self) -> PlanResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| PlanError::WireDecode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> PlanResult<Self> {
        bincode::deserialize(bytes).map_err(|e| PlanError::WireDecode(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    VectorSearch(VectorSearchNode),
    Retrieve(RetrieveNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchNode {
    pub field_id: i64,
    pub is_binary: bool,
    pub placeholder_tag: String,
    pub query_info: QueryInfo,
    pub predicate: Option<ExprNode>,
    pub output_field_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveNode {
    pub predicate: Option<ExprNode>,
    pub output_field_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInfo {
    pub metric_type: String,
    pub topk: i64,
    pub round_decimal: i64,
    pub search_params: String,
}

/// Untyped wire literal: one of bool / int64 / float64, or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericValueNode {
    pub value: Option<WireValue>,
}

impl GenericValueNode {
    pub fn bool_val(v: bool) -> Self {
        Self {
            value: Some(WireValue::Bool(v)),
        }
    }

    pub fn int64_val(v: i64) -> Self {
        Self {
            value: Some(WireValue::Int64(v)),
        }
    }

    pub fn float_val(v: f64) -> Self {
        Self {
            value: Some(WireValue::Float(v)),
        }
    }

    pub fn unset() -> Self {
        Self { value: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    Bool(bool),
    Int64(i64),
    Float(f64),
}

/// Expression wire union; `expr: None` means an unknown or unset variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprNode {
    pub expr: Option<ExprKind>,
}

impl ExprNode {
    pub fn new(kind: ExprKind) -> Self {
        Self { expr: Some(kind) }
    }

    pub fn unset() -> Self {
        Self { expr: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Column(ColumnNode),
    Value(ValueNode),
    UnaryLogical(UnaryLogicalNode),
    BinaryLogical(BinaryLogicalNode),
    Compare(CompareNode),
    UnaryRange(UnaryRangeNode),
    BinaryRange(BinaryRangeNode),
    Term(TermNode),
    UnaryArith(UnaryArithNode),
    BinaryArith(BinaryArithNode),
    Cast(CastNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnNode {
    pub field_id: i64,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueNode {
    pub value: GenericValueNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryLogicalNode {
    pub op: UnaryLogicalOp,
    pub child: Box<ExprNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryLogicalNode {
    pub op: BinaryLogicalOp,
    pub left: Box<ExprNode>,
    pub right: Box<ExprNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareNode {
    pub op: CompareOp,
    pub left: Box<ExprNode>,
    pub right: Box<ExprNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryRangeNode {
    pub op: CompareOp,
    pub value: GenericValueNode,
    pub child: Box<ExprNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryRangeNode {
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
    pub lower_value: GenericValueNode,
    pub upper_value: GenericValueNode,
    pub child: Box<ExprNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermNode {
    pub child: Box<ExprNode>,
    pub values: Vec<GenericValueNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryArithNode {
    pub op: UnaryArithOp,
    pub child: Box<ExprNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryArithNode {
    pub op: BinaryArithOp,
    pub left: Box<ExprNode>,
    pub right: Box<ExprNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastNode {
    pub data_type: DataType,
    pub child: Box<ExprNode>,
}

// Operator enums. Each carries the proto-style zero value `Invalid`; an
// Invalid operator reaching the parser is rejected, never defaulted.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryLogicalOp {
    Invalid,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryLogicalOp {
    Invalid,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Invalid,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryArithOp {
    Invalid,
    Minus,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryArithOp {
    Invalid,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Power,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}
