//! Parsed plan representation.
//!
//! A `Plan` is the in-process product of parsing a wire plan: the owned
//! predicate tree plus the side artifacts downstream components need
//! (placeholder-tag mapping, output projection, referenced-column info).

use std::collections::{BTreeSet, HashMap};

use crate::error::PlanResult;
use crate::expression::expr::Expr;
use crate::expression::parser::PlanParser;
use crate::schema::{FieldId, FieldOffset, Schema};
use crate::value::DataType;
use crate::wire;

/// A fully parsed query plan.
#[derive(Debug, Clone)]
pub struct Plan {
    pub node: PlanNodeKind,
    /// Placeholder tag of the vector query operand mapped to its field.
    pub tag2field: HashMap<String, FieldId>,
    /// Output projection: segment offsets of the requested output fields.
    pub target_entries: Vec<FieldOffset>,
    /// Columns the predicate touches, precomputed at parse time.
    pub extracted_info: ExtractedInfo,
}

impl Plan {
    pub fn predicate(&self) -> Option<&Expr> {
        match &self.node {
            PlanNodeKind::VectorSearch(info) => info.predicate.as_ref(),
            PlanNodeKind::Retrieve(info) => info.predicate.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PlanNodeKind {
    VectorSearch(SearchInfo),
    Retrieve(RetrieveInfo),
}

#[derive(Debug, Clone)]
pub struct SearchInfo {
    pub field: FieldOffset,
    pub is_binary: bool,
    pub metric_type: String,
    pub topk: usize,
    pub round_decimal: i64,
    pub search_params: String,
    pub predicate: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct RetrieveInfo {
    pub predicate: Option<Expr>,
}

/// Field offsets and data types referenced by a predicate tree.
///
/// Built by one pre-order walk, independent of the logical structure, so
/// downstream planning knows which columns must be resident.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedInfo {
    pub field_offsets: BTreeSet<FieldOffset>,
    pub data_types: BTreeSet<DataType>,
}

impl ExtractedInfo {
    pub fn extract(expr: &Expr) -> Self {
        let mut info = ExtractedInfo::default();
        info.visit(expr);
        info
    }

    pub fn extract_opt(expr: Option<&Expr>) -> Self {
        match expr {
            Some(e) => Self::extract(e),
            None => ExtractedInfo::default(),
        }
    }

    fn visit(&mut self, expr: &Expr) {
        match expr {
            Expr::Column {
                field_offset,
                data_type,
            } => {
                self.field_offsets.insert(*field_offset);
                self.data_types.insert(*data_type);
            }
            Expr::Value { .. } => {}
            Expr::UnaryLogical { child, .. }
            | Expr::UnaryRange { child, .. }
            | Expr::BinaryRange { child, .. }
            | Expr::Term { child, .. }
            | Expr::UnaryArith { child, .. }
            | Expr::Cast { child, .. } => self.visit(child),
            Expr::BinaryLogical { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::BinaryArith { left, right, .. } => {
                self.visit(left);
                self.visit(right);
            }
        }
    }
}

/// Parse a decoded wire plan against a schema.
pub fn parse_plan(schema: &Schema, node: &wire::PlanNode) -> PlanResult<Plan> {
    PlanParser::new(schema).parse(node)
}

/// Decode and parse a bincode-framed wire plan.
pub fn parse_plan_bytes(schema: &Schema, bytes: &[u8]) -> PlanResult<Plan> {
    let node = wire::PlanNode::from_bytes(bytes)?;
    parse_plan(schema, &node)
}
