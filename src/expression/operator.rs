//! Operator definitions for parsed expressions.
//!
//! These are the post-parse operator sets: the wire-level invalid sentinels
//! are gone, so a parsed tree can only carry a real operator. Conversion
//! from the wire enums lives here and is where `InvalidOperator` surfaces.

use std::cmp::Ordering;

use crate::error::{PlanError, PlanResult};
use crate::wire;

/// Unary boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryLogicalOp {
    Not,
}

impl UnaryLogicalOp {
    pub fn from_wire(op: wire::UnaryLogicalOp) -> PlanResult<Self> {
        match op {
            wire::UnaryLogicalOp::Not => Ok(UnaryLogicalOp::Not),
            wire::UnaryLogicalOp::Invalid => Err(PlanError::InvalidOperator {
                node: "unary logical",
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        "not"
    }
}

/// Binary boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryLogicalOp {
    And,
    Or,
    Xor,
}

impl BinaryLogicalOp {
    pub fn from_wire(op: wire::BinaryLogicalOp) -> PlanResult<Self> {
        match op {
            wire::BinaryLogicalOp::And => Ok(BinaryLogicalOp::And),
            wire::BinaryLogicalOp::Or => Ok(BinaryLogicalOp::Or),
            wire::BinaryLogicalOp::Xor => Ok(BinaryLogicalOp::Xor),
            wire::BinaryLogicalOp::Invalid => Err(PlanError::InvalidOperator {
                node: "binary logical",
            }),
        }
    }

    pub fn apply(&self, a: bool, b: bool) -> bool {
        match self {
            BinaryLogicalOp::And => a && b,
            BinaryLogicalOp::Or => a || b,
            BinaryLogicalOp::Xor => a ^ b,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryLogicalOp::And => "and",
            BinaryLogicalOp::Or => "or",
            BinaryLogicalOp::Xor => "xor",
        }
    }
}

/// Comparison operators, shared by compare and range nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn from_wire(op: wire::CompareOp, node: &'static str) -> PlanResult<Self> {
        match op {
            wire::CompareOp::Lt => Ok(CompareOp::Lt),
            wire::CompareOp::Le => Ok(CompareOp::Le),
            wire::CompareOp::Gt => Ok(CompareOp::Gt),
            wire::CompareOp::Ge => Ok(CompareOp::Ge),
            wire::CompareOp::Eq => Ok(CompareOp::Eq),
            wire::CompareOp::Ne => Ok(CompareOp::Ne),
            wire::CompareOp::Invalid => Err(PlanError::InvalidOperator { node }),
        }
    }

    /// Apply the operator to two comparable values. An unordered pair
    /// (NaN against anything) never satisfies the operator.
    pub fn apply<T: PartialOrd>(&self, a: &T, b: &T) -> bool {
        match a.partial_cmp(b) {
            Some(ord) => self.matches(ord),
            None => false,
        }
    }

    pub fn matches(&self, ord: Ordering) -> bool {
        match self {
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }
}

/// Unary numeric transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryArithOp {
    Minus,
    BitNot,
}

impl UnaryArithOp {
    pub fn from_wire(op: wire::UnaryArithOp) -> PlanResult<Self> {
        match op {
            wire::UnaryArithOp::Minus => Ok(UnaryArithOp::Minus),
            wire::UnaryArithOp::BitNot => Ok(UnaryArithOp::BitNot),
            wire::UnaryArithOp::Invalid => Err(PlanError::InvalidOperator {
                node: "unary arith",
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryArithOp::Minus => "-",
            UnaryArithOp::BitNot => "~",
        }
    }
}

/// Binary numeric and bitwise transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryArithOp {
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

impl BinaryArithOp {
    pub fn from_wire(op: wire::BinaryArithOp) -> PlanResult<Self> {
        match op {
            wire::BinaryArithOp::Add => Ok(BinaryArithOp::Add),
            wire::BinaryArithOp::Sub => Ok(BinaryArithOp::Sub),
            wire::BinaryArithOp::Mul => Ok(BinaryArithOp::Mul),
            wire::BinaryArithOp::Div => Ok(BinaryArithOp::Div),
            wire::BinaryArithOp::Mod => Ok(BinaryArithOp::Mod),
            wire::BinaryArithOp::Power => Ok(BinaryArithOp::Power),
            wire::BinaryArithOp::BitAnd => Ok(BinaryArithOp::BitAnd),
            wire::BinaryArithOp::BitOr => Ok(BinaryArithOp::BitOr),
            wire::BinaryArithOp::BitXor => Ok(BinaryArithOp::BitXor),
            wire::BinaryArithOp::ShiftLeft => Ok(BinaryArithOp::ShiftLeft),
            wire::BinaryArithOp::ShiftRight => Ok(BinaryArithOp::ShiftRight),
            wire::BinaryArithOp::Invalid => Err(PlanError::InvalidOperator {
                node: "binary arith",
            }),
        }
    }

    /// Operators with integer-only semantics.
    pub fn requires_integral(&self) -> bool {
        matches!(
            self,
            BinaryArithOp::Mod
                | BinaryArithOp::BitAnd
                | BinaryArithOp::BitOr
                | BinaryArithOp::BitXor
                | BinaryArithOp::ShiftLeft
                | BinaryArithOp::ShiftRight
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryArithOp::Add => "+",
            BinaryArithOp::Sub => "-",
            BinaryArithOp::Mul => "*",
            BinaryArithOp::Div => "/",
            BinaryArithOp::Mod => "%",
            BinaryArithOp::Power => "**",
            BinaryArithOp::BitAnd => "&",
            BinaryArithOp::BitOr => "|",
            BinaryArithOp::BitXor => "^",
            BinaryArithOp::ShiftLeft => "<<",
            BinaryArithOp::ShiftRight => ">>",
        }
    }
}
