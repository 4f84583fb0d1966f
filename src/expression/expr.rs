//! Expression AST definitions.
//!
//! A parsed predicate is a strict ownership tree: every child is boxed and
//! owned by exactly one parent, leaves are columns or literals, and no node
//! carries mutable state. Once built by the parser a tree is immutable, so
//! any number of concurrent evaluations may walk it.

use crate::expression::operator::{
    BinaryArithOp, BinaryLogicalOp, CompareOp, UnaryArithOp, UnaryLogicalOp,
};
use crate::schema::FieldOffset;
use crate::value::{DataType, GenericValue};

/// A node of the predicate expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Leaf referencing a schema column by segment offset.
    Column {
        field_offset: FieldOffset,
        data_type: DataType,
    },

    /// Leaf literal.
    Value { value: GenericValue },

    UnaryLogical {
        op: UnaryLogicalOp,
        child: Box<Expr>,
    },

    BinaryLogical {
        op: BinaryLogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Single-bound range filter over one column subtree.
    UnaryRange {
        op: CompareOp,
        value: GenericValue,
        child: Box<Expr>,
    },

    /// Two-bound range filter over one column subtree.
    BinaryRange {
        lower_inclusive: bool,
        upper_inclusive: bool,
        lower: GenericValue,
        upper: GenericValue,
        child: Box<Expr>,
    },

    /// IN-list membership test. All values share the child's type; an
    /// empty list makes the node the constant `false`.
    Term {
        child: Box<Expr>,
        values: Vec<GenericValue>,
    },

    UnaryArith {
        op: UnaryArithOp,
        data_type: DataType,
        child: Box<Expr>,
    },

    /// Binary arithmetic; `data_type` is the widened operand type computed
    /// at parse time.
    BinaryArith {
        op: BinaryArithOp,
        data_type: DataType,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Explicit numeric conversion to `data_type`.
    Cast {
        data_type: DataType,
        child: Box<Expr>,
    },
}

impl Expr {
    /// The type this node was inferred to produce at parse time.
    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Column { data_type, .. } => *data_type,
            Expr::Value { value } => value.data_type(),
            Expr::UnaryLogical { .. }
            | Expr::BinaryLogical { .. }
            | Expr::Compare { .. }
            | Expr::UnaryRange { .. }
            | Expr::BinaryRange { .. }
            | Expr::Term { .. } => DataType::Bool,
            Expr::UnaryArith { data_type, .. }
            | Expr::BinaryArith { data_type, .. }
            | Expr::Cast { data_type, .. } => *data_type,
        }
    }

    pub fn column(field_offset: FieldOffset, data_type: DataType) -> Self {
        Expr::Column {
            field_offset,
            data_type,
        }
    }

    pub fn value(value: GenericValue) -> Self {
        Expr::Value { value }
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::BinaryLogical {
            op: BinaryLogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(child: Expr) -> Self {
        Expr::UnaryLogical {
            op: UnaryLogicalOp::Not,
            child: Box::new(child),
        }
    }

    /// The column this subtree reads, looking through any chain of casts.
    /// `None` when the subtree is not a (possibly cast) bare column.
    pub fn underlying_column(&self) -> Option<(FieldOffset, DataType)> {
        match self {
            Expr::Column {
                field_offset,
                data_type,
            } => Some((*field_offset, *data_type)),
            Expr::Cast { child, .. } => child.underlying_column(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column {
                field_offset,
                data_type,
            } => write!(f, "col#{}:{:?}", field_offset.0, data_type),
            Expr::Value { value } => write!(f, "{}", value),
            Expr::UnaryLogical { op, child } => write!(f, "({} {})", op.as_str(), child),
            Expr::BinaryLogical { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }
            Expr::Compare { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }
            Expr::UnaryRange { op, value, child } => {
                write!(f, "({} {} {})", child, op.as_str(), value)
            }
            Expr::BinaryRange {
                lower_inclusive,
                upper_inclusive,
                lower,
                upper,
                child,
            } => write!(
                f,
                "({} in {}{}, {}{})",
                child,
                if *lower_inclusive { "[" } else { "(" },
                lower,
                upper,
                if *upper_inclusive { "]" } else { ")" },
            ),
            Expr::Term { child, values } => {
                write!(f, "({} in {{", child)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}})")
            }
            Expr::UnaryArith { op, child, .. } => write!(f, "({}{})", op.as_str(), child),
            Expr::BinaryArith {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op.as_str(), right),
            Expr::Cast { data_type, child } => write!(f, "cast<{:?}>({})", data_type, child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_inference() {
        let col = Expr::column(FieldOffset(0), DataType::Int32);
        assert_eq!(col.data_type(), DataType::Int32);

        let cmp = Expr::compare(
            CompareOp::Gt,
            col.clone(),
            Expr::value(GenericValue::Int32(5)),
        );
        assert_eq!(cmp.data_type(), DataType::Bool);

        let arith = Expr::BinaryArith {
            op: BinaryArithOp::Add,
            data_type: DataType::Int64,
            left: Box::new(col.clone()),
            right: Box::new(Expr::value(GenericValue::Int64(1))),
        };
        assert_eq!(arith.data_type(), DataType::Int64);

        let cast = Expr::Cast {
            data_type: DataType::Double,
            child: Box::new(col),
        };
        assert_eq!(cast.data_type(), DataType::Double);
    }

    #[test]
    fn test_underlying_column_through_casts() {
        let col = Expr::column(FieldOffset(3), DataType::Int16);
        let cast = Expr::Cast {
            data_type: DataType::Int64,
            child: Box::new(Expr::Cast {
                data_type: DataType::Int32,
                child: Box::new(col),
            }),
        };
        assert_eq!(
            cast.underlying_column(),
            Some((FieldOffset(3), DataType::Int16))
        );

        let arith = Expr::UnaryArith {
            op: UnaryArithOp::Minus,
            data_type: DataType::Int16,
            child: Box::new(Expr::column(FieldOffset(3), DataType::Int16)),
        };
        assert_eq!(arith.underlying_column(), None);
    }

    #[test]
    fn test_display() {
        let expr = Expr::and(
            Expr::compare(
                CompareOp::Gt,
                Expr::column(FieldOffset(0), DataType::Int32),
                Expr::value(GenericValue::Int32(2000)),
            ),
            Expr::compare(
                CompareOp::Lt,
                Expr::column(FieldOffset(0), DataType::Int32),
                Expr::value(GenericValue::Int32(3000)),
            ),
        );
        assert_eq!(
            expr.to_string(),
            "((col#0:Int32 > 2000) and (col#0:Int32 < 3000))"
        );
    }
}
