//! Typed predicate expressions.
//!
//! This module provides:
//! - the expression AST built by the plan parser
//! - operator definitions shared by parsing and evaluation
//! - the wire-to-AST parser with bottom-up type propagation

pub mod expr;
pub mod operator;
pub mod parser;

pub use expr::Expr;
pub use operator::{BinaryArithOp, BinaryLogicalOp, CompareOp, UnaryArithOp, UnaryLogicalOp};
pub use parser::PlanParser;
