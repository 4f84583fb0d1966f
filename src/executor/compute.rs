//! Elementwise kernels over columns and broadcast scalars.
//!
//! Every kernel promotes its operands to one concrete scalar type first
//! (the same widening the parser used for inference) and then runs a
//! single typed loop. The type dispatch lives here, once, behind small
//! macros; the tree walk in `eval` never touches raw primitives.

use crate::error::{PlanError, PlanResult};
use crate::executor::{ColumnVector, EvalResult};
use crate::expression::operator::{
    BinaryArithOp, BinaryLogicalOp, CompareOp, UnaryArithOp,
};
use crate::value::{DataType, GenericValue};

/// One side of an elementwise operation: a broadcast scalar or a column.
enum Operand<'a, T: Copy> {
    Scalar(T),
    Column(&'a [T]),
}

impl<'a, T: Copy> Operand<'a, T> {
    fn get(&self, i: usize) -> T {
        match self {
            Operand::Scalar(v) => *v,
            Operand::Column(v) => v[i],
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Operand::Scalar(_) => None,
            Operand::Column(v) => Some(v.len()),
        }
    }
}

fn broadcast_len<T: Copy>(l: &Operand<T>, r: &Operand<T>) -> PlanResult<Option<usize>> {
    match (l.len(), r.len()) {
        (Some(a), Some(b)) if a != b => Err(PlanError::DispatchMismatch(format!(
            "operand lengths differ: {} vs {}",
            a, b
        ))),
        (a, b) => Ok(a.or(b)),
    }
}

fn combine<T: Copy, U>(
    l: &Operand<T>,
    r: &Operand<T>,
    f: impl Fn(T, T) -> PlanResult<U>,
    scalar: impl Fn(U) -> GenericValue,
    column: impl Fn(Vec<U>) -> ColumnVector,
) -> PlanResult<EvalResult> {
    match broadcast_len(l, r)? {
        None => match (l, r) {
            (Operand::Scalar(a), Operand::Scalar(b)) => {
                Ok(EvalResult::Scalar(scalar(f(*a, *b)?)))
            }
            _ => unreachable!("no length implies two scalars"),
        },
        Some(n) => {
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                out.push(f(l.get(i), r.get(i))?);
            }
            Ok(EvalResult::Column(column(out)))
        }
    }
}

fn map1<T: Copy, U>(
    x: &Operand<T>,
    f: impl Fn(T) -> PlanResult<U>,
    scalar: impl Fn(U) -> GenericValue,
    column: impl Fn(Vec<U>) -> ColumnVector,
) -> PlanResult<EvalResult> {
    match x {
        Operand::Scalar(v) => Ok(EvalResult::Scalar(scalar(f(*v)?))),
        Operand::Column(v) => {
            let mut out = Vec::with_capacity(v.len());
            for a in v.iter() {
                out.push(f(*a)?);
            }
            Ok(EvalResult::Column(column(out)))
        }
    }
}

macro_rules! operand_fn {
    ($name:ident, $ty:ty, $variant:ident) => {
        fn $name<'a>(r: &'a EvalResult) -> PlanResult<Operand<'a, $ty>> {
            match r {
                EvalResult::Scalar(GenericValue::$variant(v)) => Ok(Operand::Scalar(*v)),
                EvalResult::Column(ColumnVector::$variant(v)) => Ok(Operand::Column(v)),
                other => Err(PlanError::DispatchMismatch(format!(
                    "expected {:?} operand, got {:?}",
                    DataType::$variant,
                    other.data_type()
                ))),
            }
        }
    };
}

operand_fn!(operand_bool, bool, Bool);
operand_fn!(operand_i8, i8, Int8);
operand_fn!(operand_i16, i16, Int16);
operand_fn!(operand_i32, i32, Int32);
operand_fn!(operand_i64, i64, Int64);
operand_fn!(operand_f32, f32, Float);
operand_fn!(operand_f64, f64, Double);

/// Convert a column to another scalar type with `as`-cast semantics.
///
/// Floating sources narrow to an integer target through i64 so the result
/// agrees with `GenericValue::cast_to` for every value.
pub fn cast_column(col: &ColumnVector, to: DataType) -> PlanResult<ColumnVector> {
    if col.data_type() == to {
        return Ok(col.clone());
    }

    macro_rules! cast_into_int {
        ($ty:ty, $variant:ident) => {{
            let out: Vec<$ty> = match col {
                ColumnVector::Int8(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Int16(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Int32(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Int64(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Float(v) => v.iter().map(|x| (*x as i64) as $ty).collect(),
                ColumnVector::Double(v) => v.iter().map(|x| (*x as i64) as $ty).collect(),
                ColumnVector::Bool(_) => {
                    return Err(PlanError::TypeMismatch(
                        "cannot cast a Bool column to a numeric type".into(),
                    ))
                }
            };
            ColumnVector::$variant(out)
        }};
    }

    macro_rules! cast_into_float {
        ($ty:ty, $variant:ident) => {{
            let out: Vec<$ty> = match col {
                ColumnVector::Int8(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Int16(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Int32(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Int64(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Float(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Double(v) => v.iter().map(|x| *x as $ty).collect(),
                ColumnVector::Bool(_) => {
                    return Err(PlanError::TypeMismatch(
                        "cannot cast a Bool column to a numeric type".into(),
                    ))
                }
            };
            ColumnVector::$variant(out)
        }};
    }

    Ok(match to {
        DataType::Int8 => cast_into_int!(i8, Int8),
        DataType::Int16 => cast_into_int!(i16, Int16),
        DataType::Int32 => cast_into_int!(i32, Int32),
        DataType::Int64 => cast_into_int!(i64, Int64),
        DataType::Float => cast_into_float!(f32, Float),
        DataType::Double => cast_into_float!(f64, Double),
        DataType::Bool => {
            return Err(PlanError::TypeMismatch(
                "cannot cast a numeric column to Bool".into(),
            ))
        }
        other => return Err(PlanError::UnsupportedDataType(other)),
    })
}

/// Promote a result to `to`, whether scalar or column.
pub fn promote(x: &EvalResult, to: DataType) -> PlanResult<EvalResult> {
    if x.data_type() == to {
        return Ok(x.clone());
    }
    match x {
        EvalResult::Scalar(v) => Ok(EvalResult::Scalar(v.cast_to(to)?)),
        EvalResult::Column(c) => Ok(EvalResult::Column(cast_column(c, to)?)),
    }
}

/// Elementwise typed comparison with numeric promotion.
pub fn compare(op: CompareOp, left: &EvalResult, right: &EvalResult) -> PlanResult<EvalResult> {
    let dt = left.data_type().widen(right.data_type())?;

    if dt == DataType::Bool {
        let l = operand_bool(left)?;
        let r = operand_bool(right)?;
        return combine(
            &l,
            &r,
            |a, b| Ok(op.matches(a.cmp(&b))),
            GenericValue::Bool,
            ColumnVector::Bool,
        );
    }

    let left = promote(left, dt)?;
    let right = promote(right, dt)?;

    macro_rules! cmp {
        ($operand:ident) => {{
            let l = $operand(&left)?;
            let r = $operand(&right)?;
            combine(
                &l,
                &r,
                |a, b| Ok(op.apply(&a, &b)),
                GenericValue::Bool,
                ColumnVector::Bool,
            )
        }};
    }

    match dt {
        DataType::Int8 => cmp!(operand_i8),
        DataType::Int16 => cmp!(operand_i16),
        DataType::Int32 => cmp!(operand_i32),
        DataType::Int64 => cmp!(operand_i64),
        DataType::Float => cmp!(operand_f32),
        DataType::Double => cmp!(operand_f64),
        other => Err(PlanError::UnsupportedDataType(other)),
    }
}

/// Elementwise boolean negate.
pub fn logical_not(x: &EvalResult) -> PlanResult<EvalResult> {
    let v = operand_bool(x)?;
    map1(&v, |a| Ok(!a), GenericValue::Bool, ColumnVector::Bool)
}

/// Elementwise boolean combine.
pub fn logical_binary(
    op: BinaryLogicalOp,
    left: &EvalResult,
    right: &EvalResult,
) -> PlanResult<EvalResult> {
    let l = operand_bool(left)?;
    let r = operand_bool(right)?;
    combine(
        &l,
        &r,
        |a, b| Ok(op.apply(a, b)),
        GenericValue::Bool,
        ColumnVector::Bool,
    )
}

/// Elementwise binary arithmetic in the node's widened type.
///
/// Integer ops wrap; divide and modulo by zero surface as evaluation
/// errors; Power always computes in f64 and truncates back for integral
/// result types.
pub fn binary_arith(
    op: BinaryArithOp,
    data_type: DataType,
    left: &EvalResult,
    right: &EvalResult,
) -> PlanResult<EvalResult> {
    let left = promote(left, data_type)?;
    let right = promote(right, data_type)?;

    macro_rules! int_arith {
        ($operand:ident, $ty:ty, $variant:ident) => {{
            let l = $operand(&left)?;
            let r = $operand(&right)?;
            combine(
                &l,
                &r,
                |a: $ty, b: $ty| -> PlanResult<$ty> {
                    Ok(match op {
                        BinaryArithOp::Add => a.wrapping_add(b),
                        BinaryArithOp::Sub => a.wrapping_sub(b),
                        BinaryArithOp::Mul => a.wrapping_mul(b),
                        BinaryArithOp::Div => {
                            if b == 0 {
                                return Err(PlanError::Evaluation("division by zero".into()));
                            }
                            a.wrapping_div(b)
                        }
                        BinaryArithOp::Mod => {
                            if b == 0 {
                                return Err(PlanError::Evaluation("modulo by zero".into()));
                            }
                            a.wrapping_rem(b)
                        }
                        BinaryArithOp::Power => (a as f64).powf(b as f64) as i64 as $ty,
                        BinaryArithOp::BitAnd => a & b,
                        BinaryArithOp::BitOr => a | b,
                        BinaryArithOp::BitXor => a ^ b,
                        BinaryArithOp::ShiftLeft => a.wrapping_shl(b as u32),
                        BinaryArithOp::ShiftRight => a.wrapping_shr(b as u32),
                    })
                },
                GenericValue::$variant,
                ColumnVector::$variant,
            )
        }};
    }

    macro_rules! float_arith {
        ($operand:ident, $ty:ty, $variant:ident) => {{
            let l = $operand(&left)?;
            let r = $operand(&right)?;
            combine(
                &l,
                &r,
                |a: $ty, b: $ty| -> PlanResult<$ty> {
                    Ok(match op {
                        BinaryArithOp::Add => a + b,
                        BinaryArithOp::Sub => a - b,
                        BinaryArithOp::Mul => a * b,
                        BinaryArithOp::Div => a / b,
                        BinaryArithOp::Power => (a as f64).powf(b as f64) as $ty,
                        other => {
                            return Err(PlanError::DispatchMismatch(format!(
                                "operator {} reached a floating kernel",
                                other.as_str()
                            )))
                        }
                    })
                },
                GenericValue::$variant,
                ColumnVector::$variant,
            )
        }};
    }

    match data_type {
        DataType::Int8 => int_arith!(operand_i8, i8, Int8),
        DataType::Int16 => int_arith!(operand_i16, i16, Int16),
        DataType::Int32 => int_arith!(operand_i32, i32, Int32),
        DataType::Int64 => int_arith!(operand_i64, i64, Int64),
        DataType::Float => float_arith!(operand_f32, f32, Float),
        DataType::Double => float_arith!(operand_f64, f64, Double),
        other => Err(PlanError::UnsupportedDataType(other)),
    }
}

/// Elementwise unary arithmetic.
pub fn unary_arith(
    op: UnaryArithOp,
    data_type: DataType,
    x: &EvalResult,
) -> PlanResult<EvalResult> {
    macro_rules! int_unary {
        ($operand:ident, $ty:ty, $variant:ident) => {{
            let v = $operand(x)?;
            map1(
                &v,
                |a: $ty| -> PlanResult<$ty> {
                    Ok(match op {
                        UnaryArithOp::Minus => a.wrapping_neg(),
                        UnaryArithOp::BitNot => !a,
                    })
                },
                GenericValue::$variant,
                ColumnVector::$variant,
            )
        }};
    }

    macro_rules! float_unary {
        ($operand:ident, $ty:ty, $variant:ident) => {{
            let v = $operand(x)?;
            map1(
                &v,
                |a: $ty| -> PlanResult<$ty> {
                    Ok(match op {
                        UnaryArithOp::Minus => -a,
                        UnaryArithOp::BitNot => {
                            return Err(PlanError::DispatchMismatch(
                                "bitwise not reached a floating kernel".into(),
                            ))
                        }
                    })
                },
                GenericValue::$variant,
                ColumnVector::$variant,
            )
        }};
    }

    match data_type {
        DataType::Int8 => int_unary!(operand_i8, i8, Int8),
        DataType::Int16 => int_unary!(operand_i16, i16, Int16),
        DataType::Int32 => int_unary!(operand_i32, i32, Int32),
        DataType::Int64 => int_unary!(operand_i64, i64, Int64),
        DataType::Float => float_unary!(operand_f32, f32, Float),
        DataType::Double => float_unary!(operand_f64, f64, Double),
        other => Err(PlanError::UnsupportedDataType(other)),
    }
}

/// Elementwise IN-list membership. Values must share the child's type.
pub fn term_membership(child: &EvalResult, values: &[GenericValue]) -> PlanResult<EvalResult> {
    if values.is_empty() {
        return Ok(EvalResult::scalar_false());
    }

    macro_rules! member {
        ($operand:ident, $ty:ty, $variant:ident) => {{
            let set: Vec<$ty> = values
                .iter()
                .map(|v| match v {
                    GenericValue::$variant(x) => Ok(*x),
                    other => Err(PlanError::DispatchMismatch(format!(
                        "term value {:?} does not match child type {:?}",
                        other.data_type(),
                        child.data_type()
                    ))),
                })
                .collect::<PlanResult<_>>()?;
            let x = $operand(child)?;
            map1(
                &x,
                |a: $ty| Ok(set.iter().any(|s| *s == a)),
                GenericValue::Bool,
                ColumnVector::Bool,
            )
        }};
    }

    match child.data_type() {
        DataType::Bool => member!(operand_bool, bool, Bool),
        DataType::Int8 => member!(operand_i8, i8, Int8),
        DataType::Int16 => member!(operand_i16, i16, Int16),
        DataType::Int32 => member!(operand_i32, i32, Int32),
        DataType::Int64 => member!(operand_i64, i64, Int64),
        DataType::Float => member!(operand_f32, f32, Float),
        DataType::Double => member!(operand_f64, f64, Double),
        other => Err(PlanError::UnsupportedDataType(other)),
    }
}
