//! Scalar data types and literal values.
//!
//! `DataType` is the closed set of types a predicate can mention;
//! `GenericValue` is the immutable tagged literal built once at parse time.
//! The widening rules here are the single source of truth for type
//! inference: the parser uses them to type the tree and the executor uses
//! them to pick the promotion width for elementwise kernels.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// Data types known to the predicate layer.
///
/// The vector kinds exist so a schema can describe search fields; they are
/// never legal predicate operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    FloatVector,
    BinaryVector,
}

impl DataType {
    /// Whether this type may appear as a predicate operand.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, DataType::FloatVector | DataType::BinaryVector)
    }

    pub fn is_vector(&self) -> bool {
        !self.is_scalar()
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_floating()
    }

    /// Numeric widening rank: Double > Float > Int64 > Int32 > Int16 > Int8.
    fn rank(&self) -> Option<u8> {
        match self {
            DataType::Int8 => Some(1),
            DataType::Int16 => Some(2),
            DataType::Int32 => Some(3),
            DataType::Int64 => Some(4),
            DataType::Float => Some(5),
            DataType::Double => Some(6),
            _ => None,
        }
    }

    /// The smallest common type for a binary numeric operation.
    ///
    /// Bool unifies only with Bool; mixing Bool with a numeric type is a
    /// hard type error, as is any vector operand.
    pub fn widen(self, other: DataType) -> PlanResult<DataType> {
        match (self, other) {
            (DataType::Bool, DataType::Bool) => Ok(DataType::Bool),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                if a.rank() >= b.rank() {
                    Ok(a)
                } else {
                    Ok(b)
                }
            }
            (a, b) => Err(PlanError::TypeMismatch(format!(
                "cannot unify {:?} with {:?}",
                a, b
            ))),
        }
    }
}

/// An immutable literal with its runtime type tag.
///
/// Built once at parse time and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GenericValue {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
}

impl GenericValue {
    pub fn data_type(&self) -> DataType {
        match self {
            GenericValue::Bool(_) => DataType::Bool,
            GenericValue::Int8(_) => DataType::Int8,
            GenericValue::Int16(_) => DataType::Int16,
            GenericValue::Int32(_) => DataType::Int32,
            GenericValue::Int64(_) => DataType::Int64,
            GenericValue::Float(_) => DataType::Float,
            GenericValue::Double(_) => DataType::Double,
        }
    }

    /// The value widened to i64. Only meaningful for integral tags.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GenericValue::Int8(v) => Some(*v as i64),
            GenericValue::Int16(v) => Some(*v as i64),
            GenericValue::Int32(v) => Some(*v as i64),
            GenericValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// The value widened to f64. Defined for every numeric tag.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GenericValue::Int8(v) => Some(*v as f64),
            GenericValue::Int16(v) => Some(*v as f64),
            GenericValue::Int32(v) => Some(*v as f64),
            GenericValue::Int64(v) => Some(*v as f64),
            GenericValue::Float(v) => Some(*v as f64),
            GenericValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GenericValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Truncating conversion to `target`, with `as`-cast semantics.
    ///
    /// Bool converts only to Bool, numerics convert among themselves;
    /// vector targets are rejected.
    pub fn cast_to(&self, target: DataType) -> PlanResult<GenericValue> {
        if self.data_type() == target {
            return Ok(*self);
        }
        match (*self, target) {
            (GenericValue::Bool(_), _) | (_, DataType::Bool) => Err(PlanError::TypeMismatch(
                format!("cannot cast {:?} to {:?}", self.data_type(), target),
            )),
            (v, t) if t.is_integral() => {
                // Route through i64 for integral sources, f64 for floating,
                // matching `as` truncation toward zero.
                let wide = match v {
                    GenericValue::Float(f) => f as i64,
                    GenericValue::Double(f) => f as i64,
                    other => other.as_i64().expect("integral source"),
                };
                Ok(match t {
                    DataType::Int8 => GenericValue::Int8(wide as i8),
                    DataType::Int16 => GenericValue::Int16(wide as i16),
                    DataType::Int32 => GenericValue::Int32(wide as i32),
                    DataType::Int64 => GenericValue::Int64(wide),
                    _ => unreachable!(),
                })
            }
            (v, DataType::Float) => Ok(GenericValue::Float(
                v.as_f64().expect("numeric source") as f32
            )),
            (v, DataType::Double) => {
                Ok(GenericValue::Double(v.as_f64().expect("numeric source")))
            }
            (_, t) => Err(PlanError::UnsupportedDataType(t)),
        }
    }

    /// Conversion to `target` that succeeds only when the value survives a
    /// round trip unchanged. Used to decide whether a literal can be pushed
    /// down to a scalar index built over a narrower column type.
    pub fn convert_exact(&self, target: DataType) -> Option<GenericValue> {
        let converted = self.cast_to(target).ok()?;
        let back = converted.cast_to(self.data_type()).ok()?;
        if back == *self {
            Some(converted)
        } else {
            None
        }
    }

    /// Ordering between two values after promotion to their common type.
    ///
    /// Bool orders only against Bool. Bool against a numeric has no
    /// ordering: the parser rejects that shape before any comparison runs.
    pub fn compare(&self, other: &GenericValue) -> Option<Ordering> {
        match (self, other) {
            (GenericValue::Bool(a), GenericValue::Bool(b)) => Some(a.cmp(b)),
            (a, b) if a.data_type().is_numeric() && b.data_type().is_numeric() => {
                let widened = a.data_type().widen(b.data_type()).ok()?;
                if widened.is_floating() {
                    a.as_f64()?.partial_cmp(&b.as_f64()?)
                } else {
                    Some(a.as_i64()?.cmp(&b.as_i64()?))
                }
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for GenericValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenericValue::Bool(v) => write!(f, "{}", v),
            GenericValue::Int8(v) => write!(f, "{}", v),
            GenericValue::Int16(v) => write!(f, "{}", v),
            GenericValue::Int32(v) => write!(f, "{}", v),
            GenericValue::Int64(v) => write!(f, "{}", v),
            GenericValue::Float(v) => write!(f, "{}", v),
            GenericValue::Double(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_precedence() {
        assert_eq!(
            DataType::Int8.widen(DataType::Int64).unwrap(),
            DataType::Int64
        );
        assert_eq!(
            DataType::Int64.widen(DataType::Float).unwrap(),
            DataType::Float
        );
        assert_eq!(
            DataType::Float.widen(DataType::Double).unwrap(),
            DataType::Double
        );
        assert_eq!(
            DataType::Int32.widen(DataType::Int32).unwrap(),
            DataType::Int32
        );
        assert_eq!(
            DataType::Bool.widen(DataType::Bool).unwrap(),
            DataType::Bool
        );
    }

    #[test]
    fn test_widen_rejects_bool_numeric_mix() {
        assert!(matches!(
            DataType::Bool.widen(DataType::Int32),
            Err(PlanError::TypeMismatch(_))
        ));
        assert!(matches!(
            DataType::Double.widen(DataType::Bool),
            Err(PlanError::TypeMismatch(_))
        ));
        assert!(matches!(
            DataType::FloatVector.widen(DataType::Int32),
            Err(PlanError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_cast_truncates() {
        let v = GenericValue::Int64(300);
        assert_eq!(v.cast_to(DataType::Int8).unwrap(), GenericValue::Int8(44));

        let v = GenericValue::Double(3.9);
        assert_eq!(v.cast_to(DataType::Int32).unwrap(), GenericValue::Int32(3));

        let v = GenericValue::Int32(-7);
        assert_eq!(
            v.cast_to(DataType::Double).unwrap(),
            GenericValue::Double(-7.0)
        );
    }

    #[test]
    fn test_cast_rejects_bool() {
        assert!(GenericValue::Bool(true).cast_to(DataType::Int32).is_err());
        assert!(GenericValue::Int32(1).cast_to(DataType::Bool).is_err());
    }

    #[test]
    fn test_widening_cast_round_trips() {
        for v in [-128i8, -1, 0, 1, 127] {
            let original = GenericValue::Int8(v);
            let widened = original.cast_to(DataType::Int64).unwrap();
            assert_eq!(widened.cast_to(DataType::Int8).unwrap(), original);
        }
        let original = GenericValue::Int32(i32::MAX);
        let widened = original.cast_to(DataType::Double).unwrap();
        assert_eq!(widened.cast_to(DataType::Int32).unwrap(), original);
    }

    #[test]
    fn test_convert_exact() {
        assert_eq!(
            GenericValue::Int64(100).convert_exact(DataType::Int8),
            Some(GenericValue::Int8(100))
        );
        // 300 does not fit an i8, so no exact conversion exists.
        assert_eq!(GenericValue::Int64(300).convert_exact(DataType::Int8), None);
        assert_eq!(
            GenericValue::Double(2.5).convert_exact(DataType::Int32),
            None
        );
    }

    #[test]
    fn test_compare_across_widths() {
        use std::cmp::Ordering;

        let a = GenericValue::Int8(5);
        let b = GenericValue::Int64(5);
        assert_eq!(a.compare(&b), Some(Ordering::Equal));

        let a = GenericValue::Int32(3);
        let b = GenericValue::Double(3.5);
        assert_eq!(a.compare(&b), Some(Ordering::Less));

        let a = GenericValue::Bool(true);
        let b = GenericValue::Bool(false);
        assert_eq!(a.compare(&b), Some(Ordering::Greater));

        // Bool never orders against a numeric.
        assert_eq!(GenericValue::Bool(true).compare(&GenericValue::Int8(1)), None);
    }
}
