//! Schema collaborator: maps wire field ids to segment column offsets.
//!
//! The predicate core does not own schema management; it only needs enough
//! of it to resolve a field id to a column offset and to cross-check the
//! type a wire plan declared for that field.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::value::DataType;

/// External identifier of a field, as carried by the wire plan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FieldId(pub i64);

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a field's column inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldOffset(pub usize);

/// One field of a collection schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub field_id: FieldId,
    pub name: String,
    pub data_type: DataType,
    /// Dimensionality for vector fields, 1 for scalars.
    pub dim: usize,
}

impl FieldSchema {
    pub fn scalar(field_id: FieldId, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            field_id,
            name: name.into(),
            data_type,
            dim: 1,
        }
    }

    pub fn vector(
        field_id: FieldId,
        name: impl Into<String>,
        data_type: DataType,
        dim: usize,
    ) -> Self {
        Self {
            field_id,
            name: name.into(),
            data_type,
            dim,
        }
    }
}

/// Ordered field list; a field's position is its segment column offset.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldSchema>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve a field id to its column offset.
    pub fn offset_of(&self, field_id: FieldId) -> PlanResult<FieldOffset> {
        self.fields
            .iter()
            .position(|f| f.field_id == field_id)
            .map(FieldOffset)
            .ok_or(PlanError::UnknownField {
                field_id: field_id.0,
            })
    }

    pub fn field_at(&self, offset: FieldOffset) -> PlanResult<&FieldSchema> {
        self.fields
            .get(offset.0)
            .ok_or_else(|| PlanError::DispatchMismatch(format!("no field at offset {}", offset.0)))
    }

    /// Resolve a field id and check the type the wire plan declared for it.
    pub fn resolve(&self, field_id: FieldId, declared: DataType) -> PlanResult<FieldOffset> {
        let offset = self.offset_of(field_id)?;
        let field = self.field_at(offset)?;
        if field.data_type != declared {
            return Err(PlanError::SchemaMismatch {
                field_id: field_id.0,
                declared,
                actual: field.data_type,
            });
        }
        Ok(offset)
    }
}
