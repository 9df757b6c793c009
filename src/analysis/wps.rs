//! Whole-program field state.
//!
//! Maps field identities to the abstract value the field holds across all
//! program traces outside the declaring class's initializer. Unlike the
//! per-point [`crate::analysis::ConstantEnvironment`], this state is
//! interprocedural and static for the duration of a rewrite.

use rustc_hash::FxHashMap;

use crate::analysis::ConstantValue;
use crate::ir::FieldRef;

/// Abstract values of fields across all traces outside `<clinit>`/`<init>`.
#[derive(Debug, Clone, Default)]
pub struct WholeProgramState {
    fields: FxHashMap<FieldRef, ConstantValue>,
}

impl WholeProgramState {
    /// An empty state: every field may hold anything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The abstract value of a field; top when nothing is known.
    #[must_use]
    pub fn get_field_value(&self, field: &FieldRef) -> ConstantValue {
        self.fields.get(field).copied().unwrap_or_default()
    }

    /// Records a field's whole-program value.
    pub fn set_field_value(&mut self, field: FieldRef, value: ConstantValue) {
        self.fields.insert(field, value);
    }

    /// Number of fields with known values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field has a known value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
