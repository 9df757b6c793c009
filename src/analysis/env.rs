//! The abstract environment at a program point.
//!
//! Maps registers (and, while rewriting a class initializer, fields of the
//! class under initialization) to abstract values. The environment has a
//! distinguished bottom element meaning the program point is unreachable.
//!
//! The synthetic result register pairs a primary instruction (field get,
//! array get, literal div/rem, invoke) with the `move-result` that receives
//! its value.
//!
//! Mappings are kept canonical: a register that would map to top is simply
//! absent. That makes structural equality coincide with semantic equality,
//! which the fixpoint's change detection relies on.

use rustc_hash::FxHashMap;

use crate::analysis::{ConstantValue, JoinSemiLattice};
use crate::ir::{FieldRef, Reg};

/// Abstract state of registers and tracked fields at one program point.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantEnvironment {
    regs: FxHashMap<Reg, ConstantValue>,
    fields: FxHashMap<FieldRef, ConstantValue>,
    result: ConstantValue,
    bottom: bool,
}

impl ConstantEnvironment {
    /// The top environment: every register may hold anything.
    #[must_use]
    pub fn top() -> Self {
        Self {
            regs: FxHashMap::default(),
            fields: FxHashMap::default(),
            result: ConstantValue::Top,
            bottom: false,
        }
    }

    /// The bottom environment: the program point is unreachable.
    #[must_use]
    pub fn bottom() -> Self {
        Self {
            regs: FxHashMap::default(),
            fields: FxHashMap::default(),
            result: ConstantValue::Top,
            bottom: true,
        }
    }

    /// Returns `true` if the program point is unreachable.
    #[must_use]
    pub const fn is_bottom(&self) -> bool {
        self.bottom
    }

    /// Collapses the environment to bottom.
    pub fn set_to_bottom(&mut self) {
        self.regs.clear();
        self.fields.clear();
        self.result = ConstantValue::Top;
        self.bottom = true;
    }

    /// The abstract value of a register.
    #[must_use]
    pub fn get(&self, reg: Reg) -> ConstantValue {
        if self.bottom {
            return ConstantValue::Bottom;
        }
        self.regs.get(&reg).copied().unwrap_or_default()
    }

    /// Binds a register. Binding top removes the entry.
    pub fn set(&mut self, reg: Reg, value: ConstantValue) {
        if self.bottom {
            return;
        }
        if value.is_top() {
            self.regs.remove(&reg);
        } else {
            self.regs.insert(reg, value);
        }
    }

    /// The abstract value of the synthetic result register.
    #[must_use]
    pub fn result(&self) -> ConstantValue {
        if self.bottom {
            ConstantValue::Bottom
        } else {
            self.result
        }
    }

    /// Binds the synthetic result register.
    pub fn set_result(&mut self, value: ConstantValue) {
        if !self.bottom {
            self.result = value;
        }
    }

    /// The abstract value of a tracked field.
    #[must_use]
    pub fn get_field(&self, field: &FieldRef) -> ConstantValue {
        if self.bottom {
            return ConstantValue::Bottom;
        }
        self.fields.get(field).copied().unwrap_or_default()
    }

    /// Binds a tracked field. Binding top removes the entry.
    pub fn set_field(&mut self, field: &FieldRef, value: ConstantValue) {
        if self.bottom {
            return;
        }
        if value.is_top() {
            self.fields.remove(field);
        } else {
            self.fields.insert(field.clone(), value);
        }
    }

    /// Joins another environment into this one (control flow merge).
    pub fn join_with(&mut self, other: &Self) {
        if other.bottom {
            return;
        }
        if self.bottom {
            *self = other.clone();
            return;
        }
        // Keys absent on either side are top after the join; only keys with
        // equal constants survive.
        self.regs
            .retain(|reg, v| match other.regs.get(reg) {
                Some(o) => {
                    *v = v.join(o);
                    !v.is_top()
                }
                None => false,
            });
        self.fields.retain(|field, v| match other.fields.get(field) {
            Some(o) => {
                *v = v.join(o);
                !v.is_top()
            }
            None => false,
        });
        self.result = self.result.join(&other.result);
    }
}

impl Default for ConstantEnvironment {
    fn default() -> Self {
        Self::top()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_top_absent() {
        let mut env = ConstantEnvironment::top();
        env.set(0, ConstantValue::Signed(1));
        env.set(0, ConstantValue::Top);
        assert_eq!(env, ConstantEnvironment::top());
    }

    #[test]
    fn test_bottom_absorbs() {
        let mut env = ConstantEnvironment::bottom();
        env.set(0, ConstantValue::Signed(1));
        assert!(env.is_bottom());
        assert_eq!(env.get(0), ConstantValue::Bottom);
    }

    #[test]
    fn test_join_merges_agreeing_constants() {
        let mut a = ConstantEnvironment::top();
        a.set(0, ConstantValue::Signed(1));
        a.set(1, ConstantValue::Signed(2));

        let mut b = ConstantEnvironment::top();
        b.set(0, ConstantValue::Signed(1));
        b.set(1, ConstantValue::Signed(3));

        a.join_with(&b);
        assert_eq!(a.get(0), ConstantValue::Signed(1));
        assert_eq!(a.get(1), ConstantValue::Top);
    }

    #[test]
    fn test_join_with_bottom_is_identity() {
        let mut a = ConstantEnvironment::top();
        a.set(0, ConstantValue::Signed(7));
        let snapshot = a.clone();
        a.join_with(&ConstantEnvironment::bottom());
        assert_eq!(a, snapshot);

        let mut b = ConstantEnvironment::bottom();
        b.join_with(&snapshot);
        assert_eq!(b, snapshot);
    }
}
