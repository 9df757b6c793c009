//! The abstract value domain for constant propagation.
//!
//! [`ConstantValue`] is the three-level lattice the whole transform is
//! driven by:
//!
//! ```text
//!         Top (any value)
//!          |
//!     Signed(c)   one known constant
//!          |
//!        Bottom (infeasible)
//! ```
//!
//! Besides the lattice operations it supplies the two decisions the
//! transform needs: `runtime_equals`, which may only answer `true` when
//! both operands necessarily denote the same runtime value, and
//! `materialize`, which turns a known constant into the instruction
//! sequence loading it into a destination register (an empty sequence means
//! the value is not representable at that site, and the site is left
//! unchanged).

use crate::analysis::{JoinSemiLattice, Lattice, MeetSemiLattice};
use crate::ir::{IrInstruction, Opcode, Reg};

/// An element of the constant propagation lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstantValue {
    /// No information; the value may be anything.
    #[default]
    Top,
    /// A known signed constant (32-bit values are sign-extended).
    Signed(i64),
    /// Infeasible; no execution reaches this point with this value.
    Bottom,
}

impl ConstantValue {
    /// Returns the constant if this is a known value.
    #[must_use]
    pub const fn as_signed(&self) -> Option<i64> {
        match self {
            Self::Signed(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `true` if this is a known constant.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(self, Self::Signed(_))
    }

    /// Equality under the runtime-equals relation.
    ///
    /// Only two known constants of equal value are runtime-equal; top and
    /// bottom compare unequal to everything, including themselves, because
    /// neither denotes one specific runtime value.
    #[must_use]
    pub fn runtime_equals(&self, other: &Self) -> bool {
        matches!((self, other), (Self::Signed(a), Self::Signed(b)) if a == b)
    }

    /// Materializes this value as a constant load into `dest`.
    ///
    /// Returns the loading sequence, or an empty vector when no constant of
    /// this width can represent the value here (the caller leaves the site
    /// unchanged). Narrow destinations only accept values representable in
    /// 32 bits.
    #[must_use]
    pub fn materialize(&self, dest: Reg, wide: bool) -> Vec<IrInstruction> {
        match self {
            Self::Signed(v) => {
                if wide {
                    vec![IrInstruction::new(Opcode::ConstWide)
                        .with_dest(dest)
                        .with_literal(*v)]
                } else if i32::try_from(*v).is_ok() {
                    vec![IrInstruction::new(Opcode::Const)
                        .with_dest(dest)
                        .with_literal(*v)]
                } else {
                    Vec::new()
                }
            }
            Self::Top | Self::Bottom => Vec::new(),
        }
    }
}

impl MeetSemiLattice for ConstantValue {
    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Top, x) | (x, Self::Top) => *x,
            (Self::Signed(a), Self::Signed(b)) if a == b => Self::Signed(*a),
            _ => Self::Bottom,
        }
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom)
    }
}

impl JoinSemiLattice for ConstantValue {
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Bottom, x) | (x, Self::Bottom) => *x,
            (Self::Signed(a), Self::Signed(b)) if a == b => Self::Signed(*a),
            _ => Self::Top,
        }
    }

    fn is_top(&self) -> bool {
        matches!(self, Self::Top)
    }
}

impl Lattice for ConstantValue {
    fn top() -> Self {
        Self::Top
    }

    fn bottom() -> Self {
        Self::Bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meet() {
        let five = ConstantValue::Signed(5);
        let ten = ConstantValue::Signed(10);
        assert_eq!(ConstantValue::Top.meet(&five), five);
        assert_eq!(five.meet(&five), five);
        assert_eq!(five.meet(&ten), ConstantValue::Bottom);
        assert_eq!(ConstantValue::Bottom.meet(&five), ConstantValue::Bottom);
    }

    #[test]
    fn test_join() {
        let five = ConstantValue::Signed(5);
        let ten = ConstantValue::Signed(10);
        assert_eq!(ConstantValue::Bottom.join(&five), five);
        assert_eq!(five.join(&five), five);
        assert_eq!(five.join(&ten), ConstantValue::Top);
        assert_eq!(ConstantValue::Top.join(&five), ConstantValue::Top);
    }

    #[test]
    fn test_runtime_equals() {
        let five = ConstantValue::Signed(5);
        assert!(five.runtime_equals(&ConstantValue::Signed(5)));
        assert!(!five.runtime_equals(&ConstantValue::Signed(6)));
        // Neither top nor bottom denotes one specific runtime value.
        assert!(!ConstantValue::Top.runtime_equals(&ConstantValue::Top));
        assert!(!ConstantValue::Bottom.runtime_equals(&ConstantValue::Bottom));
    }

    #[test]
    fn test_materialize_widths() {
        let v = ConstantValue::Signed(7);
        let narrow = v.materialize(0, false);
        assert_eq!(narrow.len(), 1);
        assert_eq!(narrow[0].opcode(), Opcode::Const);

        let wide = v.materialize(0, true);
        assert_eq!(wide[0].opcode(), Opcode::ConstWide);

        // A 64-bit value does not fit a narrow destination.
        let big = ConstantValue::Signed(1 << 40);
        assert!(big.materialize(0, false).is_empty());
        assert_eq!(big.materialize(0, true).len(), 1);

        assert!(ConstantValue::Top.materialize(0, false).is_empty());
    }
}
