//! Lattice traits for the constant propagation domain.
//!
//! Abstract values form a lattice: `meet` computes the greatest lower bound
//! (restricting to what both operands allow), `join` the least upper bound
//! (covering what either operand allows). The transform asks for meets when
//! it intersects a value with a constraint (a switch case key), and the
//! fixpoint asks for joins when control flow paths merge.
//!
//! Orientation used throughout the optimizer:
//!
//! - **Top (⊤)**: no information; the value may be anything
//! - **Bottom (⊥)**: infeasible; no run reaches this point with this value

use std::fmt::Debug;

/// A meet semi-lattice with a meet (greatest lower bound) operation.
///
/// The meet must be idempotent, commutative, and associative.
pub trait MeetSemiLattice: Clone + Debug + PartialEq {
    /// Computes the meet (greatest lower bound) of two lattice elements.
    #[must_use]
    fn meet(&self, other: &Self) -> Self;

    /// Returns `true` if this is the bottom element.
    ///
    /// Bottom means infeasible: a block whose entry state is bottom is
    /// unreachable, an edge whose filtered state is bottom is never taken.
    fn is_bottom(&self) -> bool;
}

/// A join semi-lattice with a join (least upper bound) operation.
///
/// The join must be idempotent, commutative, and associative.
pub trait JoinSemiLattice: Clone + Debug + PartialEq {
    /// Computes the join (least upper bound) of two lattice elements.
    #[must_use]
    fn join(&self, other: &Self) -> Self;

    /// Returns `true` if this is the top element (no information).
    fn is_top(&self) -> bool;
}

/// A complete lattice with both operations and both distinguished elements.
pub trait Lattice: MeetSemiLattice + JoinSemiLattice {
    /// The top (⊤) element: identity for meet.
    fn top() -> Self;

    /// The bottom (⊥) element: identity for join.
    fn bottom() -> Self;
}
