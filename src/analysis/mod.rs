//! Constant propagation analysis domain and fixpoint.
//!
//! The transform is driven by a precomputed abstract interpretation; this
//! module supplies the lattice it runs over and the query API it consumes:
//!
//! - [`ConstantValue`] - the abstract value lattice (top / constant /
//!   bottom) with runtime-equality and constant materialization
//! - [`ConstantEnvironment`] - the per-point mapping from registers (and
//!   tracked fields) to abstract values
//! - [`WholeProgramState`] - interprocedural field values, valid outside
//!   the declaring class's initializer
//! - [`FixpointIterator`] - the worklist solver answering `entry_state_at`
//!   / `analyze_instruction` / `analyze_edge`
//!
//! The lattice traits ([`MeetSemiLattice`], [`JoinSemiLattice`],
//! [`Lattice`]) keep the domain swappable: the transform only relies on
//! meets, joins, and the two distinguished elements.

mod domain;
mod env;
mod intraprocedural;
mod lattice;
mod wps;

pub use domain::ConstantValue;
pub use env::ConstantEnvironment;
pub use intraprocedural::{eval_lit, FixpointIterator};
pub use lattice::{JoinSemiLattice, Lattice, MeetSemiLattice};
pub use wps::WholeProgramState;
