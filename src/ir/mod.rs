//! Register-based intermediate representation.
//!
//! This module provides the instruction set, method bodies, control flow
//! graphs, and the symbol layer (references, definitions, classes, scope,
//! stores, resolution) that the optimizer operates on.
//!
//! # Key Components
//!
//! - [`Opcode`], [`IrInstruction`] - instructions with identity-based keys
//! - [`IrCode`], [`IrItem`] - method bodies as item lists with branch
//!   target markers
//! - [`ControlFlowGraph`], [`Edge`], [`EdgeKind`] - basic blocks and tagged
//!   successor edges
//! - [`MethodDef`], [`FieldDef`], [`DexClass`], [`Scope`] - definitions and
//!   their owner
//! - [`Resolver`], [`ScopeResolver`], [`MethodSearch`] - reference
//!   resolution
//! - [`DexStore`], [`XStoreRefs`] - store partitioning
//!
//! # Design Notes
//!
//! Branch targets are separate items that name their source branch by
//! [`InsnId`]. This is what lets the switch pruner demote a case label to a
//! plain fallthrough marker in place, and what lets a rewrite plan buffer
//! edits without invalidating a sweep that is still in progress.

mod cfg;
mod code;
mod instruction;
mod method;
mod opcode;
mod refs;
mod resolver;
mod stores;

pub use cfg::{Block, BlockId, ControlFlowGraph, Edge, EdgeKind};
pub use code::{BranchTarget, IrCode, IrItem, TargetKind};
pub use instruction::{InsnId, IrInstruction, Reg};
pub use method::{DexClass, FieldDef, MethodDef, OrderedMethod, Scope};
pub use opcode::{IfOp, InvokeKind, LitOp, LitWidth, Opcode};
pub use refs::{is_wide_type, type_desc, AccessFlags, FieldRef, MethodRefData, Proto, TypeDesc};
pub use resolver::{MethodSearch, Resolver, ScopeResolver};
pub use stores::{DexStore, XStoreRefs};
