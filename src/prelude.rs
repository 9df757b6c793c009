//! # dexopt Prelude
//!
//! This module provides a convenient prelude for the most commonly used
//! types from the library. Import it to get quick access to the essentials
//! of both optimizer passes.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dexopt operations
pub use crate::Error;

/// The result type used throughout dexopt
pub use crate::Result;

// ================================================================================================
// IR Layer
// ================================================================================================

/// Method bodies and their items
pub use crate::ir::{IrCode, IrInstruction, IrItem, Opcode};

/// Control flow graphs
pub use crate::ir::{ControlFlowGraph, Edge, EdgeKind};

/// The symbol layer
pub use crate::ir::{DexClass, FieldDef, FieldRef, MethodDef, MethodRefData, Proto, Scope};

/// Reference resolution
pub use crate::ir::{MethodSearch, Resolver, ScopeResolver};

// ================================================================================================
// Analysis Layer
// ================================================================================================

/// The constant lattice and environments
pub use crate::analysis::{ConstantEnvironment, ConstantValue, WholeProgramState};

/// The intraprocedural fixpoint
pub use crate::analysis::FixpointIterator;

// ================================================================================================
// Optimizer Passes
// ================================================================================================

/// The constant-propagation transform
pub use crate::transform::{Transform, TransformConfig, TransformStats};

/// The multi-method inliner
pub use crate::inliner::{InlinerConfig, InlinerMode, MultiMethodInliner};
