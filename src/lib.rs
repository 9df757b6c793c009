// Copyright 2025-2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # dexopt
//!
//! A bytecode optimizer for a register-based virtual machine derived from a
//! stack-based class file format. Built in pure Rust, `dexopt` provides the
//! two passes that carry the hardest engineering in such an optimizer: a
//! whole-method constant-propagation transform and a bottom-up, parallel
//! multi-method inliner.
//!
//! # Architecture
//!
//! The library is organized into modules that build on each other:
//!
//! - **IR Layer**: Instructions, method bodies, control flow graphs, and
//!   the symbol layer (classes, methods, fields, stores, resolution)
//! - **Analysis Layer**: The constant lattice, abstract environments,
//!   whole-program field state, and the intraprocedural fixpoint
//! - **Transform Layer**: The constant-propagation rewriter - constant
//!   materialization, redundant store elimination, dead branch and dead
//!   switch pruning, all buffered through an atomically applied plan
//! - **Inliner Layer**: Call-graph construction, the legality and
//!   profitability oracles, the priority-scheduled bottom-up pipeline, and
//!   the IR splice itself
//!
//! ## Key Components
//!
//! - [`crate::transform::Transform`] - constant propagation over one method
//! - [`crate::inliner::MultiMethodInliner`] - bottom-up inlining over a scope
//! - [`crate::analysis::FixpointIterator`] - the analysis query API
//! - [`crate::ir`] - the instruction set and symbol layer
//! - [`crate::prelude`] - convenient re-exports of commonly used types
//! - [`crate::Error`] and [`crate::Result`] - error handling
//!
//! # Usage Examples
//!
//! ## Constant Propagation
//!
//! ```rust
//! use std::sync::Arc;
//! use dexopt::analysis::{ConstantEnvironment, FixpointIterator, WholeProgramState};
//! use dexopt::ir::{ControlFlowGraph, IrCode, IrInstruction, Opcode, Scope, ScopeResolver};
//! use dexopt::transform::{Transform, TransformConfig};
//!
//! // const v0, 7; move v1, v0; return-void
//! let mut code = IrCode::new(2, 0);
//! code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(7));
//! code.add_insn(IrInstruction::new(Opcode::Move).with_dest(1).with_src(0));
//! code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
//!
//! let cfg = ControlFlowGraph::build(&code);
//! let wps = WholeProgramState::new();
//! let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
//! fixpoint.run(&code, ConstantEnvironment::top());
//!
//! let resolver = Arc::new(ScopeResolver::new(Arc::new(Scope::new(vec![]))));
//! let config = TransformConfig { replace_moves_with_consts: true, ..TransformConfig::default() };
//! let stats = Transform::new(config, resolver).apply(&fixpoint, &wps, &mut code, &cfg);
//! assert_eq!(stats.materialized_consts, 1);
//! ```
//!
//! ## Inlining
//!
//! ```rust,ignore
//! use dexopt::inliner::{InlinerConfig, InlinerMode, MultiMethodInliner};
//!
//! let inliner = MultiMethodInliner::new(
//!     scope, &stores, &candidates, resolver,
//!     InlinerConfig::default(), InlinerMode::InterDex,
//! );
//! inliner.inline_methods();
//! let inlined = inliner.get_inlined();
//! inliner.finish(); // finalizes accumulated make-static demotions
//! ```

#[macro_use]
mod error;

/// Constant propagation analysis domain and fixpoint.
///
/// See [`crate::analysis::FixpointIterator`] for the query API the
/// transform consumes.
pub mod analysis;

/// Bottom-up, parallel multi-method inlining.
///
/// See [`crate::inliner::MultiMethodInliner`] for the entry point.
pub mod inliner;

/// The register-based intermediate representation and symbol layer.
pub mod ir;

/// Convenient re-exports of commonly used types.
pub mod prelude;

/// The constant-propagation transform.
///
/// See [`crate::transform::Transform`] for the entry point.
pub mod transform;

/// `dexopt` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is
/// always [`crate::Error`]. This is used consistently throughout the crate
/// for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `dexopt` Error type.
///
/// The main error type for all operations in this crate. Most optimizer
/// decision points are not errors (see the type's documentation); this
/// covers genuine operational failures.
pub use error::Error;
