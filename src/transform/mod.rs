//! Constant propagation transform.
//!
//! A whole-method rewriter driven by a precomputed abstract interpretation
//! fixpoint. Given the per-point environments, it materializes known
//! constants, deletes field writes that store what the field already holds,
//! folds literal arithmetic, prunes dead conditional branches, and
//! collapses dead switch arms.
//!
//! # Sweep Order
//!
//! Within a block, the driver evaluates the store eliminator at the
//! *pre-state* of each instruction (the put has not executed yet), advances
//! the environment, then evaluates the simplifier at the *post-state* (the
//! destination now holds its new value). Visiting in any other order
//! changes results. Edits are buffered in a [`RewritePlan`] and applied
//! once at the end, so the sweep never invalidates its own iteration.
//!
//! # Example
//!
//! ```rust,ignore
//! use dexopt::analysis::{ConstantEnvironment, FixpointIterator, WholeProgramState};
//! use dexopt::ir::ControlFlowGraph;
//! use dexopt::transform::{Transform, TransformConfig};
//!
//! let cfg = ControlFlowGraph::build(&code);
//! let wps = WholeProgramState::new();
//! let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
//! fixpoint.run(&code, ConstantEnvironment::top());
//!
//! let transform = Transform::new(TransformConfig::default(), resolver);
//! let stats = transform.apply(&fixpoint, &wps, &mut code, &cfg);
//! println!("materialized {}", stats.materialized_consts);
//! ```

mod branches;
mod plan;
mod simplify;
mod stores;

use std::ops::AddAssign;
use std::sync::Arc;

use tracing::trace;

use crate::analysis::{ConstantEnvironment, FixpointIterator, WholeProgramState};
use crate::ir::{ControlFlowGraph, IrCode, IrItem, Resolver, TypeDesc};

pub use plan::RewritePlan;

/// Configuration of the constant propagation transform.
#[derive(Debug, Clone, Default)]
pub struct TransformConfig {
    /// Rewrite plain moves whose destination is a known constant into
    /// constant loads.
    pub replace_moves_with_consts: bool,

    /// Prune switches whose selector is known. Only applies while the CFG
    /// is in non-editable mode.
    pub remove_dead_switch: bool,

    /// When set, the method being rewritten is the declared initializer of
    /// this class: its fields are read from the per-point environment
    /// rather than the whole-program state.
    pub class_under_init: Option<TypeDesc>,
}

impl TransformConfig {
    /// The configuration the shrinker uses: all rewrites enabled.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            replace_moves_with_consts: true,
            remove_dead_switch: true,
            class_under_init: None,
        }
    }
}

/// Counters reported by one application of the transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Constants materialized in place of moves, field/array gets, and
    /// literal arithmetic.
    pub materialized_consts: usize,
    /// Conditional branches and switches removed or rewritten.
    pub branches_removed: usize,
    /// Field writes deleted because the field already held the value.
    pub redundant_puts_removed: usize,
}

impl AddAssign for TransformStats {
    fn add_assign(&mut self, rhs: Self) {
        self.materialized_consts += rhs.materialized_consts;
        self.branches_removed += rhs.branches_removed;
        self.redundant_puts_removed += rhs.redundant_puts_removed;
    }
}

/// The constant propagation transform over one method.
///
/// Created per method; [`Transform::apply`] consumes it, mirroring the
/// plan's single-use lifecycle.
pub struct Transform {
    config: TransformConfig,
    resolver: Arc<dyn Resolver>,
    plan: RewritePlan,
    stats: TransformStats,
}

impl Transform {
    /// Creates a transform with the given configuration.
    ///
    /// The resolver is consulted by the redundant-store eliminator; sites
    /// whose field reference does not resolve are skipped.
    #[must_use]
    pub fn new(config: TransformConfig, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            config,
            resolver,
            plan: RewritePlan::new(),
            stats: TransformStats::default(),
        }
    }

    /// Rewrites `code` under the given fixpoint and whole-program state.
    ///
    /// Walks every block, skipping those the analysis proved unreachable
    /// (dead code elimination will drop them), then applies the buffered
    /// plan in one step.
    pub fn apply(
        mut self,
        fixpoint: &FixpointIterator<'_>,
        wps: &WholeProgramState,
        code: &mut IrCode,
        cfg: &ControlFlowGraph,
    ) -> TransformStats {
        for block_id in 0..cfg.num_blocks() {
            let mut env = fixpoint.entry_state_at(block_id);
            // Unreachable block: no point mutating its instructions.
            if env.is_bottom() {
                continue;
            }
            let block = *cfg.block(block_id);
            for idx in block.start..block.end {
                let IrItem::Insn(_) = code.item(idx) else {
                    continue;
                };
                self.eliminate_redundant_put(&env, wps, code, idx);
                if let IrItem::Insn(insn) = code.item(idx) {
                    fixpoint.analyze_instruction(insn, &mut env);
                }
                self.simplify_instruction(&env, code, idx);
            }
            self.eliminate_dead_branch(fixpoint, &env, cfg, block_id, code);
        }
        trace!(
            replacements = self.plan.num_replacements(),
            deletes = self.plan.num_deletes(),
            "applying rewrite plan"
        );
        self.plan.apply(code);
        self.stats
    }

    /// Internal helper shared by all discovery passes: the environment at
    /// the post-state of the instruction at `idx` is consulted and, when a
    /// constant load can represent the destination, a replacement is
    /// recorded against the right instruction (the primary, for pseudos).
    pub(crate) fn replace_with_const(
        &mut self,
        env: &ConstantEnvironment,
        code: &IrCode,
        idx: usize,
    ) {
        let Some(insn) = code.item(idx).insn() else {
            return;
        };
        let Some(dest) = insn.dest() else {
            return;
        };
        let value = env.get(dest);
        let replacement = value.materialize(dest, insn.opcode().dest_is_wide());
        if replacement.is_empty() {
            return;
        }
        if insn.opcode().is_move_result_pseudo() {
            let primary = code.primary_of_pseudo(idx);
            self.plan.replace(primary.id(), replacement);
        } else {
            self.plan.replace(insn.id(), replacement);
        }
        self.stats.materialized_consts += 1;
    }

    pub(crate) fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub(crate) fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub(crate) fn plan_mut(&mut self) -> &mut RewritePlan {
        &mut self.plan
    }

    pub(crate) fn stats_mut(&mut self) -> &mut TransformStats {
        &mut self.stats
    }
}
