//! Method shrinking.
//!
//! Shrinking runs constant propagation and then the configured sibling
//! cleanup passes (common-subexpression elimination, copy propagation,
//! local dead code elimination) over one method. The sibling passes are
//! opaque collaborators supplied through the configuration; the
//! coordinator only invokes them in order and merges their statistics
//! under the stats lock.

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::sync::Arc;

use tracing::trace;

use crate::analysis::{ConstantEnvironment, FixpointIterator, WholeProgramState};
use crate::inliner::InlinerConfig;
use crate::ir::{ControlFlowGraph, IrCode, MethodDef, Resolver};
use crate::transform::{Transform, TransformStats};

/// Statistics reported by one opaque cleanup pass run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Instructions removed by the pass.
    pub instructions_removed: usize,
    /// Instructions replaced by cheaper forms.
    pub instructions_replaced: usize,
}

impl AddAssign for PassStats {
    fn add_assign(&mut self, rhs: Self) {
        self.instructions_removed += rhs.instructions_removed;
        self.instructions_replaced += rhs.instructions_replaced;
    }
}

/// An opaque cleanup pass run by the shrink coordinator.
///
/// Implementations must be thread-safe: distinct methods shrink on
/// distinct workers concurrently, though any one method is only ever
/// handed to one worker at a time.
pub trait ShrinkPass: Send + Sync {
    /// Unique name, used as the statistics key.
    fn name(&self) -> &'static str;

    /// Runs the pass over one method body.
    fn run(&self, code: &mut IrCode) -> PassStats;
}

/// Aggregated shrinking statistics across all methods.
#[derive(Debug, Clone, Default)]
pub struct ShrinkStats {
    /// Constant propagation totals.
    pub const_prop: TransformStats,
    /// Per-sibling-pass totals, keyed by pass name.
    pub passes: BTreeMap<&'static str, PassStats>,
    /// Number of methods shrunk.
    pub methods_shrunk: usize,
}

/// Runs the shrink pipeline over one method body.
///
/// Constant propagation computes its own fixpoint per run; a method that is
/// the declared initializer of its class tracks that class's fields through
/// the environment instead of the whole-program state.
pub(crate) fn shrink_code(
    config: &InlinerConfig,
    resolver: &Arc<dyn Resolver>,
    method: &MethodDef,
    code: &mut IrCode,
) -> (TransformStats, Vec<(&'static str, PassStats)>) {
    let mut const_prop = TransformStats::default();
    if config.enable_const_prop {
        let cfg = ControlFlowGraph::build(code);
        let wps = WholeProgramState::new();
        let mut transform_config = config.transform.clone();
        if method.is_constructor() {
            transform_config.class_under_init = Some(method.class().clone());
        }
        let class_under_init = transform_config.class_under_init.clone();
        let mut fixpoint = FixpointIterator::new(&cfg, code, &wps, class_under_init);
        fixpoint.run(&code, ConstantEnvironment::top());
        const_prop = Transform::new(transform_config, resolver.clone())
            .apply(&fixpoint, &wps, code, &cfg);
    }

    let mut pass_stats = Vec::with_capacity(config.sibling_passes.len());
    for pass in &config.sibling_passes {
        let stats = pass.run(code);
        trace!(pass = pass.name(), ?stats, method = %method, "sibling pass finished");
        pass_stats.push((pass.name(), stats));
    }
    (const_prop, pass_stats)
}

/// Returns `true` when any shrink pass is enabled.
pub(crate) fn shrinking_enabled(config: &InlinerConfig) -> bool {
    config.enable_const_prop || !config.sibling_passes.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_stats_accumulate() {
        let mut a = PassStats {
            instructions_removed: 1,
            instructions_replaced: 2,
        };
        a += PassStats {
            instructions_removed: 3,
            instructions_replaced: 4,
        };
        assert_eq!(a.instructions_removed, 4);
        assert_eq!(a.instructions_replaced, 6);
    }
}
