//! Profitability decisions.
//!
//! Legality says an inlining is possible; profitability says it pays for
//! itself. The decision is a per-callee property, cached write-once in a
//! concurrent map under the compute-and-publish pattern: the first
//! published value wins and is never invalidated.

use std::sync::Arc;

use tracing::trace;

use crate::ir::{MethodDef, OrderedMethod};

use super::InlinerState;

/// Estimated overhead of keeping a method definition alive.
const COST_METHOD: u64 = 16;
/// Estimated size of one invoke instruction plus its move-result.
const COST_INVOKE: u64 = 4;
/// Extra method-ref overhead when callers live in other classes.
const COST_METHOD_REF: u64 = 2;
/// Profiled methods appearing in at least this share of runs count as hot.
const HOT_APPEAR_PERCENT: f64 = 95.0;

impl InlinerState {
    /// Whether the callee should be inlined at all of its callsites.
    ///
    /// This is a size/performance decision, independent of (and not a
    /// subset of) legality; the top-level driver only inlines callsites
    /// passing both. The result is cached per callee and never
    /// invalidated, even if post-processing later changes the callee's
    /// size.
    pub(crate) fn should_inline(&self, callee: &Arc<MethodDef>) -> bool {
        let key = OrderedMethod(callee.clone());
        if let Some(cached) = self.should_inline_cache.get(&key) {
            return *cached;
        }
        let computed = self.compute_should_inline(callee);
        // Compute-and-publish: the first writer's value stands.
        *self.should_inline_cache.entry(key).or_insert(computed)
    }

    fn compute_should_inline(&self, callee: &Arc<MethodDef>) -> bool {
        if self.for_speed() && self.is_hot(callee) {
            // For-speed mode: hot callees inline regardless of size cost.
            return true;
        }
        if self.should_inline_fast(callee) {
            return true;
        }
        if self.too_many_callers(callee) {
            trace!(callee = %callee, "not inlining: too many callers");
            return false;
        }
        true
    }

    /// Returns `true` when a non-empty hot-method set was supplied.
    pub(crate) fn for_speed(&self) -> bool {
        !self.config.hot_methods.is_empty()
    }

    fn is_hot(&self, callee: &MethodDef) -> bool {
        let refdata = callee.refdata();
        if self.config.hot_methods.contains(&refdata) {
            return true;
        }
        self.method_profiles
            .get(&refdata)
            .is_some_and(|p| p.appear_percent >= HOT_APPEAR_PERCENT)
    }

    /// Cheap positive filter deciding from callee metadata alone, without
    /// a cost estimate: trivially small callees and single-caller callees
    /// always pay off.
    pub(crate) fn should_inline_fast(&self, callee: &Arc<MethodDef>) -> bool {
        let key = OrderedMethod(callee.clone());
        if self
            .callee_caller
            .get(&key)
            .is_some_and(|callers| callers.len() == 1)
        {
            return true;
        }
        let guard = callee.lock_code();
        guard
            .as_ref()
            .is_some_and(|code| code.size_units() <= self.config.small_callee_size)
    }

    /// Bounds total bytecode growth: inlining a large callee at many
    /// callsites costs more than keeping the method.
    pub(crate) fn too_many_callers(&self, callee: &Arc<MethodDef>) -> bool {
        let key = OrderedMethod(callee.clone());
        let callers = self
            .callee_caller
            .get(&key)
            .map_or(0, Vec::len) as u64;
        if callers == 0 {
            return false;
        }
        let inlined_cost = self.get_inlined_cost(callee);
        let cross_class = if self.callers_in_same_class(callee) {
            0
        } else {
            COST_METHOD_REF
        };
        let keep_cost = inlined_cost + COST_METHOD + COST_INVOKE * callers + cross_class;
        inlined_cost * callers > keep_cost
    }

    /// Estimated cost of one inlined invocation of the callee, cached
    /// write-once. Set after the callee's own eligible callsites have been
    /// inlined; monotone by construction.
    pub(crate) fn get_inlined_cost(&self, callee: &Arc<MethodDef>) -> u64 {
        let key = OrderedMethod(callee.clone());
        if let Some(cached) = self.inlined_costs.get(&key) {
            return *cached;
        }
        let computed = self.compute_inlined_cost(callee);
        *self.inlined_costs.entry(key).or_insert(computed)
    }

    fn compute_inlined_cost(&self, callee: &Arc<MethodDef>) -> u64 {
        let guard = callee.lock_code();
        let Some(code) = guard.as_ref() else {
            return 0;
        };
        // Returns disappear in the splice.
        let base: u64 = code
            .iter_insns()
            .filter(|(_, i)| !i.opcode().is_return())
            .map(|(_, i)| i.size_units())
            .sum();
        // Each argument that is constant at every callsite makes roughly
        // one callee instruction foldable after the splice.
        let summaries = self.lock_callee_constant_arguments();
        let Some(occurrences) = summaries.get(&OrderedMethod(callee.clone())) else {
            return base;
        };
        let total: usize = occurrences.iter().map(|(_, n)| n).sum();
        if total == 0 {
            return base;
        }
        let constant: usize = occurrences
            .iter()
            .map(|(args, n)| args.iter().filter(|a| a.is_constant()).count() * n)
            .sum();
        base.saturating_sub((constant / total) as u64)
    }

    /// Whether every caller of the callee lives in the callee's own class.
    /// Cached write-once; same-class callers avoid a method-ref penalty in
    /// the growth bound.
    pub(crate) fn callers_in_same_class(&self, callee: &Arc<MethodDef>) -> bool {
        let key = OrderedMethod(callee.clone());
        if let Some(cached) = self.same_class_cache.get(&key) {
            return *cached;
        }
        let computed = self
            .callee_caller
            .get(&key)
            .is_some_and(|callers| {
                !callers.is_empty()
                    && callers.iter().all(|c| c.class() == callee.class())
            });
        *self.same_class_cache.entry(key).or_insert(computed)
    }
}
