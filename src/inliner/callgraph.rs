//! Caller/callee graph construction and bottom-up ordering.
//!
//! The builder walks every method body in the scope, resolves invoke sites
//! through the supplied resolver, and records (caller → callee) and
//! (callee → caller) relationships for callees in the candidate set. Both
//! maps are ordered by the stable method comparator so that iteration, and
//! therefore the produced binary, is reproducible. One entry is recorded
//! per callsite: a caller invoking the same callee three times appears
//! three times in its list.
//!
//! Ordering prunes recursion with a path-set membership test and computes,
//! per method, the longest dependency chain it lies on. Deeper methods get
//! higher scheduling priority; inlining proceeds strictly from deepest to
//! shallowest.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::{
    InsnId, MethodDef, MethodSearch, Opcode, OrderedMethod, Resolver, Scope,
};

/// Explicit callsites of true-virtual callees: callee → caller → invoke
/// instructions known to dispatch to that callee.
pub type CalleeCallerInsns =
    FxHashMap<OrderedMethod, FxHashMap<OrderedMethod, FxHashSet<InsnId>>>;

/// The caller/callee maps the inliner schedules from.
#[derive(Debug, Default)]
pub(crate) struct CallGraph {
    /// Callee → callers, one entry per callsite, deterministic order.
    pub callee_caller: BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
    /// Caller → callees, one entry per callsite, deterministic order.
    pub caller_callee: BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
    /// Caller → invoke instruction → true-virtual callee.
    pub caller_virtual_callee: FxHashMap<OrderedMethod, FxHashMap<InsnId, Arc<MethodDef>>>,
}

impl CallGraph {
    /// Builds the maps by walking all instructions in the scope.
    pub(crate) fn build(
        scope: &Scope,
        candidates: &FxHashSet<OrderedMethod>,
        resolver: &dyn Resolver,
        true_virtual_callers: &CalleeCallerInsns,
    ) -> Self {
        // Classes scan in parallel; per-class results merge in class order
        // so the maps come out identical on every run.
        let per_class: Vec<Vec<(Arc<MethodDef>, Arc<MethodDef>)>> = scope
            .classes()
            .par_iter()
            .map(|class| {
                let mut pairs = Vec::new();
                for method in &class.methods {
                    let guard = method.lock_code();
                    let Some(code) = guard.as_ref() else {
                        continue;
                    };
                    for (_, insn) in code.iter_insns() {
                        let Opcode::Invoke { kind } = insn.opcode() else {
                            continue;
                        };
                        let Some(mref) = insn.method() else {
                            continue;
                        };
                        let Some(callee) =
                            resolver.resolve_method(mref, MethodSearch::from_invoke(kind))
                        else {
                            continue;
                        };
                        if candidates.contains(&OrderedMethod(callee.clone())) {
                            pairs.push((method.clone(), callee));
                        }
                    }
                }
                pairs
            })
            .collect();

        let mut graph = Self::default();
        for pairs in per_class {
            for (caller, callee) in pairs {
                graph.record(caller, callee);
            }
        }

        // True-virtual callsites arrive as an explicit map because the
        // resolver alone cannot prove their dispatch target.
        let mut tv: Vec<_> = true_virtual_callers.iter().collect();
        tv.sort_by(|a, b| a.0.cmp(b.0));
        for (callee, callers) in tv {
            let mut callers: Vec<_> = callers.iter().collect();
            callers.sort_by(|a, b| a.0.cmp(b.0));
            for (caller, insns) in callers {
                for insn in insns {
                    graph.record(caller.get().clone(), callee.get().clone());
                    graph
                        .caller_virtual_callee
                        .entry(caller.clone())
                        .or_default()
                        .insert(*insn, callee.get().clone());
                }
            }
        }
        graph
    }

    fn record(&mut self, caller: Arc<MethodDef>, callee: Arc<MethodDef>) {
        self.caller_callee
            .entry(OrderedMethod(caller.clone()))
            .or_default()
            .push(callee.clone());
        self.callee_caller
            .entry(OrderedMethod(callee))
            .or_default()
            .push(caller);
    }
}

/// Scheduling order derived from the call graph with recursion pruned.
#[derive(Debug, Default)]
pub(crate) struct BottomUpOrder {
    /// Per-method priority: the longest dependency chain above it.
    pub priorities: FxHashMap<OrderedMethod, i64>,
    /// Caller → callees, recursion pruned (one entry per callsite).
    pub caller_callees: BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
    /// Callee → callers, recursion pruned (one entry per callsite).
    pub callee_callers: BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
    /// Length of the longest dependency chain overall.
    pub max_depth: usize,
    /// Number of recursive edges excluded.
    pub recursive: usize,
}

impl BottomUpOrder {
    /// Prunes recursive relationships and computes critical-path depths.
    pub(crate) fn compute(
        caller_callee: &BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
    ) -> Self {
        let mut order = Self::default();

        // A callee that directly calls itself never schedules as a callee.
        let self_recursive: FxHashSet<OrderedMethod> = caller_callee
            .iter()
            .filter(|(caller, callees)| {
                callees
                    .iter()
                    .any(|c| OrderedMethod(c.clone()) == **caller)
            })
            .map(|(caller, _)| caller.clone())
            .collect();

        let mut expanded: FxHashSet<OrderedMethod> = FxHashSet::default();
        for caller in caller_callee.keys() {
            let mut path = Vec::new();
            Self::prune(
                caller,
                caller_callee,
                &self_recursive,
                &mut expanded,
                &mut path,
                &mut order,
            );
        }

        order.compute_depths(caller_callee);
        order
    }

    fn prune(
        caller: &OrderedMethod,
        caller_callee: &BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
        self_recursive: &FxHashSet<OrderedMethod>,
        expanded: &mut FxHashSet<OrderedMethod>,
        path: &mut Vec<OrderedMethod>,
        order: &mut Self,
    ) {
        if !expanded.insert(caller.clone()) {
            return;
        }
        let Some(callees) = caller_callee.get(caller) else {
            return;
        };
        path.push(caller.clone());
        for callee in callees {
            let callee_key = OrderedMethod(callee.clone());
            if path.contains(&callee_key) || self_recursive.contains(&callee_key) {
                order.recursive += 1;
                continue;
            }
            order
                .caller_callees
                .entry(caller.clone())
                .or_default()
                .push(callee.clone());
            order
                .callee_callers
                .entry(callee_key.clone())
                .or_default()
                .push(caller.get().clone());
            if caller_callee.contains_key(&callee_key) {
                Self::prune(
                    &callee_key,
                    caller_callee,
                    self_recursive,
                    expanded,
                    path,
                    order,
                );
            }
        }
        path.pop();
    }

    /// Longest-path-from-roots over the pruned DAG (Kahn's algorithm).
    fn compute_depths(
        &mut self,
        caller_callee: &BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
    ) {
        let mut indegree: BTreeMap<OrderedMethod, usize> = BTreeMap::new();
        for caller in self.caller_callees.keys() {
            indegree.entry(caller.clone()).or_insert(0);
        }
        for callees in self.caller_callees.values() {
            // Callsite lists repeat per invocation; the DAG edge counts once.
            let mut seen = FxHashSet::default();
            for callee in callees {
                let key = OrderedMethod(callee.clone());
                if seen.insert(key.clone()) {
                    *indegree.entry(key).or_insert(0) += 1;
                }
            }
        }
        // Methods only ever seen as callers of nothing still get a priority.
        for caller in caller_callee.keys() {
            indegree.entry(caller.clone()).or_insert(0);
        }

        let mut queue: VecDeque<OrderedMethod> = indegree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(m, _)| m.clone())
            .collect();
        let mut depth: FxHashMap<OrderedMethod, i64> = FxHashMap::default();
        for m in &queue {
            depth.insert(m.clone(), 0);
        }

        while let Some(m) = queue.pop_front() {
            let d = depth.get(&m).copied().unwrap_or(0);
            self.max_depth = self.max_depth.max(usize::try_from(d).unwrap_or(0));
            if let Some(callees) = self.caller_callees.get(&m) {
                // Deduplicate callsites: the DAG edge counts once per pair.
                let mut seen = FxHashSet::default();
                for callee in callees {
                    let key = OrderedMethod(callee.clone());
                    if !seen.insert(key.clone()) {
                        continue;
                    }
                    let entry = depth.entry(key.clone()).or_insert(0);
                    *entry = (*entry).max(d + 1);
                    let deg = indegree
                        .get_mut(&key)
                        .expect("callee has an indegree entry");
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        queue.push_back(key);
                    }
                }
            }
        }
        self.priorities = depth;
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{AccessFlags, Proto};

    use super::*;

    fn method(class: &str, name: &str) -> Arc<MethodDef> {
        MethodDef::new(class, name, Proto::void(), AccessFlags::PUBLIC)
    }

    fn graph_of(edges: &[(&Arc<MethodDef>, &Arc<MethodDef>)]) -> BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>> {
        let mut map: BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>> = BTreeMap::new();
        for (caller, callee) in edges {
            map.entry(OrderedMethod((*caller).clone()))
                .or_default()
                .push((*callee).clone());
        }
        map
    }

    #[test]
    fn test_bottom_up_depths() {
        // a -> b -> c and a -> c: c is deepest.
        let a = method("LA;", "a");
        let b = method("LA;", "b");
        let c = method("LA;", "c");
        let order = BottomUpOrder::compute(&graph_of(&[(&a, &b), (&b, &c), (&a, &c)]));

        assert_eq!(order.recursive, 0);
        assert_eq!(order.priorities[&OrderedMethod(a)], 0);
        assert_eq!(order.priorities[&OrderedMethod(b)], 1);
        assert_eq!(order.priorities[&OrderedMethod(c)], 2);
        assert_eq!(order.max_depth, 2);
    }

    #[test]
    fn test_self_recursion_excluded() {
        // a -> c, c -> c: c never schedules as a callee.
        let a = method("LA;", "a");
        let c = method("LA;", "c");
        let order = BottomUpOrder::compute(&graph_of(&[(&a, &c), (&c, &c)]));

        assert_eq!(order.recursive, 2);
        assert!(order.caller_callees.get(&OrderedMethod(a)).is_none());
        assert!(order.callee_callers.get(&OrderedMethod(c)).is_none());
    }

    #[test]
    fn test_mutual_recursion_pruned_to_dag() {
        let a = method("LA;", "a");
        let b = method("LA;", "b");
        let order = BottomUpOrder::compute(&graph_of(&[(&a, &b), (&b, &a)]));

        // One direction survives, the back edge is excluded.
        assert_eq!(order.recursive, 1);
        let kept: usize = order.caller_callees.values().map(Vec::len).sum();
        assert_eq!(kept, 1);
    }
}
