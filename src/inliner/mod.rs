//! Bottom-up, parallel multi-method inlining.
//!
//! [`MultiMethodInliner`] takes a set of candidate callees and a scope,
//! walks all instructions in scope to find calls to candidates, and
//! inlines each callsite that is both legal (cannot change observable
//! semantics or trip the verifier) and profitable (does not blow the size
//! ceilings). Inlining proceeds bottom up: a callee's own callsites are
//! inlined, and the callee re-shrunk, before any caller splices it in.
//!
//! # Scheduling
//!
//! The pruned call graph is a DAG. Every caller carries a wait count of
//! its still-pending callees; leaves are submitted to the priority pool
//! immediately and each finished method decrements its callers' counts,
//! enqueueing any that reach zero for their next phase (shrink, then
//! inline, then notify dependents). Priorities follow the critical path:
//! the deeper a method, the earlier it runs.
//!
//! # Locking discipline
//!
//! - *general lock*: the inlined set and the pending make-static set
//! - *stats lock*: shrink pass statistics, bulk-merged per method
//! - *info lock*: the rejection and progress counters
//! - *per-method body locks*: at most one worker rewrites a method at a
//!   time; the wait counts guarantee the locks are uncontended on the
//!   scheduled path
//!
//! # Determinism
//!
//! The externally observable output does not depend on the thread count:
//! all iteration orders that reach the output are sorted by the stable
//! method comparator, merges are commutative on sorted inputs, and
//! inlining decisions read only immutable callee summaries.
//!
//! # Example
//!
//! ```rust,ignore
//! use dexopt::inliner::{InlinerConfig, InlinerMode, MultiMethodInliner};
//!
//! let inliner = MultiMethodInliner::new(
//!     scope, &stores, &candidates, resolver, InlinerConfig::default(),
//!     InlinerMode::InterDex,
//! );
//! inliner.inline_methods();
//! println!("{} calls inlined", inliner.get_info().calls_inlined);
//! drop(inliner); // finalizes the make-static set
//! ```

mod callgraph;
mod config;
mod cost;
mod legality;
mod mutate;
mod pool;
mod shrink;
mod stats;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::analysis::{ConstantEnvironment, ConstantValue, FixpointIterator, WholeProgramState};
use crate::ir::{
    DexStore, InsnId, IrCode, IrItem, MethodDef, MethodRefData, MethodSearch, Opcode,
    OrderedMethod, Resolver, Scope, XStoreRefs,
};

use callgraph::{BottomUpOrder, CallGraph};

pub use callgraph::CalleeCallerInsns;
pub use config::{InlinerConfig, InlinerMode, ProfileStats};
pub use mutate::{inline_method, inline_tail_call, inline_with_cfg};
pub use pool::PriorityThreadPool;
pub use shrink::{PassStats, ShrinkPass, ShrinkStats};
pub use stats::InliningInfo;

/// The abstract values of an invoke's arguments, in argument order.
pub type ConstantArguments = Vec<ConstantValue>;

/// Mutable state guarded by the general lock.
#[derive(Debug, Default)]
struct GeneralState {
    /// Methods inlined at least once.
    inlined: FxHashSet<OrderedMethod>,
    /// Methods pending demotion to static, consumed exactly once at
    /// shutdown.
    make_static: std::collections::BTreeSet<OrderedMethod>,
}

/// Shared state of one inlining run; jobs hold it through an [`Arc`].
pub(crate) struct InlinerState {
    pub(crate) scope: Arc<Scope>,
    pub(crate) xstores: XStoreRefs,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) config: InlinerConfig,
    pub(crate) mode: InlinerMode,
    pub(crate) method_profiles: FxHashMap<MethodRefData, ProfileStats>,

    /// Callee → callers, one entry per callsite, deterministic order.
    pub(crate) callee_caller: BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
    /// Caller → callees, one entry per callsite, deterministic order.
    pub(crate) caller_callee: BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
    /// Caller → invoke instruction → true-virtual callee.
    caller_virtual_callee: FxHashMap<OrderedMethod, FxHashMap<InsnId, Arc<MethodDef>>>,

    /// Per-method critical-path priorities.
    priorities: FxHashMap<OrderedMethod, i64>,
    /// Caller → callees with recursion pruned; the scheduling DAG.
    async_caller_callees: BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,
    /// Callee → callers with recursion pruned.
    async_callee_callers: BTreeMap<OrderedMethod, Vec<Arc<MethodDef>>>,

    /// Remaining callees each caller waits for.
    caller_wait_counts: DashMap<OrderedMethod, usize>,
    /// Remaining callers each delayed-shrinking callee waits for.
    delayed_shrinking_wait_counts: DashMap<OrderedMethod, usize>,

    /// Write-once estimated inlined cost per callee.
    pub(crate) inlined_costs: DashMap<OrderedMethod, u64>,
    /// Write-once profitability decision per callee.
    pub(crate) should_inline_cache: DashMap<OrderedMethod, bool>,
    /// Write-once "all callers share the callee's class" per callee.
    pub(crate) same_class_cache: DashMap<OrderedMethod, bool>,
    /// Constant-argument summaries per callee with occurrence counts.
    callee_constant_arguments: Mutex<FxHashMap<OrderedMethod, Vec<(ConstantArguments, usize)>>>,

    general: Mutex<GeneralState>,
    stats: Mutex<ShrinkStats>,
    info: Mutex<InliningInfo>,

    shrinking_enabled: bool,
    pool: PriorityThreadPool,
    finished: AtomicBool,
}

impl InlinerState {
    pub(crate) fn bump_info(&self, f: impl FnOnce(&mut InliningInfo)) {
        let mut info = self.info.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut info);
    }

    fn lock_general(&self) -> MutexGuard<'_, GeneralState> {
        self.general.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stats(&self) -> MutexGuard<'_, ShrinkStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_callee_constant_arguments(
        &self,
    ) -> MutexGuard<'_, FxHashMap<OrderedMethod, Vec<(ConstantArguments, usize)>>> {
        self.callee_constant_arguments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn priority_of(&self, method: &Arc<MethodDef>) -> i64 {
        self.priorities
            .get(&OrderedMethod(method.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Submits a method's post-processing (shrink, then notify callers).
    fn async_postprocess_method(state: &Arc<Self>, method: Arc<MethodDef>) {
        let priority = state.priority_of(&method);
        let st = Arc::clone(state);
        state
            .pool
            .post(priority, move || Self::postprocess_method(&st, &method));
    }

    /// Shrinks a method (unless its shrinking is delayed) and wakes the
    /// callers waiting on it.
    fn postprocess_method(state: &Arc<Self>, method: &Arc<MethodDef>) {
        let key = OrderedMethod(method.clone());
        let delayed = state.delayed_shrinking_wait_counts.contains_key(&key);
        if state.shrinking_enabled && !delayed {
            state.shrink_method(method);
        }
        if let Some(callers) = state.async_callee_callers.get(&key) {
            Self::decrement_caller_wait_counts(state, callers);
        }
    }

    /// Decrements caller wait counters; callers reaching zero start their
    /// inline phase.
    fn decrement_caller_wait_counts(state: &Arc<Self>, callers: &[Arc<MethodDef>]) {
        for caller in callers {
            let key = OrderedMethod(caller.clone());
            let ready = {
                let mut entry = state
                    .caller_wait_counts
                    .get_mut(&key)
                    .expect("caller has a wait count");
                *entry -= 1;
                *entry == 0
            };
            if ready {
                let st = Arc::clone(state);
                let caller = caller.clone();
                state.pool.post(state.priority_of(&caller), move || {
                    Self::process_caller(&st, &caller);
                });
            }
        }
    }

    /// If a callee is registered for delayed shrinking, decrement its wait
    /// counter; at zero, its shrink finally runs.
    fn decrement_delayed_shrinking_callee_wait_counts(
        state: &Arc<Self>,
        callees: &[Arc<MethodDef>],
    ) {
        for callee in callees {
            let key = OrderedMethod(callee.clone());
            let ready = {
                let Some(mut entry) = state.delayed_shrinking_wait_counts.get_mut(&key) else {
                    continue;
                };
                *entry = entry.saturating_sub(1);
                *entry == 0
            };
            if ready {
                let st = Arc::clone(state);
                let callee = callee.clone();
                state.pool.post(state.priority_of(&callee), move || {
                    st.shrink_method(&callee);
                });
            }
        }
    }

    /// The inline phase of a caller whose callees are all final.
    fn process_caller(state: &Arc<Self>, caller: &Arc<MethodDef>) {
        let key = OrderedMethod(caller.clone());
        if let Some(callees) = state.async_caller_callees.get(&key) {
            // The top-level driver inlines only callsites passing both the
            // profitability filter and the legality oracle.
            let eligible: FxHashSet<OrderedMethod> = callees
                .iter()
                .filter(|c| state.should_inline(c))
                .map(|c| OrderedMethod(c.clone()))
                .collect();
            state.inline_callees_internal(caller, &eligible);
            Self::decrement_delayed_shrinking_callee_wait_counts(state, callees);
        }
        Self::postprocess_method(state, caller);
    }

    /// Scans the caller for invokes of the given callees, filters through
    /// the legality oracle, and splices the survivors.
    fn inline_callees_internal(
        &self,
        caller: &Arc<MethodDef>,
        callees: &FxHashSet<OrderedMethod>,
    ) {
        if callees.is_empty() {
            return;
        }
        let caller_key = OrderedMethod(caller.clone());
        let mut inlinables: Vec<(Arc<MethodDef>, InsnId)> = Vec::new();
        {
            let guard = caller.lock_code();
            let Some(code) = guard.as_ref() else {
                return;
            };
            let mut estimated = code.size_units();
            for (_, insn) in code.iter_insns() {
                let Opcode::Invoke { kind } = insn.opcode() else {
                    continue;
                };
                let Some(mref) = insn.method() else {
                    continue;
                };
                let resolved = self
                    .resolver
                    .resolve_method(mref, MethodSearch::from_invoke(kind))
                    .or_else(|| {
                        self.caller_virtual_callee
                            .get(&caller_key)
                            .and_then(|m| m.get(&insn.id()))
                            .cloned()
                    });
                let Some(callee) = resolved else {
                    continue;
                };
                let key = OrderedMethod(callee.clone());
                if key == caller_key || !callees.contains(&key) {
                    continue;
                }
                if self.is_inlinable(caller, &callee, Some(insn), estimated) {
                    let callee_size = callee
                        .lock_code()
                        .as_ref()
                        .map_or(0, IrCode::size_units);
                    estimated += callee_size;
                    inlinables.push((callee, insn.id()));
                }
            }
        }
        self.inline_inlinables(caller, &inlinables);
    }

    /// Performs the actual splices for an accepted candidate list.
    fn inline_inlinables(&self, caller: &Arc<MethodDef>, inlinables: &[(Arc<MethodDef>, InsnId)]) {
        for (callee, invoke_id) in inlinables {
            let mut caller_guard = caller.lock_code();
            let Some(caller_code) = caller_guard.as_mut() else {
                return;
            };
            let callee_guard = callee.lock_code();
            let Some(callee_code) = callee_guard.as_ref() else {
                continue;
            };
            match mutate::inline_method(caller_code, callee_code, *invoke_id) {
                Ok(()) => {
                    drop(callee_guard);
                    drop(caller_guard);
                    {
                        let mut general = self.lock_general();
                        general.inlined.insert(OrderedMethod(callee.clone()));
                    }
                    self.bump_info(|i| i.calls_inlined += 1);
                    trace!(caller = %caller, callee = %callee, "inlined callsite");
                }
                Err(err) => {
                    debug!(caller = %caller, callee = %callee, %err, "inline splice failed");
                }
            }
        }
    }

    /// Shrinks one method and merges the per-pass statistics.
    fn shrink_method(&self, method: &Arc<MethodDef>) {
        let mut guard = method.lock_code();
        let Some(code) = guard.as_mut() else {
            return;
        };
        let (const_prop, passes) = shrink::shrink_code(&self.config, &self.resolver, method, code);
        drop(guard);

        let mut stats = self.lock_stats();
        stats.const_prop += const_prop;
        for (name, s) in passes {
            *stats.passes.entry(name).or_default() += s;
        }
        stats.methods_shrunk += 1;
    }

    /// Collects, for every invoked candidate, which arguments are constant
    /// at which callsites.
    fn compute_callee_constant_arguments(&self) {
        if !self.config.enable_const_prop || self.caller_callee.is_empty() {
            return;
        }
        let entries: Vec<(&OrderedMethod, &Vec<Arc<MethodDef>>)> =
            self.caller_callee.iter().collect();
        let results: Vec<_> = entries
            .par_iter()
            .map(|(caller, callees)| self.get_invoke_constant_arguments(caller, callees))
            .collect();

        let mut map = self.lock_callee_constant_arguments();
        for (args_list, dead_blocks) in results.into_iter().flatten() {
            self.bump_info(|i| {
                i.constant_invoke_callers_analyzed += 1;
                i.constant_invoke_callers_unreachable_blocks += dead_blocks;
            });
            for (callee, args) in args_list {
                let entry = map.entry(callee).or_default();
                if let Some(slot) = entry.iter_mut().find(|(a, _)| *a == args) {
                    slot.1 += 1;
                } else {
                    entry.push((args, 1));
                }
            }
        }
        let analyzed = map.len();
        drop(map);
        self.bump_info(|i| i.constant_invoke_callees_analyzed = analyzed);
    }

    /// For all reachable invoke instructions in a caller, the abstract
    /// values of their arguments, plus the count of unreachable blocks.
    fn get_invoke_constant_arguments(
        &self,
        caller: &OrderedMethod,
        callees: &[Arc<MethodDef>],
    ) -> Option<(Vec<(OrderedMethod, ConstantArguments)>, usize)> {
        let callee_set: FxHashSet<OrderedMethod> = callees
            .iter()
            .map(|c| OrderedMethod(c.clone()))
            .collect();
        let guard = caller.lock_code();
        let code = guard.as_ref()?;
        let cfg = crate::ir::ControlFlowGraph::build(code);
        let wps = WholeProgramState::new();
        let mut fixpoint = FixpointIterator::new(&cfg, code, &wps, None);
        fixpoint.run(&code, ConstantEnvironment::top());

        let mut dead_blocks = 0;
        let mut out = Vec::new();
        for block_id in 0..cfg.num_blocks() {
            let mut env = fixpoint.entry_state_at(block_id);
            if env.is_bottom() {
                dead_blocks += 1;
                continue;
            }
            let block = *cfg.block(block_id);
            for idx in block.start..block.end {
                let IrItem::Insn(insn) = code.item(idx) else {
                    continue;
                };
                if let Opcode::Invoke { kind } = insn.opcode() {
                    if let Some(resolved) = insn.method().and_then(|mref| {
                        self.resolver
                            .resolve_method(mref, MethodSearch::from_invoke(kind))
                    }) {
                        let key = OrderedMethod(resolved);
                        if callee_set.contains(&key) {
                            let args: ConstantArguments =
                                insn.srcs().iter().map(|&r| env.get(r)).collect();
                            out.push((key, args));
                        }
                    }
                }
                fixpoint.analyze_instruction(insn, &mut env);
            }
        }
        Some((out, dead_blocks))
    }

    /// The terminal linkage pass: demotes every method in the make-static
    /// set and rewrites their `invoke-direct` callsites to
    /// `invoke-static`. Runs exactly once.
    fn invoke_direct_to_static(&self) {
        if self.finished.swap(true, AtomicOrdering::AcqRel) {
            return;
        }
        let make_static: Vec<OrderedMethod> = {
            let general = self.lock_general();
            general.make_static.iter().cloned().collect()
        };
        if make_static.is_empty() {
            return;
        }
        debug!(count = make_static.len(), "demoting methods to static");
        let targets: FxHashSet<String> = make_static
            .iter()
            .map(|m| m.refdata().descriptor())
            .collect();
        for method in &make_static {
            method.make_static();
        }
        self.scope.classes().par_iter().for_each(|class| {
            for method in &class.methods {
                let mut guard = method.lock_code();
                let Some(code) = guard.as_mut() else {
                    continue;
                };
                for idx in 0..code.len() {
                    let IrItem::Insn(insn) = code.item_mut(idx) else {
                        continue;
                    };
                    if insn.opcode()
                        == (Opcode::Invoke {
                            kind: crate::ir::InvokeKind::Direct,
                        })
                    {
                        let retarget = insn
                            .method()
                            .is_some_and(|m| targets.contains(&m.descriptor()));
                        if retarget {
                            insn.set_opcode(Opcode::Invoke {
                                kind: crate::ir::InvokeKind::Static,
                            });
                        }
                    }
                }
            }
        });
    }
}

/// Helper class to inline a set of candidates.
///
/// Takes a set of candidates and a scope and walks all instructions in
/// scope to find and inline calls to candidates. A resolver maps method
/// references to definitions. Not every candidate can be inlined at every
/// callsite; restrictions on either the caller or the callee are recorded
/// as counted rejections. Inlining is performed bottom up.
///
/// Dropping the inliner finalizes the accumulated make-static set; call
/// [`MultiMethodInliner::finish`] to do it explicitly.
pub struct MultiMethodInliner {
    state: Arc<InlinerState>,
}

impl MultiMethodInliner {
    /// Creates an inliner for the given candidates.
    ///
    /// Global inlining is possible before dex partitioning
    /// ([`InlinerMode::InterDex`]); afterwards use
    /// [`InlinerMode::IntraDex`], which only combines methods within one
    /// dex.
    #[must_use]
    pub fn new(
        scope: Arc<Scope>,
        stores: &[DexStore],
        candidates: &[Arc<MethodDef>],
        resolver: Arc<dyn Resolver>,
        config: InlinerConfig,
        mode: InlinerMode,
    ) -> Self {
        Self::with_options(
            scope,
            stores,
            candidates,
            resolver,
            config,
            mode,
            CalleeCallerInsns::default(),
            FxHashMap::default(),
        )
    }

    /// Creates an inliner with explicit true-virtual callsites and method
    /// profile statistics.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn with_options(
        scope: Arc<Scope>,
        stores: &[DexStore],
        candidates: &[Arc<MethodDef>],
        resolver: Arc<dyn Resolver>,
        config: InlinerConfig,
        mode: InlinerMode,
        true_virtual_callers: CalleeCallerInsns,
        method_profile_stats: FxHashMap<MethodRefData, ProfileStats>,
    ) -> Self {
        let candidate_set: FxHashSet<OrderedMethod> = candidates
            .iter()
            .map(|m| OrderedMethod(m.clone()))
            .collect();
        let graph = CallGraph::build(
            &scope,
            &candidate_set,
            resolver.as_ref(),
            &true_virtual_callers,
        );
        let order = BottomUpOrder::compute(&graph.caller_callee);

        let info = InliningInfo {
            recursive: order.recursive,
            max_call_stack_depth: order.max_depth,
            critical_path_length: order.max_depth,
            ..InliningInfo::default()
        };
        let shrinking_enabled = shrink::shrinking_enabled(&config);
        let pool = PriorityThreadPool::new(config.num_threads);

        let state = Arc::new(InlinerState {
            scope,
            xstores: XStoreRefs::new(stores),
            resolver,
            config,
            mode,
            method_profiles: method_profile_stats,
            callee_caller: graph.callee_caller,
            caller_callee: graph.caller_callee,
            caller_virtual_callee: graph.caller_virtual_callee,
            priorities: order.priorities,
            async_caller_callees: order.caller_callees,
            async_callee_callers: order.callee_callers,
            caller_wait_counts: DashMap::new(),
            delayed_shrinking_wait_counts: DashMap::new(),
            inlined_costs: DashMap::new(),
            should_inline_cache: DashMap::new(),
            same_class_cache: DashMap::new(),
            callee_constant_arguments: Mutex::new(FxHashMap::default()),
            general: Mutex::new(GeneralState::default()),
            stats: Mutex::new(ShrinkStats::default()),
            info: Mutex::new(info),
            shrinking_enabled,
            pool,
            finished: AtomicBool::new(false),
        });
        Self { state }
    }

    /// Attempts inlining for all candidates, bottom up.
    pub fn inline_methods(&self) {
        let state = &self.state;
        debug!(
            callers = state.caller_callee.len(),
            callees = state.callee_caller.len(),
            threads = state.pool.num_threads(),
            "inline_methods starting"
        );
        state.compute_callee_constant_arguments();

        // Seed every wait counter before the first submission: in
        // synchronous mode a post runs its whole dependency cascade before
        // returning.
        for (caller, callees) in &state.async_caller_callees {
            state
                .caller_wait_counts
                .insert(caller.clone(), callees.len());
        }
        if state.shrinking_enabled && state.config.delayed_shrinking {
            let summaries = state.lock_callee_constant_arguments();
            for (callee, callers) in &state.async_callee_callers {
                if summaries.contains_key(callee) {
                    state
                        .delayed_shrinking_wait_counts
                        .insert(callee.clone(), callers.len());
                }
            }
        }

        // Leaves first: callees that wait on nothing.
        for callee in state.async_callee_callers.keys() {
            if !state.async_caller_callees.contains_key(callee) {
                InlinerState::async_postprocess_method(state, callee.get().clone());
            }
        }

        let start = Instant::now();
        state.pool.join();
        state.bump_info(|i| i.waited_seconds += start.elapsed().as_secs());
        debug!(
            calls_inlined = self.get_info().calls_inlined,
            "inline_methods finished"
        );
    }

    /// Inlines the given callees into the caller wherever the legality
    /// oracle allows. Unlike the top-level driver, no profitability filter
    /// applies.
    pub fn inline_callees(&self, caller: &Arc<MethodDef>, callees: &[Arc<MethodDef>]) {
        let set: FxHashSet<OrderedMethod> =
            callees.iter().map(|c| OrderedMethod(c.clone())).collect();
        self.state.inline_callees_internal(caller, &set);
    }

    /// Inlines whatever the given invoke instructions call, if legal.
    /// Unresolvable callsites count as not-found rejections.
    pub fn inline_callees_insns(&self, caller: &Arc<MethodDef>, insns: &FxHashSet<InsnId>) {
        let caller_key = OrderedMethod(caller.clone());
        let mut inlinables: Vec<(Arc<MethodDef>, InsnId)> = Vec::new();
        {
            let guard = caller.lock_code();
            let Some(code) = guard.as_ref() else {
                return;
            };
            let mut estimated = code.size_units();
            for (_, insn) in code.iter_insns() {
                if !insns.contains(&insn.id()) {
                    continue;
                }
                let Opcode::Invoke { kind } = insn.opcode() else {
                    continue;
                };
                let resolved = insn
                    .method()
                    .and_then(|mref| {
                        self.state
                            .resolver
                            .resolve_method(mref, MethodSearch::from_invoke(kind))
                    })
                    .or_else(|| {
                        self.state
                            .caller_virtual_callee
                            .get(&caller_key)
                            .and_then(|m| m.get(&insn.id()))
                            .cloned()
                    });
                let Some(callee) = resolved else {
                    self.state.bump_info(|i| i.not_found += 1);
                    continue;
                };
                if OrderedMethod(callee.clone()) == caller_key {
                    continue;
                }
                if self
                    .state
                    .is_inlinable(caller, &callee, Some(insn), estimated)
                {
                    let callee_size = callee
                        .lock_code()
                        .as_ref()
                        .map_or(0, IrCode::size_units);
                    estimated += callee_size;
                    inlinables.push((callee, insn.id()));
                }
            }
        }
        self.state.inline_inlinables(caller, &inlinables);
    }

    /// Returns `true` if the callee is legally inlinable into the caller.
    ///
    /// `estimated_insn_size` is the caller's current estimated size in
    /// code units; the invoke instruction is optional and only used for
    /// logging.
    #[must_use]
    pub fn is_inlinable(
        &self,
        caller: &MethodDef,
        callee: &Arc<MethodDef>,
        insn: Option<&crate::ir::IrInstruction>,
        estimated_insn_size: u64,
    ) -> bool {
        self.state
            .is_inlinable(caller, callee, insn, estimated_insn_size)
    }

    /// The unique methods inlined at least once, in deterministic order.
    #[must_use]
    pub fn get_inlined(&self) -> Vec<Arc<MethodDef>> {
        let general = self.state.lock_general();
        let mut inlined: Vec<OrderedMethod> = general.inlined.iter().cloned().collect();
        drop(general);
        inlined.sort();
        inlined.into_iter().map(|m| m.0).collect()
    }

    /// Returns `true` when a non-empty hot-method set enables for-speed
    /// mode.
    #[must_use]
    pub fn for_speed(&self) -> bool {
        self.state.for_speed()
    }

    /// A snapshot of the rejection and progress counters.
    #[must_use]
    pub fn get_info(&self) -> InliningInfo {
        *self
            .state
            .info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// A snapshot of the aggregated shrink statistics.
    #[must_use]
    pub fn get_shrink_stats(&self) -> ShrinkStats {
        self.state.lock_stats().clone()
    }

    /// Number of callers that participated in scheduling.
    #[must_use]
    pub fn get_callers(&self) -> usize {
        self.state.caller_wait_counts.len()
    }

    /// Number of callees registered for delayed shrinking.
    #[must_use]
    pub fn get_delayed_shrinking_callees(&self) -> usize {
        self.state.delayed_shrinking_wait_counts.len()
    }

    /// Finalizes the make-static set explicitly and consumes the inliner.
    pub fn finish(self) {
        self.state.invoke_direct_to_static();
    }
}

impl Drop for MultiMethodInliner {
    fn drop(&mut self) {
        self.state.invoke_direct_to_static();
    }
}
