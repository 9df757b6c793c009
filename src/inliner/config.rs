//! Inliner configuration.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::inliner::ShrinkPass;
use crate::ir::{MethodRefData, TypeDesc};
use crate::transform::TransformConfig;

/// What kind of caller-callee relationships the inliner may rewrite.
///
/// Global inlining is possible before dex partitioning; afterwards only
/// methods within one dex may be combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InlinerMode {
    /// No cross-dex restriction.
    None,
    /// Before dex partitioning: only the store topology constrains
    /// references.
    #[default]
    InterDex,
    /// After partitioning: caller and callee must live in the same dex
    /// store.
    IntraDex,
}

/// Per-method-reference profiling statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileStats {
    /// Observed call count.
    pub call_count: u64,
    /// Percentage of profiled runs the method appeared in.
    pub appear_percent: f64,
}

/// Configuration of the multi-method inliner.
#[derive(Clone)]
pub struct InlinerConfig {
    /// Worker threads for parallel processing. Zero runs everything
    /// synchronously on the submitting thread.
    pub num_threads: usize,

    /// Run constant propagation when shrinking a method.
    pub enable_const_prop: bool,

    /// Configuration of the shrinker's constant propagation runs.
    pub transform: TransformConfig,

    /// Sibling cleanup passes (common-subexpression elimination, copy
    /// propagation, local dead code elimination) run after constant
    /// propagation when shrinking. Supplied by the embedder; the inliner
    /// treats them as opaque.
    pub sibling_passes: Vec<Arc<dyn ShrinkPass>>,

    /// Delay shrinking of a callee with constant-argument summaries until
    /// all of its callers have been processed.
    pub delayed_shrinking: bool,

    /// Per-caller estimated size ceiling in code units. Some legacy VM
    /// versions fail verification on oversized methods.
    pub max_caller_size: u64,

    /// Per-callee estimated size ceiling in code units.
    pub max_callee_size: u64,

    /// Callees at or below this size pass the fast profitability check
    /// without a cost estimate.
    pub small_callee_size: u64,

    /// Classes whose methods must never be inlined.
    pub blocklist: FxHashSet<TypeDesc>,

    /// Classes whose methods must never be inlined into.
    pub caller_blocklist: FxHashSet<TypeDesc>,

    /// Hot methods. A non-empty set enables for-speed mode, which inlines
    /// hot callees regardless of the size cost model.
    pub hot_methods: FxHashSet<MethodRefData>,
}

impl std::fmt::Debug for InlinerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlinerConfig")
            .field("num_threads", &self.num_threads)
            .field("enable_const_prop", &self.enable_const_prop)
            .field("sibling_passes", &self.sibling_passes.len())
            .field("delayed_shrinking", &self.delayed_shrinking)
            .field("max_caller_size", &self.max_caller_size)
            .field("max_callee_size", &self.max_callee_size)
            .field("small_callee_size", &self.small_callee_size)
            .field("hot_methods", &self.hot_methods.len())
            .finish_non_exhaustive()
    }
}

impl Default for InlinerConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            enable_const_prop: true,
            transform: TransformConfig::aggressive(),
            sibling_passes: Vec::new(),
            delayed_shrinking: true,
            max_caller_size: 1 << 15,
            max_callee_size: 1 << 12,
            small_callee_size: 8,
            blocklist: FxHashSet::default(),
            caller_blocklist: FxHashSet::default(),
            hot_methods: FxHashSet::default(),
        }
    }
}
