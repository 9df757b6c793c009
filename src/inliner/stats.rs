//! Inlining statistics.
//!
//! Rejected candidates are not errors; each legality or profitability
//! predicate that turns a callsite down bumps its counter here. The
//! counters are mutated under the dedicated info lock and read after
//! [`crate::inliner::MultiMethodInliner::inline_methods`] returns.

/// Counters describing one inlining run.
#[derive(Debug, Clone, Copy, Default)]
pub struct InliningInfo {
    /// Callsites successfully inlined.
    pub calls_inlined: usize,
    /// Recursive call chains excluded from the scheduling tree.
    pub recursive: usize,
    /// Deepest call stack seen while ordering bottom-up.
    pub max_call_stack_depth: usize,
    /// Longest dependency chain any method lies on.
    pub critical_path_length: usize,
    /// Callsites whose callee could not be resolved.
    pub not_found: usize,
    /// Callees rejected because they or their class are blacklisted.
    pub blacklisted: usize,
    /// Callees rejected for catching a non-public external exception type.
    pub throws: usize,
    /// Callees rejected because inlining would need a new virtual method.
    pub need_vmethod: usize,
    /// Callees rejected for containing a non-relocatable `invoke-super`.
    pub invoke_super: usize,
    /// Callees rejected for calling an unresolvable virtual method.
    pub escaped_virtual: usize,
    /// Callees rejected for calling an unresolved method.
    pub unresolved_methods: usize,
    /// Callees rejected for calling a non-public virtual out of context.
    pub non_pub_virtual: usize,
    /// Callees rejected for touching an unresolvable field.
    pub escaped_field: usize,
    /// Callees rejected for touching a non-public field out of context.
    pub non_pub_field: usize,
    /// Callees rejected for invoking a non-public constructor.
    pub non_pub_ctor: usize,
    /// Callees rejected for referencing another dex store.
    pub cross_store: usize,
    /// Callsites rejected because the caller would grow past the ceiling.
    pub caller_too_large: usize,
    /// Callers analyzed while collecting constant arguments.
    pub constant_invoke_callers_analyzed: usize,
    /// Unreachable blocks seen in those callers.
    pub constant_invoke_callers_unreachable_blocks: usize,
    /// Callees with collected constant-argument summaries.
    pub constant_invoke_callees_analyzed: usize,
    /// Seconds spent waiting for the worker pool to drain.
    pub waited_seconds: u64,
}
