//! Legality predicates of the inlinability oracle.
//!
//! A callsite may only be inlined when doing so cannot change observable
//! semantics or trip the VM's verifier. The predicates run cheapest-first;
//! the first failure wins and is recorded as a counted rejection, never an
//! error. A rejection based on visibility can sometimes be remedied by
//! demoting the callee's own callee to static; such methods accumulate in
//! the pending make-static set and are demoted by the terminal pass.

use std::sync::Arc;

use tracing::trace;

use crate::inliner::InlinerMode;
use crate::ir::{
    FieldRef, InvokeKind, IrCode, IrInstruction, MethodDef, MethodSearch, Opcode, OrderedMethod,
};

use super::InlinerState;

/// The platform's enumeration base class; enum methods can be called by
/// code outside the scope and are never inlined.
const ENUM_BASE: &str = "Ljava/lang/Enum;";

/// The SDK version probe read: code guarded by it must keep its shape.
fn is_sdk_version_probe(insn: &IrInstruction) -> bool {
    insn.opcode().is_sget()
        && insn.field().is_some_and(|f| {
            *f == FieldRef::new("Landroid/os/Build$VERSION;", "SDK_INT", "I")
        })
}

impl InlinerState {
    /// Returns `true` if the callee may legally be inlined into the caller
    /// at the given invoke.
    ///
    /// `estimated_insn_size` is the caller's running size estimate in code
    /// units (it grows as earlier candidates of the same caller are
    /// accepted). The invoke instruction is optional and only used for
    /// logging.
    pub(crate) fn is_inlinable(
        &self,
        caller: &MethodDef,
        callee: &Arc<MethodDef>,
        invoke: Option<&IrInstruction>,
        estimated_insn_size: u64,
    ) -> bool {
        if self.is_blacklisted(callee) {
            self.bump_info(|i| i.blacklisted += 1);
            return false;
        }
        if self.caller_is_blacklisted(caller) {
            self.bump_info(|i| i.blacklisted += 1);
            return false;
        }
        if self.has_external_catch(callee) {
            self.bump_info(|i| i.throws += 1);
            return false;
        }
        let Some(make_static) = self.cannot_inline_opcodes(caller, callee) else {
            return false;
        };
        if self.cross_store_reference(caller, callee) {
            self.bump_info(|i| i.cross_store += 1);
            return false;
        }
        let callee_size = {
            let guard = callee.lock_code();
            match guard.as_ref() {
                Some(code) => code.size_units(),
                None => return false,
            }
        };
        if self.is_estimate_over_max(callee_size) {
            self.bump_info(|i| i.caller_too_large += 1);
            return false;
        }
        if self.caller_too_large(estimated_insn_size, callee_size) {
            self.bump_info(|i| i.caller_too_large += 1);
            return false;
        }

        if !make_static.is_empty() {
            let mut general = self.lock_general();
            general
                .make_static
                .extend(make_static.into_iter().map(OrderedMethod));
        }
        if let Some(insn) = invoke {
            trace!(caller = %caller, callee = %callee, invoke = %insn.id(), "callsite is inlinable");
        }
        true
    }

    /// Enum-derived, explicitly marked, or blocklisted callees are out.
    pub(crate) fn is_blacklisted(&self, callee: &MethodDef) -> bool {
        if callee.no_inline() {
            return true;
        }
        if self.config.blocklist.contains(callee.class()) {
            return true;
        }
        self.derives_from_enum(callee.class())
    }

    pub(crate) fn caller_is_blacklisted(&self, caller: &MethodDef) -> bool {
        self.config.caller_blocklist.contains(caller.class())
    }

    fn derives_from_enum(&self, class: &str) -> bool {
        let mut current: Option<crate::ir::TypeDesc> = Some(Arc::from(class));
        while let Some(c) = current {
            if &*c == ENUM_BASE {
                return true;
            }
            let Some(cls) = self.scope.class(&c) else {
                return false;
            };
            if cls.flags.contains(crate::ir::AccessFlags::ENUM) {
                return true;
            }
            current = cls.super_class.clone();
        }
        false
    }

    /// A callee catching a non-public external exception type cannot move:
    /// the catch would not verify outside its package.
    pub(crate) fn has_external_catch(&self, callee: &MethodDef) -> bool {
        let guard = callee.lock_code();
        let Some(code) = guard.as_ref() else {
            return false;
        };
        code.catch_types().iter().any(|t| match self.scope.class(t) {
            Some(cls) => cls.external && !cls.flags.contains(crate::ir::AccessFlags::PUBLIC),
            // A type we know nothing about: safety cannot be proven.
            None => true,
        })
    }

    /// Scans the callee body for opcodes that cannot move into another
    /// class.
    ///
    /// Returns `None` when inlining is impossible, otherwise the list of
    /// methods that must be demoted to static to make it legal (possibly
    /// empty). Counters for the specific rejection reasons are bumped
    /// inside.
    pub(crate) fn cannot_inline_opcodes(
        &self,
        caller: &MethodDef,
        callee: &Arc<MethodDef>,
    ) -> Option<Vec<Arc<MethodDef>>> {
        let mut make_static = Vec::new();
        let guard = callee.lock_code();
        let code: &IrCode = guard.as_ref()?;
        for (_, insn) in code.iter_insns() {
            match insn.opcode() {
                Opcode::Invoke { kind } => {
                    if !self.check_invoke(kind, insn, caller, callee, &mut make_static) {
                        return None;
                    }
                }
                op if op.is_field_access() => {
                    if is_sdk_version_probe(insn) {
                        // The platform version probe is special-cased so
                        // that code guarded by it remains.
                        continue;
                    }
                    if !self.check_field_access(insn, caller) {
                        return None;
                    }
                }
                _ => {}
            }
        }
        Some(make_static)
    }

    fn check_invoke(
        &self,
        kind: InvokeKind,
        insn: &IrInstruction,
        caller: &MethodDef,
        callee: &MethodDef,
        make_static: &mut Vec<Arc<MethodDef>>,
    ) -> bool {
        let Some(mref) = insn.method() else {
            return true;
        };
        match kind {
            InvokeKind::Super => {
                // invoke-super resolves relative to the class the code
                // lives in; it cannot be relocated.
                self.bump_info(|i| i.invoke_super += 1);
                false
            }
            InvokeKind::Direct => {
                let Some(def) = self
                    .resolver
                    .resolve_method(mref, MethodSearch::Direct)
                else {
                    self.bump_info(|i| i.unresolved_methods += 1);
                    return false;
                };
                if def.is_constructor() {
                    if !def.is_public() && def.class() != caller.class() {
                        self.bump_info(|i| i.non_pub_ctor += 1);
                        return false;
                    }
                    return true;
                }
                if def.class() != callee.class() {
                    // A direct call into a third class has no static
                    // remedy.
                    self.bump_info(|i| i.need_vmethod += 1);
                    return false;
                }
                // Inlining would turn this into a cross-class call to a
                // private method; demoting the target to static keeps it
                // legal.
                make_static.push(def);
                true
            }
            InvokeKind::Virtual | InvokeKind::Interface => {
                let Some(def) = self
                    .resolver
                    .resolve_method(mref, MethodSearch::Virtual)
                else {
                    // Unknown owning class: the access could be
                    // package-private and inlining would escape the
                    // package, causing a verifier error.
                    self.bump_info(|i| i.escaped_virtual += 1);
                    return false;
                };
                if !def.is_public() && def.class() != caller.class() {
                    self.bump_info(|i| i.non_pub_virtual += 1);
                    return false;
                }
                true
            }
            InvokeKind::Static => true,
        }
    }

    fn check_field_access(&self, insn: &IrInstruction, caller: &MethodDef) -> bool {
        let Some(fref) = insn.field() else {
            return true;
        };
        let Some(field) = self.resolver.resolve_field(fref) else {
            self.bump_info(|i| i.escaped_field += 1);
            return false;
        };
        if !field.is_public() && field.class != *caller.class() {
            self.bump_info(|i| i.non_pub_field += 1);
            return false;
        }
        true
    }

    /// Rejects an inlining that would smuggle a reference across dex store
    /// boundaries.
    pub(crate) fn cross_store_reference(&self, caller: &MethodDef, callee: &MethodDef) -> bool {
        if self.mode == InlinerMode::None {
            return false;
        }
        let caller_store = self.xstores.store_idx(caller.class()).unwrap_or(0);
        if self.mode == InlinerMode::IntraDex {
            // After partitioning, caller and callee must share a dex.
            let callee_store = self.xstores.store_idx(callee.class()).unwrap_or(0);
            if callee_store != 0 && callee_store != caller_store {
                return true;
            }
        }
        let guard = callee.lock_code();
        let Some(code) = guard.as_ref() else {
            return false;
        };
        let illegal = |t: &str| self.xstores.illegal_ref(caller_store, t);
        for (_, insn) in code.iter_insns() {
            if let Some(f) = insn.field() {
                if illegal(&f.class) {
                    return true;
                }
            }
            if let Some(m) = insn.method() {
                if illegal(&m.class) {
                    return true;
                }
            }
        }
        code.catch_types().iter().any(|t| illegal(t))
    }

    /// Verifier guard: some legacy VM versions fail to verify oversized
    /// methods, so single callees past the ceiling never inline.
    pub(crate) fn is_estimate_over_max(&self, callee_size: u64) -> bool {
        callee_size > self.config.max_callee_size
    }

    /// Bounds the caller's growth.
    pub(crate) fn caller_too_large(&self, estimated_caller_size: u64, callee_size: u64) -> bool {
        estimated_caller_size + callee_size > self.config.max_caller_size
    }
}
