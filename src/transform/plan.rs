//! Buffered rewrite plan.
//!
//! The driver sweeps a method while the simplifier and eliminators discover
//! edits; applying those edits immediately would invalidate the sweep's
//! iteration. The plan buffers them instead, keyed by instruction identity,
//! and applies everything in one step at the end — the only point at which
//! positions may change.

use rustc_hash::FxHashSet;

use crate::ir::{InsnId, IrCode, IrInstruction};

/// An ordered, identity-keyed record of replacements and deletions.
///
/// Invariants, checked at insertion time:
///
/// - no instruction appears in both the replacement and the deletion list
/// - each instruction is replaced at most once
/// - a replacement of a branch carries exactly one new instruction
///   (checked at apply time, when the old opcode is known)
#[derive(Debug, Default)]
pub struct RewritePlan {
    replacements: Vec<(InsnId, Vec<IrInstruction>)>,
    deletes: Vec<InsnId>,
    replaced: FxHashSet<InsnId>,
    deleted: FxHashSet<InsnId>,
}

impl RewritePlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the replacement of `old` by `new`.
    ///
    /// # Panics
    ///
    /// Panics if `old` was already replaced or scheduled for deletion, or
    /// if `new` is empty.
    pub fn replace(&mut self, old: InsnId, new: Vec<IrInstruction>) {
        assert!(!new.is_empty(), "replacement of {old} with empty sequence");
        assert!(
            self.replaced.insert(old),
            "instruction {old} replaced twice"
        );
        assert!(
            !self.deleted.contains(&old),
            "instruction {old} both replaced and deleted"
        );
        self.replacements.push((old, new));
    }

    /// Records the deletion of `old`.
    ///
    /// # Panics
    ///
    /// Panics if `old` was already replaced.
    pub fn delete(&mut self, old: InsnId) {
        assert!(
            !self.replaced.contains(&old),
            "instruction {old} both replaced and deleted"
        );
        self.deleted.insert(old);
        self.deletes.push(old);
    }

    /// Returns `true` if the plan records no edits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty() && self.deletes.is_empty()
    }

    /// Number of recorded replacements.
    #[must_use]
    pub fn num_replacements(&self) -> usize {
        self.replacements.len()
    }

    /// Number of recorded deletions.
    #[must_use]
    pub fn num_deletes(&self) -> usize {
        self.deletes.len()
    }

    /// Applies the plan to a body, consuming it: replacements first
    /// (branches dispatch to the branch-map update, everything else splices
    /// in place), then deletions in insertion order.
    ///
    /// Ownership of the new instructions transfers to the body here.
    ///
    /// # Panics
    ///
    /// Panics if a branch replacement carries more than one instruction, or
    /// if a recorded instruction is no longer present in the body.
    pub fn apply(self, code: &mut IrCode) {
        for (old, new) in self.replacements {
            let is_branch = code
                .insn(old)
                .map(|i| i.opcode().is_branch())
                .unwrap_or_else(|| panic!("planned instruction {old} not in body"));
            if is_branch {
                assert!(
                    new.len() == 1,
                    "branch {old} replaced by {} instructions",
                    new.len()
                );
                let mut it = new.into_iter();
                let replacement = it.next().expect("length checked above");
                code.replace_branch(old, replacement);
            } else {
                code.replace_opcode(old, new);
            }
        }
        for old in self.deletes {
            code.remove_opcode(old);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::Opcode;

    use super::*;

    #[test]
    fn test_apply_replacement_then_delete() {
        let mut code = IrCode::new(2, 0);
        let mv = code.add_insn(IrInstruction::new(Opcode::Move).with_dest(1).with_src(0));
        let nop = code.add_insn(IrInstruction::new(Opcode::Nop));
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let mut plan = RewritePlan::new();
        plan.replace(
            mv,
            vec![IrInstruction::new(Opcode::Const).with_dest(1).with_literal(7)],
        );
        plan.delete(nop);
        plan.apply(&mut code);

        assert_eq!(code.insn_count(), 2);
        let (_, first) = code.iter_insns().next().expect("first insn");
        assert_eq!(first.opcode(), Opcode::Const);
    }

    #[test]
    #[should_panic(expected = "replaced twice")]
    fn test_double_replacement_panics() {
        let insn = IrInstruction::new(Opcode::Nop);
        let id = insn.id();
        let mut plan = RewritePlan::new();
        plan.replace(id, vec![IrInstruction::new(Opcode::Nop)]);
        plan.replace(id, vec![IrInstruction::new(Opcode::Nop)]);
    }

    #[test]
    #[should_panic(expected = "both replaced and deleted")]
    fn test_replace_and_delete_panics() {
        let insn = IrInstruction::new(Opcode::Nop);
        let id = insn.id();
        let mut plan = RewritePlan::new();
        plan.replace(id, vec![IrInstruction::new(Opcode::Nop)]);
        plan.delete(id);
    }

    #[test]
    #[should_panic(expected = "replaced by 2 instructions")]
    fn test_branch_replacement_arity_checked() {
        let mut code = IrCode::new(1, 0);
        let goto = code.add_insn(IrInstruction::new(Opcode::Goto));
        code.add_target(goto);
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let mut plan = RewritePlan::new();
        plan.replace(
            goto,
            vec![
                IrInstruction::new(Opcode::Goto),
                IrInstruction::new(Opcode::Nop),
            ],
        );
        plan.apply(&mut code);
    }
}
