//! Dead branch and dead switch pruning.
//!
//! Operates on the last instruction of a basic block. A conditional branch
//! with one edge the analysis proves infeasible becomes either a plain
//! goto (the fallthrough is dead) or disappears (the taken edge is dead).
//! A switch whose selector is known collapses: case labels whose key
//! cannot match are demoted to fallthrough markers, and when at most one
//! distinct successor stays reachable the switch itself is deleted or
//! replaced by a goto.
//!
//! Label demotion mutates target items in place, which requires the
//! non-editable graph whose blocks are plain item ranges; the conditional
//! branch path does not touch items and is mode-agnostic.

use tracing::trace;

use crate::analysis::{
    ConstantEnvironment, ConstantValue, FixpointIterator, JoinSemiLattice, MeetSemiLattice,
};
use crate::ir::{
    BlockId, ControlFlowGraph, EdgeKind, IrCode, IrInstruction, IrItem, Opcode, TargetKind,
};
use crate::transform::Transform;

impl Transform {
    /// Prunes the terminator of `block` if the analysis proves one of its
    /// successors unreachable.
    ///
    /// `env` must be the post-state of the block's last instruction.
    ///
    /// # Panics
    ///
    /// Panics if a conditional branch block does not have exactly two
    /// non-ghost successors; such a graph is malformed.
    pub(crate) fn eliminate_dead_branch(
        &mut self,
        fixpoint: &FixpointIterator<'_>,
        env: &ConstantEnvironment,
        cfg: &ControlFlowGraph,
        block: BlockId,
        code: &mut IrCode,
    ) {
        let Some(last_idx) = cfg.block(block).last_insn_index(code) else {
            return;
        };
        let Some(insn) = code.item(last_idx).insn() else {
            return;
        };
        if insn.opcode().is_switch() {
            self.remove_dead_switch(env, cfg, block, code);
            return;
        }
        if !insn.opcode().is_conditional_branch() {
            return;
        }
        let insn_id = insn.id();

        let succs: Vec<_> = cfg
            .succs(block)
            .iter()
            .filter(|e| e.kind != EdgeKind::Ghost)
            .copied()
            .collect();
        assert!(
            succs.len() == 2,
            "conditional branch block {block} has {} non-ghost successors",
            succs.len()
        );
        for edge in &succs {
            // Check whether the fixpoint has determined this successor to
            // be unreachable.
            if fixpoint.analyze_edge(edge, env).is_bottom() {
                let is_fallthrough = edge.kind == EdgeKind::Goto;
                trace!(
                    branch = %insn_id,
                    always = if is_fallthrough { "taken" } else { "fallthrough" },
                    "removing dead conditional branch"
                );
                self.stats_mut().branches_removed += 1;
                if is_fallthrough {
                    self.plan_mut()
                        .replace(insn_id, vec![IrInstruction::new(Opcode::Goto)]);
                } else {
                    self.plan_mut().delete(insn_id);
                }
                // If the block is reachable at least one successor remains
                // reachable, so one dead edge is all there is to find.
                break;
            }
        }
    }

    /// Collapses the switch ending `block` when its selector pins the
    /// outcome.
    ///
    /// # Panics
    ///
    /// Panics if the switch block has no unique goto (default) successor;
    /// such a graph is malformed.
    pub(crate) fn remove_dead_switch(
        &mut self,
        env: &ConstantEnvironment,
        cfg: &ControlFlowGraph,
        block: BlockId,
        code: &mut IrCode,
    ) {
        if !self.config().remove_dead_switch {
            return;
        }
        // Label demotion rewrites target items inside block item streams;
        // that requires the non-editable graph.
        if cfg.editable() {
            return;
        }

        let last_idx = cfg
            .block(block)
            .last_insn_index(code)
            .expect("switch block has a last instruction");
        let insn = code.item(last_idx).insn().expect("last item is an instruction");
        assert!(insn.opcode().is_switch(), "block does not end in a switch");
        let switch_id = insn.id();
        let selector = env.get(insn.src(0));

        // Successor blocks, with the unique goto target as the default.
        let mut def_block: Option<BlockId> = None;
        let mut succs: Vec<BlockId> = Vec::new();
        for edge in cfg.succs(block) {
            match edge.kind {
                EdgeKind::Goto => {
                    assert!(def_block.is_none(), "switch block {block} has two goto successors");
                    def_block = Some(edge.dst);
                }
                EdgeKind::Branch => {}
                EdgeKind::Ghost => continue,
            }
            if !succs.contains(&edge.dst) {
                succs.push(edge.dst);
            }
        }
        let def_block = def_block.unwrap_or_else(|| {
            panic!("switch block {block} has no default successor")
        });

        // Find a non-default block uniquely reachable under the selector.
        // If the selector is unknown the switch itself is not rewritten,
        // but infeasible labels are still demoted below.
        let mut should_optimize = !selector.is_top();
        let mut reachable: Option<BlockId> = None;
        for &succ in &succs {
            let range = {
                let b = cfg.block(succ);
                b.start..b.end
            };
            for idx in range {
                let IrItem::Target(t) = code.item(idx) else {
                    continue;
                };
                if t.src != switch_id {
                    continue;
                }
                let TargetKind::Case { key } = t.kind else {
                    continue;
                };
                let case = selector.meet(&ConstantValue::Signed(i64::from(key)));
                if case.is_bottom() || succ == def_block {
                    // Unreachable label, or a case label inside the default
                    // block: either way the label is simply erased.
                    *code.item_mut(idx) = IrItem::Fallthrough;
                } else if let Some(first) = reachable {
                    if first != succ {
                        should_optimize = false;
                    }
                } else {
                    reachable = Some(succ);
                }
            }
        }

        if !should_optimize {
            return;
        }
        self.stats_mut().branches_removed += 1;

        match reachable {
            None => {
                // No case can match: the switch disappears and control
                // falls through to the default block.
                trace!(switch = %switch_id, "removing fully dead switch");
                self.plan_mut().delete(switch_id);
            }
            Some(succ) => {
                trace!(switch = %switch_id, dest_block = succ, "switch has a unique live case");
                self.plan_mut()
                    .replace(switch_id, vec![IrInstruction::new(Opcode::Goto)]);
                // Promote the first surviving case label to a simple branch
                // target; every later one in the block is erased so exactly
                // one label remains.
                let range = {
                    let b = cfg.block(succ);
                    b.start..b.end
                };
                let mut promoted = false;
                for idx in range {
                    let IrItem::Target(t) = code.item(idx) else {
                        continue;
                    };
                    if t.src != switch_id || !matches!(t.kind, TargetKind::Case { .. }) {
                        continue;
                    }
                    if promoted {
                        *code.item_mut(idx) = IrItem::Fallthrough;
                    } else if let IrItem::Target(t) = code.item_mut(idx) {
                        t.kind = TargetKind::Simple;
                        promoted = true;
                    }
                }
                assert!(promoted, "live switch successor lost its case label");
            }
        }
    }
}
