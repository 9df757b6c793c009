//! Intraprocedural constant propagation fixpoint.
//!
//! A worklist solver over the control flow graph. Per-block entry states
//! start at bottom (unreachable); the entry block is seeded with the
//! initial environment and states only move up the lattice, so the
//! iteration converges. Successor contributions pass through
//! [`FixpointIterator::analyze_edge`], which filters out edges the current
//! environment proves infeasible — this is what lets the transform prune
//! dead branches and dead switch arms.
//!
//! The transform consumes the result through three queries:
//! `entry_state_at` for a block's entry environment,
//! `analyze_instruction` to advance an environment across one instruction,
//! and `analyze_edge` to filter an environment across one edge.
//!
//! The iterator snapshots the block terminators and switch case keys at
//! construction time rather than borrowing the body, so the body stays
//! free for the transform to rewrite while the fixpoint is still being
//! queried.

use std::collections::VecDeque;

use crate::analysis::{ConstantEnvironment, ConstantValue, MeetSemiLattice, WholeProgramState};
use crate::ir::{
    BlockId, ControlFlowGraph, Edge, EdgeKind, IfOp, InsnId, IrCode, IrInstruction, IrItem,
    LitOp, Opcode, Reg, TargetKind, TypeDesc,
};

/// Evaluates a literal-operand integer operation on 32-bit values.
///
/// Returns `None` for division or remainder by zero (the instruction
/// throws; there is no result to fold).
#[must_use]
pub fn eval_lit(op: LitOp, operand: i64, literal: i64) -> Option<i64> {
    #[allow(clippy::cast_possible_truncation)]
    let a = operand as i32;
    #[allow(clippy::cast_possible_truncation)]
    let l = literal as i32;
    let result = match op {
        LitOp::Add => a.wrapping_add(l),
        LitOp::Rsub => l.wrapping_sub(a),
        LitOp::Mul => a.wrapping_mul(l),
        LitOp::Div => {
            if l == 0 {
                return None;
            }
            a.wrapping_div(l)
        }
        LitOp::Rem => {
            if l == 0 {
                return None;
            }
            a.wrapping_rem(l)
        }
        LitOp::And => a & l,
        LitOp::Or => a | l,
        LitOp::Xor => a ^ l,
        LitOp::Shl => a.wrapping_shl(l as u32 & 0x1f),
        LitOp::Shr => a.wrapping_shr(l as u32 & 0x1f),
        LitOp::Ushr => ((a as u32).wrapping_shr(l as u32 & 0x1f)) as i32,
    };
    Some(i64::from(result))
}

/// Snapshot of a block's terminating branch, taken at construction.
#[derive(Debug, Clone)]
struct TerminatorSummary {
    id: InsnId,
    opcode: Opcode,
    srcs: Vec<Reg>,
}

/// The intraprocedural constant propagation fixpoint over one method.
#[derive(Debug)]
pub struct FixpointIterator<'a> {
    cfg: &'a ControlFlowGraph,
    wps: &'a WholeProgramState,
    class_under_init: Option<TypeDesc>,
    entry_states: Vec<ConstantEnvironment>,
    /// Last instruction of each block, if it is a branch.
    terminators: Vec<Option<TerminatorSummary>>,
    /// Per block: (switch identity, case key) of each case label in it.
    case_keys: Vec<Vec<(InsnId, i64)>>,
}

impl<'a> FixpointIterator<'a> {
    /// Creates the fixpoint for a method body and its graph.
    ///
    /// When `class_under_init` is set, the environment additionally tracks
    /// fields of that class (the method being analyzed is its declared
    /// initializer, where the whole-program state does not apply).
    #[must_use]
    pub fn new(
        cfg: &'a ControlFlowGraph,
        code: &IrCode,
        wps: &'a WholeProgramState,
        class_under_init: Option<TypeDesc>,
    ) -> Self {
        let mut terminators = Vec::with_capacity(cfg.num_blocks());
        let mut case_keys = vec![Vec::new(); cfg.num_blocks()];
        for block in cfg.blocks() {
            terminators.push(block.last_insn(code).and_then(|insn| {
                insn.opcode().is_branch().then(|| TerminatorSummary {
                    id: insn.id(),
                    opcode: insn.opcode(),
                    srcs: insn.srcs().to_vec(),
                })
            }));
            for idx in block.start..block.end {
                if let IrItem::Target(t) = code.item(idx) {
                    if let TargetKind::Case { key } = t.kind {
                        case_keys[block.id].push((t.src, i64::from(key)));
                    }
                }
            }
        }
        let entry_states = vec![ConstantEnvironment::bottom(); cfg.num_blocks()];
        Self {
            cfg,
            wps,
            class_under_init,
            entry_states,
            terminators,
            case_keys,
        }
    }

    /// Runs the worklist iteration to a fixpoint from the given initial
    /// environment at the entry block.
    pub fn run(&mut self, code: &IrCode, initial: ConstantEnvironment) {
        if self.cfg.num_blocks() == 0 {
            return;
        }
        let entry = self.cfg.entry();
        self.entry_states[entry] = initial;

        let mut worklist: VecDeque<BlockId> = VecDeque::new();
        let mut in_worklist = vec![false; self.cfg.num_blocks()];
        worklist.push_back(entry);
        in_worklist[entry] = true;

        while let Some(block) = worklist.pop_front() {
            in_worklist[block] = false;
            let mut env = self.entry_states[block].clone();
            if env.is_bottom() {
                continue;
            }
            for idx in self.cfg.block(block).start..self.cfg.block(block).end {
                if let IrItem::Insn(insn) = code.item(idx) {
                    self.analyze_instruction(insn, &mut env);
                }
            }
            for edge in self.cfg.succs(block) {
                if edge.kind == EdgeKind::Ghost {
                    continue;
                }
                let out = self.analyze_edge(edge, &env);
                let old = &self.entry_states[edge.dst];
                let mut merged = old.clone();
                merged.join_with(&out);
                if merged != *old {
                    self.entry_states[edge.dst] = merged;
                    if !in_worklist[edge.dst] {
                        worklist.push_back(edge.dst);
                        in_worklist[edge.dst] = true;
                    }
                }
            }
        }
    }

    /// The environment at the entry of a block. Bottom means the block is
    /// unreachable.
    #[must_use]
    pub fn entry_state_at(&self, block: BlockId) -> ConstantEnvironment {
        self.entry_states[block].clone()
    }

    /// Advances `env` across one instruction.
    ///
    /// Afterwards the destination register (or the synthetic result
    /// register, for primaries that deliver through a pseudo) holds the
    /// instruction's post-state.
    pub fn analyze_instruction(&self, insn: &IrInstruction, env: &mut ConstantEnvironment) {
        if env.is_bottom() {
            return;
        }
        match insn.opcode() {
            Opcode::Const | Opcode::ConstWide => {
                let value = insn
                    .literal()
                    .map_or(ConstantValue::Top, ConstantValue::Signed);
                env.set(insn.dest().unwrap_or_default(), value);
            }
            op if op.is_move() => {
                let value = env.get(insn.src(0));
                env.set(insn.dest().unwrap_or_default(), value);
            }
            op if op.is_move_result() || op.is_move_result_pseudo() => {
                let value = env.result();
                env.set(insn.dest().unwrap_or_default(), value);
                env.set_result(ConstantValue::Top);
            }
            op if op.is_sget() => {
                let value = insn.field().map_or(ConstantValue::Top, |field| {
                    if self.class_under_init.as_deref() == Some(&*field.class) {
                        env.get_field(field)
                    } else {
                        self.wps.get_field_value(field)
                    }
                });
                env.set_result(value);
            }
            op if op.is_iget() || op.is_aget() => {
                env.set_result(ConstantValue::Top);
            }
            op if op.is_sput() || op.is_iput() => {
                if let Some(field) = insn.field() {
                    if self.class_under_init.as_deref() == Some(&*field.class) {
                        let value = env.get(insn.src(0));
                        env.set_field(field, value);
                    }
                }
            }
            Opcode::BinopLit { op, .. } => {
                let folded = match (env.get(insn.src(0)), insn.literal()) {
                    (ConstantValue::Signed(a), Some(lit)) => {
                        eval_lit(op, a, lit).map_or(ConstantValue::Top, ConstantValue::Signed)
                    }
                    (ConstantValue::Bottom, _) => ConstantValue::Bottom,
                    _ => ConstantValue::Top,
                };
                if matches!(op, LitOp::Div | LitOp::Rem) {
                    env.set_result(folded);
                } else {
                    env.set(insn.dest().unwrap_or_default(), folded);
                }
            }
            Opcode::Invoke { .. } => {
                env.set_result(ConstantValue::Top);
            }
            _ => {
                if let Some(dest) = insn.dest() {
                    env.set(dest, ConstantValue::Top);
                }
            }
        }
    }

    /// Filters `env` across one edge.
    ///
    /// Returns bottom when the environment proves the edge is never taken;
    /// otherwise returns the environment, possibly refined with what taking
    /// the edge implies (e.g. the tested register is zero on the taken side
    /// of an `if-eqz`).
    #[must_use]
    pub fn analyze_edge(&self, edge: &Edge, env: &ConstantEnvironment) -> ConstantEnvironment {
        if env.is_bottom() {
            return ConstantEnvironment::bottom();
        }
        let Some(terminator) = self.terminators[edge.src].as_ref() else {
            return env.clone();
        };
        match terminator.opcode {
            Opcode::IfTestZ { op } => {
                let reg = terminator.srcs[0];
                self.analyze_branch_edge(edge, env, op, env.get(reg), ConstantValue::Signed(0), reg)
            }
            Opcode::IfTest { op } => {
                let left = env.get(terminator.srcs[0]);
                let right = env.get(terminator.srcs[1]);
                self.analyze_branch_edge(edge, env, op, left, right, terminator.srcs[0])
            }
            Opcode::Switch => self.analyze_switch_edge(edge, env, terminator.srcs[0], terminator.id),
            _ => env.clone(),
        }
    }

    fn analyze_branch_edge(
        &self,
        edge: &Edge,
        env: &ConstantEnvironment,
        op: IfOp,
        left: ConstantValue,
        right: ConstantValue,
        left_reg: Reg,
    ) -> ConstantEnvironment {
        let edge_is_taken = edge.kind == EdgeKind::Branch;
        if let (Some(a), Some(b)) = (left.as_signed(), right.as_signed()) {
            if op.evaluate(a, b) == edge_is_taken {
                return env.clone();
            }
            return ConstantEnvironment::bottom();
        }
        // Refinement: an equality test that this edge asserts pins the
        // tested register to the compared constant.
        let implied_equal = (op == IfOp::Eq && edge_is_taken) || (op == IfOp::Ne && !edge_is_taken);
        if implied_equal {
            if let Some(b) = right.as_signed() {
                let mut refined = env.clone();
                let met = refined.get(left_reg).meet(&ConstantValue::Signed(b));
                if met.is_bottom() {
                    return ConstantEnvironment::bottom();
                }
                refined.set(left_reg, met);
                return refined;
            }
        }
        env.clone()
    }

    fn analyze_switch_edge(
        &self,
        edge: &Edge,
        env: &ConstantEnvironment,
        switch_reg: Reg,
        switch_id: InsnId,
    ) -> ConstantEnvironment {
        let selector = env.get(switch_reg);
        let keys_to = |block: BlockId| -> Vec<i64> {
            self.case_keys[block]
                .iter()
                .filter(|(src, _)| *src == switch_id)
                .map(|(_, key)| *key)
                .collect()
        };
        match edge.kind {
            EdgeKind::Branch => {
                let keys = keys_to(edge.dst);
                match selector.as_signed() {
                    Some(c) if keys.contains(&c) => env.clone(),
                    Some(_) => ConstantEnvironment::bottom(),
                    None => {
                        // A single-key case refines the selector.
                        if keys.len() == 1 {
                            let mut refined = env.clone();
                            refined.set(switch_reg, ConstantValue::Signed(keys[0]));
                            refined
                        } else {
                            env.clone()
                        }
                    }
                }
            }
            EdgeKind::Goto => {
                // The default edge is infeasible when the selector is a
                // constant matched by some case.
                if let Some(c) = selector.as_signed() {
                    let matched = self
                        .cfg
                        .succs(edge.src)
                        .iter()
                        .filter(|e| e.kind == EdgeKind::Branch)
                        .any(|e| keys_to(e.dst).contains(&c));
                    if matched {
                        return ConstantEnvironment::bottom();
                    }
                }
                env.clone()
            }
            EdgeKind::Ghost => env.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{IrInstruction, LitWidth};

    use super::*;

    fn fold(op: LitOp, a: i64, lit: i64) -> Option<i64> {
        eval_lit(op, a, lit)
    }

    #[test]
    fn test_eval_lit_all_ops() {
        assert_eq!(fold(LitOp::Add, 3, 4), Some(7));
        assert_eq!(fold(LitOp::Rsub, 3, 10), Some(7));
        assert_eq!(fold(LitOp::Mul, 3, -2), Some(-6));
        assert_eq!(fold(LitOp::Div, 7, 2), Some(3));
        assert_eq!(fold(LitOp::Div, 7, 0), None);
        assert_eq!(fold(LitOp::Rem, 7, 2), Some(1));
        assert_eq!(fold(LitOp::Rem, 7, 0), None);
        assert_eq!(fold(LitOp::And, 0b1100, 0b1010), Some(0b1000));
        assert_eq!(fold(LitOp::Or, 0b1100, 0b1010), Some(0b1110));
        assert_eq!(fold(LitOp::Xor, 0b1100, 0b1010), Some(0b0110));
        assert_eq!(fold(LitOp::Shl, 1, 4), Some(16));
        assert_eq!(fold(LitOp::Shr, -16, 2), Some(-4));
        assert_eq!(fold(LitOp::Ushr, -1, 28), Some(0xf));
    }

    #[test]
    fn test_eval_lit_wraps_at_32_bits() {
        assert_eq!(fold(LitOp::Add, i64::from(i32::MAX), 1), Some(i64::from(i32::MIN)));
    }

    #[test]
    fn test_fixpoint_straight_line() {
        // const v0, 7; add-int/lit8 v1, v0, 3; return-void
        let mut code = IrCode::new(2, 0);
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(7));
        code.add_insn(
            IrInstruction::new(Opcode::BinopLit {
                op: LitOp::Add,
                width: LitWidth::Lit8,
            })
            .with_dest(1)
            .with_src(0)
            .with_literal(3),
        );
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let cfg = ControlFlowGraph::build(&code);
        let wps = WholeProgramState::new();
        let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
        fixpoint.run(&code, ConstantEnvironment::top());

        let mut env = fixpoint.entry_state_at(0);
        for (_, insn) in code.iter_insns() {
            fixpoint.analyze_instruction(insn, &mut env);
        }
        assert_eq!(env.get(0), ConstantValue::Signed(7));
        assert_eq!(env.get(1), ConstantValue::Signed(10));
    }

    #[test]
    fn test_fixpoint_kills_dead_edge() {
        // const v0, 0; if-eqz v0 -> L; (fallthrough) return-void; L: return-void
        let mut code = IrCode::new(1, 0);
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(0));
        let branch = code.add_insn(
            IrInstruction::new(Opcode::IfTestZ { op: IfOp::Eq }).with_src(0),
        );
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
        code.add_target(branch);
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let cfg = ControlFlowGraph::build(&code);
        let wps = WholeProgramState::new();
        let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
        fixpoint.run(&code, ConstantEnvironment::top());

        // The fallthrough block (block 1) is unreachable; the branch target
        // (block 2) is reachable.
        assert!(fixpoint.entry_state_at(1).is_bottom());
        assert!(!fixpoint.entry_state_at(2).is_bottom());
    }

    #[test]
    fn test_fixpoint_join_loses_disagreeing_constant() {
        // if-eqz v0 -> L; const v1, 1; goto M; L: const v1, 2; M: return-void
        let mut code = IrCode::new(2, 1);
        let branch = code.add_insn(
            IrInstruction::new(Opcode::IfTestZ { op: IfOp::Eq }).with_src(0),
        );
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(1).with_literal(1));
        let goto = code.add_insn(IrInstruction::new(Opcode::Goto));
        code.add_target(branch);
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(1).with_literal(2));
        code.add_target(goto);
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let cfg = ControlFlowGraph::build(&code);
        let wps = WholeProgramState::new();
        let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
        fixpoint.run(&code, ConstantEnvironment::top());

        let merge = cfg.num_blocks() - 1;
        let env = fixpoint.entry_state_at(merge);
        assert!(!env.is_bottom());
        assert_eq!(env.get(1), ConstantValue::Top);
    }
}
