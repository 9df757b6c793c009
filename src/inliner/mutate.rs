//! The IR splice that performs an inlining.
//!
//! Two forms exist. The general form inserts moves mapping the caller's
//! argument registers to the callee's parameter registers, splices a
//! renamed copy of the callee body over the invoke, and rewrites callee
//! returns into moves to the caller's result register. The tail-call form
//! renames the callee's registers to overlap the caller's and splices
//! without inserting moves; it assumes the caller does no work after the
//! call and survives only for one upstream pass that depends on exact
//! instruction sequences — do not extend it.

use rustc_hash::FxHashMap;

use crate::ir::{
    BranchTarget, InsnId, IrCode, IrInstruction, IrItem, MethodDef, Opcode, Reg, TargetKind,
};
use crate::Result;

/// Inline `callee_code` into `caller_code` at the invoke with identity
/// `invoke_id`, general form.
///
/// # Errors
///
/// Returns [`crate::Error::Ir`] when the invoke is not present in the
/// caller.
pub fn inline_method(
    caller_code: &mut IrCode,
    callee_code: &IrCode,
    invoke_id: InsnId,
) -> Result<()> {
    let invoke_idx = caller_code
        .insn_index(invoke_id)
        .ok_or_else(|| ir_error!("invoke {} not found in caller", invoke_id))?;
    let invoke_srcs: Vec<Reg> = caller_code
        .item(invoke_idx)
        .insn()
        .map(|i| i.srcs().to_vec())
        .unwrap_or_default();

    // The move-result, if any, names the register the callee's returns
    // must feed.
    let move_result = caller_code.items()[invoke_idx + 1..]
        .iter()
        .enumerate()
        .find_map(|(off, item)| item.insn().map(|i| (invoke_idx + 1 + off, i)))
        .filter(|(_, i)| i.opcode().is_move_result())
        .map(|(idx, i)| (idx, i.opcode(), i.dest().unwrap_or_default()));

    let reg_offset = caller_code.grow_registers(callee_code.registers_size());
    let first_param = reg_offset + callee_code.registers_size() - callee_code.ins_size();

    let mut items: Vec<IrItem> = Vec::with_capacity(callee_code.len() + 4);
    for (i, src) in invoke_srcs.iter().enumerate() {
        items.push(IrItem::Insn(
            IrInstruction::new(Opcode::Move)
                .with_dest(first_param + i as Reg)
                .with_src(*src),
        ));
    }

    items.extend(splice_body(
        callee_code,
        reg_offset,
        move_result.map(|(_, op, dest)| (op, dest)),
    ));

    for t in callee_code.catch_types() {
        caller_code.add_catch_type(t.clone());
    }

    // Remove the move-result first (it sits after the invoke), then the
    // invoke, then splice the new items into the gap.
    if let Some((mr_idx, _, _)) = move_result {
        caller_code.remove_item(mr_idx);
    }
    caller_code.remove_item(invoke_idx);
    caller_code.insert_items(invoke_idx, items);
    Ok(())
}

/// Renames and copies the callee body, rewriting returns.
///
/// `result` carries the caller-side move-result opcode and destination
/// when the invoke's value is used.
fn splice_body(
    callee_code: &IrCode,
    reg_offset: Reg,
    result: Option<(Opcode, Reg)>,
) -> Vec<IrItem> {
    // First pass: duplicate instructions under fresh identities so labels
    // can be remapped even when they point forward.
    let mut id_map: FxHashMap<InsnId, InsnId> = FxHashMap::default();
    let mut copies: Vec<Option<IrInstruction>> = Vec::with_capacity(callee_code.len());
    for item in callee_code.items() {
        match item {
            IrItem::Insn(insn) => {
                let mut copy = insn.duplicate();
                copy.shift_registers(reg_offset);
                id_map.insert(insn.id(), copy.id());
                copies.push(Some(copy));
            }
            _ => copies.push(None),
        }
    }

    let last_insn_pos = callee_code
        .items()
        .iter()
        .rposition(|item| item.insn().is_some());

    let mut out: Vec<IrItem> = Vec::with_capacity(callee_code.len() + 2);
    let mut end_gotos: Vec<InsnId> = Vec::new();
    for (pos, item) in callee_code.items().iter().enumerate() {
        match item {
            IrItem::Insn(original) => {
                let copy = copies[pos]
                    .take()
                    .expect("copy exists for every instruction");
                if original.opcode().is_return() {
                    if let (Some((mr_op, dest)), Some(&src)) =
                        (result, copy.srcs().first())
                    {
                        let move_op = match mr_op {
                            Opcode::MoveResultWide => Opcode::MoveWide,
                            Opcode::MoveResultObject => Opcode::MoveObject,
                            _ => Opcode::Move,
                        };
                        out.push(IrItem::Insn(
                            IrInstruction::new(move_op).with_dest(dest).with_src(src),
                        ));
                    }
                    // A return anywhere but the end jumps past the splice.
                    if Some(pos) != last_insn_pos {
                        let goto = IrInstruction::new(Opcode::Goto);
                        end_gotos.push(goto.id());
                        out.push(IrItem::Insn(goto));
                    }
                } else {
                    out.push(IrItem::Insn(copy));
                }
            }
            IrItem::Target(t) => {
                let mut target = *t;
                if let Some(&new_src) = id_map.get(&t.src) {
                    target.src = new_src;
                }
                out.push(IrItem::Target(target));
            }
            IrItem::Fallthrough => out.push(IrItem::Fallthrough),
        }
    }
    for goto in end_gotos {
        out.push(IrItem::Target(BranchTarget {
            kind: TargetKind::Simple,
            src: goto,
        }));
    }
    out
}

/// Inline tail-called `callee_code` into `caller_code` at `invoke_id` by
/// register renaming.
///
/// This is NOT a general-purpose splice: it assumes the caller does no
/// work after the call, so the only live registers are the arguments. The
/// callee's parameter registers collapse onto the caller's argument
/// registers and no moves are inserted; callee returns remain returns.
/// Use of this form should be considered deprecated.
///
/// # Errors
///
/// Returns [`crate::Error::Ir`] when the invoke is not present in the
/// caller.
pub fn inline_tail_call(
    caller_code: &mut IrCode,
    callee_code: &IrCode,
    invoke_id: InsnId,
) -> Result<()> {
    let invoke_idx = caller_code
        .insn_index(invoke_id)
        .ok_or_else(|| ir_error!("invoke {} not found in caller", invoke_id))?;
    let invoke_srcs: Vec<Reg> = caller_code
        .item(invoke_idx)
        .insn()
        .map(|i| i.srcs().to_vec())
        .unwrap_or_default();

    let ins = callee_code.ins_size();
    let locals = callee_code.registers_size() - ins;
    let local_offset = caller_code.grow_registers(locals);
    let first_param = callee_code.registers_size() - ins;
    let rename = |reg: Reg| -> Reg {
        if reg >= first_param {
            invoke_srcs
                .get((reg - first_param) as usize)
                .copied()
                .unwrap_or(reg)
        } else {
            reg + local_offset
        }
    };

    let mut id_map: FxHashMap<InsnId, InsnId> = FxHashMap::default();
    let mut items: Vec<IrItem> = Vec::with_capacity(callee_code.len());
    for item in callee_code.items() {
        match item {
            IrItem::Insn(insn) => {
                let mut copy = insn.duplicate();
                if let Some(d) = copy.dest() {
                    copy.set_dest(rename(d));
                }
                for i in 0..copy.srcs().len() {
                    let renamed = rename(copy.src(i));
                    copy.set_src(i, renamed);
                }
                id_map.insert(insn.id(), copy.id());
                items.push(IrItem::Insn(copy));
            }
            IrItem::Target(t) => {
                let mut target = *t;
                if let Some(&new_src) = id_map.get(&t.src) {
                    target.src = new_src;
                }
                items.push(IrItem::Target(target));
            }
            IrItem::Fallthrough => items.push(IrItem::Fallthrough),
        }
    }

    caller_code.remove_item(invoke_idx);
    caller_code.insert_items(invoke_idx, items);
    Ok(())
}

/// Inline through the editable control flow graph, returning `true` on
/// success.
///
/// Falls back to refusing constructs the graph path cannot splice yet
/// (callees with exception handlers); the caller keeps the invoke.
#[must_use]
pub fn inline_with_cfg(caller: &MethodDef, callee: &MethodDef, callsite: InsnId) -> bool {
    let mut caller_guard = caller.lock_code();
    let Some(caller_code) = caller_guard.as_mut() else {
        return false;
    };
    let callee_guard = callee.lock_code();
    let Some(callee_code) = callee_guard.as_ref() else {
        return false;
    };
    if !callee_code.catch_types().is_empty() {
        return false;
    }
    inline_method(caller_code, callee_code, callsite).is_ok()
}

#[cfg(test)]
mod tests {
    use crate::ir::{InvokeKind, MethodRefData, Proto};

    use super::*;

    /// callee: int double(int p0) { return p0 + p0; } in 2 regs (v0 local,
    /// v1 param).
    fn callee_double() -> IrCode {
        let mut code = IrCode::new(2, 1);
        code.add_insn(
            IrInstruction::new(Opcode::BinopLit {
                op: crate::ir::LitOp::Mul,
                width: crate::ir::LitWidth::Lit8,
            })
            .with_dest(0)
            .with_src(1)
            .with_literal(2),
        );
        code.add_insn(IrInstruction::new(Opcode::Return).with_src(0));
        code
    }

    #[test]
    fn test_general_inline_rewrites_invoke() {
        // caller: const v0, 5; invoke-static {v0}; move-result v1; return v1
        let mut caller = IrCode::new(2, 0);
        caller.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(5));
        let invoke = caller.add_insn(
            IrInstruction::new(Opcode::Invoke {
                kind: InvokeKind::Static,
            })
            .with_src(0)
            .with_method(MethodRefData::new("LA;", "double", Proto::new("I", &["I"]))),
        );
        caller.add_insn(IrInstruction::new(Opcode::MoveResult).with_dest(1));
        caller.add_insn(IrInstruction::new(Opcode::Return).with_src(1));

        let callee = callee_double();
        inline_method(&mut caller, &callee, invoke).expect("inline succeeds");

        // Invoke and move-result are gone.
        assert!(!caller.iter_insns().any(|(_, i)| i.opcode().is_invoke()));
        assert!(!caller
            .iter_insns()
            .any(|(_, i)| i.opcode().is_move_result()));
        // Frame grew by the callee's frame.
        assert_eq!(caller.registers_size(), 4);
        // A parameter move maps the argument into the callee's param reg
        // (2 + 2 - 1 = 3).
        assert!(caller
            .iter_insns()
            .any(|(_, i)| i.opcode() == Opcode::Move && i.dest() == Some(3) && i.src(0) == 0));
        // The callee return became a move into v1.
        assert!(caller
            .iter_insns()
            .any(|(_, i)| i.opcode() == Opcode::Move && i.dest() == Some(1)));
        // Exactly one return remains (the caller's own).
        assert_eq!(
            caller
                .iter_insns()
                .filter(|(_, i)| i.opcode().is_return())
                .count(),
            1
        );
    }

    #[test]
    fn test_general_inline_void_discard() {
        // caller ignores the result: no move is synthesized.
        let mut caller = IrCode::new(1, 0);
        caller.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(5));
        let invoke = caller.add_insn(
            IrInstruction::new(Opcode::Invoke {
                kind: InvokeKind::Static,
            })
            .with_src(0)
            .with_method(MethodRefData::new("LA;", "double", Proto::new("I", &["I"]))),
        );
        caller.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let callee = callee_double();
        inline_method(&mut caller, &callee, invoke).expect("inline succeeds");
        // The callee's return value is discarded: only the mul survives.
        assert!(!caller.iter_insns().any(|(_, i)| i.opcode().is_invoke()));
        assert_eq!(
            caller
                .iter_insns()
                .filter(|(_, i)| i.opcode() == Opcode::Move)
                .count(),
            1 // just the parameter binding move
        );
    }

    #[test]
    fn test_tail_call_inline_keeps_returns() {
        // caller: invoke-static {v0}; (nothing after)
        let mut caller = IrCode::new(1, 1);
        let invoke = caller.add_insn(
            IrInstruction::new(Opcode::Invoke {
                kind: InvokeKind::Static,
            })
            .with_src(0)
            .with_method(MethodRefData::new("LA;", "double", Proto::new("I", &["I"]))),
        );

        let callee = callee_double();
        inline_tail_call(&mut caller, &callee, invoke).expect("inline succeeds");

        // The callee's return IS the caller's return now.
        assert_eq!(
            caller
                .iter_insns()
                .filter(|(_, i)| i.opcode().is_return())
                .count(),
            1
        );
        // The callee param collapsed onto the caller's argument register.
        assert!(caller
            .iter_insns()
            .any(|(_, i)| matches!(i.opcode(), Opcode::BinopLit { .. }) && i.src(0) == 0));
    }
}
