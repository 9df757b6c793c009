//! Per-instruction simplification.
//!
//! Decides, opcode class by opcode class, whether an instruction's
//! destination can be replaced by a constant load:
//!
//! - plain moves (narrow and wide), when enabled by configuration
//! - `move-result-pseudo` after a field get, array get, or literal div/rem,
//!   attributed to the primary so one replacement rewrites the pair
//! - literal integer arithmetic, always
//!
//! `move-result` after a general invoke is deliberately left alone: the
//! two-byte move-result already addresses a wide register range, so a
//! const is only a win if the invoke itself becomes dead, and proving that
//! needs a purity analysis this pass does not assume.

use crate::analysis::ConstantEnvironment;
use crate::ir::{IrCode, LitOp, Opcode};
use crate::transform::Transform;

impl Transform {
    /// Simplifies the instruction at `idx` against the environment at its
    /// post-state.
    pub(crate) fn simplify_instruction(
        &mut self,
        env: &ConstantEnvironment,
        code: &IrCode,
        idx: usize,
    ) {
        let Some(insn) = code.item(idx).insn() else {
            return;
        };
        match insn.opcode() {
            Opcode::Move | Opcode::MoveWide => {
                if self.config().replace_moves_with_consts {
                    self.replace_with_const(env, code, idx);
                }
            }
            op if op.is_move_result_pseudo() => {
                let primary_op = code.primary_of_pseudo(idx).opcode();
                if primary_op.is_sget()
                    || primary_op.is_iget()
                    || primary_op.is_aget()
                    || primary_op.is_div_int_lit()
                    || primary_op.is_rem_int_lit()
                {
                    self.replace_with_const(env, code, idx);
                }
            }
            Opcode::BinopLit { op, .. } if !matches!(op, LitOp::Div | LitOp::Rem) => {
                self.replace_with_const(env, code, idx);
            }
            _ => {}
        }
    }
}
