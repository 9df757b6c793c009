//! Redundant field store elimination.
//!
//! A field write whose value is already the field's known value is a no-op
//! and can be deleted. The reference value comes from the per-point
//! environment when the method is the declared initializer of the field's
//! class (flagged by `class_under_init`), and from the whole-program state
//! everywhere else. Unresolvable field references disable the optimization
//! for that site.

use tracing::trace;

use crate::analysis::{ConstantEnvironment, WholeProgramState};
use crate::ir::IrCode;
use crate::transform::Transform;

impl Transform {
    /// Deletes the field write at `idx` when the stored value equals the
    /// field's current value under runtime-equality.
    ///
    /// Evaluated at the *pre-state* of the instruction: the put has not
    /// executed yet.
    pub(crate) fn eliminate_redundant_put(
        &mut self,
        env: &ConstantEnvironment,
        wps: &WholeProgramState,
        code: &IrCode,
        idx: usize,
    ) {
        let Some(insn) = code.item(idx).insn() else {
            return;
        };
        if !insn.opcode().is_put() {
            return;
        }
        let Some(field_ref) = insn.field() else {
            return;
        };
        if self.resolver().resolve_field(field_ref).is_none() {
            return;
        }
        // The whole-program state covers all traces outside the declaring
        // class's initializer; inside it, the per-point binding applies.
        let existing = if self.config().class_under_init.as_deref() == Some(&*field_ref.class) {
            env.get_field(field_ref)
        } else {
            wps.get_field_value(field_ref)
        };
        let new_value = env.get(insn.src(0));
        if existing.runtime_equals(&new_value) {
            trace!(field = %field_ref, value = ?existing, "field already holds stored value");
            let id = insn.id();
            self.plan_mut().delete(id);
            self.stats_mut().redundant_puts_removed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::analysis::{ConstantEnvironment, ConstantValue, FixpointIterator};
    use crate::ir::{
        AccessFlags, ControlFlowGraph, DexClass, FieldDef, FieldRef, IrInstruction, Opcode,
        Scope, ScopeResolver,
    };
    use crate::transform::TransformConfig;

    use super::*;

    fn scope_with_field() -> Arc<ScopeResolver> {
        let mut class = DexClass::new("LA;", None, AccessFlags::PUBLIC);
        class
            .fields
            .push(FieldDef::new("LA;", "f", "I", AccessFlags::PUBLIC | AccessFlags::STATIC));
        Arc::new(ScopeResolver::new(Arc::new(Scope::new(vec![class]))))
    }

    fn sput_method() -> IrCode {
        // const v0, 0; sput v0, LA;->f:I; return-void
        let mut code = IrCode::new(1, 0);
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(0));
        code.add_insn(
            IrInstruction::new(Opcode::Sput)
                .with_src(0)
                .with_field(FieldRef::new("LA;", "f", "I")),
        );
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
        code
    }

    #[test]
    fn test_store_of_known_value_deleted() {
        let mut code = sput_method();
        let cfg = ControlFlowGraph::build(&code);
        let mut wps = WholeProgramState::new();
        wps.set_field_value(FieldRef::new("LA;", "f", "I"), ConstantValue::Signed(0));
        let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
        fixpoint.run(&code, ConstantEnvironment::top());

        let stats = Transform::new(TransformConfig::default(), scope_with_field())
            .apply(&fixpoint, &wps, &mut code, &cfg);
        assert_eq!(stats.redundant_puts_removed, 1);
        assert!(!code.iter_insns().any(|(_, i)| i.opcode().is_put()));
    }

    #[test]
    fn test_store_of_different_value_kept() {
        let mut code = sput_method();
        let cfg = ControlFlowGraph::build(&code);
        let mut wps = WholeProgramState::new();
        wps.set_field_value(FieldRef::new("LA;", "f", "I"), ConstantValue::Signed(5));
        let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
        fixpoint.run(&code, ConstantEnvironment::top());

        let stats = Transform::new(TransformConfig::default(), scope_with_field())
            .apply(&fixpoint, &wps, &mut code, &cfg);
        assert_eq!(stats.redundant_puts_removed, 0);
        assert!(code.iter_insns().any(|(_, i)| i.opcode().is_put()));
    }

    #[test]
    fn test_unresolved_field_skipped() {
        // The store references a field no class declares.
        let mut code = IrCode::new(1, 0);
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(0));
        code.add_insn(
            IrInstruction::new(Opcode::Sput)
                .with_src(0)
                .with_field(FieldRef::new("LMissing;", "f", "I")),
        );
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let cfg = ControlFlowGraph::build(&code);
        let mut wps = WholeProgramState::new();
        wps.set_field_value(FieldRef::new("LMissing;", "f", "I"), ConstantValue::Signed(0));
        let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
        fixpoint.run(&code, ConstantEnvironment::top());

        let resolver = Arc::new(ScopeResolver::new(Arc::new(Scope::new(vec![]))));
        let stats = Transform::new(TransformConfig::default(), resolver)
            .apply(&fixpoint, &wps, &mut code, &cfg);
        assert_eq!(stats.redundant_puts_removed, 0);
    }

    #[test]
    fn test_class_under_init_uses_environment() {
        // Inside LA;'s initializer: sput v0, f; const v1, 0; sput v1, f.
        // The second store writes what the first one established.
        let mut code = IrCode::new(2, 0);
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(3));
        code.add_insn(
            IrInstruction::new(Opcode::Sput)
                .with_src(0)
                .with_field(FieldRef::new("LA;", "f", "I")),
        );
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(1).with_literal(3));
        code.add_insn(
            IrInstruction::new(Opcode::Sput)
                .with_src(1)
                .with_field(FieldRef::new("LA;", "f", "I")),
        );
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

        let cfg = ControlFlowGraph::build(&code);
        let wps = WholeProgramState::new();
        let cui = Some(crate::ir::type_desc("LA;"));
        let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, cui.clone());
        fixpoint.run(&code, ConstantEnvironment::top());

        let config = TransformConfig {
            class_under_init: cui,
            ..TransformConfig::default()
        };
        let stats = Transform::new(config, scope_with_field())
            .apply(&fixpoint, &wps, &mut code, &cfg);
        assert_eq!(stats.redundant_puts_removed, 1);
        assert_eq!(
            code.iter_insns().filter(|(_, i)| i.opcode().is_put()).count(),
            1
        );
    }
}
