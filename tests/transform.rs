//! Constant propagation transform integration tests.
//!
//! These tests drive the full pipeline through the public API:
//! 1. Build a method body with the `IrCode` builder
//! 2. Build the control flow graph
//! 3. Run the intraprocedural fixpoint
//! 4. Apply the transform
//! 5. Verify the rewritten body and the reported statistics

use std::sync::Arc;

use dexopt::analysis::{ConstantEnvironment, ConstantValue, FixpointIterator, WholeProgramState};
use dexopt::ir::{
    AccessFlags, ControlFlowGraph, DexClass, FieldDef, FieldRef, IfOp, IrCode, IrInstruction,
    IrItem, Opcode, Scope, ScopeResolver, TargetKind,
};
use dexopt::transform::{Transform, TransformConfig, TransformStats};

/// A resolver over one class `LA;` declaring the static field `f:I`.
fn test_resolver() -> Arc<ScopeResolver> {
    let mut class = DexClass::new("LA;", None, AccessFlags::PUBLIC);
    class.fields.push(FieldDef::new(
        "LA;",
        "f",
        "I",
        AccessFlags::PUBLIC | AccessFlags::STATIC,
    ));
    Arc::new(ScopeResolver::new(Arc::new(Scope::new(vec![class]))))
}

fn field_f() -> FieldRef {
    FieldRef::new("LA;", "f", "I")
}

/// Runs fixpoint + transform over `code` and returns the statistics.
fn run(config: TransformConfig, wps: &WholeProgramState, code: &mut IrCode) -> TransformStats {
    let cfg = ControlFlowGraph::build(code);
    let mut fixpoint = FixpointIterator::new(&cfg, code, wps, config.class_under_init.clone());
    fixpoint.run(&code, ConstantEnvironment::top());
    Transform::new(config, test_resolver()).apply(&fixpoint, wps, code, &cfg)
}

fn aggressive() -> TransformConfig {
    TransformConfig {
        replace_moves_with_consts: true,
        remove_dead_switch: true,
        class_under_init: None,
    }
}

/// Opcode-level rendering without identities, for structural comparison.
fn render(code: &IrCode) -> Vec<String> {
    code.iter_insns().map(|(_, i)| i.to_string()).collect()
}

#[test]
fn test_s1_move_folding() {
    // const v0, 7; move v1, v0; sput v1, LA;->f:I; return-void
    let mut code = IrCode::new(2, 0);
    code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(7));
    code.add_insn(IrInstruction::new(Opcode::Move).with_dest(1).with_src(0));
    code.add_insn(
        IrInstruction::new(Opcode::Sput)
            .with_src(1)
            .with_field(field_f()),
    );
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

    let stats = run(aggressive(), &WholeProgramState::new(), &mut code);

    assert_eq!(stats.materialized_consts, 1);
    // The move became a const load of the destination.
    let second = code.iter_insns().nth(1).map(|(_, i)| i.to_string());
    assert_eq!(second.as_deref(), Some("const v1 7"));
    // The sput is unchanged.
    assert!(code.iter_insns().any(|(_, i)| i.opcode().is_sput()));
}

#[test]
fn test_s2_redundant_static_store() {
    // Whole-program state: f == 0. The method stores 0 again.
    let mut wps = WholeProgramState::new();
    wps.set_field_value(field_f(), ConstantValue::Signed(0));

    let mut code = IrCode::new(1, 0);
    code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(0));
    code.add_insn(
        IrInstruction::new(Opcode::Sput)
            .with_src(0)
            .with_field(field_f()),
    );
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

    let stats = run(aggressive(), &wps, &mut code);

    assert_eq!(stats.redundant_puts_removed, 1);
    assert!(!code.iter_insns().any(|(_, i)| i.opcode().is_sput()));
}

#[test]
fn test_s3_dead_branch_becomes_goto() {
    // const v0, 0; if-eqz v0 -> L1; sput v0, f; L1: return-void
    // v0 == 0: the branch is always taken, the fallthrough is dead.
    let mut code = IrCode::new(1, 0);
    code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(0));
    let branch = code.add_insn(
        IrInstruction::new(Opcode::IfTestZ { op: IfOp::Eq }).with_src(0),
    );
    code.add_insn(
        IrInstruction::new(Opcode::Sput)
            .with_src(0)
            .with_field(field_f()),
    );
    code.add_target(branch);
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

    let stats = run(aggressive(), &WholeProgramState::new(), &mut code);

    assert_eq!(stats.branches_removed, 1);
    assert!(!code
        .iter_insns()
        .any(|(_, i)| i.opcode().is_conditional_branch()));
    // The replacement is an unconditional goto whose label survived.
    let goto = code
        .iter_insns()
        .find(|(_, i)| i.opcode() == Opcode::Goto)
        .map(|(_, i)| i.id())
        .expect("goto materialized");
    assert!(code.items().iter().any(|item| matches!(
        item,
        IrItem::Target(t) if t.src == goto && t.kind == TargetKind::Simple
    )));
}

#[test]
fn test_s3_dead_branch_deleted_when_taken_edge_dead() {
    // const v0, 1; if-eqz v0 -> L1: never taken, so the branch disappears.
    let mut code = IrCode::new(1, 0);
    code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(1));
    let branch = code.add_insn(
        IrInstruction::new(Opcode::IfTestZ { op: IfOp::Eq }).with_src(0),
    );
    code.add_insn(IrInstruction::new(Opcode::Nop));
    code.add_target(branch);
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

    let stats = run(aggressive(), &WholeProgramState::new(), &mut code);

    assert_eq!(stats.branches_removed, 1);
    assert!(!code
        .iter_insns()
        .any(|(_, i)| i.opcode().is_conditional_branch()));
    assert!(!code.iter_insns().any(|(_, i)| i.opcode() == Opcode::Goto));
}

#[test]
fn test_live_branch_untouched() {
    // v0 unknown: both successors stay reachable.
    let mut code = IrCode::new(1, 1);
    let branch = code.add_insn(
        IrInstruction::new(Opcode::IfTestZ { op: IfOp::Eq }).with_src(0),
    );
    code.add_insn(IrInstruction::new(Opcode::Nop));
    code.add_target(branch);
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

    let stats = run(aggressive(), &WholeProgramState::new(), &mut code);
    assert_eq!(stats.branches_removed, 0);
    assert!(code
        .iter_insns()
        .any(|(_, i)| i.opcode().is_conditional_branch()));
}

/// Builds the switch scenario: `switch v0` with cases 3 and 5, default
/// falls through. Returns the body and the switch identity.
fn switch_method(selector: i64) -> IrCode {
    let mut code = IrCode::new(1, 0);
    code.add_insn(
        IrInstruction::new(Opcode::Const)
            .with_dest(0)
            .with_literal(selector),
    );
    let sw = code.add_insn(IrInstruction::new(Opcode::Switch).with_src(0));
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid)); // BD (default)
    code.add_case_target(sw, 3);
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid)); // B3
    code.add_case_target(sw, 5);
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid)); // BX
    code
}

#[test]
fn test_s4_dead_switch_unique_case() {
    let mut code = switch_method(3);
    let stats = run(aggressive(), &WholeProgramState::new(), &mut code);

    assert_eq!(stats.branches_removed, 1);
    // The switch became a single goto.
    assert!(!code.iter_insns().any(|(_, i)| i.opcode().is_switch()));
    let gotos: Vec<_> = code
        .iter_insns()
        .filter(|(_, i)| i.opcode() == Opcode::Goto)
        .map(|(_, i)| i.id())
        .collect();
    assert_eq!(gotos.len(), 1);
    // Exactly one label remains: the promoted simple target of the goto.
    let targets: Vec<_> = code
        .items()
        .iter()
        .filter_map(|item| match item {
            IrItem::Target(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].kind, TargetKind::Simple);
    assert_eq!(targets[0].src, gotos[0]);
    // The dead case label was demoted, not removed.
    assert!(code
        .items()
        .iter()
        .any(|item| matches!(item, IrItem::Fallthrough)));
}

#[test]
fn test_s5_dead_switch_zero_cases() {
    // No case matches 7: the switch disappears, control falls through to
    // the default block.
    let mut code = switch_method(7);
    let stats = run(aggressive(), &WholeProgramState::new(), &mut code);

    assert_eq!(stats.branches_removed, 1);
    assert!(!code.iter_insns().any(|(_, i)| i.opcode().is_switch()));
    assert!(!code.iter_insns().any(|(_, i)| i.opcode() == Opcode::Goto));
    // Every case label is gone.
    assert!(!code
        .items()
        .iter()
        .any(|item| matches!(item, IrItem::Target(_))));
}

#[test]
fn test_switch_untouched_when_disabled() {
    let mut code = switch_method(3);
    let config = TransformConfig {
        remove_dead_switch: false,
        ..aggressive()
    };
    let stats = run(config, &WholeProgramState::new(), &mut code);
    assert_eq!(stats.branches_removed, 0);
    assert!(code.iter_insns().any(|(_, i)| i.opcode().is_switch()));
}

#[test]
fn test_switch_untouched_in_editable_mode() {
    // The label demotion only runs against a non-editable graph.
    let mut code = switch_method(3);
    let cfg = ControlFlowGraph::build_with_mode(&code, true);
    let wps = WholeProgramState::new();
    let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
    fixpoint.run(&code, ConstantEnvironment::top());
    let stats = Transform::new(aggressive(), test_resolver()).apply(&fixpoint, &wps, &mut code, &cfg);
    assert_eq!(stats.branches_removed, 0);
    assert!(code.iter_insns().any(|(_, i)| i.opcode().is_switch()));
}

#[test]
fn test_switch_with_unknown_selector_keeps_switch() {
    // v0 is an argument: unknown. The switch stays, but a case label in
    // the default block would still be pruned (none here).
    let mut code = IrCode::new(1, 1);
    let sw = code.add_insn(IrInstruction::new(Opcode::Switch).with_src(0));
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
    code.add_case_target(sw, 3);
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

    let stats = run(aggressive(), &WholeProgramState::new(), &mut code);
    assert_eq!(stats.branches_removed, 0);
    assert!(code.iter_insns().any(|(_, i)| i.opcode().is_switch()));
}

#[test]
fn test_property_idempotence() {
    // CPT(CPT(m)) == CPT(m) modulo statistics.
    let build = || {
        let mut code = IrCode::new(2, 0);
        code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(0));
        code.add_insn(IrInstruction::new(Opcode::Move).with_dest(1).with_src(0));
        let branch = code.add_insn(
            IrInstruction::new(Opcode::IfTestZ { op: IfOp::Eq }).with_src(1),
        );
        code.add_insn(
            IrInstruction::new(Opcode::Sput)
                .with_src(0)
                .with_field(field_f()),
        );
        code.add_target(branch);
        code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
        code
    };

    let mut once = build();
    let first = run(aggressive(), &WholeProgramState::new(), &mut once);
    assert!(first.materialized_consts > 0 || first.branches_removed > 0);

    let snapshot = render(&once);
    let second = run(aggressive(), &WholeProgramState::new(), &mut once);
    assert_eq!(second, TransformStats::default());
    assert_eq!(render(&once), snapshot);
}

#[test]
fn test_fold_through_div_and_store() {
    // const v0, 12; div-int/lit8 v0, 4 -> pseudo v1; sput v1, f
    // With f known to be 3 in the WPS, both the division folds and the
    // store is deleted in one application.
    let mut wps = WholeProgramState::new();
    wps.set_field_value(field_f(), ConstantValue::Signed(3));

    let mut code = IrCode::new(2, 0);
    code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(12));
    code.add_insn(
        IrInstruction::new(Opcode::BinopLit {
            op: dexopt::ir::LitOp::Div,
            width: dexopt::ir::LitWidth::Lit8,
        })
        .with_src(0)
        .with_literal(4),
    );
    code.add_insn(IrInstruction::new(Opcode::MoveResultPseudo).with_dest(1));
    code.add_insn(
        IrInstruction::new(Opcode::Sput)
            .with_src(1)
            .with_field(field_f()),
    );
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid));

    let stats = run(aggressive(), &wps, &mut code);
    assert_eq!(stats.materialized_consts, 1);
    assert_eq!(stats.redundant_puts_removed, 1);
    assert_eq!(
        render(&code),
        vec!["const v0 12", "const v1 3", "return-void"]
    );
}
