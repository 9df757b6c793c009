//! Constant propagation transform benchmark.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use dexopt::analysis::{ConstantEnvironment, FixpointIterator, WholeProgramState};
use dexopt::ir::{
    ControlFlowGraph, IrCode, IrInstruction, LitOp, LitWidth, Opcode, Scope, ScopeResolver,
};
use dexopt::transform::{Transform, TransformConfig};

/// A straight-line method folding a long literal arithmetic chain.
fn chain_method(len: usize) -> IrCode {
    let mut code = IrCode::new(2, 0);
    code.add_insn(IrInstruction::new(Opcode::Const).with_dest(0).with_literal(1));
    for i in 0..len {
        let (dest, src) = if i % 2 == 0 { (1, 0) } else { (0, 1) };
        code.add_insn(
            IrInstruction::new(Opcode::BinopLit {
                op: LitOp::Add,
                width: LitWidth::Lit8,
            })
            .with_dest(dest)
            .with_src(src)
            .with_literal(3),
        );
    }
    code.add_insn(IrInstruction::new(Opcode::ReturnVoid));
    code
}

fn bench_transform(c: &mut Criterion) {
    let resolver = Arc::new(ScopeResolver::new(Arc::new(Scope::new(vec![]))));
    let config = TransformConfig {
        replace_moves_with_consts: true,
        remove_dead_switch: true,
        class_under_init: None,
    };

    c.bench_function("constant_propagation_chain_256", |b| {
        b.iter_batched(
            || chain_method(256),
            |mut code| {
                let cfg = ControlFlowGraph::build(&code);
                let wps = WholeProgramState::new();
                let mut fixpoint = FixpointIterator::new(&cfg, &code, &wps, None);
                fixpoint.run(&code, ConstantEnvironment::top());
                Transform::new(config.clone(), resolver.clone())
                    .apply(&fixpoint, &wps, &mut code, &cfg)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_transform);
criterion_main!(benches);
