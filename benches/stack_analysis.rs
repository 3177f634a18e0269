//! Benchmarks for the shared analyses.
//!
//! Measures, on a generated method with many branches and local round trips:
//! - Computing an opcode bitmask, cold and cached
//! - Tracing the usage of every `newobj` in the body
//! - Resolving every call operand with trace-back

extern crate dotcheck;

use criterion::{criterion_group, criterion_main, Criterion};
use dotcheck::{
    analysis::{trace_back, OpCodeEngine, StackEntryAnalysis},
    assembly::{MethodBodyBuilder, OpCode},
    metadata::{MethodDef, MethodRef, MethodSig, Token, TypeRef},
    Result,
};
use std::hint::black_box;

/// `blocks` repetitions of: create an object, park it in a local, branch on an argument, and
/// hand the object to one of two sinks.
fn generated_method(blocks: usize) -> Result<MethodDef> {
    let ctor = MethodRef::new(
        TypeRef::corlib("System", "Exception"),
        ".ctor",
        MethodSig::instance(TypeRef::void(), vec![]),
    );
    let sink = |name: &str| {
        MethodRef::new(
            TypeRef::new("Bench", "Sink"),
            name,
            MethodSig::static_method(TypeRef::void(), vec![TypeRef::object()]),
        )
    };

    let mut b = MethodBodyBuilder::new();
    let local = b.add_local(TypeRef::object(), Some("value"))?;
    for block in 0..blocks {
        let other = format!("other{block}");
        let next = format!("next{block}");
        b.emit_call(OpCode::Newobj, ctor.clone())?;
        b.emit_stloc(local)?;
        b.emit(OpCode::Ldarg0)?;
        b.emit_branch("brfalse", &other)?;
        b.emit_ldloc(local)?;
        b.emit_call(OpCode::Call, sink("Left"))?;
        b.emit_branch("br", &next)?;
        b.define_label(&other)?;
        b.emit_ldloc(local)?;
        b.emit_call(OpCode::Call, sink("Right"))?;
        b.define_label(&next)?;
    }
    b.emit(OpCode::Ret)?;

    Ok(MethodDef::new(
        Token::new(0x0600_0001),
        "Generated",
        MethodSig::static_method(TypeRef::void(), vec![TypeRef::object()]),
    )
    .with_body(b.build()?))
}

fn bench_bitmask(c: &mut Criterion) {
    let method = generated_method(200).unwrap();
    let engine = OpCodeEngine::new();

    c.bench_function("bitmask_cold", |b| {
        b.iter(|| {
            engine.reset_for_assembly();
            black_box(engine.bitmask(black_box(&method)))
        });
    });

    engine.bitmask(&method);
    c.bench_function("bitmask_cached", |b| {
        b.iter(|| black_box(engine.bitmask(black_box(&method))));
    });
}

fn bench_usage(c: &mut Criterion) {
    let method = generated_method(200).unwrap();
    let body = method.body.as_ref().unwrap();
    let producers: Vec<usize> = body
        .instructions()
        .iter()
        .enumerate()
        .filter(|(_, i)| i.opcode == OpCode::Newobj)
        .map(|(index, _)| index)
        .collect();

    c.bench_function("stack_entry_usage_newobj", |b| {
        b.iter(|| {
            let analysis = StackEntryAnalysis::new(&method);
            for &index in &producers {
                black_box(analysis.usage(black_box(index)));
            }
        });
    });
}

fn bench_trace_back(c: &mut Criterion) {
    let method = generated_method(200).unwrap();
    let body = method.body.as_ref().unwrap();
    let calls: Vec<usize> = body
        .instructions()
        .iter()
        .enumerate()
        .filter(|(_, i)| i.opcode == OpCode::Call)
        .map(|(index, _)| index)
        .collect();

    c.bench_function("trace_back_calls", |b| {
        b.iter(|| {
            for &index in &calls {
                black_box(trace_back(&method, black_box(index), 0));
            }
        });
    });
}

criterion_group!(benches, bench_bitmask, bench_usage, bench_trace_back);
criterion_main!(benches);
