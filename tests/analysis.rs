//! Integration tests for the shared analyses.
//!
//! These exercise the bitmask algebra, the per-method bitmask cache and the agreement between
//! forward stack tracing and trace-back on small hand-assembled bodies.

use dotcheck::prelude::*;
use strum::IntoEnumIterator;

fn sink(name: &str, arity: usize) -> MethodRef {
    MethodRef::new(
        TypeRef::new("App", "Sink"),
        name,
        MethodSig::static_method(TypeRef::void(), vec![TypeRef::object(); arity]),
    )
}

fn method(name: &str, arity: usize, builder: MethodBodyBuilder) -> Result<MethodDef> {
    Ok(MethodDef::new(
        Token::new(0x0600_0001),
        name,
        MethodSig::static_method(TypeRef::void(), vec![TypeRef::object(); arity]),
    )
    .with_body(builder.build()?))
}

fn usage(method: &MethodDef, index: usize) -> Vec<(usize, usize)> {
    let mut usage: Vec<_> = StackEntryAnalysis::new(method)
        .usage(index)
        .into_iter()
        .map(|u| (u.instruction, u.stack_offset))
        .collect();
    usage.sort_unstable();
    usage
}

/// A few opcode sets of different shapes, including the empty and the full set.
fn sample_masks() -> Vec<OpCodeBitmask> {
    vec![
        OpCodeBitmask::new(),
        OpCodeBitmask::ALL,
        OpCodeBitmask::CALLS,
        OpCodeBitmask::LOAD_LOCAL,
        OpCodeBitmask::from_opcodes(&[OpCode::Isinst, OpCode::Ldnull, OpCode::Ceq]),
        OpCode::iter().step_by(3).collect(),
        OpCode::iter().filter(|op| op.is_branch()).collect(),
    ]
}

#[test]
fn test_bitmask_algebra() {
    let masks = sample_masks();
    for a in &masks {
        assert!(a.is_subset_of(a));
        for b in &masks {
            let union = a.union(b);
            assert!(union.is_superset_of(a));
            assert!(union.is_superset_of(b));

            let shared = OpCode::iter().any(|op| a.get(op) && b.get(op));
            assert_eq!(a.intersect(b), shared, "{a} / {b}");
        }
    }
}

#[test]
fn test_engine_matches_body() -> Result<()> {
    let mut b = MethodBodyBuilder::new();
    b.emit(OpCode::Ldarg0)?;
    b.emit_branch("brfalse.s", "done")?;
    b.emit(OpCode::Ldarg0)?;
    b.emit_type(OpCode::Castclass, TypeRef::new("App", "Widget"))?;
    b.emit_call(OpCode::Call, sink("Use", 1))?;
    b.define_label("done")?;
    b.emit(OpCode::Ret)?;
    let m = method("Maybe", 1, b)?;

    let engine = OpCodeEngine::new();
    let mask = engine.bitmask(&m);
    let body = m.body.as_ref().map(MethodBody::instructions).unwrap_or_default();
    for opcode in OpCode::iter() {
        let present = body.iter().any(|i| i.opcode == opcode);
        assert_eq!(mask.get(opcode), present, "{opcode}");
    }
    assert_eq!(engine.len(), 1);

    engine.reset_for_assembly();
    assert!(engine.is_empty());
    assert_eq!(engine.bitmask(&m), mask);
    Ok(())
}

#[test]
fn test_forward_backward_duality() -> Result<()> {
    let mut b = MethodBodyBuilder::new();
    b.emit(OpCode::Ldarg0)?;
    b.emit(OpCode::Ldnull)?;
    b.emit_call(OpCode::Call, sink("Pair", 2))?;
    b.emit(OpCode::Ret)?;
    let m = method("Straight", 1, b)?;

    // trace-back counts from the deepest operand, usage offsets from the top of the stack
    assert_eq!(trace_back(&m, 2, 0), Some(0));
    assert_eq!(trace_back(&m, 2, -1), Some(1));
    assert_eq!(usage(&m, 0), vec![(2, 1)]);
    assert_eq!(usage(&m, 1), vec![(2, 0)]);

    let mut b = MethodBodyBuilder::new();
    b.emit(OpCode::Ldnull)?;
    b.emit_call(OpCode::Call, sink("Use", 1))?;
    b.emit(OpCode::Ret)?;
    let m = method("Single", 0, b)?;
    assert_eq!(trace_back(&m, 1, 0), Some(0));
    assert_eq!(usage(&m, 0), vec![(1, 0)]);
    Ok(())
}

#[test]
fn test_branch_aware_tracing() -> Result<()> {
    // ldarg; brtrue L1; ldnull; br L2; L1: ldarg; L2: <use>
    let mut b = MethodBodyBuilder::new();
    b.emit(OpCode::Ldarg0)?;
    b.emit_branch("brtrue.s", "l1")?;
    b.emit(OpCode::Ldnull)?;
    b.emit_branch("br.s", "l2")?;
    b.define_label("l1")?;
    b.emit(OpCode::Ldarg0)?;
    b.define_label("l2")?;
    b.emit_call(OpCode::Call, sink("Use", 1))?;
    b.emit(OpCode::Ret)?;
    let m = method("Select", 1, b)?;

    assert_eq!(usage(&m, 2), vec![(5, 0)]);
    assert_eq!(usage(&m, 4), vec![(5, 0)]);
    // Both producers merge at the use, so trace-back cannot pick one.
    assert_eq!(trace_back(&m, 5, 0), None);
    Ok(())
}

#[test]
fn test_value_across_branch_reaches_every_consumer() -> Result<()> {
    // ldnull; ldarg; brfalse L; call A; ret; L: call B; ret
    let mut b = MethodBodyBuilder::new();
    b.emit(OpCode::Ldnull)?;
    b.emit(OpCode::Ldarg0)?;
    b.emit_branch("brfalse.s", "other")?;
    b.emit_call(OpCode::Call, sink("A", 1))?;
    b.emit(OpCode::Ret)?;
    b.define_label("other")?;
    b.emit_call(OpCode::Call, sink("B", 1))?;
    b.emit(OpCode::Ret)?;
    let m = method("Fork", 1, b)?;

    assert_eq!(usage(&m, 0), vec![(3, 0), (5, 0)]);
    Ok(())
}
