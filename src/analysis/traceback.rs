//! Backward operand resolution.
//!
//! Walking backward from a consumer, every instruction first gives back what it pushed and then
//! takes back what it popped. The producer of an operand is the instruction at which the running
//! balance drops to zero.
//!
//! Offsets count from the deepest operand: offset `0` of `call F(a, b)` is the producer of `a`,
//! offset `-1` the producer of `b`. Positive offsets reach values below the consumer's operands.

use crate::{
    analysis::{pop_count, push_count},
    assembly::{FlowType, Instruction},
    metadata::MethodDef,
};

/// Index of the instruction that produced operand `offset` of the instruction at `index`.
///
/// Returns `None` when the walk reaches the start of the body, steps over an unconditional
/// transfer (`br`, `leave`, `ret`, `throw`, `endfinally`) whose fallthrough can't be the
/// producer, or crosses a branch target while operands are still pending, since the stack there
/// merges values from several predecessors.
#[must_use]
pub fn trace_back(method: &MethodDef, index: usize, offset: i32) -> Option<usize> {
    let body = method.body.as_ref()?;
    let consumer = body.get(index)?;

    let mut pending = i64::try_from(pop_count(consumer, method)).ok()? + i64::from(offset);
    if pending <= 0 {
        return None;
    }

    let mut current = index;
    loop {
        if body.is_branch_target(current) {
            return None;
        }
        current = body.previous(current)?;
        let instruction = &body.instructions()[current];
        if ends_fallthrough(instruction) {
            return None;
        }

        pending -= i64::try_from(push_count(instruction)).ok()?;
        if pending <= 0 {
            return Some(current);
        }
        pending += i64::try_from(pop_count(instruction, method)).ok()?;
    }
}

/// Like [`trace_back`], but steps over numeric conversions so the caller sees the instruction
/// that produced the unconverted value.
#[must_use]
pub fn trace_back_skipping_conversions(
    method: &MethodDef,
    index: usize,
    offset: i32,
) -> Option<usize> {
    let body = method.body.as_ref()?;
    let mut producer = trace_back(method, index, offset)?;
    while body.get(producer)?.opcode.is_conversion() {
        producer = trace_back(method, producer, 0)?;
    }
    Some(producer)
}

fn ends_fallthrough(instruction: &Instruction) -> bool {
    matches!(
        instruction.opcode.flow(),
        FlowType::UnconditionalBranch
            | FlowType::Leave
            | FlowType::Return
            | FlowType::Throw
            | FlowType::EndFinally
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        assembly::{MethodBodyBuilder, OpCode, Operand},
        metadata::{MethodRef, MethodSig, Token, TypeRef},
        Result,
    };

    fn int32() -> TypeRef {
        TypeRef::corlib("System", "Int32")
    }

    fn method(builder: MethodBodyBuilder) -> Result<MethodDef> {
        Ok(MethodDef::new(
            Token::new(0x0600_0001),
            "M",
            MethodSig::static_method(TypeRef::void(), vec![int32(), int32()]),
        )
        .with_body(builder.build()?))
    }

    fn two_arg_call() -> MethodRef {
        MethodRef::new(
            TypeRef::new("Ns", "T"),
            "F",
            MethodSig::static_method(TypeRef::void(), vec![int32(), int32()]),
        )
    }

    #[test]
    fn test_operands_of_call() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit(OpCode::Ldarg1)?;
        b.emit(OpCode::LdcI4_2)?;
        b.emit(OpCode::Add)?;
        b.emit_call(OpCode::Call, two_arg_call())?;
        b.emit(OpCode::Ret)?;
        let m = method(b)?;

        assert_eq!(trace_back(&m, 4, 0), Some(0));
        assert_eq!(trace_back(&m, 4, -1), Some(3));
        assert_eq!(trace_back(&m, 3, 0), Some(1));
        assert_eq!(trace_back(&m, 3, -1), Some(2));
        assert_eq!(trace_back(&m, 4, -2), None);
        assert_eq!(trace_back(&m, 0, 0), None);
        Ok(())
    }

    #[test]
    fn test_skipping_conversions() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit(OpCode::ConvI8)?;
        b.emit(OpCode::ConvOvfI4)?;
        b.emit(OpCode::Ldarg1)?;
        b.emit(OpCode::Ceq)?;
        b.emit(OpCode::Pop)?;
        b.emit(OpCode::Ret)?;
        let m = method(b)?;

        assert_eq!(trace_back(&m, 4, 0), Some(2));
        assert_eq!(trace_back_skipping_conversions(&m, 4, 0), Some(0));
        assert_eq!(trace_back_skipping_conversions(&m, 4, -1), Some(3));
        Ok(())
    }

    #[test]
    fn test_stops_at_merges() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit_branch("brtrue.s", "one")?;
        b.emit(OpCode::LdcI4_0)?;
        b.emit_branch("br.s", "use")?;
        b.define_label("one")?;
        b.emit(OpCode::LdcI4_1)?;
        b.define_label("use")?;
        b.emit(OpCode::Pop)?;
        b.emit(OpCode::Ret)?;
        let m = method(b)?;

        // pop sits on a merge point
        assert_eq!(trace_back(&m, 5, 0), None);
        Ok(())
    }

    #[test]
    fn test_walks_over_conditional_fallthrough() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit(OpCode::Ldarg1)?;
        b.emit_branch("brtrue.s", "end")?;
        b.emit(OpCode::Pop)?;
        b.define_label("end")?;
        b.emit(OpCode::Ret)?;
        let m = method(b)?;

        assert_eq!(trace_back(&m, 3, 0), Some(0));
        assert_eq!(trace_back(&m, 2, 0), Some(1));
        Ok(())
    }

    #[test]
    fn test_unconditional_transfer() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit(OpCode::Throw)?;
        b.emit(OpCode::Pop)?;
        b.emit(OpCode::Ret)?;
        let m = method(b)?;
        assert_eq!(trace_back(&m, 2, 0), None);
        Ok(())
    }

    #[test]
    fn test_calli_pointer() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit(OpCode::Ldarg1)?;
        b.emit_with(
            OpCode::Calli,
            Operand::Signature(Arc::new(MethodSig::static_method(
                TypeRef::void(),
                vec![int32()],
            ))),
        )?;
        b.emit(OpCode::Ret)?;
        let m = method(b)?;
        assert_eq!(trace_back(&m, 2, 0), Some(0));
        assert_eq!(trace_back(&m, 2, -1), Some(1));
        Ok(())
    }
}
