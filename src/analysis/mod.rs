//! Stack and opcode analyses shared by all rules.
//!
//! Everything here is read-only over the model and never fails: when a question can't be
//! answered (a trace runs into a merge point, a body is missing) the answer is `None` or empty,
//! and rules treat that as "cannot confirm".
//!
//! # Architecture
//!
//! - [`OpCodeBitmask`] - Set of opcodes with word-parallel algebra, used as a pre-filter
//! - [`OpCodeEngine`] - Per-assembly cache of method bitmasks
//! - [`NamespaceEngine`] - Per-assembly namespace index
//! - [`pop_count`] / [`push_count`] - Stack effect of an instruction, calls included
//! - [`StackEntryAnalysis`] - Forward tracing from a producer to its consumers
//! - [`trace_back`] - Backward resolution from a consumer to an operand's producer
//!
//! # Usage
//!
//! ```rust
//! use dotcheck::analysis::{trace_back, OpCodeBitmask, OpCodeEngine, StackEntryAnalysis};
//! use dotcheck::assembly::{MethodBodyBuilder, OpCode};
//! use dotcheck::metadata::{MethodDef, MethodSig, Token, TypeRef};
//!
//! let mut builder = MethodBodyBuilder::new();
//! builder.emit(OpCode::Ldarg0)?;
//! builder.emit(OpCode::Ret)?;
//! let method = MethodDef::new(
//!     Token::new(0x0600_0001),
//!     "Identity",
//!     MethodSig::static_method(TypeRef::object(), vec![TypeRef::object()]),
//! )
//! .with_body(builder.build()?);
//!
//! let engine = OpCodeEngine::new();
//! let wanted = OpCodeBitmask::from_opcodes(&[OpCode::Ret]);
//! assert!(wanted.is_subset_of(&engine.bitmask(&method)));
//!
//! assert_eq!(StackEntryAnalysis::new(&method).usage(0)[0].instruction, 1);
//! assert_eq!(trace_back(&method, 1, 0), Some(0));
//! # Ok::<(), dotcheck::Error>(())
//! ```

mod bitmask;
mod engine;
mod stack;
mod traceback;
mod usage;

pub use bitmask::OpCodeBitmask;
pub use engine::{NamespaceEngine, OpCodeEngine};
pub use stack::{pop_count, push_count};
pub use traceback::{trace_back, trace_back_skipping_conversions};
pub use usage::{StackEntryAnalysis, StackEntryUsage};

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use crate::{
        analysis::{trace_back, OpCodeEngine, StackEntryAnalysis},
        assembly::{MethodBodyBuilder, OpCode},
        metadata::{MethodDef, MethodRef, MethodSig, Token, TypeRef},
        Result,
    };

    fn sink() -> MethodRef {
        MethodRef::new(
            TypeRef::new("App", "Sink"),
            "Take",
            MethodSig::static_method(TypeRef::void(), vec![TypeRef::object()]),
        )
    }

    #[test]
    fn test_forward_backward_duality() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldnull)?;
        b.emit_call(OpCode::Call, sink())?;
        b.emit(OpCode::Ret)?;
        let method = MethodDef::new(
            Token::new(0x0600_0001),
            "M",
            MethodSig::static_method(TypeRef::void(), vec![]),
        )
        .with_body(b.build()?);

        assert_eq!(trace_back(&method, 1, 0), Some(0));
        let usage = StackEntryAnalysis::new(&method).usage(0);
        assert_eq!(usage.len(), 1);
        assert_eq!((usage[0].instruction, usage[0].stack_offset), (1, 0));
        Ok(())
    }

    #[test]
    fn test_bitmask_reflects_every_instruction() -> Result<()> {
        let opcodes = [
            OpCode::Ldarg0,
            OpCode::Isinst,
            OpCode::Ldnull,
            OpCode::Ceq,
            OpCode::Ret,
        ];
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit_type(OpCode::Isinst, TypeRef::new("App", "Widget"))?;
        b.emit(OpCode::Ldnull)?;
        b.emit(OpCode::Ceq)?;
        b.emit(OpCode::Ret)?;
        let method = MethodDef::new(
            Token::new(0x0600_0002),
            "IsWidget",
            MethodSig::static_method(
                TypeRef::corlib("System", "Boolean"),
                vec![TypeRef::object()],
            ),
        )
        .with_body(b.build()?);

        let engine = OpCodeEngine::new();
        let mask = engine.bitmask(&method);
        for opcode in OpCode::iter() {
            assert_eq!(mask.get(opcode), opcodes.contains(&opcode), "{opcode}");
        }
        engine.reset_for_assembly();
        assert_eq!(engine.bitmask(&method), mask);
        Ok(())
    }
}
