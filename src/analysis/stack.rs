//! Static stack effect of an instruction.
//!
//! Most opcodes pop and push a fixed number of values. Calls depend on the callee signature
//! and `ret` depends on the enclosing method's return type; these are resolved here so the
//! forward and backward traces share one definition of "how deep is the stack".

use crate::{
    assembly::{Instruction, OpCode, Operand, StackPop, StackPush},
    metadata::{MethodDef, MethodSig},
};

/// Signature of the callee of a call instruction, if its operand carries one.
fn callee_signature(instruction: &Instruction) -> Option<&MethodSig> {
    match &instruction.operand {
        Operand::Method(method) => Some(&method.signature),
        Operand::Signature(signature) => Some(signature.as_ref()),
        _ => None,
    }
}

/// Number of values `instruction` pops, inside `method`.
///
/// Calls pop their declared parameters, plus the receiver for instance callees except for
/// `newobj`, which creates the receiver itself. `calli` also pops the function pointer. `ret`
/// pops one value unless `method` returns `System.Void`. A call whose operand carries no
/// signature pops nothing.
#[must_use]
pub fn pop_count(instruction: &Instruction, method: &MethodDef) -> usize {
    match instruction.opcode.info().pops {
        StackPop::Fixed(n) => usize::from(n),
        StackPop::Variable => match instruction.opcode {
            OpCode::Ret => usize::from(!method.signature.returns_void()),
            opcode => {
                let Some(signature) = callee_signature(instruction) else {
                    return 0;
                };
                let mut count = signature.param_count();
                if signature.has_this && opcode != OpCode::Newobj {
                    count += 1;
                }
                if opcode == OpCode::Calli {
                    count += 1;
                }
                count
            }
        },
    }
}

/// Number of values `instruction` pushes.
///
/// Calls push one value unless the callee returns `System.Void`.
#[must_use]
pub fn push_count(instruction: &Instruction) -> usize {
    match instruction.opcode.info().pushes {
        StackPush::Fixed(n) => usize::from(n),
        StackPush::Variable => {
            usize::from(callee_signature(instruction).is_some_and(|s| !s.returns_void()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::{MethodRef, Token, TypeRef};

    fn method(returns: TypeRef) -> MethodDef {
        MethodDef::new(
            Token::new(0x0600_0001),
            "M",
            MethodSig::instance(returns, vec![]),
        )
    }

    fn call(opcode: OpCode, sig: MethodSig) -> Instruction {
        Instruction::new(
            0,
            opcode,
            Operand::Method(Arc::new(MethodRef::new(TypeRef::new("Ns", "T"), "F", sig))),
        )
    }

    #[test]
    fn test_fixed_effects() {
        let m = method(TypeRef::void());
        let dup = Instruction::new(0, OpCode::Dup, Operand::None);
        assert_eq!((pop_count(&dup, &m), push_count(&dup)), (1, 2));
        let stelem = Instruction::new(0, OpCode::StelemRef, Operand::None);
        assert_eq!((pop_count(&stelem, &m), push_count(&stelem)), (3, 0));
    }

    #[test]
    fn test_ret_depends_on_method() {
        let ret = Instruction::new(0, OpCode::Ret, Operand::None);
        assert_eq!(pop_count(&ret, &method(TypeRef::void())), 0);
        assert_eq!(pop_count(&ret, &method(TypeRef::object())), 1);
    }

    #[test]
    fn test_call_effects() {
        let m = method(TypeRef::void());
        let int = TypeRef::corlib("System", "Int32");

        let instance = call(
            OpCode::Callvirt,
            MethodSig::instance(int.clone(), vec![int.clone(), int.clone()]),
        );
        assert_eq!((pop_count(&instance, &m), push_count(&instance)), (3, 1));

        let stat = call(OpCode::Call, MethodSig::static_method(TypeRef::void(), vec![int.clone()]));
        assert_eq!((pop_count(&stat, &m), push_count(&stat)), (1, 0));

        let ctor = call(
            OpCode::Newobj,
            MethodSig::instance(TypeRef::void(), vec![int.clone()]),
        );
        assert_eq!((pop_count(&ctor, &m), push_count(&ctor)), (1, 1));

        let indirect = Instruction::new(
            0,
            OpCode::Calli,
            Operand::Signature(Arc::new(MethodSig::static_method(int.clone(), vec![int]))),
        );
        assert_eq!((pop_count(&indirect, &m), push_count(&indirect)), (2, 1));
    }
}
