//! Reference rules.
//!
//! Each rule lives in its own module and is a plain struct implementing [`Rule`]. They double as
//! worked examples of the analyses in [`crate::analysis`]:
//!
//! - [`CheckNewExceptionWithoutThrowing`] - forward stack tracing from a `newobj`
//! - [`CheckNewThreadWithoutStart`] - the same, with a module-level activation hook
//! - [`AvoidNullCheckWithAsOperator`] - a peephole over `isinst` / `ldnull` sequences
//! - [`AvoidAssemblyVersionMismatch`] - an assembly-level attribute check
//!
//! # Examples
//!
//! ```rust
//! use dotcheck::prelude::*;
//! use dotcheck::rules::catalog::default_rules;
//!
//! let mut runner = Runner::new(RunnerConfig::default());
//! runner.add_rules(default_rules());
//! assert_eq!(runner.rules().count(), 4);
//! ```

use crate::{
    assembly::{Instruction, OpCode, Operand},
    rules::Rule,
};

mod new_exception;
mod new_thread;
mod null_check_as;
mod version_mismatch;

pub use new_exception::CheckNewExceptionWithoutThrowing;
pub use new_thread::CheckNewThreadWithoutStart;
pub use null_check_as::AvoidNullCheckWithAsOperator;
pub use version_mismatch::AvoidAssemblyVersionMismatch;

/// A fresh instance of every rule in the catalog.
#[must_use]
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(CheckNewExceptionWithoutThrowing),
        Box::new(CheckNewThreadWithoutStart::default()),
        Box::new(AvoidNullCheckWithAsOperator),
        Box::new(AvoidAssemblyVersionMismatch),
    ]
}

/// Declared parameter count of the callee of a call or `newobj`, receiver excluded.
///
/// A traced value sitting at a stack offset below this count is one of the arguments; at the
/// count itself it is the receiver of an instance call.
fn callee_parameter_count(instruction: &Instruction) -> Option<usize> {
    match &instruction.operand {
        Operand::Method(method) => Some(method.signature.param_count()),
        Operand::Signature(signature) => Some(signature.param_count()),
        _ => None,
    }
}

/// True if the value at `stack_offset` is passed as an argument to the call at `instruction`.
///
/// For `calli` the function pointer is on top of the stack, so the arguments start at offset 1.
fn is_call_argument(instruction: &Instruction, stack_offset: usize) -> bool {
    callee_parameter_count(instruction).is_some_and(|count| {
        if instruction.opcode == OpCode::Calli {
            (1..=count).contains(&stack_offset)
        } else {
            stack_offset < count
        }
    })
}
