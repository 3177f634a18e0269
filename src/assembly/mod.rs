//! CIL instruction model: opcodes, instructions, method bodies and a body builder.
//!
//! This module holds the part of the in-memory model that the analyses walk. A
//! [`MethodBody`] is a flat arena of [`Instruction`]s in which branches refer to other
//! instructions by index; [`OpCode`] carries the static stack behavior and flow class of every
//! CIL opcode.
//!
//! # Key Components
//!
//! - [`OpCode`] / [`OpCodeInfo`] - Opcode identities and static metadata
//! - [`Instruction`] / [`Operand`] - Decoded instructions
//! - [`MethodBody`] / [`ExceptionHandler`] - Instruction arenas with handler regions
//! - [`MethodBodyBuilder`] - Assembles bodies with labels and operand validation
//!
//! # Examples
//!
//! ```rust
//! use dotcheck::assembly::{MethodBodyBuilder, OpCode};
//!
//! let mut builder = MethodBodyBuilder::new();
//! builder.emit(OpCode::Ldnull)?;
//! builder.emit(OpCode::Pop)?;
//! builder.emit(OpCode::Ret)?;
//! let body = builder.build()?;
//!
//! assert_eq!(body.next(0), Some(1));
//! assert_eq!(body.instructions()[1].opcode.mnemonic(), "pop");
//! # Ok::<(), dotcheck::Error>(())
//! ```

mod body;
mod builder;
mod instruction;
mod opcodes;

pub use body::{ExceptionHandler, ExceptionHandlerFlags, LocalVariable, MethodBody};
pub use builder::MethodBodyBuilder;
pub use instruction::{Immediate, Instruction, Operand, SequencePoint};
pub use opcodes::{FlowType, OpCode, OpCodeInfo, OperandType, StackPop, StackPush};
