//! Decoded CIL instructions and their operands.
//!
//! An [`Instruction`] is one element of a [`crate::assembly::MethodBody`] arena. Branch operands
//! are arena indices rather than byte offsets, so following a branch is an index lookup and the
//! stack analyses can key their visited sets on `(index, depth)`.
//!
//! Operands referring to metadata carry the reference itself ([`TypeRef`], [`MethodRef`],
//! [`FieldRef`]) instead of a token, which is everything the analyses need to compute the stack
//! effect of a call and everything rules need to identify a callee.

use std::{fmt, sync::Arc};

use crate::{
    assembly::opcodes::{OpCode, OperandType},
    metadata::{FieldRefRc, MethodRefRc, MethodSig, TypeRef},
};

/// Represents immediate values embedded in CIL instructions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Signed 8-bit immediate value
    Int8(i8),
    /// Unsigned 8-bit immediate value (`unaligned.`, `no.`)
    UInt8(u8),
    /// Signed 32-bit immediate value
    Int32(i32),
    /// Signed 64-bit immediate value
    Int64(i64),
    /// 32-bit floating point immediate value
    Float32(f32),
    /// 64-bit floating point immediate value
    Float64(f64),
}

impl Immediate {
    /// Integral value, `None` for floating point immediates.
    #[must_use]
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Immediate::Int8(v) => Some(i64::from(v)),
            Immediate::UInt8(v) => Some(i64::from(v)),
            Immediate::Int32(v) => Some(i64::from(v)),
            Immediate::Int64(v) => Some(v),
            Immediate::Float32(_) | Immediate::Float64(_) => None,
        }
    }
}

/// Represents an operand in a structured way.
#[derive(Debug, Clone)]
pub enum Operand {
    /// No operand present
    None,
    /// Immediate value (constant embedded in instruction)
    Immediate(Immediate),
    /// Branch target, as index into the instruction arena
    Target(usize),
    /// Switch table, as indices into the instruction arena
    Switch(Vec<usize>),
    /// Local variable index
    Local(u16),
    /// Method argument index; for instance methods 0 is `this`
    Argument(u16),
    /// String literal (`ldstr`)
    String(String),
    /// Type reference
    Type(TypeRef),
    /// Method reference (calls, `ldftn`, `newobj`)
    Method(MethodRefRc),
    /// Field reference
    Field(FieldRefRc),
    /// Stand-alone call site signature (`calli`)
    Signature(Arc<MethodSig>),
}

impl Operand {
    /// Short name of the operand kind, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::None => "none",
            Operand::Immediate(Immediate::Int8(_) | Immediate::UInt8(_)) => "int8",
            Operand::Immediate(Immediate::Int32(_)) => "int32",
            Operand::Immediate(Immediate::Int64(_)) => "int64",
            Operand::Immediate(Immediate::Float32(_)) => "float32",
            Operand::Immediate(Immediate::Float64(_)) => "float64",
            Operand::Target(_) => "branch target",
            Operand::Switch(_) => "switch table",
            Operand::Local(_) => "local",
            Operand::Argument(_) => "argument",
            Operand::String(_) => "string",
            Operand::Type(_) => "type",
            Operand::Method(_) => "method",
            Operand::Field(_) => "field",
            Operand::Signature(_) => "signature",
        }
    }

    /// Checks that this operand fits `opcode`.
    #[must_use]
    pub fn fits(&self, opcode: OpCode) -> bool {
        match (opcode.operand_type(), self) {
            (OperandType::None, Operand::None)
            | (
                OperandType::ShortInt,
                Operand::Immediate(Immediate::Int8(_) | Immediate::UInt8(_)),
            )
            | (OperandType::Int32, Operand::Immediate(Immediate::Int32(_)))
            | (OperandType::Int64, Operand::Immediate(Immediate::Int64(_)))
            | (OperandType::ShortFloat, Operand::Immediate(Immediate::Float32(_)))
            | (OperandType::Float, Operand::Immediate(Immediate::Float64(_)))
            | (
                OperandType::ShortBranchTarget | OperandType::BranchTarget,
                Operand::Target(_),
            )
            | (OperandType::Switch, Operand::Switch(_))
            | (OperandType::String, Operand::String(_))
            | (OperandType::Type, Operand::Type(_))
            | (OperandType::Method, Operand::Method(_))
            | (OperandType::Field, Operand::Field(_))
            | (
                OperandType::Token,
                Operand::Type(_) | Operand::Method(_) | Operand::Field(_),
            )
            | (OperandType::Signature, Operand::Signature(_)) => true,
            (OperandType::ShortVariable | OperandType::Variable, Operand::Local(_)) => {
                opcode.is_local_access()
            }
            (OperandType::ShortVariable | OperandType::Variable, Operand::Argument(_)) => {
                opcode.is_argument_access()
            }
            _ => false,
        }
    }
}

/// Source location attached to an instruction by the debug symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequencePoint {
    /// Source document path
    pub document: String,
    /// 1-based start line
    pub line: u32,
    /// 1-based start column
    pub column: u32,
}

impl fmt::Display for SequencePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.document, self.line, self.column)
    }
}

/// One CIL instruction.
#[derive(Clone)]
pub struct Instruction {
    /// Byte offset of the instruction within the method body
    pub offset: u32,
    /// Operation code
    pub opcode: OpCode,
    /// Operand, [`Operand::None`] for opcodes without one
    pub operand: Operand,
    /// Source location, if debug symbols provided one
    pub sequence_point: Option<SequencePoint>,
}

impl Instruction {
    /// Creates an instruction at `offset`.
    #[must_use]
    pub fn new(offset: u32, opcode: OpCode, operand: Operand) -> Self {
        Instruction {
            offset,
            opcode,
            operand,
            sequence_point: None,
        }
    }

    /// Encoded size in bytes, opcode plus operand.
    #[must_use]
    pub fn size(&self) -> u32 {
        let operand = match (&self.operand, self.opcode.operand_type()) {
            (Operand::Switch(targets), OperandType::Switch) => {
                4 + 4 * u32::try_from(targets.len()).unwrap_or(u32::MAX / 8)
            }
            (_, ty) => ty.size(),
        };
        self.opcode.encoded_size() + operand
    }

    /// Argument slot accessed by `ldarg*`, `ldarga*` and `starg*`, resolving short forms.
    #[must_use]
    pub fn argument_index(&self) -> Option<u16> {
        match self.opcode {
            OpCode::Ldarg0 => Some(0),
            OpCode::Ldarg1 => Some(1),
            OpCode::Ldarg2 => Some(2),
            OpCode::Ldarg3 => Some(3),
            op if op.is_argument_access() => match self.operand {
                Operand::Argument(index) => Some(index),
                _ => None,
            },
            _ => None,
        }
    }

    /// Local slot accessed by `ldloc*`, `ldloca*` and `stloc*`, resolving short forms.
    #[must_use]
    pub fn local_index(&self) -> Option<u16> {
        match self.opcode {
            OpCode::Ldloc0 | OpCode::Stloc0 => Some(0),
            OpCode::Ldloc1 | OpCode::Stloc1 => Some(1),
            OpCode::Ldloc2 | OpCode::Stloc2 => Some(2),
            OpCode::Ldloc3 | OpCode::Stloc3 => Some(3),
            op if op.is_local_access() => match self.operand {
                Operand::Local(index) => Some(index),
                _ => None,
            },
            _ => None,
        }
    }

    /// Integer pushed by `ldc.i4*` / `ldc.i8`, resolving short forms.
    #[must_use]
    pub fn constant(&self) -> Option<i64> {
        match self.opcode {
            OpCode::LdcI4M1 => Some(-1),
            OpCode::LdcI4_0 => Some(0),
            OpCode::LdcI4_1 => Some(1),
            OpCode::LdcI4_2 => Some(2),
            OpCode::LdcI4_3 => Some(3),
            OpCode::LdcI4_4 => Some(4),
            OpCode::LdcI4_5 => Some(5),
            OpCode::LdcI4_6 => Some(6),
            OpCode::LdcI4_7 => Some(7),
            OpCode::LdcI4_8 => Some(8),
            OpCode::LdcI4S | OpCode::LdcI4 | OpCode::LdcI8 => match self.operand {
                Operand::Immediate(imm) => imm.as_i64(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Callee of a call, `newobj`, `ldftn` or `jmp`.
    #[must_use]
    pub fn method(&self) -> Option<&MethodRefRc> {
        match &self.operand {
            Operand::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Field accessed by a field load or store.
    #[must_use]
    pub fn field(&self) -> Option<&FieldRefRc> {
        match &self.operand {
            Operand::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Type operand (`isinst`, `castclass`, `newarr`, ...).
    #[must_use]
    pub fn type_operand(&self) -> Option<&TypeRef> {
        match &self.operand {
            Operand::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Target of a single-target branch or `leave`.
    #[must_use]
    pub fn branch_target(&self) -> Option<usize> {
        match self.operand {
            Operand::Target(target) => Some(target),
            _ => None,
        }
    }

    /// Every arena index this instruction may transfer control to, fallthrough excluded.
    #[must_use]
    pub fn targets(&self) -> Vec<usize> {
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// True if both instructions have the same opcode and the same slot, constant or
    /// reference operand. Used to recognize "the same value loaded twice".
    #[must_use]
    pub fn same_load(&self, other: &Instruction) -> bool {
        if self.opcode != other.opcode {
            return false;
        }
        match (&self.operand, &other.operand) {
            (Operand::None, Operand::None) => true,
            (Operand::Local(a), Operand::Local(b))
            | (Operand::Argument(a), Operand::Argument(b)) => {
                a == b
            }
            (Operand::Immediate(a), Operand::Immediate(b)) => a == b,
            (Operand::String(a), Operand::String(b)) => a == b,
            (Operand::Field(a), Operand::Field(b)) => a == b,
            (Operand::Type(a), Operand::Type(b)) => a.is_same(b),
            (Operand::Method(a), Operand::Method(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {:<12}", self.offset, self.opcode.mnemonic())?;

        match &self.operand {
            Operand::None => {}
            Operand::Immediate(imm) => write!(f, " {imm:?}")?,
            Operand::Target(target) => write!(f, " -> #{target}")?,
            Operand::Switch(items) => {
                write!(f, " switch[{}]:(", items.len())?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "#{item}")?;
                }
                write!(f, ")")?;
            }
            Operand::Local(local) => write!(f, " V_{local}")?,
            Operand::Argument(arg) => write!(f, " A_{arg}")?,
            Operand::String(s) => write!(f, " {s:?}")?,
            Operand::Type(ty) => write!(f, " {ty}")?,
            Operand::Method(method) => write!(f, " {method}")?,
            Operand::Field(field) => write!(f, " {field}")?,
            Operand::Signature(sig) => write!(f, " {sig:?}")?,
        }

        if let Some(sp) = &self.sequence_point {
            write!(f, " | {sp}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.opcode)
    }
}
