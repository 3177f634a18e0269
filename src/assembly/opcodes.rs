//! CIL opcode identities and their static metadata (ECMA-335 Partition III).
//!
//! [`OpCode`] enumerates every opcode in encoding order, skipping the unassigned byte values,
//! so that its ordinal is a dense index in `0..OpCode::COUNT`. That ordinal is what
//! [`crate::analysis::OpCodeBitmask`] uses as bit position: `ldnull` is bit 20 and
//! `isinst` is bit 116.
//!
//! Each opcode carries an [`OpCodeInfo`] with its mnemonic, encoding, stack behavior,
//! control flow class and operand type. Stack behaviors that depend on a call signature are
//! marked [`StackPop::Variable`] / [`StackPush::Variable`] and resolved by
//! [`crate::analysis::pop_count`] and [`crate::analysis::push_count`].
#![allow(missing_docs)]

use std::{collections::HashMap, sync::OnceLock};

use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// How many values an opcode removes from the evaluation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPop {
    /// A fixed number of values
    Fixed(u8),
    /// Depends on the callee signature (calls) or on the enclosing method (`ret`)
    Variable,
}

/// How many values an opcode places on the evaluation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPush {
    /// A fixed number of values
    Fixed(u8),
    /// One value unless the callee returns `System.Void`
    Variable,
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method (or ends a filter block)
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally or fault block
    EndFinally,
    /// Leave protected region (try/catch/finally)
    Leave,
    /// Prefix modifying the following instruction
    Meta,
}

/// Types of operands for CIL instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    None,
    /// 8-bit integer (`ldc.i4.s`, `unaligned.`, `no.`)
    ShortInt,
    Int32,
    Int64,
    ShortFloat,
    Float,
    /// 8-bit relative branch target
    ShortBranchTarget,
    /// 32-bit relative branch target
    BranchTarget,
    /// Count followed by 32-bit relative targets
    Switch,
    /// 8-bit local or argument index
    ShortVariable,
    /// 16-bit local or argument index
    Variable,
    Method,
    Field,
    Type,
    /// Type, method or field token (`ldtoken`)
    Token,
    String,
    /// Stand-alone call site signature (`calli`)
    Signature,
}

impl OperandType {
    /// Encoded size of the operand in bytes. Switch tables add four bytes per target on top
    /// of the returned count field.
    #[must_use]
    pub const fn size(self) -> u32 {
        match self {
            OperandType::None => 0,
            OperandType::ShortInt | OperandType::ShortBranchTarget | OperandType::ShortVariable => {
                1
            }
            OperandType::Variable => 2,
            OperandType::Int64 | OperandType::Float => 8,
            _ => 4,
        }
    }
}

/// Static metadata of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCodeInfo {
    /// Canonical mnemonic, e.g. `"ldarg.s"`
    pub mnemonic: &'static str,
    /// Encoding; two-byte opcodes carry the `0xFE` prefix in the high byte
    pub encoding: u16,
    /// Values removed from the stack
    pub pops: StackPop,
    /// Values pushed on the stack
    pub pushes: StackPush,
    /// Control flow class
    pub flow: FlowType,
    /// Operand kind
    pub operand: OperandType,
}

const POP0: StackPop = StackPop::Fixed(0);
const POP1: StackPop = StackPop::Fixed(1);
const POP2: StackPop = StackPop::Fixed(2);
const POP3: StackPop = StackPop::Fixed(3);
const VARPOP: StackPop = StackPop::Variable;
const PUSH0: StackPush = StackPush::Fixed(0);
const PUSH1: StackPush = StackPush::Fixed(1);
const PUSH2: StackPush = StackPush::Fixed(2);
const VARPUSH: StackPush = StackPush::Variable;

macro_rules! opcodes {
    ($( $variant:ident = $mnemonic:literal, $encoding:literal, $pop:ident, $push:ident, $flow:ident, $operand:ident; )*) => {
        /// A CIL opcode, independent of its operand.
        ///
        /// Variants are declared in encoding order; the discriminant is the dense ordinal used
        /// as bit index by opcode bitmasks.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumCount, EnumIter,
        )]
        #[repr(u8)]
        pub enum OpCode {
            $( $variant, )*
        }

        static OPCODE_INFO: [OpCodeInfo; OpCode::COUNT] = [
            $( OpCodeInfo {
                mnemonic: $mnemonic,
                encoding: $encoding,
                pops: $pop,
                pushes: $push,
                flow: FlowType::$flow,
                operand: OperandType::$operand,
            }, )*
        ];
    };
}

opcodes! {
    // Misc
    Nop = "nop", 0x00, POP0, PUSH0, Sequential, None;
    Break = "break", 0x01, POP0, PUSH0, Sequential, None;

    // Load/store argument and local shorthand
    Ldarg0 = "ldarg.0", 0x02, POP0, PUSH1, Sequential, None;
    Ldarg1 = "ldarg.1", 0x03, POP0, PUSH1, Sequential, None;
    Ldarg2 = "ldarg.2", 0x04, POP0, PUSH1, Sequential, None;
    Ldarg3 = "ldarg.3", 0x05, POP0, PUSH1, Sequential, None;
    Ldloc0 = "ldloc.0", 0x06, POP0, PUSH1, Sequential, None;
    Ldloc1 = "ldloc.1", 0x07, POP0, PUSH1, Sequential, None;
    Ldloc2 = "ldloc.2", 0x08, POP0, PUSH1, Sequential, None;
    Ldloc3 = "ldloc.3", 0x09, POP0, PUSH1, Sequential, None;
    Stloc0 = "stloc.0", 0x0A, POP1, PUSH0, Sequential, None;
    Stloc1 = "stloc.1", 0x0B, POP1, PUSH0, Sequential, None;
    Stloc2 = "stloc.2", 0x0C, POP1, PUSH0, Sequential, None;
    Stloc3 = "stloc.3", 0x0D, POP1, PUSH0, Sequential, None;
    LdargS = "ldarg.s", 0x0E, POP0, PUSH1, Sequential, ShortVariable;
    LdargaS = "ldarga.s", 0x0F, POP0, PUSH1, Sequential, ShortVariable;
    StargS = "starg.s", 0x10, POP1, PUSH0, Sequential, ShortVariable;
    LdlocS = "ldloc.s", 0x11, POP0, PUSH1, Sequential, ShortVariable;
    LdlocaS = "ldloca.s", 0x12, POP0, PUSH1, Sequential, ShortVariable;
    StlocS = "stloc.s", 0x13, POP1, PUSH0, Sequential, ShortVariable;

    // Constants
    Ldnull = "ldnull", 0x14, POP0, PUSH1, Sequential, None;
    LdcI4M1 = "ldc.i4.m1", 0x15, POP0, PUSH1, Sequential, None;
    LdcI4_0 = "ldc.i4.0", 0x16, POP0, PUSH1, Sequential, None;
    LdcI4_1 = "ldc.i4.1", 0x17, POP0, PUSH1, Sequential, None;
    LdcI4_2 = "ldc.i4.2", 0x18, POP0, PUSH1, Sequential, None;
    LdcI4_3 = "ldc.i4.3", 0x19, POP0, PUSH1, Sequential, None;
    LdcI4_4 = "ldc.i4.4", 0x1A, POP0, PUSH1, Sequential, None;
    LdcI4_5 = "ldc.i4.5", 0x1B, POP0, PUSH1, Sequential, None;
    LdcI4_6 = "ldc.i4.6", 0x1C, POP0, PUSH1, Sequential, None;
    LdcI4_7 = "ldc.i4.7", 0x1D, POP0, PUSH1, Sequential, None;
    LdcI4_8 = "ldc.i4.8", 0x1E, POP0, PUSH1, Sequential, None;
    LdcI4S = "ldc.i4.s", 0x1F, POP0, PUSH1, Sequential, ShortInt;
    LdcI4 = "ldc.i4", 0x20, POP0, PUSH1, Sequential, Int32;
    LdcI8 = "ldc.i8", 0x21, POP0, PUSH1, Sequential, Int64;
    LdcR4 = "ldc.r4", 0x22, POP0, PUSH1, Sequential, ShortFloat;
    LdcR8 = "ldc.r8", 0x23, POP0, PUSH1, Sequential, Float;

    // Stack and calls
    Dup = "dup", 0x25, POP1, PUSH2, Sequential, None;
    Pop = "pop", 0x26, POP1, PUSH0, Sequential, None;
    Jmp = "jmp", 0x27, POP0, PUSH0, Call, Method;
    Call = "call", 0x28, VARPOP, VARPUSH, Call, Method;
    Calli = "calli", 0x29, VARPOP, VARPUSH, Call, Signature;
    Ret = "ret", 0x2A, VARPOP, PUSH0, Return, None;

    // Short branches
    BrS = "br.s", 0x2B, POP0, PUSH0, UnconditionalBranch, ShortBranchTarget;
    BrfalseS = "brfalse.s", 0x2C, POP1, PUSH0, ConditionalBranch, ShortBranchTarget;
    BrtrueS = "brtrue.s", 0x2D, POP1, PUSH0, ConditionalBranch, ShortBranchTarget;
    BeqS = "beq.s", 0x2E, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;
    BgeS = "bge.s", 0x2F, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;
    BgtS = "bgt.s", 0x30, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;
    BleS = "ble.s", 0x31, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;
    BltS = "blt.s", 0x32, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;
    BneUnS = "bne.un.s", 0x33, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;
    BgeUnS = "bge.un.s", 0x34, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;
    BgtUnS = "bgt.un.s", 0x35, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;
    BleUnS = "ble.un.s", 0x36, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;
    BltUnS = "blt.un.s", 0x37, POP2, PUSH0, ConditionalBranch, ShortBranchTarget;

    // Long branches
    Br = "br", 0x38, POP0, PUSH0, UnconditionalBranch, BranchTarget;
    Brfalse = "brfalse", 0x39, POP1, PUSH0, ConditionalBranch, BranchTarget;
    Brtrue = "brtrue", 0x3A, POP1, PUSH0, ConditionalBranch, BranchTarget;
    Beq = "beq", 0x3B, POP2, PUSH0, ConditionalBranch, BranchTarget;
    Bge = "bge", 0x3C, POP2, PUSH0, ConditionalBranch, BranchTarget;
    Bgt = "bgt", 0x3D, POP2, PUSH0, ConditionalBranch, BranchTarget;
    Ble = "ble", 0x3E, POP2, PUSH0, ConditionalBranch, BranchTarget;
    Blt = "blt", 0x3F, POP2, PUSH0, ConditionalBranch, BranchTarget;
    BneUn = "bne.un", 0x40, POP2, PUSH0, ConditionalBranch, BranchTarget;
    BgeUn = "bge.un", 0x41, POP2, PUSH0, ConditionalBranch, BranchTarget;
    BgtUn = "bgt.un", 0x42, POP2, PUSH0, ConditionalBranch, BranchTarget;
    BleUn = "ble.un", 0x43, POP2, PUSH0, ConditionalBranch, BranchTarget;
    BltUn = "blt.un", 0x44, POP2, PUSH0, ConditionalBranch, BranchTarget;
    Switch = "switch", 0x45, POP1, PUSH0, Switch, Switch;

    // Indirect loads and stores
    LdindI1 = "ldind.i1", 0x46, POP1, PUSH1, Sequential, None;
    LdindU1 = "ldind.u1", 0x47, POP1, PUSH1, Sequential, None;
    LdindI2 = "ldind.i2", 0x48, POP1, PUSH1, Sequential, None;
    LdindU2 = "ldind.u2", 0x49, POP1, PUSH1, Sequential, None;
    LdindI4 = "ldind.i4", 0x4A, POP1, PUSH1, Sequential, None;
    LdindU4 = "ldind.u4", 0x4B, POP1, PUSH1, Sequential, None;
    LdindI8 = "ldind.i8", 0x4C, POP1, PUSH1, Sequential, None;
    LdindI = "ldind.i", 0x4D, POP1, PUSH1, Sequential, None;
    LdindR4 = "ldind.r4", 0x4E, POP1, PUSH1, Sequential, None;
    LdindR8 = "ldind.r8", 0x4F, POP1, PUSH1, Sequential, None;
    LdindRef = "ldind.ref", 0x50, POP1, PUSH1, Sequential, None;
    StindRef = "stind.ref", 0x51, POP2, PUSH0, Sequential, None;
    StindI1 = "stind.i1", 0x52, POP2, PUSH0, Sequential, None;
    StindI2 = "stind.i2", 0x53, POP2, PUSH0, Sequential, None;
    StindI4 = "stind.i4", 0x54, POP2, PUSH0, Sequential, None;
    StindI8 = "stind.i8", 0x55, POP2, PUSH0, Sequential, None;
    StindR4 = "stind.r4", 0x56, POP2, PUSH0, Sequential, None;
    StindR8 = "stind.r8", 0x57, POP2, PUSH0, Sequential, None;

    // Arithmetic and bitwise
    Add = "add", 0x58, POP2, PUSH1, Sequential, None;
    Sub = "sub", 0x59, POP2, PUSH1, Sequential, None;
    Mul = "mul", 0x5A, POP2, PUSH1, Sequential, None;
    Div = "div", 0x5B, POP2, PUSH1, Sequential, None;
    DivUn = "div.un", 0x5C, POP2, PUSH1, Sequential, None;
    Rem = "rem", 0x5D, POP2, PUSH1, Sequential, None;
    RemUn = "rem.un", 0x5E, POP2, PUSH1, Sequential, None;
    And = "and", 0x5F, POP2, PUSH1, Sequential, None;
    Or = "or", 0x60, POP2, PUSH1, Sequential, None;
    Xor = "xor", 0x61, POP2, PUSH1, Sequential, None;
    Shl = "shl", 0x62, POP2, PUSH1, Sequential, None;
    Shr = "shr", 0x63, POP2, PUSH1, Sequential, None;
    ShrUn = "shr.un", 0x64, POP2, PUSH1, Sequential, None;
    Neg = "neg", 0x65, POP1, PUSH1, Sequential, None;
    Not = "not", 0x66, POP1, PUSH1, Sequential, None;

    // Conversions
    ConvI1 = "conv.i1", 0x67, POP1, PUSH1, Sequential, None;
    ConvI2 = "conv.i2", 0x68, POP1, PUSH1, Sequential, None;
    ConvI4 = "conv.i4", 0x69, POP1, PUSH1, Sequential, None;
    ConvI8 = "conv.i8", 0x6A, POP1, PUSH1, Sequential, None;
    ConvR4 = "conv.r4", 0x6B, POP1, PUSH1, Sequential, None;
    ConvR8 = "conv.r8", 0x6C, POP1, PUSH1, Sequential, None;
    ConvU4 = "conv.u4", 0x6D, POP1, PUSH1, Sequential, None;
    ConvU8 = "conv.u8", 0x6E, POP1, PUSH1, Sequential, None;

    // Object model
    Callvirt = "callvirt", 0x6F, VARPOP, VARPUSH, Call, Method;
    Cpobj = "cpobj", 0x70, POP2, PUSH0, Sequential, Type;
    Ldobj = "ldobj", 0x71, POP1, PUSH1, Sequential, Type;
    Ldstr = "ldstr", 0x72, POP0, PUSH1, Sequential, String;
    Newobj = "newobj", 0x73, VARPOP, PUSH1, Call, Method;
    Castclass = "castclass", 0x74, POP1, PUSH1, Sequential, Type;
    Isinst = "isinst", 0x75, POP1, PUSH1, Sequential, Type;
    ConvRUn = "conv.r.un", 0x76, POP1, PUSH1, Sequential, None;
    Unbox = "unbox", 0x79, POP1, PUSH1, Sequential, Type;
    Throw = "throw", 0x7A, POP1, PUSH0, Throw, None;
    Ldfld = "ldfld", 0x7B, POP1, PUSH1, Sequential, Field;
    Ldflda = "ldflda", 0x7C, POP1, PUSH1, Sequential, Field;
    Stfld = "stfld", 0x7D, POP2, PUSH0, Sequential, Field;
    Ldsfld = "ldsfld", 0x7E, POP0, PUSH1, Sequential, Field;
    Ldsflda = "ldsflda", 0x7F, POP0, PUSH1, Sequential, Field;
    Stsfld = "stsfld", 0x80, POP1, PUSH0, Sequential, Field;
    Stobj = "stobj", 0x81, POP2, PUSH0, Sequential, Type;

    // Checked unsigned conversions
    ConvOvfI1Un = "conv.ovf.i1.un", 0x82, POP1, PUSH1, Sequential, None;
    ConvOvfI2Un = "conv.ovf.i2.un", 0x83, POP1, PUSH1, Sequential, None;
    ConvOvfI4Un = "conv.ovf.i4.un", 0x84, POP1, PUSH1, Sequential, None;
    ConvOvfI8Un = "conv.ovf.i8.un", 0x85, POP1, PUSH1, Sequential, None;
    ConvOvfU1Un = "conv.ovf.u1.un", 0x86, POP1, PUSH1, Sequential, None;
    ConvOvfU2Un = "conv.ovf.u2.un", 0x87, POP1, PUSH1, Sequential, None;
    ConvOvfU4Un = "conv.ovf.u4.un", 0x88, POP1, PUSH1, Sequential, None;
    ConvOvfU8Un = "conv.ovf.u8.un", 0x89, POP1, PUSH1, Sequential, None;
    ConvOvfIUn = "conv.ovf.i.un", 0x8A, POP1, PUSH1, Sequential, None;
    ConvOvfUUn = "conv.ovf.u.un", 0x8B, POP1, PUSH1, Sequential, None;

    // Boxing and arrays
    Box = "box", 0x8C, POP1, PUSH1, Sequential, Type;
    Newarr = "newarr", 0x8D, POP1, PUSH1, Sequential, Type;
    Ldlen = "ldlen", 0x8E, POP1, PUSH1, Sequential, None;
    Ldelema = "ldelema", 0x8F, POP2, PUSH1, Sequential, Type;
    LdelemI1 = "ldelem.i1", 0x90, POP2, PUSH1, Sequential, None;
    LdelemU1 = "ldelem.u1", 0x91, POP2, PUSH1, Sequential, None;
    LdelemI2 = "ldelem.i2", 0x92, POP2, PUSH1, Sequential, None;
    LdelemU2 = "ldelem.u2", 0x93, POP2, PUSH1, Sequential, None;
    LdelemI4 = "ldelem.i4", 0x94, POP2, PUSH1, Sequential, None;
    LdelemU4 = "ldelem.u4", 0x95, POP2, PUSH1, Sequential, None;
    LdelemI8 = "ldelem.i8", 0x96, POP2, PUSH1, Sequential, None;
    LdelemI = "ldelem.i", 0x97, POP2, PUSH1, Sequential, None;
    LdelemR4 = "ldelem.r4", 0x98, POP2, PUSH1, Sequential, None;
    LdelemR8 = "ldelem.r8", 0x99, POP2, PUSH1, Sequential, None;
    LdelemRef = "ldelem.ref", 0x9A, POP2, PUSH1, Sequential, None;
    StelemI = "stelem.i", 0x9B, POP3, PUSH0, Sequential, None;
    StelemI1 = "stelem.i1", 0x9C, POP3, PUSH0, Sequential, None;
    StelemI2 = "stelem.i2", 0x9D, POP3, PUSH0, Sequential, None;
    StelemI4 = "stelem.i4", 0x9E, POP3, PUSH0, Sequential, None;
    StelemI8 = "stelem.i8", 0x9F, POP3, PUSH0, Sequential, None;
    StelemR4 = "stelem.r4", 0xA0, POP3, PUSH0, Sequential, None;
    StelemR8 = "stelem.r8", 0xA1, POP3, PUSH0, Sequential, None;
    StelemRef = "stelem.ref", 0xA2, POP3, PUSH0, Sequential, None;
    Ldelem = "ldelem", 0xA3, POP2, PUSH1, Sequential, Type;
    Stelem = "stelem", 0xA4, POP3, PUSH0, Sequential, Type;
    UnboxAny = "unbox.any", 0xA5, POP1, PUSH1, Sequential, Type;

    // Checked conversions
    ConvOvfI1 = "conv.ovf.i1", 0xB3, POP1, PUSH1, Sequential, None;
    ConvOvfU1 = "conv.ovf.u1", 0xB4, POP1, PUSH1, Sequential, None;
    ConvOvfI2 = "conv.ovf.i2", 0xB5, POP1, PUSH1, Sequential, None;
    ConvOvfU2 = "conv.ovf.u2", 0xB6, POP1, PUSH1, Sequential, None;
    ConvOvfI4 = "conv.ovf.i4", 0xB7, POP1, PUSH1, Sequential, None;
    ConvOvfU4 = "conv.ovf.u4", 0xB8, POP1, PUSH1, Sequential, None;
    ConvOvfI8 = "conv.ovf.i8", 0xB9, POP1, PUSH1, Sequential, None;
    ConvOvfU8 = "conv.ovf.u8", 0xBA, POP1, PUSH1, Sequential, None;
    Refanyval = "refanyval", 0xC2, POP1, PUSH1, Sequential, Type;
    Ckfinite = "ckfinite", 0xC3, POP1, PUSH1, Sequential, None;
    Mkrefany = "mkrefany", 0xC6, POP1, PUSH1, Sequential, Type;
    Ldtoken = "ldtoken", 0xD0, POP0, PUSH1, Sequential, Token;
    ConvU2 = "conv.u2", 0xD1, POP1, PUSH1, Sequential, None;
    ConvU1 = "conv.u1", 0xD2, POP1, PUSH1, Sequential, None;
    ConvI = "conv.i", 0xD3, POP1, PUSH1, Sequential, None;
    ConvOvfI = "conv.ovf.i", 0xD4, POP1, PUSH1, Sequential, None;
    ConvOvfU = "conv.ovf.u", 0xD5, POP1, PUSH1, Sequential, None;
    AddOvf = "add.ovf", 0xD6, POP2, PUSH1, Sequential, None;
    AddOvfUn = "add.ovf.un", 0xD7, POP2, PUSH1, Sequential, None;
    MulOvf = "mul.ovf", 0xD8, POP2, PUSH1, Sequential, None;
    MulOvfUn = "mul.ovf.un", 0xD9, POP2, PUSH1, Sequential, None;
    SubOvf = "sub.ovf", 0xDA, POP2, PUSH1, Sequential, None;
    SubOvfUn = "sub.ovf.un", 0xDB, POP2, PUSH1, Sequential, None;

    // Protected regions
    Endfinally = "endfinally", 0xDC, POP0, PUSH0, EndFinally, None;
    Leave = "leave", 0xDD, POP0, PUSH0, Leave, BranchTarget;
    LeaveS = "leave.s", 0xDE, POP0, PUSH0, Leave, ShortBranchTarget;
    StindI = "stind.i", 0xDF, POP2, PUSH0, Sequential, None;
    ConvU = "conv.u", 0xE0, POP1, PUSH1, Sequential, None;

    // Two-byte opcodes (0xFE prefix)
    Arglist = "arglist", 0xFE00, POP0, PUSH1, Sequential, None;
    Ceq = "ceq", 0xFE01, POP2, PUSH1, Sequential, None;
    Cgt = "cgt", 0xFE02, POP2, PUSH1, Sequential, None;
    CgtUn = "cgt.un", 0xFE03, POP2, PUSH1, Sequential, None;
    Clt = "clt", 0xFE04, POP2, PUSH1, Sequential, None;
    CltUn = "clt.un", 0xFE05, POP2, PUSH1, Sequential, None;
    Ldftn = "ldftn", 0xFE06, POP0, PUSH1, Sequential, Method;
    Ldvirtftn = "ldvirtftn", 0xFE07, POP1, PUSH1, Sequential, Method;
    Ldarg = "ldarg", 0xFE09, POP0, PUSH1, Sequential, Variable;
    Ldarga = "ldarga", 0xFE0A, POP0, PUSH1, Sequential, Variable;
    Starg = "starg", 0xFE0B, POP1, PUSH0, Sequential, Variable;
    Ldloc = "ldloc", 0xFE0C, POP0, PUSH1, Sequential, Variable;
    Ldloca = "ldloca", 0xFE0D, POP0, PUSH1, Sequential, Variable;
    Stloc = "stloc", 0xFE0E, POP1, PUSH0, Sequential, Variable;
    Localloc = "localloc", 0xFE0F, POP1, PUSH1, Sequential, None;
    Endfilter = "endfilter", 0xFE11, POP1, PUSH0, Return, None;
    Unaligned = "unaligned.", 0xFE12, POP0, PUSH0, Meta, ShortInt;
    Volatile = "volatile.", 0xFE13, POP0, PUSH0, Meta, None;
    Tail = "tail.", 0xFE14, POP0, PUSH0, Meta, None;
    Initobj = "initobj", 0xFE15, POP1, PUSH0, Sequential, Type;
    Constrained = "constrained.", 0xFE16, POP0, PUSH0, Meta, Type;
    Cpblk = "cpblk", 0xFE17, POP3, PUSH0, Sequential, None;
    Initblk = "initblk", 0xFE18, POP3, PUSH0, Sequential, None;
    No = "no.", 0xFE19, POP0, PUSH0, Meta, ShortInt;
    Rethrow = "rethrow", 0xFE1A, POP0, PUSH0, Throw, None;
    Sizeof = "sizeof", 0xFE1C, POP0, PUSH1, Sequential, Type;
    Refanytype = "refanytype", 0xFE1D, POP1, PUSH1, Sequential, None;
    Readonly = "readonly.", 0xFE1E, POP0, PUSH0, Meta, None;
}

static MNEMONIC_TO_OPCODE: OnceLock<HashMap<&'static str, OpCode>> = OnceLock::new();
static ENCODING_TO_OPCODE: OnceLock<HashMap<u16, OpCode>> = OnceLock::new();

impl OpCode {
    /// Static metadata of this opcode.
    #[must_use]
    pub fn info(self) -> &'static OpCodeInfo {
        &OPCODE_INFO[self as usize]
    }

    /// Dense ordinal, used as bit index in opcode bitmasks.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Opcode with the given dense ordinal.
    #[must_use]
    pub fn from_index(index: usize) -> Option<OpCode> {
        OpCode::iter().nth(index)
    }

    /// Looks up an opcode by its canonical mnemonic (`"ldarg.s"`, `"conv.ovf.i4.un"`).
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<OpCode> {
        MNEMONIC_TO_OPCODE
            .get_or_init(|| OpCode::iter().map(|op| (op.mnemonic(), op)).collect())
            .get(mnemonic)
            .copied()
    }

    /// Looks up an opcode by its encoding (`0x2A` for `ret`, `0xFE01` for `ceq`).
    #[must_use]
    pub fn from_encoding(encoding: u16) -> Option<OpCode> {
        ENCODING_TO_OPCODE
            .get_or_init(|| OpCode::iter().map(|op| (op.info().encoding, op)).collect())
            .get(&encoding)
            .copied()
    }

    /// Assembler mnemonic, e.g. `ldarg.0`.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    /// Control flow class.
    #[must_use]
    pub fn flow(self) -> FlowType {
        self.info().flow
    }

    /// Kind of inline operand.
    #[must_use]
    pub fn operand_type(self) -> OperandType {
        self.info().operand
    }

    /// Encoded size of the opcode itself, without operand.
    #[must_use]
    pub fn encoded_size(self) -> u32 {
        if self.info().encoding > 0xFF {
            2
        } else {
            1
        }
    }

    /// True for conditional, unconditional and switch branches. `leave` is not included.
    #[must_use]
    pub fn is_branch(self) -> bool {
        matches!(
            self.flow(),
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Switch
        )
    }

    /// True for `leave` and `leave.s`.
    #[must_use]
    pub fn is_leave(self) -> bool {
        self.flow() == FlowType::Leave
    }

    /// True for `call`, `calli`, `callvirt` and `newobj`.
    #[must_use]
    pub fn is_call(self) -> bool {
        matches!(
            self,
            OpCode::Call | OpCode::Calli | OpCode::Callvirt | OpCode::Newobj
        )
    }

    /// True for prefixes (`volatile.`, `tail.`, `constrained.`, ...).
    #[must_use]
    pub fn is_prefix(self) -> bool {
        self.flow() == FlowType::Meta
    }

    /// True for the `ldarg` family.
    #[must_use]
    pub fn is_load_argument(self) -> bool {
        matches!(
            self,
            OpCode::Ldarg0
                | OpCode::Ldarg1
                | OpCode::Ldarg2
                | OpCode::Ldarg3
                | OpCode::LdargS
                | OpCode::Ldarg
        )
    }

    /// True for `starg` and `starg.s`.
    #[must_use]
    pub fn is_store_argument(self) -> bool {
        matches!(self, OpCode::StargS | OpCode::Starg)
    }

    /// True for the `ldloc` family.
    #[must_use]
    pub fn is_load_local(self) -> bool {
        matches!(
            self,
            OpCode::Ldloc0
                | OpCode::Ldloc1
                | OpCode::Ldloc2
                | OpCode::Ldloc3
                | OpCode::LdlocS
                | OpCode::Ldloc
        )
    }

    /// True for the `stloc` family.
    #[must_use]
    pub fn is_store_local(self) -> bool {
        matches!(
            self,
            OpCode::Stloc0
                | OpCode::Stloc1
                | OpCode::Stloc2
                | OpCode::Stloc3
                | OpCode::StlocS
                | OpCode::Stloc
        )
    }

    /// Opcodes whose variable operand designates an argument slot.
    #[must_use]
    pub fn is_argument_access(self) -> bool {
        self.is_load_argument()
            || self.is_store_argument()
            || matches!(self, OpCode::LdargaS | OpCode::Ldarga)
    }

    /// Opcodes whose variable operand designates a local slot.
    #[must_use]
    pub fn is_local_access(self) -> bool {
        self.is_load_local()
            || self.is_store_local()
            || matches!(self, OpCode::LdlocaS | OpCode::Ldloca)
    }

    /// True for the `ldelem` family.
    #[must_use]
    pub fn is_load_element(self) -> bool {
        matches!(
            self,
            OpCode::Ldelem
                | OpCode::LdelemI
                | OpCode::LdelemI1
                | OpCode::LdelemI2
                | OpCode::LdelemI4
                | OpCode::LdelemI8
                | OpCode::LdelemR4
                | OpCode::LdelemR8
                | OpCode::LdelemRef
                | OpCode::LdelemU1
                | OpCode::LdelemU2
                | OpCode::LdelemU4
        )
    }

    /// True for the `ldind` family.
    #[must_use]
    pub fn is_load_indirect(self) -> bool {
        matches!(
            self,
            OpCode::LdindI
                | OpCode::LdindI1
                | OpCode::LdindI2
                | OpCode::LdindI4
                | OpCode::LdindI8
                | OpCode::LdindR4
                | OpCode::LdindR8
                | OpCode::LdindRef
                | OpCode::LdindU1
                | OpCode::LdindU2
                | OpCode::LdindU4
        )
    }

    /// True for the `stind` family.
    #[must_use]
    pub fn is_store_indirect(self) -> bool {
        matches!(
            self,
            OpCode::StindI
                | OpCode::StindI1
                | OpCode::StindI2
                | OpCode::StindI4
                | OpCode::StindI8
                | OpCode::StindR4
                | OpCode::StindR8
                | OpCode::StindRef
        )
    }

    /// Numeric conversions, checked or not. All of them pop one value and push one.
    #[must_use]
    pub fn is_conversion(self) -> bool {
        self.mnemonic().starts_with("conv.")
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
