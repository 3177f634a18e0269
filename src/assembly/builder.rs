//! Assembling method bodies from opcodes and labels.
//!
//! [`MethodBodyBuilder`] is the counterpart of a disassembler: it takes opcodes (or their
//! mnemonics) and operands, validates every operand against the opcode's [`OperandType`],
//! assigns byte offsets from the encodings, and resolves branch labels to arena indices when
//! the body is built.
//!
//! # Label Resolution
//!
//! ```rust
//! use dotcheck::assembly::MethodBodyBuilder;
//!
//! let mut builder = MethodBodyBuilder::new();
//!
//! builder.emit_instruction("ldarg.0", None)?;
//! builder.emit_branch("brfalse.s", "false_case")?;
//! builder.emit_instruction("ldc.i4.1", None)?;
//! builder.emit_branch("br.s", "end")?;
//!
//! builder.define_label("false_case")?;
//! builder.emit_instruction("ldc.i4.0", None)?;
//!
//! builder.define_label("end")?;
//! builder.emit_instruction("ret", None)?;
//!
//! let body = builder.build()?;
//! assert_eq!(body.len(), 6);
//! assert!(body.is_branch_target(4));
//! # Ok::<(), dotcheck::Error>(())
//! ```

use std::{collections::HashMap, sync::Arc};

use crate::{
    assembly::{
        body::{ExceptionHandler, ExceptionHandlerFlags, LocalVariable, MethodBody},
        instruction::{Immediate, Instruction, Operand, SequencePoint},
        opcodes::{FlowType, OpCode, OperandType},
    },
    metadata::{FieldRef, MethodRef, TypeRef},
    Error, Result,
};

/// Branch or switch whose labels are resolved at build time.
#[derive(Debug, Clone)]
struct LabelFixup {
    /// Index of the branch instruction
    instruction: usize,
    /// Target labels; one for branches, one per case for switches
    labels: Vec<String>,
}

/// Exception handler whose region boundaries are labels.
#[derive(Debug, Clone)]
struct HandlerFixup {
    flags: ExceptionHandlerFlags,
    try_labels: (String, String),
    handler_labels: (String, String),
    filter_label: Option<String>,
    catch_type: Option<TypeRef>,
}

/// Builds a [`MethodBody`] instruction by instruction.
///
/// Labels name the position of the next emitted instruction. A label placed after the last
/// instruction can close an exception handler region but cannot be branched to.
#[derive(Debug, Default)]
pub struct MethodBodyBuilder {
    instructions: Vec<Instruction>,
    locals: Vec<LocalVariable>,
    labels: HashMap<String, usize>,
    fixups: Vec<LabelFixup>,
    handlers: Vec<HandlerFixup>,
    next_offset: u32,
    pending_sequence_point: Option<SequencePoint>,
}

impl MethodBodyBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next emitted instruction will have.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.instructions.len()
    }

    /// Declares a local variable and returns its slot.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] beyond 65535 locals.
    pub fn add_local(&mut self, local_type: TypeRef, name: Option<&str>) -> Result<u16> {
        let slot = u16::try_from(self.locals.len())
            .map_err(|_| malformed_error!("Too many local variables"))?;
        self.locals.push(LocalVariable {
            local_type,
            name: name.map(str::to_string),
        });
        Ok(slot)
    }

    /// Attaches a source location to the next emitted instruction.
    pub fn mark_sequence_point(&mut self, document: &str, line: u32, column: u32) {
        self.pending_sequence_point = Some(SequencePoint {
            document: document.to_string(),
            line,
            column,
        });
    }

    /// Places a label at the current position.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateLabel`] if the name is already placed.
    pub fn define_label(&mut self, name: &str) -> Result<()> {
        if self.labels.contains_key(name) {
            return Err(Error::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name.to_string(), self.instructions.len());
        Ok(())
    }

    /// Emits an opcode that takes no operand.
    ///
    /// # Errors
    /// Returns [`Error::WrongOperandType`] if the opcode requires an operand.
    pub fn emit(&mut self, opcode: OpCode) -> Result<()> {
        self.emit_with(opcode, Operand::None)
    }

    /// Emits an opcode with an operand.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedOperand`] for an operand on an opcode that takes none and
    /// [`Error::WrongOperandType`] for an operand of the wrong kind.
    pub fn emit_with(&mut self, opcode: OpCode, operand: Operand) -> Result<()> {
        let expected = opcode.operand_type();
        if expected == OperandType::None && !matches!(operand, Operand::None) {
            return Err(Error::UnexpectedOperand);
        }
        if !operand.fits(opcode) {
            return Err(Error::WrongOperandType {
                expected: format!("{expected:?}"),
                actual: operand.kind().to_string(),
            });
        }
        self.push(opcode, operand);
        Ok(())
    }

    /// Emits an instruction by mnemonic.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMnemonic`] for an unknown mnemonic, otherwise the errors of
    /// [`MethodBodyBuilder::emit_with`].
    pub fn emit_instruction(&mut self, mnemonic: &str, operand: Option<Operand>) -> Result<()> {
        let opcode = OpCode::from_mnemonic(mnemonic)
            .ok_or_else(|| Error::InvalidMnemonic(mnemonic.to_string()))?;
        self.emit_with(opcode, operand.unwrap_or(Operand::None))
    }

    /// Emits a branch or `leave` to `label`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMnemonic`] for an unknown mnemonic and [`Error::InvalidBranch`]
    /// if the opcode does not take a single branch target.
    pub fn emit_branch(&mut self, mnemonic: &str, label: &str) -> Result<()> {
        let opcode = OpCode::from_mnemonic(mnemonic)
            .ok_or_else(|| Error::InvalidMnemonic(mnemonic.to_string()))?;
        self.emit_branch_op(opcode, label)
    }

    /// Emits a branch or `leave` opcode to `label`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBranch`] if the opcode does not take a single branch target.
    pub fn emit_branch_op(&mut self, opcode: OpCode, label: &str) -> Result<()> {
        if !matches!(
            opcode.flow(),
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Leave
        ) {
            return Err(Error::InvalidBranch(format!(
                "instruction '{opcode}' is not a branch instruction"
            )));
        }
        self.fixups.push(LabelFixup {
            instruction: self.instructions.len(),
            labels: vec![label.to_string()],
        });
        self.push(opcode, Operand::Target(0));
        Ok(())
    }

    /// Emits a `switch` jumping to one label per case.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBranch`] for an empty label list.
    pub fn emit_switch(&mut self, labels: &[&str]) -> Result<()> {
        if labels.is_empty() {
            return Err(Error::InvalidBranch(
                "switch must have at least one target".to_string(),
            ));
        }
        self.fixups.push(LabelFixup {
            instruction: self.instructions.len(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        });
        self.push(OpCode::Switch, Operand::Switch(vec![0; labels.len()]));
        Ok(())
    }

    /// Emits `call`, `callvirt` or `newobj` (or `ldftn`, `jmp`, ...) of `method`.
    ///
    /// # Errors
    /// Returns [`Error::WrongOperandType`] if the opcode does not take a method operand.
    pub fn emit_call(&mut self, opcode: OpCode, method: MethodRef) -> Result<()> {
        self.emit_with(opcode, Operand::Method(Arc::new(method)))
    }

    /// Emits a field access.
    ///
    /// # Errors
    /// Returns [`Error::WrongOperandType`] if the opcode does not take a field operand.
    pub fn emit_field(&mut self, opcode: OpCode, field: FieldRef) -> Result<()> {
        self.emit_with(opcode, Operand::Field(Arc::new(field)))
    }

    /// Emits an opcode taking a type operand (`isinst`, `castclass`, `newarr`, ...).
    ///
    /// # Errors
    /// Returns [`Error::WrongOperandType`] if the opcode does not take a type operand.
    pub fn emit_type(&mut self, opcode: OpCode, ty: TypeRef) -> Result<()> {
        self.emit_with(opcode, Operand::Type(ty))
    }

    /// Emits the shortest `ldarg` form for `index`.
    ///
    /// # Errors
    /// Never fails for valid indices; the `Result` mirrors the other emitters.
    pub fn emit_ldarg(&mut self, index: u16) -> Result<()> {
        match index {
            0 => self.emit(OpCode::Ldarg0),
            1 => self.emit(OpCode::Ldarg1),
            2 => self.emit(OpCode::Ldarg2),
            3 => self.emit(OpCode::Ldarg3),
            i if i <= 255 => self.emit_with(OpCode::LdargS, Operand::Argument(i)),
            i => self.emit_with(OpCode::Ldarg, Operand::Argument(i)),
        }
    }

    /// Emits the shortest `starg` form for `index`.
    ///
    /// # Errors
    /// Never fails for valid indices; the `Result` mirrors the other emitters.
    pub fn emit_starg(&mut self, index: u16) -> Result<()> {
        if index <= 255 {
            self.emit_with(OpCode::StargS, Operand::Argument(index))
        } else {
            self.emit_with(OpCode::Starg, Operand::Argument(index))
        }
    }

    /// Emits the shortest `ldloc` form for `index`.
    ///
    /// # Errors
    /// Never fails for valid indices; the `Result` mirrors the other emitters.
    pub fn emit_ldloc(&mut self, index: u16) -> Result<()> {
        match index {
            0 => self.emit(OpCode::Ldloc0),
            1 => self.emit(OpCode::Ldloc1),
            2 => self.emit(OpCode::Ldloc2),
            3 => self.emit(OpCode::Ldloc3),
            i if i <= 255 => self.emit_with(OpCode::LdlocS, Operand::Local(i)),
            i => self.emit_with(OpCode::Ldloc, Operand::Local(i)),
        }
    }

    /// Emits the shortest `stloc` form for `index`.
    ///
    /// # Errors
    /// Never fails for valid indices; the `Result` mirrors the other emitters.
    pub fn emit_stloc(&mut self, index: u16) -> Result<()> {
        match index {
            0 => self.emit(OpCode::Stloc0),
            1 => self.emit(OpCode::Stloc1),
            2 => self.emit(OpCode::Stloc2),
            3 => self.emit(OpCode::Stloc3),
            i if i <= 255 => self.emit_with(OpCode::StlocS, Operand::Local(i)),
            i => self.emit_with(OpCode::Stloc, Operand::Local(i)),
        }
    }

    /// Emits the shortest `ldc.i4` form for `value`.
    ///
    /// # Errors
    /// Never fails; the `Result` mirrors the other emitters.
    pub fn emit_ldc_i4(&mut self, value: i32) -> Result<()> {
        let opcode = match value {
            -1 => OpCode::LdcI4M1,
            0 => OpCode::LdcI4_0,
            1 => OpCode::LdcI4_1,
            2 => OpCode::LdcI4_2,
            3 => OpCode::LdcI4_3,
            4 => OpCode::LdcI4_4,
            5 => OpCode::LdcI4_5,
            6 => OpCode::LdcI4_6,
            7 => OpCode::LdcI4_7,
            8 => OpCode::LdcI4_8,
            v => {
                return match i8::try_from(v) {
                    Ok(short) => {
                        self.emit_with(OpCode::LdcI4S, Operand::Immediate(Immediate::Int8(short)))
                    }
                    Err(_) => {
                        self.emit_with(OpCode::LdcI4, Operand::Immediate(Immediate::Int32(v)))
                    }
                }
            }
        };
        self.emit(opcode)
    }

    /// Registers a handler whose regions are delimited by labels (start inclusive, end
    /// exclusive).
    pub fn add_handler(
        &mut self,
        flags: ExceptionHandlerFlags,
        try_labels: (&str, &str),
        handler_labels: (&str, &str),
        catch_type: Option<TypeRef>,
    ) {
        self.handlers.push(HandlerFixup {
            flags,
            try_labels: (try_labels.0.to_string(), try_labels.1.to_string()),
            handler_labels: (handler_labels.0.to_string(), handler_labels.1.to_string()),
            filter_label: None,
            catch_type,
        });
    }

    /// Registers a filter handler; `filter_label` marks the first filter instruction.
    pub fn add_filter_handler(
        &mut self,
        try_labels: (&str, &str),
        filter_label: &str,
        handler_labels: (&str, &str),
    ) {
        self.handlers.push(HandlerFixup {
            flags: ExceptionHandlerFlags::FILTER,
            try_labels: (try_labels.0.to_string(), try_labels.1.to_string()),
            handler_labels: (handler_labels.0.to_string(), handler_labels.1.to_string()),
            filter_label: Some(filter_label.to_string()),
            catch_type: None,
        });
    }

    /// Resolves labels and produces the body.
    ///
    /// # Errors
    /// Returns [`Error::UndefinedLabel`] for a label that was never placed, and the errors of
    /// [`MethodBody::new`] for targets past the last instruction.
    pub fn build(mut self) -> Result<MethodBody> {
        for fixup in std::mem::take(&mut self.fixups) {
            let targets = fixup
                .labels
                .iter()
                .map(|label| self.resolve(label))
                .collect::<Result<Vec<usize>>>()?;

            let instruction = self
                .instructions
                .get_mut(fixup.instruction)
                .ok_or(Error::OutOfBounds)?;
            instruction.operand = match instruction.operand {
                Operand::Switch(_) => Operand::Switch(targets),
                _ => Operand::Target(targets.first().copied().ok_or(Error::OutOfBounds)?),
            };
        }

        let mut handlers = Vec::with_capacity(self.handlers.len());
        for fixup in &self.handlers {
            handlers.push(ExceptionHandler {
                flags: fixup.flags,
                try_range: self.resolve(&fixup.try_labels.0)?..self.resolve(&fixup.try_labels.1)?,
                handler_range: self.resolve(&fixup.handler_labels.0)?
                    ..self.resolve(&fixup.handler_labels.1)?,
                filter_start: fixup
                    .filter_label
                    .as_deref()
                    .map(|label| self.resolve(label))
                    .transpose()?,
                catch_type: fixup.catch_type.clone(),
            });
        }

        MethodBody::new(self.instructions, self.locals, handlers)
    }

    fn resolve(&self, label: &str) -> Result<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| Error::UndefinedLabel(label.to_string()))
    }

    fn push(&mut self, opcode: OpCode, operand: Operand) {
        let mut instruction = Instruction::new(self.next_offset, opcode, operand);
        instruction.sequence_point = self.pending_sequence_point.take();
        self.next_offset = self.next_offset.saturating_add(instruction.size());
        self.instructions.push(instruction);
    }
}
