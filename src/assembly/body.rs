//! Method bodies as flat instruction arenas.
//!
//! Instructions are stored in execution order. `next` and `previous` are the neighbouring
//! indices, branch operands hold indices, and exception handler regions are half-open index
//! ranges. The body precomputes the set of instructions that are branch targets, which the
//! backward trace uses to notice where stack state from several predecessors merges.

use std::{collections::BTreeSet, ops::Range};

use bitflags::bitflags;

use crate::{
    assembly::instruction::{Instruction, SequencePoint},
    metadata::TypeRef,
    Error, Result,
};

bitflags! {
    /// Exception handler flags defining the type of exception handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause; `catch_type` names the caught type.
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause.
        const FILTER = 0x0001;
        /// A finally clause.
        const FINALLY = 0x0002;
        /// A fault clause (finally that executes only on exception).
        const FAULT = 0x0004;
    }
}

/// One try region and its handler.
#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    /// Kind of clause
    pub flags: ExceptionHandlerFlags,
    /// Protected instructions
    pub try_range: Range<usize>,
    /// Handler instructions
    pub handler_range: Range<usize>,
    /// First instruction of the filter block, for filter clauses
    pub filter_start: Option<usize>,
    /// Caught exception type, for typed clauses
    pub catch_type: Option<TypeRef>,
}

impl ExceptionHandler {
    /// Typed catch clause.
    #[must_use]
    pub fn is_catch(&self) -> bool {
        self.flags == ExceptionHandlerFlags::EXCEPTION
    }

    /// True for a filter handler.
    #[must_use]
    pub fn is_filter(&self) -> bool {
        self.flags.contains(ExceptionHandlerFlags::FILTER)
    }

    /// True for a `finally` handler.
    #[must_use]
    pub fn is_finally(&self) -> bool {
        self.flags.contains(ExceptionHandlerFlags::FINALLY)
    }

    /// True for a `fault` handler.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.flags.contains(ExceptionHandlerFlags::FAULT)
    }

    /// True if `index` lies in the protected region.
    #[must_use]
    pub fn covers(&self, index: usize) -> bool {
        self.try_range.contains(&index)
    }
}

/// A local variable slot.
#[derive(Debug, Clone)]
pub struct LocalVariable {
    /// Declared type
    pub local_type: TypeRef,
    /// Name from the debug symbols, if any
    pub name: Option<String>,
}

/// The IL body of a method.
#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    instructions: Vec<Instruction>,
    locals: Vec<LocalVariable>,
    exception_handlers: Vec<ExceptionHandler>,
    branch_targets: BTreeSet<usize>,
}

impl MethodBody {
    /// Creates a body after checking that every branch target and handler range lies inside
    /// the instruction arena.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] for a branch or switch target past the last instruction,
    /// and [`Error::Malformed`] for inverted or out-of-range handler regions.
    pub fn new(
        instructions: Vec<Instruction>,
        locals: Vec<LocalVariable>,
        exception_handlers: Vec<ExceptionHandler>,
    ) -> Result<Self> {
        let len = instructions.len();
        let mut branch_targets = BTreeSet::new();

        for instruction in &instructions {
            for target in instruction.targets() {
                if target >= len {
                    return Err(Error::OutOfBounds);
                }
                branch_targets.insert(target);
            }
        }

        for handler in &exception_handlers {
            for range in [&handler.try_range, &handler.handler_range] {
                if range.start > range.end || range.end > len {
                    return Err(malformed_error!(
                        "Exception handler region {}..{} outside of {} instructions",
                        range.start,
                        range.end,
                        len
                    ));
                }
            }
            if handler.filter_start.is_some_and(|start| start >= len) {
                return Err(malformed_error!("Filter start outside of the method body"));
            }
        }

        Ok(MethodBody {
            instructions,
            locals,
            exception_handlers,
            branch_targets,
        })
    }

    /// All instructions in order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Instruction at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if the body has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Index following `index`, `None` at the end of the body.
    #[must_use]
    pub fn next(&self, index: usize) -> Option<usize> {
        let next = index.checked_add(1)?;
        (next < self.instructions.len()).then_some(next)
    }

    /// Index preceding `index`, `None` at the start of the body.
    #[must_use]
    pub fn previous(&self, index: usize) -> Option<usize> {
        if index == 0 || index > self.instructions.len() {
            None
        } else {
            Some(index - 1)
        }
    }

    /// Indices targeted by a branch, switch or `leave`, in ascending order.
    pub fn branch_targets(&self) -> impl Iterator<Item = usize> + '_ {
        self.branch_targets.iter().copied()
    }

    /// True if some branch, switch or `leave` targets `index`.
    #[must_use]
    pub fn is_branch_target(&self, index: usize) -> bool {
        self.branch_targets.contains(&index)
    }

    /// Local variable slots.
    #[must_use]
    pub fn locals(&self) -> &[LocalVariable] {
        &self.locals
    }

    /// Exception handlers, innermost first as emitted.
    #[must_use]
    pub fn exception_handlers(&self) -> &[ExceptionHandler] {
        &self.exception_handlers
    }

    /// Handlers whose protected region contains `index`.
    pub fn handlers_covering(&self, index: usize) -> impl Iterator<Item = &ExceptionHandler> {
        self.exception_handlers
            .iter()
            .filter(move |h| h.covers(index))
    }

    /// Nearest sequence point at or before `index`.
    #[must_use]
    pub fn sequence_point_before(&self, index: usize) -> Option<&SequencePoint> {
        let end = index.saturating_add(1).min(self.instructions.len());
        self.instructions[..end]
            .iter()
            .rev()
            .find_map(|i| i.sequence_point.as_ref())
    }

    /// Index of the instruction at byte `offset`.
    #[must_use]
    pub fn index_of_offset(&self, offset: u32) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&offset, |i| i.offset)
            .ok()
    }
}
