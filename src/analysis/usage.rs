//! Forward tracing of one evaluation stack entry.
//!
//! [`StackEntryAnalysis`] answers "which instructions consume the value pushed here". It does not
//! track values, only the distance between the traced entry and the top of the stack. A path
//! ends at the first instruction that pops deeper than that distance, and the pair
//! (instruction, distance) is the usage.
//!
//! Paths fork at conditional branches and switches, follow unconditional branches, and are
//! keyed by `(index, distance, leave stack)` so loops terminate. A few consumers are looked
//! through rather than reported:
//!
//! - `castclass` re-pushes the same reference, tracing continues after it.
//! - `pop` discards the value and is never a usage.
//! - `dup` on the entry itself forks into two tracked copies.
//! - `stloc` / `starg` park the value; tracing resumes after every later load of the slot
//!   that can still see the stored value.
//!
//! Field stores and stores through an argument address (`out` parameters) are reported as
//! usages and also followed to later loads of the same location in this method.
//!
//! Protected regions are only modeled for the slot search: a value still on the stack when
//! control enters a handler is not followed into it.

use std::collections::HashSet;

use crate::{
    analysis::{pop_count, push_count, trace_back},
    assembly::{FlowType, Instruction, MethodBody, OpCode},
    metadata::{FieldRefRc, MethodDef},
};

/// One consumer of a traced stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackEntryUsage {
    /// Index of the consuming instruction
    pub instruction: usize,
    /// Position of the entry among the consumer's operands, `0` being the top of the stack
    pub stack_offset: usize,
}

/// Position in the body plus the `leave` instructions whose finally blocks are being executed,
/// innermost last.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Cursor {
    index: usize,
    leaves: Vec<usize>,
}

impl Cursor {
    fn start(index: usize) -> Self {
        Cursor {
            index,
            leaves: Vec::new(),
        }
    }

    fn at(&self, index: usize) -> Self {
        Cursor {
            index,
            leaves: self.leaves.clone(),
        }
    }

    fn enter_finally(&self, handler: usize, leave: usize) -> Self {
        let mut leaves = self.leaves.clone();
        leaves.push(leave);
        Cursor {
            index: handler,
            leaves,
        }
    }

    /// Resumes at the target of the innermost pending `leave`.
    fn exit_finally(&self, body: &MethodBody) -> Option<Self> {
        let (&leave, outer) = self.leaves.split_last()?;
        Some(Cursor {
            index: body.get(leave)?.branch_target()?,
            leaves: outer.to_vec(),
        })
    }
}

/// Storage location a value can be parked in and loaded back from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StoreSlot {
    Local(u16),
    Argument(u16),
    Field(FieldRefRc),
    StaticField(FieldRefRc),
    /// Memory behind the address held by an argument
    Out(u16),
}

impl StoreSlot {
    fn is_temporary(&self) -> bool {
        matches!(self, StoreSlot::Local(_) | StoreSlot::Argument(_))
    }
}

/// Worklist that refuses entries it has already seen.
struct Worklist<T> {
    items: Vec<T>,
    seen: HashSet<T>,
}

impl<T: Clone + Eq + std::hash::Hash> Worklist<T> {
    fn new() -> Self {
        Worklist {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn add(&mut self, item: T) {
        if self.seen.insert(item.clone()) {
            self.items.push(item);
        }
    }

    fn get(&self, position: usize) -> Option<&T> {
        self.items.get(position)
    }
}

/// Successor of `instruction` on the fallthrough or jump path, plus the branch targets that
/// form alternative paths.
fn successors(
    body: &MethodBody,
    index: usize,
    instruction: &Instruction,
) -> (Option<usize>, Vec<usize>) {
    match instruction.opcode.flow() {
        FlowType::UnconditionalBranch | FlowType::Leave => {
            (instruction.branch_target(), Vec::new())
        }
        FlowType::ConditionalBranch | FlowType::Switch => {
            (body.next(index), instruction.targets())
        }
        FlowType::Sequential | FlowType::Call | FlowType::Meta => (body.next(index), Vec::new()),
        FlowType::Return | FlowType::Throw | FlowType::EndFinally => (None, Vec::new()),
    }
}

/// Forward stack entry tracer for one method.
///
/// # Examples
///
/// ```rust
/// use dotcheck::analysis::StackEntryAnalysis;
/// use dotcheck::assembly::{MethodBodyBuilder, OpCode};
/// use dotcheck::metadata::{MethodDef, MethodSig, Token, TypeRef};
///
/// let mut builder = MethodBodyBuilder::new();
/// builder.emit(OpCode::Ldnull)?;
/// builder.emit(OpCode::Ret)?;
/// let method = MethodDef::new(
///     Token::new(0x0600_0001),
///     "Get",
///     MethodSig::static_method(TypeRef::object(), vec![]),
/// )
/// .with_body(builder.build()?);
///
/// let usage = StackEntryAnalysis::new(&method).usage(0);
/// assert_eq!(usage.len(), 1);
/// assert_eq!(usage[0].instruction, 1);
/// # Ok::<(), dotcheck::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StackEntryAnalysis<'a> {
    method: &'a MethodDef,
}

impl<'a> StackEntryAnalysis<'a> {
    /// Creates a tracer over `method`'s body.
    #[must_use]
    pub fn new(method: &'a MethodDef) -> Self {
        StackEntryAnalysis { method }
    }

    /// The analyzed method.
    #[must_use]
    pub fn method(&self) -> &'a MethodDef {
        self.method
    }

    /// Every consumer of the single value pushed by the instruction at `index`.
    ///
    /// An empty result means no consumer could be identified, either because the value is
    /// discarded or because every path ran into something the tracer does not follow. Callers
    /// should treat it as inconclusive.
    #[must_use]
    pub fn usage(&self, index: usize) -> Vec<StackEntryUsage> {
        let Some(body) = self.method.body.as_ref() else {
            return Vec::new();
        };
        let Some(first) = body.next(index) else {
            return Vec::new();
        };

        let mut paths = Worklist::new();
        paths.add((Cursor::start(first), 0_usize));
        let mut consumers = HashSet::new();
        let mut usages = Vec::new();

        let mut position = 0;
        while let Some((cursor, distance)) = paths.get(position).cloned() {
            position += 1;
            tracing::trace!(
                "{}: entry of #{} followed from #{} at distance {}",
                self.method.name,
                index,
                cursor.index,
                distance
            );

            let Some((consumer, offset)) = self.follow(body, &cursor, distance, &mut paths) else {
                continue;
            };
            if !consumers.insert((consumer.clone(), offset)) {
                continue;
            }
            if self.look_through(body, &consumer, offset, &mut paths) {
                continue;
            }

            let usage = StackEntryUsage {
                instruction: consumer.index,
                stack_offset: offset,
            };
            if !usages.contains(&usage) {
                usages.push(usage);
            }
        }
        usages
    }

    /// Walks one path until an instruction pops the entry. Branches met on the way are queued
    /// as new paths. A path that reaches a `leave` is dropped, `leave` empties the stack.
    ///
    /// No instruction pushes more than one value net, so in valid IL the entry is never buried
    /// deeper than the body is long. A path going past that depth comes from a loop with an
    /// unbalanced stack and is dropped.
    fn follow(
        &self,
        body: &MethodBody,
        start: &Cursor,
        mut distance: usize,
        paths: &mut Worklist<(Cursor, usize)>,
    ) -> Option<(Cursor, usize)> {
        let mut index = start.index;
        loop {
            let instruction = body.get(index)?;
            if instruction.opcode.is_leave() {
                return None;
            }
            let pops = pop_count(instruction, self.method);
            if pops > distance {
                return Some((start.at(index), distance));
            }
            distance = distance - pops + push_count(instruction);
            if distance > body.len() {
                tracing::debug!(
                    "{}: dropping path at #{}, stack grows without bound",
                    self.method.name,
                    index
                );
                return None;
            }

            let (next, alternatives) = successors(body, index, instruction);
            let next = next?;
            let next_opcode = body.get(next)?.opcode;
            for target in alternatives {
                paths.add((start.at(target), distance));
            }
            if next_opcode.is_branch() {
                paths.add((start.at(next), distance));
                return None;
            }
            index = next;
        }
    }

    /// Queues the paths that continue past a consumer that only moves the value, and returns
    /// true if the consumer itself is not a usage.
    fn look_through(
        &self,
        body: &MethodBody,
        consumer: &Cursor,
        offset: usize,
        paths: &mut Worklist<(Cursor, usize)>,
    ) -> bool {
        let Some(instruction) = body.get(consumer.index) else {
            return true;
        };
        let next = body.next(consumer.index);

        match instruction.opcode {
            OpCode::Castclass => {
                if let Some(next) = next {
                    paths.add((consumer.at(next), 0));
                }
                true
            }
            OpCode::Pop => true,
            OpCode::Dup if offset == 0 => {
                if let Some(next) = next {
                    paths.add((consumer.at(next), 0));
                    paths.add((consumer.at(next), 1));
                }
                true
            }
            _ => {
                if offset != 0 {
                    return false;
                }
                let Some(slot) = self.store_slot(body, consumer.index) else {
                    return false;
                };
                if let Some(next) = next {
                    for load in self.find_loads(body, consumer.at(next), &slot) {
                        if let Some(after) = body.next(load.index) {
                            paths.add((load.at(after), 0));
                        }
                    }
                }
                slot.is_temporary()
            }
        }
    }

    /// Loads of `slot` reachable from `start` before the slot is overwritten.
    fn find_loads(&self, body: &MethodBody, start: Cursor, slot: &StoreSlot) -> Vec<Cursor> {
        let mut blocks = Worklist::new();
        blocks.add(start);
        let mut loads = Vec::new();

        let mut position = 0;
        while let Some(block) = blocks.get(position).cloned() {
            position += 1;
            let mut index = block.index;
            while let Some(instruction) = body.get(index) {
                if self.store_slot(body, index).as_ref() == Some(slot) {
                    break;
                }
                if self.load_slot(body, index).as_ref() == Some(slot) {
                    let load = block.at(index);
                    if !loads.contains(&load) {
                        loads.push(load);
                    }
                }

                for handler in body.handlers_covering(index).filter(|h| h.is_catch()) {
                    blocks.add(block.at(handler.handler_range.start));
                }

                if instruction.opcode.is_leave() {
                    match body.handlers_covering(index).find(|h| h.is_finally()) {
                        Some(finally) => {
                            blocks.add(block.enter_finally(finally.handler_range.start, index));
                        }
                        None => {
                            if let Some(target) = instruction.branch_target() {
                                blocks.add(block.at(target));
                            }
                        }
                    }
                    break;
                }
                if instruction.opcode == OpCode::Endfinally {
                    if let Some(resume) = block.exit_finally(body) {
                        blocks.add(resume);
                    }
                    break;
                }

                let (next, alternatives) = successors(body, index, instruction);
                let Some(next) = next else {
                    break;
                };
                for target in alternatives {
                    blocks.add(block.at(target));
                }
                if body.get(next).is_some_and(|i| i.opcode.is_branch()) {
                    blocks.add(block.at(next));
                    break;
                }
                index = next;
            }
        }
        loads
    }

    fn store_slot(&self, body: &MethodBody, index: usize) -> Option<StoreSlot> {
        let instruction = body.get(index)?;
        match instruction.opcode {
            op if op.is_store_local() => instruction.local_index().map(StoreSlot::Local),
            op if op.is_store_argument() => instruction.argument_index().map(StoreSlot::Argument),
            OpCode::Stfld => instruction.field().cloned().map(StoreSlot::Field),
            OpCode::Stsfld => instruction.field().cloned().map(StoreSlot::StaticField),
            op if op.is_store_indirect() => self.address_argument(body, index).map(StoreSlot::Out),
            _ => None,
        }
    }

    fn load_slot(&self, body: &MethodBody, index: usize) -> Option<StoreSlot> {
        let instruction = body.get(index)?;
        match instruction.opcode {
            op if op.is_load_local() => instruction.local_index().map(StoreSlot::Local),
            op if op.is_load_argument() => instruction.argument_index().map(StoreSlot::Argument),
            OpCode::Ldfld => instruction.field().cloned().map(StoreSlot::Field),
            OpCode::Ldsfld => instruction.field().cloned().map(StoreSlot::StaticField),
            op if op.is_load_indirect() => self.address_argument(body, index).map(StoreSlot::Out),
            _ => None,
        }
    }

    /// Argument slot whose value is the address operand of an indirect load or store.
    fn address_argument(&self, body: &MethodBody, index: usize) -> Option<u16> {
        let producer = trace_back(self.method, index, 0)?;
        let instruction = body.get(producer)?;
        if instruction.opcode.is_load_argument() {
            instruction.argument_index()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{ExceptionHandlerFlags, MethodBodyBuilder},
        metadata::{FieldRef, MethodRef, MethodSig, Token, TypeRef},
        Result,
    };

    fn exception_ctor() -> MethodRef {
        MethodRef::new(
            TypeRef::corlib("System", "Exception"),
            ".ctor",
            MethodSig::instance(TypeRef::void(), vec![]),
        )
    }

    fn consume(name: &str) -> MethodRef {
        MethodRef::new(
            TypeRef::new("App", "Sink"),
            name,
            MethodSig::static_method(TypeRef::void(), vec![TypeRef::object()]),
        )
    }

    fn method(sig: MethodSig, builder: MethodBodyBuilder) -> Result<MethodDef> {
        Ok(MethodDef::new(Token::new(0x0600_0001), "Target", sig).with_body(builder.build()?))
    }

    fn static_void(builder: MethodBodyBuilder) -> Result<MethodDef> {
        method(
            MethodSig::static_method(TypeRef::void(), vec![TypeRef::object()]),
            builder,
        )
    }

    fn usage_of(method: &MethodDef, index: usize) -> Vec<(usize, usize)> {
        StackEntryAnalysis::new(method)
            .usage(index)
            .into_iter()
            .map(|u| (u.instruction, u.stack_offset))
            .collect()
    }

    #[test]
    fn test_direct_argument() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit_call(OpCode::Call, consume("Use"))?;
        b.emit(OpCode::Ret)?;
        let m = static_void(b)?;
        assert_eq!(usage_of(&m, 0), vec![(1, 0)]);
        Ok(())
    }

    #[test]
    fn test_offset_below_top() -> Result<()> {
        let pair = MethodRef::new(
            TypeRef::new("App", "Sink"),
            "Pair",
            MethodSig::static_method(TypeRef::void(), vec![TypeRef::object(), TypeRef::object()]),
        );
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit(OpCode::Ldnull)?;
        b.emit_call(OpCode::Call, pair)?;
        b.emit(OpCode::Ret)?;
        let m = static_void(b)?;
        assert_eq!(usage_of(&m, 0), vec![(2, 1)]);
        assert_eq!(usage_of(&m, 1), vec![(2, 0)]);
        Ok(())
    }

    #[test]
    fn test_both_branches_reach_consumer() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit_branch("brtrue.s", "one")?;
        b.emit(OpCode::Ldnull)?;
        b.emit_branch("br.s", "use")?;
        b.define_label("one")?;
        b.emit(OpCode::Ldarg0)?;
        b.define_label("use")?;
        b.emit_call(OpCode::Call, consume("Use"))?;
        b.emit(OpCode::Ret)?;
        let m = static_void(b)?;

        assert_eq!(usage_of(&m, 0), vec![(1, 0)]);
        assert_eq!(usage_of(&m, 2), vec![(5, 0)]);
        assert_eq!(usage_of(&m, 4), vec![(5, 0)]);
        Ok(())
    }

    #[test]
    fn test_value_below_branch_condition_follows_both_paths() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldnull)?;
        b.emit(OpCode::Ldarg0)?;
        b.emit_branch("brfalse.s", "other")?;
        b.emit_call(OpCode::Call, consume("Use"))?;
        b.emit(OpCode::Ret)?;
        b.define_label("other")?;
        b.emit(OpCode::Throw)?;
        let m = static_void(b)?;

        let mut usage = usage_of(&m, 0);
        usage.sort_unstable();
        assert_eq!(usage, vec![(3, 0), (5, 0)]);
        Ok(())
    }

    #[test]
    fn test_local_store_and_reload() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.add_local(TypeRef::corlib("System", "Exception"), Some("e"))?;
        b.emit_call(OpCode::Newobj, exception_ctor())?;
        b.emit(OpCode::Stloc0)?;
        b.emit(OpCode::Ldloc0)?;
        b.emit(OpCode::Throw)?;
        let m = static_void(b)?;
        assert_eq!(usage_of(&m, 0), vec![(3, 0)]);
        Ok(())
    }

    #[test]
    fn test_overwritten_local_is_not_reloaded() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.add_local(TypeRef::object(), None)?;
        b.emit(OpCode::Ldarg0)?;
        b.emit(OpCode::Stloc0)?;
        b.emit(OpCode::Ldnull)?;
        b.emit(OpCode::Stloc0)?;
        b.emit(OpCode::Ldloc0)?;
        b.emit(OpCode::Throw)?;
        let m = static_void(b)?;
        assert!(usage_of(&m, 0).is_empty());
        assert_eq!(usage_of(&m, 2), vec![(5, 0)]);
        Ok(())
    }

    #[test]
    fn test_castclass_and_pop() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit_type(OpCode::Castclass, TypeRef::new("App", "Widget"))?;
        b.emit(OpCode::Pop)?;
        b.emit(OpCode::Ldarg0)?;
        b.emit_type(OpCode::Castclass, TypeRef::new("App", "Widget"))?;
        b.emit(OpCode::Ret)?;
        let m = method(
            MethodSig::static_method(TypeRef::object(), vec![TypeRef::object()]),
            b,
        )?;
        assert!(usage_of(&m, 0).is_empty());
        assert_eq!(usage_of(&m, 3), vec![(5, 0)]);
        Ok(())
    }

    #[test]
    fn test_dup_forks_two_copies() -> Result<()> {
        let start = MethodRef::new(
            TypeRef::new("App", "Job"),
            "Start",
            MethodSig::instance(TypeRef::void(), vec![]),
        );
        let mut b = MethodBodyBuilder::new();
        b.emit_call(OpCode::Newobj, exception_ctor())?;
        b.emit(OpCode::Dup)?;
        b.emit_call(OpCode::Callvirt, start)?;
        b.emit(OpCode::Throw)?;
        let m = static_void(b)?;
        assert_eq!(usage_of(&m, 0), vec![(2, 0), (3, 0)]);
        Ok(())
    }

    #[test]
    fn test_out_parameter_store() -> Result<()> {
        let by_ref = TypeRef::new("System", "Exception&");
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit_call(OpCode::Newobj, exception_ctor())?;
        b.emit(OpCode::StindRef)?;
        b.emit(OpCode::Ret)?;
        let m = method(MethodSig::static_method(TypeRef::void(), vec![by_ref]), b)?;
        assert_eq!(usage_of(&m, 1), vec![(2, 0)]);
        Ok(())
    }

    #[test]
    fn test_field_store_is_usage_and_followed() -> Result<()> {
        let field = FieldRef::new(
            TypeRef::new("App", "Holder"),
            "last",
            TypeRef::corlib("System", "Exception"),
        );
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldarg0)?;
        b.emit_call(OpCode::Newobj, exception_ctor())?;
        b.emit_field(OpCode::Stfld, field.clone())?;
        b.emit(OpCode::Ldarg0)?;
        b.emit_field(OpCode::Ldfld, field)?;
        b.emit(OpCode::Throw)?;
        let m = method(MethodSig::instance(TypeRef::void(), vec![]), b)?;
        assert_eq!(usage_of(&m, 1), vec![(2, 0), (5, 0)]);
        Ok(())
    }

    #[test]
    fn test_leave_drops_the_entry() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.define_label("try")?;
        b.emit_call(OpCode::Newobj, exception_ctor())?;
        b.emit_branch("leave.s", "end")?;
        b.define_label("handler")?;
        b.emit(OpCode::Pop)?;
        b.emit_branch("leave.s", "end")?;
        b.define_label("end")?;
        b.emit(OpCode::Ret)?;
        b.add_handler(
            ExceptionHandlerFlags::EXCEPTION,
            ("try", "handler"),
            ("handler", "end"),
            Some(TypeRef::corlib("System", "Exception")),
        );
        let m = static_void(b)?;
        assert!(usage_of(&m, 0).is_empty());
        Ok(())
    }

    #[test]
    fn test_unbalanced_loop_terminates() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.emit(OpCode::Ldnull)?;
        b.define_label("top")?;
        b.emit(OpCode::LdcI4_0)?;
        b.emit_branch("br.s", "top")?;
        let m = static_void(b)?;

        let (sender, receiver) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = sender.send(usage_of(&m, 0));
        });
        let usages = receiver
            .recv_timeout(std::time::Duration::from_secs(10))
            .map_err(|e| crate::Error::Error(e.to_string()))?;
        assert!(usages.is_empty());
        Ok(())
    }

    #[test]
    fn test_local_reloaded_in_finally_and_after() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.add_local(TypeRef::object(), None)?;
        b.emit(OpCode::Ldarg0)?;
        b.emit(OpCode::Stloc0)?;
        b.define_label("try")?;
        b.emit(OpCode::Nop)?;
        b.emit_branch("leave.s", "end")?;
        b.define_label("finally")?;
        b.emit(OpCode::Ldloc0)?;
        b.emit_call(OpCode::Call, consume("Log"))?;
        b.emit(OpCode::Endfinally)?;
        b.define_label("end")?;
        b.emit(OpCode::Ldloc0)?;
        b.emit(OpCode::Throw)?;
        b.add_handler(
            ExceptionHandlerFlags::FINALLY,
            ("try", "finally"),
            ("finally", "end"),
            None,
        );
        let m = static_void(b)?;
        assert_eq!(usage_of(&m, 0), vec![(5, 0), (8, 0)]);
        Ok(())
    }

    #[test]
    fn test_local_reloaded_in_catch() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.add_local(TypeRef::object(), None)?;
        b.emit(OpCode::Ldarg0)?;
        b.emit(OpCode::Stloc0)?;
        b.define_label("try")?;
        b.emit_call(
            OpCode::Call,
            MethodRef::new(
                TypeRef::new("App", "Sink"),
                "Risky",
                MethodSig::static_method(TypeRef::void(), vec![]),
            ),
        )?;
        b.emit_branch("leave.s", "end")?;
        b.define_label("catch")?;
        b.emit(OpCode::Pop)?;
        b.emit(OpCode::Ldloc0)?;
        b.emit(OpCode::Throw)?;
        b.define_label("end")?;
        b.emit(OpCode::Ret)?;
        b.add_handler(
            ExceptionHandlerFlags::EXCEPTION,
            ("try", "catch"),
            ("catch", "end"),
            Some(TypeRef::corlib("System", "Exception")),
        );
        let m = static_void(b)?;
        assert_eq!(usage_of(&m, 0), vec![(6, 0)]);
        Ok(())
    }

    #[test]
    fn test_loops_terminate() -> Result<()> {
        let mut b = MethodBodyBuilder::new();
        b.add_local(TypeRef::corlib("System", "Int32"), None)?;
        b.emit(OpCode::LdcI4_0)?;
        b.emit(OpCode::Stloc0)?;
        b.define_label("top")?;
        b.emit(OpCode::Ldloc0)?;
        b.emit_branch("brtrue.s", "top")?;
        b.emit(OpCode::Ret)?;
        let m = static_void(b)?;
        assert_eq!(usage_of(&m, 0), vec![(3, 0)]);
        Ok(())
    }

    #[test]
    fn test_last_instruction_and_bodyless() {
        let abstract_method = MethodDef::new(
            Token::new(0x0600_0002),
            "Abstract",
            MethodSig::instance(TypeRef::void(), vec![]),
        );
        assert!(StackEntryAnalysis::new(&abstract_method).usage(0).is_empty());
    }
}
