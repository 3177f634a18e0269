//! Threads that are created but never started.

use crate::{
    analysis::{StackEntryAnalysis, StackEntryUsage},
    assembly::{Instruction, MethodBody, OpCode},
    metadata::{Assembly, MethodDef, Module},
    rules::{
        catalog::is_call_argument, Confidence, Rule, RuleContext, RuleResult, RuleScope, Severity,
    },
    Result,
};

const THREADING: &str = "System.Threading";
const THREAD: &str = "Thread";

/// Flags `new Thread(...)` whose result is never started, returned, stored or handed to
/// another method.
///
/// Only modules that reference `System.Threading.Thread` (and the core library itself) are
/// inspected.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckNewThreadWithoutStart;

fn is_thread_start(instruction: &Instruction) -> bool {
    matches!(instruction.opcode, OpCode::Call | OpCode::Callvirt)
        && instruction.method().is_some_and(|callee| {
            callee.name == "Start" && callee.declaring_type.is_named(THREADING, THREAD)
        })
}

impl CheckNewThreadWithoutStart {
    fn is_used(body: &MethodBody, usage: &StackEntryUsage) -> bool {
        let Some(consumer) = body.get(usage.instruction) else {
            return false;
        };
        match consumer.opcode {
            OpCode::Ret | OpCode::Newobj | OpCode::Initobj | OpCode::Stfld => true,
            op if op.is_store_indirect() => true,
            OpCode::Call | OpCode::Callvirt => {
                is_call_argument(consumer, usage.stack_offset)
                    || consumer.method().is_some_and(|callee| callee.name == "Start")
            }
            _ => false,
        }
    }
}

impl Rule for CheckNewThreadWithoutStart {
    fn name(&self) -> &'static str {
        "CheckNewThreadWithoutStart"
    }

    fn category(&self) -> &'static str {
        "Concurrency"
    }

    fn problem(&self) -> &'static str {
        "This method creates a thread that is never started nor returned to the caller."
    }

    fn solution(&self) -> &'static str {
        "Make sure the thread is required, start it (if it is) or remove it (if not)."
    }

    fn scope(&self) -> RuleScope {
        RuleScope::METHOD
    }

    fn on_module(&mut self, assembly: &Assembly, module: &Module) -> bool {
        assembly.is_corlib() || module.references_type(THREADING, THREAD)
    }

    fn check_method(
        &mut self,
        ctx: &mut RuleContext<'_>,
        method: &MethodDef,
    ) -> Result<RuleResult> {
        let Some(body) = method.body.as_ref() else {
            return Ok(RuleResult::DoesNotApply);
        };
        if !ctx.bitmask(method).get(OpCode::Newobj) {
            return Ok(RuleResult::DoesNotApply);
        }

        let analysis = StackEntryAnalysis::new(method);
        for (index, instruction) in body.instructions().iter().enumerate() {
            if instruction.opcode != OpCode::Newobj {
                continue;
            }
            let Some(constructor) = instruction.method() else {
                continue;
            };
            if !ctx
                .resolver()
                .inherits(&constructor.declaring_type, THREADING, THREAD)
            {
                continue;
            }

            let started_next = body
                .next(index)
                .and_then(|next| body.get(next))
                .is_some_and(is_thread_start);
            if started_next {
                continue;
            }

            let used = analysis
                .usage(index)
                .iter()
                .any(|usage| Self::is_used(body, usage));
            if !used {
                ctx.report_instruction(method, index, Severity::Critical, Confidence::High, "");
            }
        }

        Ok(ctx.current_result())
    }
}
