//! Exceptions that are created but never thrown.

use crate::{
    analysis::{StackEntryAnalysis, StackEntryUsage},
    assembly::{MethodBody, OpCode},
    metadata::MethodDef,
    rules::{
        catalog::is_call_argument, Confidence, Rule, RuleContext, RuleResult, RuleScope, Severity,
    },
    Result,
};

/// Flags `newobj` of an exception type whose result is neither thrown, returned, stored
/// through a pointer nor handed to another method.
///
/// Creating an exception is expensive, and one that never escapes usually means a missing
/// `throw`. Calling a method on the exception (e.g. `ToString`) does not count as using it.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckNewExceptionWithoutThrowing;

impl CheckNewExceptionWithoutThrowing {
    fn is_used(body: &MethodBody, usage: &StackEntryUsage) -> bool {
        let Some(consumer) = body.get(usage.instruction) else {
            return false;
        };
        match consumer.opcode {
            OpCode::Throw | OpCode::Ret => true,
            op if op.is_store_indirect() => true,
            OpCode::Call | OpCode::Calli | OpCode::Callvirt | OpCode::Newobj => {
                is_call_argument(consumer, usage.stack_offset)
            }
            _ => false,
        }
    }
}

impl Rule for CheckNewExceptionWithoutThrowing {
    fn name(&self) -> &'static str {
        "CheckNewExceptionWithoutThrowing"
    }

    fn category(&self) -> &'static str {
        "BadPractice"
    }

    fn problem(&self) -> &'static str {
        "This method creates an exception that is never thrown nor returned to the caller."
    }

    fn solution(&self) -> &'static str {
        "Make sure the exception is required, throw it (if it is) or remove it (if not)."
    }

    fn scope(&self) -> RuleScope {
        RuleScope::METHOD
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
                .inherits(&constructor.declaring_type, "System", "Exception")
            {
                continue;
            }

            // new + throw
            let thrown_next = body
                .next(index)
                .and_then(|next| body.get(next))
                .is_some_and(|next| next.opcode == OpCode::Throw);
            if thrown_next {
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        assembly::{MethodBodyBuilder, Operand},
        metadata::{MethodRef, MethodSig, Token, TypeDef, TypeRef},
        rules::DefectTarget,
        test::{assembly_with, ctor, ctor_with, method, run_rule, sink, static_void, target_type},
    };

    const RULE: &str = "BadPractice.CheckNewExceptionWithoutThrowing";

    fn builder() -> MethodBodyBuilder {
        MethodBodyBuilder::new()
    }

    #[test]
    fn test_unused_exception_is_reported() -> Result<()> {
        let mut b = builder();
        b.mark_sequence_point("Target.cs", 12, 9);
        b.emit_call(OpCode::Newobj, ctor("System", "ArgumentException"))?;
        b.emit(OpCode::Pop)?;
        b.emit(OpCode::Ret)?;
        // System.ArgumentException is not loaded, so its base chain is unknown
        let mut b2 = builder();
        b2.emit_call(OpCode::Newobj, ctor("System", "Exception"))?;
        b2.emit(OpCode::Pop)?;
        b2.emit(OpCode::Ret)?;

        let assembly = assembly_with(
            "App",
            vec![target_type(vec![
                static_void("Unknown", b)?,
                static_void("Forgotten", b2)?,
            ])],
        );
        let report = run_rule(CheckNewExceptionWithoutThrowing, &[assembly]);

        assert_eq!(report.defects.len(), 1);
        let defect = &report.defects[0];
        assert_eq!(defect.rule, RULE);
        assert_eq!(
            defect.target,
            DefectTarget::Method("System.Void App.Target::Forgotten()".into())
        );
        assert_eq!(defect.severity, Severity::Critical);
        assert_eq!(defect.confidence, Confidence::High);
        assert_eq!(report.outcome_count(RULE, RuleResult::Failure), 1);
        assert_eq!(report.outcome_count(RULE, RuleResult::Success), 1);
        Ok(())
    }

    #[test]
    fn test_thrown_returned_or_passed() -> Result<()> {
        let mut thrown = builder();
        thrown.emit_call(OpCode::Newobj, ctor("System", "Exception"))?;
        thrown.emit(OpCode::Throw)?;

        let mut stored_then_thrown = builder();
        stored_then_thrown.add_local(TypeRef::corlib("System", "Exception"), None)?;
        stored_then_thrown.emit_call(OpCode::Newobj, ctor("System", "Exception"))?;
        stored_then_thrown.emit_stloc(0)?;
        stored_then_thrown.emit_ldloc(0)?;
        stored_then_thrown.emit(OpCode::Throw)?;

        let mut returned = builder();
        returned.emit_call(OpCode::Newobj, ctor("System", "Exception"))?;
        returned.emit(OpCode::Ret)?;

        let mut passed = builder();
        passed.emit_call(OpCode::Newobj, ctor("System", "Exception"))?;
        passed.emit_call(OpCode::Call, sink("Log"))?;
        passed.emit(OpCode::Ret)?;

        let mut wrapped = builder();
        wrapped.emit_with(OpCode::Ldstr, Operand::String("m".into()))?;
        wrapped.emit_call(OpCode::Newobj, ctor("System", "Exception"))?;
        wrapped.emit_call(
            OpCode::Newobj,
            ctor_with(
                TypeRef::corlib("System", "Exception"),
                vec![
                    TypeRef::corlib("System", "String"),
                    TypeRef::corlib("System", "Exception"),
                ],
            ),
        )?;
        wrapped.emit(OpCode::Throw)?;

        let exception = TypeRef::corlib("System", "Exception");
        let assembly = assembly_with(
            "App",
            vec![target_type(vec![
                static_void("Thrown", thrown)?,
                static_void("StoredThenThrown", stored_then_thrown)?,
                method(
                    "Returned",
                    MethodSig::static_method(exception, vec![]),
                    returned,
                )?,
                static_void("Passed", passed)?,
                static_void("Wrapped", wrapped)?,
            ])],
        );
        let report = run_rule(CheckNewExceptionWithoutThrowing, &[assembly]);
        assert!(report.defects.is_empty(), "{:?}", report.defects);
        assert_eq!(report.outcome_count(RULE, RuleResult::Success), 5);
        Ok(())
    }

    #[test]
    fn test_calli_arguments_sit_below_the_pointer() -> Result<()> {
        let signature = || {
            Operand::Signature(Arc::new(MethodSig::static_method(
                TypeRef::void(),
                vec![TypeRef::object()],
            )))
        };

        let mut passed = builder();
        passed.emit_call(OpCode::Newobj, ctor("System", "Exception"))?;
        passed.emit(OpCode::Ldarg0)?;
        passed.emit_with(OpCode::Calli, signature())?;
        passed.emit(OpCode::Ret)?;

        let mut as_pointer = builder();
        as_pointer.emit(OpCode::Ldarg0)?;
        as_pointer.emit_call(OpCode::Newobj, ctor("System", "Exception"))?;
        as_pointer.emit_with(OpCode::Calli, signature())?;
        as_pointer.emit(OpCode::Ret)?;

        let assembly = assembly_with(
            "App",
            vec![target_type(vec![
                static_void("Passed", passed)?,
                static_void("AsPointer", as_pointer)?,
            ])],
        );
        let report = run_rule(CheckNewExceptionWithoutThrowing, &[assembly]);
        assert_eq!(report.defects.len(), 1, "{:?}", report.defects);
        assert_eq!(report.defects[0].instruction, Some(1));
        assert_eq!(report.outcome_count(RULE, RuleResult::Success), 1);
        Ok(())
    }

    #[test]
    fn test_receiver_is_not_a_use() -> Result<()> {
        let to_string = MethodRef::new(
            TypeRef::object(),
            "ToString",
            MethodSig::instance(TypeRef::corlib("System", "String"), vec![]),
        );
        let mut b = builder();
        b.emit_call(OpCode::Newobj, ctor("System", "Exception"))?;
        b.emit_call(OpCode::Callvirt, to_string)?;
        b.emit(OpCode::Pop)?;
        b.emit(OpCode::Ret)?;

        let assembly = assembly_with("App", vec![target_type(vec![static_void("Describe", b)?])]);
        let report = run_rule(CheckNewExceptionWithoutThrowing, &[assembly]);
        assert_eq!(report.defects.len(), 1);
        assert_eq!(report.defects[0].instruction, Some(0));
        Ok(())
    }

    #[test]
    fn test_derived_exception_in_loaded_assembly() -> Result<()> {
        let mut custom = TypeDef::new(Token::new(0x0200_0003), "App", "CustomException");
        custom.base_type = Some(TypeRef::corlib("System", "Exception"));

        let mut b = builder();
        b.emit_call(OpCode::Newobj, ctor_with(TypeRef::new("App", "CustomException"), vec![]))?;
        b.emit(OpCode::Pop)?;
        b.emit(OpCode::Ret)?;

        let assembly = assembly_with(
            "App",
            vec![custom, target_type(vec![static_void("Forgotten", b)?])],
        );
        let report = run_rule(CheckNewExceptionWithoutThrowing, &[assembly]);
        assert_eq!(report.defects.len(), 1);
        Ok(())
    }

    #[test]
    fn test_does_not_apply_without_newobj() -> Result<()> {
        let mut b = builder();
        b.emit(OpCode::Ret)?;
        let assembly = assembly_with("App", vec![target_type(vec![static_void("Empty", b)?])]);
        let report = run_rule(CheckNewExceptionWithoutThrowing, &[assembly]);
        assert_eq!(report.outcome_count(RULE, RuleResult::DoesNotApply), 1);
        Ok(())
    }
}
