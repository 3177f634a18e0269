//! Null checks in front of `isinst`.

use crate::{
    analysis::OpCodeBitmask,
    assembly::{FlowType, MethodBody, OpCode},
    metadata::MethodDef,
    rules::{Confidence, Rule, RuleContext, RuleResult, RuleScope, Severity},
    Result,
};

/// Flags a null check of a value that is immediately followed by `isinst` on the same value.
///
/// `isinst` already yields `null` for a `null` input, so `x == null ? null : x as T` is just
/// `x as T`. Both branch polarities the C# compiler emits are recognized:
///
/// ```text
/// ldarg.1; brfalse L; ldarg.1; isinst T; br E; L: ldnull; E: ...
/// ldarg.1; brtrue  L; ldnull; br E; L: ldarg.1; isinst T; E: ...
/// ```
///
/// A conditional branch right after the `isinst` means the result is itself being tested,
/// which is a type check rather than a conversion, and is not reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct AvoidNullCheckWithAsOperator;

const REQUIRED: OpCodeBitmask = OpCodeBitmask::from_opcodes(&[OpCode::Isinst, OpCode::Ldnull]);

impl AvoidNullCheckWithAsOperator {
    /// `load; brfalse L; load; isinst; ...; L: ldnull`
    fn false_branch(body: &MethodBody, index: usize) -> bool {
        let (Some(previous), Some(next), Some(target)) = (
            body.previous(index).and_then(|i| body.get(i)),
            body.next(index).and_then(|i| body.get(i)),
            body.get(index).and_then(|i| i.branch_target()),
        ) else {
            return false;
        };
        if !next.same_load(previous) {
            return false;
        }
        if body.get(target).map(|t| t.opcode) != Some(OpCode::Ldnull) {
            return false;
        }
        body.next(index)
            .and_then(|next| body.next(next))
            .is_some_and(|isinst| Self::is_conversion(body, isinst))
    }

    /// `load; brtrue L; ldnull; ...; L: load; isinst`
    fn true_branch(body: &MethodBody, index: usize) -> bool {
        let (Some(previous), Some(next), Some(target)) = (
            body.previous(index).and_then(|i| body.get(i)),
            body.next(index).and_then(|i| body.get(i)),
            body.get(index).and_then(|i| i.branch_target()),
        ) else {
            return false;
        };
        if next.opcode != OpCode::Ldnull {
            return false;
        }
        if !body.get(target).is_some_and(|load| load.same_load(previous)) {
            return false;
        }
        body.next(target)
            .is_some_and(|isinst| Self::is_conversion(body, isinst))
    }

    fn is_conversion(body: &MethodBody, index: usize) -> bool {
        if body.get(index).map(|i| i.opcode) != Some(OpCode::Isinst) {
            return false;
        }
        body.next(index)
            .and_then(|next| body.get(next))
            .is_none_or(|next| next.opcode.flow() != FlowType::ConditionalBranch)
    }
}

impl Rule for AvoidNullCheckWithAsOperator {
    fn name(&self) -> &'static str {
        "AvoidNullCheckWithAsOperator"
    }

    fn category(&self) -> &'static str {
        "BadPractice"
    }

    fn problem(&self) -> &'static str {
        "The method checks a value for null before converting it with the 'as' operator."
    }

    fn solution(&self) -> &'static str {
        "Remove the extra null check, 'as' already returns null for a null input."
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
        if !REQUIRED.is_subset_of(&ctx.bitmask(method)) {
            return Ok(RuleResult::DoesNotApply);
        }

        for (index, instruction) in body.instructions().iter().enumerate() {
            let detected = match instruction.opcode {
                OpCode::BrfalseS | OpCode::Brfalse => Self::false_branch(body, index),
                OpCode::BrtrueS | OpCode::Brtrue => Self::true_branch(body, index),
                _ => false,
            };
            if detected {
                ctx.report_instruction(method, index, Severity::Medium, Confidence::Normal, "");
            }
        }

        Ok(ctx.current_result())
    }
}
