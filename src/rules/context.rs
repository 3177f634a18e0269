//! State handed to a rule for one check.

use crate::{
    analysis::{NamespaceEngine, OpCodeBitmask, OpCodeEngine},
    metadata::{Assembly, AssemblyResolver, MethodDef, Module},
    rules::{Confidence, Defect, DefectTarget, RuleResult, RunnerConfig, Severity},
};

/// Everything a rule may consult while checking one unit, plus the defect sink.
///
/// A context lives for a single rule-unit check. Defects pass the configured severity and
/// confidence masks before they are appended to the run's log; [`RuleContext::current_result`]
/// only counts the ones that were kept.
pub struct RuleContext<'a> {
    rule: &'a str,
    assembly: &'a Assembly,
    module: Option<&'a Module>,
    opcodes: &'a OpCodeEngine,
    namespaces: &'a NamespaceEngine,
    resolver: &'a AssemblyResolver<'a>,
    config: &'a RunnerConfig,
    defects: &'a boxcar::Vec<Defect>,
    accepted: usize,
    filtered: usize,
}

impl<'a> RuleContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        rule: &'a str,
        assembly: &'a Assembly,
        module: Option<&'a Module>,
        opcodes: &'a OpCodeEngine,
        namespaces: &'a NamespaceEngine,
        resolver: &'a AssemblyResolver<'a>,
        config: &'a RunnerConfig,
        defects: &'a boxcar::Vec<Defect>,
    ) -> Self {
        RuleContext {
            rule,
            assembly,
            module,
            opcodes,
            namespaces,
            resolver,
            config,
            defects,
            accepted: 0,
            filtered: 0,
        }
    }

    /// Full name of the rule being run.
    #[must_use]
    pub fn rule(&self) -> &str {
        self.rule
    }

    /// Assembly under analysis.
    #[must_use]
    pub fn assembly(&self) -> &'a Assembly {
        self.assembly
    }

    /// Module under analysis; `None` while the assembly itself is checked.
    #[must_use]
    pub fn module(&self) -> Option<&'a Module> {
        self.module
    }

    /// Opcode bitmask cache of the current assembly.
    #[must_use]
    pub fn opcodes(&self) -> &'a OpCodeEngine {
        self.opcodes
    }

    /// Shorthand for `self.opcodes().bitmask(method)`.
    #[must_use]
    pub fn bitmask(&self, method: &MethodDef) -> OpCodeBitmask {
        self.opcodes.bitmask(method)
    }

    /// Namespace index of the current assembly.
    #[must_use]
    pub fn namespaces(&self) -> &'a NamespaceEngine {
        self.namespaces
    }

    /// Resolver over every assembly of the run.
    #[must_use]
    pub fn resolver(&self) -> &'a AssemblyResolver<'a> {
        self.resolver
    }

    /// Reports a defect against `target`.
    pub fn report(
        &mut self,
        target: DefectTarget,
        severity: Severity,
        confidence: Confidence,
        text: impl Into<String>,
    ) {
        self.push(Defect {
            rule: self.rule.to_string(),
            target,
            location: None,
            instruction: None,
            severity,
            confidence,
            text: text.into(),
        });
    }

    /// Reports a defect against the instruction at `index` of `method`. The defect carries the
    /// instruction's IL offset and the nearest preceding sequence point.
    pub fn report_instruction(
        &mut self,
        method: &MethodDef,
        index: usize,
        severity: Severity,
        confidence: Confidence,
        text: impl Into<String>,
    ) {
        let body = method.body.as_ref();
        let location = body.and_then(|b| b.sequence_point_before(index)).cloned();
        let instruction = body.and_then(|b| b.get(index)).map(|i| i.offset);
        self.push(Defect {
            rule: self.rule.to_string(),
            target: DefectTarget::Method(method.full_name()),
            location,
            instruction,
            severity,
            confidence,
            text: text.into(),
        });
    }

    /// `Failure` if a defect was kept during this check, `Success` otherwise.
    #[must_use]
    pub fn current_result(&self) -> RuleResult {
        if self.accepted > 0 {
            RuleResult::Failure
        } else {
            RuleResult::Success
        }
    }

    /// Defects kept during this check.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Defects dropped by the severity/confidence masks or the defect limit during this check.
    #[must_use]
    pub fn filtered(&self) -> usize {
        self.filtered
    }

    fn push(&mut self, defect: Defect) {
        let limit_reached = self
            .config
            .defect_limit
            .is_some_and(|limit| self.defects.count() >= limit);
        if limit_reached || !self.config.accepts(defect.severity, defect.confidence) {
            self.filtered += 1;
            return;
        }
        self.defects.push(defect);
        self.accepted += 1;
    }
}
