//! Rule dispatch over the assembly tree.
//!
//! The [`Runner`] owns the rules, the per-assembly engines and the defect log of a run. For
//! every assembly it resets the engines, applies suppressions, asks each rule whether it wants
//! the assembly (and later each module), and then hands every unit to every interested rule:
//!
//! ```text
//! assembly ─► module ─► type ─┬─► fields, methods, properties, events
//!                             └─► nested types (same order, recursively)
//! ```
//!
//! Each rule-unit check runs behind `catch_unwind`; an error or a panic becomes a
//! [`RuleFailure`] and the run carries on with the next rule.
//!
//! Independent assemblies can be analyzed in parallel with [`analyze_parallel`], where every
//! worker owns its own runner, rule set and engines.

use std::{
    any::Any,
    collections::BTreeMap,
    ops::Range,
    panic::{self, AssertUnwindSafe},
};

use rayon::prelude::*;

use crate::{
    analysis::{NamespaceEngine, OpCodeEngine},
    metadata::{Assembly, AssemblyResolver, Module, TypeDef},
    rules::{
        Applicability, Defect, DefectTarget, IgnoreList, Rule, RuleContext, RuleResult,
        RuleScope, RunnerConfig,
    },
    Error, Result,
};

/// Result of one rule on one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Rule full name
    pub rule: String,
    /// Checked unit
    pub target: DefectTarget,
    /// Normalized result
    pub result: RuleResult,
}

/// A rule that failed to initialize, returned an error, or panicked.
///
/// Defects reported by an aborted check are withdrawn from [`AnalysisReport::defects`] and
/// kept here instead, so the report only lists defects of checks that produced a result. They
/// still counted against the defect limit while the run was going.
#[derive(Debug)]
pub struct RuleFailure {
    /// Rule full name
    pub rule: String,
    /// Unit being checked; `None` for initialization and tear down
    pub target: Option<DefectTarget>,
    /// What went wrong
    pub error: Error,
    /// Defects the check reported before it aborted
    pub defects: Vec<Defect>,
    /// Positions of those defects in the runner's log until the report is built
    reported: Range<usize>,
}

impl RuleFailure {
    fn new(rule: &str, target: Option<&DefectTarget>, error: Error) -> Self {
        RuleFailure {
            rule: rule.to_string(),
            target: target.cloned(),
            error,
            defects: Vec::new(),
            reported: 0..0,
        }
    }
}

/// Output of an analysis run.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    /// Kept defects, in reporting order
    pub defects: Vec<Defect>,
    /// Per rule-unit results, when [`RunnerConfig::record_outcomes`] is set
    pub outcomes: Vec<RuleOutcome>,
    /// Isolated rule failures
    pub failures: Vec<RuleFailure>,
    /// True if the run stopped early at the defect limit
    pub limit_reached: bool,
}

impl AnalysisReport {
    /// True if no defect was kept and no rule failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty() && self.failures.is_empty()
    }

    /// Defects reported by `rule`.
    pub fn defects_of<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Defect> + 'a {
        self.defects.iter().filter(move |d| d.rule == rule)
    }

    /// Number of defects per rule full name.
    #[must_use]
    pub fn defect_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for defect in &self.defects {
            *counts.entry(defect.rule.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of recorded outcomes of `rule` equal to `result`.
    #[must_use]
    pub fn outcome_count(&self, rule: &str, result: RuleResult) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.rule == rule && o.result == result)
            .count()
    }

    /// Appends another report.
    pub fn merge(&mut self, other: AnalysisReport) {
        self.defects.extend(other.defects);
        self.outcomes.extend(other.outcomes);
        self.failures.extend(other.failures);
        self.limit_reached |= other.limit_reached;
    }
}

struct RuleSlot {
    rule: Box<dyn Rule>,
    name: String,
    scope: RuleScope,
    applicability: Applicability,
    initialized: bool,
    enabled: bool,
    assembly_active: bool,
    active: bool,
}

impl RuleSlot {
    fn new(rule: Box<dyn Rule>) -> Self {
        RuleSlot {
            name: rule.full_name(),
            scope: rule.scope(),
            applicability: rule.applicability(),
            rule,
            initialized: false,
            enabled: true,
            assembly_active: false,
            active: false,
        }
    }

    fn wants(&self, scope: RuleScope, visible: bool) -> bool {
        self.active && self.scope.contains(scope) && self.applicability.accepts(visible)
    }

    /// Runs an activation hook, treating a panic as "inactive".
    fn hook(
        &mut self,
        target: &DefectTarget,
        failures: &mut Vec<RuleFailure>,
        hook: impl FnOnce(&mut dyn Rule) -> bool,
    ) -> bool {
        let rule = self.rule.as_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| hook(rule))) {
            Ok(active) => active,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(rule = %self.name, %target, "activation hook panicked: {message}");
                failures.push(RuleFailure::new(
                    &self.name,
                    Some(target),
                    Error::RulePanicked {
                        rule: self.name.clone(),
                        message,
                    },
                ));
                false
            }
        }
    }

    fn set_active(&mut self, active: bool, target: &DefectTarget) {
        if active != self.active {
            tracing::debug!(
                rule = %self.name,
                %target,
                "{}",
                if active { "activated" } else { "deactivated" }
            );
        }
        self.active = active;
    }
}

/// Dispatches the units of a set of assemblies to registered rules.
pub struct Runner {
    rules: Vec<RuleSlot>,
    ignore: IgnoreList,
    config: RunnerConfig,
    opcodes: OpCodeEngine,
    namespaces: NamespaceEngine,
    defects: boxcar::Vec<Defect>,
    outcomes: Vec<RuleOutcome>,
    failures: Vec<RuleFailure>,
}

impl Runner {
    /// Creates a runner without rules.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Runner {
            rules: Vec::new(),
            ignore: IgnoreList::new(),
            config,
            opcodes: OpCodeEngine::new(),
            namespaces: NamespaceEngine::new(),
            defects: boxcar::Vec::new(),
            outcomes: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Registers a rule.
    pub fn add_rule<R: Rule + 'static>(&mut self, rule: R) -> &mut Self {
        self.add_boxed_rule(Box::new(rule))
    }

    /// Registers a boxed rule.
    pub fn add_boxed_rule(&mut self, rule: Box<dyn Rule>) -> &mut Self {
        self.rules.push(RuleSlot::new(rule));
        self
    }

    /// Registers several boxed rules.
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Box<dyn Rule>>) -> &mut Self {
        for rule in rules {
            self.add_boxed_rule(rule);
        }
        self
    }

    /// Registered rules, in registration order.
    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|slot| slot.rule.as_ref())
    }

    /// Full names of the rules that survived initialization.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(|slot| slot.enabled)
            .map(|slot| slot.name.as_str())
    }

    /// Configuration of the runs.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Rules ignored per assembly, type and member.
    #[must_use]
    pub fn ignore_list(&self) -> &IgnoreList {
        &self.ignore
    }

    /// Mutable access to the ignore list, to add entries before a run.
    pub fn ignore_list_mut(&mut self) -> &mut IgnoreList {
        &mut self.ignore
    }

    /// Analyzes `assemblies`, resolving references among them only.
    pub fn analyze(&mut self, assemblies: &[Assembly]) -> AnalysisReport {
        self.analyze_with_references(assemblies, &[])
    }

    /// Analyzes `assemblies`; `references` are only used to resolve types and members (for
    /// example a model of the core library).
    pub fn analyze_with_references(
        &mut self,
        assemblies: &[Assembly],
        references: &[Assembly],
    ) -> AnalysisReport {
        let extra = references
            .iter()
            .filter(|r| !assemblies.iter().any(|a| std::ptr::eq(a, *r)));
        let resolver = AssemblyResolver::new(assemblies.iter().chain(extra));

        self.initialize(assemblies);
        let mut limit_reached = false;
        for assembly in assemblies {
            if self.config.honor_suppressions {
                let count = self.ignore.add_suppressions(assembly);
                if count > 0 {
                    tracing::debug!(
                        assembly = %assembly.name.name,
                        "{count} suppressions added to the ignore list"
                    );
                }
            }
            if !self.analyze_assembly(assembly, &resolver) {
                limit_reached = true;
                break;
            }
        }
        self.tear_down();

        let mut report = self.take_report();
        report.limit_reached = limit_reached;
        report
    }

    /// Drops collected defects, outcomes and failures and forgets initialization, so the runner
    /// can be reused. Rules and the ignore list are kept.
    pub fn reset(&mut self) {
        self.defects = boxcar::Vec::new();
        self.outcomes.clear();
        self.failures.clear();
        self.opcodes.reset_for_assembly();
        for slot in &mut self.rules {
            slot.initialized = false;
            slot.enabled = true;
            slot.active = false;
        }
    }

    fn initialize(&mut self, assemblies: &[Assembly]) {
        for slot in self.rules.iter_mut().filter(|s| !s.initialized) {
            slot.initialized = true;
            let rule = slot.rule.as_mut();
            let error = match panic::catch_unwind(AssertUnwindSafe(|| rule.initialize(assemblies)))
            {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => Error::RuleInitialization {
                    rule: slot.name.clone(),
                    message: error.to_string(),
                },
                Err(payload) => Error::RulePanicked {
                    rule: slot.name.clone(),
                    message: panic_message(payload.as_ref()),
                },
            };
            tracing::warn!(rule = %slot.name, "rule deactivated: {error}");
            slot.enabled = false;
            self.failures.push(RuleFailure::new(&slot.name, None, error));
        }
    }

    fn tear_down(&mut self) {
        for slot in self.rules.iter_mut().filter(|s| s.initialized) {
            slot.initialized = false;
            slot.active = false;
            let rule = slot.rule.as_mut();
            let error = match panic::catch_unwind(AssertUnwindSafe(|| rule.tear_down())) {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => Error::RuleFailed {
                    rule: slot.name.clone(),
                    message: error.to_string(),
                },
                Err(payload) => Error::RulePanicked {
                    rule: slot.name.clone(),
                    message: panic_message(payload.as_ref()),
                },
            };
            tracing::warn!(rule = %slot.name, "tear down failed: {error}");
            self.failures.push(RuleFailure::new(&slot.name, None, error));
        }
    }

    /// Returns false if the defect limit stopped the run.
    fn analyze_assembly(&mut self, assembly: &Assembly, resolver: &AssemblyResolver<'_>) -> bool {
        self.opcodes.reset_for_assembly();
        self.namespaces.rebuild(assembly);

        let target = DefectTarget::Assembly(assembly.name.name.clone());
        for slot in &mut self.rules {
            let active = slot.enabled
                && slot.hook(&target, &mut self.failures, |r| r.on_assembly(assembly));
            slot.assembly_active = active;
            slot.set_active(active, &target);
        }

        let Runner {
            rules,
            ignore,
            config,
            opcodes,
            namespaces,
            defects,
            outcomes,
            failures,
        } = self;
        let mut pass = Pass {
            assembly,
            resolver,
            ignore,
            config,
            opcodes,
            namespaces,
            defects,
            outcomes,
            failures,
        };
        pass.run(rules)
    }

    /// Moves the log into a report, handing the defects of aborted checks to their failures.
    fn take_report(&mut self) -> AnalysisReport {
        let log = std::mem::replace(&mut self.defects, boxcar::Vec::new());
        let mut defects: Vec<Option<Defect>> = log.into_iter().map(Some).collect();
        let mut failures = std::mem::take(&mut self.failures);
        for failure in &mut failures {
            let reported = std::mem::replace(&mut failure.reported, 0..0);
            failure.defects = reported
                .filter_map(|index| defects.get_mut(index).and_then(Option::take))
                .collect();
        }
        AnalysisReport {
            defects: defects.into_iter().flatten().collect(),
            outcomes: std::mem::take(&mut self.outcomes),
            failures,
            limit_reached: false,
        }
    }
}

/// Analyzes every assembly with its own runner, in parallel when [`RunnerConfig::parallel`] is
/// set, and merges the reports in input order.
///
/// `factory` builds a fresh rule set for each worker; every worker resolves references against
/// all of `assemblies`. The defect limit applies to the merged report.
pub fn analyze_parallel<F>(
    assemblies: &[Assembly],
    config: &RunnerConfig,
    factory: F,
) -> AnalysisReport
where
    F: Fn() -> Vec<Box<dyn Rule>> + Sync,
{
    let run = |assembly: &Assembly| {
        let mut runner = Runner::new(config.clone());
        runner.add_rules(factory());
        runner.analyze_with_references(std::slice::from_ref(assembly), assemblies)
    };

    let reports: Vec<AnalysisReport> = if config.parallel {
        assemblies.par_iter().map(run).collect()
    } else {
        assemblies.iter().map(run).collect()
    };

    let mut merged = AnalysisReport::default();
    for report in reports {
        merged.merge(report);
    }
    if let Some(limit) = config.defect_limit {
        if merged.defects.len() > limit {
            merged.defects.truncate(limit);
            merged.limit_reached = true;
        }
    }
    merged
}

/// Borrowed state of one assembly pass.
struct Pass<'p> {
    assembly: &'p Assembly,
    resolver: &'p AssemblyResolver<'p>,
    ignore: &'p IgnoreList,
    config: &'p RunnerConfig,
    opcodes: &'p OpCodeEngine,
    namespaces: &'p NamespaceEngine,
    defects: &'p boxcar::Vec<Defect>,
    outcomes: &'p mut Vec<RuleOutcome>,
    failures: &'p mut Vec<RuleFailure>,
}

impl<'p> Pass<'p> {
    fn run(&mut self, rules: &mut [RuleSlot]) -> bool {
        let assembly = self.assembly;
        let name = assembly.name.name.as_str();
        let target = DefectTarget::Assembly(name.to_string());

        for slot in rules.iter_mut() {
            if slot.wants(RuleScope::ASSEMBLY, true)
                && !self.ignore.ignores_assembly(&slot.name, name)
            {
                self.check(slot, None, &target, |r, ctx| r.check_assembly(ctx, assembly));
            }
        }

        for module in &assembly.modules {
            if self.limit_reached() {
                return false;
            }
            let target = DefectTarget::Module(module.name.clone());
            for slot in rules.iter_mut() {
                let active = slot.assembly_active
                    && slot.hook(&target, self.failures, |r| r.on_module(assembly, module));
                slot.set_active(active, &target);
            }
            for slot in rules.iter_mut() {
                if slot.wants(RuleScope::MODULE, true)
                    && !self.ignore.ignores_assembly(&slot.name, name)
                {
                    self.check(slot, Some(module), &target, |r, ctx| r.check_module(ctx, module));
                }
            }
            for ty in &module.types {
                if !self.visit_type(rules, module, ty, true) {
                    return false;
                }
            }
        }
        !self.limit_reached()
    }

    fn visit_type(
        &mut self,
        rules: &mut [RuleSlot],
        module: &'p Module,
        ty: &'p TypeDef,
        parent_visible: bool,
    ) -> bool {
        if self.limit_reached() {
            return false;
        }
        let visible = parent_visible && ty.visibility().is_exposed();
        let type_name = ty.full_name();
        let assembly = self.assembly.name.name.as_str();

        let target = DefectTarget::Type(type_name.clone());
        for slot in rules.iter_mut() {
            if slot.wants(RuleScope::TYPE, visible)
                && !self.ignore.ignores_type(&slot.name, assembly, &type_name)
            {
                self.check(slot, Some(module), &target, |r, ctx| r.check_type(ctx, ty));
            }
        }

        for field in &ty.fields {
            let unit = Unit {
                scope: RuleScope::FIELD,
                visible: visible && field.is_exposed(),
                declaring_type: &type_name,
                target: DefectTarget::Field(field.full_name()),
            };
            self.visit_member(rules, module, &unit, |r, ctx| r.check_field(ctx, field));
        }
        for method in &ty.methods {
            let unit = Unit {
                scope: RuleScope::METHOD,
                visible: visible && method.access().is_exposed(),
                declaring_type: &type_name,
                target: DefectTarget::Method(method.full_name()),
            };
            self.visit_member(rules, module, &unit, |r, ctx| r.check_method(ctx, method));
        }
        for property in &ty.properties {
            let unit = Unit {
                scope: RuleScope::PROPERTY,
                visible: visible && has_exposed_accessor(ty, property.accessors()),
                declaring_type: &type_name,
                target: DefectTarget::Property(property.full_name()),
            };
            self.visit_member(rules, module, &unit, |r, ctx| r.check_property(ctx, property));
        }
        for event in &ty.events {
            let unit = Unit {
                scope: RuleScope::EVENT,
                visible: visible && has_exposed_accessor(ty, event.accessors()),
                declaring_type: &type_name,
                target: DefectTarget::Event(event.full_name()),
            };
            self.visit_member(rules, module, &unit, |r, ctx| r.check_event(ctx, event));
        }

        for nested in &ty.nested_types {
            if !self.visit_type(rules, module, nested, visible) {
                return false;
            }
        }
        !self.limit_reached()
    }

    fn visit_member<F>(&mut self, rules: &mut [RuleSlot], module: &'p Module, unit: &Unit, check: F)
    where
        F: Fn(&mut dyn Rule, &mut RuleContext<'_>) -> Result<RuleResult>,
    {
        let assembly = self.assembly.name.name.as_str();
        for slot in rules.iter_mut() {
            if self.limit_reached() {
                return;
            }
            if slot.wants(unit.scope, unit.visible)
                && !self.ignore.ignores_member(
                    &slot.name,
                    assembly,
                    unit.declaring_type,
                    unit.target.name(),
                )
            {
                self.check(slot, Some(module), &unit.target, &check);
            }
        }
    }

    /// One isolated rule-unit check.
    fn check<F>(
        &mut self,
        slot: &mut RuleSlot,
        module: Option<&'p Module>,
        target: &DefectTarget,
        check: F,
    ) where
        F: FnOnce(&mut dyn Rule, &mut RuleContext<'_>) -> Result<RuleResult>,
    {
        let mut ctx = RuleContext::new(
            &slot.name,
            self.assembly,
            module,
            self.opcodes,
            self.namespaces,
            self.resolver,
            self.config,
            self.defects,
        );
        let rule = slot.rule.as_mut();
        let first = self.defects.count();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| check(rule, &mut ctx)));
        let (accepted, filtered) = (ctx.accepted(), ctx.filtered());

        let error = match outcome {
            Ok(Ok(result)) => {
                let result = normalize(&slot.name, target, result, accepted, filtered);
                if self.config.record_outcomes {
                    self.outcomes.push(RuleOutcome {
                        rule: slot.name.clone(),
                        target: target.clone(),
                        result,
                    });
                }
                return;
            }
            Ok(Err(error)) => Error::RuleFailed {
                rule: slot.name.clone(),
                message: error.to_string(),
            },
            Err(payload) => Error::RulePanicked {
                rule: slot.name.clone(),
                message: panic_message(payload.as_ref()),
            },
        };
        tracing::warn!(rule = %slot.name, %target, "check aborted: {error}");
        let mut failure = RuleFailure::new(&slot.name, Some(target), error);
        failure.reported = first..self.defects.count();
        self.failures.push(failure);
    }

    fn limit_reached(&self) -> bool {
        self.config
            .defect_limit
            .is_some_and(|limit| self.defects.count() >= limit)
    }
}

struct Unit<'u> {
    scope: RuleScope,
    visible: bool,
    declaring_type: &'u str,
    target: DefectTarget,
}

fn has_exposed_accessor(
    ty: &TypeDef,
    mut accessors: impl Iterator<Item = crate::metadata::Token>,
) -> bool {
    accessors.any(|token| {
        ty.methods
            .iter()
            .any(|m| m.token == token && m.access().is_exposed())
    })
}

/// Makes the result agree with the defects kept during the check.
fn normalize(
    rule: &str,
    target: &DefectTarget,
    result: RuleResult,
    accepted: usize,
    filtered: usize,
) -> RuleResult {
    match result {
        RuleResult::Failure if accepted == 0 => {
            // every defect was filtered out: a legitimate Success
            if filtered == 0 {
                tracing::warn!(%rule, %target, "failure reported without any defect");
            }
            RuleResult::Success
        }
        RuleResult::Success | RuleResult::DoesNotApply if accepted > 0 => {
            tracing::warn!(%rule, %target, "{result} returned after {accepted} defects");
            RuleResult::Failure
        }
        result => result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
