//! Rule framework: the [`Rule`] trait, the [`Runner`] that dispatches units to rules, and the
//! result model.
//!
//! A rule is a small, independent check. It declares which kinds of units it wants through
//! [`Rule::scope`] and [`Rule::applicability`], may switch itself off for an assembly or module
//! through the activation hooks, and inspects one unit per call, reporting defects through the
//! [`RuleContext`]. The runner isolates every rule-unit check: an error or a panic inside a
//! rule is recorded as a [`RuleFailure`] and the run continues.
//!
//! # Key Components
//!
//! - [`Rule`] - The check interface
//! - [`Runner`] / [`AnalysisReport`] - Dispatch and aggregated output
//! - [`RuleContext`] - Engines, resolver and defect sink available during a check
//! - [`Severity`] / [`Confidence`] / [`LevelMask`] - Ranking and filtering of defects
//! - [`IgnoreList`] - Per-rule exclusions, including `[SuppressMessage]`
//! - [`catalog`] - Reference rules
//!
//! # Examples
//!
//! ```rust
//! use dotcheck::prelude::*;
//!
//! struct NoEmptyTypes;
//!
//! impl Rule for NoEmptyTypes {
//!     fn name(&self) -> &'static str { "NoEmptyTypes" }
//!     fn category(&self) -> &'static str { "Design" }
//!     fn problem(&self) -> &'static str { "The type declares no members." }
//!     fn solution(&self) -> &'static str { "Remove the type." }
//!     fn scope(&self) -> RuleScope { RuleScope::TYPE }
//!
//!     fn check_type(&mut self, ctx: &mut RuleContext<'_>, ty: &TypeDef) -> Result<RuleResult> {
//!         if ty.methods.is_empty() && ty.fields.is_empty() {
//!             ctx.report(DefectTarget::Type(ty.full_name()), Severity::Low, Confidence::High, "");
//!         }
//!         Ok(ctx.current_result())
//!     }
//! }
//!
//! let mut module = Module::new("A.dll");
//! module.add_type(TypeDef::new(Token::new(0x0200_0001), "Ns", "Empty"));
//! let mut assembly = Assembly::new("A", None);
//! assembly.add_module(module);
//!
//! let mut runner = Runner::new(RunnerConfig::default());
//! runner.add_rule(NoEmptyTypes);
//! let report = runner.analyze(&[assembly]);
//! assert_eq!(report.defects.len(), 1);
//! # Ok::<(), dotcheck::Error>(())
//! ```

use bitflags::bitflags;

use crate::{
    metadata::{Assembly, EventDef, FieldDef, MethodDef, Module, PropertyDef, TypeDef},
    Result,
};

pub mod catalog;

mod config;
mod context;
mod defect;
mod ignore;
mod runner;
mod severity;

pub use config::RunnerConfig;
pub use context::RuleContext;
pub use defect::{Defect, DefectTarget, RuleResult};
pub use ignore::{
    collect_suppressions, member_key, IgnoreList, Suppression, SuppressionTarget,
    SUPPRESS_MESSAGE,
};
pub use runner::{analyze_parallel, AnalysisReport, RuleFailure, RuleOutcome, Runner};
pub use severity::{Confidence, Level, LevelMask, Severity};

bitflags! {
    /// Kinds of units a rule inspects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleScope: u8 {
        /// Assemblies
        const ASSEMBLY = 0x01;
        /// Modules
        const MODULE = 0x02;
        /// Types, nested ones included
        const TYPE = 0x04;
        /// Methods, constructors included
        const METHOD = 0x08;
        /// Fields
        const FIELD = 0x10;
        /// Properties
        const PROPERTY = 0x20;
        /// Events
        const EVENT = 0x40;
    }
}

/// Which units a rule wants, by visibility outside the assembly.
///
/// A type is visible when it and every enclosing type are exposed. A member is visible when it
/// is exposed and its declaring type is visible. Assemblies and modules are always checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Applicability {
    /// Every unit
    #[default]
    All,
    /// Only units reachable from outside the assembly
    Visible,
    /// Only units hidden inside the assembly
    NonVisible,
}

impl Applicability {
    /// True if a unit with the given visibility is wanted.
    #[must_use]
    pub fn accepts(self, visible: bool) -> bool {
        match self {
            Applicability::All => true,
            Applicability::Visible => visible,
            Applicability::NonVisible => !visible,
        }
    }
}

/// One independent check over the model.
///
/// Rules are owned by a single [`Runner`] and called from one thread at a time; parallel runs
/// build a fresh rule set per worker. Checks may consult but never mutate the model.
///
/// Every `check_*` method defaults to [`RuleResult::DoesNotApply`]; a rule overrides the ones
/// named by its [`Rule::scope`]. A check returns `Success` when its preconditions held and it
/// found nothing, and `Failure` after reporting at least one defect, which is what
/// [`RuleContext::current_result`] computes.
pub trait Rule: Send {
    /// Short name, unique within the category.
    fn name(&self) -> &'static str;

    /// Category, e.g. `Correctness` or `Performance`.
    fn category(&self) -> &'static str;

    /// `Category.Name`, the key used by ignore lists and defects.
    fn full_name(&self) -> String {
        format!("{}.{}", self.category(), self.name())
    }

    /// What is wrong when the rule fires.
    fn problem(&self) -> &'static str;

    /// How to fix it.
    fn solution(&self) -> &'static str;

    /// Link to further documentation.
    fn uri(&self) -> Option<&'static str> {
        None
    }

    /// Kinds of units the runner hands to this rule.
    fn scope(&self) -> RuleScope;

    /// Visibility filter applied to types and members.
    fn applicability(&self) -> Applicability {
        Applicability::All
    }

    /// Called once before the first assembly. An error deactivates the rule for the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule cannot run, e.g. because a required type is missing.
    fn initialize(&mut self, _assemblies: &[Assembly]) -> Result<()> {
        Ok(())
    }

    /// Called before each assembly; returning false skips the assembly and all of its units.
    fn on_assembly(&mut self, _assembly: &Assembly) -> bool {
        true
    }

    /// Called before each module; returning false skips the module and all of its units.
    fn on_module(&mut self, _assembly: &Assembly, _module: &Module) -> bool {
        true
    }

    /// Checks an assembly.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be completed; the runner records it.
    fn check_assembly(
        &mut self,
        _ctx: &mut RuleContext<'_>,
        _assembly: &Assembly,
    ) -> Result<RuleResult> {
        Ok(RuleResult::DoesNotApply)
    }

    /// Checks a module.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be completed; the runner records it.
    fn check_module(&mut self, _ctx: &mut RuleContext<'_>, _module: &Module) -> Result<RuleResult> {
        Ok(RuleResult::DoesNotApply)
    }

    /// Checks a type.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be completed; the runner records it.
    fn check_type(&mut self, _ctx: &mut RuleContext<'_>, _ty: &TypeDef) -> Result<RuleResult> {
        Ok(RuleResult::DoesNotApply)
    }

    /// Checks a method.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be completed; the runner records it.
    fn check_method(
        &mut self,
        _ctx: &mut RuleContext<'_>,
        _method: &MethodDef,
    ) -> Result<RuleResult> {
        Ok(RuleResult::DoesNotApply)
    }

    /// Checks a field.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be completed; the runner records it.
    fn check_field(&mut self, _ctx: &mut RuleContext<'_>, _field: &FieldDef) -> Result<RuleResult> {
        Ok(RuleResult::DoesNotApply)
    }

    /// Checks a property.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be completed; the runner records it.
    fn check_property(
        &mut self,
        _ctx: &mut RuleContext<'_>,
        _property: &PropertyDef,
    ) -> Result<RuleResult> {
        Ok(RuleResult::DoesNotApply)
    }

    /// Checks an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be completed; the runner records it.
    fn check_event(&mut self, _ctx: &mut RuleContext<'_>, _event: &EventDef) -> Result<RuleResult> {
        Ok(RuleResult::DoesNotApply)
    }

    /// Called once after the last assembly.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails; the runner logs it.
    fn tear_down(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl Rule for Bare {
        fn name(&self) -> &'static str {
            "Bare"
        }
        fn category(&self) -> &'static str {
            "Test"
        }
        fn problem(&self) -> &'static str {
            "p"
        }
        fn solution(&self) -> &'static str {
            "s"
        }
        fn scope(&self) -> RuleScope {
            RuleScope::all()
        }
    }

    #[test]
    fn test_rule_defaults() {
        let rule = Bare;
        assert_eq!(rule.full_name(), "Test.Bare");
        assert_eq!(rule.applicability(), Applicability::All);
        assert!(rule.uri().is_none());
    }

    #[test]
    fn test_applicability() {
        assert!(Applicability::All.accepts(false));
        assert!(Applicability::Visible.accepts(true));
        assert!(!Applicability::Visible.accepts(false));
        assert!(Applicability::NonVisible.accepts(false));
        assert!(!Applicability::NonVisible.accepts(true));
    }
}
