//! Assembly version against file version.

use crate::{
    metadata::{Assembly, Version},
    rules::{Confidence, DefectTarget, Rule, RuleContext, RuleResult, RuleScope, Severity},
    Result,
};

const FILE_VERSION: &str = "System.Reflection.AssemblyFileVersionAttribute";

/// Flags assemblies whose `[AssemblyVersion]` and `[AssemblyFileVersion]` differ.
///
/// The severity follows the most significant component that differs: a major mismatch is
/// Critical, minor is High, build is Medium and revision is Low. The rule does not apply when
/// either version is missing, zero or unparsable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AvoidAssemblyVersionMismatch;

fn is_empty(version: &Version) -> bool {
    *version == Version::default()
}

fn mismatch_severity(assembly: &Version, file: &Version) -> Option<Severity> {
    const BY_COMPONENT: [Severity; 4] =
        [Severity::Critical, Severity::High, Severity::Medium, Severity::Low];

    assembly
        .components()
        .iter()
        .zip(file.components())
        .position(|(a, f)| *a != f)
        .map(|component| BY_COMPONENT[component])
}

impl Rule for AvoidAssemblyVersionMismatch {
    fn name(&self) -> &'static str {
        "AvoidAssemblyVersionMismatch"
    }

    fn category(&self) -> &'static str {
        "BadPractice"
    }

    fn problem(&self) -> &'static str {
        "The assembly version and the file version differ."
    }

    fn solution(&self) -> &'static str {
        "Use the same value for [AssemblyVersion] and [AssemblyFileVersion]."
    }

    fn scope(&self) -> RuleScope {
        RuleScope::ASSEMBLY
    }

    fn check_assembly(
        &mut self,
        ctx: &mut RuleContext<'_>,
        assembly: &Assembly,
    ) -> Result<RuleResult> {
        if assembly.custom_attributes.is_empty() {
            return Ok(RuleResult::DoesNotApply);
        }
        let Some(assembly_version) = assembly.name.version.filter(|v| !is_empty(v)) else {
            return Ok(RuleResult::DoesNotApply);
        };

        let file_version = assembly
            .custom_attributes
            .iter()
            .find(|attribute| !attribute.fixed_args.is_empty() && attribute.is(FILE_VERSION))
            .and_then(|attribute| attribute.string_argument(0))
            .and_then(|value| Version::parse(value).ok())
            .filter(|v| !is_empty(v));
        let Some(file_version) = file_version else {
            return Ok(RuleResult::DoesNotApply);
        };

        let Some(severity) = mismatch_severity(&assembly_version, &file_version) else {
            return Ok(RuleResult::Success);
        };
        let text = format!(
            "Assembly version is '{assembly_version}' while file version is '{file_version}'."
        );
        ctx.report(
            DefectTarget::Assembly(assembly.name.name.clone()),
            severity,
            Confidence::High,
            text,
        );
        Ok(ctx.current_result())
    }
}
