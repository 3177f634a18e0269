//! Results and defects produced by rules.

use std::fmt;

use crate::{
    assembly::SequencePoint,
    rules::{Confidence, Severity},
};

/// Outcome of checking one unit with one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleResult {
    /// The unit is not of a kind the rule inspects, or its preconditions did not hold
    DoesNotApply,
    /// The rule inspected the unit and found nothing
    Success,
    /// The rule reported at least one defect for the unit
    Failure,
}

impl fmt::Display for RuleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RuleResult::DoesNotApply => "does not apply",
            RuleResult::Success => "success",
            RuleResult::Failure => "failure",
        };
        f.write_str(text)
    }
}

/// The element a defect (or a rule outcome) is attached to, named by its full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefectTarget {
    /// An assembly, by simple name
    Assembly(String),
    /// A module, by file name
    Module(String),
    /// A type, e.g. `Ns.Outer/Inner`
    Type(String),
    /// A method, e.g. `System.Void Ns.T::M(System.Int32)`
    Method(String),
    /// A field, e.g. `System.Int32 Ns.T::count`
    Field(String),
    /// A property, e.g. `System.String Ns.T::Name`
    Property(String),
    /// An event, e.g. `System.EventHandler Ns.T::Changed`
    Event(String),
}

impl DefectTarget {
    /// Full name of the element.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            DefectTarget::Assembly(name)
            | DefectTarget::Module(name)
            | DefectTarget::Type(name)
            | DefectTarget::Method(name)
            | DefectTarget::Field(name)
            | DefectTarget::Property(name)
            | DefectTarget::Event(name) => name,
        }
    }

    /// Kind of the element, lower case.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DefectTarget::Assembly(_) => "assembly",
            DefectTarget::Module(_) => "module",
            DefectTarget::Type(_) => "type",
            DefectTarget::Method(_) => "method",
            DefectTarget::Field(_) => "field",
            DefectTarget::Property(_) => "property",
            DefectTarget::Event(_) => "event",
        }
    }
}

impl fmt::Display for DefectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.name())
    }
}

/// One finding reported by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defect {
    /// Full name of the reporting rule, `Category.Name`
    pub rule: String,
    /// Offending element
    pub target: DefectTarget,
    /// Nearest source location, when debug symbols are present
    pub location: Option<SequencePoint>,
    /// IL offset of the offending instruction, for instruction level defects
    pub instruction: Option<u32>,
    /// How bad the finding is
    pub severity: Severity,
    /// How sure the rule is
    pub confidence: Confidence,
    /// Free text detail, may be empty
    pub text: String,
}

impl Defect {
    /// Human readable position of the defect: the source location if known, else the IL
    /// offset, else an empty string.
    #[must_use]
    pub fn source(&self) -> String {
        match (&self.location, self.instruction) {
            (Some(location), _) => location.to_string(),
            (None, Some(offset)) => format!("IL offset: (0x{offset:04x})"),
            (None, None) => String::new(),
        }
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}/{})",
            self.rule, self.target, self.severity, self.confidence
        )?;
        let source = self.source();
        if !source.is_empty() {
            write!(f, " at {source}")?;
        }
        if !self.text.is_empty() {
            write!(f, ": {}", self.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defect() -> Defect {
        Defect {
            rule: "Correctness.Sample".to_string(),
            target: DefectTarget::Method("System.Void Ns.T::M()".to_string()),
            location: None,
            instruction: Some(0x1a),
            severity: Severity::High,
            confidence: Confidence::Normal,
            text: "details".to_string(),
        }
    }

    #[test]
    fn test_source() {
        let mut d = defect();
        assert_eq!(d.source(), "IL offset: (0x001a)");
        d.location = Some(SequencePoint {
            document: "T.cs".to_string(),
            line: 12,
            column: 9,
        });
        assert_eq!(d.source(), "T.cs(12,9)");
        d.location = None;
        d.instruction = None;
        assert_eq!(d.source(), "");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            defect().to_string(),
            "[Correctness.Sample] method System.Void Ns.T::M() (High/Normal) at IL offset: \
             (0x001a): details"
        );
        assert_eq!(DefectTarget::Type("Ns.T".into()).kind(), "type");
        assert_eq!(RuleResult::DoesNotApply.to_string(), "does not apply");
    }
}
