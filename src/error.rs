use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The analyses themselves ([`crate::analysis::StackEntryAnalysis`] and
/// [`crate::analysis::trace_back`]) never fail: an inconclusive result is reported as an
/// empty usage set or `None`. Errors surface while building method bodies, while
/// initializing rules, and from individual rule checks, where the
/// [`crate::Runner`] records and isolates them.
///
/// # Error Categories
///
/// ## Model Construction Errors
/// - [`Error::Malformed`] - Inconsistent method body or metadata
/// - [`Error::OutOfBounds`] - Instruction or handler index outside the body
/// - [`Error::InvalidMnemonic`] - Unknown opcode mnemonic
/// - [`Error::InvalidBranch`] - Branch emitted with a non-branch opcode
/// - [`Error::DuplicateLabel`] / [`Error::UndefinedLabel`] - Label bookkeeping
/// - [`Error::UnexpectedOperand`] / [`Error::WrongOperandType`] - Operand validation
///
/// ## Rule Errors
/// - [`Error::RuleInitialization`] - A rule refused to initialize and was deactivated
/// - [`Error::RuleFailed`] - A rule check returned an error
/// - [`Error::RulePanicked`] - A rule check panicked
/// - [`Error::UnresolvedReference`] - A rule required a definition that is not loaded
///
/// ## Configuration Errors
/// - [`Error::InvalidFilter`] - Unparsable severity/confidence filter
///
/// # Examples
///
/// ```rust
/// use dotcheck::{assembly::MethodBodyBuilder, Error};
///
/// let mut builder = MethodBodyBuilder::new();
/// match builder.emit_instruction("frobnicate", None) {
///     Err(Error::InvalidMnemonic(name)) => assert_eq!(name, "frobnicate"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The model is inconsistent and could not be constructed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An index into an instruction arena or handler table was out of range.
    #[error("Out of Bound access would have occurred!")]
    OutOfBounds,

    /// The mnemonic does not name a known CIL opcode.
    #[error("Invalid instruction mnemonic: {0}")]
    InvalidMnemonic(String),

    /// A branch or switch was emitted with an opcode that does not branch.
    #[error("Invalid branch: {0}")]
    InvalidBranch(String),

    /// A label with the same name was already placed.
    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    /// A branch refers to a label that was never placed.
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),

    /// An operand was supplied for an opcode that takes none.
    #[error("Unexpected operand provided for an instruction that takes none")]
    UnexpectedOperand,

    /// The operand does not match the opcode's operand type.
    #[error("Wrong operand type - expected {expected}, got {actual}")]
    WrongOperandType {
        /// The operand type the opcode expects
        expected: String,
        /// The operand that was supplied
        actual: String,
    },

    /// A reference could not be resolved to a definition.
    ///
    /// Most lookups treat this as a soft failure and return `None`; this variant is for rules
    /// that cannot continue without the definition.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// A rule failed to initialize; the runner deactivates it.
    #[error("Rule '{rule}' failed to initialize: {message}")]
    RuleInitialization {
        /// Full name of the rule
        rule: String,
        /// Reason reported by the rule
        message: String,
    },

    /// A rule check returned an error for one unit.
    #[error("Rule '{rule}' failed: {message}")]
    RuleFailed {
        /// Full name of the rule
        rule: String,
        /// Description of the failure
        message: String,
    },

    /// A rule check panicked for one unit.
    #[error("Rule '{rule}' panicked: {message}")]
    RulePanicked {
        /// Full name of the rule
        rule: String,
        /// Panic payload, if it was a string
        message: String,
    },

    /// A severity or confidence filter expression could not be parsed.
    #[error("Invalid filter expression: {0}")]
    InvalidFilter(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
