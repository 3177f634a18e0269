//! # dotcheck Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotcheck library. Import it to write a rule or drive a run with a single `use`.
//!
//! ```rust
//! use dotcheck::prelude::*;
//!
//! let runner = Runner::new(RunnerConfig::strict());
//! assert_eq!(runner.rules().count(), 0);
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotcheck operations
pub use crate::Error;

/// The result type used throughout dotcheck
pub use crate::Result;

// ================================================================================================
// Running Rules
// ================================================================================================

/// Dispatch of units to rules, and its configuration
pub use crate::rules::{analyze_parallel, AnalysisReport, Runner, RunnerConfig};

/// Results of a run
pub use crate::rules::{Defect, DefectTarget, RuleFailure, RuleOutcome, RuleResult};

/// Ranking and filtering of defects
pub use crate::rules::{Confidence, LevelMask, Severity};

/// Per-rule exclusions
pub use crate::rules::IgnoreList;

// ================================================================================================
// Writing Rules
// ================================================================================================

/// The rule interface and what it receives
pub use crate::rules::{Applicability, Rule, RuleContext, RuleScope};

// ================================================================================================
// Model
// ================================================================================================

/// Containers and identity
pub use crate::metadata::{Assembly, Module, Token, Version};

/// Types, members and references
pub use crate::metadata::{
    CustomAttribute, EventDef, FieldDef, FieldRef, MethodDef, MethodRef, MethodSig, PropertyDef,
    TypeDef, TypeRef,
};

/// Reference resolution
pub use crate::metadata::AssemblyResolver;

// ================================================================================================
// Instructions and Analyses
// ================================================================================================

/// Instruction model
pub use crate::assembly::{Instruction, MethodBody, MethodBodyBuilder, OpCode, Operand};

/// Shared analyses
pub use crate::analysis::{
    trace_back, OpCodeBitmask, OpCodeEngine, StackEntryAnalysis, StackEntryUsage,
};
