//! Runner configuration
//!
//! This module holds the knobs of one analysis run: which severities and confidences are kept,
//! when to stop, and which optional bookkeeping the runner performs.

use crate::rules::{Confidence, LevelMask, Severity};

/// Configuration for one analysis run
///
/// Defects outside the severity or confidence masks are dropped when they are reported and do
/// not count toward the rule's result for that unit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunnerConfig {
    /// Severities that are kept (default: all)
    pub severity: LevelMask<Severity>,

    /// Confidences that are kept (default: all)
    pub confidence: LevelMask<Confidence>,

    /// Stop after this many defects have been kept (default: unlimited)
    /// Once reached, further defects are dropped and no further units are visited
    pub defect_limit: Option<usize>,

    /// Let `analyze_parallel` fan out across assemblies (default: true)
    pub parallel: bool,

    /// Keep one outcome per rule and unit in the report (default: false)
    /// Useful for coverage statistics; large assemblies produce many outcomes
    pub record_outcomes: bool,

    /// Add the `[SuppressMessage]` attributes of the assemblies to the ignore list (default: true)
    pub honor_suppressions: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            severity: LevelMask::all(),
            confidence: LevelMask::all(),
            defect_limit: None,
            parallel: true,
            record_outcomes: false,
            honor_suppressions: true,
        }
    }
}

impl RunnerConfig {
    /// Creates a configuration that only keeps findings worth acting on
    ///
    /// High and Critical severity, Normal confidence or better.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            severity: LevelMask::at_least(Severity::High),
            confidence: LevelMask::at_least(Confidence::Normal),
            ..Self::default()
        }
    }

    /// Creates a configuration that keeps everything and records every outcome
    ///
    /// Suppressions are ignored so that suppressed findings show up too.
    #[must_use]
    pub fn audit() -> Self {
        Self {
            record_outcomes: true,
            honor_suppressions: false,
            ..Self::default()
        }
    }

    /// Creates a configuration with the least bookkeeping
    ///
    /// No outcomes, no suppression scan, single threaded.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            parallel: false,
            record_outcomes: false,
            honor_suppressions: false,
            ..Self::default()
        }
    }

    /// Sets the severity mask.
    #[must_use]
    pub fn with_severity(mut self, severity: LevelMask<Severity>) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the confidence mask.
    #[must_use]
    pub fn with_confidence(mut self, confidence: LevelMask<Confidence>) -> Self {
        self.confidence = confidence;
        self
    }

    /// Sets the defect limit.
    #[must_use]
    pub fn with_defect_limit(mut self, limit: usize) -> Self {
        self.defect_limit = Some(limit);
        self
    }

    /// True if a defect with these levels passes both masks.
    #[must_use]
    pub fn accepts(&self, severity: Severity, confidence: Confidence) -> bool {
        self.severity.get(severity) && self.confidence.get(confidence)
    }
}
