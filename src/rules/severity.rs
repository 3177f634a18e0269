//! Severity and confidence levels, and masks over them.
//!
//! Both taxonomies are small ordered enums. Adjusting a level saturates at the ends of the
//! scale instead of wrapping, so `Severity::Audit.lower_by(3)` stays `Audit`.

use std::{fmt, marker::PhantomData, str::FromStr};

use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

use crate::{Error, Result};

/// How bad a defect is if it is a true positive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
)]
#[strum(ascii_case_insensitive)]
pub enum Severity {
    /// Worth a look during a review, not a defect by itself
    Audit,
    /// Style or maintainability issue
    Low,
    /// Likely to cause problems in some situations
    Medium,
    /// Likely to cause problems
    High,
    /// Will cause problems: crashes, data loss, security issues
    Critical,
}

/// How sure the rule is that a defect is a true positive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
)]
#[strum(ascii_case_insensitive)]
pub enum Confidence {
    /// Heuristic guess
    Low,
    /// More likely right than wrong
    Normal,
    /// Rarely wrong
    High,
    /// Proven by the analysis
    Total,
}

/// An ordered level of a defect.
pub trait Level: Copy + Ord + fmt::Display + FromStr + IntoEnumIterator + 'static {
    /// Position on the scale, `0` being the lowest level.
    fn ordinal(self) -> usize;

    /// Level `n` steps lower, saturating at the lowest level.
    #[must_use]
    fn lower_by(self, n: usize) -> Self {
        let target = self.ordinal().saturating_sub(n);
        Self::iter().nth(target).unwrap_or(self)
    }

    /// Level `n` steps higher, saturating at the highest level.
    #[must_use]
    fn raise_by(self, n: usize) -> Self {
        let target = self.ordinal().saturating_add(n);
        Self::iter()
            .nth(target)
            .or_else(|| Self::iter().last())
            .unwrap_or(self)
    }
}

impl Level for Severity {
    fn ordinal(self) -> usize {
        self as usize
    }
}

impl Level for Confidence {
    fn ordinal(self) -> usize {
        self as usize
    }
}

/// A set of levels, used to filter reported defects.
///
/// Parses from a comma separated list where each entry is a level name, `name+` for that level
/// and everything above, `name-` for that level and everything below, or `all`.
///
/// # Examples
///
/// ```rust
/// use dotcheck::rules::{LevelMask, Severity};
///
/// let mask: LevelMask<Severity> = "audit,high+".parse()?;
/// assert!(mask.get(Severity::Audit));
/// assert!(!mask.get(Severity::Medium));
/// assert!(mask.get(Severity::Critical));
/// assert_eq!(mask.count(), 3);
/// # Ok::<(), dotcheck::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelMask<T> {
    bits: u8,
    _level: PhantomData<T>,
}

impl<T: Level> LevelMask<T> {
    /// Mask without any level.
    #[must_use]
    pub fn empty() -> Self {
        LevelMask {
            bits: 0,
            _level: PhantomData,
        }
    }

    /// Mask with every level.
    #[must_use]
    pub fn all() -> Self {
        let mut mask = Self::empty();
        mask.set_all();
        mask
    }

    /// Mask with `level` and every level above it.
    #[must_use]
    pub fn at_least(level: T) -> Self {
        let mut mask = Self::empty();
        mask.set_at_least(level);
        mask
    }

    /// Adds `level`.
    pub fn set(&mut self, level: T) {
        self.bits |= 1 << level.ordinal();
    }

    /// Removes `level`.
    pub fn clear(&mut self, level: T) {
        self.bits &= !(1 << level.ordinal());
    }

    /// True if `level` is in the mask.
    #[must_use]
    pub fn get(&self, level: T) -> bool {
        self.bits & (1 << level.ordinal()) != 0
    }

    /// Adds every level.
    pub fn set_all(&mut self) {
        for level in T::iter() {
            self.set(level);
        }
    }

    /// Removes every level.
    pub fn clear_all(&mut self) {
        self.bits = 0;
    }

    /// Adds `level` and every level above it.
    pub fn set_at_least(&mut self, level: T) {
        for l in T::iter().filter(|l| *l >= level) {
            self.set(l);
        }
    }

    /// Adds `level` and every level below it.
    pub fn set_at_most(&mut self, level: T) {
        for l in T::iter().filter(|l| *l <= level) {
            self.set(l);
        }
    }

    /// Number of levels in the mask.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// True if both masks share at least one level.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> bool {
        self.bits & other.bits != 0
    }

    /// True if every level of `self` is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.bits & other.bits == self.bits
    }

    /// Levels in the mask, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        T::iter().filter(move |l| self.get(*l))
    }
}

impl<T: Level> Default for LevelMask<T> {
    fn default() -> Self {
        Self::all()
    }
}

impl<T: Level> FromStr for LevelMask<T> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut mask = Self::empty();
        for entry in s.split(',').map(str::trim) {
            if entry.eq_ignore_ascii_case("all") {
                mask.set_all();
                continue;
            }
            let (name, extend) = match entry.as_bytes().last() {
                Some(b'+') => (&entry[..entry.len() - 1], Some(true)),
                Some(b'-') => (&entry[..entry.len() - 1], Some(false)),
                _ => (entry, None),
            };
            let level = T::from_str(name).map_err(|_| Error::InvalidFilter(entry.to_string()))?;
            match extend {
                Some(true) => mask.set_at_least(level),
                Some(false) => mask.set_at_most(level),
                None => mask.set(level),
            }
        }
        Ok(mask)
    }
}

impl<T: Level> fmt::Debug for LevelMask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|l| l.to_string())).finish()
    }
}

impl<T: Level> fmt::Display for LevelMask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, level) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{level}")?;
        }
        Ok(())
    }
}
