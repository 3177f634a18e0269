//! A fixed-size set of opcodes.
//!
//! [`OpCodeBitmask`] stores one bit per [`OpCode`] ordinal in four 64-bit words, which is
//! enough for all 219 CIL opcodes. Membership, union, intersection and subset tests are a
//! handful of word operations, which is what makes the per-method pre-filter cheap enough to
//! run for every rule on every method.
//!
//! # Example
//!
//! ```rust
//! use dotcheck::analysis::OpCodeBitmask;
//! use dotcheck::assembly::OpCode;
//!
//! let required: OpCodeBitmask = [OpCode::Isinst, OpCode::Ldnull].into_iter().collect();
//! let mut method = OpCodeBitmask::new();
//! method.set(OpCode::Ldarg0);
//! method.set(OpCode::Isinst);
//! assert!(required.intersect(&method));
//! assert!(!required.is_subset_of(&method));
//!
//! method.set(OpCode::Ldnull);
//! assert!(required.is_subset_of(&method));
//! ```

use std::fmt;

use strum::EnumCount;

use crate::assembly::OpCode;

const WORDS: usize = 4;
const _: () = assert!(OpCode::COUNT <= WORDS * 64);

/// A set of opcodes with word-parallel set algebra.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpCodeBitmask {
    words: [u64; WORDS],
}

impl OpCodeBitmask {
    /// Every opcode.
    pub const ALL: OpCodeBitmask = OpCodeBitmask::full();

    /// `call`, `calli`, `callvirt` and `newobj`.
    pub const CALLS: OpCodeBitmask = OpCodeBitmask::from_opcodes(&[
        OpCode::Call,
        OpCode::Calli,
        OpCode::Callvirt,
        OpCode::Newobj,
    ]);

    /// Every `conv.*` opcode, checked or not.
    pub const CONVERSION: OpCodeBitmask = OpCodeBitmask::from_opcodes(&[
        OpCode::ConvI1,
        OpCode::ConvI2,
        OpCode::ConvI4,
        OpCode::ConvI8,
        OpCode::ConvR4,
        OpCode::ConvR8,
        OpCode::ConvU4,
        OpCode::ConvU8,
        OpCode::ConvRUn,
        OpCode::ConvOvfI1Un,
        OpCode::ConvOvfI2Un,
        OpCode::ConvOvfI4Un,
        OpCode::ConvOvfI8Un,
        OpCode::ConvOvfU1Un,
        OpCode::ConvOvfU2Un,
        OpCode::ConvOvfU4Un,
        OpCode::ConvOvfU8Un,
        OpCode::ConvOvfIUn,
        OpCode::ConvOvfUUn,
        OpCode::ConvOvfI1,
        OpCode::ConvOvfU1,
        OpCode::ConvOvfI2,
        OpCode::ConvOvfU2,
        OpCode::ConvOvfI4,
        OpCode::ConvOvfU4,
        OpCode::ConvOvfI8,
        OpCode::ConvOvfU8,
        OpCode::ConvU2,
        OpCode::ConvU1,
        OpCode::ConvI,
        OpCode::ConvOvfI,
        OpCode::ConvOvfU,
        OpCode::ConvU,
    ]);

    /// `ldarg` in all its forms.
    pub const LOAD_ARGUMENT: OpCodeBitmask = OpCodeBitmask::from_opcodes(&[
        OpCode::Ldarg0,
        OpCode::Ldarg1,
        OpCode::Ldarg2,
        OpCode::Ldarg3,
        OpCode::LdargS,
        OpCode::Ldarg,
    ]);

    /// `ldelem` in all its forms, `ldelema` excluded.
    pub const LOAD_ELEMENT: OpCodeBitmask = OpCodeBitmask::from_opcodes(&[
        OpCode::LdelemI1,
        OpCode::LdelemU1,
        OpCode::LdelemI2,
        OpCode::LdelemU2,
        OpCode::LdelemI4,
        OpCode::LdelemU4,
        OpCode::LdelemI8,
        OpCode::LdelemI,
        OpCode::LdelemR4,
        OpCode::LdelemR8,
        OpCode::LdelemRef,
        OpCode::Ldelem,
    ]);

    /// `ldind` in all its forms.
    pub const LOAD_INDIRECT: OpCodeBitmask = OpCodeBitmask::from_opcodes(&[
        OpCode::LdindI1,
        OpCode::LdindU1,
        OpCode::LdindI2,
        OpCode::LdindU2,
        OpCode::LdindI4,
        OpCode::LdindU4,
        OpCode::LdindI8,
        OpCode::LdindI,
        OpCode::LdindR4,
        OpCode::LdindR8,
        OpCode::LdindRef,
    ]);

    /// `ldloc` in all its forms.
    pub const LOAD_LOCAL: OpCodeBitmask = OpCodeBitmask::from_opcodes(&[
        OpCode::Ldloc0,
        OpCode::Ldloc1,
        OpCode::Ldloc2,
        OpCode::Ldloc3,
        OpCode::LdlocS,
        OpCode::Ldloc,
    ]);

    /// `starg` and `starg.s`.
    pub const STORE_ARGUMENT: OpCodeBitmask =
        OpCodeBitmask::from_opcodes(&[OpCode::StargS, OpCode::Starg]);

    /// `stloc` in all its forms.
    pub const STORE_LOCAL: OpCodeBitmask = OpCodeBitmask::from_opcodes(&[
        OpCode::Stloc0,
        OpCode::Stloc1,
        OpCode::Stloc2,
        OpCode::Stloc3,
        OpCode::StlocS,
        OpCode::Stloc,
    ]);

    /// Unconditional transfers: `br`, `br.s`, `leave`, `leave.s`.
    pub const FLOW_CONTROL_BRANCH: OpCodeBitmask =
        OpCodeBitmask::from_opcodes(&[OpCode::BrS, OpCode::Br, OpCode::Leave, OpCode::LeaveS]);

    /// Block exits: `ret`, `endfinally`, `endfilter`.
    pub const FLOW_CONTROL_RETURN: OpCodeBitmask =
        OpCodeBitmask::from_opcodes(&[OpCode::Ret, OpCode::Endfinally, OpCode::Endfilter]);

    /// An empty mask.
    #[must_use]
    pub const fn new() -> Self {
        OpCodeBitmask { words: [0; WORDS] }
    }

    /// A mask holding every opcode.
    #[must_use]
    pub const fn full() -> Self {
        let mut words = [u64::MAX; WORDS];
        let used = OpCode::COUNT % 64;
        if used != 0 {
            words[WORDS - 1] = (1u64 << used) - 1;
        }
        OpCodeBitmask { words }
    }

    /// A mask from raw words, least significant word first. Bits past the last opcode are
    /// dropped.
    #[must_use]
    pub const fn from_words(a: u64, b: u64, c: u64, d: u64) -> Self {
        let full = Self::full();
        OpCodeBitmask {
            words: [
                a & full.words[0],
                b & full.words[1],
                c & full.words[2],
                d & full.words[3],
            ],
        }
    }

    /// A mask holding exactly `opcodes`.
    #[must_use]
    pub const fn from_opcodes(opcodes: &[OpCode]) -> Self {
        let mut words = [0u64; WORDS];
        let mut i = 0;
        while i < opcodes.len() {
            let index = opcodes[i].index();
            words[index / 64] |= 1u64 << (index % 64);
            i += 1;
        }
        OpCodeBitmask { words }
    }

    /// Raw words, least significant word first.
    #[must_use]
    pub const fn words(&self) -> [u64; WORDS] {
        self.words
    }

    /// Adds `opcode`.
    pub fn set(&mut self, opcode: OpCode) {
        let index = opcode.index();
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    /// Removes `opcode`.
    pub fn clear(&mut self, opcode: OpCode) {
        let index = opcode.index();
        self.words[index / 64] &= !(1u64 << (index % 64));
    }

    /// True if `opcode` is in the set.
    #[must_use]
    pub fn get(&self, opcode: OpCode) -> bool {
        let index = opcode.index();
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Adds every opcode.
    pub fn set_all(&mut self) {
        *self = Self::full();
    }

    /// Removes every opcode.
    pub fn clear_all(&mut self) {
        self.words = [0; WORDS];
    }

    /// Bitwise OR of two masks.
    #[must_use]
    pub fn union(&self, other: &OpCodeBitmask) -> OpCodeBitmask {
        let mut result = *self;
        result.union_with(other);
        result
    }

    /// In-place union; returns `true` if `self` changed.
    pub fn union_with(&mut self, other: &OpCodeBitmask) -> bool {
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            let old = *a;
            *a |= *b;
            changed |= old != *a;
        }
        changed
    }

    /// True if the two masks share at least one opcode.
    #[must_use]
    pub fn intersect(&self, other: &OpCodeBitmask) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// True if every opcode of `self` is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &OpCodeBitmask) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *a)
    }

    /// True if every opcode of `other` is also in `self`.
    #[must_use]
    pub fn is_superset_of(&self, other: &OpCodeBitmask) -> bool {
        other.is_subset_of(self)
    }

    /// Number of opcodes in the mask.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True if no opcode is in the set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Opcodes in the mask, in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = OpCode> + '_ {
        (0..OpCode::COUNT)
            .filter(|&index| self.words[index / 64] & (1u64 << (index % 64)) != 0)
            .filter_map(OpCode::from_index)
    }
}

impl FromIterator<OpCode> for OpCodeBitmask {
    fn from_iter<I: IntoIterator<Item = OpCode>>(iter: I) -> Self {
        let mut mask = OpCodeBitmask::new();
        for opcode in iter {
            mask.set(opcode);
        }
        mask
    }
}

impl fmt::Debug for OpCodeBitmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OpCodeBitmask(0x{:x}, 0x{:x}, 0x{:x}, 0x{:x})",
            self.words[0], self.words[1], self.words[2], self.words[3]
        )
    }
}

impl fmt::Display for OpCodeBitmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, opcode) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(opcode.mnemonic())?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_set_get_clear() {
        let mut mask = OpCodeBitmask::new();
        assert!(mask.is_empty());
        mask.set(OpCode::Ldnull);
        mask.set(OpCode::Readonly);
        assert!(mask.get(OpCode::Ldnull));
        assert!(mask.get(OpCode::Readonly));
        assert!(!mask.get(OpCode::Nop));
        assert_eq!(mask.count(), 2);
        mask.clear(OpCode::Ldnull);
        assert!(!mask.get(OpCode::Ldnull));
        mask.clear_all();
        assert!(mask.is_empty());
    }

    #[test]
    fn test_known_bit_positions() {
        let mask = OpCodeBitmask::from_opcodes(&[OpCode::Isinst, OpCode::Ldnull]);
        assert_eq!(mask.words(), [0x10_0000, 0x10_0000_0000_0000, 0, 0]);
        assert_eq!(
            OpCodeBitmask::from_words(0x10_0000, 0x10_0000_0000_0000, 0, 0),
            mask
        );
    }

    #[test]
    fn test_full_mask() {
        let full = OpCodeBitmask::ALL;
        assert_eq!(full.count(), OpCode::COUNT);
        assert!(OpCode::iter().all(|op| full.get(op)));
        assert_eq!(OpCodeBitmask::from_words(u64::MAX, u64::MAX, u64::MAX, u64::MAX), full);

        let mut mask = OpCodeBitmask::new();
        mask.set_all();
        assert_eq!(mask, full);
    }

    #[test]
    fn test_algebra() {
        let a: OpCodeBitmask = [OpCode::Call, OpCode::Ret].into_iter().collect();
        let b: OpCodeBitmask = [OpCode::Ret, OpCode::Throw].into_iter().collect();
        let c: OpCodeBitmask = [OpCode::Nop].into_iter().collect();

        let u = a.union(&b);
        assert!(u.is_superset_of(&a));
        assert!(u.is_superset_of(&b));
        assert_eq!(u.count(), 3);
        assert!(a.intersect(&b));
        assert!(!a.intersect(&c));
        assert!(a.is_subset_of(&a));
        assert!(!a.is_subset_of(&b));
        assert!(OpCodeBitmask::new().is_subset_of(&c));

        let mut d = a;
        assert!(d.union_with(&c));
        assert!(!d.union_with(&c));
    }

    #[test]
    fn test_predefined_masks_match_predicates() {
        for op in OpCode::iter() {
            assert_eq!(OpCodeBitmask::CALLS.get(op), op.is_call(), "{op}");
            assert_eq!(OpCodeBitmask::CONVERSION.get(op), op.is_conversion(), "{op}");
            assert_eq!(OpCodeBitmask::LOAD_ARGUMENT.get(op), op.is_load_argument(), "{op}");
            assert_eq!(OpCodeBitmask::LOAD_LOCAL.get(op), op.is_load_local(), "{op}");
            assert_eq!(OpCodeBitmask::STORE_LOCAL.get(op), op.is_store_local(), "{op}");
            assert_eq!(OpCodeBitmask::STORE_ARGUMENT.get(op), op.is_store_argument(), "{op}");
            assert_eq!(OpCodeBitmask::LOAD_ELEMENT.get(op), op.is_load_element(), "{op}");
            assert_eq!(OpCodeBitmask::LOAD_INDIRECT.get(op), op.is_load_indirect(), "{op}");
        }
    }

    #[test]
    fn test_iter_and_display() {
        let mask: OpCodeBitmask = [OpCode::Ret, OpCode::Nop].into_iter().collect();
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![OpCode::Nop, OpCode::Ret]);
        assert_eq!(mask.to_string(), "[nop, ret]");
    }
}
