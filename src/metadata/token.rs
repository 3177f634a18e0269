//! Metadata tokens identifying types and members.
//!
//! A token packs the metadata table in its high byte and the 1-based row in the lower 24 bits.
//! `dotcheck` uses tokens as identity for definitions: the opcode bitmask cache is keyed by the
//! method token, and the factories hand out unique rows per table.

use std::fmt;

/// Metadata table of `TypeDef` rows.
pub const TABLE_TYPEDEF: u8 = 0x02;
/// Metadata table of `Field` rows.
pub const TABLE_FIELD: u8 = 0x04;
/// Metadata table of `MethodDef` rows.
pub const TABLE_METHODDEF: u8 = 0x06;
/// Metadata table of `Event` rows.
pub const TABLE_EVENT: u8 = 0x14;
/// Metadata table of `Property` rows.
pub const TABLE_PROPERTY: u8 = 0x17;

/// A metadata token: `table << 24 | row`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// Creates a token from its raw value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a row.
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Raw 32-bit value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Table id stored in the high byte.
    #[must_use]
    pub const fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Row index stored in the lower 24 bits.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// A null token (row 0) does not identify anything.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
