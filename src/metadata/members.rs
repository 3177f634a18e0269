//! Fields, properties and events.

use std::{fmt, sync::Arc};

use bitflags::bitflags;

use crate::metadata::{attributes::CustomAttribute, token::Token, typesystem::TypeRef};

/// A reference-counted `FieldRef`, shared between operands
pub type FieldRefRc = Arc<FieldRef>;

/// Bitmask for `ACCESS` state extraction
pub const FIELD_ACCESS_MASK: u32 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field access flags
    pub struct FieldAccessFlags: u32 {
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this Assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessibly by anyone in the Assembly
        const ASSEMBLY = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
    }
}

impl FieldAccessFlags {
    /// Extract access flags from raw field attributes
    #[must_use]
    pub fn from_field_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & FIELD_ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field modifiers
    pub struct FieldModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
    }
}

impl FieldModifiers {
    /// Extract modifiers from raw field attributes
    #[must_use]
    pub fn from_field_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & !FIELD_ACCESS_MASK)
    }
}

/// A reference to a field, as carried by `ldfld`/`stfld`/`ldsfld`/`stsfld` operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Type declaring the field
    pub declaring_type: TypeRef,
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: TypeRef,
}

impl FieldRef {
    /// Creates a field reference.
    pub fn new(declaring_type: TypeRef, name: impl Into<String>, field_type: TypeRef) -> Self {
        FieldRef {
            declaring_type,
            name: name.into(),
            field_type,
        }
    }

    /// Full name, e.g. `System.Int32 Ns.T::count`.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}::{}",
            self.field_type, self.declaring_type, self.name
        )
    }
}

/// A field defined in an analyzed type.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Identity of the definition
    pub token: Token,
    /// Field name
    pub name: String,
    /// Raw `FieldAttributes`
    pub flags: u32,
    /// Field type
    pub field_type: TypeRef,
    /// Attributes applied to the field
    pub custom_attributes: Vec<CustomAttribute>,
    /// Type declaring the field, set when the field is added to a type
    pub declaring_type: TypeRef,
}

impl FieldDef {
    /// Creates a private instance field.
    pub fn new(token: Token, name: impl Into<String>, field_type: TypeRef) -> Self {
        FieldDef {
            token,
            name: name.into(),
            flags: FieldAccessFlags::PRIVATE.bits(),
            field_type,
            custom_attributes: Vec::new(),
            declaring_type: TypeRef::new("", "<Module>"),
        }
    }

    /// Accessibility bits.
    #[must_use]
    pub fn access(&self) -> FieldAccessFlags {
        FieldAccessFlags::from_field_flags(self.flags)
    }

    /// True for `static` fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        FieldModifiers::from_field_flags(self.flags).contains(FieldModifiers::STATIC)
    }

    /// True if the field can be seen from outside the assembly, provided its type can.
    #[must_use]
    pub fn is_exposed(&self) -> bool {
        matches!(
            self.access(),
            FieldAccessFlags::PUBLIC | FieldAccessFlags::FAMILY | FieldAccessFlags::FAM_OR_ASSEM
        )
    }

    /// Whether a field reference names this definition.
    #[must_use]
    pub fn matches(&self, field: &FieldRef) -> bool {
        self.name == field.name && self.declaring_type.is_same(&field.declaring_type)
    }

    /// A reference naming this definition.
    #[must_use]
    pub fn as_reference(&self) -> FieldRef {
        FieldRef::new(
            self.declaring_type.clone(),
            self.name.clone(),
            self.field_type.clone(),
        )
    }

    /// Full name, e.g. `System.Int32 Ns.T::count`.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.as_reference().to_string()
    }
}

/// A property; its accessors are methods of the declaring type.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    /// Identity of the definition
    pub token: Token,
    /// Property name
    pub name: String,
    /// Property type
    pub property_type: TypeRef,
    /// Token of the getter method, if any
    pub getter: Option<Token>,
    /// Token of the setter method, if any
    pub setter: Option<Token>,
    /// Attributes applied to the property
    pub custom_attributes: Vec<CustomAttribute>,
    /// Type declaring the property
    pub declaring_type: TypeRef,
}

impl PropertyDef {
    /// Creates a property without accessors.
    pub fn new(token: Token, name: impl Into<String>, property_type: TypeRef) -> Self {
        PropertyDef {
            token,
            name: name.into(),
            property_type,
            getter: None,
            setter: None,
            custom_attributes: Vec::new(),
            declaring_type: TypeRef::new("", "<Module>"),
        }
    }

    /// Tokens of the accessors that exist.
    pub fn accessors(&self) -> impl Iterator<Item = Token> {
        self.getter.into_iter().chain(self.setter)
    }

    /// Full name, e.g. `System.String Ns.T::Name()`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!(
            "{} {}::{}()",
            self.property_type, self.declaring_type, self.name
        )
    }
}

/// An event; its accessors are methods of the declaring type.
#[derive(Debug, Clone)]
pub struct EventDef {
    /// Identity of the definition
    pub token: Token,
    /// Event name
    pub name: String,
    /// Delegate type of the event
    pub event_type: TypeRef,
    /// Token of the `add_` method, if any
    pub add_method: Option<Token>,
    /// Token of the `remove_` method, if any
    pub remove_method: Option<Token>,
    /// Attributes applied to the event
    pub custom_attributes: Vec<CustomAttribute>,
    /// Type declaring the event
    pub declaring_type: TypeRef,
}

impl EventDef {
    /// Creates an event without accessors.
    pub fn new(token: Token, name: impl Into<String>, event_type: TypeRef) -> Self {
        EventDef {
            token,
            name: name.into(),
            event_type,
            add_method: None,
            remove_method: None,
            custom_attributes: Vec::new(),
            declaring_type: TypeRef::new("", "<Module>"),
        }
    }

    /// Tokens of the accessors that exist.
    pub fn accessors(&self) -> impl Iterator<Item = Token> {
        self.add_method.into_iter().chain(self.remove_method)
    }

    /// Full name, e.g. `System.EventHandler Ns.T::Changed`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}::{}", self.event_type, self.declaring_type, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::TABLE_FIELD;

    #[test]
    fn test_field_names_and_flags() {
        let mut field = FieldDef::new(
            Token::from_parts(TABLE_FIELD, 1),
            "count",
            TypeRef::corlib("System", "Int32"),
        );
        field.declaring_type = TypeRef::new("Ns", "T");
        assert_eq!(field.full_name(), "System.Int32 Ns.T::count");
        assert!(!field.is_exposed());
        assert!(!field.is_static());

        field.flags = FieldAccessFlags::PUBLIC.bits() | FieldModifiers::STATIC.bits();
        assert!(field.is_exposed());
        assert!(field.is_static());

        let reference = FieldRef::new(TypeRef::new("Ns", "T"), "count", TypeRef::object());
        assert!(field.matches(&reference));
    }
}
