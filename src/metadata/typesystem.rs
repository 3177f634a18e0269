//! Type references, type definitions and their attribute flags.
//!
//! A [`TypeRef`] names a type by namespace, name and resolution scope; it is what operands and
//! signatures carry. A [`TypeDef`] is a type defined in one of the analyzed assemblies and owns
//! its members and nested types. Nested types are named with the `Outer/Inner` convention, so
//! the full name of a nested type is `Namespace.Outer/Inner`.
//!
//! References are resolved to definitions through [`crate::metadata::AssemblyResolver`];
//! resolution is allowed to fail (the declaring assembly may not be loaded) and every caller
//! treats that as "unknown".

use std::fmt;

use bitflags::bitflags;

use crate::metadata::{
    attributes::CustomAttribute,
    members::{EventDef, FieldDef, PropertyDef},
    method::MethodDef,
    token::Token,
};

/// Bitmask for visibility extraction
pub const TYPE_VISIBILITY_MASK: u32 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Type visibility, stored in the low three bits of the type flags
    pub struct TypeVisibility: u32 {
        /// Not visible outside its assembly
        const NOT_PUBLIC = 0x0000;
        /// Visible outside its assembly
        const PUBLIC = 0x0001;
        /// Nested, public
        const NESTED_PUBLIC = 0x0002;
        /// Nested, private
        const NESTED_PRIVATE = 0x0003;
        /// Nested, visible to derived types
        const NESTED_FAMILY = 0x0004;
        /// Nested, visible inside the assembly
        const NESTED_ASSEMBLY = 0x0005;
        /// Nested, visible to derived types inside the assembly
        const NESTED_FAM_AND_ASSEM = 0x0006;
        /// Nested, visible to derived types or inside the assembly
        const NESTED_FAM_OR_ASSEM = 0x0007;
    }
}

impl TypeVisibility {
    /// Extract the visibility from raw type flags
    #[must_use]
    pub fn from_type_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & TYPE_VISIBILITY_MASK)
    }

    /// True when the type can be seen from other assemblies, provided its enclosing types are.
    #[must_use]
    pub fn is_exposed(self) -> bool {
        matches!(
            self,
            TypeVisibility::PUBLIC
                | TypeVisibility::NESTED_PUBLIC
                | TypeVisibility::NESTED_FAMILY
                | TypeVisibility::NESTED_FAM_OR_ASSEM
        )
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Type semantics and layout modifiers
    pub struct TypeModifiers: u32 {
        /// Type is an interface
        const INTERFACE = 0x0020;
        /// Type cannot be instantiated
        const ABSTRACT = 0x0080;
        /// Type cannot be derived from
        const SEALED = 0x0100;
        /// Name carries special meaning
        const SPECIAL_NAME = 0x0400;
        /// Type is serializable
        const SERIALIZABLE = 0x2000;
        /// Static initializer may run before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

impl TypeModifiers {
    /// Extract the modifiers from raw type flags
    #[must_use]
    pub fn from_type_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags)
    }
}

/// A reference to a type, possibly defined in another assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Name; nested types use `Outer/Inner`
    pub name: String,
    /// Name of the assembly defining the type, `None` for the assembly holding the reference
    pub scope: Option<String>,
}

impl TypeRef {
    /// Reference to a type of the current assembly.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeRef {
            namespace: namespace.into(),
            name: name.into(),
            scope: None,
        }
    }

    /// Reference to a type defined in `assembly`.
    pub fn external(
        assembly: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeRef {
            namespace: namespace.into(),
            name: name.into(),
            scope: Some(assembly.into()),
        }
    }

    /// Reference to a type of the core library.
    pub fn corlib(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::external("mscorlib", namespace, name)
    }

    /// `System.Void`
    #[must_use]
    pub fn void() -> Self {
        Self::corlib("System", "Void")
    }

    /// `System.Object`
    #[must_use]
    pub fn object() -> Self {
        Self::corlib("System", "Object")
    }

    /// Full name, e.g. `System.Collections.Generic.List`1` or `Ns.Outer/Inner`.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Compares namespace and name without allocating.
    #[must_use]
    pub fn is_named(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }

    /// True if both references name the same type, whatever their scope.
    #[must_use]
    pub fn is_same(&self, other: &TypeRef) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }

    /// True for `System.Void`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.is_named("System", "Void")
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

/// A type defined in an analyzed assembly.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Identity of the definition
    pub token: Token,
    /// Namespace; nested types share the namespace of their outermost type
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Raw `TypeAttributes`
    pub flags: u32,
    /// Base type, `None` for `System.Object` and interfaces
    pub base_type: Option<TypeRef>,
    /// Implemented interfaces
    pub interfaces: Vec<TypeRef>,
    /// Attributes applied to the type
    pub custom_attributes: Vec<CustomAttribute>,
    /// Fields, in declaration order
    pub fields: Vec<FieldDef>,
    /// Methods including constructors, in declaration order
    pub methods: Vec<MethodDef>,
    /// Properties
    pub properties: Vec<PropertyDef>,
    /// Events
    pub events: Vec<EventDef>,
    /// Types nested inside this one
    pub nested_types: Vec<TypeDef>,
    enclosing: Option<String>,
}

impl TypeDef {
    /// Creates an empty, public, top-level type deriving from `System.Object`.
    pub fn new(token: Token, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeDef {
            token,
            namespace: namespace.into(),
            name: name.into(),
            flags: TypeVisibility::PUBLIC.bits(),
            base_type: Some(TypeRef::object()),
            interfaces: Vec::new(),
            custom_attributes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            nested_types: Vec::new(),
            enclosing: None,
        }
    }

    /// Name inside the namespace, `Outer/Inner` for nested types.
    #[must_use]
    pub fn name_path(&self) -> String {
        match &self.enclosing {
            Some(outer) => format!("{outer}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Full name, e.g. `Ns.Outer/Inner`.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.as_reference().full_name()
    }

    /// Reference naming this definition.
    #[must_use]
    pub fn as_reference(&self) -> TypeRef {
        TypeRef::new(self.namespace.clone(), self.name_path())
    }

    /// True if this type is nested in another type.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.enclosing.is_some()
    }

    /// Visibility bits.
    #[must_use]
    pub fn visibility(&self) -> TypeVisibility {
        TypeVisibility::from_type_flags(self.flags)
    }

    /// Semantic modifiers.
    #[must_use]
    pub fn modifiers(&self) -> TypeModifiers {
        TypeModifiers::from_type_flags(self.flags)
    }

    /// True for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.modifiers().contains(TypeModifiers::INTERFACE)
    }

    /// True if the type carries an attribute of the given full name.
    #[must_use]
    pub fn has_attribute(&self, full_name: &str) -> bool {
        self.custom_attributes.iter().any(|a| a.is(full_name))
    }

    /// Finds a method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Finds a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Adds a method, binding it to this type.
    pub fn add_method(&mut self, mut method: MethodDef) -> &mut Self {
        method.declaring_type = self.as_reference();
        self.methods.push(method);
        self
    }

    /// Adds a field, binding it to this type.
    pub fn add_field(&mut self, mut field: FieldDef) -> &mut Self {
        field.declaring_type = self.as_reference();
        self.fields.push(field);
        self
    }

    /// Adds a property, binding it to this type.
    pub fn add_property(&mut self, mut property: PropertyDef) -> &mut Self {
        property.declaring_type = self.as_reference();
        self.properties.push(property);
        self
    }

    /// Adds an event, binding it to this type.
    pub fn add_event(&mut self, mut event: EventDef) -> &mut Self {
        event.declaring_type = self.as_reference();
        self.events.push(event);
        self
    }

    /// Nests `nested` inside this type. The nested type and everything it contains are renamed
    /// to the `Outer/Inner` form.
    pub fn add_nested_type(&mut self, mut nested: TypeDef) -> &mut Self {
        nested.reparent(&self.namespace, self.name_path());
        self.nested_types.push(nested);
        self
    }

    /// Iterates this type and all nested types, depth first.
    pub fn all_types(&self) -> Box<dyn Iterator<Item = &TypeDef> + '_> {
        Box::new(std::iter::once(self).chain(self.nested_types.iter().flat_map(TypeDef::all_types)))
    }

    fn reparent(&mut self, namespace: &str, enclosing: String) {
        self.namespace = namespace.to_string();
        self.enclosing = Some(enclosing);

        let reference = self.as_reference();
        for method in &mut self.methods {
            method.declaring_type = reference.clone();
        }
        for field in &mut self.fields {
            field.declaring_type = reference.clone();
        }
        for property in &mut self.properties {
            property.declaring_type = reference.clone();
        }
        for event in &mut self.events {
            event.declaring_type = reference.clone();
        }

        let path = self.name_path();
        let namespace = self.namespace.clone();
        for nested in &mut self.nested_types {
            nested.reparent(&namespace, path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::TABLE_TYPEDEF;

    #[test]
    fn test_type_ref_names() {
        let list = TypeRef::corlib("System.Collections", "ArrayList");
        assert_eq!(list.full_name(), "System.Collections.ArrayList");
        assert_eq!(list.to_string(), "System.Collections.ArrayList");
        assert!(list.is_named("System.Collections", "ArrayList"));
        assert!(list.is_same(&TypeRef::new("System.Collections", "ArrayList")));
        assert_eq!(TypeRef::new("", "Global").full_name(), "Global");
        assert!(TypeRef::void().is_void());
    }

    #[test]
    fn test_nested_naming() {
        let mut outer = TypeDef::new(Token::from_parts(TABLE_TYPEDEF, 1), "Ns", "Outer");
        let mut middle = TypeDef::new(Token::from_parts(TABLE_TYPEDEF, 2), "", "Middle");
        let inner = TypeDef::new(Token::from_parts(TABLE_TYPEDEF, 3), "", "Inner");
        middle.add_nested_type(inner);
        outer.add_nested_type(middle);

        let names: Vec<String> = outer.all_types().map(TypeDef::full_name).collect();
        assert_eq!(names, vec!["Ns.Outer", "Ns.Outer/Middle", "Ns.Outer/Middle/Inner"]);
        assert!(outer.nested_types[0].is_nested());
        assert!(!outer.is_nested());
    }

    #[test]
    fn test_visibility() {
        let mut t = TypeDef::new(Token::from_parts(TABLE_TYPEDEF, 1), "Ns", "T");
        assert!(t.visibility().is_exposed());
        t.flags = TypeVisibility::NESTED_PRIVATE.bits() | TypeModifiers::SEALED.bits();
        assert!(!t.visibility().is_exposed());
        assert!(t.modifiers().contains(TypeModifiers::SEALED));
        assert!(!t.is_interface());
    }
}
