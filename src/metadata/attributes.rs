//! Custom attributes attached to assemblies, types and members.
//!
//! Only the pieces rules consult are modelled: the attribute constructor (which names the
//! attribute type), the fixed constructor arguments and the named field/property arguments.

use std::sync::Arc;

use crate::metadata::{
    method::{MethodRef, MethodSig},
    typesystem::TypeRef,
};

/// Represents a single custom attribute argument value
#[derive(Debug, Clone, PartialEq)]
pub enum CustomAttributeArgument {
    /// A `null` string, type or array
    Null,
    /// Boolean value
    Bool(bool),
    /// Character value (16-bit Unicode)
    Char(char),
    /// Signed 32-bit integer
    I4(i32),
    /// Signed 64-bit integer
    I8(i64),
    /// 64-bit floating point
    R8(f64),
    /// UTF-8 string
    String(String),
    /// Type reference (as full name)
    Type(String),
    /// Array of arguments
    Array(Vec<CustomAttributeArgument>),
    /// Enum value (enum type full name + underlying value)
    Enum(String, Box<CustomAttributeArgument>),
}

impl CustomAttributeArgument {
    /// The string payload, if this is a non-null string argument.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CustomAttributeArgument::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for CustomAttributeArgument {
    fn from(value: &str) -> Self {
        CustomAttributeArgument::String(value.to_string())
    }
}

/// Represents a named argument (field or property) in a custom attribute
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeNamedArgument {
    /// Whether this is a field (true) or property (false)
    pub is_field: bool,
    /// Name of the field or property
    pub name: String,
    /// Value of the argument
    pub value: CustomAttributeArgument,
}

/// An applied custom attribute.
#[derive(Debug, Clone)]
pub struct CustomAttribute {
    /// The attribute constructor; its declaring type is the attribute type
    pub constructor: Arc<MethodRef>,
    /// Fixed arguments from the constructor signature
    pub fixed_args: Vec<CustomAttributeArgument>,
    /// Named arguments (fields and properties)
    pub named_args: Vec<CustomAttributeNamedArgument>,
}

impl CustomAttribute {
    /// Creates an attribute of `attribute_type` whose constructor takes one string per argument.
    #[must_use]
    pub fn with_strings(attribute_type: TypeRef, args: &[&str]) -> Self {
        let signature = MethodSig::instance(
            TypeRef::void(),
            args.iter().map(|_| TypeRef::corlib("System", "String")).collect(),
        );
        CustomAttribute {
            constructor: Arc::new(MethodRef::new(attribute_type, ".ctor", signature)),
            fixed_args: args.iter().map(|&a| a.into()).collect(),
            named_args: Vec::new(),
        }
    }

    /// Adds a named property argument.
    #[must_use]
    pub fn with_named(mut self, name: &str, value: CustomAttributeArgument) -> Self {
        self.named_args.push(CustomAttributeNamedArgument {
            is_field: false,
            name: name.to_string(),
            value,
        });
        self
    }

    /// The attribute type.
    #[must_use]
    pub fn attribute_type(&self) -> &TypeRef {
        &self.constructor.declaring_type
    }

    /// True if the attribute type has the given full name.
    #[must_use]
    pub fn is(&self, full_name: &str) -> bool {
        let ty = self.attribute_type();
        if ty.namespace.is_empty() {
            ty.name == full_name
        } else {
            full_name.len() == ty.namespace.len() + 1 + ty.name.len()
                && full_name.starts_with(ty.namespace.as_str())
                && full_name[ty.namespace.len()..].starts_with('.')
                && full_name.ends_with(ty.name.as_str())
        }
    }

    /// String value of the fixed argument at `index`.
    #[must_use]
    pub fn string_argument(&self, index: usize) -> Option<&str> {
        self.fixed_args.get(index).and_then(CustomAttributeArgument::as_str)
    }

    /// Value of the named field or property `name`.
    #[must_use]
    pub fn named_argument(&self, name: &str) -> Option<&CustomAttributeArgument> {
        self.named_args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }
}

/// Finds the first attribute with the given full name.
#[must_use]
pub fn find_attribute<'a>(
    attributes: &'a [CustomAttribute],
    full_name: &str,
) -> Option<&'a CustomAttribute> {
    attributes.iter().find(|a| a.is(full_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_matching() {
        let attr = CustomAttribute::with_strings(
            TypeRef::corlib("System.Reflection", "AssemblyFileVersionAttribute"),
            &["1.2.3.4"],
        );
        assert!(attr.is("System.Reflection.AssemblyFileVersionAttribute"));
        assert!(!attr.is("System.Reflection.AssemblyVersionAttribute"));
        assert!(!attr.is("System.ReflectionXAssemblyFileVersionAttribute"));
        assert_eq!(attr.string_argument(0), Some("1.2.3.4"));
        assert_eq!(attr.string_argument(1), None);
    }

    #[test]
    fn test_named_arguments() {
        let attr = CustomAttribute::with_strings(
            TypeRef::corlib("System.Diagnostics.CodeAnalysis", "SuppressMessageAttribute"),
            &["Design", "AvoidFoo"],
        )
        .with_named("Target", "Ns.T".into());

        assert_eq!(
            attr.named_argument("Target").and_then(CustomAttributeArgument::as_str),
            Some("Ns.T")
        );
        assert!(attr.named_argument("Scope").is_none());
        assert!(find_attribute(
            &[attr],
            "System.Diagnostics.CodeAnalysis.SuppressMessageAttribute"
        )
        .is_some());
    }
}
