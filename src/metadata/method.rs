//! Method signatures, references and definitions.
//!
//! A [`MethodRef`] is what `call`, `callvirt`, `newobj`, `ldftn` and friends carry as their
//! operand: the declaring type, the name and the signature of the callee. The stack effect of a
//! call instruction is derived from that signature (see [`crate::analysis::pop_count`]).
//!
//! A [`MethodDef`] is a method defined in an analyzed assembly. It owns its optional
//! [`MethodBody`] and exposes the access and modifier flags rules filter on.
//!
//! # Full names
//!
//! Methods are named in the conventional `ReturnType DeclaringType::Name(Param,Param)` form,
//! for example `System.Void Ns.Worker::Run(System.Int32,System.String)`. Ignore lists and
//! defect locations use this form.

use std::{fmt, sync::Arc};

use bitflags::bitflags;

use crate::{
    assembly::MethodBody,
    metadata::{attributes::CustomAttribute, token::Token, typesystem::TypeRef},
};

/// A reference-counted `MethodRef`, shared between operands
pub type MethodRefRc = Arc<MethodRef>;

/// Bitmask for `ACCESS` state extraction
pub const METHOD_ACCESS_MASK: u32 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access flags
    pub struct MethodAccessFlags: u32 {
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this Assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessibly by anyone in the Assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// Extract access flags from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & METHOD_ACCESS_MASK)
    }

    /// True for accessibilities reachable from outside the assembly.
    #[must_use]
    pub fn is_exposed(self) -> bool {
        matches!(
            self,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::FAMILY | MethodAccessFlags::FAM_OR_ASSEM
        )
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method modifiers and properties
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, depending upon the name of the method
        const RTSPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

impl MethodModifiers {
    /// Extract method modifiers from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & !METHOD_ACCESS_MASK)
    }
}

/// A method signature: receiver, parameter types and return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// Instance method, the receiver is passed as an implicit first argument
    pub has_this: bool,
    /// Declared parameter types, excluding the receiver
    pub parameters: Vec<TypeRef>,
    /// Return type, `System.Void` for none
    pub return_type: TypeRef,
}

impl MethodSig {
    /// Signature of an instance method.
    #[must_use]
    pub fn instance(return_type: TypeRef, parameters: Vec<TypeRef>) -> Self {
        MethodSig {
            has_this: true,
            parameters,
            return_type,
        }
    }

    /// Signature of a static method.
    #[must_use]
    pub fn static_method(return_type: TypeRef, parameters: Vec<TypeRef>) -> Self {
        MethodSig {
            has_this: false,
            parameters,
            return_type,
        }
    }

    /// Number of declared parameters, excluding the receiver.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.parameters.len()
    }

    /// True if the return type is `System.Void`.
    #[must_use]
    pub fn returns_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// Compares two signatures by type names, ignoring resolution scopes.
    #[must_use]
    pub fn is_same(&self, other: &MethodSig) -> bool {
        self.has_this == other.has_this
            && self.return_type.is_same(&other.return_type)
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.is_same(b))
    }

    /// `(System.Int32,System.String)`
    fn write_parameters(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

/// A reference to a method, as carried by call operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Type declaring the method
    pub declaring_type: TypeRef,
    /// Method name
    pub name: String,
    /// Signature used for the call
    pub signature: MethodSig,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(declaring_type: TypeRef, name: impl Into<String>, signature: MethodSig) -> Self {
        MethodRef {
            declaring_type,
            name: name.into(),
            signature,
        }
    }

    /// True for instance (`.ctor`) and type (`.cctor`) constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor" || self.name == ".cctor"
    }

    /// Full name, e.g. `System.Void System.Threading.Thread::Start()`.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}::{}",
            self.signature.return_type, self.declaring_type, self.name
        )?;
        self.signature.write_parameters(f)
    }
}

/// A method defined in an analyzed assembly.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Identity of the definition; the opcode bitmask cache is keyed by it
    pub token: Token,
    /// Method name
    pub name: String,
    /// Raw `MethodAttributes`
    pub flags: u32,
    /// Declared signature
    pub signature: MethodSig,
    /// IL body, `None` for abstract, extern and runtime methods
    pub body: Option<MethodBody>,
    /// Attributes applied to the method
    pub custom_attributes: Vec<CustomAttribute>,
    /// Type declaring the method, set when the method is added to a type
    pub declaring_type: TypeRef,
}

impl MethodDef {
    /// Creates a public method without a body.
    pub fn new(token: Token, name: impl Into<String>, signature: MethodSig) -> Self {
        let mut flags = MethodAccessFlags::PUBLIC.bits() | MethodModifiers::HIDE_BY_SIG.bits();
        if !signature.has_this {
            flags |= MethodModifiers::STATIC.bits();
        }
        MethodDef {
            token,
            name: name.into(),
            flags,
            signature,
            body: None,
            custom_attributes: Vec::new(),
            declaring_type: TypeRef::new("", "<Module>"),
        }
    }

    /// Attaches a body.
    #[must_use]
    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Replaces the access bits, keeping the modifiers.
    #[must_use]
    pub fn with_access(mut self, access: MethodAccessFlags) -> Self {
        self.flags = (self.flags & !METHOD_ACCESS_MASK) | access.bits();
        self
    }

    /// Accessibility bits.
    #[must_use]
    pub fn access(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_method_flags(self.flags)
    }

    /// Semantic modifiers (`static`, `virtual`, ...).
    #[must_use]
    pub fn modifiers(&self) -> MethodModifiers {
        MethodModifiers::from_method_flags(self.flags)
    }

    /// True for `static` methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers().contains(MethodModifiers::STATIC)
    }

    /// True for `virtual` methods.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.modifiers().contains(MethodModifiers::VIRTUAL)
    }

    /// True for `abstract` methods.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers().contains(MethodModifiers::ABSTRACT)
    }

    /// True for instance (`.ctor`) and type (`.cctor`) constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor" || self.name == ".cctor"
    }

    /// True if the method has IL.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// True if the method carries an attribute of the given full name.
    #[must_use]
    pub fn has_attribute(&self, full_name: &str) -> bool {
        self.custom_attributes.iter().any(|a| a.is(full_name))
    }

    /// A reference naming this definition.
    #[must_use]
    pub fn as_reference(&self) -> MethodRef {
        MethodRef::new(
            self.declaring_type.clone(),
            self.name.clone(),
            self.signature.clone(),
        )
    }

    /// Full name, e.g. `System.Void Ns.T::M(System.Int32)`.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.as_reference().to_string()
    }
}

/// A partial method signature rules match call operands and definitions against.
///
/// Every criterion left as `None` matches anything.
#[derive(Debug, Clone, Default)]
pub struct MethodSignature {
    /// Required method name
    pub name: Option<String>,
    /// Required return type full name
    pub return_type: Option<String>,
    /// Required parameter type full names, in order
    pub parameters: Option<Vec<String>>,
    /// Modifier bits that must all be present on a definition
    pub modifiers: Option<MethodModifiers>,
}

impl MethodSignature {
    /// Matches by name only.
    pub fn named(name: impl Into<String>) -> Self {
        MethodSignature {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Also require a return type.
    #[must_use]
    pub fn returning(mut self, full_name: &str) -> Self {
        self.return_type = Some(full_name.to_string());
        self
    }

    /// Also require the exact parameter list.
    #[must_use]
    pub fn with_parameters(mut self, full_names: &[&str]) -> Self {
        self.parameters = Some(full_names.iter().map(|p| (*p).to_string()).collect());
        self
    }

    /// Also require modifier bits (only checked against definitions).
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: MethodModifiers) -> Self {
        self.modifiers = Some(modifiers);
        self
    }

    /// Matches a method reference; modifier requirements are ignored.
    #[must_use]
    pub fn matches(&self, method: &MethodRef) -> bool {
        self.matches_parts(&method.name, &method.signature)
    }

    /// Matches a method definition, including modifier requirements.
    #[must_use]
    pub fn matches_definition(&self, method: &MethodDef) -> bool {
        if let Some(required) = self.modifiers {
            if !method.modifiers().contains(required) {
                return false;
            }
        }
        self.matches_parts(&method.name, &method.signature)
    }

    fn matches_parts(&self, name: &str, signature: &MethodSig) -> bool {
        if self.name.as_deref().is_some_and(|n| n != name) {
            return false;
        }
        if let Some(ret) = &self.return_type {
            if signature.return_type.full_name() != *ret {
                return false;
            }
        }
        if let Some(params) = &self.parameters {
            if params.len() != signature.parameters.len() {
                return false;
            }
            if params
                .iter()
                .zip(&signature.parameters)
                .any(|(expected, actual)| actual.full_name() != *expected)
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::TABLE_METHODDEF;

    fn int32() -> TypeRef {
        TypeRef::corlib("System", "Int32")
    }

    #[test]
    fn test_method_ref_full_name() {
        let start = MethodRef::new(
            TypeRef::corlib("System.Threading", "Thread"),
            "Start",
            MethodSig::instance(TypeRef::void(), vec![]),
        );
        assert_eq!(
            start.full_name(),
            "System.Void System.Threading.Thread::Start()"
        );

        let add = MethodRef::new(
            TypeRef::new("Ns", "Calc"),
            "Add",
            MethodSig::static_method(int32(), vec![int32(), int32()]),
        );
        assert_eq!(
            add.to_string(),
            "System.Int32 Ns.Calc::Add(System.Int32,System.Int32)"
        );
    }

    #[test]
    fn test_method_def_flags() {
        let method = MethodDef::new(
            Token::from_parts(TABLE_METHODDEF, 1),
            "Run",
            MethodSig::static_method(TypeRef::void(), vec![]),
        );
        assert!(method.is_static());
        assert!(!method.is_virtual());
        assert!(method.access().is_exposed());

        let hidden = method.with_access(MethodAccessFlags::PRIVATE);
        assert_eq!(hidden.access(), MethodAccessFlags::PRIVATE);
        assert!(!hidden.access().is_exposed());
        assert!(hidden.is_static());
    }

    #[test]
    fn test_method_signature_matching() {
        let parse = MethodRef::new(
            int32(),
            "Parse",
            MethodSig::static_method(int32(), vec![TypeRef::corlib("System", "String")]),
        );

        assert!(MethodSignature::named("Parse").matches(&parse));
        assert!(MethodSignature::named("Parse")
            .returning("System.Int32")
            .with_parameters(&["System.String"])
            .matches(&parse));
        assert!(!MethodSignature::named("Parse")
            .with_parameters(&["System.String", "System.IFormatProvider"])
            .matches(&parse));
        assert!(!MethodSignature::named("TryParse").matches(&parse));
        assert!(MethodSignature::default().matches(&parse));
    }
}
