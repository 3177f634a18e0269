//! Resolution of references to definitions.
//!
//! The [`AssemblyResolver`] knows every assembly handed to the runner. References into
//! assemblies that were not loaded (typically the framework) cannot be resolved; every lookup
//! then returns `None` and callers degrade to "unknown" instead of failing.

use std::collections::{HashMap, HashSet};

use crate::metadata::{
    assembly::Assembly,
    members::{FieldDef, FieldRef},
    method::{MethodDef, MethodRef},
    typesystem::{TypeDef, TypeRef},
};

/// Upper bound on base-type hops; guards against cyclic inheritance in malformed input.
const MAX_INHERITANCE_DEPTH: usize = 64;

/// Registry of the assemblies under analysis, indexed by type full name.
pub struct AssemblyResolver<'a> {
    assemblies: Vec<&'a Assembly>,
    types: HashMap<String, Vec<&'a TypeDef>>,
}

impl<'a> AssemblyResolver<'a> {
    /// Indexes all types of `assemblies`.
    pub fn new(assemblies: impl IntoIterator<Item = &'a Assembly>) -> Self {
        let mut resolver = AssemblyResolver {
            assemblies: Vec::new(),
            types: HashMap::new(),
        };
        for assembly in assemblies {
            resolver.add(assembly);
        }
        resolver
    }

    /// Adds one assembly to the registry.
    pub fn add(&mut self, assembly: &'a Assembly) {
        for ty in assembly.all_types() {
            self.types.entry(ty.full_name()).or_default().push(ty);
        }
        self.assemblies.push(assembly);
    }

    /// Assemblies known to the resolver.
    pub fn assemblies(&self) -> impl Iterator<Item = &'a Assembly> + '_ {
        self.assemblies.iter().copied()
    }

    /// Finds a loaded assembly by simple name.
    #[must_use]
    pub fn find_assembly(&self, name: &str) -> Option<&'a Assembly> {
        self.assemblies.iter().copied().find(|a| a.name.name == name)
    }

    /// Resolves a type reference.
    ///
    /// When the reference names its scope and that assembly is loaded, only that assembly is
    /// searched.
    #[must_use]
    pub fn resolve_type(&self, reference: &TypeRef) -> Option<&'a TypeDef> {
        let candidates = self.types.get(&reference.full_name())?;
        if let Some(scope) = reference.scope.as_deref() {
            if let Some(assembly) = self.find_assembly(scope) {
                return assembly
                    .all_types()
                    .find(|t| candidates.iter().any(|c| std::ptr::eq(*c, *t)));
            }
        }
        candidates.first().copied()
    }

    /// Resolves a method reference, looking through the base types of the declaring type.
    #[must_use]
    pub fn resolve_method(&self, reference: &MethodRef) -> Option<&'a MethodDef> {
        let mut current = self.resolve_type(&reference.declaring_type)?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Some(found) = current
                .methods
                .iter()
                .find(|m| m.name == reference.name && m.signature.is_same(&reference.signature))
            {
                return Some(found);
            }
            current = self.resolve_type(current.base_type.as_ref()?)?;
        }
        None
    }

    /// Resolves a field reference, looking through the base types of the declaring type.
    #[must_use]
    pub fn resolve_field(&self, reference: &FieldRef) -> Option<&'a FieldDef> {
        let mut current = self.resolve_type(&reference.declaring_type)?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Some(found) = current.fields.iter().find(|f| f.name == reference.name) {
                return Some(found);
            }
            current = self.resolve_type(current.base_type.as_ref()?)?;
        }
        None
    }

    /// True if `ty` is, or derives from, `namespace.name`.
    ///
    /// Returns false as soon as the base chain leaves the loaded assemblies, so a type deriving
    /// from an unloaded intermediate class is not recognized.
    #[must_use]
    pub fn inherits(&self, ty: &TypeRef, namespace: &str, name: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = ty.clone();
        loop {
            if current.is_named(namespace, name) {
                return true;
            }
            if !seen.insert(current.full_name()) || seen.len() > MAX_INHERITANCE_DEPTH {
                return false;
            }
            let Some(definition) = self.resolve_type(&current) else {
                return false;
            };
            let Some(base) = &definition.base_type else {
                return false;
            };
            current = base.clone();
        }
    }

    /// True if `ty` implements the interface `namespace.name`, directly or through a base type.
    #[must_use]
    pub fn implements(&self, ty: &TypeRef, namespace: &str, name: &str) -> bool {
        let mut current = self.resolve_type(ty);
        for _ in 0..MAX_INHERITANCE_DEPTH {
            let Some(definition) = current else {
                return false;
            };
            if definition
                .interfaces
                .iter()
                .any(|i| i.is_named(namespace, name))
            {
                return true;
            }
            current = definition
                .base_type
                .as_ref()
                .and_then(|b| self.resolve_type(b));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        assembly::Module,
        members::FieldDef,
        method::MethodSig,
        token::{Token, TABLE_FIELD, TABLE_METHODDEF, TABLE_TYPEDEF},
    };

    fn hierarchy() -> Assembly {
        let mut base = TypeDef::new(Token::from_parts(TABLE_TYPEDEF, 1), "Ns", "AppException");
        base.base_type = Some(TypeRef::corlib("System", "Exception"));
        base.add_method(MethodDef::new(
            Token::from_parts(TABLE_METHODDEF, 1),
            "Describe",
            MethodSig::instance(TypeRef::void(), vec![]),
        ));
        base.add_field(FieldDef::new(
            Token::from_parts(TABLE_FIELD, 1),
            "code",
            TypeRef::corlib("System", "Int32"),
        ));

        let mut derived = TypeDef::new(Token::from_parts(TABLE_TYPEDEF, 2), "Ns", "ParseException");
        derived.base_type = Some(TypeRef::new("Ns", "AppException"));

        let mut cyclic = TypeDef::new(Token::from_parts(TABLE_TYPEDEF, 3), "Ns", "Loop");
        cyclic.base_type = Some(TypeRef::new("Ns", "Loop"));

        let mut module = Module::new("App.dll");
        module.add_type(base).add_type(derived).add_type(cyclic);
        let mut assembly = Assembly::new("App", None);
        assembly.add_module(module);
        assembly
    }

    #[test]
    fn test_inherits() {
        let assembly = hierarchy();
        let resolver = AssemblyResolver::new([&assembly]);

        let derived = TypeRef::new("Ns", "ParseException");
        assert!(resolver.inherits(&derived, "System", "Exception"));
        assert!(resolver.inherits(&derived, "Ns", "AppException"));
        assert!(!resolver.inherits(&derived, "System", "Attribute"));
        assert!(!resolver.inherits(&TypeRef::new("Ns", "Loop"), "System", "Exception"));
        assert!(!resolver.inherits(&TypeRef::new("Other", "Missing"), "System", "Exception"));
    }

    #[test]
    fn test_resolve_members_through_base() {
        let assembly = hierarchy();
        let resolver = AssemblyResolver::new([&assembly]);

        let describe = MethodRef::new(
            TypeRef::new("Ns", "ParseException"),
            "Describe",
            MethodSig::instance(TypeRef::void(), vec![]),
        );
        let resolved = resolver.resolve_method(&describe).unwrap();
        assert_eq!(resolved.declaring_type.full_name(), "Ns.AppException");

        let code = FieldRef::new(
            TypeRef::new("Ns", "ParseException"),
            "code",
            TypeRef::corlib("System", "Int32"),
        );
        assert!(resolver.resolve_field(&code).is_some());

        let missing = MethodRef::new(
            TypeRef::corlib("System", "Console"),
            "WriteLine",
            MethodSig::static_method(TypeRef::void(), vec![]),
        );
        assert!(resolver.resolve_method(&missing).is_none());
    }
}
