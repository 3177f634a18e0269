//! Per-assembly caches the runner hands to every rule.
//!
//! [`OpCodeEngine`] memoizes the opcode bitmask of each method so that any number of rules can
//! ask "does this method contain X" for the price of one scan. [`NamespaceEngine`] indexes the
//! namespaces defined by the assembly under analysis. Both are owned by one runner and are
//! reset at every assembly boundary, so parallel runners never share state.

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;

use crate::{
    analysis::OpCodeBitmask,
    metadata::{Assembly, MethodDef, Token},
};

/// Cache of opcode bitmasks keyed by method token.
///
/// Method tokens are unique within one assembly, which is the lifetime of the cache. Methods
/// with a null token are scanned every time.
#[derive(Debug, Default)]
pub struct OpCodeEngine {
    cache: DashMap<Token, OpCodeBitmask>,
}

impl OpCodeEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opcodes present in `method`; the empty mask for methods without a body.
    pub fn bitmask(&self, method: &MethodDef) -> OpCodeBitmask {
        let Some(body) = &method.body else {
            return OpCodeBitmask::new();
        };
        if method.token.is_null() {
            return Self::scan(body.instructions());
        }
        *self
            .cache
            .entry(method.token)
            .or_insert_with(|| Self::scan(body.instructions()))
    }

    /// Drops every cached mask. Called by the runner before each assembly.
    pub fn reset_for_assembly(&self) {
        self.cache.clear();
    }

    /// Number of cached masks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// True if no bitmask is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn scan(instructions: &[crate::assembly::Instruction]) -> OpCodeBitmask {
        instructions.iter().map(|i| i.opcode).collect()
    }
}

/// Namespaces of the assembly under analysis and the types each one holds.
#[derive(Debug, Default)]
pub struct NamespaceEngine {
    namespaces: BTreeMap<String, BTreeSet<String>>,
}

impl NamespaceEngine {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the index for `assembly`. Nested types are listed under the namespace of their
    /// outermost type.
    pub fn rebuild(&mut self, assembly: &Assembly) {
        self.namespaces.clear();
        for ty in assembly.all_types() {
            self.namespaces
                .entry(ty.namespace.clone())
                .or_default()
                .insert(ty.full_name());
        }
        tracing::debug!(
            "indexed {} namespaces of assembly '{}'",
            self.namespaces.len(),
            assembly.name.name
        );
    }

    /// Namespaces in lexical order; the global namespace is the empty string.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Full names of the types in `namespace`.
    pub fn types_in(&self, namespace: &str) -> impl Iterator<Item = &str> {
        self.namespaces
            .get(namespace)
            .into_iter()
            .flat_map(|types| types.iter().map(String::as_str))
    }

    /// True if some type of the assembly lives in `namespace`.
    #[must_use]
    pub fn contains(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{MethodBodyBuilder, OpCode},
        metadata::{MethodSig, Module, TypeDef, TypeRef},
        Result,
    };

    fn method_with(token: u32, opcodes: &[OpCode]) -> Result<MethodDef> {
        let mut builder = MethodBodyBuilder::new();
        for &op in opcodes {
            builder.emit(op)?;
        }
        Ok(MethodDef::new(
            Token::new(token),
            "M",
            MethodSig::static_method(TypeRef::void(), vec![]),
        )
        .with_body(builder.build()?))
    }

    #[test]
    fn test_bitmask_matches_body() -> Result<()> {
        let engine = OpCodeEngine::new();
        let method = method_with(0x0600_0001, &[OpCode::Ldnull, OpCode::Pop, OpCode::Ret])?;

        let mask = engine.bitmask(&method);
        assert!(mask.get(OpCode::Ldnull));
        assert!(mask.get(OpCode::Pop));
        assert!(mask.get(OpCode::Ret));
        assert_eq!(mask.count(), 3);
        assert_eq!(engine.len(), 1);

        assert_eq!(engine.bitmask(&method), mask);
        assert_eq!(engine.len(), 1);

        engine.reset_for_assembly();
        assert!(engine.is_empty());
        assert_eq!(engine.bitmask(&method), mask);
        Ok(())
    }

    #[test]
    fn test_bodyless_and_null_token() -> Result<()> {
        let engine = OpCodeEngine::new();
        let abstract_method = MethodDef::new(
            Token::new(0x0600_0002),
            "A",
            MethodSig::instance(TypeRef::void(), vec![]),
        );
        assert!(engine.bitmask(&abstract_method).is_empty());

        let anonymous = method_with(0, &[OpCode::Ret])?;
        assert!(engine.bitmask(&anonymous).get(OpCode::Ret));
        assert!(engine.is_empty());
        Ok(())
    }

    #[test]
    fn test_namespace_index() {
        let mut module = Module::new("A.dll");
        let mut outer = TypeDef::new(Token::new(0x0200_0001), "App.Core", "Service");
        outer.add_nested_type(TypeDef::new(Token::new(0x0200_0002), "", "Options"));
        module
            .add_type(outer)
            .add_type(TypeDef::new(Token::new(0x0200_0003), "", "Program"));
        let mut assembly = Assembly::new("A", None);
        assembly.add_module(module);

        let mut engine = NamespaceEngine::new();
        engine.rebuild(&assembly);
        assert_eq!(engine.namespaces().collect::<Vec<_>>(), vec!["", "App.Core"]);
        assert!(engine.contains("App.Core"));
        assert!(!engine.contains("App"));
        assert_eq!(
            engine.types_in("App.Core").collect::<Vec<_>>(),
            vec!["App.Core.Service", "App.Core.Service/Options"]
        );
        assert_eq!(engine.types_in("Missing").count(), 0);
    }
}
