//! Per-rule ignore list and `[SuppressMessage]` collection.
//!
//! Entries are kept by name so that the list can be filled before the assemblies are loaded.
//! Members are keyed by their full name without the leading type, e.g. `Ns.T::M(System.Int32)`
//! for a method or `Ns.T::count` for a field, which is also the form `[SuppressMessage]`
//! targets use.

use std::collections::{HashMap, HashSet};

use crate::metadata::{Assembly, CustomAttribute, TypeDef};

/// Full name of the attribute read by [`collect_suppressions`].
pub const SUPPRESS_MESSAGE: &str = "System.Diagnostics.CodeAnalysis.SuppressMessageAttribute";

/// Member key of a full name: everything after the first space, or the name unchanged.
///
/// ```rust
/// use dotcheck::rules::member_key;
///
/// assert_eq!(member_key("System.Void Ns.T::M(System.Int32)"), "Ns.T::M(System.Int32)");
/// assert_eq!(member_key("Ns.T::M()"), "Ns.T::M()");
/// ```
#[must_use]
pub fn member_key(full_name: &str) -> &str {
    match full_name.split_once(' ') {
        Some((_, key)) => key,
        None => full_name,
    }
}

/// What a suppression covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SuppressionTarget {
    /// The whole assembly
    Assembly,
    /// A type, its members and its nested types
    Type(String),
    /// A single member, by member key
    Member(String),
}

/// One `[SuppressMessage]` found in an assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Suppression {
    /// Rule full name, `Category.CheckId`
    pub rule: String,
    /// Suppressed element
    pub target: SuppressionTarget,
}

#[derive(Debug, Default, Clone)]
struct Entry {
    assemblies: HashSet<String>,
    // `None` scope applies to every assembly
    types: HashSet<(Option<String>, String)>,
    members: HashSet<(Option<String>, String)>,
}

impl Entry {
    fn has_type(&self, assembly: &str, name: &str) -> bool {
        self.types.contains(&(None, name.to_string()))
            || self
                .types
                .contains(&(Some(assembly.to_string()), name.to_string()))
    }

    fn has_member(&self, assembly: &str, key: &str) -> bool {
        self.members.contains(&(None, key.to_string()))
            || self
                .members
                .contains(&(Some(assembly.to_string()), key.to_string()))
    }
}

/// Elements each rule must skip.
///
/// A type entry covers the type's members and every type nested in it. An assembly entry covers
/// everything inside the assembly.
#[derive(Debug, Default, Clone)]
pub struct IgnoreList {
    rules: HashMap<String, Entry>,
}

impl IgnoreList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignores `rule` for the assembly with simple name `assembly`.
    pub fn add_assembly(&mut self, rule: &str, assembly: &str) {
        self.entry(rule).assemblies.insert(assembly.to_string());
    }

    /// Ignores `rule` for the type `full_name` (`Ns.Outer/Inner`) in any assembly.
    pub fn add_type(&mut self, rule: &str, full_name: &str) {
        self.entry(rule).types.insert((None, full_name.to_string()));
    }

    /// Ignores `rule` for a member in any assembly. Accepts a full name with or without the
    /// leading type.
    pub fn add_member(&mut self, rule: &str, name: &str) {
        self.entry(rule)
            .members
            .insert((None, member_key(name).to_string()));
    }

    /// Adds the suppressions declared by `assembly`, scoped to that assembly.
    pub fn add_suppressions(&mut self, assembly: &Assembly) -> usize {
        let scope = assembly.name.name.clone();
        let suppressions = collect_suppressions(assembly);
        let count = suppressions.len();
        for suppression in suppressions {
            let entry = self.entry(&suppression.rule);
            match suppression.target {
                SuppressionTarget::Assembly => {
                    entry.assemblies.insert(scope.clone());
                }
                SuppressionTarget::Type(name) => {
                    entry.types.insert((Some(scope.clone()), name));
                }
                SuppressionTarget::Member(key) => {
                    entry.members.insert((Some(scope.clone()), key));
                }
            }
        }
        count
    }

    /// True if `rule` must skip the assembly.
    #[must_use]
    pub fn ignores_assembly(&self, rule: &str, assembly: &str) -> bool {
        self.rules
            .get(rule)
            .is_some_and(|e| e.assemblies.contains(assembly))
    }

    /// True if `rule` must skip the type, because of the type itself, an enclosing type, or the
    /// assembly.
    #[must_use]
    pub fn ignores_type(&self, rule: &str, assembly: &str, full_name: &str) -> bool {
        let Some(entry) = self.rules.get(rule) else {
            return false;
        };
        if entry.assemblies.contains(assembly) {
            return true;
        }
        let mut name = full_name;
        loop {
            if entry.has_type(assembly, name) {
                return true;
            }
            match name.rfind('/') {
                Some(split) => name = &name[..split],
                None => return false,
            }
        }
    }

    /// True if `rule` must skip a member of `declaring_type`. `name` is the member's full name.
    #[must_use]
    pub fn ignores_member(
        &self,
        rule: &str,
        assembly: &str,
        declaring_type: &str,
        name: &str,
    ) -> bool {
        self.rules
            .get(rule)
            .is_some_and(|e| e.has_member(assembly, member_key(name)))
            || self.ignores_type(rule, assembly, declaring_type)
    }

    /// Number of rules with at least one entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if nothing is ignored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    fn entry(&mut self, rule: &str) -> &mut Entry {
        self.rules.entry(rule.to_string()).or_default()
    }
}

/// Reads the `[SuppressMessage]` attributes of an assembly, its types and their members.
///
/// The rule name is `category + "." + checkId`; attributes with an empty category or check id
/// are skipped. Only assembly-level attributes may name a `Target`; it is normalized (`+` to
/// `/` for nested types, `.#` to `::` for members) and read as a member key when it contains
/// `::`, as a type name otherwise.
#[must_use]
pub fn collect_suppressions(assembly: &Assembly) -> Vec<Suppression> {
    let mut found = Vec::new();

    for attribute in suppress_messages(&assembly.custom_attributes) {
        let Some(rule) = rule_name(attribute) else {
            continue;
        };
        let target = attribute
            .named_argument("Target")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map_or(SuppressionTarget::Assembly, |target| {
                let target = target.replace('+', "/").replace(".#", "::");
                if target.contains("::") {
                    SuppressionTarget::Member(target)
                } else {
                    SuppressionTarget::Type(target)
                }
            });
        found.push(Suppression { rule, target });
    }

    for ty in assembly.all_types() {
        collect_from_type(ty, &mut found);
    }
    found
}

fn collect_from_type(ty: &TypeDef, found: &mut Vec<Suppression>) {
    let mut add = |attributes: &[CustomAttribute], target: SuppressionTarget| {
        for attribute in suppress_messages(attributes) {
            if let Some(rule) = rule_name(attribute) {
                found.push(Suppression {
                    rule,
                    target: target.clone(),
                });
            }
        }
    };

    add(&ty.custom_attributes, SuppressionTarget::Type(ty.full_name()));
    for method in &ty.methods {
        let key = member_key(&method.full_name()).to_string();
        add(&method.custom_attributes, SuppressionTarget::Member(key));
    }
    for field in &ty.fields {
        let key = member_key(&field.full_name()).to_string();
        add(&field.custom_attributes, SuppressionTarget::Member(key));
    }
    for property in &ty.properties {
        let key = member_key(&property.full_name()).to_string();
        add(&property.custom_attributes, SuppressionTarget::Member(key));
    }
    for event in &ty.events {
        let key = member_key(&event.full_name()).to_string();
        add(&event.custom_attributes, SuppressionTarget::Member(key));
    }
}

fn suppress_messages(attributes: &[CustomAttribute]) -> impl Iterator<Item = &CustomAttribute> {
    attributes.iter().filter(|a| a.is(SUPPRESS_MESSAGE))
}

fn rule_name(attribute: &CustomAttribute) -> Option<String> {
    let category = attribute.string_argument(0).filter(|c| !c.is_empty())?;
    let check_id = attribute.string_argument(1).filter(|c| !c.is_empty())?;
    Some(format!("{category}.{check_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        CustomAttributeArgument, MethodDef, MethodSig, Module, Token, TypeDef, TypeRef,
    };

    const RULE: &str = "Correctness.Sample";

    fn suppress(category: &str, check_id: &str) -> CustomAttribute {
        CustomAttribute::with_strings(
            TypeRef::corlib("System.Diagnostics.CodeAnalysis", "SuppressMessageAttribute"),
            &[category, check_id],
        )
    }

    #[test]
    fn test_type_entry_covers_nested_and_members() {
        let mut list = IgnoreList::new();
        list.add_type(RULE, "Ns.Outer");
        assert!(list.ignores_type(RULE, "A", "Ns.Outer"));
        assert!(list.ignores_type(RULE, "A", "Ns.Outer/Inner/Deep"));
        assert!(!list.ignores_type(RULE, "A", "Ns.OuterX"));
        assert!(!list.ignores_type("Other.Rule", "A", "Ns.Outer"));
        assert!(list.ignores_member(
            RULE,
            "A",
            "Ns.Outer/Inner",
            "System.Void Ns.Outer/Inner::Run()"
        ));
    }

    #[test]
    fn test_member_and_assembly_entries() {
        let mut list = IgnoreList::new();
        list.add_member(RULE, "System.Void Ns.T::Run(System.Int32)");
        list.add_assembly(RULE, "Legacy");
        assert!(list.ignores_member(RULE, "A", "Ns.T", "System.Void Ns.T::Run(System.Int32)"));
        assert!(list.ignores_member(RULE, "A", "Ns.T", "Ns.T::Run(System.Int32)"));
        assert!(!list.ignores_member(RULE, "A", "Ns.T", "System.Void Ns.T::Run()"));
        assert!(list.ignores_assembly(RULE, "Legacy"));
        assert!(list.ignores_type(RULE, "Legacy", "Any.Type"));
        assert_eq!(list.len(), 1);
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_collect_suppressions() {
        let mut ty = TypeDef::new(Token::new(0x0200_0001), "Ns", "Worker");
        ty.custom_attributes.push(suppress("Design", "Big"));
        let mut method = MethodDef::new(
            Token::new(0x0600_0001),
            "Run",
            MethodSig::instance(TypeRef::void(), vec![]),
        );
        method.custom_attributes.push(suppress("Correctness", "Sample"));
        method.custom_attributes.push(suppress("", "Skipped"));
        ty.add_method(method);

        let mut module = Module::new("A.dll");
        module.add_type(ty);
        let mut assembly = Assembly::new("A", None);
        assembly.add_module(module);
        let member = CustomAttributeArgument::from("Ns.Worker+Inner.#Go()");
        let other = CustomAttributeArgument::from("Ns.Other");
        assembly
            .add_attribute(suppress("Naming", "Short"))
            .add_attribute(suppress("Correctness", "Sample").with_named("Target", member))
            .add_attribute(suppress("Design", "Big").with_named("Target", other));

        let found = collect_suppressions(&assembly);
        assert_eq!(found.len(), 5);
        assert!(found.contains(&Suppression {
            rule: "Naming.Short".into(),
            target: SuppressionTarget::Assembly,
        }));
        assert!(found.contains(&Suppression {
            rule: RULE.into(),
            target: SuppressionTarget::Member("Ns.Worker/Inner::Go()".into()),
        }));
        assert!(found.contains(&Suppression {
            rule: "Design.Big".into(),
            target: SuppressionTarget::Type("Ns.Other".into()),
        }));
        assert!(found.contains(&Suppression {
            rule: "Design.Big".into(),
            target: SuppressionTarget::Type("Ns.Worker".into()),
        }));
        assert!(found.contains(&Suppression {
            rule: RULE.into(),
            target: SuppressionTarget::Member("Ns.Worker::Run()".into()),
        }));

        let mut list = IgnoreList::new();
        assert_eq!(list.add_suppressions(&assembly), 5);
        assert!(list.ignores_member(RULE, "A", "Ns.Worker", "System.Void Ns.Worker::Run()"));
        assert!(!list.ignores_member(RULE, "B", "Ns.Worker", "System.Void Ns.Worker::Run()"));
        assert!(list.ignores_assembly("Naming.Short", "A"));
    }
}
