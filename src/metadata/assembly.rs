//! Assemblies, modules and version numbers.
//!
//! An [`Assembly`] is the unit the [`crate::Runner`] analyzes: it carries its identity, its
//! assembly-level custom attributes and one or more [`Module`]s holding the type definitions.
//! A module also records the type references it imports, which rules use as a cheap whole-module
//! pre-filter ("does this module reference `System.Threading.Thread` at all?").

use std::{fmt, str::FromStr};

use crate::{
    metadata::{attributes::CustomAttribute, typesystem::TypeDef, typesystem::TypeRef},
    Error, Result,
};

/// A four-part version number.
///
/// ```rust
/// use dotcheck::metadata::Version;
///
/// let v: Version = "2.2.*".parse()?;
/// assert_eq!(v, Version::new(2, 2, 0, 0));
/// assert_eq!(v.to_string(), "2.2.0.0");
/// # Ok::<(), dotcheck::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    /// Major version component
    pub major: u16,
    /// Minor version component
    pub minor: u16,
    /// Build version component
    pub build: u16,
    /// Revision version component
    pub revision: u16,
}

impl Version {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Version {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Components in significance order.
    #[must_use]
    pub const fn components(&self) -> [u16; 4] {
        [self.major, self.minor, self.build, self.revision]
    }

    /// Parse a version as written in attributes.
    ///
    /// Missing trailing components default to 0, as does a `*` wildcard.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for empty strings, more than four components, or components
    /// that are not 16-bit integers.
    pub fn parse(version_str: &str) -> Result<Self> {
        let trimmed = version_str.trim();
        if trimmed.is_empty() {
            return Err(malformed_error!("Empty version string"));
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", version_str));
        }

        let mut components = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
            if *part == "*" {
                continue;
            }
            components[i] = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component: {}", part))?;
        }

        Ok(Self::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Simple name and version of an assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyName {
    /// Simple name, e.g. `mscorlib`
    pub name: String,
    /// Value of the assembly version, `None` when not recorded
    pub version: Option<Version>,
}

impl fmt::Display for AssemblyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}, Version={version}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A module of an assembly.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// File name of the module, e.g. `Sample.dll`
    pub name: String,
    /// Types this module imports from other assemblies
    pub type_references: Vec<TypeRef>,
    /// Top-level type definitions; nested types hang off their enclosing type
    pub types: Vec<TypeDef>,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a top-level type.
    pub fn add_type(&mut self, ty: TypeDef) -> &mut Self {
        self.types.push(ty);
        self
    }

    /// Records an imported type.
    pub fn add_type_reference(&mut self, reference: TypeRef) -> &mut Self {
        self.type_references.push(reference);
        self
    }

    /// True if the module imports, or itself defines, the named type.
    #[must_use]
    pub fn references_type(&self, namespace: &str, name: &str) -> bool {
        self.type_references
            .iter()
            .any(|r| r.is_named(namespace, name))
            || self
                .all_types()
                .any(|t| t.namespace == namespace && t.name_path() == name)
    }

    /// All types including nested ones, depth first.
    pub fn all_types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.iter().flat_map(TypeDef::all_types)
    }
}

/// An assembly under analysis.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Identity of the assembly
    pub name: AssemblyName,
    /// Assembly-level attributes, e.g. `[AssemblyFileVersion]` or `[SuppressMessage]`
    pub custom_attributes: Vec<CustomAttribute>,
    /// Modules, the first one is the main module
    pub modules: Vec<Module>,
}

impl Assembly {
    /// Creates an assembly without modules.
    pub fn new(name: impl Into<String>, version: Option<Version>) -> Self {
        Assembly {
            name: AssemblyName {
                name: name.into(),
                version,
            },
            custom_attributes: Vec::new(),
            modules: Vec::new(),
        }
    }

    /// Adds a module.
    pub fn add_module(&mut self, module: Module) -> &mut Self {
        self.modules.push(module);
        self
    }

    /// Adds an assembly-level attribute.
    pub fn add_attribute(&mut self, attribute: CustomAttribute) -> &mut Self {
        self.custom_attributes.push(attribute);
        self
    }

    /// The main module, if any.
    #[must_use]
    pub fn main_module(&self) -> Option<&Module> {
        self.modules.first()
    }

    /// True if the assembly carries an attribute of the given full name.
    #[must_use]
    pub fn has_attribute(&self, full_name: &str) -> bool {
        self.custom_attributes.iter().any(|a| a.is(full_name))
    }

    /// All types of all modules including nested ones.
    pub fn all_types(&self) -> impl Iterator<Item = &TypeDef> {
        self.modules.iter().flat_map(Module::all_types)
    }

    /// Finds a type by full name (`Ns.Outer/Inner`).
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        self.all_types().find(|t| t.full_name() == full_name)
    }

    /// True for the core library.
    #[must_use]
    pub fn is_corlib(&self) -> bool {
        matches!(
            self.name.name.as_str(),
            "mscorlib" | "System.Private.CoreLib" | "netstandard"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::{Token, TABLE_TYPEDEF};

    #[test]
    fn test_version_parse() {
        assert_eq!(Version::parse("1.2.3.4").unwrap(), Version::new(1, 2, 3, 4));
        assert_eq!(Version::parse("2.0").unwrap(), Version::new(2, 0, 0, 0));
        assert_eq!(Version::parse("1.0.*").unwrap(), Version::new(1, 0, 0, 0));
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.2.3.4.5").is_err());
        assert!(Version::parse("1.x").is_err());
        assert!(Version::new(1, 2, 0, 0) < Version::new(1, 10, 0, 0));
    }

    #[test]
    fn test_module_lookup() {
        let mut outer = TypeDef::new(Token::from_parts(TABLE_TYPEDEF, 1), "Ns", "Outer");
        outer.add_nested_type(TypeDef::new(Token::from_parts(TABLE_TYPEDEF, 2), "", "Inner"));

        let mut module = Module::new("Sample.dll");
        module
            .add_type(outer)
            .add_type_reference(TypeRef::corlib("System.Threading", "Thread"));

        assert!(module.references_type("System.Threading", "Thread"));
        assert!(module.references_type("Ns", "Outer/Inner"));
        assert!(!module.references_type("System", "Console"));

        let mut assembly = Assembly::new("Sample", Some(Version::new(1, 0, 0, 0)));
        assembly.add_module(module);
        assert_eq!(assembly.all_types().count(), 2);
        assert!(assembly.find_type("Ns.Outer/Inner").is_some());
        assert_eq!(assembly.name.to_string(), "Sample, Version=1.0.0.0");
        assert!(!assembly.is_corlib());
    }
}
