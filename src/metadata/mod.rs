//! In-memory object graph of the analyzed assemblies.
//!
//! The model mirrors the shape of a .NET assembly as far as analysis needs it:
//!
//! ```text
//! Assembly ── Module ── TypeDef ─┬─ FieldDef
//!                                ├─ MethodDef ── MethodBody (see crate::assembly)
//!                                ├─ PropertyDef
//!                                ├─ EventDef
//!                                └─ TypeDef (nested)
//! ```
//!
//! Operands refer to other types and members through references ([`TypeRef`], [`MethodRef`],
//! [`FieldRef`]); [`AssemblyResolver`] turns references back into definitions when the defining
//! assembly is loaded. The model is read-only while rules run.
//!
//! # Key Components
//!
//! - [`Assembly`], [`Module`], [`Version`] - Containers and identity
//! - [`TypeDef`], [`TypeRef`] - Types and their flags
//! - [`MethodDef`], [`MethodRef`], [`MethodSig`] - Methods and signatures
//! - [`FieldDef`], [`PropertyDef`], [`EventDef`] - Other members
//! - [`CustomAttribute`] - Applied attributes
//! - [`AssemblyResolver`] - Reference resolution with soft failure
//! - [`MethodSignature`] - Partial signatures for matching calls

pub mod assembly;
pub mod attributes;
pub mod members;
pub mod method;
pub mod resolver;
pub mod token;
pub mod typesystem;

pub use assembly::{Assembly, AssemblyName, Module, Version};
pub use attributes::{CustomAttribute, CustomAttributeArgument, CustomAttributeNamedArgument};
pub use members::{
    EventDef, FieldAccessFlags, FieldDef, FieldModifiers, FieldRef, FieldRefRc, PropertyDef,
};
pub use method::{
    MethodAccessFlags, MethodDef, MethodModifiers, MethodRef, MethodRefRc, MethodSig,
    MethodSignature,
};
pub use resolver::AssemblyResolver;
pub use token::Token;
pub use typesystem::{TypeDef, TypeModifiers, TypeRef, TypeVisibility};
