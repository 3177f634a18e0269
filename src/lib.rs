// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dotcheck
//!
//! A rule-based static analysis engine for .NET CIL.
//!
//! `dotcheck` runs small, independent rules over an in-memory model of .NET assemblies and
//! collects their findings as ranked defects. The heavy lifting that most rules share lives in
//! reusable analyses: opcode bitmasks that let a rule skip a method in a few word operations,
//! forward tracing of evaluation stack entries from a producer to its consumers, and backward
//! resolution of an operand to the instruction that pushed it.
//!
//! ## Features
//!
//! - **Opcode pre-filtering** - A 256-bit set per method, cached per assembly
//! - **Stack entry tracing** - Branch-aware forward tracing through locals, `dup` and handlers
//! - **Trace-back** - Backward operand resolution over straight-line code
//! - **Isolated rules** - A failing or panicking rule never aborts the run
//! - **Ranked findings** - Severity and confidence levels with mask based filtering
//! - **Suppressions** - Ignore lists, including `[SuppressMessage]` attributes
//!
//! ## Quick Start
//!
//! ```rust
//! use dotcheck::prelude::*;
//! use dotcheck::rules::catalog::default_rules;
//!
//! let mut builder = MethodBodyBuilder::new();
//! builder.emit_call(
//!     OpCode::Newobj,
//!     MethodRef::new(
//!         TypeRef::corlib("System", "Exception"),
//!         ".ctor",
//!         MethodSig::instance(TypeRef::void(), vec![]),
//!     ),
//! )?;
//! builder.emit(OpCode::Pop)?;
//! builder.emit(OpCode::Ret)?;
//!
//! let mut ty = TypeDef::new(Token::new(0x0200_0002), "App", "Program");
//! ty.add_method(
//!     MethodDef::new(
//!         Token::new(0x0600_0001),
//!         "Main",
//!         MethodSig::static_method(TypeRef::void(), vec![]),
//!     )
//!     .with_body(builder.build()?),
//! );
//! let mut module = Module::new("App.dll");
//! module.add_type(ty);
//! let mut assembly = Assembly::new("App", None);
//! assembly.add_module(module);
//!
//! let mut runner = Runner::new(RunnerConfig::default());
//! runner.add_rules(default_rules());
//! let report = runner.analyze(&[assembly]);
//!
//! assert_eq!(report.defects.len(), 1);
//! assert_eq!(report.defects[0].severity, Severity::Critical);
//! # Ok::<(), dotcheck::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`assembly`] - Opcodes, instructions, method bodies and the body builder
//! - [`metadata`] - Assemblies, types, members, attributes and reference resolution
//! - [`analysis`] - Opcode bitmasks, stack entry usage and trace-back
//! - [`rules`] - The rule trait, the runner, defects and the reference catalog
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! The library emits [`tracing`] events and never installs a subscriber. Rule failures and
//! result normalizations are logged at `warn`, rule activation changes at `debug`, and
//! individual stack traces at `trace`.

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

/// CIL instruction model.
pub mod assembly;

/// In-memory model of the analyzed assemblies.
pub mod metadata;

/// Reusable analyses over method bodies.
pub mod analysis;

/// Rule framework, runner and reference rules.
pub mod rules;

/// `dotcheck` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotcheck` Error type.
///
/// The main error type for all operations in this crate. See [`Error`] for the variants.
pub use error::Error;

/// Main entry point for running rules over assemblies.
pub use rules::{Runner, RunnerConfig};
