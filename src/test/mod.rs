//! Model factories shared by the unit tests.

use crate::{
    assembly::MethodBodyBuilder,
    metadata::{Assembly, MethodDef, MethodRef, MethodSig, Module, Token, TypeDef, TypeRef},
    rules::{AnalysisReport, Rule, Runner, RunnerConfig},
    Result,
};

/// Method named `name` with the given signature and the body built by `builder`.
pub fn method(name: &str, signature: MethodSig, builder: MethodBodyBuilder) -> Result<MethodDef> {
    Ok(MethodDef::new(Token::new(0x0600_0001), name, signature).with_body(builder.build()?))
}

/// Static `void name()` with the body built by `builder`.
pub fn static_void(name: &str, builder: MethodBodyBuilder) -> Result<MethodDef> {
    method(
        name,
        MethodSig::static_method(TypeRef::void(), vec![]),
        builder,
    )
}

/// Parameterless instance constructor of `namespace.name`.
pub fn ctor(namespace: &str, name: &str) -> MethodRef {
    ctor_with(TypeRef::corlib(namespace, name), vec![])
}

/// Instance constructor of `ty` taking `parameters`.
pub fn ctor_with(ty: TypeRef, parameters: Vec<TypeRef>) -> MethodRef {
    MethodRef::new(ty, ".ctor", MethodSig::instance(TypeRef::void(), parameters))
}

/// Static `void App.Sink::name(object)`.
pub fn sink(name: &str) -> MethodRef {
    MethodRef::new(
        TypeRef::new("App", "Sink"),
        name,
        MethodSig::static_method(TypeRef::void(), vec![TypeRef::object()]),
    )
}

/// Public type `App.Target` declaring `methods`, numbered in order.
pub fn target_type(methods: Vec<MethodDef>) -> TypeDef {
    let mut ty = TypeDef::new(Token::new(0x0200_0002), "App", "Target");
    ty.flags = 0x0000_0001;
    for (row, mut method) in (1u32..).zip(methods) {
        method.token = Token::new(0x0600_0000 | row);
        ty.add_method(method);
    }
    ty
}

/// Single-module assembly `name` holding `types`.
pub fn assembly_with(name: &str, types: Vec<TypeDef>) -> Assembly {
    let mut module = Module::new(format!("{name}.dll"));
    for ty in types {
        module.add_type(ty);
    }
    let mut assembly = Assembly::new(name, None);
    assembly.add_module(module);
    assembly
}

/// Runs `rule` alone over `assemblies`, recording every outcome.
pub fn run_rule(rule: impl Rule + 'static, assemblies: &[Assembly]) -> AnalysisReport {
    let config = RunnerConfig {
        record_outcomes: true,
        ..RunnerConfig::default()
    };
    let mut runner = Runner::new(config);
    runner.add_rule(rule);
    runner.analyze(assemblies)
}
