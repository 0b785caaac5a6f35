//! Evaluation of definition expressions.
//!
//! # Architecture
//!
//! - [`value`]: dynamic values, closures, scopes and the host object seam.
//! - [`interp`]: the expression evaluator.
//! - [`host`]: the `gql` composer exposed as a global.
//! - [`element`]: the runtime elements the composer produces.
//! - [`module`]: per-chunk programs driven by the trampoline registry.

pub mod element;
pub mod error;
pub mod host;
pub mod interp;
pub mod issues;
pub mod module;
pub mod value;

pub use element::{
    ElementKind, FragmentPrebuild, ModelPrebuild, OperationPrebuild, OperationType,
    RuntimeElement, SlicePrebuild,
};
pub use error::RuntimeError;
pub use host::{DslHost, GqlHost};
pub use interp::{Interpreter, InterpreterConfig};
pub use issues::{IssueRegistry, RuntimeIssue};
pub use module::{
    evaluate_programs, EvaluationOutput, ModuleComputation, ModuleEntry, ModuleProgram,
    ModuleTable, ModuleValue,
};
pub use value::{Env, HostObject, Invoker, Value};
