//! Evaluation for tessera: the generator-trampoline module registry and the
//! interpreter that runs definition expressions against the `gql` host.

pub mod runtime;
pub mod trampoline;

pub use runtime::{
    evaluate_programs, DslHost, ElementKind, EvaluationOutput, GqlHost, Interpreter,
    InterpreterConfig, ModuleEntry, ModuleProgram, RuntimeElement, RuntimeError, RuntimeIssue,
    Value,
};
pub use trampoline::{
    Computation, CyclePolicy, FnComputation, ModuleMetadata, Registry, Step, TrampolineError,
};
