//! Module programs and their trampoline computations.
//!
//! A [`ModuleProgram`] is one chunk's worth of definitions: the modules it
//! depends on and a list of `(canonical id, expression)` entries. Entries
//! read each other through the shared `all` table, which is populated as
//! modules finish.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tessera_core::syntax::Expr;

use super::error::RuntimeError;
use super::host::DslHost;
use super::interp::{Interpreter, InterpreterConfig};
use super::issues::{IssueRegistry, RuntimeIssue};
use super::value::{Env, HostObject, Value};
use crate::trampoline::{
    Computation, CyclePolicy, ModuleMetadata, Registry, Step, TrampolineError,
};

#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub id: String,
    pub expr: Rc<Expr>,
}

#[derive(Debug, Clone)]
pub struct ModuleProgram {
    pub name: String,
    pub dependencies: Vec<String>,
    pub entries: Vec<ModuleEntry>,
}

impl ModuleProgram {
    pub fn has_definitions(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// The `all` object: canonical id to evaluated value.
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    entries: Rc<RefCell<IndexMap<String, Value>>>,
}

impl ModuleTable {
    pub fn insert(&self, id: impl Into<String>, value: Value) {
        self.entries.borrow_mut().insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.entries.borrow().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.entries.borrow().clone()
    }
}

impl HostObject for ModuleTable {
    fn type_name(&self) -> &str {
        "all"
    }

    fn get(&self, property: &str) -> Result<Value, RuntimeError> {
        ModuleTable::get(self, property).ok_or_else(|| RuntimeError::UnresolvedModuleEntry {
            id: property.to_string(),
        })
    }
}

/// Value a finished module hands to whoever requested it.
#[derive(Debug, Clone, Default)]
pub struct ModuleValue {
    pub entries: Rc<IndexMap<String, Value>>,
}

/// Drives one [`ModuleProgram`]: request each dependency, then evaluate.
pub struct ModuleComputation {
    program: Rc<ModuleProgram>,
    globals: Env,
    table: ModuleTable,
    config: InterpreterConfig,
    next_dependency: usize,
}

impl ModuleComputation {
    pub fn new(
        program: Rc<ModuleProgram>,
        globals: Env,
        table: ModuleTable,
        config: InterpreterConfig,
    ) -> Self {
        ModuleComputation {
            program,
            globals,
            table,
            config,
            next_dependency: 0,
        }
    }
}

impl Computation<ModuleValue> for ModuleComputation {
    fn resume(&mut self, _input: Option<ModuleValue>) -> Result<Step<ModuleValue>, RuntimeError> {
        if let Some(dependency) = self.program.dependencies.get(self.next_dependency) {
            self.next_dependency += 1;
            return Ok(Step::Request(dependency.clone()));
        }

        let scope = self.globals.child();
        scope.define("all", Value::host(self.table.clone()));
        let mut interpreter = Interpreter::new(self.config.clone());
        let mut exports = IndexMap::with_capacity(self.program.entries.len());
        for entry in &self.program.entries {
            let value = interpreter
                .eval(&entry.expr, &scope)
                .map_err(|source| RuntimeError::Entry {
                    id: entry.id.clone(),
                    source: Box::new(source),
                })?;
            self.table.insert(entry.id.clone(), value.clone());
            exports.insert(entry.id.clone(), value);
        }
        tracing::trace!(
            module = %self.program.name,
            entries = exports.len(),
            "module evaluated"
        );
        Ok(Step::Done(ModuleValue {
            entries: Rc::new(exports),
        }))
    }
}

/// Everything produced by one evaluation pass.
#[derive(Debug, Default)]
pub struct EvaluationOutput {
    /// Canonical id to value, in evaluation order.
    pub values: IndexMap<String, Value>,
    /// Module name to the ids it defined.
    pub modules: IndexMap<String, Vec<String>>,
    pub issues: Vec<RuntimeIssue>,
}

/// Evaluates `programs` through a fresh registry.
pub fn evaluate_programs(
    programs: &[Rc<ModuleProgram>],
    host: &dyn DslHost,
    policy: CyclePolicy,
    config: &InterpreterConfig,
) -> Result<EvaluationOutput, TrampolineError> {
    let issues = IssueRegistry::new();
    let globals = Env::root();
    for (name, value) in host.globals(&issues) {
        globals.define(name, value);
    }
    let table = ModuleTable::default();

    let mut registry = Registry::new(policy);
    for program in programs {
        registry.set_module(
            program.name.clone(),
            Box::new(ModuleComputation::new(
                Rc::clone(program),
                globals.clone(),
                table.clone(),
                config.clone(),
            )),
        );
        registry.set_metadata(
            program.name.clone(),
            ModuleMetadata {
                has_definitions: program.has_definitions(),
            },
        );
    }

    let results = registry.evaluate()?;
    let modules = results
        .into_iter()
        .map(|(name, value)| (name, value.entries.keys().cloned().collect()))
        .collect();
    Ok(EvaluationOutput {
        values: table.snapshot(),
        modules,
        issues: issues.snapshot(),
    })
}
