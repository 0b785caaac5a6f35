//! Loading emitted chunks into evaluated elements.
//!
//! # Architecture
//!
//! - [`ModuleLoader`]: the seam between the session and whatever runs the
//!   chunks.
//! - [`RuntimeLoader`]: parses chunk text back into expressions, caches the
//!   parse by chunk hash, and evaluates every chunk on the trampoline
//!   registry with a [`DslHost`].
//! - [`EvaluatedModule`]: the evaluated values partitioned by element kind.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use tessera_check::runtime::element::{
    FragmentPrebuild, ModelPrebuild, OperationPrebuild, SlicePrebuild,
};
use tessera_check::{
    evaluate_programs, CyclePolicy, DslHost, GqlHost, InterpreterConfig, ModuleEntry,
    ModuleProgram, RuntimeElement, RuntimeIssue,
};
use tessera_codegen::{parse_chunk, IntermediateChunk};

use crate::artifact::CacheStats;
use crate::error::BuilderError;

/// Evaluated elements of one load, keyed by canonical id.
#[derive(Debug, Clone, Default)]
pub struct EvaluatedModule {
    pub models: IndexMap<String, ModelPrebuild>,
    pub slices: IndexMap<String, SlicePrebuild>,
    pub operations: IndexMap<String, OperationPrebuild>,
    pub fragments: IndexMap<String, FragmentPrebuild>,
    /// Ids whose value is not an element, with the value's `typeof`.
    pub unknown: IndexMap<String, String>,
    pub issues: Vec<RuntimeIssue>,
    pub cache: CacheStats,
}

impl EvaluatedModule {
    pub fn len(&self) -> usize {
        self.models.len() + self.slices.len() + self.operations.len() + self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, id: String, element: &RuntimeElement) {
        match element {
            RuntimeElement::Model(prebuild) => {
                self.models.insert(id, prebuild.clone());
            }
            RuntimeElement::Slice(prebuild) => {
                self.slices.insert(id, prebuild.clone());
            }
            RuntimeElement::Operation(prebuild) => {
                self.operations.insert(id, prebuild.clone());
            }
            RuntimeElement::Fragment(prebuild) => {
                self.fragments.insert(id, prebuild.clone());
            }
        }
    }
}

pub trait ModuleLoader {
    /// Evaluates `chunks`, which are given in load order.
    fn load(
        &mut self,
        chunks: &[&IntermediateChunk],
        policy: CyclePolicy,
    ) -> Result<EvaluatedModule, BuilderError>;
}

pub struct RuntimeLoader {
    host: Box<dyn DslHost>,
    config: InterpreterConfig,
    /// Chunk hash to parsed program.
    parsed: HashMap<String, Rc<ModuleProgram>>,
}

impl Default for RuntimeLoader {
    fn default() -> Self {
        RuntimeLoader::new(Box::new(GqlHost::new()))
    }
}

impl RuntimeLoader {
    pub fn new(host: Box<dyn DslHost>) -> Self {
        RuntimeLoader {
            host,
            config: InterpreterConfig::default(),
            parsed: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of parsed chunks held for reuse.
    pub fn cached_programs(&self) -> usize {
        self.parsed.len()
    }

    fn program(
        &mut self,
        chunk: &IntermediateChunk,
        stats: &mut CacheStats,
    ) -> Result<Rc<ModuleProgram>, BuilderError> {
        if let Some(program) = self.parsed.get(&chunk.hash) {
            stats.hits += 1;
            return Ok(Rc::clone(program));
        }
        stats.misses += 1;
        let parsed = parse_chunk(&chunk.text)?;
        let program = Rc::new(ModuleProgram {
            name: chunk.id.clone(),
            dependencies: chunk.requires.clone(),
            entries: parsed
                .entries
                .into_iter()
                .map(|(id, expr)| ModuleEntry {
                    id,
                    expr: Rc::new(expr),
                })
                .collect(),
        });
        self.parsed.insert(chunk.hash.clone(), Rc::clone(&program));
        Ok(program)
    }
}

impl ModuleLoader for RuntimeLoader {
    fn load(
        &mut self,
        chunks: &[&IntermediateChunk],
        policy: CyclePolicy,
    ) -> Result<EvaluatedModule, BuilderError> {
        let mut cache = CacheStats::default();
        let mut programs = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            programs.push(self.program(chunk, &mut cache)?);
        }
        // Parses of chunks that no longer exist are never hit again.
        self.parsed
            .retain(|hash, _| chunks.iter().any(|chunk| &chunk.hash == hash));
        tracing::debug!(
            "chunk parse cache: {} hit(s), {} miss(es)",
            cache.hits,
            cache.misses
        );

        let output = evaluate_programs(&programs, self.host.as_ref(), policy, &self.config)?;

        let mut evaluated = EvaluatedModule {
            issues: output.issues,
            cache,
            ..EvaluatedModule::default()
        };
        for (id, value) in output.values {
            match value.as_element() {
                Some(element) => evaluated.insert(id, element),
                None => {
                    evaluated.unknown.insert(id, value.type_of().to_string());
                }
            }
        }
        Ok(evaluated)
    }
}
