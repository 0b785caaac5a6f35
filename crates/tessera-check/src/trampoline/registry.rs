use std::collections::HashMap;

use indexmap::IndexMap;

use super::{Computation, CyclePolicy, ModuleMetadata, Step, TrampolineError};

enum Slot<V> {
    Pending(Box<dyn Computation<V>>),
    InProgress,
    Done(V),
}

struct Frame<V> {
    name: String,
    computation: Box<dyn Computation<V>>,
}

/// Named modules awaiting evaluation.
///
/// Registration order is preserved and determines the order in which roots
/// are started and results are returned.
pub struct Registry<V> {
    modules: IndexMap<String, Slot<V>>,
    metadata: HashMap<String, ModuleMetadata>,
    policy: CyclePolicy,
}

impl<V: Clone + Default> Registry<V> {
    pub fn new(policy: CyclePolicy) -> Self {
        Registry {
            modules: IndexMap::new(),
            metadata: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> CyclePolicy {
        self.policy
    }

    /// Registers `computation` under `name`. A later registration under the
    /// same name replaces the earlier one.
    pub fn set_module(&mut self, name: impl Into<String>, computation: Box<dyn Computation<V>>) {
        let name = name.into();
        if self.modules.contains_key(&name) {
            tracing::trace!(module = %name, "replacing registered module");
        }
        self.modules.insert(name, Slot::Pending(computation));
    }

    pub fn set_metadata(&mut self, name: impl Into<String>, metadata: ModuleMetadata) {
        self.metadata.insert(name.into(), metadata);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Evaluates every registered module exactly once and returns the values
    /// keyed by module name in registration order.
    pub fn evaluate(mut self) -> Result<IndexMap<String, V>, TrampolineError> {
        let names: Vec<String> = self.modules.keys().cloned().collect();
        for name in names {
            if matches!(self.modules.get(&name), Some(Slot::Pending(_))) {
                self.drive(name)?;
            }
        }

        let mut values = IndexMap::with_capacity(self.modules.len());
        for (name, slot) in self.modules {
            match slot {
                Slot::Done(value) => {
                    values.insert(name, value);
                }
                Slot::Pending(_) | Slot::InProgress => {
                    return Err(TrampolineError::Computation {
                        module: name,
                        source: crate::runtime::RuntimeError::Internal {
                            message: "module left unfinished after evaluation".to_string(),
                        },
                    });
                }
            }
        }
        Ok(values)
    }

    fn start(&mut self, name: &str) -> Option<Box<dyn Computation<V>>> {
        let slot = self.modules.get_mut(name)?;
        match std::mem::replace(slot, Slot::InProgress) {
            Slot::Pending(computation) => Some(computation),
            other => {
                *slot = other;
                None
            }
        }
    }

    fn may_relax(&self, requester: &str, target: &str) -> bool {
        if self.policy == CyclePolicy::Strict {
            return false;
        }
        match (self.metadata.get(requester), self.metadata.get(target)) {
            (Some(from), Some(to)) => !from.has_definitions || !to.has_definitions,
            _ => false,
        }
    }

    fn drive(&mut self, root: String) -> Result<(), TrampolineError> {
        let Some(computation) = self.start(&root) else {
            return Ok(());
        };
        let mut positions: HashMap<String, usize> = HashMap::new();
        positions.insert(root.clone(), 0);
        let mut stack = vec![Frame {
            name: root,
            computation,
        }];
        let mut input: Option<V> = None;

        while let Some(frame) = stack.last_mut() {
            let step = frame
                .computation
                .resume(input.take())
                .map_err(|source| TrampolineError::Computation {
                    module: frame.name.clone(),
                    source,
                })?;

            match step {
                Step::Done(value) => {
                    let Some(finished) = stack.pop() else { break };
                    positions.remove(&finished.name);
                    if let Some(slot) = self.modules.get_mut(&finished.name) {
                        *slot = Slot::Done(value.clone());
                    }
                    input = Some(value);
                }
                Step::Request(target) => {
                    let requester = frame.name.clone();
                    match self.modules.get(&target) {
                        None => {
                            return Err(TrampolineError::ModuleNotFound { requester, target });
                        }
                        Some(Slot::Done(value)) => {
                            input = Some(value.clone());
                        }
                        Some(Slot::InProgress) => {
                            if self.may_relax(&requester, &target) {
                                tracing::debug!(
                                    requester = %requester,
                                    target = %target,
                                    "relaxing cycle through definitionless module"
                                );
                                input = Some(V::default());
                                continue;
                            }
                            let start = positions.get(&target).copied().unwrap_or(0);
                            let mut chain: Vec<String> =
                                stack[start..].iter().map(|f| f.name.clone()).collect();
                            chain.push(target);
                            return Err(TrampolineError::CircularDependency { chain });
                        }
                        Some(Slot::Pending(_)) => {
                            let Some(computation) = self.start(&target) else {
                                continue;
                            };
                            tracing::trace!(
                                requester = %requester,
                                target = %target,
                                depth = stack.len(),
                                "entering module"
                            );
                            positions.insert(target.clone(), stack.len());
                            stack.push(Frame {
                                name: target,
                                computation,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trampoline::FnComputation;

    fn leaf(value: u32) -> Box<dyn Computation<u32>> {
        Box::new(FnComputation(move |_| Ok(Step::Done(value))))
    }

    fn requesting(deps: &[&str], own: u32) -> Box<dyn Computation<u32>> {
        let deps: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
        let mut next = 0usize;
        let mut total = own;
        Box::new(FnComputation(move |input: Option<u32>| {
            if let Some(value) = input {
                total += value;
            }
            if next < deps.len() {
                next += 1;
                return Ok(Step::Request(deps[next - 1].clone()));
            }
            Ok(Step::Done(total))
        }))
    }

    #[test]
    fn empty_registry_evaluates_to_nothing() {
        let registry: Registry<u32> = Registry::new(CyclePolicy::Strict);
        assert!(registry.is_empty());
        assert!(registry.evaluate().unwrap().is_empty());
    }

    #[test]
    fn results_follow_registration_order() {
        let mut registry = Registry::new(CyclePolicy::Strict);
        registry.set_module("b", requesting(&["a"], 10));
        registry.set_module("a", leaf(1));
        let values = registry.evaluate().unwrap();
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(values["b"], 11);
        assert_eq!(values["a"], 1);
    }

    #[test]
    fn self_request_is_a_cycle() {
        let mut registry = Registry::new(CyclePolicy::Strict);
        registry.set_module("a", requesting(&["a"], 0));
        let err = registry.evaluate().unwrap_err();
        match err {
            TrampolineError::CircularDependency { chain } => {
                assert_eq!(chain, vec!["a".to_string(), "a".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_metadata_keeps_cycle_fatal() {
        let mut registry = Registry::new(CyclePolicy::RelaxDefinitionless);
        registry.set_module("a", requesting(&["b"], 0));
        registry.set_module("b", requesting(&["a"], 0));
        registry.set_metadata("a", ModuleMetadata { has_definitions: false });
        let err = registry.evaluate().unwrap_err();
        assert_eq!(err.code(), "GRAPH_CIRCULAR_DEPENDENCY");
    }

    #[test]
    fn computation_error_names_module() {
        let mut registry: Registry<u32> = Registry::new(CyclePolicy::Strict);
        registry.set_module(
            "broken",
            Box::new(FnComputation(|_| {
                Err(crate::runtime::RuntimeError::Dsl {
                    message: "boom".to_string(),
                })
            })),
        );
        let err = registry.evaluate().unwrap_err();
        assert_eq!(err.code(), "RUNTIME_MODULE_LOAD_FAILED");
        assert!(err.to_string().contains("broken"));
    }
}
