//! Generator-trampoline module registry.
//!
//! Each registered module is a suspendable [`Computation`]: an explicit state
//! machine that either finishes with a value or asks for another module by
//! name. [`Registry::evaluate`] drives all of them from a single loop over a
//! heap-allocated frame stack, so dependency depth never touches the native
//! stack.
//!
//! # Cycles
//!
//! A request for a module that is still on the frame stack closes a cycle.
//! Under [`CyclePolicy::RelaxDefinitionless`] the request resolves to
//! `V::default()` when metadata is known for both endpoints and at least one
//! of them has no definitions; otherwise the cycle is fatal and the error
//! names the full chain.

mod error;
mod registry;

use serde::{Deserialize, Serialize};

use crate::runtime::RuntimeError;

pub use error::TrampolineError;
pub use registry::Registry;

/// What a computation does next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<V> {
    /// Suspend until the named module's value is available.
    Request(String),
    /// Finished with a value.
    Done(V),
}

/// A resumable module body.
pub trait Computation<V> {
    /// Advances the state machine. `input` is `None` on the first call and
    /// the requested module's value on every later call.
    fn resume(&mut self, input: Option<V>) -> Result<Step<V>, RuntimeError>;
}

/// Optional per-module facts consulted by the cycle policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadata {
    pub has_definitions: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclePolicy {
    /// Every cycle is fatal.
    Strict,
    /// Cycles through a module without definitions resolve to the empty value.
    #[default]
    RelaxDefinitionless,
}

/// Adapts a closure into a [`Computation`].
pub struct FnComputation<F>(pub F);

impl<V, F> Computation<V> for FnComputation<F>
where
    F: FnMut(Option<V>) -> Result<Step<V>, RuntimeError>,
{
    fn resume(&mut self, input: Option<V>) -> Result<Step<V>, RuntimeError> {
        (self.0)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_policy_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&CyclePolicy::RelaxDefinitionless).unwrap(),
            "\"relax-definitionless\""
        );
        let strict: CyclePolicy = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(strict, CyclePolicy::Strict);
        assert_eq!(CyclePolicy::default(), CyclePolicy::RelaxDefinitionless);
    }

    #[test]
    fn fn_computation_forwards_input() {
        let mut computation = FnComputation(|input: Option<u32>| {
            Ok(match input {
                None => Step::Request("dep".to_string()),
                Some(value) => Step::Done(value + 1),
            })
        });
        assert_eq!(computation.resume(None).unwrap(), Step::Request("dep".to_string()));
        assert_eq!(computation.resume(Some(1)).unwrap(), Step::Done(2));
    }
}
