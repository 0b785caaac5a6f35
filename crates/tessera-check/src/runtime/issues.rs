use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// A non-fatal problem noticed while composing elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeIssue {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct IssueState {
    operation_names: HashSet<String>,
    issues: Vec<RuntimeIssue>,
}

/// Shared sink for [`RuntimeIssue`]s; clones write to the same list.
#[derive(Debug, Clone, Default)]
pub struct IssueRegistry {
    inner: Rc<RefCell<IssueState>>,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an operation name, flagging a repeat.
    pub fn record_operation(&self, name: &str) {
        let mut state = self.inner.borrow_mut();
        if !state.operation_names.insert(name.to_string()) {
            tracing::warn!(operation = name, "duplicate operation name");
            state.issues.push(RuntimeIssue {
                code: "DUPLICATE_OPERATION_NAME".to_string(),
                message: format!("operation name '{name}' is defined more than once"),
            });
        }
    }

    pub fn push(&self, issue: RuntimeIssue) {
        self.inner.borrow_mut().issues.push(issue);
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<RuntimeIssue> {
        self.inner.borrow().issues.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_operation_names_are_flagged_once_per_repeat() {
        let issues = IssueRegistry::new();
        let shared = issues.clone();
        issues.record_operation("ProfilePageQuery");
        shared.record_operation("ProfilePageQuery");
        issues.record_operation("Other");
        let recorded = issues.snapshot();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].code, "DUPLICATE_OPERATION_NAME");
        assert!(recorded[0].message.contains("ProfilePageQuery"));
    }
}
