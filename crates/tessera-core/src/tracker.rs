//! Canonical identity tracker.
//!
//! An analyzer walks one file in a single pass and mirrors its scope nesting
//! on the tracker: [`IdentityTracker::enter_scope`] when descending into a
//! variable declarator, function, class, method, property or arrow, and
//! [`IdentityTracker::exit_scope`] on the way back out. At every DSL call-site
//! it calls [`IdentityTracker::register_definition`].
//!
//! # Path rules
//!
//! - Named scopes contribute their name as a segment.
//! - Anonymous scopes contribute `<kind>#<n>`, where `n` counts anonymous
//!   scopes of that kind inside the *enclosing* frame. The counters live on
//!   the parent frame, so they restart whenever the parent is re-entered and
//!   edits in one scope never renumber siblings elsewhere.
//! - Two definitions at the same path get `path`, `path$1`, `path$2`, ...
//! - A definition is top-level when it sits at most one frame deep.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::id::CanonicalId;

/// Kind of a scope frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Variable,
    Function,
    Class,
    Method,
    Property,
    Arrow,
}

impl ScopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Variable => "variable",
            ScopeKind::Function => "function",
            ScopeKind::Class => "class",
            ScopeKind::Method => "method",
            ScopeKind::Property => "property",
            ScopeKind::Arrow => "arrow",
        }
    }
}

/// Handle returned by `enter_scope`; must be handed back to `exit_scope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "pass the handle back to exit_scope"]
pub struct ScopeHandle {
    depth: usize,
}

/// What the tracker knows about a registered call-site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSite {
    pub ast_path: String,
    pub is_top_level: bool,
    /// File-scope binding of a top-level site, verbatim.
    pub local_binding: Option<String>,
    pub export_binding: Option<String>,
}

#[derive(Debug)]
struct ScopeFrame {
    segment: String,
    anonymous: HashMap<ScopeKind, usize>,
}

/// Explicit scope stack for one file.
#[derive(Debug)]
pub struct IdentityTracker {
    file_path: String,
    stack: Vec<ScopeFrame>,
    root_anonymous: HashMap<ScopeKind, usize>,
    occurrences: HashMap<String, usize>,
    export_bindings: HashMap<String, String>,
}

impl IdentityTracker {
    pub fn new(file_path: impl Into<String>) -> Self {
        IdentityTracker {
            file_path: file_path.into(),
            stack: Vec::new(),
            root_anonymous: HashMap::new(),
            occurrences: HashMap::new(),
            export_bindings: HashMap::new(),
        }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Pushes a frame. `name` is `None` for anonymous scopes.
    pub fn enter_scope(&mut self, kind: ScopeKind, name: Option<&str>) -> ScopeHandle {
        let segment = match name {
            Some(name) => name.to_string(),
            None => {
                let counters = match self.stack.last_mut() {
                    Some(frame) => &mut frame.anonymous,
                    None => &mut self.root_anonymous,
                };
                let slot = counters.entry(kind).or_insert(0);
                let index = *slot;
                *slot += 1;
                format!("{}#{}", kind.as_str(), index)
            }
        };
        self.stack.push(ScopeFrame {
            segment,
            anonymous: HashMap::new(),
        });
        ScopeHandle {
            depth: self.stack.len(),
        }
    }

    /// Pops the innermost frame. The handle must belong to that frame.
    pub fn exit_scope(&mut self, handle: ScopeHandle) -> Result<(), CoreError> {
        if handle.depth != self.stack.len() {
            return Err(CoreError::ScopeMismatch {
                expected: self.stack.len(),
                found: handle.depth,
            });
        }
        self.stack.pop();
        Ok(())
    }

    /// Records `local` as exported under `exported`.
    ///
    /// Covers `export const x`, `export { x as y }` and CommonJS
    /// `exports.y = ...` (where local and exported coincide).
    pub fn register_export(&mut self, local: &str, exported: &str) {
        self.export_bindings
            .insert(local.to_string(), exported.to_string());
    }

    /// The exported name of a top-level local binding, if any.
    pub fn export_name(&self, local: &str) -> Option<&str> {
        self.export_bindings.get(local).map(String::as_str)
    }

    /// Registers a call-site at the current scope path.
    pub fn register_definition(&mut self) -> Result<DefinitionSite, CoreError> {
        if self.stack.is_empty() {
            return Err(CoreError::DefinitionOutsideScope {
                file_path: self.file_path.clone(),
            });
        }
        let base = self
            .stack
            .iter()
            .map(|frame| frame.segment.as_str())
            .collect::<Vec<_>>()
            .join(".");
        let seen = self.occurrences.entry(base.clone()).or_insert(0);
        let ast_path = if *seen == 0 {
            base
        } else {
            format!("{base}${seen}")
        };
        *seen += 1;

        let is_top_level = self.stack.len() <= 1;
        let local_binding = is_top_level.then(|| self.stack[0].segment.clone());
        let export_binding = local_binding
            .as_deref()
            .and_then(|local| self.export_name(local))
            .map(str::to_string);
        Ok(DefinitionSite {
            ast_path,
            is_top_level,
            local_binding,
            export_binding,
        })
    }

    /// `file_path::ast_path`.
    pub fn canonical_id(&self, ast_path: &str) -> CanonicalId {
        CanonicalId::new(&self.file_path, ast_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn define_in(tracker: &mut IdentityTracker, scopes: &[(ScopeKind, Option<&str>)]) -> String {
        let handles: Vec<_> = scopes
            .iter()
            .map(|(kind, name)| tracker.enter_scope(*kind, *name))
            .collect();
        let site = tracker.register_definition().unwrap();
        for handle in handles.into_iter().rev() {
            tracker.exit_scope(handle).unwrap();
        }
        site.ast_path
    }

    #[test]
    fn named_top_level_definition() {
        let mut tracker = IdentityTracker::new("/src/user.ts");
        tracker.register_export("userFragment", "userFragment");
        let h = tracker.enter_scope(ScopeKind::Variable, Some("userFragment"));
        let site = tracker.register_definition().unwrap();
        tracker.exit_scope(h).unwrap();

        assert_eq!(site.ast_path, "userFragment");
        assert!(site.is_top_level);
        assert_eq!(site.export_binding.as_deref(), Some("userFragment"));
        assert_eq!(
            tracker.canonical_id(&site.ast_path).as_str(),
            "/src/user.ts::userFragment"
        );
    }

    #[test]
    fn anonymous_segments_count_per_parent() {
        let mut tracker = IdentityTracker::new("/a.ts");
        let a = define_in(
            &mut tracker,
            &[(ScopeKind::Variable, Some("a")), (ScopeKind::Arrow, None)],
        );
        let b = define_in(
            &mut tracker,
            &[(ScopeKind::Variable, Some("b")), (ScopeKind::Arrow, None)],
        );
        assert_eq!(a, "a.arrow#0");
        assert_eq!(b, "b.arrow#0");
    }

    #[test]
    fn sibling_anonymous_scopes_increment() {
        let mut tracker = IdentityTracker::new("/a.ts");
        let outer = tracker.enter_scope(ScopeKind::Function, Some("setup"));
        let first = define_in(&mut tracker, &[(ScopeKind::Arrow, None)]);
        let second = define_in(&mut tracker, &[(ScopeKind::Arrow, None)]);
        let method = define_in(&mut tracker, &[(ScopeKind::Method, None)]);
        tracker.exit_scope(outer).unwrap();

        assert_eq!(first, "setup.arrow#0");
        assert_eq!(second, "setup.arrow#1");
        assert_eq!(method, "setup.method#0");
    }

    #[test]
    fn duplicate_paths_get_suffixes() {
        let mut tracker = IdentityTracker::new("/a.ts");
        let h = tracker.enter_scope(ScopeKind::Variable, Some("foo"));
        let first = tracker.register_definition().unwrap();
        let second = tracker.register_definition().unwrap();
        let third = tracker.register_definition().unwrap();
        tracker.exit_scope(h).unwrap();

        assert_eq!(first.ast_path, "foo");
        assert_eq!(second.ast_path, "foo$1");
        assert_eq!(third.ast_path, "foo$2");
    }

    #[test]
    fn nested_definitions_are_not_top_level() {
        let mut tracker = IdentityTracker::new("/a.ts");
        tracker.register_export("outer", "outer");
        let path = {
            let h1 = tracker.enter_scope(ScopeKind::Variable, Some("outer"));
            let h2 = tracker.enter_scope(ScopeKind::Property, Some("inner"));
            let site = tracker.register_definition().unwrap();
            tracker.exit_scope(h2).unwrap();
            tracker.exit_scope(h1).unwrap();
            site
        };
        assert_eq!(path.ast_path, "outer.inner");
        assert!(!path.is_top_level);
        assert_eq!(path.export_binding, None);
    }

    #[test]
    fn export_aliases_resolve() {
        let mut tracker = IdentityTracker::new("/a.ts");
        tracker.register_export("local", "Public");
        let h = tracker.enter_scope(ScopeKind::Variable, Some("local"));
        let site = tracker.register_definition().unwrap();
        tracker.exit_scope(h).unwrap();
        assert_eq!(site.export_binding.as_deref(), Some("Public"));
        assert_eq!(tracker.export_name("missing"), None);
    }

    #[test]
    fn mismatched_exit_is_rejected() {
        let mut tracker = IdentityTracker::new("/a.ts");
        let outer = tracker.enter_scope(ScopeKind::Variable, Some("a"));
        let _inner = tracker.enter_scope(ScopeKind::Arrow, None);
        let err = tracker.exit_scope(outer).unwrap_err();
        assert_eq!(err.code(), "SCOPE_MISMATCH");
    }

    #[test]
    fn definition_without_scope_fails() {
        let mut tracker = IdentityTracker::new("/a.ts");
        assert!(matches!(
            tracker.register_definition(),
            Err(CoreError::DefinitionOutsideScope { .. })
        ));
    }

    #[test]
    fn ids_are_stable_across_reruns() {
        let run = || {
            let mut tracker = IdentityTracker::new("/a.ts");
            vec![
                define_in(&mut tracker, &[(ScopeKind::Variable, Some("x"))]),
                define_in(
                    &mut tracker,
                    &[(ScopeKind::Function, Some("f")), (ScopeKind::Arrow, None)],
                ),
                define_in(&mut tracker, &[(ScopeKind::Arrow, None)]),
            ]
        };
        assert_eq!(run(), run());
    }
}
