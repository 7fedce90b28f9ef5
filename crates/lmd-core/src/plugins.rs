//! Plugin registry and execution-order validation.
//!
//! Each stage declares which stages it must run after or before and which
//! stages it conflicts with. [`PluginRegistry::validate`] checks a proposed
//! order against those declarations and, when the order is wrong but
//! satisfiable, proposes a corrected order that keeps the input order
//! wherever the constraints allow.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Static description of a pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginMetadata {
    pub name: String,
    pub description: String,
    /// Stages that must come later when present.
    pub run_before: Vec<String>,
    /// Stages that must come earlier when present.
    pub run_after: Vec<String>,
    /// Stages that may not appear in the same pipeline.
    pub conflicts: Vec<String>,
    pub required: bool,
    pub version: String,
}

impl PluginMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_run_before(mut self, names: &[&str]) -> Self {
        self.run_before = names.iter().map(|n| (*n).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn with_run_after(mut self, names: &[&str]) -> Self {
        self.run_after = names.iter().map(|n| (*n).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn with_conflicts(mut self, names: &[&str]) -> Self {
        self.conflicts = names.iter().map(|n| (*n).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    DependencyViolation,
    Conflict,
    CircularDependency,
    MissingRequired,
    UnknownPlugin,
}

impl IssueKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::DependencyViolation => "dependency-violation",
            IssueKind::Conflict => "conflict",
            IssueKind::CircularDependency => "circular-dependency",
            IssueKind::MissingRequired => "missing-required",
            IssueKind::UnknownPlugin => "unknown-plugin",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error or warning produced by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
    /// Stages involved, in the order the message names them.
    pub plugins: Vec<String>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Validation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Return [`OrderError`] when the order is invalid.
    pub throw_on_error: bool,
    /// Log warnings through `tracing`.
    pub log_warnings: bool,
    /// Report stages missing from the registry.
    pub strict_mode: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            throw_on_error: true,
            log_warnings: true,
            strict_mode: false,
        }
    }
}

/// Outcome of validating an order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    /// Corrected order, present when the input violates a dependency and no
    /// cycle prevents a fix.
    pub suggested_order: Option<Vec<String>>,
}

impl ValidationResult {
    /// Whether any error is a dependency cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.kind == IssueKind::CircularDependency)
    }
}

/// An invalid stage order.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct OrderError {
    pub message: String,
    pub result: ValidationResult,
}

impl OrderError {
    /// Build the error and its message from a failed validation.
    #[must_use]
    pub fn from_result(result: ValidationResult) -> Self {
        let mut message = String::from("Plugin order validation failed:");
        for issue in &result.errors {
            message.push_str("\n  - ");
            message.push_str(&issue.to_string());
        }
        if let Some(order) = &result.suggested_order {
            message.push_str("\nSuggested order: ");
            message.push_str(&order.join(", "));
        }
        Self { message, result }
    }
}

/// Name-keyed registry of stage metadata.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, PluginMetadata>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage, replacing any earlier entry with the same name.
    pub fn register(&mut self, metadata: PluginMetadata) {
        if self.plugins.contains_key(&metadata.name) {
            tracing::debug!(plugin = %metadata.name, "Replacing registered plugin");
        }
        self.plugins.insert(metadata.name.clone(), metadata);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PluginMetadata> {
        self.plugins.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Registered stage names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate an execution order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError`] when the order has errors and
    /// `options.throw_on_error` is set. The error message embeds the
    /// suggested order when one exists.
    pub fn validate<S: AsRef<str>>(
        &self,
        order: &[S],
        options: &ValidationOptions,
    ) -> Result<ValidationResult, OrderError> {
        let names: Vec<&str> = order.iter().map(AsRef::as_ref).collect();
        let position: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut seen_violations: HashSet<(&str, &str)> = HashSet::new();
        let mut seen_conflicts: HashSet<(&str, &str)> = HashSet::new();

        for (index, name) in names.iter().enumerate() {
            let Some(meta) = self.plugins.get(*name) else {
                if options.strict_mode {
                    warnings.push(ValidationIssue {
                        kind: IssueKind::UnknownPlugin,
                        message: format!("Plugin '{name}' is not registered"),
                        plugins: vec![(*name).to_owned()],
                    });
                }
                continue;
            };

            for before in &meta.run_after {
                if position.get(before.as_str()).is_some_and(|p| *p > index)
                    && seen_violations.insert((before.as_str(), name))
                {
                    errors.push(violation(before, name));
                }
            }
            for after in &meta.run_before {
                if position.get(after.as_str()).is_some_and(|p| *p < index)
                    && seen_violations.insert((name, after.as_str()))
                {
                    errors.push(violation(name, after));
                }
            }
            for other in &meta.conflicts {
                if !position.contains_key(other.as_str()) {
                    continue;
                }
                let pair = if name <= &other.as_str() {
                    (*name, other.as_str())
                } else {
                    (other.as_str(), *name)
                };
                if seen_conflicts.insert(pair) {
                    errors.push(ValidationIssue {
                        kind: IssueKind::Conflict,
                        message: format!("Plugin '{}' conflicts with '{}'", pair.0, pair.1),
                        plugins: vec![pair.0.to_owned(), pair.1.to_owned()],
                    });
                }
            }
        }

        let sorted = self.sort(&names);
        if let Err(cycle) = &sorted {
            errors.push(ValidationIssue {
                kind: IssueKind::CircularDependency,
                message: format!("Circular dependency among: {}", cycle.join(", ")),
                plugins: cycle.clone(),
            });
        }

        let mut required: Vec<&PluginMetadata> = self
            .plugins
            .values()
            .filter(|p| p.required && !position.contains_key(p.name.as_str()))
            .collect();
        required.sort_by(|a, b| a.name.cmp(&b.name));
        for plugin in required {
            warnings.push(ValidationIssue {
                kind: IssueKind::MissingRequired,
                message: format!("Required plugin '{}' is missing", plugin.name),
                plugins: vec![plugin.name.clone()],
            });
        }

        let has_violation = errors
            .iter()
            .any(|e| e.kind == IssueKind::DependencyViolation);
        let suggested_order = match sorted {
            Ok(order) if has_violation => Some(order),
            _ => None,
        };

        if options.log_warnings {
            for warning in &warnings {
                tracing::warn!(kind = %warning.kind, "{}", warning.message);
            }
        }

        let result = ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            suggested_order,
        };

        if options.throw_on_error && !result.valid {
            return Err(OrderError::from_result(result));
        }
        Ok(result)
    }

    /// Stable topological sort of `names` under the registered constraints.
    ///
    /// Among stages that are ready, the one earliest in `names` goes first.
    /// Returns the stages caught in a cycle on failure.
    fn sort(&self, names: &[&str]) -> Result<Vec<String>, Vec<String>> {
        let index: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); names.len()];

        for (i, name) in names.iter().enumerate() {
            let Some(meta) = self.plugins.get(*name) else {
                continue;
            };
            for before in &meta.run_after {
                if let Some(&j) = index.get(before.as_str()) {
                    successors[j].insert(i);
                }
            }
            for after in &meta.run_before {
                if let Some(&j) = index.get(after.as_str()) {
                    successors[i].insert(j);
                }
            }
        }

        let mut in_degree = vec![0usize; names.len()];
        for succ in &successors {
            for &j in succ {
                in_degree[j] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..names.len()).filter(|i| in_degree[*i] == 0).collect();
        let mut sorted = Vec::with_capacity(names.len());
        while let Some(i) = ready.pop_first() {
            sorted.push(names[i].to_owned());
            for &j in &successors[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.insert(j);
                }
            }
        }

        if sorted.len() < names.len() {
            let cycle = (0..names.len())
                .filter(|i| in_degree[*i] > 0 && reaches(&successors, &in_degree, *i, *i))
                .map(|i| names[i].to_owned())
                .collect();
            return Err(cycle);
        }
        Ok(sorted)
    }
}

/// Whether `target` is reachable from `from` in one or more steps through
/// stages the sort left unplaced.
fn reaches(successors: &[BTreeSet<usize>], in_degree: &[usize], from: usize, target: usize) -> bool {
    let mut seen = vec![false; successors.len()];
    let mut stack: Vec<usize> = successors[from].iter().copied().collect();
    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if seen[node] || in_degree[node] == 0 {
            continue;
        }
        seen[node] = true;
        stack.extend(successors[node].iter().copied());
    }
    false
}

fn violation(first: &str, second: &str) -> ValidationIssue {
    ValidationIssue {
        kind: IssueKind::DependencyViolation,
        message: format!("Plugin '{second}' must run after '{first}'"),
        plugins: vec![first.to_owned(), second.to_owned()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lenient() -> ValidationOptions {
        ValidationOptions {
            throw_on_error: false,
            log_warnings: false,
            strict_mode: false,
        }
    }

    #[test]
    fn test_run_after_violation() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginMetadata::new("B").with_run_after(&["A"]));

        let result = registry.validate(&["B", "A"], &lenient()).unwrap();

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, IssueKind::DependencyViolation);
        assert_eq!(result.errors[0].plugins, vec!["A".to_owned(), "B".to_owned()]);
        assert_eq!(
            result.suggested_order,
            Some(vec!["A".to_owned(), "B".to_owned()])
        );
    }

    #[test]
    fn test_valid_order() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginMetadata::new("B").with_run_after(&["A"]));
        let result = registry.validate(&["A", "B"], &lenient()).unwrap();
        assert!(result.valid);
        assert_eq!(result.suggested_order, None);
    }

    #[test]
    fn test_mirrored_constraints_report_once() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginMetadata::new("A").with_run_before(&["B"]));
        registry.register(PluginMetadata::new("B").with_run_after(&["A"]));
        let result = registry.validate(&["B", "A"], &lenient()).unwrap();
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_suggestion_is_stable() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginMetadata::new("c").with_run_after(&["a"]));
        let result = registry.validate(&["x", "c", "y", "a"], &lenient()).unwrap();
        assert_eq!(
            result.suggested_order,
            Some(vec!["x".to_owned(), "y".to_owned(), "a".to_owned(), "c".to_owned()])
        );
    }

    #[test]
    fn test_conflicts() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginMetadata::new("a").with_conflicts(&["b"]));
        registry.register(PluginMetadata::new("b").with_conflicts(&["a"]));
        let result = registry.validate(&["a", "b"], &lenient()).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, IssueKind::Conflict);
        assert_eq!(result.suggested_order, None);
    }

    #[test]
    fn test_cycle() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginMetadata::new("a").with_run_after(&["b"]));
        registry.register(PluginMetadata::new("b").with_run_after(&["a"]));
        let result = registry.validate(&["a", "b"], &lenient()).unwrap();
        assert!(result.has_cycle());
        assert_eq!(result.suggested_order, None);
        let cycle = result
            .errors
            .iter()
            .find(|e| e.kind == IssueKind::CircularDependency)
            .unwrap();
        assert_eq!(cycle.plugins, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn test_cycle_excludes_downstream_stages() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginMetadata::new("a").with_run_after(&["b"]));
        registry.register(PluginMetadata::new("b").with_run_after(&["a"]));
        registry.register(PluginMetadata::new("c").with_run_after(&["b"]));
        registry.register(PluginMetadata::new("d").with_run_after(&["c"]));
        let result = registry.validate(&["d", "a", "c", "b"], &lenient()).unwrap();
        let cycle = result
            .errors
            .iter()
            .find(|e| e.kind == IssueKind::CircularDependency)
            .unwrap();
        assert_eq!(cycle.plugins, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(cycle.message, "Circular dependency among: a, b");
    }

    #[test]
    fn test_warnings() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginMetadata::new("core").with_required(true));
        let strict = ValidationOptions {
            strict_mode: true,
            ..lenient()
        };
        let result = registry.validate(&["mystery"], &strict).unwrap();
        assert!(result.valid);
        let kinds: Vec<IssueKind> = result.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![IssueKind::UnknownPlugin, IssueKind::MissingRequired]);

        let result = registry.validate(&["mystery"], &lenient()).unwrap();
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_throw_on_error_embeds_suggestion() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginMetadata::new("B").with_run_after(&["A"]));
        let err = registry
            .validate(&["B", "A"], &ValidationOptions::default())
            .unwrap_err();
        assert!(err.message.contains("dependency-violation"));
        assert!(err.message.contains("Suggested order: A, B"));
        assert!(!err.result.valid);
    }
}
