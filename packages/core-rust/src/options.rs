//! Layered option resolution.
//!
//! An [`OptionTree`] is built from several layers: built-in defaults (some of
//! them lazy), caller overrides (key/value entries or bare flags), and
//! per-key normalization rules that may rewrite or reject a value. The
//! [`resolve`] function collapses those layers into one fully evaluated tree.
//!
//! # Resolution order
//!
//! 1. Overrides are deep-merged onto the defaults: nested trees merge key by
//!    key, everything else is replaced outright.
//! 2. The merged tree is walked top-down in insertion order (default keys
//!    first, then override-only keys in override order). Nested trees are
//!    resolved depth-first, so a parent's rule sees already-resolved
//!    children.
//! 3. For each key, a [`LazyDefault`] is evaluated against the whole tree as
//!    resolved so far, then the rule registered at the key's dotted path (if
//!    any) runs. A rule error aborts resolution.
//!
//! Unknown override keys are carried through untouched. Typed consumers read
//! the keys they know and ignore the rest.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::ConfigError;
use crate::value::Value;

// ---------------------------------------------------------------------------
// LazyDefault
// ---------------------------------------------------------------------------

type Producer = dyn Fn(&OptionTree) -> Value + Send + Sync;

/// Deferred default value, evaluated once per resolution pass.
///
/// The producer receives the tree as resolved so far, so it can derive its
/// value from sibling options that precede it.
#[derive(Clone)]
pub struct LazyDefault(Arc<Producer>);

impl LazyDefault {
    pub fn new(producer: impl Fn(&OptionTree) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(producer))
    }

    #[must_use]
    pub fn evaluate(&self, tree: &OptionTree) -> Value {
        (*self.0)(tree)
    }
}

impl fmt::Debug for LazyDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyDefault(..)")
    }
}

/// Producers have no structural identity; two lazies are equal only if they
/// share the same allocation.
impl PartialEq for LazyDefault {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ---------------------------------------------------------------------------
// OptionValue / OptionTree
// ---------------------------------------------------------------------------

/// A single entry in an [`OptionTree`].
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Value(Value),
    Lazy(LazyDefault),
    Tree(OptionTree),
}

impl OptionValue {
    /// The scalar value, if this entry is resolved and not a tree.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            OptionValue::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_tree(&self) -> Option<&OptionTree> {
        match self {
            OptionValue::Tree(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_lazy(&self) -> bool {
        matches!(self, OptionValue::Lazy(_))
    }
}

macro_rules! option_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for OptionValue {
                fn from(v: $ty) -> Self {
                    OptionValue::Value(Value::from(v))
                }
            }
        )*
    };
}

option_value_from!(bool, i32, i64, f64, &str, String);

impl From<Value> for OptionValue {
    fn from(v: Value) -> Self {
        OptionValue::Value(v)
    }
}

impl From<OptionTree> for OptionValue {
    fn from(tree: OptionTree) -> Self {
        OptionValue::Tree(tree)
    }
}

impl From<LazyDefault> for OptionValue {
    fn from(lazy: LazyDefault) -> Self {
        OptionValue::Lazy(lazy)
    }
}

/// Insertion-ordered mapping from option key to [`OptionValue`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionTree {
    entries: IndexMap<String, OptionValue>,
}

impl OptionTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style insert of a lazy default.
    #[must_use]
    pub fn with_lazy(
        self,
        key: impl Into<String>,
        producer: impl Fn(&OptionTree) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.with(key, LazyDefault::new(producer))
    }

    /// Inserts or replaces `key`. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.entries.shift_remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Looks up a dotted path such as `"html.class"`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&OptionValue> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = current.as_tree()?.get(segment)?;
        }
        Some(current)
    }

    /// The resolved scalar at `key`, if any.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(OptionValue::as_value)
    }

    /// The string at `key`, if it is a resolved string.
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn subtree(&self, key: &str) -> Option<&OptionTree> {
        self.get(key).and_then(OptionValue::as_tree)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry, at any depth, is still an unevaluated lazy default.
    #[must_use]
    pub fn has_lazy(&self) -> bool {
        self.entries.values().any(|v| match v {
            OptionValue::Lazy(_) => true,
            OptionValue::Tree(t) => t.has_lazy(),
            OptionValue::Value(_) => false,
        })
    }

    /// Converts a resolved tree into a [`Value::Map`]. Lazy entries become `Null`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.entries
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        OptionValue::Value(v) => v.clone(),
                        OptionValue::Tree(t) => t.to_value(),
                        OptionValue::Lazy(_) => Value::Null,
                    };
                    (k.clone(), value)
                })
                .collect(),
        )
    }

    fn get_segments_mut(&mut self, path: &[String]) -> Option<&mut OptionValue> {
        let (first, rest) = path.split_first()?;
        let mut current = self.entries.get_mut(first)?;
        for segment in rest {
            current = match current {
                OptionValue::Tree(t) => t.entries.get_mut(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn get_segments(&self, path: &[String]) -> Option<&OptionValue> {
        let (first, rest) = path.split_first()?;
        let mut current = self.entries.get(first)?;
        for segment in rest {
            current = current.as_tree()?.entries.get(segment)?;
        }
        Some(current)
    }

    // --- Typed readers used at configuration boundaries ---

    /// Reads an optional boolean. Missing and `Null` read as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if the entry is not a boolean.
    pub fn bool_option(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(key) {
            None | Some(OptionValue::Value(Value::Null)) => Ok(None),
            Some(OptionValue::Value(Value::Bool(b))) => Ok(Some(*b)),
            Some(_) => Err(ConfigError::invalid_option(key, "expected a boolean")),
        }
    }

    /// Reads an optional string. Missing, `Null` and blank strings read as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if the entry is not a string.
    pub fn string_option(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get(key) {
            None | Some(OptionValue::Value(Value::Null)) => Ok(None),
            Some(OptionValue::Value(Value::String(s))) if s.trim().is_empty() => Ok(None),
            Some(OptionValue::Value(Value::String(s))) => Ok(Some(s.clone())),
            Some(_) => Err(ConfigError::invalid_option(key, "expected a string")),
        }
    }

    /// Reads a nested tree. Missing and `Null` read as an empty tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if the entry is a scalar.
    pub fn tree_option(&self, key: &str) -> Result<OptionTree, ConfigError> {
        match self.get(key) {
            None | Some(OptionValue::Value(Value::Null)) => Ok(OptionTree::new()),
            Some(OptionValue::Tree(t)) => Ok(t.clone()),
            Some(_) => Err(ConfigError::invalid_option(key, "expected a nested option tree")),
        }
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for OptionTree {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = OptionTree::new();
        for (k, v) in iter {
            tree.insert(k, v);
        }
        tree
    }
}

// ---------------------------------------------------------------------------
// Normalization rules
// ---------------------------------------------------------------------------

type RuleFn =
    dyn Fn(&OptionValue, &OptionTree) -> Result<Option<OptionValue>, ConfigError> + Send + Sync;

/// Per-path normalization rules applied during [`resolve`].
///
/// A rule receives the resolved value at its path and the whole tree as
/// resolved so far. Returning `Ok(Some(v))` replaces the value, `Ok(None)`
/// keeps it, and an error aborts resolution.
///
/// Rule sets are built by the component that owns the options (a column or a
/// table) and passed explicitly; nothing is registered globally.
#[derive(Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, Arc<RuleFn>>,
}

impl RuleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of a rule at a dotted path.
    #[must_use]
    pub fn rule(
        mut self,
        path: impl Into<String>,
        rule: impl Fn(&OptionValue, &OptionTree) -> Result<Option<OptionValue>, ConfigError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.rules.insert(path.into(), Arc::new(rule));
        self
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.rules.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn get(&self, path: &str) -> Option<&Arc<RuleFn>> {
        self.rules.get(path)
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        paths.sort_unstable();
        f.debug_struct("RuleSet").field("paths", &paths).finish()
    }
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Caller-supplied override layer: key/value entries plus bare flags.
///
/// A flag `f` is shorthand for `{f: true}` and takes precedence over an
/// entry with the same key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    entries: OptionTree,
    flags: Vec<String>,
}

impl Overrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.flags.push(name.into());
        self
    }

    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.entries.insert(key, value);
        self
    }

    /// Layers `other` on top of `self`, deep-merging entries.
    #[must_use]
    pub fn merged_with(self, other: &Overrides) -> Self {
        Overrides {
            entries: merge(&self.into_tree(), &other.to_tree()),
            flags: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.flags.is_empty()
    }

    /// The override layer as a tree, flags expanded to `true`.
    #[must_use]
    pub fn to_tree(&self) -> OptionTree {
        self.clone().into_tree()
    }

    #[must_use]
    pub fn into_tree(self) -> OptionTree {
        let mut tree = self.entries;
        for flag in self.flags {
            tree.insert(flag, true);
        }
        tree
    }
}

impl From<OptionTree> for Overrides {
    fn from(entries: OptionTree) -> Self {
        Self {
            entries,
            flags: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge + resolve
// ---------------------------------------------------------------------------

/// Deep-merges `overrides` onto `defaults`.
///
/// Trees on both sides merge recursively; any other combination is replaced
/// by the override. Default keys keep their position; override-only keys are
/// appended in override order.
#[must_use]
pub fn merge(defaults: &OptionTree, overrides: &OptionTree) -> OptionTree {
    let mut merged = defaults.clone();
    for (key, value) in &overrides.entries {
        match (merged.entries.get_mut(key), value) {
            (Some(OptionValue::Tree(base)), OptionValue::Tree(layer)) => {
                *base = merge(base, layer);
            }
            _ => {
                merged.entries.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Resolves `overrides` against `defaults`, evaluating lazy defaults and
/// applying `rules`.
///
/// # Errors
///
/// Propagates the first [`ConfigError`] raised by a rule.
pub fn resolve(
    defaults: &OptionTree,
    rules: &RuleSet,
    overrides: &Overrides,
) -> Result<OptionTree, ConfigError> {
    let mut root = merge(defaults, &overrides.to_tree());
    let mut path = Vec::new();
    resolve_level(&mut root, &mut path, rules)?;
    Ok(root)
}

fn resolve_level(
    root: &mut OptionTree,
    path: &mut Vec<String>,
    rules: &RuleSet,
) -> Result<(), ConfigError> {
    let keys: Vec<String> = if path.is_empty() {
        root.entries.keys().cloned().collect()
    } else {
        match root.get_segments(path) {
            Some(OptionValue::Tree(t)) => t.entries.keys().cloned().collect(),
            _ => return Ok(()),
        }
    };

    for key in keys {
        path.push(key);

        let is_tree = matches!(root.get_segments(path), Some(OptionValue::Tree(_)));
        let lazy = match root.get_segments(path) {
            Some(OptionValue::Lazy(lazy)) => Some(lazy.clone()),
            _ => None,
        };
        if is_tree {
            resolve_level(root, path, rules)?;
        } else if let Some(lazy) = lazy {
            let value = lazy.evaluate(root);
            if let Some(slot) = root.get_segments_mut(path) {
                *slot = OptionValue::Value(value);
            }
        }

        let dotted = path.join(".");
        if let Some(rule) = rules.get(&dotted) {
            let replacement = match root.get_segments(path) {
                Some(value) => (**rule)(value, root)?,
                None => None,
            };
            if let Some(replacement) = replacement {
                tracing::trace!(option = %dotted, "normalization rule replaced value");
                if let Some(slot) = root.get_segments_mut(path) {
                    *slot = replacement;
                }
            }
        }

        path.pop();
    }
    Ok(())
}
