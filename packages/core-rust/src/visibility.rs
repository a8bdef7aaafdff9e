//! Visible / hidden / sorted column resolution from persisted preferences.
//!
//! Persisted strings come from the user (cookies, session) and are untrusted.
//! Every id read back is checked against the [`ColumnRegistry`]; anything not
//! declared is dropped, so only declared ids ever reach a query fragment.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::column::SortDirection;
use crate::persistence::{self, Preference, PreferenceStore};
use crate::registry::ColumnRegistry;

/// Where a table's preferences live: the store plus the key prefix parts.
#[derive(Clone)]
pub struct PreferenceScope {
    store: Arc<dyn PreferenceStore>,
    namespace: String,
    table_id: String,
}

impl PreferenceScope {
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        namespace: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            table_id: table_id.into(),
        }
    }

    #[must_use]
    pub fn key(&self, preference: Preference) -> String {
        persistence::preference_key(&self.namespace, &self.table_id, preference)
    }

    /// Reads a preference; blank values read as `None`.
    #[must_use]
    pub fn read(&self, preference: Preference) -> Option<String> {
        persistence::read_preference(self.store.as_ref(), &self.key(preference))
    }

    pub fn write(&self, preference: Preference, value: &str) {
        self.store.set(&self.key(preference), value);
    }

    #[must_use]
    pub fn table_id(&self) -> &str {
        &self.table_id
    }
}

impl fmt::Debug for PreferenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferenceScope")
            .field("namespace", &self.namespace)
            .field("table_id", &self.table_id)
            .finish_non_exhaustive()
    }
}

/// The resolved sort for one pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortState {
    /// Column shown as sorted. When ordering is disabled this is the first
    /// declared column, for display only.
    pub column_id: Option<String>,
    pub direction: SortDirection,
    /// Whether an ORDER BY clause is produced for `column_id`.
    pub enabled: bool,
}

impl SortState {
    /// The `"<id> <asc|desc>"` form persisted by [`set_sort`].
    #[must_use]
    pub fn to_preference(&self) -> Option<String> {
        self.column_id
            .as_ref()
            .filter(|_| self.enabled)
            .map(|id| format!("{id} {}", self.direction))
    }
}

/// Splits a persisted column list on `,`, trimming and skipping empties.
#[must_use]
pub fn parse_column_list(persisted: &str) -> Vec<&str> {
    persisted
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect()
}

/// Splits a persisted sort into its id and direction. The direction token is
/// optional and defaults to ascending.
#[must_use]
pub fn parse_sort(persisted: &str) -> (&str, SortDirection) {
    let mut tokens = persisted.split_whitespace();
    let id = tokens.next().unwrap_or_default();
    let direction = tokens.next().map_or(SortDirection::Asc, SortDirection::parse);
    (id, direction)
}

/// Per-table cache of the resolved lists and sort.
///
/// Each entry is computed at most once between calls to
/// [`ViewCache::invalidate`].
#[derive(Debug, Clone, Default)]
pub struct ViewCache {
    visible: Option<Vec<String>>,
    hidden: Option<Vec<String>>,
    all_sorted: Option<Vec<String>>,
    sort: Option<SortState>,
}

impl ViewCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached entry and the per-column visible/sort state.
    pub fn invalidate(&mut self, registry: &mut ColumnRegistry) {
        *self = Self::default();
        registry.reset_state();
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.visible.is_some() || self.sort.is_some()
    }

    /// Resolves the visible ids if not cached.
    ///
    /// When nothing is persisted yet, or `reload` is set, the non-hidden
    /// declared columns are written back as the new preference first.
    pub fn ensure_visible(
        &mut self,
        registry: &mut ColumnRegistry,
        scope: &PreferenceScope,
        reload: bool,
    ) {
        if self.visible.is_some() {
            return;
        }

        let persisted = match scope.read(Preference::Columns) {
            Some(persisted) if !reload => persisted,
            _ => {
                let fresh = registry
                    .iter()
                    .filter(|column| !column.is_hidden())
                    .map(|column| column.id())
                    .collect::<Vec<_>>()
                    .join(", ");
                scope.write(Preference::Columns, &fresh);
                fresh
            }
        };

        let mut seen = HashSet::new();
        let mut visible = Vec::new();
        for id in parse_column_list(&persisted) {
            let Some(column) = registry.find_mut(id) else {
                tracing::debug!(
                    table = %scope.table_id(),
                    column = %id,
                    "dropping undeclared column from persisted preference"
                );
                continue;
            };
            if seen.insert(id.to_string()) {
                column.set_visible(true);
                visible.push(id.to_string());
            }
        }
        self.visible = Some(visible);
    }

    pub fn ensure_hidden(
        &mut self,
        registry: &mut ColumnRegistry,
        scope: &PreferenceScope,
        reload: bool,
    ) {
        if self.hidden.is_some() {
            return;
        }
        self.ensure_visible(registry, scope, reload);
        let visible: HashSet<&str> = self.visible().iter().map(String::as_str).collect();
        let hidden = registry
            .ids()
            .filter(|id| !visible.contains(id))
            .map(str::to_string)
            .collect();
        self.hidden = Some(hidden);
    }

    pub fn ensure_all_sorted(
        &mut self,
        registry: &mut ColumnRegistry,
        scope: &PreferenceScope,
        reload: bool,
    ) {
        if self.all_sorted.is_some() {
            return;
        }
        self.ensure_hidden(registry, scope, reload);
        let all = self
            .visible()
            .iter()
            .chain(self.hidden())
            .cloned()
            .collect();
        self.all_sorted = Some(all);
    }

    /// Resolves the active sort if not cached: persisted sort, then
    /// `default_sort`, then the first declared column.
    pub fn ensure_sort(
        &mut self,
        registry: &mut ColumnRegistry,
        scope: &PreferenceScope,
        default_sort: Option<&str>,
    ) {
        if self.sort.is_some() {
            return;
        }
        let first = registry.first().map(|column| column.id().to_string());
        let raw = scope
            .read(Preference::Sort)
            .or_else(|| default_sort.map(str::to_string))
            .or_else(|| first.clone());

        let state = match raw {
            None => SortState::default(),
            Some(raw) => {
                let (id, direction) = parse_sort(&raw);
                match registry.find_mut(id) {
                    Some(column) if column.is_sortable() => {
                        column.set_sort_order(Some(direction));
                        SortState {
                            column_id: Some(id.to_string()),
                            direction,
                            enabled: true,
                        }
                    }
                    _ => {
                        tracing::debug!(
                            table = %scope.table_id(),
                            sort = %raw,
                            "sort column is undeclared or unsortable; ordering disabled"
                        );
                        SortState {
                            column_id: first,
                            direction,
                            enabled: false,
                        }
                    }
                }
            }
        };
        self.sort = Some(state);
    }

    #[must_use]
    pub fn visible(&self) -> &[String] {
        self.visible.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn hidden(&self) -> &[String] {
        self.hidden.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn all_sorted(&self) -> &[String] {
        self.all_sorted.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn sort(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }
}

/// Persists a sort choice for `id`. Returns `false`, writing nothing, if the
/// id is not declared. Cached sort state is left as is; it takes effect on
/// the next pass.
pub fn set_sort(
    registry: &ColumnRegistry,
    scope: &PreferenceScope,
    id: &str,
    ascending: bool,
) -> bool {
    if !registry.contains(id) {
        return false;
    }
    let direction = SortDirection::from_ascending(ascending);
    scope.write(Preference::Sort, &format!("{id} {direction}"));
    true
}
