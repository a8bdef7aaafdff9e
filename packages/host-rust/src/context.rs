//! Per-request grid construction.

use std::sync::Arc;

use autogrid_core::{ConfigError, Overrides, PreferenceStore, RecordType, Table};

use crate::config::HostConfig;

/// What a host knows about the request a grid is built for.
#[derive(Clone)]
pub struct GridRequest {
    /// Handling controller (or route group), e.g. `"users"`.
    pub controller: String,
    /// Handling action, e.g. `"index"`.
    pub action: String,
    /// Where this user's preferences live.
    pub store: Arc<dyn PreferenceStore>,
}

impl GridRequest {
    pub fn new(
        controller: impl Into<String>,
        action: impl Into<String>,
        store: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
            store,
        }
    }

    /// `"<controller>_<action>_<Type>"`, so each page keeps its own preferences.
    #[must_use]
    pub fn default_table_id(&self, root: &RecordType) -> String {
        format!("{}_{}_{}", self.controller, self.action, root.name)
    }
}

impl std::fmt::Debug for GridRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridRequest")
            .field("controller", &self.controller)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Builds a table for `request`.
///
/// Options are layered lowest first: host defaults, the request-derived table
/// id, then `overrides`. The request's store is attached before `configure`
/// runs, so `configure` can declare columns and read preferences.
///
/// # Errors
///
/// Any [`ConfigError`] from resolving options or from `configure`.
pub fn build_grid(
    request: &GridRequest,
    config: &HostConfig,
    root: RecordType,
    overrides: &Overrides,
    configure: impl FnOnce(&mut Table) -> Result<(), ConfigError>,
) -> Result<Table, ConfigError> {
    let layered = config
        .table_overrides()
        .merged_with(&Overrides::new().set("id", request.default_table_id(&root)))
        .merged_with(overrides);
    let mut table = Table::new(root, &layered)?;
    table.attach_store(Arc::clone(&request.store));
    configure(&mut table)?;
    tracing::debug!(
        table = %table.id(),
        controller = %request.controller,
        action = %request.action,
        columns = table.columns().count(),
        "grid built"
    );
    Ok(table)
}
