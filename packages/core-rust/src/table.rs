//! The grid table: declarations, preference-driven view state, query
//! fragments, rendering and export.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::column::{Column, ColumnContext, RenderBlock};
use crate::config::{RowLink, TableConfig};
use crate::error::{ConfigError, GridError};
use crate::filter::{Filter, FilterBlock, FilterForm};
use crate::format::FormatterRegistry;
use crate::fragment;
use crate::options::{self, OptionTree, OptionValue, Overrides};
use crate::persistence::PreferenceStore;
use crate::record::{self, RecordProvider, RecordType, Row, TypeCatalog};
use crate::registry::ColumnRegistry;
use crate::value::Value;
use crate::visibility::{self, PreferenceScope, SortState, ViewCache};

/// A grid over one record type.
///
/// Tables are built per request. Column declarations and option updates
/// invalidate the cached view; otherwise visible/hidden lists and the sort
/// are resolved once from the attached [`PreferenceStore`].
pub struct Table {
    root: RecordType,
    catalog: TypeCatalog,
    formatters: FormatterRegistry,
    resolved: OptionTree,
    config: TableConfig,
    columns: ColumnRegistry,
    store: Option<Arc<dyn PreferenceStore>>,
    filter: Option<Filter>,
    view: ViewCache,
}

impl Table {
    /// Creates a table over `root` with the built-in formatters.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] raised while resolving the table options.
    pub fn new(root: RecordType, overrides: &Overrides) -> Result<Self, ConfigError> {
        let resolved = options::resolve(
            &TableConfig::defaults_for(&root),
            &TableConfig::rules_for(&root),
            overrides,
        )?;
        let config = TableConfig::from_tree(&resolved)?;
        tracing::debug!(table = %config.id, root = %root.name, "table created");
        Ok(Self {
            root,
            catalog: TypeCatalog::new(),
            formatters: FormatterRegistry::with_builtins(),
            resolved,
            config,
            columns: ColumnRegistry::new(),
            store: None,
            filter: None,
            view: ViewCache::new(),
        })
    }

    /// Creates a table over the provider's record type.
    ///
    /// # Errors
    ///
    /// See [`Table::new`].
    pub fn for_provider(
        provider: &dyn RecordProvider,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        Self::new(provider.record_type().clone(), overrides)
    }

    // --- Configuration ---

    /// Layers `overrides` on top of the current table options.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] raised while resolving; the table is unchanged on error.
    pub fn update_options(&mut self, overrides: &Overrides) -> Result<(), ConfigError> {
        let resolved =
            options::resolve(&self.resolved, &TableConfig::rules_for(&self.root), overrides)?;
        self.config = TableConfig::from_tree(&resolved)?;
        self.resolved = resolved;
        self.invalidate();
        Ok(())
    }

    /// Attaches the store that persisted preferences are read from and written to.
    pub fn attach_store(&mut self, store: Arc<dyn PreferenceStore>) {
        self.store = Some(store);
        self.invalidate();
    }

    #[must_use]
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Makes an associated record type available to nested column ids
    /// declared after this call.
    pub fn register_type(&mut self, record_type: RecordType) {
        self.catalog.register(record_type);
    }

    /// Formatters available to this table's columns.
    pub fn formatters_mut(&mut self) -> &mut FormatterRegistry {
        &mut self.formatters
    }

    #[must_use]
    pub fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }

    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    #[must_use]
    pub fn resolved_options(&self) -> &OptionTree {
        &self.resolved
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.config.title
    }

    #[must_use]
    pub fn root_type(&self) -> &RecordType {
        &self.root
    }

    /// Clears cached view state. The next read re-resolves from the store.
    pub fn invalidate(&mut self) {
        self.view.invalidate(&mut self.columns);
    }

    // --- Columns ---

    /// Declares columns from an `"id[:Display Name], ..."` list.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] raised while creating or updating a column; no
    /// column changes on error.
    pub fn declare_columns(
        &mut self,
        declaration: &str,
        overrides: &Overrides,
    ) -> Result<(), ConfigError> {
        let ctx = ColumnContext {
            root: &self.root,
            catalog: &self.catalog,
            formatters: &self.formatters,
        };
        let ids = self.columns.declare(&ctx, declaration, overrides)?;
        tracing::trace!(table = %self.config.id, columns = ?ids, "columns declared");
        self.invalidate();
        Ok(())
    }

    /// Declares several groups at once, each with its own overrides, as with
    /// `[("first_name, last_name", Overrides::new()), ("ssn", hidden)]`.
    ///
    /// # Errors
    ///
    /// The first [`ConfigError`] from any group; no group is committed on
    /// error.
    pub fn declare_many<'a, I>(&mut self, groups: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (&'a str, Overrides)>,
    {
        let ctx = ColumnContext {
            root: &self.root,
            catalog: &self.catalog,
            formatters: &self.formatters,
        };
        let mut staged = self.columns.clone();
        for (declaration, overrides) in groups {
            staged.declare(&ctx, declaration, &overrides)?;
        }
        self.columns = staged;
        tracing::trace!(
            table = %self.config.id,
            columns = self.columns.len(),
            "column groups declared"
        );
        self.invalidate();
        Ok(())
    }

    /// Assigns a formatter tag and its options to the listed columns. The
    /// options replace whatever the columns were formatted with before.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ColumnNotDeclared`] if any id is unknown (nothing is
    /// changed), or [`ConfigError::UnsupportedFormat`] for an unknown tag.
    pub fn format(
        &mut self,
        ids: &str,
        tag: &str,
        format_options: impl Into<OptionValue>,
    ) -> Result<(), ConfigError> {
        self.columns
            .assign_format(&self.formatters, ids, tag, format_options)?;
        self.invalidate();
        Ok(())
    }

    /// Installs a custom cell renderer on a declared column.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ColumnNotDeclared`] if `id` is unknown.
    pub fn set_render_block(
        &mut self,
        id: &str,
        block: impl Fn(&Column, &Value, &dyn Row) -> String + Send + Sync + 'static,
    ) -> Result<(), ConfigError> {
        let block: RenderBlock = Arc::new(block);
        self.columns.set_render_block(id, block)
    }

    /// Installs the filter area, submitting to `url` with `form_options`
    /// layered over `method = get`. Replaces any earlier filter.
    pub fn set_filter(
        &mut self,
        url: impl Into<OptionValue>,
        form_options: &OptionTree,
        block: impl Fn(&FilterForm) -> String + Send + Sync + 'static,
    ) {
        let block: FilterBlock = Arc::new(block);
        self.filter = Some(Filter::new(FilterForm::new(url, form_options), block));
    }

    #[must_use]
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Filter area markup, or `None` when no filter is installed.
    #[must_use]
    pub fn render_filter(&self) -> Option<String> {
        self.filter.as_ref().map(Filter::render)
    }

    /// Looks up a column; fails only when `required` and it is not declared.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ColumnNotDeclared`] if `required` and not found.
    pub fn column(&self, id: &str, required: bool) -> Result<Option<&Column>, ConfigError> {
        self.columns.get(id, required)
    }

    /// All declared columns, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    // --- Preferences ---

    fn scope(&self) -> Result<PreferenceScope, GridError> {
        let store = self
            .store
            .clone()
            .ok_or_else(|| GridError::StateUnavailable {
                table: self.config.id.clone(),
            })?;
        Ok(PreferenceScope::new(
            store,
            self.config.namespace.as_str(),
            self.config.id.as_str(),
        ))
    }

    /// Persists a sort choice. Returns `Ok(false)`, writing nothing, if `id`
    /// is not declared. The current pass keeps its resolved sort.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn set_sort(&self, id: &str, ascending: bool) -> Result<bool, GridError> {
        let scope = self.scope()?;
        Ok(visibility::set_sort(&self.columns, &scope, id, ascending))
    }

    /// Columns the user has chosen to see, in their chosen order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn visible_columns(&mut self) -> Result<Vec<&Column>, GridError> {
        let scope = self.scope()?;
        self.view
            .ensure_visible(&mut self.columns, &scope, self.config.reload);
        Ok(self.lookup(self.view.visible()))
    }

    /// Declared columns that are not visible, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn hidden_columns(&mut self) -> Result<Vec<&Column>, GridError> {
        let scope = self.scope()?;
        self.view
            .ensure_hidden(&mut self.columns, &scope, self.config.reload);
        Ok(self.lookup(self.view.hidden()))
    }

    /// Visible columns followed by hidden ones.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn all_sorted_columns(&mut self) -> Result<Vec<&Column>, GridError> {
        let scope = self.scope()?;
        self.view
            .ensure_all_sorted(&mut self.columns, &scope, self.config.reload);
        Ok(self.lookup(self.view.all_sorted()))
    }

    fn lookup(&self, ids: &[String]) -> Vec<&Column> {
        ids.iter().filter_map(|id| self.columns.find(id)).collect()
    }

    /// The resolved sort for this pass.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn sort_state(&mut self) -> Result<SortState, GridError> {
        let scope = self.scope()?;
        self.view.ensure_sort(
            &mut self.columns,
            &scope,
            self.config.default_sort.as_deref(),
        );
        Ok(self.view.sort().cloned().unwrap_or_default())
    }

    /// The column currently shown as sorted, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn sort_column(&mut self) -> Result<Option<&Column>, GridError> {
        let sort = self.sort_state()?;
        Ok(sort.column_id.and_then(|id| self.columns.find(&id)))
    }

    // --- Query fragments ---

    /// ORDER BY clauses: `sort_before`, the resolved sort, then `sort_after`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn order_clauses(&mut self) -> Result<Vec<String>, GridError> {
        let sort = self.sort_state()?;
        let mut clauses = Vec::new();
        if let Some(before) = &self.config.sort_before {
            clauses.push(before.clone());
        }
        let sorted = sort
            .column_id
            .as_deref()
            .filter(|_| sort.enabled)
            .and_then(|id| self.columns.find(id));
        if let Some(column) = sorted {
            clauses.push(format!(
                "{} {}",
                column.qualified_name(),
                sort.direction.as_sql()
            ));
        }
        if let Some(after) = &self.config.sort_after {
            clauses.push(after.clone());
        }
        Ok(clauses)
    }

    /// The ORDER BY fragment, or `None` when there is nothing to order by.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn build_order_fragment(&mut self) -> Result<Option<String>, GridError> {
        let clauses = self.order_clauses()?;
        Ok((!clauses.is_empty()).then(|| clauses.join(", ")))
    }

    /// The SELECT list when `auto_select` is on: the root primary key followed
    /// by every declared column in display order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn build_select_fragment(&mut self) -> Result<Option<String>, GridError> {
        if !self.config.auto_select {
            return Ok(None);
        }
        let primary = fragment::qualified(&self.root.table_name, &self.root.primary_key);
        let fields: Vec<String> = std::iter::once(primary)
            .chain(
                self.all_sorted_columns()?
                    .into_iter()
                    .map(Column::qualified_name),
            )
            .collect();
        Ok(Some(fields.join(", ")))
    }

    /// Applies the SELECT and ORDER BY fragments to `provider`.
    ///
    /// # Errors
    ///
    /// [`GridError::StateUnavailable`] without a store, or
    /// [`GridError::Provider`] if the provider rejects a fragment.
    pub fn prepare(&mut self, provider: &mut dyn RecordProvider) -> Result<(), GridError> {
        if provider.record_type().name != self.root.name {
            tracing::warn!(
                table = %self.config.id,
                expected = %self.root.name,
                actual = %provider.record_type().name,
                "record provider type does not match table root type"
            );
        }
        if let Some(select) = self.build_select_fragment()? {
            provider.select(&select)?;
        }
        for clause in self.order_clauses()? {
            provider.order(&clause)?;
        }
        Ok(())
    }

    // --- Rendering and export ---

    /// Renders one cell.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ColumnNotDeclared`] if `id` is unknown.
    pub fn render_cell(&self, id: &str, row: &dyn Row) -> Result<String, ConfigError> {
        Ok(self.columns.require(id)?.render(row, &self.formatters))
    }

    /// Renders the visible cells of one row, in display order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn render_row(&mut self, row: &dyn Row) -> Result<Vec<String>, GridError> {
        let scope = self.scope()?;
        self.view
            .ensure_visible(&mut self.columns, &scope, self.config.reload);
        Ok(self
            .lookup(self.view.visible())
            .into_iter()
            .map(|column| column.render(row, &self.formatters))
            .collect())
    }

    /// Link parameters for a clicked row, or `None` when rows are not
    /// clickable. The row's primary key is always set as `id`.
    #[must_use]
    pub fn row_link(&self, row: &dyn Row) -> Option<OptionTree> {
        let id = record::extract(row, &self.root.primary_key);
        match &self.config.url {
            RowLink::Disabled => None,
            RowLink::Record => Some(
                OptionTree::new()
                    .with("record", self.root.name.as_str())
                    .with("id", id),
            ),
            RowLink::Params(params) => {
                let mut link = params.clone();
                link.insert("id", id);
                Some(link)
            }
        }
    }

    /// Column id to display name, over all columns in display order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn column_names(&mut self) -> Result<IndexMap<String, String>, GridError> {
        Ok(self
            .all_sorted_columns()?
            .into_iter()
            .map(|column| (column.id().to_string(), column.name().to_string()))
            .collect())
    }

    /// Header labels of the visible columns.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::StateUnavailable`] if no store is attached.
    pub fn export_headers(&mut self) -> Result<Vec<String>, GridError> {
        Ok(self
            .visible_columns()?
            .into_iter()
            .map(|column| column.name().to_string())
            .collect())
    }

    /// Prepares `provider` and reads the raw values of the visible columns
    /// for every row.
    ///
    /// # Errors
    ///
    /// See [`Table::prepare`].
    pub fn export_rows(
        &mut self,
        provider: &mut dyn RecordProvider,
    ) -> Result<Vec<Vec<Value>>, GridError> {
        self.prepare(provider)?;
        let columns = self.visible_columns()?;
        Ok(provider
            .rows()
            .map(|row| columns.iter().map(|column| column.value(row)).collect())
            .collect())
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("root", &self.root.name)
            .field("config", &self.config)
            .field("columns", &self.columns)
            .field("has_store", &self.store.is_some())
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
