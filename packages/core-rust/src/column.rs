//! Grid columns: a declared projection of one field path on a row.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::format::FormatterRegistry;
use crate::fragment;
use crate::inflect;
use crate::options::{self, OptionTree, OptionValue, Overrides, RuleSet};
use crate::record::{self, RecordType, Row, TypeCatalog};
use crate::value::Value;

// ---------------------------------------------------------------------------
// SortDirection
// ---------------------------------------------------------------------------

/// Sort direction for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parses a persisted direction token. Case-insensitive; anything other
    /// than `desc` is ascending.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        if token.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    #[must_use]
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }

    /// Lowercase form used in persisted preferences.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// Uppercase keyword used in ORDER BY fragments.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ColumnOptions
// ---------------------------------------------------------------------------

const KNOWN_OPTIONS: &[&str] = &[
    "name",
    "format",
    "format_options",
    "html",
    "header_html",
    "hidden",
    "sortable",
    "always_visible",
];

/// Typed view of a column's resolved option tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnOptions {
    /// Human-readable header label.
    pub name: String,
    /// Formatter tag, looked up in the table's [`FormatterRegistry`].
    pub format: String,
    /// Options handed to the formatter.
    pub format_options: OptionTree,
    /// HTML attributes for body cells.
    pub html: OptionTree,
    /// HTML attributes for the header cell.
    pub header_html: OptionTree,
    /// Hidden unless the user's persisted preference shows it.
    pub hidden: bool,
    pub sortable: bool,
    /// Cannot be hidden by the user.
    pub always_visible: bool,
}

impl ColumnOptions {
    /// Reads the typed options out of a resolved tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] when a known key has the wrong type.
    pub fn from_tree(column_id: &str, tree: &OptionTree) -> Result<Self, ConfigError> {
        for key in tree.keys().filter(|k| !KNOWN_OPTIONS.contains(k)) {
            tracing::debug!(column = %column_id, option = %key, "ignoring unknown column option");
        }
        let scoped = |err: ConfigError| match err {
            ConfigError::InvalidOption { key, message } => ConfigError::InvalidOption {
                key: format!("{column_id}.{key}"),
                message,
            },
            other => other,
        };
        Ok(Self {
            name: tree.string_option("name").map_err(scoped)?.unwrap_or_default(),
            format: tree
                .string_option("format")
                .map_err(scoped)?
                .unwrap_or_else(|| "plain".to_string()),
            format_options: tree.tree_option("format_options").map_err(scoped)?,
            html: tree.tree_option("html").map_err(scoped)?,
            header_html: tree.tree_option("header_html").map_err(scoped)?,
            hidden: tree.bool_option("hidden").map_err(scoped)?.unwrap_or(false),
            sortable: tree.bool_option("sortable").map_err(scoped)?.unwrap_or(true),
            always_visible: tree
                .bool_option("always_visible")
                .map_err(scoped)?
                .unwrap_or(false),
        })
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Custom cell renderer. Receives the column, the raw field value and the
/// row; overrides the column's formatter when set.
pub type RenderBlock = Arc<dyn Fn(&Column, &Value, &dyn Row) -> String + Send + Sync>;

/// What a column needs from its owning table while resolving options.
#[derive(Debug, Clone, Copy)]
pub struct ColumnContext<'a> {
    pub root: &'a RecordType,
    pub catalog: &'a TypeCatalog,
    pub formatters: &'a FormatterRegistry,
}

/// A declared grid column.
///
/// Identity is the dotted `id`. The last segment is the field attribute; the
/// segment before it (if any) names the association the field belongs to.
#[derive(Clone)]
pub struct Column {
    id: String,
    attribute: String,
    owner_type: RecordType,
    db_table: String,
    resolved: OptionTree,
    options: ColumnOptions,
    render_block: Option<RenderBlock>,
    visible: bool,
    sort_order: Option<SortDirection>,
}

impl Column {
    /// Creates a column and resolves its options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidColumnId`] for ids that are not dotted
    /// identifiers, and any error raised while resolving `overrides`
    /// (e.g. [`ConfigError::UnsupportedFormat`]).
    pub fn new(
        ctx: &ColumnContext<'_>,
        id: &str,
        display_name: Option<&str>,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        fragment::validate_column_id(id)?;

        let segments: Vec<&str> = id.split('.').collect();
        let attribute = segments[segments.len() - 1].to_string();
        let (owner_type, db_table) = match segments.len() {
            1 => (ctx.root.clone(), ctx.root.table_name.clone()),
            n => {
                let association = segments[n - 2];
                match ctx.catalog.resolve_segment(association) {
                    Some(found) => (found.clone(), found.table_name.clone()),
                    None => (
                        ctx.root.clone(),
                        inflect::tableize(&inflect::singularize(association)),
                    ),
                }
            }
        };

        let defaults = Self::defaults(&owner_type, &attribute, display_name);
        let resolved =
            options::resolve(&defaults, &Self::rules(id, ctx.formatters, false), overrides)?;
        let options = ColumnOptions::from_tree(id, &resolved)?;

        Ok(Self {
            id: id.to_string(),
            attribute,
            owner_type,
            db_table,
            resolved,
            options,
            render_block: None,
            visible: false,
            sort_order: None,
        })
    }

    fn defaults(
        owner_type: &RecordType,
        attribute: &str,
        display_name: Option<&str>,
    ) -> OptionTree {
        let name: OptionValue = match display_name {
            Some(name) => name.into(),
            None => {
                let owner = owner_type.clone();
                let attribute = attribute.to_string();
                options::LazyDefault::new(move |_| {
                    Value::from(owner.human_attribute_name(&attribute))
                })
                .into()
            }
        };
        OptionTree::new()
            .with("name", name)
            .with("format", "plain")
            .with("format_options", OptionTree::new())
            .with("html", OptionTree::new())
            .with("header_html", OptionTree::new())
            .with("hidden", false)
            .with("sortable", true)
            .with("always_visible", false)
    }

    fn rules(id: &str, formatters: &FormatterRegistry, has_block: bool) -> RuleSet {
        let column = id.to_string();
        let registered: Vec<String> = formatters.names().map(str::to_string).collect();
        RuleSet::new()
            .rule("format", move |value, _| {
                if has_block {
                    return Ok(None);
                }
                match value.as_value() {
                    Some(Value::String(tag)) if registered.iter().any(|r| r == tag) => Ok(None),
                    other => Err(ConfigError::UnsupportedFormat {
                        column: column.clone(),
                        format: other.map(ToString::to_string).unwrap_or_default(),
                    }),
                }
            })
            .rule("format_options", |value, _| match value {
                OptionValue::Value(Value::String(style)) => {
                    Ok(Some(OptionTree::new().with("style", style.as_str()).into()))
                }
                OptionValue::Value(Value::Null) => Ok(Some(OptionTree::new().into())),
                OptionValue::Value(_) => Err(ConfigError::invalid_option(
                    "format_options",
                    "expected a style name or a nested option tree",
                )),
                _ => Ok(None),
            })
    }

    /// Merges `overrides` on top of the already-resolved options, so repeated
    /// declarations accumulate rather than reset. On error the column is
    /// left unchanged.
    ///
    /// # Errors
    ///
    /// Any error raised while resolving `overrides`.
    pub fn update_options(
        &mut self,
        formatters: &FormatterRegistry,
        overrides: &Overrides,
    ) -> Result<(), ConfigError> {
        let base = self.resolved.clone();
        self.reresolve(formatters, &base, overrides)
    }

    /// Sets the format tag and replaces `format_options` outright. Options
    /// from an earlier format do not carry over. On error the column is left
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnsupportedFormat`] for an unregistered tag, or
    /// [`ConfigError::InvalidOption`] for malformed options.
    pub fn set_format(
        &mut self,
        formatters: &FormatterRegistry,
        tag: &str,
        format_options: OptionValue,
    ) -> Result<(), ConfigError> {
        let mut base = self.resolved.clone();
        base.insert("format_options", OptionTree::new());
        let overrides = Overrides::new()
            .set("format", tag)
            .set("format_options", format_options);
        self.reresolve(formatters, &base, &overrides)
    }

    fn reresolve(
        &mut self,
        formatters: &FormatterRegistry,
        base: &OptionTree,
        overrides: &Overrides,
    ) -> Result<(), ConfigError> {
        let rules = Self::rules(&self.id, formatters, self.render_block.is_some());
        let resolved = options::resolve(base, &rules, overrides)?;
        let options = ColumnOptions::from_tree(&self.id, &resolved)?;
        self.resolved = resolved;
        self.options = options;
        Ok(())
    }

    pub fn set_render_block(&mut self, block: RenderBlock) {
        self.render_block = Some(block);
    }

    // --- Identity ---

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    #[must_use]
    pub fn owner_type(&self) -> &RecordType {
        &self.owner_type
    }

    #[must_use]
    pub fn db_table(&self) -> &str {
        &self.db_table
    }

    /// Quoted `` `table`.`column` `` reference used in query fragments.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        fragment::qualified(&self.db_table, &self.attribute)
    }

    // --- Options ---

    #[must_use]
    pub fn name(&self) -> &str {
        &self.options.name
    }

    #[must_use]
    pub fn format(&self) -> &str {
        &self.options.format
    }

    #[must_use]
    pub fn format_options(&self) -> &OptionTree {
        &self.options.format_options
    }

    #[must_use]
    pub fn options(&self) -> &ColumnOptions {
        &self.options
    }

    #[must_use]
    pub fn resolved_options(&self) -> &OptionTree {
        &self.resolved
    }

    #[must_use]
    pub fn has_render_block(&self) -> bool {
        self.render_block.is_some()
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.options.hidden
    }

    #[must_use]
    pub fn is_sortable(&self) -> bool {
        self.options.sortable
    }

    #[must_use]
    pub fn is_always_visible(&self) -> bool {
        self.options.always_visible
    }

    // --- Resolution state ---

    /// Whether the last visibility pass showed this column.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The direction this column is currently sorted in, if it is the
    /// active sort column.
    #[must_use]
    pub fn sort_order(&self) -> Option<SortDirection> {
        self.sort_order
    }

    #[must_use]
    pub fn is_sort_column(&self) -> bool {
        self.sort_order.is_some()
    }

    /// The direction a header toggle should switch to next: the opposite of
    /// the current direction, or ascending when unsorted.
    #[must_use]
    pub fn next_sort_direction(&self) -> SortDirection {
        self.sort_order.map_or(SortDirection::Asc, SortDirection::opposite)
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_sort_order(&mut self, order: Option<SortDirection>) {
        self.sort_order = order;
    }

    // --- Rows ---

    /// Raw field value for this column on `row`.
    #[must_use]
    pub fn value(&self, row: &dyn Row) -> Value {
        record::extract(row, &self.id)
    }

    /// Binds this column to a row for rendering.
    #[must_use]
    pub fn bind<'c, 'r>(&'c self, row: &'r dyn Row) -> BoundCell<'c, 'r> {
        BoundCell {
            value: self.value(row),
            column: self,
            row,
        }
    }

    /// Renders this column's cell for `row`.
    #[must_use]
    pub fn render(&self, row: &dyn Row, formatters: &FormatterRegistry) -> String {
        self.bind(row).render(formatters)
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("db_table", &self.db_table)
            .field("options", &self.options)
            .field("render_block", &self.render_block.is_some())
            .field("visible", &self.visible)
            .field("sort_order", &self.sort_order)
            .finish_non_exhaustive()
    }
}

/// A column bound to one row: the extracted raw value plus what is needed
/// to render it.
pub struct BoundCell<'c, 'r> {
    column: &'c Column,
    row: &'r dyn Row,
    value: Value,
}

impl BoundCell<'_, '_> {
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Render block output if the column has one, else the column's formatter.
    #[must_use]
    pub fn render(&self, formatters: &FormatterRegistry) -> String {
        match &self.column.render_block {
            Some(block) => (**block)(self.column, &self.value, self.row),
            None => formatters.format(
                self.column.format(),
                &self.value,
                self.column.format_options(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fixture() -> (RecordType, TypeCatalog, FormatterRegistry) {
        let mut catalog = TypeCatalog::new();
        catalog.register(RecordType::new("Address").with_attribute_name("city", "Town"));
        (
            RecordType::new("User"),
            catalog,
            FormatterRegistry::with_builtins(),
        )
    }

    fn column(id: &str, overrides: &Overrides) -> Result<Column, ConfigError> {
        let (root, catalog, formatters) = fixture();
        let ctx = ColumnContext {
            root: &root,
            catalog: &catalog,
            formatters: &formatters,
        };
        Column::new(&ctx, id, None, overrides)
    }

    #[test]
    fn defaults_resolve() {
        let col = column("first_name", &Overrides::new()).unwrap();
        assert_eq!(col.attribute(), "first_name");
        assert_eq!(col.owner_type().name, "User");
        assert_eq!(col.db_table(), "users");
        assert_eq!(col.qualified_name(), "`users`.`first_name`");
        assert_eq!(col.name(), "First name");
        assert_eq!(col.format(), "plain");
        assert!(col.is_sortable());
        assert!(!col.is_hidden());
        assert!(!col.resolved_options().has_lazy());
    }

    #[test]
    fn nested_id_resolves_owner_type() {
        let col = column("user.address.city", &Overrides::new()).unwrap();
        assert_eq!(col.attribute(), "city");
        assert_eq!(col.owner_type().name, "Address");
        assert_eq!(col.db_table(), "addresses");
        assert_eq!(col.name(), "Town");
    }

    #[test]
    fn unresolved_association_falls_back_to_root_type() {
        let col = column("companies.title", &Overrides::new()).unwrap();
        assert_eq!(col.owner_type().name, "User");
        assert_eq!(col.db_table(), "companies");
        assert_eq!(col.qualified_name(), "`companies`.`title`");
    }

    #[test]
    fn display_name_overrides_lazy_label() {
        let (root, catalog, formatters) = fixture();
        let ctx = ColumnContext {
            root: &root,
            catalog: &catalog,
            formatters: &formatters,
        };
        let col = Column::new(&ctx, "email", Some("Mail"), &Overrides::new()).unwrap();
        assert_eq!(col.name(), "Mail");
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let err = column("email desc", &Overrides::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidColumnId { .. }));
    }

    #[test]
    fn unsupported_format_is_a_configuration_error() {
        let err = column("amount", &Overrides::new().set("format", "money")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedFormat {
                column: "amount".to_string(),
                format: "money".to_string(),
            }
        );
    }

    #[test]
    fn render_block_allows_any_format() {
        let (_, _, formatters) = fixture();
        let mut col = column("amount", &Overrides::new()).unwrap();
        col.set_render_block(Arc::new(|_: &Column, value: &Value, _: &dyn Row| {
            format!("<{value}>")
        }));
        col.update_options(&formatters, &Overrides::new().set("format", "custom"))
            .unwrap();
        assert_eq!(col.format(), "custom");
        assert_eq!(col.render(&json!({"amount": 3}), &formatters), "<3>");
    }

    #[test]
    fn style_string_normalizes_to_tree() {
        let col = column(
            "active",
            &Overrides::new()
                .set("format", "boolean")
                .set("format_options", "inverse"),
        )
        .unwrap();
        assert_eq!(col.format_options().str("style"), Some("inverse"));
    }

    #[test]
    fn update_options_accumulates() {
        let (_, _, formatters) = fixture();
        let mut col = column("amount", &Overrides::new().flag("hidden")).unwrap();
        col.update_options(&formatters, &Overrides::new().set("format", "currency"))
            .unwrap();
        assert!(col.is_hidden());
        assert_eq!(col.format(), "currency");
    }

    #[test]
    fn failed_update_leaves_column_unchanged() {
        let (_, _, formatters) = fixture();
        let mut col = column("amount", &Overrides::new().set("format", "currency")).unwrap();
        let err = col
            .update_options(&formatters, &Overrides::new().set("format", "bogus"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
        assert_eq!(col.format(), "currency");
    }

    #[test]
    fn wrong_option_type_names_the_key() {
        let err = column("amount", &Overrides::new().set("hidden", "yes")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidOption {
                key: "amount.hidden".to_string(),
                message: "expected a boolean".to_string(),
            }
        );
    }

    #[test]
    fn currency_render_formats_value() {
        let (_, _, formatters) = fixture();
        let col = column("amount", &Overrides::new().set("format", "currency")).unwrap();
        let row = json!({"amount": 1234.5});
        assert_eq!(col.bind(&row).value(), &Value::Float(1234.5));
        assert_eq!(col.render(&row, &formatters), "$1,234.50");
    }

    #[test]
    fn next_sort_direction_toggles() {
        let mut col = column("email", &Overrides::new()).unwrap();
        assert_eq!(col.next_sort_direction(), SortDirection::Asc);
        assert!(!col.is_sort_column());

        col.set_sort_order(Some(SortDirection::Asc));
        assert_eq!(col.next_sort_direction(), SortDirection::Desc);

        col.set_sort_order(Some(SortDirection::Desc));
        assert_eq!(col.next_sort_direction(), SortDirection::Asc);
        assert!(col.is_sort_column());
    }

    #[test]
    fn sort_direction_parse_is_lenient() {
        assert_eq!(SortDirection::parse("DESC"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("Desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("asc"), SortDirection::Asc);
        assert_eq!(SortDirection::parse("sideways"), SortDirection::Asc);
        assert_eq!(SortDirection::parse(""), SortDirection::Asc);
    }
}
