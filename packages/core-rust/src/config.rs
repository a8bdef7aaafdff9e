//! Table-level configuration.

use crate::error::ConfigError;
use crate::inflect;
use crate::options::{OptionTree, OptionValue, RuleSet};
use crate::record::RecordType;
use crate::value::Value;

/// Default persistence key prefix.
pub const DEFAULT_NAMESPACE: &str = "autogrid";

/// Where a clicked row leads, read from the `url` option.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RowLink {
    /// The row's own record (`url` unset or `true`).
    #[default]
    Record,
    /// Fixed link parameters, merged with the row's primary key.
    Params(OptionTree),
    /// Rows are not clickable (`url` = `false`).
    Disabled,
}

impl RowLink {
    fn from_option(value: Option<&OptionValue>) -> Result<Self, ConfigError> {
        match value {
            None | Some(OptionValue::Value(Value::Null | Value::Bool(true))) => Ok(Self::Record),
            Some(OptionValue::Value(Value::Bool(false))) => Ok(Self::Disabled),
            Some(OptionValue::Tree(params)) => Ok(Self::Params(params.clone())),
            Some(_) => Err(ConfigError::invalid_option(
                "url",
                "expected a boolean or a nested option tree",
            )),
        }
    }
}

/// Typed view of a table's resolved option tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    /// Table identifier, part of every persistence key.
    pub id: String,
    /// Caption shown above the grid.
    pub title: String,
    /// Persistence key prefix.
    pub namespace: String,
    /// Rewrite the persisted column list from declarations on every pass.
    pub reload: bool,
    pub paginate: bool,
    /// Emit a SELECT fragment restricted to the primary key and declared columns.
    pub auto_select: bool,
    /// Whether users may show/hide columns.
    pub editable_columns: bool,
    /// `"<id> <asc|desc>"` used when nothing is persisted.
    pub default_sort: Option<String>,
    /// Trusted ORDER BY text placed before the resolved sort.
    pub sort_before: Option<String>,
    /// Trusted ORDER BY text placed after the resolved sort.
    pub sort_after: Option<String>,
    /// HTML attributes for the table element.
    pub html: OptionTree,
    pub url: RowLink,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            reload: false,
            paginate: false,
            auto_select: false,
            editable_columns: true,
            default_sort: None,
            sort_before: None,
            sort_after: None,
            html: OptionTree::new(),
            url: RowLink::Record,
        }
    }
}

impl TableConfig {
    /// Default option tree for a table over `root`.
    #[must_use]
    pub fn defaults_for(root: &RecordType) -> OptionTree {
        let type_name = root.name.clone();
        let title_source = root.name.clone();
        let paginated = root.paginated;
        OptionTree::new()
            .with_lazy("id", move |_| Value::from(inflect::underscore(&type_name)))
            .with_lazy("title", move |_| {
                Value::from(inflect::humanize(&inflect::pluralize(&inflect::underscore(
                    &title_source,
                ))))
            })
            .with("namespace", DEFAULT_NAMESPACE)
            .with("reload", false)
            .with_lazy("paginate", move |_| Value::from(paginated))
            .with("auto_select", false)
            .with("editable_columns", true)
            .with("default_sort", Value::Null)
            .with("sort_before", Value::Null)
            .with("sort_after", Value::Null)
            .with("html", OptionTree::new())
            .with("url", true)
    }

    /// Normalization rules for a table over `root`.
    #[must_use]
    pub fn rules_for(root: &RecordType) -> RuleSet {
        let paginated = root.paginated;
        let type_name = root.name.clone();
        RuleSet::new()
            .rule("id", |value, _| sanitize_key_part("id", value))
            .rule("namespace", |value, _| sanitize_key_part("namespace", value))
            .rule("paginate", move |value, _| {
                let wants = value.as_value().is_some_and(Value::is_truthy);
                if wants && !paginated {
                    return Err(ConfigError::MissingDependency {
                        key: "paginate".to_string(),
                        dependency: format!(
                            "a record type that supports paging (`{type_name}` does not)"
                        ),
                    });
                }
                Ok(None)
            })
    }

    /// Reads the typed config out of a resolved tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] when a known key has the wrong type.
    pub fn from_tree(tree: &OptionTree) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            id: tree.string_option("id")?.unwrap_or_default(),
            title: tree.string_option("title")?.unwrap_or_default(),
            namespace: tree
                .string_option("namespace")?
                .unwrap_or(defaults.namespace),
            reload: tree.bool_option("reload")?.unwrap_or(defaults.reload),
            paginate: tree.bool_option("paginate")?.unwrap_or(defaults.paginate),
            auto_select: tree.bool_option("auto_select")?.unwrap_or(defaults.auto_select),
            editable_columns: tree
                .bool_option("editable_columns")?
                .unwrap_or(defaults.editable_columns),
            default_sort: tree.string_option("default_sort")?,
            sort_before: tree.string_option("sort_before")?,
            sort_after: tree.string_option("sort_after")?,
            html: tree.tree_option("html")?,
            url: RowLink::from_option(tree.get("url"))?,
        })
    }
}

/// Replaces anything outside `[A-Za-z0-9_]` with `_` so the value is safe to
/// embed in a persistence key.
fn sanitize_key_part(key: &str, value: &OptionValue) -> Result<Option<OptionValue>, ConfigError> {
    let Some(raw) = value.as_value().and_then(Value::as_str) else {
        return Err(ConfigError::invalid_option(key, "expected a string"));
    };
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        return Err(ConfigError::invalid_option(key, "must not be empty"));
    }
    if cleaned == raw {
        Ok(None)
    } else {
        Ok(Some(OptionValue::from(cleaned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{self, Overrides};

    fn resolve(root: &RecordType, overrides: &Overrides) -> Result<TableConfig, ConfigError> {
        let tree = options::resolve(
            &TableConfig::defaults_for(root),
            &TableConfig::rules_for(root),
            overrides,
        )?;
        TableConfig::from_tree(&tree)
    }

    #[test]
    fn defaults_derive_from_root_type() {
        let config = resolve(&RecordType::new("LineItem"), &Overrides::new()).unwrap();
        assert_eq!(config.id, "line_item");
        assert_eq!(config.title, "Line items");
        assert_eq!(config.namespace, "autogrid");
        assert!(!config.reload);
        assert!(!config.paginate);
        assert!(!config.auto_select);
        assert!(config.editable_columns);
        assert_eq!(config.default_sort, None);
        assert!(config.html.is_empty());
    }

    #[test]
    fn paginate_follows_root_type() {
        let root = RecordType::new("User").with_pagination(true);
        assert!(resolve(&root, &Overrides::new()).unwrap().paginate);
    }

    #[test]
    fn paginate_requires_paging_support() {
        let err =
            resolve(&RecordType::new("User"), &Overrides::new().flag("paginate")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDependency { ref key, .. } if key == "paginate"));
    }

    #[test]
    fn id_is_sanitized() {
        let config = resolve(
            &RecordType::new("User"),
            &Overrides::new().set("id", "admin/users list"),
        )
        .unwrap();
        assert_eq!(config.id, "admin_users_list");
    }

    #[test]
    fn blank_id_is_rejected() {
        let err = resolve(&RecordType::new("User"), &Overrides::new().set("id", "  ")).unwrap_err();
        assert_eq!(err, ConfigError::invalid_option("id", "must not be empty"));
    }

    #[test]
    fn wrong_types_are_reported() {
        let err = resolve(&RecordType::new("User"), &Overrides::new().set("reload", "yes"))
            .unwrap_err();
        assert_eq!(err, ConfigError::invalid_option("reload", "expected a boolean"));
    }

    #[test]
    fn sort_options_are_read() {
        let config = resolve(
            &RecordType::new("User"),
            &Overrides::new()
                .set("default_sort", "email desc")
                .set("sort_after", "`users`.`id` ASC")
                .flag("auto_select"),
        )
        .unwrap();
        assert_eq!(config.default_sort.as_deref(), Some("email desc"));
        assert_eq!(config.sort_before, None);
        assert_eq!(config.sort_after.as_deref(), Some("`users`.`id` ASC"));
        assert!(config.auto_select);
    }

    #[test]
    fn url_defaults_to_the_row_record() {
        let config = resolve(&RecordType::new("User"), &Overrides::new()).unwrap();
        assert_eq!(config.url, RowLink::Record);
    }

    #[test]
    fn url_accepts_params_or_false() {
        let root = RecordType::new("User");
        let params = OptionTree::new().with("action", "edit");
        let config = resolve(&root, &Overrides::new().set("url", params.clone())).unwrap();
        assert_eq!(config.url, RowLink::Params(params));

        let config = resolve(&root, &Overrides::new().set("url", false)).unwrap();
        assert_eq!(config.url, RowLink::Disabled);

        let err = resolve(&root, &Overrides::new().set("url", 3)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { ref key, .. } if key == "url"));
    }
}
