//! Ordered, id-keyed column collection owned by a table.

use indexmap::IndexMap;

use crate::column::{Column, ColumnContext, RenderBlock};
use crate::error::ConfigError;
use crate::format::FormatterRegistry;
use crate::options::{OptionValue, Overrides};

/// One `id[:Display Name]` token from a declaration list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnToken<'a> {
    pub id: &'a str,
    pub display_name: Option<&'a str>,
}

/// Splits `"first_name, last_name:Surname, email"` into tokens. Whitespace
/// around ids and names is ignored; empty tokens are skipped.
#[must_use]
pub fn parse_column_tokens(declaration: &str) -> Vec<ColumnToken<'_>> {
    declaration
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once(':') {
            Some((id, name)) => ColumnToken {
                id: id.trim(),
                display_name: Some(name.trim()).filter(|n| !n.is_empty()),
            },
            None => ColumnToken {
                id: token,
                display_name: None,
            },
        })
        .collect()
}

/// Declared columns in display order.
///
/// Re-declaring an id merges the new options into the existing column; it
/// never creates a second entry.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: IndexMap<String, Column>,
}

impl ColumnRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares every column named in `declaration`, applying `overrides` on top.
    ///
    /// All tokens are resolved before any change is committed, so a failing
    /// token leaves the registry untouched. Returns the declared ids in
    /// token order.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] raised while creating or updating a column.
    pub fn declare(
        &mut self,
        ctx: &ColumnContext<'_>,
        declaration: &str,
        overrides: &Overrides,
    ) -> Result<Vec<String>, ConfigError> {
        let mut staged: IndexMap<String, Column> = IndexMap::new();
        for token in parse_column_tokens(declaration) {
            // An explicit `name` override beats the token's display name,
            // for new and existing columns alike.
            let layer = match token.display_name {
                Some(name) => Overrides::new().set("name", name).merged_with(overrides),
                None => overrides.clone(),
            };
            let column = match staged
                .swap_remove(token.id)
                .or_else(|| self.columns.get(token.id).cloned())
            {
                Some(mut existing) => {
                    existing.update_options(ctx.formatters, &layer)?;
                    existing
                }
                None => Column::new(ctx, token.id, token.display_name, overrides)?,
            };
            staged.insert(token.id.to_string(), column);
        }

        let ids: Vec<String> = staged.keys().cloned().collect();
        for (id, column) in staged {
            // `insert` keeps the original position of an existing id.
            self.columns.insert(id, column);
        }
        Ok(ids)
    }

    /// Looks up a column. Fails only when `required` and the id is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ColumnNotDeclared`] if `required` and not found.
    pub fn get(&self, id: &str, required: bool) -> Result<Option<&Column>, ConfigError> {
        match self.columns.get(id) {
            Some(column) => Ok(Some(column)),
            None if required => Err(ConfigError::ColumnNotDeclared { id: id.to_string() }),
            None => Ok(None),
        }
    }

    /// Looks up a column that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ColumnNotDeclared`] if not found.
    pub fn require(&self, id: &str) -> Result<&Column, ConfigError> {
        self.columns
            .get(id)
            .ok_or_else(|| ConfigError::ColumnNotDeclared { id: id.to_string() })
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Column> {
        self.columns.get(id)
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut Column> {
        self.columns.get_mut(id)
    }

    /// Applies a format tag and options to every column in `ids`. The new
    /// options replace any earlier ones.
    ///
    /// Every id is checked, and every column re-resolved, before any column
    /// changes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ColumnNotDeclared`] for an unknown id, or any error from
    /// re-resolving a column (e.g. [`ConfigError::UnsupportedFormat`]).
    pub fn assign_format(
        &mut self,
        formatters: &FormatterRegistry,
        ids: &str,
        tag: &str,
        format_options: impl Into<OptionValue>,
    ) -> Result<(), ConfigError> {
        let format_options = format_options.into();

        let mut staged = Vec::new();
        for token in parse_column_tokens(ids) {
            let mut column = self.require(token.id)?.clone();
            column.set_format(formatters, tag, format_options.clone())?;
            staged.push(column);
        }
        for column in staged {
            self.columns.insert(column.id().to_string(), column);
        }
        Ok(())
    }

    /// Installs a custom renderer on a declared column.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ColumnNotDeclared`] if `id` is unknown.
    pub fn set_render_block(&mut self, id: &str, block: RenderBlock) -> Result<(), ConfigError> {
        let column = self
            .columns
            .get_mut(id)
            .ok_or_else(|| ConfigError::ColumnNotDeclared { id: id.to_string() })?;
        column.set_render_block(block);
        Ok(())
    }

    /// Clears per-pass visibility and sort state on every column.
    pub(crate) fn reset_state(&mut self) {
        for column in self.columns.values_mut() {
            column.set_visible(false);
            column.set_sort_order(None);
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.columns.contains_key(id)
    }

    #[must_use]
    pub fn first(&self) -> Option<&Column> {
        self.columns.first().map(|(_, column)| column)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::options::OptionTree;
    use crate::record::{RecordType, Row, TypeCatalog};
    use crate::value::Value;

    struct Fixture {
        root: RecordType,
        catalog: TypeCatalog,
        formatters: FormatterRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: RecordType::new("User"),
                catalog: TypeCatalog::new(),
                formatters: FormatterRegistry::with_builtins(),
            }
        }

        fn ctx(&self) -> ColumnContext<'_> {
            ColumnContext {
                root: &self.root,
                catalog: &self.catalog,
                formatters: &self.formatters,
            }
        }
    }

    #[test]
    fn parses_tokens_with_display_names() {
        let tokens = parse_column_tokens("first_name,  user.address.city:City , ,email:");
        assert_eq!(
            tokens,
            vec![
                ColumnToken { id: "first_name", display_name: None },
                ColumnToken { id: "user.address.city", display_name: Some("City") },
                ColumnToken { id: "email", display_name: None },
            ]
        );
    }

    #[test]
    fn declare_preserves_order() {
        let fx = Fixture::new();
        let mut registry = ColumnRegistry::new();
        let ids = registry
            .declare(&fx.ctx(), "first_name, last_name, email", &Overrides::new())
            .unwrap();
        assert_eq!(ids, vec!["first_name", "last_name", "email"]);
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["first_name", "last_name", "email"]
        );
    }

    #[test]
    fn redeclaration_merges_without_duplicating() {
        let fx = Fixture::new();
        let mut registry = ColumnRegistry::new();
        registry
            .declare(&fx.ctx(), "first_name, amount", &Overrides::new().flag("hidden"))
            .unwrap();
        registry
            .declare(&fx.ctx(), "amount", &Overrides::new().set("format", "currency"))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["first_name", "amount"]);
        let amount = registry.find("amount").unwrap();
        assert!(amount.is_hidden());
        assert_eq!(amount.format(), "currency");
    }

    #[test]
    fn duplicate_ids_in_one_spec_collapse() {
        let fx = Fixture::new();
        let mut registry = ColumnRegistry::new();
        registry
            .declare(&fx.ctx(), "email, email:Mail", &Overrides::new())
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("email").unwrap().name(), "Mail");
    }

    #[test]
    fn failed_declaration_commits_nothing() {
        let fx = Fixture::new();
        let mut registry = ColumnRegistry::new();
        let err = registry
            .declare(&fx.ctx(), "first_name, bad id", &Overrides::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidColumnId { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn get_raises_only_when_required() {
        let fx = Fixture::new();
        let mut registry = ColumnRegistry::new();
        registry.declare(&fx.ctx(), "email", &Overrides::new()).unwrap();

        assert!(registry.get("email", true).unwrap().is_some());
        assert!(registry.get("ssn", false).unwrap().is_none());
        assert_eq!(
            registry.get("ssn", true).unwrap_err(),
            ConfigError::ColumnNotDeclared { id: "ssn".to_string() }
        );
    }

    #[test]
    fn assign_format_is_all_or_nothing() {
        let fx = Fixture::new();
        let mut registry = ColumnRegistry::new();
        registry
            .declare(&fx.ctx(), "amount, balance", &Overrides::new())
            .unwrap();

        let err = registry
            .assign_format(&fx.formatters, "amount, missing", "currency", OptionTree::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::ColumnNotDeclared { .. }));
        assert_eq!(registry.find("amount").unwrap().format(), "plain");

        registry
            .assign_format(&fx.formatters, "amount, balance", "currency", OptionTree::new())
            .unwrap();
        assert_eq!(registry.find("amount").unwrap().format(), "currency");
        assert_eq!(registry.find("balance").unwrap().format(), "currency");
    }

    #[test]
    fn assign_format_accepts_style_shorthand() {
        let fx = Fixture::new();
        let mut registry = ColumnRegistry::new();
        registry.declare(&fx.ctx(), "active", &Overrides::new()).unwrap();
        registry
            .assign_format(&fx.formatters, "active", "boolean", "reverse")
            .unwrap();
        let active = registry.find("active").unwrap();
        assert_eq!(active.format_options().str("style"), Some("reverse"));
    }

    #[test]
    fn reformatting_replaces_previous_options() {
        let fx = Fixture::new();
        let mut registry = ColumnRegistry::new();
        registry.declare(&fx.ctx(), "active, amount", &Overrides::new()).unwrap();

        registry
            .assign_format(&fx.formatters, "active", "boolean", "inverse")
            .unwrap();
        registry
            .assign_format(&fx.formatters, "active", "boolean", OptionTree::new())
            .unwrap();
        let active = registry.find("active").unwrap();
        assert!(active.format_options().is_empty());
        let row = serde_json::json!({ "active": true, "amount": 5 });
        assert_eq!(active.render(&row, &fx.formatters), "Yes");

        registry
            .assign_format(
                &fx.formatters,
                "amount",
                "currency",
                OptionTree::new().with("unit", "€"),
            )
            .unwrap();
        registry
            .assign_format(&fx.formatters, "amount", "currency", OptionTree::new())
            .unwrap();
        let amount = registry.find("amount").unwrap();
        assert_eq!(amount.format_options().str("unit"), None);
        assert_eq!(amount.render(&row, &fx.formatters), "$5.00");
    }

    #[test]
    fn name_override_beats_token_name_on_both_paths() {
        let fx = Fixture::new();
        let overrides = Overrides::new().set("name", "Opt");

        let mut fresh = ColumnRegistry::new();
        fresh.declare(&fx.ctx(), "email:Mail", &overrides).unwrap();
        assert_eq!(fresh.find("email").unwrap().name(), "Opt");

        let mut existing = ColumnRegistry::new();
        existing.declare(&fx.ctx(), "email", &Overrides::new()).unwrap();
        existing.declare(&fx.ctx(), "email:Mail", &overrides).unwrap();
        assert_eq!(existing.find("email").unwrap().name(), "Opt");

        existing.declare(&fx.ctx(), "email:Address", &Overrides::new()).unwrap();
        assert_eq!(existing.find("email").unwrap().name(), "Address");
    }

    #[test]
    fn render_block_requires_declared_column() {
        let fx = Fixture::new();
        let mut registry = ColumnRegistry::new();
        registry.declare(&fx.ctx(), "age", &Overrides::new()).unwrap();

        let block: RenderBlock = Arc::new(|_: &Column, value: &Value, _: &dyn Row| {
            if value.as_f64().unwrap_or_default() > 20.0 {
                "Old".to_string()
            } else {
                "Young".to_string()
            }
        });
        registry.set_render_block("age", block.clone()).unwrap();
        assert!(registry.find("age").unwrap().has_render_block());
        assert!(registry.set_render_block("height", block).is_err());
    }
}
