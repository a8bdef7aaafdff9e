//! SQL-like fragment building from validated identifiers.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ConfigError;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

/// Checks that every `.`-separated segment of a column id is a plain identifier.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidColumnId`] for empty ids, empty segments, or
/// segments containing anything outside `[A-Za-z0-9_]`.
pub fn validate_column_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::InvalidColumnId {
            id: id.to_string(),
            reason: "column id is empty",
        });
    }
    for segment in id.split('.') {
        if !identifier_pattern().is_match(segment) {
            return Err(ConfigError::InvalidColumnId {
                id: id.to_string(),
                reason: "segments must match [A-Za-z_][A-Za-z0-9_]*",
            });
        }
    }
    Ok(())
}

/// Backtick-quotes an identifier, doubling embedded backticks.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// `` `table`.`column` ``
#[must_use]
pub fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(table), quote_ident(column))
}
