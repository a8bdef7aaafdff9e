//! Parsing for the `autogrid` command-line arguments that carry grid settings.

use anyhow::{bail, Result};
use autogrid_core::{OptionTree, OptionValue};

/// One `--format` assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatAssignment<'a> {
    pub ids: &'a str,
    pub tag: &'a str,
    pub options: OptionValue,
}

/// Parses `"amount, balance=currency"` or `"active=boolean:inverse"`.
///
/// # Errors
///
/// Fails when the `=` is missing or the ids or tag are empty.
pub fn parse_format(assignment: &str) -> Result<FormatAssignment<'_>> {
    let Some((ids, format)) = assignment.split_once('=') else {
        bail!("invalid --format '{assignment}' (expected <ids>=<tag>[:<style>])");
    };
    let (tag, options) = match format.split_once(':') {
        Some((tag, style)) => (tag.trim(), OptionValue::from(style.trim())),
        None => (format.trim(), OptionValue::from(OptionTree::new())),
    };
    let ids = ids.trim();
    if ids.is_empty() || tag.is_empty() {
        bail!("invalid --format '{assignment}' (ids and tag must not be empty)");
    }
    Ok(FormatAssignment { ids, tag, options })
}

/// Parses `"email"` or `"email:desc"` into a column id and whether the sort
/// is ascending. Any direction other than `desc` sorts ascending.
///
/// # Errors
///
/// Fails when the column id is empty.
pub fn parse_sort(arg: &str) -> Result<(&str, bool)> {
    let (id, direction) = arg.split_once(':').unwrap_or((arg, "asc"));
    let id = id.trim();
    if id.is_empty() {
        bail!("invalid --sort '{arg}' (expected <id>[:desc])");
    }
    Ok((id, !direction.trim().eq_ignore_ascii_case("desc")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_with_style_shorthand() {
        let parsed = parse_format("active=boolean:inverse").unwrap();
        assert_eq!(parsed.ids, "active");
        assert_eq!(parsed.tag, "boolean");
        assert_eq!(parsed.options, OptionValue::from("inverse"));
    }

    #[test]
    fn format_without_style_uses_empty_options() {
        let parsed = parse_format(" amount, balance = currency ").unwrap();
        assert_eq!(parsed.ids, "amount, balance");
        assert_eq!(parsed.tag, "currency");
        assert_eq!(parsed.options, OptionValue::from(OptionTree::new()));
    }

    #[test]
    fn malformed_formats_are_rejected() {
        assert!(parse_format("amount").is_err());
        assert!(parse_format("=currency").is_err());
        assert!(parse_format("amount=").is_err());
    }

    #[test]
    fn sort_direction_defaults_to_ascending() {
        assert_eq!(parse_sort("email").unwrap(), ("email", true));
        assert_eq!(parse_sort("email:DESC").unwrap(), ("email", false));
        assert_eq!(parse_sort("email:sideways").unwrap(), ("email", true));
        assert!(parse_sort(":desc").is_err());
    }
}
