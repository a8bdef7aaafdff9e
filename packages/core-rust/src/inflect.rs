//! Minimal English inflections for deriving type, table and label names
//! from column path segments.

/// `"line_items"` -> `"line_item"`, `"addresses"` -> `"address"`,
/// `"categories"` -> `"category"`.
#[must_use]
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// `"user"` -> `"users"`, `"address"` -> `"addresses"`, `"category"` -> `"categories"`.
#[must_use]
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if let Some(stem) = word.strip_suffix('y') {
        let vowel_before = stem.chars().last().is_some_and(|c| "aeiou".contains(c));
        if !vowel_before {
            return format!("{stem}ies");
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }
    format!("{word}s")
}

/// `"line_item"` -> `"LineItem"`.
#[must_use]
pub fn camelize(word: &str) -> String {
    word.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}

/// `"LineItem"` -> `"line_item"`.
#[must_use]
pub fn underscore(word: &str) -> String {
    let mut out = String::with_capacity(word.len() + 4);
    let mut prev_lower = false;
    for ch in word.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Table name for a type or association segment: `"LineItem"` / `"line_item"` -> `"line_items"`.
#[must_use]
pub fn tableize(word: &str) -> String {
    pluralize(&underscore(word))
}

/// `"first_name"` -> `"First name"`, `"user_id"` -> `"User"`.
#[must_use]
pub fn humanize(word: &str) -> String {
    let base = word.strip_suffix("_id").filter(|s| !s.is_empty()).unwrap_or(word);
    let spaced = underscore(base).replace('_', " ");
    let trimmed = spaced.trim();
    let mut chars = trimmed.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singularize_common_forms() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("user"), "user");
        assert_eq!(singularize("status"), "status");
    }

    #[test]
    fn pluralize_common_forms() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("match"), "matches");
    }

    #[test]
    fn camelize_and_underscore_are_inverse() {
        assert_eq!(camelize("line_item"), "LineItem");
        assert_eq!(underscore("LineItem"), "line_item");
        assert_eq!(underscore("User"), "user");
        assert_eq!(camelize(&singularize("addresses")), "Address");
    }

    #[test]
    fn tableize_pluralizes_snake_case() {
        assert_eq!(tableize("LineItem"), "line_items");
        assert_eq!(tableize("address"), "addresses");
    }

    #[test]
    fn humanize_labels() {
        assert_eq!(humanize("first_name"), "First name");
        assert_eq!(humanize("user_id"), "User");
        assert_eq!(humanize("email"), "Email");
        assert_eq!(humanize(""), "");
    }
}
