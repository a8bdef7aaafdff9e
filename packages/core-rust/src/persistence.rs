//! Persisted user preferences (visible columns, sort choice).
//!
//! The transport (cookies, session, database) lives outside the core. A table
//! only needs string get/set against keys of the form
//! `"<namespace>_<tableId>_<prefName>"`.

use std::fmt;

/// Key-value store for per-user table preferences.
///
/// Takes `&self` so a single store can be shared behind `Arc` by every table
/// rendered in the same request; implementations use interior mutability.
pub trait PreferenceStore: Send + Sync {
    /// Returns the stored value for `key`, or `None` if absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);
}

/// The two preferences a table persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    /// Ordered visible column ids, `", "`-separated.
    Columns,
    /// Active sort, `"<id> <asc|desc>"`.
    Sort,
}

impl Preference {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Preference::Columns => "columns",
            Preference::Sort => "sort",
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the store key for one table preference.
#[must_use]
pub fn preference_key(namespace: &str, table_id: &str, preference: Preference) -> String {
    format!("{namespace}_{table_id}_{preference}")
}

/// Reads a preference, treating blank values as absent.
pub(crate) fn read_preference(store: &dyn PreferenceStore, key: &str) -> Option<String> {
    store.get(key).filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_table() {
        assert_eq!(
            preference_key("autogrid", "users_index_User", Preference::Columns),
            "autogrid_users_index_User_columns"
        );
        assert_eq!(
            preference_key("flexi", "t1", Preference::Sort),
            "flexi_t1_sort"
        );
    }
}
