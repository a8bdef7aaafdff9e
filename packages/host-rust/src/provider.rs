//! [`RecordProvider`] over an in-memory list of JSON objects.

use std::cmp::Ordering;
use std::sync::OnceLock;

use anyhow::Context;
use autogrid_core::{RecordProvider, RecordType, Row, SortDirection};
use regex::Regex;
use serde_json::Value as JsonValue;

fn order_clause_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^`((?:[^`]|``)+)`\.`((?:[^`]|``)+)`\s+(ASC|DESC)$").expect("static regex")
    })
}

/// Rows held as JSON objects.
///
/// Applied SELECT and ORDER BY fragments are recorded. Order clauses on the
/// root table are also applied to the rows in memory; any other clause is
/// recorded only.
#[derive(Debug, Clone)]
pub struct JsonRecordProvider {
    record_type: RecordType,
    rows: Vec<JsonValue>,
    select: Option<String>,
    orders: Vec<String>,
    sort_keys: Vec<(String, SortDirection)>,
}

impl JsonRecordProvider {
    #[must_use]
    pub fn new(record_type: RecordType, rows: Vec<JsonValue>) -> Self {
        Self {
            record_type,
            rows,
            select: None,
            orders: Vec::new(),
            sort_keys: Vec::new(),
        }
    }

    /// Parses a JSON array of objects.
    ///
    /// # Errors
    ///
    /// Fails if `source` is not a JSON array, or an element is not an object.
    pub fn from_json_str(record_type: RecordType, source: &str) -> anyhow::Result<Self> {
        let parsed: JsonValue = serde_json::from_str(source).context("rows are not valid JSON")?;
        let JsonValue::Array(rows) = parsed else {
            anyhow::bail!("expected a JSON array of row objects");
        };
        if let Some(index) = rows.iter().position(|row| !row.is_object()) {
            anyhow::bail!("row {index} is not a JSON object");
        }
        Ok(Self::new(record_type, rows))
    }

    /// The last applied SELECT list.
    #[must_use]
    pub fn applied_select(&self) -> Option<&str> {
        self.select.as_deref()
    }

    /// Applied ORDER BY fragments, in order.
    #[must_use]
    pub fn applied_orders(&self) -> &[String] {
        &self.orders
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn apply_clause(&mut self, clause: &str) {
        let Some(caps) = order_clause_pattern().captures(clause.trim()) else {
            tracing::debug!(clause, "order clause recorded but not applied in memory");
            return;
        };
        let table = caps[1].replace("``", "`");
        let field = caps[2].replace("``", "`");
        if table != self.record_type.table_name {
            tracing::debug!(clause, "order clause on an associated table is not applied in memory");
            return;
        }
        self.sort_keys.push((field, SortDirection::parse(&caps[3])));
        let keys = &self.sort_keys;
        self.rows.sort_by(|a, b| {
            keys.iter()
                .map(|(field, direction)| {
                    let ordering = compare_json(a.get(field), b.get(field));
                    match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
    }
}

/// Nulls and missing fields first, then booleans, numbers, strings; other
/// values compare by their JSON text.
fn compare_json(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    fn rank(value: Option<&JsonValue>) -> u8 {
        match value {
            None | Some(JsonValue::Null) => 0,
            Some(JsonValue::Bool(_)) => 1,
            Some(JsonValue::Number(_)) => 2,
            Some(JsonValue::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.total_cmp(&y)
        }
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        (Some(x), Some(y)) if rank(a) == 4 && rank(b) == 4 => x.to_string().cmp(&y.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl RecordProvider for JsonRecordProvider {
    fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    fn select(&mut self, fields: &str) -> anyhow::Result<()> {
        self.select = Some(fields.to_string());
        Ok(())
    }

    fn order(&mut self, fragment: &str) -> anyhow::Result<()> {
        self.orders.push(fragment.to_string());
        self.apply_clause(fragment);
        Ok(())
    }

    fn rows(&self) -> Box<dyn Iterator<Item = &dyn Row> + '_> {
        Box::new(self.rows.iter().map(|row| row as &dyn Row))
    }
}

#[cfg(test)]
mod tests {
    use autogrid_core::record::extract;
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn provider() -> JsonRecordProvider {
        JsonRecordProvider::new(
            RecordType::new("User"),
            vec![
                json!({"name": "Carol", "age": 41}),
                json!({"name": "alice", "age": 30}),
                json!({"name": "Bob"}),
                json!({"name": "Dave", "age": 30}),
            ],
        )
    }

    fn names(provider: &JsonRecordProvider) -> Vec<String> {
        provider
            .rows()
            .map(|row| extract(row, "name").to_string())
            .collect()
    }

    #[test]
    fn parses_array_of_objects() {
        let provider =
            JsonRecordProvider::from_json_str(RecordType::new("User"), r#"[{"a": 1}, {"a": 2}]"#)
                .unwrap();
        assert_eq!(provider.len(), 2);
        assert!(JsonRecordProvider::from_json_str(RecordType::new("User"), "{}").is_err());
        assert!(JsonRecordProvider::from_json_str(RecordType::new("User"), "[1]").is_err());
    }

    #[test]
    fn applies_root_order_clauses() {
        let mut provider = provider();
        provider.order("`users`.`age` DESC").unwrap();
        assert_eq!(names(&provider), vec!["Carol", "alice", "Dave", "Bob"]);
        provider.order("`users`.`name` ASC").unwrap();
        assert_eq!(names(&provider), vec!["Carol", "Dave", "alice", "Bob"]);
        assert_eq!(provider.applied_orders().len(), 2);
    }

    #[test]
    fn records_untranslatable_clauses() {
        let mut provider = provider();
        provider.order("`addresses`.`city` ASC").unwrap();
        provider.order("RANDOM()").unwrap();
        provider.select("`users`.`id`").unwrap();
        assert_eq!(names(&provider), vec!["Carol", "alice", "Bob", "Dave"]);
        assert_eq!(provider.applied_orders(), ["`addresses`.`city` ASC", "RANDOM()"]);
        assert_eq!(provider.applied_select(), Some("`users`.`id`"));
    }

    #[test]
    fn nulls_sort_first() {
        assert_eq!(compare_json(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_json(Some(&json!("a")), Some(&json!(1))), Ordering::Greater);
        assert_eq!(compare_json(Some(&json!(2.5)), Some(&json!(10))), Ordering::Less);
    }

    proptest! {
        #[test]
        fn ascending_order_is_non_decreasing(
            ages in proptest::collection::vec(proptest::option::of(0i64..100), 0..20)
        ) {
            let rows = ages
                .iter()
                .map(|age| match age {
                    Some(age) => json!({"age": age}),
                    None => json!({}),
                })
                .collect();
            let mut provider = JsonRecordProvider::new(RecordType::new("User"), rows);
            provider.order("`users`.`age` ASC").unwrap();

            let sorted: Vec<Option<i64>> = provider
                .rows()
                .map(|row| extract(row, "age").as_f64().map(|age| age as i64))
                .collect();
            for pair in sorted.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            prop_assert_eq!(sorted.len(), ages.len());
        }
    }
}
