//! Record-side collaborators: rows, record types, and the record provider.
//!
//! The core never executes queries. It hands validated SELECT/ORDER
//! fragments to a [`RecordProvider`] and reads field values back out of the
//! [`Row`]s it yields.

use indexmap::IndexMap;

use crate::inflect;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// A field read from a [`Row`]: either a plain value or a nested record
/// (an association) that path extraction can continue walking into.
pub enum Field<'a> {
    Value(Value),
    Record(&'a dyn Row),
}

/// An in-process row object. Rows are trusted; field names passed here come
/// from declared column ids, never from persisted preferences.
pub trait Row {
    /// Reads one field by name, or `None` if the row has no such field.
    fn field(&self, name: &str) -> Option<Field<'_>>;
}

impl Row for serde_json::Value {
    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = self.as_object()?.get(name)?;
        Some(match value {
            serde_json::Value::Object(_) => Field::Record(value),
            other => Field::Value(Value::from(other)),
        })
    }
}

impl Row for IndexMap<String, Value> {
    fn field(&self, name: &str) -> Option<Field<'_>> {
        self.get(name).cloned().map(Field::Value)
    }
}

/// Walks a dotted path (`"user.address.city"`) through `row`.
///
/// Intermediate segments may yield nested records or [`Value::Map`]s. A
/// missing segment, or a scalar where more segments remain, yields `Null`.
#[must_use]
pub fn extract(row: &dyn Row, path: &str) -> Value {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return Value::Null;
    };
    let mut current = match row.field(first) {
        Some(field) => field,
        None => return Value::Null,
    };
    for segment in segments {
        current = match current {
            Field::Record(nested) => match nested.field(segment) {
                Some(field) => field,
                None => return Value::Null,
            },
            Field::Value(Value::Map(mut map)) => match map.remove(segment) {
                Some(value) => Field::Value(value),
                None => return Value::Null,
            },
            Field::Value(_) => return Value::Null,
        };
    }
    match current {
        Field::Value(value) => value,
        Field::Record(_) => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// Introspection data for a record type: display name, backing table,
/// primary key, and per-attribute labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    /// Type name, e.g. `"User"`.
    pub name: String,
    /// Backing table name, e.g. `"users"`.
    pub table_name: String,
    /// Primary key column, used by auto-select.
    pub primary_key: String,
    /// Whether the backing collection supports paging.
    pub paginated: bool,
    /// Explicit attribute labels; anything missing is humanized.
    pub attribute_names: IndexMap<String, String>,
}

impl RecordType {
    /// A record type with conventional defaults: table name tableized from
    /// `name`, primary key `id`, no paging support.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table_name: inflect::tableize(&name),
            name,
            primary_key: "id".to_string(),
            paginated: false,
            attribute_names: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    #[must_use]
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    #[must_use]
    pub fn with_pagination(mut self, paginated: bool) -> Self {
        self.paginated = paginated;
        self
    }

    #[must_use]
    pub fn with_attribute_name(
        mut self,
        attribute: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.attribute_names.insert(attribute.into(), label.into());
        self
    }

    /// Human-readable label for `attribute`.
    #[must_use]
    pub fn human_attribute_name(&self, attribute: &str) -> String {
        self.attribute_names
            .get(attribute)
            .cloned()
            .unwrap_or_else(|| inflect::humanize(attribute))
    }
}

/// Record types reachable from a table's root type, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: IndexMap<String, RecordType>,
}

impl TypeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, record_type: RecordType) {
        self.types.insert(record_type.name.clone(), record_type);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RecordType> {
        self.types.get(name)
    }

    /// Resolves an association segment (`"addresses"`, `"user"`) to a type
    /// by singularizing and camel-casing it.
    #[must_use]
    pub fn resolve_segment(&self, segment: &str) -> Option<&RecordType> {
        self.get(&inflect::camelize(&inflect::singularize(segment)))
    }
}

// ---------------------------------------------------------------------------
// RecordProvider
// ---------------------------------------------------------------------------

/// Queryable collection of rows backing a table.
///
/// Implementations apply fragments to their own query representation; the
/// fragments passed in are built from declared column ids only (plus the
/// caller's trusted extra ordering).
pub trait RecordProvider {
    /// Introspection of the element type.
    fn record_type(&self) -> &RecordType;

    /// Restricts the projection to `fields` (a comma-separated SELECT list).
    ///
    /// # Errors
    ///
    /// Implementation-defined query-building failures.
    fn select(&mut self, fields: &str) -> anyhow::Result<()>;

    /// Appends an ORDER BY fragment.
    ///
    /// # Errors
    ///
    /// Implementation-defined query-building failures.
    fn order(&mut self, fragment: &str) -> anyhow::Result<()>;

    /// Iterates the rows of the (possibly narrowed/ordered) collection.
    fn rows(&self) -> Box<dyn Iterator<Item = &dyn Row> + '_>;
}
