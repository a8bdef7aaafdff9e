//! CSV export of a table's visible columns.

use std::io;

use anyhow::Context;
use autogrid_core::{RecordProvider, Table};

/// Writes a header row of visible column names, then one row of raw values
/// per record. `Null` is written as an empty field.
///
/// # Errors
///
/// Fails if the table cannot resolve its view (no store attached), the
/// provider rejects a fragment, or writing fails.
pub fn write_csv<W: io::Write>(
    table: &mut Table,
    provider: &mut dyn RecordProvider,
    writer: W,
) -> anyhow::Result<()> {
    let headers = table.export_headers()?;
    let rows = table.export_rows(provider)?;

    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&headers).context("failed to write CSV header")?;
    for (index, row) in rows.iter().enumerate() {
        out.write_record(row.iter().map(ToString::to_string))
            .with_context(|| format!("failed to write CSV row {index}"))?;
    }
    out.flush().context("failed to flush CSV output")?;
    tracing::debug!(table = %table.id(), rows = rows.len(), "csv export written");
    Ok(())
}

/// [`write_csv`] into a string.
///
/// # Errors
///
/// See [`write_csv`].
pub fn to_csv_string(
    table: &mut Table,
    provider: &mut dyn RecordProvider,
) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    write_csv(table, provider, &mut buffer)?;
    String::from_utf8(buffer).context("CSV output is not UTF-8")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use autogrid_core::{Overrides, PreferenceStore, RecordType};
    use serde_json::json;

    use super::*;
    use crate::provider::JsonRecordProvider;
    use crate::store::MemoryPreferenceStore;

    #[test]
    fn exports_visible_columns_in_sorted_order() {
        let store = Arc::new(MemoryPreferenceStore::new());
        store.set("autogrid_user_columns", "email, first_name");
        store.set("autogrid_user_sort", "first_name desc");

        let mut table = Table::new(RecordType::new("User"), &Overrides::new()).unwrap();
        table.attach_store(store);
        table
            .declare_columns("first_name, last_name, email:E-mail", &Overrides::new())
            .unwrap();

        let mut provider = JsonRecordProvider::new(
            RecordType::new("User"),
            vec![
                json!({"first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"}),
                json!({"first_name": "Grace", "last_name": "Hopper", "email": null}),
                json!({"first_name": "Alan, M.", "email": "alan@example.com"}),
            ],
        );

        let csv = to_csv_string(&mut table, &mut provider).unwrap();
        assert_eq!(
            csv,
            "E-mail,First name\n,Grace\nalan@example.com,\"Alan, M.\"\nada@example.com,Ada\n"
        );
    }

    #[test]
    fn export_requires_a_store() {
        let mut table = Table::new(RecordType::new("User"), &Overrides::new()).unwrap();
        table.declare_columns("email", &Overrides::new()).unwrap();
        let mut provider = JsonRecordProvider::new(RecordType::new("User"), Vec::new());
        assert!(to_csv_string(&mut table, &mut provider).is_err());
    }
}
