//! Destination table provisioning.
//!
//! DDL runs on the same connection the loader uses next, but each statement
//! commits on its own: a load failure after provisioning leaves the
//! destination table behind, empty or unmodified. Schema and table names are
//! interpolated as-is (model definitions are trusted, internally authored);
//! only column names are quoted.

use tokio_postgres::Client;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::ingest::typemap::ColumnDef;
use crate::models::TableMode;

/// Split a dotted destination identifier into (schema, table). A bare table
/// name lands in `public`.
pub fn parse_table(dest_table: &str) -> (String, String) {
    match dest_table.split_once('.') {
        Some((schema, table)) => (schema.to_string(), table.to_string()),
        None => ("public".to_string(), dest_table.to_string()),
    }
}

/// Double-quote a column identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn drop_table_sql(schema: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {schema}.{table}")
}

fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {schema}")
}

fn create_table_sql(schema: &str, table: &str, defs: &[ColumnDef]) -> String {
    let cols = defs
        .iter()
        .map(|d| format!("{} {}", quote_ident(&d.name), d.pg_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {schema}.{table} ({cols})")
}

/// Prepare the destination table for a load.
///
/// `Full` drops the existing table unconditionally, then recreates it from
/// `defs`. `Incremental` never drops and creates only if absent. When `defs`
/// is empty (nothing to type against), no schema or table is created; in
/// `Full` mode that means a zero-row run leaves no destination table at all.
pub async fn provision(
    client: &Client,
    mode: TableMode,
    schema: &str,
    table: &str,
    defs: &[ColumnDef],
) -> Result<()> {
    let target = format!("{schema}.{table}");
    let err = |source| IngestError::Provision {
        table: target.clone(),
        source,
    };

    if mode == TableMode::Full {
        debug!(table = %target, "dropping destination table");
        client
            .execute(drop_table_sql(schema, table).as_str(), &[])
            .await
            .map_err(err)?;
    }

    if defs.is_empty() {
        debug!(table = %target, "no column definitions, skipping table creation");
        return Ok(());
    }

    client
        .execute(create_schema_sql(schema).as_str(), &[])
        .await
        .map_err(err)?;
    client
        .execute(create_table_sql(schema, table, defs).as_str(), &[])
        .await
        .map_err(err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(pairs: &[(&str, &str)]) -> Vec<ColumnDef> {
        pairs
            .iter()
            .map(|(name, pg_type)| ColumnDef {
                name: name.to_string(),
                pg_type: pg_type.to_string(),
            })
            .collect()
    }

    #[test]
    fn dotted_identifier_splits_on_first_dot() {
        assert_eq!(
            parse_table("finance.invoices"),
            ("finance".to_string(), "invoices".to_string())
        );
        assert_eq!(
            parse_table("a.b.c"),
            ("a".to_string(), "b.c".to_string())
        );
    }

    #[test]
    fn bare_table_defaults_to_public() {
        assert_eq!(
            parse_table("invoices"),
            ("public".to_string(), "invoices".to_string())
        );
    }

    #[test]
    fn column_names_are_quoted_in_ddl() {
        let sql = create_table_sql(
            "public",
            "t",
            &defs(&[("id", "BIGINT"), ("select", "TEXT")]),
        );
        assert_eq!(
            sql,
            r#"CREATE TABLE IF NOT EXISTS public.t ("id" BIGINT, "select" TEXT)"#
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn drop_and_schema_statements() {
        assert_eq!(
            drop_table_sql("finance", "invoices"),
            "DROP TABLE IF EXISTS finance.invoices"
        );
        assert_eq!(
            create_schema_sql("finance"),
            "CREATE SCHEMA IF NOT EXISTS finance"
        );
    }
}
