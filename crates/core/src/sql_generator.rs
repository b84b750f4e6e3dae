use thiserror::Error;

use crate::schema_cache::TableSchema;

pub const DEFAULT_PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SqlGenerationError {
    #[error("table name cannot be empty")]
    EmptyTableName,
    #[error("table `{0}` has no columns")]
    NoColumns(String),
    #[error("table `{0}` has no insertable columns")]
    NoInsertableColumns(String),
}

/// Statements offered for a selected table in the schema explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQueries {
    pub select: String,
    pub insert: String,
}

fn ensure_named(table: &TableSchema) -> Result<(), SqlGenerationError> {
    if table.name.trim().is_empty() {
        return Err(SqlGenerationError::EmptyTableName);
    }
    Ok(())
}

fn column_list<'a>(columns: impl Iterator<Item = &'a str>) -> String {
    columns.collect::<Vec<_>>().join(", ")
}

pub fn select_all_columns_sql(
    table: &TableSchema,
    limit: usize,
) -> Result<String, SqlGenerationError> {
    ensure_named(table)?;
    if table.columns.is_empty() {
        return Err(SqlGenerationError::NoColumns(table.name.clone()));
    }

    Ok(format!(
        "SELECT {}\nFROM {}\nLIMIT {limit};",
        column_list(table.columns.iter().map(|column| column.name.as_str())),
        table.name
    ))
}

/// `INSERT` with one `?` placeholder per column, leaving out columns the
/// database fills in itself (`auto_increment`).
pub fn insert_template_sql(table: &TableSchema) -> Result<String, SqlGenerationError> {
    ensure_named(table)?;
    let columns = table
        .columns
        .iter()
        .filter(|column| !column.is_auto_increment())
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>();
    if columns.is_empty() {
        return Err(SqlGenerationError::NoInsertableColumns(table.name.clone()));
    }

    Ok(format!(
        "INSERT INTO {} ({})\nVALUES ({});",
        table.name,
        column_list(columns.iter().copied()),
        vec!["?"; columns.len()].join(", ")
    ))
}

pub fn table_queries(table: &TableSchema, limit: usize) -> Result<TableQueries, SqlGenerationError> {
    Ok(TableQueries {
        select: select_all_columns_sql(table, limit)?,
        insert: insert_template_sql(table)?,
    })
}

/// Preview for objects without a known column list, such as views.
#[must_use]
pub fn preview_select_sql(object_name: &str, limit: usize) -> String {
    format!("SELECT *\nFROM {object_name}\nLIMIT {limit};")
}

#[cfg(test)]
mod tests {
    use super::{
        insert_template_sql, preview_select_sql, select_all_columns_sql, table_queries,
        SqlGenerationError, DEFAULT_PREVIEW_LIMIT,
    };
    use crate::schema_cache::{ColumnSchema, TableSchema};

    fn table(name: &str, columns: &[&str]) -> TableSchema {
        TableSchema {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|column| ColumnSchema::new(*column, "int"))
                .collect(),
            indexes: Vec::new(),
        }
    }

    #[test]
    fn select_names_every_column_with_limit() {
        let orders = table("orders", &["id", "user_id", "total_amount"]);
        assert_eq!(
            select_all_columns_sql(&orders, DEFAULT_PREVIEW_LIMIT).expect("select sql"),
            "SELECT id, user_id, total_amount\nFROM orders\nLIMIT 10;"
        );
    }

    #[test]
    fn insert_skips_auto_increment_columns() {
        let mut users = table("users", &["id", "username", "email"]);
        users.columns[0].extra = Some("auto_increment".to_string());

        assert_eq!(
            insert_template_sql(&users).expect("insert sql"),
            "INSERT INTO users (username, email)\nVALUES (?, ?);"
        );
    }

    #[test]
    fn generates_both_statements_for_a_table() {
        let sessions = table("sessions", &["id", "user_id"]);
        let queries = table_queries(&sessions, 5).expect("queries");
        assert_eq!(queries.select, "SELECT id, user_id\nFROM sessions\nLIMIT 5;");
        assert_eq!(
            queries.insert,
            "INSERT INTO sessions (id, user_id)\nVALUES (?, ?);"
        );
    }

    #[test]
    fn rejects_unnamed_or_empty_tables() {
        assert_eq!(
            select_all_columns_sql(&table(" ", &["id"]), 10),
            Err(SqlGenerationError::EmptyTableName)
        );
        assert_eq!(
            select_all_columns_sql(&table("empty", &[]), 10),
            Err(SqlGenerationError::NoColumns("empty".to_string()))
        );

        let mut only_id = table("counters", &["id"]);
        only_id.columns[0].extra = Some("auto_increment".to_string());
        assert_eq!(
            insert_template_sql(&only_id),
            Err(SqlGenerationError::NoInsertableColumns("counters".to_string()))
        );
    }

    #[test]
    fn preview_select_uses_star_projection() {
        assert_eq!(
            preview_select_sql("daily_events", 10),
            "SELECT *\nFROM daily_events\nLIMIT 10;"
        );
    }
}
