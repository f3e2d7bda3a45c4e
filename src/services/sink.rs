use crate::services::error::SinkError;
use crate::services::table::{Cell, ColumnType, RawTable};
use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, Statement, TransactionTrait, Value,
};

/// Destination for a fully parsed table
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Drop `table` if present and recreate it with `data`'s schema and rows.
    /// Either the whole replacement is visible afterwards or none of it is.
    async fn replace_table(&self, table: &str, data: &RawTable) -> Result<u64, SinkError>;

    async fn ping(&self) -> bool;
}

pub struct SqlTableSink {
    db: DatabaseConnection,
}

impl SqlTableSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub fn quote_ident(backend: DbBackend, name: &str) -> String {
    match backend {
        DbBackend::MySql => format!("`{}`", name.replace('`', "``")),
        _ => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

fn sql_type(backend: DbBackend, kind: ColumnType) -> &'static str {
    match (backend, kind) {
        (DbBackend::Sqlite, ColumnType::Integer) => "INTEGER",
        (DbBackend::Sqlite, ColumnType::Float) => "REAL",
        (DbBackend::MySql, ColumnType::Float) => "DOUBLE",
        (_, ColumnType::Integer) => "BIGINT",
        (_, ColumnType::Float) => "DOUBLE PRECISION",
        (_, ColumnType::Boolean) => "BOOLEAN",
        (_, ColumnType::Text) => "TEXT",
    }
}

// Bind-parameter ceilings: Postgres allows 65535, older SQLite builds 999.
fn max_params(backend: DbBackend) -> usize {
    match backend {
        DbBackend::Sqlite => 900,
        _ => 60_000,
    }
}

fn to_value(cell: &Cell, kind: ColumnType) -> Value {
    match (cell, kind) {
        (Cell::Integer(v), _) => Value::BigInt(Some(*v)),
        (Cell::Float(v), _) => Value::Double(Some(*v)),
        (Cell::Boolean(v), _) => Value::Bool(Some(*v)),
        (Cell::Text(v), _) => Value::String(Some(Box::new(v.clone()))),
        (Cell::Null, ColumnType::Integer) => Value::BigInt(None),
        (Cell::Null, ColumnType::Float) => Value::Double(None),
        (Cell::Null, ColumnType::Boolean) => Value::Bool(None),
        (Cell::Null, ColumnType::Text) => Value::String(None),
    }
}

pub fn create_table_sql(backend: DbBackend, table: &str, data: &RawTable) -> String {
    let columns: Vec<String> = data
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(backend, &c.name), sql_type(backend, c.kind)))
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(backend, table),
        columns.join(", ")
    )
}

fn insert_statement(backend: DbBackend, table: &str, data: &RawTable, rows: &[Vec<Cell>]) -> Statement {
    let column_list: Vec<String> = data
        .columns
        .iter()
        .map(|c| quote_ident(backend, &c.name))
        .collect();

    let width = data.columns.len();
    let mut values = Vec::with_capacity(rows.len() * width);
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut placeholders = Vec::with_capacity(width);
        for (cell, column) in row.iter().zip(&data.columns) {
            values.push(to_value(cell, column.kind));
            placeholders.push(match backend {
                DbBackend::Postgres => format!("${}", values.len()),
                _ => "?".to_string(),
            });
        }
        tuples.push(format!("({})", placeholders.join(", ")));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(backend, table),
        column_list.join(", "),
        tuples.join(", ")
    );
    Statement::from_sql_and_values(backend, sql, values)
}

#[async_trait]
impl TableSink for SqlTableSink {
    async fn replace_table(&self, table: &str, data: &RawTable) -> Result<u64, SinkError> {
        if data.columns.is_empty() {
            return Err(SinkError::NoColumns);
        }
        let backend = self.db.get_database_backend();

        let txn = self.db.begin().await?;

        txn.execute(Statement::from_string(
            backend,
            format!("DROP TABLE IF EXISTS {}", quote_ident(backend, table)),
        ))
        .await?;

        txn.execute(Statement::from_string(
            backend,
            create_table_sql(backend, table, data),
        ))
        .await?;

        let rows_per_batch = (max_params(backend) / data.columns.len()).max(1);
        let mut inserted = 0u64;
        for batch in data.rows.chunks(rows_per_batch) {
            let result = txn
                .execute(insert_statement(backend, table, data, batch))
                .await?;
            inserted += result.rows_affected();
        }

        // Dropping the transaction without commit rolls back on any `?` above.
        txn.commit().await?;

        tracing::debug!("Replaced table {} with {} rows", table, inserted);
        Ok(inserted)
    }

    async fn ping(&self) -> bool {
        self.db.ping().await.is_ok()
    }
}
