use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Column, Executor, PgPool, Postgres, Row, Statement, TypeInfo};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Query(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(columns: Vec<ColumnDef>, rows: Vec<Vec<Value>>, execution_time_ms: u64) -> Self {
        Self {
            columns,
            row_count: rows.len(),
            rows,
            execution_time_ms,
        }
    }
}

/// Runs SQL text exactly as given. No rewriting, limits or timeouts are applied.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryResult, DbError>;
}

pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryResult, DbError> {
        let start = Instant::now();
        info!("Executing SQL query: {}", sql);

        let mut conn = self.pool.acquire().await.map_err(query_failed)?;

        // Column information comes from the statement description, so empty results keep their headers
        let statement = (&mut *conn).prepare(sql).await.map_err(query_failed)?;
        let columns: Vec<ColumnDef> = statement
            .columns()
            .iter()
            .map(|col| ColumnDef {
                name: col.name().to_string(),
                data_type: col.type_info().name().to_string(),
            })
            .collect();

        let rows = statement
            .query()
            .fetch_all(&mut *conn)
            .await
            .map_err(query_failed)?;

        let json_rows: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| column_value(row, i, &col.data_type))
                    .collect()
            })
            .collect();

        let result = QueryResult::new(columns, json_rows, start.elapsed().as_millis() as u64);
        info!(
            "Query executed successfully. Row count: {}, Execution time: {}ms",
            result.row_count, result.execution_time_ms
        );
        Ok(result)
    }
}

fn query_failed(e: sqlx::Error) -> DbError {
    warn!("Query failed: {}", e);
    DbError::from(e)
}

fn decode<'r, T>(row: &'r PgRow, index: usize, to_json: impl FnOnce(T) -> Value) -> Option<Value>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .ok()
        .map(|v| v.map(to_json).unwrap_or(Value::Null))
}

fn float_value(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(n.to_string()))
}

fn hex_value(bytes: Vec<u8>) -> Value {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    Value::String(format!("\\x{}", hex))
}

/// Converts a column to JSON by its PostgreSQL type name.
fn column_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use sqlx::types::{Decimal, Uuid};

    let value = match type_name {
        "INT2" => decode::<i16>(row, index, Value::from),
        "INT4" => decode::<i32>(row, index, Value::from),
        "INT8" => decode::<i64>(row, index, Value::from),
        "FLOAT4" => decode::<f32>(row, index, |n| float_value(n as f64)),
        "FLOAT8" => decode::<f64>(row, index, float_value),
        "NUMERIC" => decode::<Decimal>(row, index, |d| Value::String(d.to_string())),
        "BOOL" => decode::<bool>(row, index, Value::Bool),
        "JSON" | "JSONB" => decode::<Value>(row, index, |v| v),
        "UUID" => decode::<Uuid>(row, index, |u| Value::String(u.to_string())),
        "DATE" => decode::<NaiveDate>(row, index, |d| Value::String(d.to_string())),
        "TIME" => decode::<NaiveTime>(row, index, |t| Value::String(t.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index, |dt| {
            Value::String(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())
        }),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, index, |dt| Value::String(dt.to_rfc3339())),
        "BYTEA" => decode::<Vec<u8>>(row, index, hex_value),
        _ => None,
    };

    // Fallback: text-like types, then null for anything undecodable
    value
        .or_else(|| decode::<String>(row, index, Value::String))
        .unwrap_or(Value::Null)
}
