//! Relational source fetcher
//!
//! Loads one entity's full record graph from the source-of-truth database:
//! the main row, every nested table's rows, and the special tables' rows,
//! each normalized into the generic [`Record`] shape. Also produces the
//! random entity samples that drive a check run.

use crate::error::{CheckError, CheckResult};
use crate::reconcile::{Record, SourceRecordGraph, SourceValue};
use crate::registry::SchemaRegistry;
use deadpool_postgres::Pool;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_postgres::types::Type;
use tokio_postgres::Row;
use tracing::{debug, warn};

pub struct SourceFetcher {
    pool: Pool,
    registry: Arc<SchemaRegistry>,
}

impl SourceFetcher {
    pub fn new(pool: Pool, registry: Arc<SchemaRegistry>) -> Self {
        Self { pool, registry }
    }

    /// Random sample of live root-table IDs from the last 3 months.
    /// The upstream producer for a check run.
    pub async fn sample_entity_ids(&self, limit: usize) -> CheckResult<Vec<i64>> {
        let client = self.pool.get().await?;
        let root = self.registry.root();
        let sql = format!(
            r#"SELECT "{id}"::bigint FROM {table}
               WHERE "Deleted" = 0 AND "CreatedAt" > now() - interval '3 months'
               ORDER BY random() LIMIT $1"#,
            id = root.fetch_key,
            table = root.source_table,
        );
        let rows = client.query(&sql, &[&(limit as i64)]).await?;
        Ok(rows.iter().map(|row| row.get::<_, i64>(0)).collect())
    }

    /// Fetch the full record graph for one entity. `Ok(None)` when the root
    /// row does not exist. A failed special-table query degrades to an
    /// empty collection with a warning; only root-level failures make the
    /// entity incomparable.
    pub async fn fetch(&self, entity_id: i64) -> CheckResult<Option<SourceRecordGraph>> {
        let client = self.pool.get().await?;
        let root_mapping = self.registry.root();

        let sql = format!(
            r#"SELECT * FROM {} WHERE "{}" = $1"#,
            root_mapping.source_table, root_mapping.fetch_key,
        );
        let Some(root_row) = client.query_opt(&sql, &[&entity_id]).await? else {
            warn!(entity_id, "entity not found in source database");
            return Ok(None);
        };
        let root = row_to_record(&root_row);

        let mut nested = HashMap::new();
        for mapping in self.registry.nested() {
            let sql = format!(
                r#"SELECT * FROM {} WHERE "{}" = $1"#,
                mapping.source_table, mapping.fetch_key,
            );
            let rows = client.query(&sql, &[&entity_id]).await?;
            nested.insert(
                mapping.source_table.clone(),
                rows.iter().map(row_to_record).collect(),
            );
        }

        let mut special = HashMap::new();
        for collection in self.registry.specials() {
            let correlation = match &collection.root_source_field {
                None => SourceValue::Int(entity_id),
                Some(field) => root.get(field).cloned().unwrap_or(SourceValue::Null),
            };
            let mut sql = format!(
                r#"SELECT * FROM {} WHERE "{}" = $1"#,
                collection.source_table, collection.correlation_field,
            );
            if collection.exclude_deleted {
                sql.push_str(r#" AND "Deleted" = 0"#);
            }
            let rows = match query_by_value(&client, &sql, &correlation).await {
                Ok(rows) => rows,
                Err(e) => {
                    // Partial fetch failure: proceed with an empty
                    // collection rather than aborting the whole check
                    warn!(
                        entity_id,
                        table = %collection.source_table,
                        error = %e,
                        "special table fetch failed, treating as empty"
                    );
                    Vec::new()
                }
            };
            special.insert(
                collection.source_table.clone(),
                rows.iter().map(row_to_record).collect(),
            );
        }

        Ok(Some(SourceRecordGraph {
            root,
            nested,
            special,
        }))
    }
}

/// Run a single-parameter query whose bind value comes from a root-record
/// cell. A null correlation value matches nothing.
async fn query_by_value(
    client: &deadpool_postgres::Client,
    sql: &str,
    value: &SourceValue,
) -> Result<Vec<Row>, CheckError> {
    match value {
        SourceValue::Int(v) => Ok(client.query(sql, &[v]).await?),
        SourceValue::Text(v) => Ok(client.query(sql, &[v]).await?),
        SourceValue::Null => Ok(Vec::new()),
        other => {
            debug!(value = ?other, "unsupported correlation value type, skipping");
            Ok(Vec::new())
        }
    }
}

/// Convert one relational row into the generic record shape, inspecting
/// each column's declared type. Unknown types fall back to text, then null.
pub fn row_to_record(row: &Row) -> Record {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        record.insert(column.name().to_string(), decode_cell(row, idx));
    }
    record
}

fn decode_cell(row: &Row, idx: usize) -> SourceValue {
    let ty = row.columns()[idx].type_();

    if *ty == Type::BOOL {
        return cell::<bool>(row, idx).map_or(SourceValue::Null, SourceValue::Bool);
    }
    if *ty == Type::INT2 {
        return cell::<i16>(row, idx).map_or(SourceValue::Null, |v| SourceValue::Int(v as i64));
    }
    if *ty == Type::INT4 {
        return cell::<i32>(row, idx).map_or(SourceValue::Null, |v| SourceValue::Int(v as i64));
    }
    if *ty == Type::INT8 {
        return cell::<i64>(row, idx).map_or(SourceValue::Null, SourceValue::Int);
    }
    if *ty == Type::FLOAT4 {
        return cell::<f32>(row, idx).map_or(SourceValue::Null, |v| SourceValue::Float(v as f64));
    }
    if *ty == Type::FLOAT8 {
        return cell::<f64>(row, idx).map_or(SourceValue::Null, SourceValue::Float);
    }
    if *ty == Type::NUMERIC {
        // Decimals render exactly; the string fallback rule compares them
        return cell::<Decimal>(row, idx)
            .map_or(SourceValue::Null, |v| SourceValue::Text(v.to_string()));
    }
    if *ty == Type::TIMESTAMP {
        return cell::<chrono::NaiveDateTime>(row, idx)
            .map_or(SourceValue::Null, SourceValue::DateTime);
    }
    if *ty == Type::TIMESTAMPTZ {
        return cell::<chrono::DateTime<chrono::Utc>>(row, idx)
            .map_or(SourceValue::Null, |v| SourceValue::DateTime(v.naive_utc()));
    }
    if *ty == Type::DATE {
        return cell::<chrono::NaiveDate>(row, idx)
            .map_or(SourceValue::Null, |v| {
                SourceValue::Text(v.format("%Y-%m-%d").to_string())
            });
    }
    if *ty == Type::BYTEA {
        return cell::<Vec<u8>>(row, idx).map_or(SourceValue::Null, SourceValue::Bytes);
    }
    if *ty == Type::JSON || *ty == Type::JSONB {
        return cell::<serde_json::Value>(row, idx).map_or(SourceValue::Null, SourceValue::Json);
    }
    if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME {
        return cell::<String>(row, idx).map_or(SourceValue::Null, SourceValue::Text);
    }

    // Unknown type: try text, then give up
    match cell::<String>(row, idx) {
        Some(text) => SourceValue::Text(text),
        None => {
            debug!(
                column = row.columns()[idx].name(),
                pg_type = %ty,
                "column type not decodable, treating as null"
            );
            SourceValue::Null
        }
    }
}

fn cell<'a, T: tokio_postgres::types::FromSql<'a>>(row: &'a Row, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}
