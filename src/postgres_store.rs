//! Postgres-backed `DocumentStore` (spec.md §6, SPEC_FULL.md §M).
//!
//! Documents live one-per-row in a `collection, id` keyed table with a
//! `JSONB` payload; reports are append-only tables keyed by a UUID.
//! Unlike the teacher's services, these queries are built with the
//! runtime-checked `sqlx::query`/`sqlx::query_as` entry points rather than
//! the `query!`/`query_as!` macros, since those require a live database
//! (or an offline query cache) at build time and this crate has neither.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::errors::StoreError;
use crate::report::{RepairReport, ValidationReport};
use crate::store::{DocumentStore, Page};
use crate::value::Value;
use crate::walker::{self, UpdateSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data JSONB NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS validation_reports (
                id UUID PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS repair_reports (
                id UUID PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        Ok(row.map(|row| {
            let json: serde_json::Value = row.get("data");
            value_from_json(json)
        }))
    }

    async fn set_document(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
        let json = value_to_json(&value);
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn update_fields(&self, collection: &str, id: &str, updates: &[UpdateSpec]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Write(e.to_string()))?;

        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        let Some(row) = row else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };

        let json: serde_json::Value = row.get("data");
        let mut document = value_from_json(json);
        for update in updates {
            walker::apply_update(&mut document, update);
        }

        sqlx::query("UPDATE documents SET data = $1 WHERE collection = $2 AND id = $3")
            .bind(value_to_json(&document))
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        tx.commit().await.map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn page_collection(&self, collection: &str, page_token: Option<&str>, limit: u32) -> Result<Page, StoreError> {
        let offset: i64 = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let limit = limit as i64;

        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = $1 ORDER BY id LIMIT $2 OFFSET $3")
            .bind(collection)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        let count = rows.len() as i64;
        let documents = rows
            .into_iter()
            .map(|row| {
                let id: String = row.get("id");
                let json: serde_json::Value = row.get("data");
                (id, value_from_json(json))
            })
            .collect();

        let next_page_token = if count == limit { Some((offset + limit).to_string()) } else { None };

        Ok(Page {
            documents,
            next_page_token,
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT collection FROM documents ORDER BY collection")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        Ok(rows.into_iter().map(|row| row.get("collection")).collect())
    }

    async fn save_validation_report(&self, report: &ValidationReport) -> Result<(), StoreError> {
        let id: uuid::Uuid = report.id.parse().map_err(|_| StoreError::Write("invalid report id".to_string()))?;
        let json = serde_json::to_value(report).map_err(|e| StoreError::Write(e.to_string()))?;
        sqlx::query("INSERT INTO validation_reports (id, data) VALUES ($1, $2)")
            .bind(id)
            .bind(json)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn load_validation_report(&self, id: &str) -> Result<Option<ValidationReport>, StoreError> {
        let Ok(uuid) = id.parse::<uuid::Uuid>() else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT data FROM validation_reports WHERE id = $1")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        row.map(|row| {
            let json: serde_json::Value = row.get("data");
            serde_json::from_value(json).map_err(|e| StoreError::Read(e.to_string()))
        })
        .transpose()
    }

    async fn save_repair_report(&self, report: &RepairReport) -> Result<(), StoreError> {
        let id: uuid::Uuid = report.id.parse().map_err(|_| StoreError::Write("invalid report id".to_string()))?;
        let json = serde_json::to_value(report).map_err(|e| StoreError::Write(e.to_string()))?;
        sqlx::query("INSERT INTO repair_reports (id, data) VALUES ($1, $2)")
            .bind(id)
            .bind(json)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}

/// The single boundary point where `serde_json::Value` converts to/from
/// this crate's `Value`. A JSON string matching RFC 3339 is read back as
/// `Value::Timestamp`; everything else round-trips structurally.
pub fn value_from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => Value::Timestamp(dt.with_timezone(&Utc)),
            Err(_) => Value::String(s),
        },
        serde_json::Value::Array(items) => Value::Sequence(items.into_iter().map(value_from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Mapping(map.into_iter().map(|(k, v)| (k, value_from_json(v))).collect())
        }
    }
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
        Value::Sequence(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Mapping(map) => {
            serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect())
        }
    }
}
