use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::store::{Document, DocumentStore, Filter, StoreError};

/// JSONB-backed [`DocumentStore`].
///
/// All collections share one `documents` table. Filters become JSONB
/// containment (`@>`), which is field equality for flat filters.
pub struct PgDocumentStore {
    pool: PgPool,
    collection: String,
}

impl PgDocumentStore {
    pub async fn connect(database_url: &str, collection: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self::with_pool(pool, collection))
    }

    pub fn with_pool(pool: PgPool, collection: &str) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id BIGSERIAL PRIMARY KEY,
                collection TEXT NOT NULL,
                body JSONB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS documents_body_idx ON documents USING GIN (body)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            "SELECT body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY id",
        )
        .bind(&self.collection)
        .bind(Json(filter.as_value()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<Document, StoreError> {
                let Json(body): Json<Value> = row.try_get("body")?;
                match body {
                    Value::Object(document) => Ok(document),
                    _ => Err(StoreError::NotAnObject),
                }
            })
            .collect()
    }

    async fn insert(&self, document: Document) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO documents (collection, body) VALUES ($1, $2)")
            .bind(&self.collection)
            .bind(Json(Value::Object(document)))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update(&self, filter: &Filter, document: Document) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET body = $3
             WHERE id = (
                SELECT id FROM documents
                WHERE collection = $1 AND body @> $2
                ORDER BY id LIMIT 1
             )",
        )
        .bind(&self.collection)
        .bind(Json(filter.as_value()))
        .bind(Json(Value::Object(document)))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, filter: &Filter) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM documents
             WHERE id = (
                SELECT id FROM documents
                WHERE collection = $1 AND body @> $2
                ORDER BY id LIMIT 1
             )",
        )
        .bind(&self.collection)
        .bind(Json(filter.as_value()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
