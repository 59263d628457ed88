//! PostgreSQL implementation of DocumentStore.
//!
//! All collections share one JSONB table (see `migrations/`). Field names
//! are always bound as parameters, never interpolated.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{
    DocumentStore, Filter, FilterOp, OrderBy, SaveResult, SortDirection, StoredDocument,
};

/// Creates the connection pool for `url` using the pool limits in `config`.
pub async fn create_pool(url: &str, config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .connect(url)
        .await
}

/// Applies the bundled migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    body: Value,
}

impl From<DocumentRow> for StoredDocument {
    fn from(row: DocumentRow) -> Self {
        StoredDocument {
            id: row.id,
            body: row.body,
        }
    }
}

fn db_error(action: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", action, err))
}

fn not_found(collection: &str, id: &str) -> DomainError {
    DomainError::new(
        ErrorCode::NotFound,
        format!("Document {}/{} not found", collection, id),
    )
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for (field, op) in filter.clauses() {
        match op {
            FilterOp::Eq(Value::Null) | FilterOp::IsNull => {
                builder.push(" AND COALESCE(body -> ");
                builder.push_bind(field.clone());
                builder.push(", 'null'::jsonb) = 'null'::jsonb");
            }
            FilterOp::NotNull => {
                builder.push(" AND COALESCE(body -> ");
                builder.push_bind(field.clone());
                builder.push(", 'null'::jsonb) <> 'null'::jsonb");
            }
            FilterOp::Eq(value) => {
                let mut probe = serde_json::Map::new();
                probe.insert(field.clone(), value.clone());
                builder.push(" AND body @> ");
                builder.push_bind(Value::Object(probe));
            }
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, DomainError> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("load document", e))?;

        Ok(row.map(StoredDocument::from))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<StoredDocument>, DomainError> {
        Ok(self
            .find_many(collection, filter, None, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDocument>, DomainError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id, body FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());
        push_filter(&mut builder, filter);

        match order_by {
            Some(order) => {
                builder.push(" ORDER BY body -> ");
                builder.push_bind(order.field.clone());
                builder.push(match order.direction {
                    SortDirection::Asc => " ASC NULLS FIRST",
                    SortDirection::Desc => " DESC NULLS LAST",
                });
                builder.push(", id");
            }
            None => {
                builder.push(" ORDER BY id");
            }
        }

        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<DocumentRow> = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("query documents", e))?;

        Ok(rows.into_iter().map(StoredDocument::from).collect())
    }

    async fn insert(&self, collection: &str, body: Value) -> Result<String, DomainError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("insert document", e))?;
        Ok(id)
    }

    async fn insert_with_id(
        &self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert document", e))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET body = body || $3, updated_at = now()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(partial)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update document", e))?;

        if result.rows_affected() == 0 {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete document", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, DomainError> {
        let value: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE documents
            SET body = jsonb_set(
                    body,
                    ARRAY[$3]::text[],
                    to_jsonb(COALESCE((body ->> $3)::bigint, 0) + $4)
                ),
                updated_at = now()
            WHERE collection = $1 AND id = $2
            RETURNING (body ->> $3)::bigint
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(field)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("increment counter", e))?;

        value.ok_or_else(|| not_found(collection, id))
    }
}
