//! Namespaced key-value memory store
//!
//! `put` always overwrites, `get` returns `None` for a missing key. There is
//! no delete, no TTL and no multi-key transaction.

use crate::error::AgentError;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};

/// Coarse partition of the store, e.g. `("clients",)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace(Vec<String>);

impl Namespace {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn clients() -> Self {
        Self::new(["clients"])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub namespace: Namespace,
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trait for session memory persistence
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<()>;
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<MemoryItem>>;
}

/// In-memory store; contents are lost when the process exits.
pub struct InMemoryStore {
    items: Arc<RwLock<HashMap<(Namespace, String), MemoryItem>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MemoryStore for InMemoryStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<()> {
        let now = Utc::now();
        let mut items = self.items.write().await;

        items
            .entry((namespace.clone(), key.to_string()))
            .and_modify(|item| {
                item.value = value.clone();
                item.updated_at = now;
            })
            .or_insert_with(|| MemoryItem {
                namespace: namespace.clone(),
                key: key.to_string(),
                value,
                created_at: now,
                updated_at: now,
            });

        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<MemoryItem>> {
        let items = self.items.read().await;
        Ok(items.get(&(namespace.clone(), key.to_string())).cloned())
    }
}

/// Postgres-backed store. `(namespace, key)` is the primary key.
pub struct PostgresMemoryStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresMemoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS memory_items (
                      namespace TEXT[] NOT NULL,
                      key TEXT NOT NULL,
                      value JSONB NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                      PRIMARY KEY (namespace, key)
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AgentError::MemoryStore(format!("Failed to initialize memory schema: {}", e))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl MemoryStore for PostgresMemoryStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO memory_items (namespace, key, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (namespace, key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(namespace.parts().to_vec())
        .bind(key)
        .bind(sqlx::types::Json(value))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AgentError::MemoryStore(format!("Failed to save {} / {}: {}", namespace, key, e))
        })?;

        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<MemoryItem>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT value, created_at, updated_at
            FROM memory_items
            WHERE namespace = $1 AND key = $2
            "#,
        )
        .bind(namespace.parts().to_vec())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AgentError::MemoryStore(format!("Failed to load {} / {}: {}", namespace, key, e))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: sqlx::types::Json<Value> = row
            .try_get("value")
            .map_err(|e| AgentError::MemoryStore(format!("Corrupt memory row: {}", e)))?;

        Ok(Some(MemoryItem {
            namespace: namespace.clone(),
            key: key.to_string(),
            value: value.0,
            created_at: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
            updated_at: row.try_get("updated_at").unwrap_or_else(|_| Utc::now()),
        }))
    }
}

/// Pick Postgres when a database URL is configured, in-memory otherwise.
pub fn build_memory_store(database_url: Option<&str>) -> Arc<dyn MemoryStore> {
    if let Some(url) = database_url {
        match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
        {
            Ok(pool) => {
                info!("Memory store backend: postgres");
                return Arc::new(PostgresMemoryStore::new(pool));
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres memory backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Memory store backend: in-memory");
    Arc::new(InMemoryStore::new())
}
