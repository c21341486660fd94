use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use super::repository::{Entity, Predicate, Repository};
use crate::error::Result;

/// Stores each entity as a JSONB document in the shared `documents` table,
/// partitioned by `Entity::KIND`. Predicates are evaluated in process.
pub struct PgRepository<T> {
    pool: PgPool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PgRepository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> PgRepository<T> {
    async fn write(&self, entity: &T) -> Result<()> {
        let body = serde_json::to_value(entity)?;
        sqlx::query(
            r#"
            INSERT INTO documents (kind, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (kind, id) DO UPDATE
            SET body = EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(T::KIND)
        .bind(entity.id())
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for PgRepository<T> {
    async fn get_all(&self) -> Result<Vec<T>> {
        let rows: Vec<JsonValue> =
            sqlx::query_scalar(r#"SELECT body FROM documents WHERE kind = $1 ORDER BY seq"#)
                .bind(T::KIND)
                .fetch_all(&self.pool)
                .await?;

        let mut out = Vec::with_capacity(rows.len());
        for body in rows {
            match serde_json::from_value::<T>(body) {
                Ok(entity) => out.push(entity),
                Err(e) => {
                    tracing::warn!(kind = T::KIND, error = %e, "Skipping unreadable document")
                }
            }
        }
        Ok(out)
    }

    async fn first_or_default(&self, predicate: Predicate<'_, T>) -> Result<Option<T>> {
        Ok(self.get_all().await?.into_iter().find(|e| predicate(e)))
    }

    async fn insert(&self, entity: T) -> Result<()> {
        self.write(&entity).await
    }

    async fn upsert(&self, predicate: Predicate<'_, T>, entity: T) -> Result<()> {
        if let Some(existing) = self.first_or_default(predicate).await? {
            if existing.id() != entity.id() {
                sqlx::query(r#"DELETE FROM documents WHERE kind = $1 AND id = $2"#)
                    .bind(T::KIND)
                    .bind(existing.id())
                    .execute(&self.pool)
                    .await?;
            }
        }
        self.write(&entity).await
    }

    async fn update(&self, entity: T) -> Result<bool> {
        let body = serde_json::to_value(&entity)?;
        let result = sqlx::query(
            r#"UPDATE documents SET body = $3, updated_at = NOW() WHERE kind = $1 AND id = $2"#,
        )
        .bind(T::KIND)
        .bind(entity.id())
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, predicate: Predicate<'_, T>) -> Result<usize> {
        let ids: Vec<Uuid> = self
            .get_all()
            .await?
            .iter()
            .filter(|e| predicate(e))
            .map(|e| e.id())
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(r#"DELETE FROM documents WHERE kind = $1 AND id = ANY($2)"#)
            .bind(T::KIND)
            .bind(&ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}
