//! PostgreSQL ownership store implementation

use crate::error::{AuthzError, Result};
use crate::ownership::OwnershipStore;
use crate::types::OwnershipRecord;
use async_trait::async_trait;
use sqlx::postgres::PgPool;

/// PostgreSQL ownership store sharing the plugin's connection pool
#[derive(Clone)]
pub struct PostgresOwnershipStore {
    pool: PgPool,
}

impl PostgresOwnershipStore {
    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up the record for a container id
    pub async fn owner_of(&self, id: &str) -> Result<Option<OwnershipRecord>> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT owner, name, id FROM container_owners WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuthzError::OwnershipStore(format!("Failed to get owner: {}", e)))?;

        Ok(row.map(|(owner, name, id)| OwnershipRecord { owner, name, id }))
    }
}

#[async_trait]
impl OwnershipStore for PostgresOwnershipStore {
    async fn set_owner(&self, record: &OwnershipRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO container_owners (id, owner, name, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner)
        .bind(&record.name)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthzError::OwnershipStore(format!("Failed to set owner: {}", e)))?;

        Ok(())
    }

    async fn remove_owner(&self, record: &OwnershipRecord) -> Result<()> {
        sqlx::query("DELETE FROM container_owners WHERE id = $1")
            .bind(&record.id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthzError::OwnershipStore(format!("Failed to remove owner: {}", e)))?;

        Ok(())
    }
}
