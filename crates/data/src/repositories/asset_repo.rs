//! Asset repository.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use bvp_core::{AssetDirectory, Connection, StoreError};
use sqlx::SqlitePool;

use super::store_error;
use crate::models::{AssetRecord, NewAsset};

/// Repository for asset operations.
#[derive(Debug, Clone)]
pub struct AssetRepository {
    pool: SqlitePool,
}

impl AssetRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers an asset and returns its id.
    ///
    /// # Errors
    /// Returns an error if the name is taken or the database operation fails.
    pub async fn insert(&self, asset: &NewAsset) -> Result<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO asset
                (id, name, display_name, owner_id, capacity_in_mw,
                 is_pure_consumer, is_pure_producer)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(asset.id)
        .bind(&asset.name)
        .bind(&asset.display_name)
        .bind(asset.owner_id)
        .bind(asset.capacity_in_mw)
        .bind(asset.is_pure_consumer)
        .bind(asset.is_pure_producer)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Gets an asset by id.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: i64) -> Result<Option<AssetRecord>> {
        let record = sqlx::query_as::<_, AssetRecord>(
            r"
            SELECT id, name, display_name, owner_id, capacity_in_mw,
                   is_pure_consumer, is_pure_producer
            FROM asset
            WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Gets an asset by its unique name.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<AssetRecord>> {
        let record = sqlx::query_as::<_, AssetRecord>(
            r"
            SELECT id, name, display_name, owner_id, capacity_in_mw,
                   is_pure_consumer, is_pure_producer
            FROM asset
            WHERE name = ?1
            ",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Lists the assets owned by a user.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<AssetRecord>> {
        let records = sqlx::query_as::<_, AssetRecord>(
            r"
            SELECT id, name, display_name, owner_id, capacity_in_mw,
                   is_pure_consumer, is_pure_producer
            FROM asset
            WHERE owner_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl AssetDirectory for AssetRepository {
    async fn connection_by_id(&self, asset_id: i64) -> Result<Option<Connection>, StoreError> {
        let record = sqlx::query_as::<_, AssetRecord>(
            r"
            SELECT id, name, display_name, owner_id, capacity_in_mw,
                   is_pure_consumer, is_pure_producer
            FROM asset
            WHERE id = ?1
            ",
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(record.map(Connection::from))
    }

    async fn connection_ids_for_owner(&self, user_id: i64) -> Result<HashSet<i64>, StoreError> {
        let rows = sqlx::query_as::<_, (i64,)>("SELECT id FROM asset WHERE owner_id = ?1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
