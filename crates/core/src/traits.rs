use crate::error::StoreError;
use crate::types::{Connection, DataSource, IngestBatch, PowerQuery};
use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
pub trait AssetDirectory: Send + Sync {
    async fn connection_by_id(&self, asset_id: i64) -> Result<Option<Connection>, StoreError>;

    /// Ids of the connections owned by `user_id`.
    async fn connection_ids_for_owner(&self, user_id: i64) -> Result<HashSet<i64>, StoreError>;
}

#[async_trait]
pub trait DataSourceDirectory: Send + Sync {
    async fn data_source_for_user(&self, user_id: i64) -> Result<Option<DataSource>, StoreError>;

    async fn data_sources_by_name(&self, names: &[String]) -> Result<Vec<DataSource>, StoreError>;
}

#[async_trait]
pub trait PowerStore: Send + Sync {
    /// Reads resampled values for every requested asset, in request order.
    async fn fetch(&self, query: &PowerQuery) -> Result<Vec<(String, Vec<f64>)>, StoreError>;

    /// Inserts the batch in one transaction. A duplicate `(datetime, asset_id)`
    /// rolls the transaction back and yields [`StoreError::UniqueViolation`].
    async fn bulk_insert(&self, batch: &IngestBatch) -> Result<(), StoreError>;

    /// Writes the batch in one transaction, replacing conflicting rows.
    async fn merge_write(&self, batch: &IngestBatch) -> Result<(), StoreError>;
}
