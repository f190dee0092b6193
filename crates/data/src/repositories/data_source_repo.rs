//! Data source repository.

use anyhow::Result;
use async_trait::async_trait;
use bvp_core::{DataSource, DataSourceDirectory, StoreError};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::store_error;
use crate::models::DataSourceRecord;

#[derive(Debug, Clone)]
pub struct DataSourceRepository {
    pool: SqlitePool,
}

impl DataSourceRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a data source and returns its id.
    ///
    /// # Errors
    /// Returns an error if the user already has a data source or the
    /// database operation fails.
    pub async fn insert(&self, name: &str, source_type: &str, user_id: Option<i64>) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO data_source (name, source_type, user_id) VALUES (?1, ?2, ?3)",
        )
        .bind(name)
        .bind(source_type)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Lists all data sources.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<DataSourceRecord>> {
        let records = sqlx::query_as::<_, DataSourceRecord>(
            "SELECT id, name, source_type, user_id FROM data_source ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl DataSourceDirectory for DataSourceRepository {
    async fn data_source_for_user(&self, user_id: i64) -> Result<Option<DataSource>, StoreError> {
        let record = sqlx::query_as::<_, DataSourceRecord>(
            "SELECT id, name, source_type, user_id FROM data_source WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(record.map(DataSource::from))
    }

    async fn data_sources_by_name(&self, names: &[String]) -> Result<Vec<DataSource>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, source_type, user_id FROM data_source WHERE name IN (");
        let mut separated = builder.separated(", ");
        for name in names {
            separated.push_bind(name.as_str());
        }
        separated.push_unseparated(") ORDER BY id ASC");

        let records = builder
            .build_query_as::<DataSourceRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(records.into_iter().map(DataSource::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabaseClient;

    #[tokio::test]
    async fn test_data_source_for_user() {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        let repo = db.repositories().data_sources;
        let id = repo.insert("MDC", "meter data company", Some(3)).await.unwrap();

        let source = repo.data_source_for_user(3).await.unwrap().unwrap();
        assert_eq!(source.id, id);
        assert_eq!(source.name, "MDC");
        assert!(repo.data_source_for_user(4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_data_source_per_user() {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        let repo = db.repositories().data_sources;
        repo.insert("MDC", "script", Some(3)).await.unwrap();
        assert!(repo.insert("Other", "script", Some(3)).await.is_err());
    }

    #[tokio::test]
    async fn test_data_sources_by_name() {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        let repo = db.repositories().data_sources;
        let mdc = repo.insert("MDC", "script", Some(1)).await.unwrap();
        repo.insert("Prosumer", "script", Some(2)).await.unwrap();

        let found = repo
            .data_sources_by_name(&["MDC".to_string(), "Unknown".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, mdc);
        assert!(repo.data_sources_by_name(&[]).await.unwrap().is_empty());
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }
}
