//! In-memory storage used by the pipeline unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bvp_core::{
    resample, AssetDirectory, Connection, DataSource, DataSourceDirectory, ForecastingJob,
    IngestBatch, Measurement, Observation, PowerQuery, PowerStore, StoreError,
};
use chrono::{DateTime, Utc};

#[derive(Default)]
pub(crate) struct InMemoryStore {
    connections: Vec<Connection>,
    data_sources: Vec<DataSource>,
    power: Mutex<BTreeMap<(DateTime<Utc>, i64), Measurement>>,
    jobs: Mutex<Vec<ForecastingJob>>,
}

impl InMemoryStore {
    pub(crate) fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    pub(crate) fn with_data_source(mut self, data_source: DataSource) -> Self {
        self.data_sources.push(data_source);
        self
    }

    pub(crate) fn measurements(&self) -> Vec<Measurement> {
        self.power.lock().unwrap().values().cloned().collect()
    }

    pub(crate) fn jobs(&self) -> Vec<ForecastingJob> {
        self.jobs.lock().unwrap().clone()
    }
}

pub(crate) fn connection(id: i64, name: &str, owner_id: i64) -> Connection {
    Connection {
        id,
        name: name.to_string(),
        owner_id,
        is_pure_consumer: false,
        is_pure_producer: false,
    }
}

#[async_trait]
impl AssetDirectory for InMemoryStore {
    async fn connection_by_id(&self, asset_id: i64) -> Result<Option<Connection>, StoreError> {
        Ok(self.connections.iter().find(|c| c.id == asset_id).cloned())
    }

    async fn connection_ids_for_owner(&self, user_id: i64) -> Result<HashSet<i64>, StoreError> {
        Ok(self
            .connections
            .iter()
            .filter(|c| c.owner_id == user_id)
            .map(|c| c.id)
            .collect())
    }
}

#[async_trait]
impl DataSourceDirectory for InMemoryStore {
    async fn data_source_for_user(&self, user_id: i64) -> Result<Option<DataSource>, StoreError> {
        Ok(self
            .data_sources
            .iter()
            .find(|d| d.user_id == Some(user_id))
            .cloned())
    }

    async fn data_sources_by_name(&self, names: &[String]) -> Result<Vec<DataSource>, StoreError> {
        Ok(self
            .data_sources
            .iter()
            .filter(|d| names.contains(&d.name))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PowerStore for InMemoryStore {
    async fn fetch(&self, query: &PowerQuery) -> Result<Vec<(String, Vec<f64>)>, StoreError> {
        let power = self.power.lock().unwrap();
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for name in &query.asset_names {
            if !seen.insert(name.clone()) {
                continue;
            }
            let asset_id = self.connections.iter().find(|c| &c.name == name).map(|c| c.id);
            let observations: Vec<Observation> = power
                .values()
                .filter(|m| Some(m.asset_id) == asset_id)
                .filter(|m| m.datetime >= query.window.start && m.datetime < query.window.end())
                .map(|m| Observation {
                    datetime: m.datetime,
                    value: m.value,
                    horizon: m.horizon,
                    data_source_id: m.data_source_id,
                })
                .collect();
            let values = resample(
                &observations,
                &query.window,
                query.resolution,
                &query.horizon_window,
                query.rolling,
                &query.sources,
            );
            result.push((name.clone(), values));
        }
        Ok(result)
    }

    async fn bulk_insert(&self, batch: &IngestBatch) -> Result<(), StoreError> {
        let mut power = self.power.lock().unwrap();
        let mut keys = HashSet::new();
        for m in &batch.measurements {
            let key = (m.datetime, m.asset_id);
            if power.contains_key(&key) || !keys.insert(key) {
                return Err(StoreError::UniqueViolation {
                    detail: format!("power ({}, {})", m.datetime, m.asset_id),
                });
            }
        }
        for m in &batch.measurements {
            power.insert((m.datetime, m.asset_id), m.clone());
        }
        self.jobs.lock().unwrap().extend(batch.jobs.iter().cloned());
        Ok(())
    }

    async fn merge_write(&self, batch: &IngestBatch) -> Result<(), StoreError> {
        let mut power = self.power.lock().unwrap();
        for m in &batch.measurements {
            power.insert((m.datetime, m.asset_id), m.clone());
        }
        self.jobs.lock().unwrap().extend(batch.jobs.iter().cloned());
        Ok(())
    }
}
