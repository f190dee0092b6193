//! Meter data ingestion.
//!
//! A request is turned into one [`IngestBatch`] and written atomically.
//! When the batch collides with stored measurements the write is rolled
//! back, and only a deployment in play mode replaces the stored rows.

use std::sync::Arc;

use bvp_core::sign::external_to_internal;
use bvp_core::{
    value_horizon, AddressScheme, AppConfig, AssetDirectory, AuthContext, Connection,
    DataSourceDirectory, ForecastingJob, IngestBatch, Measurement, MeterError, MetricKind,
    OperatingMode, PowerStore,
};
use tracing::{debug, info, warn};

use crate::resolver::AddressResolver;
use crate::validation::PostMeterDataRequest;

#[derive(Clone)]
pub struct IngestionPipeline {
    resolver: AddressResolver,
    data_sources: Arc<dyn DataSourceDirectory>,
    power: Arc<dyn PowerStore>,
    scheme: AddressScheme,
    mode: OperatingMode,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(
        assets: Arc<dyn AssetDirectory>,
        data_sources: Arc<dyn DataSourceDirectory>,
        power: Arc<dyn PowerStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            resolver: AddressResolver::new(assets),
            data_sources,
            power,
            scheme: AddressScheme::from(&config.addressing),
            mode: config.mode,
        }
    }

    #[must_use]
    pub const fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Validates, converts and stores a submission.
    ///
    /// # Errors
    /// - [`MeterError::InvalidSender`] if the caller has no data source
    /// - resolution and sign errors of any connection, before anything is written
    /// - [`MeterError::AlreadyReceivedAndSuccessfullyProcessed`] on a conflict
    ///   outside play mode
    /// - [`MeterError::Storage`] for any other storage failure, including a
    ///   failed replacement
    pub async fn run(
        &self,
        request: &PostMeterDataRequest,
        auth: &AuthContext,
    ) -> Result<(), MeterError> {
        info!(user_id = auth.user_id, "Posting power data");

        let data_source = self
            .data_sources
            .data_source_for_user(auth.user_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = auth.user_id, "User has no data source");
                MeterError::InvalidSender("You have no registered data source.".to_string())
            })?;

        let batch = self.build_batch(request, auth, data_source.id).await?;
        if batch.is_empty() {
            debug!("Nothing to store");
            return Ok(());
        }

        info!(
            measurements = batch.measurements.len(),
            jobs = batch.jobs.len(),
            "Saving to database"
        );
        self.store(&batch).await
    }

    async fn build_batch(
        &self,
        request: &PostMeterDataRequest,
        auth: &AuthContext,
        data_source_id: i64,
    ) -> Result<IngestBatch, MeterError> {
        let window = &request.window;
        let mut batch = IngestBatch::default();

        for (group, values) in request.connection_groups.iter().zip(&request.value_groups) {
            for address in group {
                let connection = self.resolver.resolve_connection(address, auth).await?;
                self.check_sign(&connection, values)?;
                let stored = external_to_internal(values);

                let n = stored.len();
                let mut end = window.start;
                for (j, value) in stored.into_iter().enumerate() {
                    let datetime = window.slot_start(j, n);
                    batch.measurements.push(Measurement {
                        datetime,
                        value,
                        horizon: value_horizon(window, j, n, request.rolling, request.horizon),
                        asset_id: connection.id,
                        data_source_id,
                    });
                    end = datetime;
                }

                if end > window.start {
                    batch.jobs.push(ForecastingJob {
                        metric_kind: MetricKind::Power,
                        asset_id: connection.id,
                        start: window.start,
                        end,
                    });
                }
            }
        }

        Ok(batch)
    }

    /// Values are in the USEF convention: consumption is positive.
    fn check_sign(&self, connection: &Connection, values: &[f64]) -> Result<(), MeterError> {
        if connection.is_pure_consumer && values.iter().any(|v| *v < 0.0) {
            return Err(MeterError::PowerValueTooSmall(format!(
                "Connection {} is registered as a pure consumer and can only receive non-negative values.",
                connection.entity_address(&self.scheme)
            )));
        }
        if connection.is_pure_producer && values.iter().any(|v| *v > 0.0) {
            return Err(MeterError::PowerValueTooBig(format!(
                "Connection {} is registered as a pure producer and can only receive non-positive values.",
                connection.entity_address(&self.scheme)
            )));
        }
        Ok(())
    }

    async fn store(&self, batch: &IngestBatch) -> Result<(), MeterError> {
        match self.power.bulk_insert(batch).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_unique_violation() => {
                warn!(error = %e, "Measurements already stored");
                if !self.mode.permits_replay() {
                    return Err(MeterError::AlreadyReceivedAndSuccessfullyProcessed(
                        String::new(),
                    ));
                }
                info!(mode = %self.mode, "Replacing stored measurements");
                self.power.merge_write(batch).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{connection, InMemoryStore};
    use bvp_core::{DataSource, Window};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const CS1: &str = "ea1.2018-06.com.a1-bvp:1:1";
    const CONSUMER: &str = "ea1.2018-06.com.a1-bvp:1:2";
    const PRODUCER: &str = "ea1.2018-06.com.a1-bvp:1:3";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap()
    }

    fn store() -> Arc<InMemoryStore> {
        let mut consumer = connection(2, "CS 2", 1);
        consumer.is_pure_consumer = true;
        let mut producer = connection(3, "CS 3", 1);
        producer.is_pure_producer = true;
        Arc::new(
            InMemoryStore::default()
                .with_connection(connection(1, "CS 1", 1))
                .with_connection(consumer)
                .with_connection(producer)
                .with_connection(connection(4, "CS 4", 2))
                .with_data_source(DataSource {
                    id: 10,
                    name: "MDC".to_string(),
                    user_id: Some(1),
                }),
        )
    }

    fn pipeline(store: &Arc<InMemoryStore>, mode: OperatingMode) -> IngestionPipeline {
        let config = AppConfig {
            mode,
            ..AppConfig::default()
        };
        IngestionPipeline::new(store.clone(), store.clone(), store.clone(), &config)
    }

    fn request(
        groups: Vec<(Vec<&str>, Vec<f64>)>,
        horizon: Duration,
        rolling: bool,
    ) -> PostMeterDataRequest {
        let (connection_groups, value_groups) = groups
            .into_iter()
            .map(|(c, v)| (c.into_iter().map(str::to_string).collect(), v))
            .unzip();
        PostMeterDataRequest {
            unit: "MW".to_string(),
            connection_groups,
            value_groups,
            window: Window::new(start(), Duration::hours(1)),
            horizon,
            rolling,
        }
    }

    #[tokio::test]
    async fn test_stores_translated_measurements_with_fixed_horizons() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Demo);
        let auth = pipeline.resolver().auth_context(1).await.unwrap();
        let req = request(
            vec![(vec![CS1], vec![300.0, 300.0, 301.0, 300.0])],
            Duration::hours(2),
            false,
        );
        pipeline.run(&req, &auth).await.unwrap();

        let stored = store.measurements();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[2].value, -301.0);
        assert_eq!(stored[2].datetime, start() + Duration::minutes(30));
        assert_eq!(stored[3].horizon, Duration::hours(2));
        assert_eq!(stored[0].horizon, Duration::minutes(75));
        assert!(stored.iter().all(|m| m.data_source_id == 10));

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].start, start());
        assert_eq!(jobs[0].end, start() + Duration::minutes(45));
    }

    #[tokio::test]
    async fn test_rolling_horizon_is_shared() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Demo);
        let auth = pipeline.resolver().auth_context(1).await.unwrap();
        let req = request(vec![(vec![CS1], vec![1.0, 2.0])], Duration::hours(-1), true);
        pipeline.run(&req, &auth).await.unwrap();
        assert!(store
            .measurements()
            .iter()
            .all(|m| m.horizon == Duration::hours(-1)));
    }

    #[tokio::test]
    async fn test_single_value_creates_no_job() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Demo);
        let auth = pipeline.resolver().auth_context(1).await.unwrap();
        let req = request(vec![(vec![CS1], vec![5.0])], Duration::zero(), false);
        pipeline.run(&req, &auth).await.unwrap();
        assert_eq!(store.measurements().len(), 1);
        assert!(store.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_consumer_rejects_negative_values_without_writes() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Demo);
        let auth = pipeline.resolver().auth_context(1).await.unwrap();
        let req = request(
            vec![
                (vec![CS1], vec![1.0, 1.0]),
                (vec![CONSUMER], vec![1.0, -1.0]),
            ],
            Duration::zero(),
            false,
        );
        let err = pipeline.run(&req, &auth).await.unwrap_err();
        assert_eq!(err.status(), "POWER_VALUE_TOO_SMALL");
        assert!(err.message().contains(CONSUMER));
        assert!(store.measurements().is_empty());
        assert!(store.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_producer_rejects_positive_values() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Demo);
        let auth = pipeline.resolver().auth_context(1).await.unwrap();
        let req = request(vec![(vec![PRODUCER], vec![-1.0, 0.5])], Duration::zero(), false);
        let err = pipeline.run(&req, &auth).await.unwrap_err();
        assert_eq!(err.status(), "POWER_VALUE_TOO_BIG");
        assert!(store.measurements().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_submission_in_strict_mode() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Live);
        let auth = pipeline.resolver().auth_context(1).await.unwrap();
        let first = request(vec![(vec![CS1], vec![1.0, 2.0])], Duration::zero(), false);
        pipeline.run(&first, &auth).await.unwrap();

        let second = request(vec![(vec![CS1], vec![7.0, 8.0])], Duration::zero(), false);
        let err = pipeline.run(&second, &auth).await.unwrap_err();
        assert_eq!(err.status(), "ALREADY_RECEIVED_AND_SUCCESSFULLY_PROCESSED");

        let values: Vec<f64> = store.measurements().iter().map(|m| m.value).collect();
        assert_eq!(values, vec![-1.0, -2.0]);
    }

    #[tokio::test]
    async fn test_duplicate_submission_in_play_mode_replaces() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Play);
        let auth = pipeline.resolver().auth_context(1).await.unwrap();
        let first = request(vec![(vec![CS1], vec![1.0, 2.0])], Duration::zero(), false);
        pipeline.run(&first, &auth).await.unwrap();

        let second = request(vec![(vec![CS1], vec![7.0, 8.0])], Duration::zero(), false);
        pipeline.run(&second, &auth).await.unwrap();

        let values: Vec<f64> = store.measurements().iter().map(|m| m.value).collect();
        assert_eq!(values, vec![-7.0, -8.0]);
    }

    #[tokio::test]
    async fn test_caller_without_data_source_is_invalid_sender() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Demo);
        let auth = pipeline.resolver().auth_context(2).await.unwrap();
        let req = request(
            vec![(vec!["ea1.2018-06.com.a1-bvp:2:4"], vec![1.0])],
            Duration::zero(),
            false,
        );
        let err = pipeline.run(&req, &auth).await.unwrap_err();
        assert_eq!(err.status(), "INVALID_SENDER");
    }

    #[tokio::test]
    async fn test_empty_value_group_is_a_no_op() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Demo);
        let auth = pipeline.resolver().auth_context(1).await.unwrap();
        let req = request(vec![(vec![CS1], vec![])], Duration::zero(), false);
        pipeline.run(&req, &auth).await.unwrap();
        assert!(store.measurements().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_connection_aborts() {
        let store = store();
        let pipeline = pipeline(&store, OperatingMode::Demo);
        let auth = pipeline.resolver().auth_context(1).await.unwrap();
        let req = request(
            vec![
                (vec![CS1], vec![1.0]),
                (vec!["ea1.2018-06.com.a1-bvp:2:4"], vec![1.0]),
            ],
            Duration::zero(),
            false,
        );
        let err = pipeline.run(&req, &auth).await.unwrap_err();
        assert_eq!(err.status(), "UNRECOGNIZED_CONNECTION_GROUP");
        assert!(store.measurements().is_empty());
    }
}
