//! Meter data queries.

use std::collections::HashMap;
use std::sync::Arc;

use bvp_core::series::bin_count;
use bvp_core::sign::internal_to_external;
use bvp_core::{
    compact, format_duration, AddressScheme, AppConfig, AssetDirectory, AuthContext,
    CompactedGroups, Connection, DataSourceDirectory, MeterError, PowerQuery, PowerStore,
    SourceFilter, SourceSelection,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::resolver::AddressResolver;
use crate::validation::{GetMeterDataRequest, SourceRef};

/// Body of a successful meter data query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterDataResponse {
    #[serde(flatten)]
    pub groups: CompactedGroups<String>,
    pub start: String,
    pub duration: String,
    pub unit: String,
}

/// Reads meter data for the caller's connections.
#[derive(Clone)]
pub struct QueryPipeline {
    resolver: AddressResolver,
    data_sources: Arc<dyn DataSourceDirectory>,
    power: Arc<dyn PowerStore>,
    scheme: AddressScheme,
    default_preferred_source: String,
}

impl QueryPipeline {
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
            default_preferred_source: config.sources.default_preferred.clone(),
        }
    }

    #[must_use]
    pub const fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Runs a validated query.
    ///
    /// Every requested connection becomes its own group before compaction,
    /// so connections with identical values are merged in the response.
    ///
    /// # Errors
    /// Aborts with the first address resolution failure, or a storage error.
    pub async fn run(
        &self,
        request: &GetMeterDataRequest,
        auth: &AuthContext,
    ) -> Result<MeterDataResponse, MeterError> {
        info!(
            user_id = auth.user_id,
            groups = request.connection_groups.len(),
            "Getting meter data"
        );

        let connections: Vec<Connection> = self
            .resolver
            .resolve_groups(&request.connection_groups, auth)
            .await?
            .into_iter()
            .flatten()
            .collect();

        let fetched: HashMap<String, Vec<f64>> = if connections.is_empty() {
            HashMap::new()
        } else {
            let query = PowerQuery {
                asset_names: connections.iter().map(|c| c.name.clone()).collect(),
                window: request.window,
                resolution: request.resolution,
                horizon_window: request.horizon_window,
                rolling: request.rolling,
                sources: self.source_selection(request.sources.as_deref()).await?,
            };
            self.power.fetch(&query).await?.into_iter().collect()
        };
        debug!(assets = fetched.len(), "Fetched power data");

        let bins = bin_count(&request.window, request.resolution);
        let mut connection_groups = Vec::with_capacity(connections.len());
        let mut value_groups = Vec::with_capacity(connections.len());
        for connection in connections {
            let values = fetched
                .get(&connection.name)
                .map_or_else(|| vec![f64::NAN; bins], |v| internal_to_external(v));
            connection_groups.push(vec![connection]);
            value_groups.push(values);
        }

        let groups = compact(connection_groups, value_groups)
            .map_connections(|connection| connection.entity_address(&self.scheme));

        Ok(MeterDataResponse {
            groups,
            start: request.window.start.to_rfc3339(),
            duration: format_duration(request.window.duration),
            unit: request.unit.clone(),
        })
    }

    /// Explicit sources are preferred exclusively. Otherwise the configured
    /// default source is preferred, falling back to any source.
    async fn source_selection(
        &self,
        sources: Option<&[SourceRef]>,
    ) -> Result<SourceSelection, MeterError> {
        let Some(sources) = sources else {
            let defaults = self
                .data_sources
                .data_sources_by_name(std::slice::from_ref(&self.default_preferred_source))
                .await?;
            let preferred = if defaults.is_empty() {
                SourceFilter::All
            } else {
                SourceFilter::Only(defaults.into_iter().map(|d| d.id).collect())
            };
            return Ok(SourceSelection {
                preferred,
                fallback: Some(SourceFilter::All),
            });
        };

        let mut ids = Vec::new();
        let mut names = Vec::new();
        for source in sources {
            match source {
                SourceRef::Id(id) => ids.push(*id),
                SourceRef::Name(name) => names.push(name.clone()),
            }
        }
        if !names.is_empty() {
            let found = self.data_sources.data_sources_by_name(&names).await?;
            ids.extend(found.into_iter().map(|d| d.id));
        }

        Ok(SourceSelection {
            preferred: SourceFilter::Only(ids),
            fallback: None,
        })
    }
}
