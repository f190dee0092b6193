pub mod address;
pub mod compaction;
pub mod config;
pub mod config_loader;
pub mod duration;
pub mod error;
pub mod horizon;
pub mod series;
pub mod sign;
pub mod traits;
pub mod types;

pub use address::{parse_entity_address, AddressScheme, EntityAddress, EntityType};
pub use compaction::{compact, CompactedGroups, GroupEntry};
pub use config::{
    AddressingConfig, AppConfig, DatabaseConfig, OperatingMode, ServerConfig, SourcesConfig,
};
pub use config_loader::ConfigLoader;
pub use duration::{format_duration, parse_duration, parse_horizon, DurationParseError};
pub use error::{MeterError, StoreError};
pub use horizon::{value_horizon, HorizonWindow, Window};
pub use series::{resample, Observation};
pub use traits::{AssetDirectory, DataSourceDirectory, PowerStore};
pub use types::{
    AuthContext, Connection, DataSource, ForecastingJob, IngestBatch, Measurement, MetricKind,
    PowerQuery, SourceFilter, SourceSelection,
};
