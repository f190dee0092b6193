use bvp_core::Connection;
use serde::{Deserialize, Serialize};

/// A metered asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssetRecord {
    pub id: i64,
    /// Unique internal name used as the series key
    pub name: String,
    pub display_name: String,
    /// User owning the asset, part of its entity address
    pub owner_id: i64,
    pub capacity_in_mw: f64,
    pub is_pure_consumer: bool,
    pub is_pure_producer: bool,
}

impl From<AssetRecord> for Connection {
    fn from(record: AssetRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            owner_id: record.owner_id,
            is_pure_consumer: record.is_pure_consumer,
            is_pure_producer: record.is_pure_producer,
        }
    }
}

/// Fields for registering an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAsset {
    pub id: Option<i64>,
    pub name: String,
    pub display_name: String,
    pub owner_id: i64,
    pub capacity_in_mw: f64,
    pub is_pure_consumer: bool,
    pub is_pure_producer: bool,
}

impl NewAsset {
    #[must_use]
    pub fn new(name: impl Into<String>, owner_id: i64) -> Self {
        let name = name.into();
        Self {
            id: None,
            display_name: name.clone(),
            name,
            owner_id,
            capacity_in_mw: 0.0,
            is_pure_consumer: false,
            is_pure_producer: false,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn pure_consumer(mut self) -> Self {
        self.is_pure_consumer = true;
        self.is_pure_producer = false;
        self
    }

    #[must_use]
    pub fn pure_producer(mut self) -> Self {
        self.is_pure_producer = true;
        self.is_pure_consumer = false;
        self
    }
}
