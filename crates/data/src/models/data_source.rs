use bvp_core::DataSource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DataSourceRecord {
    pub id: i64,
    pub name: String,
    pub source_type: String,
    pub user_id: Option<i64>,
}

impl From<DataSourceRecord> for DataSource {
    fn from(record: DataSourceRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            user_id: record.user_id,
        }
    }
}
