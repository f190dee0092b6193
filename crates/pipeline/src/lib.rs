//! Request pipelines for USEF meter data.
//!
//! Raw messages are validated into typed requests by [`validation`], then
//! executed by the [`QueryPipeline`] or the [`IngestionPipeline`] against
//! the storage traits of `bvp-core`.

pub mod ingestion;
pub mod query;
pub mod resolver;
pub mod services;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use ingestion::IngestionPipeline;
pub use query::{MeterDataResponse, QueryPipeline};
pub use resolver::AddressResolver;
pub use services::{get_service_response, v1_service_listing, Service, ServiceListing};
pub use validation::{
    form_from_query, parse_get_request, parse_post_request, GetMeterDataRequest,
    PostMeterDataRequest, SourceRef,
};
