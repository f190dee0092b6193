//! Error types for the metering pipelines.
//!
//! Every pipeline failure aborts the whole request and maps to one status in
//! the response catalog. The detail string is appended to the status's base
//! message when rendered.

use thiserror::Error;

/// Failures reported by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same unique key already exists.
    #[error("unique constraint violated: {detail}")]
    UniqueViolation { detail: String },

    /// Any other backend failure.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    #[must_use]
    pub const fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// Request-level failures of the query and ingestion pipelines.
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("invalid domain: {0}")]
    InvalidDomain(String),

    #[error("unrecognized connection group: {0}")]
    UnrecognizedConnectionGroup(String),

    #[error("power value too small: {0}")]
    PowerValueTooSmall(String),

    #[error("power value too big: {0}")]
    PowerValueTooBig(String),

    #[error("already received and successfully processed: {0}")]
    AlreadyReceivedAndSuccessfullyProcessed(String),

    #[error("invalid sender: {0}")]
    InvalidSender(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("no message type: {0}")]
    NoMessageType(String),

    #[error("invalid message type: {0}")]
    InvalidMessageType(String),

    #[error("invalid unit: {0}")]
    InvalidUnit(String),

    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid horizon: {0}")]
    InvalidHorizon(String),

    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("invalid PTU duration: {0}")]
    InvalidPtuDuration(String),

    #[error("PTUs incomplete: {0}")]
    PtusIncomplete(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl MeterError {
    /// Status code string of the response catalog.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::InvalidDomain(_) => "INVALID_DOMAIN",
            Self::UnrecognizedConnectionGroup(_) => "UNRECOGNIZED_CONNECTION_GROUP",
            Self::PowerValueTooSmall(_) => "POWER_VALUE_TOO_SMALL",
            Self::PowerValueTooBig(_) => "POWER_VALUE_TOO_BIG",
            Self::AlreadyReceivedAndSuccessfullyProcessed(_) => {
                "ALREADY_RECEIVED_AND_SUCCESSFULLY_PROCESSED"
            }
            Self::InvalidSender(_) => "INVALID_SENDER",
            Self::InvalidRole(_) => "INVALID_ROLE",
            Self::NoMessageType(_) => "NO_MESSAGE_TYPE",
            Self::InvalidMessageType(_) => "INVALID_MESSAGE_TYPE",
            Self::InvalidUnit(_) => "INVALID_UNIT",
            Self::InvalidPeriod(_) => "INVALID_PERIOD",
            Self::InvalidTimezone(_) => "INVALID_TIMEZONE",
            Self::InvalidHorizon(_) => "INVALID_HORIZON",
            Self::InvalidResolution(_) => "INVALID_RESOLUTION",
            Self::InvalidPtuDuration(_) => "INVALID_PTU_DURATION",
            Self::PtusIncomplete(_) => "PTUS_INCOMPLETE",
            Self::Storage(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Fixed part of the human-readable message.
    #[must_use]
    pub const fn base_message(&self) -> &'static str {
        match self {
            Self::InvalidDomain(_) => {
                "Connections, sensors and markets should be identified using the EA1 addressing \
                 scheme recommended by USEF. For example: \
                 'ea1.2018-06.com.a1-bvp:<owner-id>:<asset-id>' \
                 'ea1.2018-06.com.a1-bvp:temperature:<latitude>:<longitude>' \
                 'ea1.2018-06.com.a1-bvp:<market_name>'"
            }
            Self::UnrecognizedConnectionGroup(_) => {
                "One or more connections in your request were not found in your account."
            }
            Self::PowerValueTooSmall(_) => "One or more power values are too small.",
            Self::PowerValueTooBig(_) => "One or more power values are too big.",
            Self::AlreadyReceivedAndSuccessfullyProcessed(_) => {
                "Some of the data has already been received and successfully processed."
            }
            Self::InvalidSender(_) => "You don't have the right role to access this service.",
            Self::InvalidRole(_) => "No known services for specified role.",
            Self::NoMessageType(_) => "Request message should include 'type'.",
            Self::InvalidMessageType(_) => "Request message has the wrong type.",
            Self::InvalidUnit(_) => "Data is given in the wrong unit.",
            Self::InvalidPeriod(_) => "A time period in your request doesn't seem right.",
            Self::InvalidTimezone(_) => "Start time should explicitly state a timezone.",
            Self::InvalidHorizon(_) => "The prognosis horizon in your request could not be parsed.",
            Self::InvalidResolution(_) => "Only a 15 minute resolution is currently supported.",
            Self::InvalidPtuDuration(_) => {
                "Start time should be on the hour or a multiple of 15 minutes thereafter, \
                 duration should be some multiple N of 15 minutes, and \
                 the number of values should be some factor of N."
            }
            Self::PtusIncomplete(_) => "Missing values.",
            Self::Storage(_) => "The request could not be processed.",
        }
    }

    /// Request-specific extra information. Storage failures expose none.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::InvalidDomain(d)
            | Self::UnrecognizedConnectionGroup(d)
            | Self::PowerValueTooSmall(d)
            | Self::PowerValueTooBig(d)
            | Self::AlreadyReceivedAndSuccessfullyProcessed(d)
            | Self::InvalidSender(d)
            | Self::InvalidRole(d)
            | Self::NoMessageType(d)
            | Self::InvalidMessageType(d)
            | Self::InvalidUnit(d)
            | Self::InvalidPeriod(d)
            | Self::InvalidTimezone(d)
            | Self::InvalidHorizon(d)
            | Self::InvalidResolution(d)
            | Self::InvalidPtuDuration(d)
            | Self::PtusIncomplete(d) => d,
            Self::Storage(_) => "",
        }
    }

    /// Base message followed by the detail, if any.
    #[must_use]
    pub fn message(&self) -> String {
        let detail = self.detail();
        if detail.is_empty() {
            self.base_message().to_string()
        } else {
            format!("{} {detail}", self.base_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_message() {
        let err = MeterError::PowerValueTooSmall(
            "Connection ea1.2018-06.com.a1-bvp:1:2 is registered as a pure consumer.".to_string(),
        );
        assert_eq!(err.status(), "POWER_VALUE_TOO_SMALL");
        assert_eq!(
            err.message(),
            "One or more power values are too small. \
             Connection ea1.2018-06.com.a1-bvp:1:2 is registered as a pure consumer."
        );
    }

    #[test]
    fn test_empty_detail_renders_base_message_only() {
        let err = MeterError::UnrecognizedConnectionGroup(String::new());
        assert_eq!(
            err.message(),
            "One or more connections in your request were not found in your account."
        );
    }

    #[test]
    fn test_storage_errors_hide_backend_detail() {
        let err = MeterError::from(StoreError::Backend(anyhow::anyhow!("disk on fire")));
        assert_eq!(err.status(), "INTERNAL_SERVER_ERROR");
        assert_eq!(err.detail(), "");
    }

    #[test]
    fn test_unique_violation_is_distinguishable() {
        let err = StoreError::UniqueViolation {
            detail: "power.datetime, power.asset_id".to_string(),
        };
        assert!(err.is_unique_violation());
        assert!(!StoreError::Backend(anyhow::anyhow!("timeout")).is_unique_violation());
    }
}
