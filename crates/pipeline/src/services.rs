//! Service listing of the public API.

use bvp_core::MeterError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub name: String,
    pub access: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceListing {
    pub version: String,
    pub services: Vec<Service>,
}

fn service(name: &str, access: &[&str], description: &str) -> Service {
    Service {
        name: name.to_string(),
        access: access.iter().map(|r| (*r).to_string()).collect(),
        description: description.to_string(),
    }
}

#[must_use]
pub fn v1_service_listing() -> ServiceListing {
    ServiceListing {
        version: "1.0".to_string(),
        services: vec![
            service(
                "getMeterData",
                &["Aggregator", "Supplier", "MDC", "DSO", "Prosumer", "ESCo"],
                "Request meter reading",
            ),
            service("postMeterData", &["MDC"], "Send meter reading"),
        ],
    }
}

/// Lists all services, or only those open to `access_role`.
///
/// # Errors
/// Returns [`MeterError::InvalidRole`] when no service is open to the role.
pub fn get_service_response(
    listing: &ServiceListing,
    access_role: Option<&str>,
) -> Result<ServiceListing, MeterError> {
    let Some(role) = access_role else {
        return Ok(listing.clone());
    };

    let services: Vec<Service> = listing
        .services
        .iter()
        .filter(|s| s.access.iter().any(|a| a == role))
        .cloned()
        .collect();
    if services.is_empty() {
        return Err(MeterError::InvalidRole(role.to_string()));
    }

    Ok(ServiceListing {
        version: listing.version.clone(),
        services,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_listing() {
        let listing = v1_service_listing();
        let response = get_service_response(&listing, None).unwrap();
        assert_eq!(response.services.len(), 2);
        assert_eq!(response.version, "1.0");
    }

    #[test]
    fn test_filter_by_role() {
        let listing = v1_service_listing();
        let response = get_service_response(&listing, Some("Prosumer")).unwrap();
        assert_eq!(response.services.len(), 1);
        assert_eq!(response.services[0].name, "getMeterData");

        let response = get_service_response(&listing, Some("MDC")).unwrap();
        assert_eq!(response.services.len(), 2);
    }

    #[test]
    fn test_unknown_role() {
        let err = get_service_response(&v1_service_listing(), Some("Baker")).unwrap_err();
        assert_eq!(err.status(), "INVALID_ROLE");
        assert!(err.message().ends_with("Baker"));
    }
}
