//! Entity addressing for connections, sensors and markets.
//!
//! Addresses follow the USEF EA1 scheme:
//!
//! ```text
//! ea1.2018-06.com.a1-bvp:<owner-id>:<asset-id>
//! ea1.2018-06.com.a1-bvp:<sensor-type>:<latitude>:<longitude>
//! ea1.2018-06.com.a1-bvp:<market-name>
//! ```
//!
//! Parsing is relative to the entity type the caller expects. A string that
//! does not match that type's grammar yields `None`, never a partial address.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AddressingConfig;

/// Kind of entity an address is expected to identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Connection,
    Sensor,
    Market,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Sensor => "sensor",
            Self::Market => "market",
        };
        f.write_str(name)
    }
}

/// A successfully parsed entity address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityAddress {
    Connection { owner_id: i64, asset_id: i64 },
    Sensor { sensor_type: String, lat: f64, lng: f64 },
    Market { name: String },
}

impl EntityAddress {
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Connection { .. } => EntityType::Connection,
            Self::Sensor { .. } => EntityType::Sensor,
            Self::Market { .. } => EntityType::Market,
        }
    }
}

/// Parses `address` as an entity of the given type.
#[must_use]
pub fn parse_entity_address(address: &str, entity_type: EntityType) -> Option<EntityAddress> {
    let (prefix, rest) = address.trim().split_once(':')?;
    if !is_valid_prefix(prefix) || rest.is_empty() {
        return None;
    }
    let parts: Vec<&str> = rest.split(':').collect();

    match (entity_type, parts.as_slice()) {
        (EntityType::Connection, [owner, asset]) => Some(EntityAddress::Connection {
            owner_id: parse_id(owner)?,
            asset_id: parse_id(asset)?,
        }),
        (EntityType::Sensor, [sensor_type, lat, lng]) => {
            if !is_name(sensor_type) {
                return None;
            }
            let lat: f64 = lat.parse().ok()?;
            let lng: f64 = lng.parse().ok()?;
            if !lat.is_finite() || !lng.is_finite() {
                return None;
            }
            Some(EntityAddress::Sensor {
                sensor_type: (*sensor_type).to_string(),
                lat,
                lng,
            })
        }
        (EntityType::Market, [name]) if is_name(name) => Some(EntityAddress::Market {
            name: (*name).to_string(),
        }),
        _ => None,
    }
}

/// `<scheme>.<YYYY>-<MM>.<reverse-domain>`
fn is_valid_prefix(prefix: &str) -> bool {
    let Some((scheme, authority)) = prefix.split_once('.') else {
        return false;
    };
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    let Some((date, domain)) = authority.split_once('.') else {
        return false;
    };
    let date = date.as_bytes();
    let date_ok = date.len() == 7
        && date[..4].iter().all(u8::is_ascii_digit)
        && date[4] == b'-'
        && date[5..].iter().all(u8::is_ascii_digit);
    date_ok && !domain.is_empty() && !domain.contains(char::is_whitespace)
}

fn parse_id(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && !s.contains(char::is_whitespace)
}

/// Builds connection addresses for the configured naming authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressScheme {
    scheme: String,
    naming_authority: String,
}

impl AddressScheme {
    #[must_use]
    pub fn new(scheme: impl Into<String>, naming_authority: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            naming_authority: naming_authority.into(),
        }
    }

    #[must_use]
    pub fn connection_address(&self, owner_id: i64, asset_id: i64) -> String {
        format!(
            "{}.{}:{owner_id}:{asset_id}",
            self.scheme, self.naming_authority
        )
    }
}

impl From<&AddressingConfig> for AddressScheme {
    fn from(config: &AddressingConfig) -> Self {
        Self::new(&config.scheme, &config.naming_authority)
    }
}

impl Default for AddressScheme {
    fn default() -> Self {
        Self::from(&AddressingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection() {
        let parsed = parse_entity_address("ea1.2018-06.com.a1-bvp:4:12", EntityType::Connection);
        assert_eq!(
            parsed,
            Some(EntityAddress::Connection {
                owner_id: 4,
                asset_id: 12
            })
        );
    }

    #[test]
    fn test_parse_sensor() {
        let parsed = parse_entity_address(
            "ea1.2018-06.com.a1-bvp:temperature:33.4843866:126.477859",
            EntityType::Sensor,
        )
        .unwrap();
        assert_eq!(parsed.entity_type(), EntityType::Sensor);
        match parsed {
            EntityAddress::Sensor { sensor_type, lat, lng } => {
                assert_eq!(sensor_type, "temperature");
                assert!((lat - 33.484_386_6).abs() < 1e-9);
                assert!((lng - 126.477_859).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_market() {
        assert_eq!(
            parse_entity_address("ea1.2018-06.com.a1-bvp:epex_da", EntityType::Market),
            Some(EntityAddress::Market {
                name: "epex_da".to_string()
            })
        );
    }

    #[test]
    fn test_type_mismatch_is_unparsable() {
        assert!(parse_entity_address("ea1.2018-06.com.a1-bvp:epex_da", EntityType::Connection).is_none());
        assert!(parse_entity_address("ea1.2018-06.com.a1-bvp:4:12", EntityType::Market).is_none());
        assert!(parse_entity_address("ea1.2018-06.com.a1-bvp:4:12", EntityType::Sensor).is_none());
    }

    #[test]
    fn test_malformed_connections() {
        for address in [
            "",
            "4:12",
            "ea1:4:12",
            "ea1.2018-06.com.a1-bvp:4",
            "ea1.2018-06.com.a1-bvp:4:12:7",
            "ea1.2018-06.com.a1-bvp:-4:12",
            "ea1.2018-06.com.a1-bvp:a:12",
            "ea1.18-06.com.a1-bvp:4:12",
            "ea1.2018-06.:4:12",
            "ea1.2018-06.com.a1-bvp::12",
        ] {
            assert!(
                parse_entity_address(address, EntityType::Connection).is_none(),
                "{address} should not parse"
            );
        }
    }

    #[test]
    fn test_connection_address_round_trips() {
        let scheme = AddressScheme::default();
        let address = scheme.connection_address(4, 12);
        assert_eq!(address, "ea1.2018-06.com.a1-bvp:4:12");
        assert_eq!(
            parse_entity_address(&address, EntityType::Connection),
            Some(EntityAddress::Connection {
                owner_id: 4,
                asset_id: 12
            })
        );
    }
}
