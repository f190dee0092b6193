//! Resolution of entity addresses to the caller's connections.

use std::sync::Arc;

use bvp_core::{
    parse_entity_address, AssetDirectory, AuthContext, Connection, EntityAddress, EntityType,
    MeterError,
};
use tracing::{error, info, warn};

/// Resolves connection addresses against an asset directory, restricted to
/// the connections the caller is authorized for.
#[derive(Clone)]
pub struct AddressResolver {
    assets: Arc<dyn AssetDirectory>,
}

impl AddressResolver {
    #[must_use]
    pub fn new(assets: Arc<dyn AssetDirectory>) -> Self {
        Self { assets }
    }

    /// Builds the authorization context of `user_id`: every connection it owns.
    ///
    /// # Errors
    /// Returns [`MeterError::Storage`] if the directory lookup fails.
    pub async fn auth_context(&self, user_id: i64) -> Result<AuthContext, MeterError> {
        let ids = self.assets.connection_ids_for_owner(user_id).await?;
        if ids.is_empty() {
            info!(user_id, "User doesn't seem to have any assets");
        }
        Ok(AuthContext {
            user_id,
            authorized_connection_ids: ids,
        })
    }

    /// Parses `address` as an entity of `entity_type`.
    ///
    /// # Errors
    /// Returns [`MeterError::InvalidDomain`] if the address does not parse.
    pub fn parse(address: &str, entity_type: EntityType) -> Result<EntityAddress, MeterError> {
        parse_entity_address(address, entity_type).ok_or_else(|| {
            warn!(address, %entity_type, "Cannot parse this entity address");
            MeterError::InvalidDomain(String::new())
        })
    }

    /// Resolves a connection address to the stored connection.
    ///
    /// # Errors
    /// - [`MeterError::InvalidDomain`] if the address does not parse
    /// - [`MeterError::UnrecognizedConnectionGroup`] if the connection is not
    ///   authorized for the caller or missing from storage
    /// - [`MeterError::Storage`] if the directory lookup fails
    pub async fn resolve_connection(
        &self,
        address: &str,
        auth: &AuthContext,
    ) -> Result<Connection, MeterError> {
        let EntityAddress::Connection { asset_id, .. } =
            Self::parse(address, EntityType::Connection)?
        else {
            return Err(MeterError::InvalidDomain(String::new()));
        };

        if !auth.is_authorized(asset_id) {
            warn!(address, asset_id, user_id = auth.user_id, "Cannot identify connection");
            return Err(MeterError::UnrecognizedConnectionGroup(String::new()));
        }

        match self.assets.connection_by_id(asset_id).await? {
            Some(connection) => Ok(connection),
            None => {
                error!(
                    asset_id,
                    user_id = auth.user_id,
                    "Authorized connection is missing from storage"
                );
                Err(MeterError::UnrecognizedConnectionGroup(String::new()))
            }
        }
    }

    /// Resolves every address of every group, stopping at the first failure.
    ///
    /// # Errors
    /// Returns the failure of the first unresolvable address.
    pub async fn resolve_groups(
        &self,
        groups: &[Vec<String>],
        auth: &AuthContext,
    ) -> Result<Vec<Vec<Connection>>, MeterError> {
        let mut resolved = Vec::with_capacity(groups.len());
        for group in groups {
            let mut connections = Vec::with_capacity(group.len());
            for address in group {
                connections.push(self.resolve_connection(address, auth).await?);
            }
            resolved.push(connections);
        }
        Ok(resolved)
    }
}
