// Database models for the subscription store
use tiberius::Row;

use crate::error::{GatewayError, GatewayResult};

/// Row of `[dbo].[Subscriptions]` as far as the gateway cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub purchaser_tenant_id: String,
    pub is_active: bool,
}

impl TryFrom<&Row> for Subscription {
    type Error = GatewayError;

    fn try_from(row: &Row) -> GatewayResult<Self> {
        let purchaser_tenant_id = row
            .try_get::<&str, _>("PurchaserTenantId")?
            .unwrap_or_default()
            .to_string();
        let is_active = row.try_get::<bool, _>("IsActive")?.unwrap_or(false);

        Ok(Subscription {
            purchaser_tenant_id,
            is_active,
        })
    }
}
