//! Subscription lookups.
//!
//! Route handlers depend on the [`SubscriptionRepository`] trait so the
//! backing store can be swapped (Azure SQL in production, fakes in tests).

use async_trait::async_trait;

use crate::db::SqlConnector;
use crate::error::GatewayResult;
use crate::models::Subscription;

/// Active subscriptions purchased by a tenant. The tenant id is bound as
/// `@P1` and never spliced into the statement.
pub const ACTIVE_SUBSCRIPTIONS_BY_TENANT: &str = "SELECT \
     CAST(PurchaserTenantId AS NVARCHAR(64)) AS PurchaserTenantId, \
     CAST(IsActive AS BIT) AS IsActive \
     FROM [dbo].[Subscriptions] \
     WHERE PurchaserTenantId = @P1 AND IsActive = 1";

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Active subscriptions whose purchaser tenant matches `tenant_id`.
    async fn find_active_by_tenant(&self, tenant_id: &str) -> GatewayResult<Vec<Subscription>>;
}

/// Azure SQL backed repository. Opens one connection per lookup.
pub struct SqlSubscriptionRepository {
    connector: SqlConnector,
}

impl SqlSubscriptionRepository {
    pub fn new(connector: SqlConnector) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl SubscriptionRepository for SqlSubscriptionRepository {
    async fn find_active_by_tenant(&self, tenant_id: &str) -> GatewayResult<Vec<Subscription>> {
        let mut client = self.connector.get_connection().await?;

        let result = query_active(&mut client, tenant_id).await;
        self.connector.release(client).await;

        let subscriptions = result?;
        tracing::debug!(
            "Found {} active subscription(s) for tenant {}",
            subscriptions.len(),
            tenant_id
        );
        Ok(subscriptions)
    }
}

async fn query_active(
    client: &mut crate::db::SqlClient,
    tenant_id: &str,
) -> GatewayResult<Vec<Subscription>> {
    let rows = client
        .query(ACTIVE_SUBSCRIPTIONS_BY_TENANT, &[&tenant_id])
        .await?
        .into_first_result()
        .await?;

    rows.iter().map(Subscription::try_from).collect()
}
