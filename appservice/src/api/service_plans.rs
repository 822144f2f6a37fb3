//! `Microsoft.Web/serverfarms`, read only

use super::client::Client;
use super::common::{ApiQueryParams, SkuDescription, WEB_API_VERSION};
use super::error::ApiError;
use crate::ids::ServicePlanId;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppServicePlan {
    pub id: Option<String>,
    pub kind: Option<String>,
    pub location: Option<String>,
    pub sku: Option<SkuDescription>,
}

impl AppServicePlan {
    pub fn sku_name(&self) -> &str {
        self.sku
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .unwrap_or_default()
    }
}

pub struct ServicePlansApi<'a> {
    client: &'a Client,
}

impl<'a> ServicePlansApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /serverfarms/{name}
    pub async fn get(&self, id: &ServicePlanId) -> Result<AppServicePlan, ApiError> {
        let path = format!(
            "{}{}",
            id,
            ApiQueryParams::api_version(WEB_API_VERSION).to_query_string()
        );
        self.client.get(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn get_plan_reads_sku() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock(
                "GET",
                "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Web/serverFarms/plan",
            )
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id":"x","kind":"linux","sku":{"name":"F1","tier":"Free"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let id = ServicePlanId::parse(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Web/serverfarms/plan",
        )
        .unwrap();
        let plan = client.service_plans().get(&id).await.unwrap();
        assert_eq!(plan.sku_name(), "F1");
    }
}
