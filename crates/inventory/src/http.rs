use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use cartstore_core::config::InventoryConfig;
use cartstore_core::errors::InventoryError;
use cartstore_core::ports::InventoryClient;
use cartstore_core::{Product, ProductId, StockInfo};

pub struct HttpInventoryClient {
    client: Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl HttpInventoryClient {
    pub fn new(config: &InventoryConfig) -> Result<Self, InventoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| InventoryError::Network(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues a `GET` against the base URL and reports the HTTP status. Any
    /// response, including 404, counts as reachable.
    pub async fn probe(&self) -> Result<u16, InventoryError> {
        let mut request = self.client.get(&self.base_url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }
        let response =
            request.send().await.map_err(|error| InventoryError::Network(error.to_string()))?;
        Ok(response.status().as_u16())
    }

    fn endpoint(&self, resource: &str, id: ProductId) -> String {
        format!("{}/{resource}/{id}", self.base_url)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        resource: &str,
        id: ProductId,
    ) -> Result<T, InventoryError> {
        let url = self.endpoint(resource, id);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            warn!(
                event_name = "inventory.request.failed",
                url = %url,
                error = %error,
                "inventory request could not be completed"
            );
            InventoryError::Network(error.to_string())
        })?;

        let status = response.status();
        debug!(event_name = "inventory.request.completed", url = %url, status = status.as_u16());

        if status == StatusCode::NOT_FOUND {
            return Err(InventoryError::NotFound(id));
        }
        if !status.is_success() {
            return Err(InventoryError::Status { status: status.as_u16(), url });
        }

        response.json::<T>().await.map_err(|error| InventoryError::Decode(error.to_string()))
    }
}

#[async_trait::async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn get_product(&self, id: ProductId) -> Result<Product, InventoryError> {
        self.fetch("products", id).await
    }

    async fn get_stock(&self, id: ProductId) -> Result<StockInfo, InventoryError> {
        self.fetch("stock", id).await
    }
}
