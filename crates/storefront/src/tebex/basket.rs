//! Tebex-backed basket handles.

use async_trait::async_trait;
use emberstone_core::PackageId;

use super::TebexClient;
use crate::basket::{Basket, BasketConnector, BasketData, BasketError};

/// One player's Tebex basket.
///
/// Remembers the ident of the basket it created and the last snapshot any
/// call returned.
#[derive(Debug)]
pub struct TebexBasket {
    client: TebexClient,
    username: Option<String>,
    ident: Option<String>,
    data: Option<BasketData>,
    initialized: bool,
}

impl TebexBasket {
    #[must_use]
    pub fn new(client: TebexClient, username: Option<&str>) -> Self {
        Self {
            client,
            username: username.map(str::to_owned),
            ident: None,
            data: None,
            initialized: false,
        }
    }

    fn require_ident(&self) -> Result<String, BasketError> {
        self.ident.clone().ok_or(BasketError::NoBasket)
    }

    fn store(&mut self, data: BasketData) {
        if let Some(ident) = &data.ident {
            self.ident = Some(ident.clone());
        }
        self.data = Some(data);
    }
}

#[async_trait]
impl Basket for TebexBasket {
    fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn basket_ident(&self) -> Option<&str> {
        self.ident.as_deref()
    }

    fn basket_data(&self) -> Option<&BasketData> {
        self.data.as_ref()
    }

    fn has_initialized_basket(&self) -> bool {
        self.initialized
    }

    async fn get_or_create_basket(
        &mut self,
        username: &str,
    ) -> Result<Option<String>, BasketError> {
        if let Some(ident) = &self.ident {
            return Ok(Some(ident.clone()));
        }

        let data = self.client.create_basket(username).await?;
        self.initialized = true;
        if self.username.is_none() {
            self.username = Some(username.to_string());
        }
        self.store(data);
        Ok(self.ident.clone())
    }

    async fn fetch_basket(&mut self, ident: &str) -> Result<BasketData, BasketError> {
        let data = self.client.get_basket(ident).await?;
        self.store(data.clone());
        Ok(data)
    }

    async fn add_package_to_basket(
        &mut self,
        package_id: &PackageId,
        quantity: u32,
    ) -> Result<(), BasketError> {
        let ident = self.require_ident()?;
        let data = self.client.add_package(&ident, package_id, quantity).await?;
        self.store(data);
        Ok(())
    }

    async fn remove_package_from_basket(
        &mut self,
        package_id: &PackageId,
    ) -> Result<(), BasketError> {
        let ident = self.require_ident()?;
        let data = self.client.remove_package(&ident, package_id).await?;
        self.store(data);
        Ok(())
    }
}

/// Hands out [`TebexBasket`]s when Tebex is configured.
#[derive(Debug, Clone, Default)]
pub struct TebexConnector {
    client: Option<TebexClient>,
}

impl TebexConnector {
    #[must_use]
    pub const fn new(client: Option<TebexClient>) -> Self {
        Self { client }
    }
}

impl BasketConnector for TebexConnector {
    fn connect(&self, username: Option<&str>) -> Option<Box<dyn Basket>> {
        let client = self.client.clone()?;
        Some(Box::new(TebexBasket::new(client, username)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::tebex::tests::config;

    #[test]
    fn test_connector_without_client() {
        assert!(TebexConnector::new(None).connect(Some("Steve")).is_none());
    }

    #[tokio::test]
    async fn test_add_before_basket_exists() {
        let server = MockServer::start().await;
        let client = TebexClient::new(&config(&server)).unwrap();
        let mut basket = TebexBasket::new(client, Some("Steve"));

        let err = basket
            .add_package_to_basket(&PackageId::from("1"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BasketError::NoBasket));
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_ident() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/tok/baskets"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": { "ident": "abc-123", "packages": [] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TebexClient::new(&config(&server)).unwrap();
        let mut basket = TebexBasket::new(client, None);

        let first = basket.get_or_create_basket("Steve").await.unwrap();
        let second = basket.get_or_create_basket("Steve").await.unwrap();

        assert_eq!(first.as_deref(), Some("abc-123"));
        assert_eq!(first, second);
        assert!(basket.has_initialized_basket());
        assert_eq!(basket.username(), Some("Steve"));
        assert!(basket.basket_data().unwrap().packages.is_some());
    }

    #[tokio::test]
    async fn test_mutations_refresh_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/tok/baskets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "ident": "abc-123", "packages": [] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/baskets/abc-123/packages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "ident": "abc-123", "packages": [{ "id": 7 }] }
            })))
            .mount(&server)
            .await;

        let client = TebexClient::new(&config(&server)).unwrap();
        let mut basket = TebexBasket::new(client, Some("Steve"));
        basket.get_or_create_basket("Steve").await.unwrap();
        basket
            .add_package_to_basket(&PackageId::from("7"), 1)
            .await
            .unwrap();

        assert!(basket.basket_data().unwrap().contains(&PackageId::from("7")));
    }
}
