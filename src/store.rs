use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{Interaction, NewInteraction, NewPurchase, NewUserRecord, Purchase, UserRecord};

const USERS: &str = "users";
const PURCHASES: &str = "acquisti";
const INTERACTIONS: &str = "film";

/// Remote key-value store holding users, purchases and interactions.
#[async_trait]
pub trait StoreApi: Send + Sync {
    async fn create_user(&self, user: &NewUserRecord) -> Result<UserRecord>;
    async fn find_users_by_email(&self, email: &str) -> Result<Vec<UserRecord>>;
    async fn delete_user(&self, id: &str) -> Result<()>;

    async fn create_purchase(&self, purchase: &NewPurchase) -> Result<Purchase>;
    async fn list_purchases(&self, user_id: &str) -> Result<Vec<Purchase>>;
    async fn delete_purchase(&self, id: &str) -> Result<()>;

    async fn create_interaction(&self, interaction: &NewInteraction) -> Result<Interaction>;
    async fn list_interactions(&self, user_id: &str) -> Result<Vec<Interaction>>;
    async fn delete_interaction(&self, id: &str) -> Result<()>;
}

/// json-server style REST backend.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("Failed to build store HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{collection}", self.base_url)
    }

    fn record_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{}", self.base_url, urlencoding::encode(id))
    }

    fn query_url(&self, collection: &str, field: &str, value: &str) -> String {
        format!(
            "{}/{collection}?{field}={}",
            self.base_url,
            urlencoding::encode(value)
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "Store GET");
        let res = self.client.get(url).send().await.context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("GET {} -> {} {}", url, status, text));
        }
        serde_json::from_str(&text).with_context(|| format!("JSON parse failed for {url}"))
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        debug!(%url, "Store POST");
        let res = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("POST {} -> {} {}", url, status, text));
        }
        serde_json::from_str(&text).with_context(|| format!("JSON parse failed for {url}"))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        debug!(%url, "Store DELETE");
        let res = self
            .client
            .delete(url)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("DELETE {} -> {} {}", url, status, text));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreApi for RestStore {
    async fn create_user(&self, user: &NewUserRecord) -> Result<UserRecord> {
        let created: UserRecord = self.post_json(&self.collection_url(USERS), user).await?;
        info!(user_id = %created.id, "User record created");
        Ok(created)
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<UserRecord>> {
        self.get_json(&self.query_url(USERS, "email", email)).await
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        self.delete(&self.record_url(USERS, id)).await
    }

    async fn create_purchase(&self, purchase: &NewPurchase) -> Result<Purchase> {
        self.post_json(&self.collection_url(PURCHASES), purchase)
            .await
    }

    async fn list_purchases(&self, user_id: &str) -> Result<Vec<Purchase>> {
        self.get_json(&self.query_url(PURCHASES, "userId", user_id))
            .await
    }

    async fn delete_purchase(&self, id: &str) -> Result<()> {
        self.delete(&self.record_url(PURCHASES, id)).await
    }

    async fn create_interaction(&self, interaction: &NewInteraction) -> Result<Interaction> {
        self.post_json(&self.collection_url(INTERACTIONS), interaction)
            .await
    }

    async fn list_interactions(&self, user_id: &str) -> Result<Vec<Interaction>> {
        self.get_json(&self.query_url(INTERACTIONS, "clickedBy", user_id))
            .await
    }

    async fn delete_interaction(&self, id: &str) -> Result<()> {
        self.delete(&self.record_url(INTERACTIONS, id)).await
    }
}
