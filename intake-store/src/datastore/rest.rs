//! REST Datastore
//!
//! PostgREST-style HTTP adapter: one endpoint per table under
//! `{base_url}/rest/v1/`, filters as `column=eq.value` query parameters.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::Datastore;
use crate::entities::{
    ActivityRow, AssignmentRow, OwnerRow, ProfileRow, PropertyRow, PurchaseRow, SubmissionRow,
    Table,
};
use crate::error::{StoreError, StoreResult};
use crate::identity::IdentityProvider;
use intake_core::{ServerId, SubmissionId, UserId};

/// REST datastore configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestConfig {
    /// Project URL, without the `/rest/v1` suffix
    pub base_url: String,
    /// Public API key sent on every request
    pub api_key: String,
    /// Session token of the signed-in user; falls back to `api_key`
    pub access_token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
            timeout_secs: 30,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Read `INTAKE_DATASTORE_URL`, `INTAKE_DATASTORE_API_KEY`,
    /// `INTAKE_DATASTORE_TOKEN` and `INTAKE_DATASTORE_TIMEOUT`
    pub fn from_env() -> StoreResult<Self> {
        let base_url = std::env::var("INTAKE_DATASTORE_URL")
            .map_err(|_| StoreError::Configuration("INTAKE_DATASTORE_URL is not set".to_string()))?;
        let api_key = std::env::var("INTAKE_DATASTORE_API_KEY").map_err(|_| {
            StoreError::Configuration("INTAKE_DATASTORE_API_KEY is not set".to_string())
        })?;

        let mut config = Self::new(base_url, api_key);
        if let Ok(token) = std::env::var("INTAKE_DATASTORE_TOKEN") {
            config.access_token = Some(token);
        }
        if let Some(timeout) = std::env::var("INTAKE_DATASTORE_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.timeout_secs = timeout;
        }
        Ok(config)
    }
}

#[derive(Deserialize)]
struct IdOnly {
    id: serde_json::Value,
}

impl IdOnly {
    fn into_server_id(self) -> ServerId {
        match self.id {
            serde_json::Value::String(s) => ServerId::new(s),
            other => ServerId::new(other.to_string()),
        }
    }
}

/// REST datastore client
pub struct RestDatastore {
    client: Client,
    config: RestConfig,
}

impl RestDatastore {
    pub fn new(config: RestConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn table_url(&self, table: Table) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            table.name()
        )
    }

    fn auth_url(&self) -> String {
        format!("{}/auth/v1/user", self.config.base_url.trim_end_matches('/'))
    }

    fn token(&self) -> &str {
        self.config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.token())
    }

    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::classify(status.as_u16(), &body))
    }

    async fn insert_returning_id<R: Serialize + Sync>(
        &self,
        table: Table,
        row: &R,
    ) -> StoreResult<ServerId> {
        let response = self
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let rows: Vec<IdOnly> = Self::check(response).await?.json().await?;
        let id = rows
            .into_iter()
            .next()
            .map(IdOnly::into_server_id)
            .ok_or_else(|| StoreError::Remote {
                status: 200,
                code: None,
                message: format!("insert into {} returned no row", table),
            })?;
        debug!(table = %table, id = %id, "Row inserted");
        Ok(id)
    }
}

#[async_trait]
impl Datastore for RestDatastore {
    async fn insert_submission(&self, row: &SubmissionRow) -> StoreResult<ServerId> {
        self.insert_returning_id(Table::Submissions, row).await
    }

    async fn submission_exists(&self, id: &SubmissionId) -> StoreResult<bool> {
        let response = self
            .request(Method::GET, &self.table_url(Table::Submissions))
            .query(&[("id", format!("eq.{}", id)), ("select", "id".to_string())])
            .send()
            .await?;
        let rows: Vec<IdOnly> = Self::check(response).await?.json().await?;
        Ok(!rows.is_empty())
    }

    async fn delete_submission(&self, id: &SubmissionId) -> StoreResult<()> {
        let response = self
            .request(Method::DELETE, &self.table_url(Table::Submissions))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upsert_profile(&self, row: &ProfileRow) -> StoreResult<()> {
        let response = self
            .request(Method::POST, &self.table_url(Table::UserProfiles))
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn insert_owner(&self, row: &OwnerRow) -> StoreResult<ServerId> {
        self.insert_returning_id(Table::Owners, row).await
    }

    async fn insert_property(&self, row: &PropertyRow) -> StoreResult<ServerId> {
        self.insert_returning_id(Table::Properties, row).await
    }

    async fn insert_assignment(&self, row: &AssignmentRow) -> StoreResult<ServerId> {
        self.insert_returning_id(Table::Assignments, row).await
    }

    async fn insert_purchase(&self, row: &PurchaseRow) -> StoreResult<ServerId> {
        self.insert_returning_id(Table::Purchases, row).await
    }

    async fn insert_activity(&self, row: &ActivityRow) -> StoreResult<()> {
        let response = self
            .request(Method::POST, &self.table_url(Table::ActivityLogs))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct SessionUser {
    id: String,
}

#[async_trait]
impl IdentityProvider for RestDatastore {
    async fn current_user(&self) -> StoreResult<Option<UserId>> {
        if self.config.access_token.is_none() {
            return Ok(None);
        }
        let response = self.request(Method::GET, &self.auth_url()).send().await?;
        if response.status().as_u16() == 401 {
            return Ok(None);
        }
        let user: SessionUser = Self::check(response).await?.json().await?;
        Ok(Some(UserId::new(user.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let store = RestDatastore::new(RestConfig::new("https://db.example.com/", "anon")).unwrap();
        assert_eq!(
            store.table_url(Table::Assignments),
            "https://db.example.com/rest/v1/owner_property_assignments"
        );
        assert_eq!(store.auth_url(), "https://db.example.com/auth/v1/user");
    }

    #[test]
    fn test_token_falls_back_to_api_key() {
        let config = RestConfig::new("https://db.example.com", "anon");
        let store = RestDatastore::new(config.clone()).unwrap();
        assert_eq!(store.token(), "anon");

        let store = RestDatastore::new(config.with_access_token("jwt")).unwrap();
        assert_eq!(store.token(), "jwt");
    }

    #[test]
    fn test_numeric_ids_are_stringified() {
        let row: IdOnly = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        assert_eq!(row.into_server_id(), ServerId::new("42"));
    }

    #[tokio::test]
    async fn test_anonymous_session_has_no_user() {
        let store = RestDatastore::new(RestConfig::new("https://db.example.com", "anon")).unwrap();
        assert_eq!(store.current_user().await.unwrap(), None);
    }
}
