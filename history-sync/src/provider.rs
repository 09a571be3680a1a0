//! Provider client: the reqwest implementation of [`HistoryProvider`].
//!
//! Every call carries `Authorization: Bearer <api key>` and `Profile-Key: <profile key>`.
//! Non-2xx responses become [`FetchError::Api`] with the response body as message, so callers
//! never mistake a rejected request for an empty history.

use std::time::Duration;

use async_trait::async_trait;
use history_sync_core::contract::{HistoryPayload, HistoryProvider, HistoryRequest, ProfilePayload};
use history_sync_core::error::FetchError;
use serde::de::DeserializeOwned;

use crate::load_config::ProviderSection;

pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ProviderClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(section: &ProviderSection) -> Result<Self, reqwest::Error> {
        let client = Self::new(
            section.base_url.clone(),
            section.api_key.clone(),
            Duration::from_secs(section.timeout_secs),
        )?;
        tracing::info!(
            base_url = %client.base_url,
            api_key_set = !client.api_key.is_empty(),
            "Initialized ProviderClient from config"
        );
        Ok(client)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        profile_key: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Profile-Key", profile_key)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %url, "Provider request failed");
                FetchError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), url = %url, "Provider returned an error status");
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, url = %url, "Provider response did not match the expected shape");
            FetchError::Parse(e.to_string())
        })
    }
}

#[async_trait]
impl HistoryProvider for ProviderClient {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<HistoryPayload, FetchError> {
        let mut query = vec![("platform", request.platform.as_str().to_string())];
        if let Some(limit) = request.filter.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(last_days) = request.filter.last_days {
            query.push(("lastDays", last_days.to_string()));
        }
        if let Some(status) = request.filter.status {
            query.push(("status", status.as_str().to_string()));
        }
        self.get_json("history", &request.profile_key, &query).await
    }

    async fn fetch_profile(&self, profile_key: &str) -> Result<ProfilePayload, FetchError> {
        self.get_json("user", profile_key, &[]).await
    }
}
