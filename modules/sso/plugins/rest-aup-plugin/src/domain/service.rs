//! HTTP client for the external policy service.

use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, StatusCode, header};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use sso_engine_sdk::AupTerms;
use tracing::debug;
use url::Url;

use super::error::RestAupError;
use crate::config::RestAupPluginConfig;

/// REST-backed usage policy store.
pub struct Service {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: Url,
    timeout: Duration,
}

impl Service {
    /// Create a service from plugin configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RestAupError::InvalidUrl`] if `base_url` does not parse.
    pub fn from_config(cfg: &RestAupPluginConfig) -> Result<Self, RestAupError> {
        let base_url = Url::parse(cfg.base_url.trim_end_matches('/'))
            .map_err(|_| RestAupError::InvalidUrl(cfg.base_url.clone()))?;
        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            base_url,
            timeout: Duration::from_millis(cfg.timeout_ms),
        })
    }

    fn endpoint(&self, suffix: &str, username: &str) -> Url {
        let mut url = self.base_url.clone();
        if !suffix.is_empty() {
            let path = format!("{}/{suffix}", url.path().trim_end_matches('/'));
            url.set_path(&path);
        }
        url.query_pairs_mut().append_pair("username", username);
        url
    }

    async fn send(&self, method: &Method, url: &Url) -> Result<(StatusCode, Bytes), RestAupError> {
        let request = Request::builder()
            .method(method)
            .uri(url.as_str())
            .header(header::ACCEPT, "application/json")
            .body(Full::new(Bytes::new()))
            .map_err(|e| RestAupError::Transport(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| RestAupError::Transport(e.to_string()))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| RestAupError::Transport(e.to_string()))?
                .to_bytes();
            Ok::<_, RestAupError>((status, body))
        };

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| RestAupError::Timeout(timeout_ms))??;
        debug!(%method, path = url.path(), status = status.as_u16(), "Policy service answered");
        Ok((status, body))
    }

    /// Fetch the terms shown to `username`.
    ///
    /// # Errors
    ///
    /// Transport failures, non-success statuses and undecodable bodies.
    pub async fn fetch_terms(&self, username: &str) -> Result<AupTerms, RestAupError> {
        let url = self.endpoint("policy", username);
        let (status, body) = self.send(&Method::GET, &url).await?;
        if !status.is_success() {
            return Err(RestAupError::UnexpectedStatus(status.as_u16()));
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Record acceptance for `username`.
    ///
    /// # Errors
    ///
    /// Transport failures and non-success statuses.
    pub async fn record_acceptance(&self, username: &str) -> Result<(), RestAupError> {
        let (status, _) = self.send(&Method::POST, &self.endpoint("", username)).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(RestAupError::UnexpectedStatus(status.as_u16()))
        }
    }

    /// `202` means accepted and `403` means not yet.
    ///
    /// # Errors
    ///
    /// Transport failures and any other status.
    pub async fn acceptance_status(&self, username: &str) -> Result<bool, RestAupError> {
        let url = self.endpoint("status", username);
        let (status, _) = self.send(&Method::GET, &url).await?;
        match status {
            StatusCode::ACCEPTED => Ok(true),
            StatusCode::FORBIDDEN => Ok(false),
            other => Err(RestAupError::UnexpectedStatus(other.as_u16())),
        }
    }
}
