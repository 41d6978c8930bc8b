//! HTTP plumbing shared by the provider clients

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::ProviderError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client with the per-request timeout every provider uses
pub(crate) fn client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Send a request and decode a JSON body, mapping failures to [`ProviderError`]
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> std::result::Result<T, ProviderError> {
    let transport = |source| ProviderError::Transport {
        provider: provider.to_string(),
        source,
    };

    let response: Response = request.send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    response.json().await.map_err(transport)
}

/// Strip the trailing slash so paths can be appended with `format!`
pub(crate) fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
