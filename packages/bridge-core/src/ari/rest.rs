//! ARI REST client (§4.3): Basic auth over the configured base URL,
//! transient-error retry, and the §9 Open Question 2 response-status fix.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::protocol_constants::{
    ARI_EXTERNAL_MEDIA_ENCAPSULATION, ARI_EXTERNAL_MEDIA_TRANSPORT, ARI_SUCCESS_STATUSES,
};

/// Errors from the ARI REST client.
#[derive(Debug, Error)]
pub enum AriError {
    /// The HTTP request itself failed (connect, TLS, timeout at the
    /// transport layer, not an ARI-level timeout).
    #[error("ARI HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// ARI responded with a status outside `{200, 204}` (§9 Open Question 2).
    #[error("ARI returned {0}: {1}")]
    HttpStatus(u16, String),

    /// The request exceeded `ARI_TIMEOUT`.
    #[error("ARI request timed out")]
    Timeout,

    /// The response body did not parse as the expected shape.
    #[error("Failed to parse ARI response: {0}")]
    Parse(String),

    /// The ARI events WebSocket closed or errored.
    #[error("ARI WebSocket error: {0}")]
    WebSocket(String),
}

pub type AriResult<T> = Result<T, AriError>;

impl AriError {
    /// Transient transport errors are retried; 4xx/5xx application errors
    /// (and malformed responses) are not (§4.3).
    pub fn is_transient(&self) -> bool {
        match self {
            AriError::Http(e) => e.is_timeout() || e.is_connect(),
            AriError::Timeout => true,
            _ => false,
        }
    }
}

/// Delays between retries of a transient ARI REST failure (exponential backoff).
const RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

async fn with_retry<F, Fut, T>(action: &str, mut operation: F) -> AriResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = AriResult<T>>,
{
    let mut last_error = None;
    for (attempt, delay_ms) in std::iter::once(0).chain(RETRY_DELAYS_MS).enumerate() {
        if attempt > 0 {
            log::info!("[ARI] retrying {action} (attempt {}) after {delay_ms}ms", attempt + 1);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        match operation().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() => {
                log::warn!("[ARI] {action} transient error: {e}");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_error.expect("retry loop should have set last_error"))
}

/// Treats `status` as success iff it is exactly 200 or 204 — the fix for
/// the source's `_normalize_response`, which always evaluated truthy
/// (§9 Open Question 2).
fn is_success_status(status: StatusCode) -> bool {
    ARI_SUCCESS_STATUSES.contains(&status.as_u16())
}

#[derive(Debug, Deserialize)]
pub struct BridgeCreated {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChannelCreated {
    pub id: String,
}

/// ARI REST client: Basic auth over a configured base URL, §4.3.
pub struct AriRestClient {
    http: Client,
    base_url: String,
    auth: (String, String),
}

impl AriRestClient {
    pub fn new(http: Client, base_url: String, user: String, pass: String) -> Self {
        Self {
            http,
            base_url,
            auth: (user, pass),
        }
    }

    async fn request(
        &self,
        action: &str,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> AriResult<String> {
        with_retry(action, || {
            let url = format!("{}{}", self.base_url, path);
            let mut req = self
                .http
                .request(method.clone(), &url)
                .basic_auth(&self.auth.0, Some(&self.auth.1));
            if let Some(ref body) = body {
                req = req.json(body);
            }
            async move {
                let response = req.send().await?;
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if !is_success_status(status) {
                    return Err(AriError::HttpStatus(status.as_u16(), text));
                }
                Ok(text)
            }
        })
        .await
    }

    /// `POST /bridges` → bridge id.
    pub async fn create_bridge(&self) -> AriResult<String> {
        let body = self.request("createBridge", reqwest::Method::POST, "/bridges", None).await?;
        let parsed: BridgeCreated = serde_json::from_str(&body).map_err(|e| AriError::Parse(e.to_string()))?;
        Ok(parsed.id)
    }

    /// `POST /channels/create` with the dial endpoint → channel id.
    pub async fn create_channel(&self, endpoint: &str, app: &str) -> AriResult<String> {
        let body = self
            .request(
                "createChannel",
                reqwest::Method::POST,
                "/channels/create",
                Some(json!({ "endpoint": endpoint, "app": app })),
            )
            .await?;
        let parsed: ChannelCreated =
            serde_json::from_str(&body).map_err(|e| AriError::Parse(e.to_string()))?;
        Ok(parsed.id)
    }

    /// `POST /channels/{id}/dial`.
    pub async fn dial(&self, channel_id: &str) -> AriResult<()> {
        self.request(
            "dial",
            reqwest::Method::POST,
            &format!("/channels/{channel_id}/dial"),
            None,
        )
        .await?;
        Ok(())
    }

    /// `POST /channels/{id}/play`.
    pub async fn play(&self, channel_id: &str, media: &str) -> AriResult<()> {
        self.request(
            "play",
            reqwest::Method::POST,
            &format!("/channels/{channel_id}/play"),
            Some(json!({ "media": media })),
        )
        .await?;
        Ok(())
    }

    /// `POST /channels/{id}/record`.
    pub async fn record(&self, channel_id: &str, name: &str, format: &str) -> AriResult<()> {
        self.request(
            "record",
            reqwest::Method::POST,
            &format!("/channels/{channel_id}/record"),
            Some(json!({ "name": name, "format": format })),
        )
        .await?;
        Ok(())
    }

    /// `DELETE /channels/{id}`.
    pub async fn hangup(&self, channel_id: &str) -> AriResult<()> {
        self.request(
            "hangup",
            reqwest::Method::DELETE,
            &format!("/channels/{channel_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    /// `POST /bridges/{id}/addChannel`.
    pub async fn add_channel_to_bridge(&self, bridge_id: &str, channel_id: &str) -> AriResult<()> {
        self.request(
            "addChannelToBridge",
            reqwest::Method::POST,
            &format!("/bridges/{bridge_id}/addChannel"),
            Some(json!({ "channel": channel_id })),
        )
        .await?;
        Ok(())
    }

    /// `DELETE /bridges/{id}`.
    pub async fn delete_bridge(&self, bridge_id: &str) -> AriResult<()> {
        self.request(
            "deleteBridge",
            reqwest::Method::DELETE,
            &format!("/bridges/{bridge_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    /// `POST /bridges/{id}/record`, for whole-bridge call recording.
    pub async fn record_bridge(&self, bridge_id: &str, name: &str, format: &str) -> AriResult<()> {
        self.request(
            "recordBridge",
            reqwest::Method::POST,
            &format!("/bridges/{bridge_id}/record"),
            Some(json!({ "name": name, "format": format })),
        )
        .await?;
        Ok(())
    }

    /// `POST /channels/{id}/snoop`, for spying on a channel's audio without
    /// joining it to a bridge (diagnostics, silent monitoring).
    pub async fn snoop(
        &self,
        channel_id: &str,
        app: &str,
        spy: &str,
        whisper: &str,
    ) -> AriResult<String> {
        let body = self
            .request(
                "snoop",
                reqwest::Method::POST,
                &format!("/channels/{channel_id}/snoop"),
                Some(json!({ "app": app, "spy": spy, "whisper": whisper })),
            )
            .await?;
        let parsed: ChannelCreated =
            serde_json::from_str(&body).map_err(|e| AriError::Parse(e.to_string()))?;
        Ok(parsed.id)
    }

    /// `POST /channels/externalMedia`, per §6, with `encapsulation=audiosocket`,
    /// `transport=tcp`, and `data=<call uuid>` so the correlation id is carried
    /// through to the AudioSocket IDENTIFY frame.
    pub async fn create_external_media(
        &self,
        app: &str,
        external_host: &str,
        format: &str,
        call_uuid: &str,
    ) -> AriResult<String> {
        let body = self
            .request(
                "createExternalMedia",
                reqwest::Method::POST,
                "/channels/externalMedia",
                Some(json!({
                    "app": app,
                    "external_host": external_host,
                    "encapsulation": ARI_EXTERNAL_MEDIA_ENCAPSULATION,
                    "transport": ARI_EXTERNAL_MEDIA_TRANSPORT,
                    "format": format,
                    "data": call_uuid,
                })),
            )
            .await?;
        let parsed: ChannelCreated =
            serde_json::from_str(&body).map_err(|e| AriError::Parse(e.to_string()))?;
        Ok(parsed.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_statuses_are_exactly_200_and_204() {
        assert!(is_success_status(StatusCode::OK));
        assert!(is_success_status(StatusCode::NO_CONTENT));
        assert!(!is_success_status(StatusCode::CREATED));
        assert!(!is_success_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_success_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn timeout_error_is_transient() {
        assert!(AriError::Timeout.is_transient());
    }

    #[test]
    fn http_status_error_is_not_transient() {
        assert!(!AriError::HttpStatus(500, "boom".into()).is_transient());
    }
}
