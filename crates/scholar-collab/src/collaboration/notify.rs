use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::NotificationConfig;

/// Rendered e-mail ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Outbound notification boundary. Implementations return the provider's message id.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<String, NotificationError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("notification service unavailable: no e-mail provider is configured")]
    Unconfigured,
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification provider rejected the message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("notification provider did not respond within {0:?}")]
    Timeout(Duration),
    #[error("notification provider returned an unexpected response: {0}")]
    InvalidResponse(String),
}

/// Bounds a gateway call; a timeout counts as a failed send.
pub async fn send_with_timeout<N>(
    gateway: &N,
    message: &EmailMessage,
    timeout: Duration,
) -> Result<String, NotificationError>
where
    N: NotificationGateway + ?Sized,
{
    match tokio::time::timeout(timeout, gateway.send(message)).await {
        Ok(result) => result,
        Err(_) => Err(NotificationError::Timeout(timeout)),
    }
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: String,
}

/// Resend HTTP API client. The `reqwest::Client` is built once and reused for every send.
#[derive(Clone)]
pub struct ResendGateway {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl ResendGateway {
    pub fn new(
        api_key: String,
        api_url: String,
        from: String,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .user_agent(concat!("scholar-collab/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .map_err(|err| NotificationError::Transport(format!("build client failed: {err}")))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl NotificationGateway for ResendGateway {
    async fn send(&self, message: &EmailMessage) -> Result<String, NotificationError> {
        let payload = ResendPayload {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        debug!(to = %message.to, subject = %message.subject, "dispatching e-mail");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| NotificationError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "e-mail provider rejected message");
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ResendResponse = response
            .json()
            .await
            .map_err(|err| NotificationError::InvalidResponse(err.to_string()))?;
        Ok(parsed.id)
    }
}

/// Gateway selected at startup from configuration and injected into the workflow and scheduler.
#[derive(Clone)]
pub enum EmailGateway {
    Resend(ResendGateway),
    /// No provider configured; every send fails with [`NotificationError::Unconfigured`].
    Unconfigured,
}

impl EmailGateway {
    pub fn from_config(config: &NotificationConfig) -> Result<Self, NotificationError> {
        match &config.api_key {
            Some(api_key) => Ok(Self::Resend(ResendGateway::new(
                api_key.clone(),
                config.api_url.clone(),
                config.from_address.clone(),
                config.timeout,
            )?)),
            None => {
                warn!("RESEND_API_KEY not set; e-mail notifications will be unavailable");
                Ok(Self::Unconfigured)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Resend(_))
    }
}

#[async_trait]
impl NotificationGateway for EmailGateway {
    async fn send(&self, message: &EmailMessage) -> Result<String, NotificationError> {
        match self {
            Self::Resend(gateway) => gateway.send(message).await,
            Self::Unconfigured => Err(NotificationError::Unconfigured),
        }
    }
}
