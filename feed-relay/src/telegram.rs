use crate::traits::MessageSink;
use crate::types::{DeliveryError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org/bot";

#[derive(Debug, Serialize)]
struct SendMessageParams<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// The envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages through the Telegram Bot API.
pub struct TelegramClient {
    api_url: String,
    http_client: Client,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // api_url embeds the bot token
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_url: format!("{base_url}{token}"),
            http_client,
        })
    }

    async fn request<T: Serialize + ?Sized>(&self, method: &str, params: &T) -> std::result::Result<(), DeliveryError> {
        let url = format!("{}/{method}", self.api_url);

        let response = self
            .http_client
            .post(url)
            .json(params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;

        match serde_json::from_slice::<ApiResponse>(&bytes) {
            Ok(ApiResponse { ok: true, .. }) => Ok(()),
            Ok(ApiResponse {
                error_code,
                description,
                ..
            }) => Err(DeliveryError::Rejected {
                code: error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                description: description.unwrap_or_default(),
            }),
            Err(serde_error) => Err(DeliveryError::Transport(format!(
                "HTTP {status}, unparsable response {:?}: {serde_error}",
                String::from_utf8_lossy(&bytes)
            ))),
        }
    }
}

fn transport_error(error: reqwest::Error) -> DeliveryError {
    if error.is_timeout() {
        DeliveryError::Timeout
    } else {
        // without_url keeps the token out of the message
        DeliveryError::Transport(error.without_url().to_string())
    }
}

#[async_trait]
impl MessageSink for TelegramClient {
    async fn send_message(&self, channel: &str, text: &str) -> std::result::Result<(), DeliveryError> {
        debug!("Sending {} chars to {}", text.chars().count(), channel);

        let params = SendMessageParams { chat_id: channel, text };
        self.request("sendMessage", &params).await
    }
}
