use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::models::Listing;
use crate::notify::format;
use crate::notify::traits::Notifier;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Minimal Telegram Bot API client bound to one chat.
pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
    chat_id: i64,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: impl Into<String>, chat_id: i64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id,
        })
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<Option<T>> {
        let response = self
            .client
            .post(self.endpoint(method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Telegram {method} request failed"))?;
        let status = response.status();
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Telegram {method} returned an unreadable body ({status})"))?;
        if !parsed.ok {
            bail!(
                "Telegram {method} failed: {}",
                parsed.description.unwrap_or_else(|| status.to_string())
            );
        }
        Ok(parsed.result)
    }

    /// Sends an HTML message, optionally with a single URL button.
    pub async fn send_html(&self, text: &str, button: Option<(&str, &str)>) -> Result<()> {
        let mut body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some((label, url)) = button.filter(|(_, url)| !url.is_empty()) {
            body["reply_markup"] = json!({
                "inline_keyboard": [[{ "text": label, "url": url }]]
            });
        }
        self.call::<serde_json::Value>("sendMessage", body, Duration::from_secs(30))
            .await?;
        debug!(chat_id = self.chat_id, "telegram message sent");
        Ok(())
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let updates = self
            .call::<Vec<Update>>(
                "getUpdates",
                body,
                Duration::from_secs(timeout_secs + 10),
            )
            .await?;
        Ok(updates.unwrap_or_default())
    }
}

/// [`Notifier`] that posts to a Telegram chat.
pub struct TelegramNotifier {
    client: Arc<TelegramClient>,
}

impl TelegramNotifier {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_new(&self, listing: &Listing) -> Result<()> {
        self.client
            .send_html(
                &format::new_listing(listing),
                Some(("🔗 Auf IS24 ansehen", listing.url.as_str())),
            )
            .await
    }

    async fn notify_contact_sent(&self, listing: &Listing) -> Result<()> {
        self.client
            .send_html(&format::contact_sent(listing), None)
            .await
    }

    async fn notify_contact_failed(&self, listing: &Listing, error: &str) -> Result<()> {
        self.client
            .send_html(&format::contact_failed(listing, error), None)
            .await
    }

    async fn notify_preview(&self, listing: &Listing, message: &str) -> Result<()> {
        self.client
            .send_html(&format::preview(listing, message), None)
            .await
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        self.client.send_html(&format::error(message), None).await
    }

    async fn notify_text(&self, text: &str) -> Result<()> {
        self.client.send_html(text, None).await
    }
}
