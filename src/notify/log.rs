use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::Listing;
use crate::notify::traits::Notifier;

/// Writes notifications to the log. Used when Telegram is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_new(&self, listing: &Listing) -> Result<()> {
        info!(
            id = %listing.external_id,
            title = %listing.title,
            price = ?listing.price,
            rooms = ?listing.rooms,
            url = %listing.url,
            "new listing"
        );
        Ok(())
    }

    async fn notify_contact_sent(&self, listing: &Listing) -> Result<()> {
        info!(id = %listing.external_id, url = %listing.url, "contact request sent");
        Ok(())
    }

    async fn notify_contact_failed(&self, listing: &Listing, error: &str) -> Result<()> {
        warn!(id = %listing.external_id, error, "contact request failed");
        Ok(())
    }

    async fn notify_preview(&self, listing: &Listing, message: &str) -> Result<()> {
        info!(id = %listing.external_id, text = message, "contact preview");
        Ok(())
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        warn!(alert = message, "operator alert");
        Ok(())
    }

    async fn notify_text(&self, text: &str) -> Result<()> {
        info!("{text}");
        Ok(())
    }
}
