use anyhow::Result;
use async_trait::async_trait;

use crate::models::Listing;

/// Operator-facing messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_new(&self, listing: &Listing) -> Result<()>;

    async fn notify_contact_sent(&self, listing: &Listing) -> Result<()>;

    async fn notify_contact_failed(&self, listing: &Listing, error: &str) -> Result<()>;

    /// Shows the message that would have been submitted for `listing`.
    async fn notify_preview(&self, listing: &Listing, message: &str) -> Result<()>;

    async fn notify_error(&self, message: &str) -> Result<()>;

    /// Free-form status text (startup, command replies).
    async fn notify_text(&self, text: &str) -> Result<()>;
}
