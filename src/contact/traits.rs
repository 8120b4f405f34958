use anyhow::Result;
use async_trait::async_trait;

use crate::models::Listing;

/// Delivers a contact message to a listing's landlord.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, listing: &Listing, message: &str) -> Result<()>;
}
