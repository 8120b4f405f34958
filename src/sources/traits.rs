use crate::models::{Listing, SearchProfile};
use anyhow::Result;
use async_trait::async_trait;

/// A site that can be searched for rental listings.
///
/// Implementations return listings without a profile back-reference; the
/// scheduler links results to the profile that produced them.
#[async_trait]
pub trait Source: Send + Sync {
    /// Search the source for listings matching `profile`.
    async fn search(&self, profile: &SearchProfile) -> Result<Vec<Listing>>;

    /// Fetch the detail page for one listing.
    async fn fetch_detail(&self, external_id: &str) -> Result<Listing>;

    /// Get the name of the source
    fn source_name(&self) -> &'static str;
}
