use anyhow::Result;
use async_trait::async_trait;

use crate::models::Listing;

/// Builds the base contact message for a listing.
pub trait Composer: Send + Sync {
    fn compose(&self, listing: &Listing) -> String;
}

/// Rewrites a composed message for one listing. Callers keep the base text
/// when this fails.
#[async_trait]
pub trait Enhancer: Send + Sync {
    async fn enhance(&self, text: &str, listing: &Listing) -> Result<String>;
}
