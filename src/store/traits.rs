use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{ActivityEntry, AttemptStatus, Listing, SearchProfile};

/// Totals reported by `/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub notified: usize,
    pub contacted: usize,
    pub failed_attempts: usize,
}

/// Persistent state of discovered listings and contact attempts.
///
/// All listing operations are keyed by `external_id`, so retrying any of
/// them after a partial failure is safe.
#[async_trait]
pub trait Store: Send + Sync {
    async fn active_profiles(&self) -> Result<Vec<SearchProfile>>;

    async fn exists(&self, external_id: &str) -> Result<bool>;

    /// Inserts `listing`. Inserting an id that already exists is a no-op.
    async fn create(&self, listing: &Listing) -> Result<()>;

    async fn unnotified(&self) -> Result<Vec<Listing>>;

    /// Notified listings that have not been contacted yet.
    async fn uncontacted(&self) -> Result<Vec<Listing>>;

    async fn mark_notified(&self, external_id: &str) -> Result<()>;

    async fn mark_contacted(&self, external_id: &str) -> Result<()>;

    /// Records a pending contact attempt and returns its id.
    async fn record_attempt(&self, external_id: &str, message: &str) -> Result<u64>;

    async fn update_attempt_status(
        &self,
        id: u64,
        status: AttemptStatus,
        error: Option<&str>,
    ) -> Result<()>;

    async fn log_activity(&self, entry: ActivityEntry) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}
