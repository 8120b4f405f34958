use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{ActivityEntry, AttemptStatus, ContactAttempt, Listing, SearchProfile};
use crate::store::traits::{Store, StoreStats};

pub const MAX_ACTIVITY_ENTRIES: usize = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Snapshot {
    profiles: Vec<SearchProfile>,
    listings: Vec<Listing>,
    attempts: Vec<ContactAttempt>,
    activity: VecDeque<ActivityEntry>,
    next_attempt_id: u64,
}

impl Snapshot {
    fn listing_mut(&mut self, external_id: &str) -> Result<&mut Listing> {
        match self
            .listings
            .iter_mut()
            .find(|l| l.external_id == external_id)
        {
            Some(listing) => Ok(listing),
            None => bail!("unknown listing {external_id}"),
        }
    }
}

/// In-memory store with an optional write-through JSON snapshot.
///
/// Every change is written to disk before it becomes visible; if the write
/// fails the change is rolled back and the error returned.
pub struct FileStore {
    path: Option<PathBuf>,
    state: Mutex<Snapshot>,
}

impl FileStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(Snapshot::default()),
        }
    }

    /// Opens the snapshot at `path`, starting empty if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse store snapshot {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read store snapshot {}", path.display()))
            }
        };
        info!(
            path = %path.display(),
            listings = state.listings.len(),
            "opened listing store"
        );

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Replaces the configured search profiles.
    pub async fn replace_profiles(&self, profiles: Vec<SearchProfile>) -> Result<()> {
        self.update(|state| {
            state.profiles = profiles;
            Ok(())
        })
        .await
    }

    pub async fn attempts(&self, external_id: &str) -> Vec<ContactAttempt> {
        self.state
            .lock()
            .await
            .attempts
            .iter()
            .filter(|a| a.external_id == external_id)
            .cloned()
            .collect()
    }

    pub async fn activity(&self) -> Vec<ActivityEntry> {
        self.state.lock().await.activity.iter().cloned().collect()
    }

    async fn update<T>(&self, change: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().await;
        let backup = self.path.as_ref().map(|_| state.clone());
        let out = change(&mut state)?;

        if let (Some(path), Some(backup)) = (&self.path, backup) {
            if let Err(e) = write_snapshot(path, &state).await {
                *state = backup;
                return Err(e);
            }
        }
        Ok(out)
    }
}

async fn write_snapshot(path: &Path, state: &Snapshot) -> Result<()> {
    let json = serde_json::to_vec_pretty(state).context("Failed to serialize store snapshot")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    debug!(path = %path.display(), "store snapshot written");
    Ok(())
}

#[async_trait]
impl Store for FileStore {
    async fn active_profiles(&self) -> Result<Vec<SearchProfile>> {
        let state = self.state.lock().await;
        Ok(state.profiles.iter().filter(|p| p.active).cloned().collect())
    }

    async fn exists(&self, external_id: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.listings.iter().any(|l| l.external_id == external_id))
    }

    async fn create(&self, listing: &Listing) -> Result<()> {
        if self.exists(&listing.external_id).await? {
            return Ok(());
        }
        self.update(|state| {
            if !state
                .listings
                .iter()
                .any(|l| l.external_id == listing.external_id)
            {
                state.listings.push(listing.clone());
            }
            Ok(())
        })
        .await
    }

    async fn unnotified(&self) -> Result<Vec<Listing>> {
        let state = self.state.lock().await;
        Ok(state.listings.iter().filter(|l| !l.notified).cloned().collect())
    }

    async fn uncontacted(&self) -> Result<Vec<Listing>> {
        let state = self.state.lock().await;
        Ok(state
            .listings
            .iter()
            .filter(|l| l.notified && !l.contacted)
            .cloned()
            .collect())
    }

    async fn mark_notified(&self, external_id: &str) -> Result<()> {
        self.update(|state| {
            state.listing_mut(external_id)?.notified = true;
            Ok(())
        })
        .await
    }

    async fn mark_contacted(&self, external_id: &str) -> Result<()> {
        self.update(|state| {
            state.listing_mut(external_id)?.contacted = true;
            Ok(())
        })
        .await
    }

    async fn record_attempt(&self, external_id: &str, message: &str) -> Result<u64> {
        self.update(|state| {
            state.next_attempt_id += 1;
            let now = Utc::now();
            state.attempts.push(ContactAttempt {
                id: state.next_attempt_id,
                external_id: external_id.to_string(),
                message: message.to_string(),
                status: AttemptStatus::Pending,
                error: None,
                created_at: now,
                updated_at: now,
            });
            Ok(state.next_attempt_id)
        })
        .await
    }

    async fn update_attempt_status(
        &self,
        id: u64,
        status: AttemptStatus,
        error: Option<&str>,
    ) -> Result<()> {
        self.update(|state| {
            let Some(attempt) = state.attempts.iter_mut().find(|a| a.id == id) else {
                bail!("unknown contact attempt {id}");
            };
            attempt.status = status;
            attempt.error = error.map(str::to_string);
            attempt.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn log_activity(&self, entry: ActivityEntry) -> Result<()> {
        self.update(|state| {
            state.activity.push_back(entry);
            while state.activity.len() > MAX_ACTIVITY_ENTRIES {
                state.activity.pop_front();
            }
            Ok(())
        })
        .await
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.lock().await;
        Ok(StoreStats {
            total: state.listings.len(),
            notified: state.listings.iter().filter(|l| l.notified).count(),
            contacted: state.listings.iter().filter(|l| l.contacted).count(),
            failed_attempts: state
                .attempts
                .iter()
                .filter(|a| a.status == AttemptStatus::Failed)
                .count(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    profiles: Vec<SearchProfile>,
}

/// Reads search profiles from a YAML file with a top-level `profiles` list.
/// Profiles without an id are numbered after the highest explicit id.
pub async fn load_profiles(path: impl AsRef<Path>) -> Result<Vec<SearchProfile>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read profiles from {}", path.display()))?;
    parse_profiles(&raw).with_context(|| format!("Invalid profiles file {}", path.display()))
}

pub fn parse_profiles(raw: &str) -> Result<Vec<SearchProfile>> {
    let file: ProfilesFile = serde_yaml::from_str(raw)?;
    let mut profiles = file.profiles;

    let mut next_id = profiles.iter().map(|p| p.id).max().unwrap_or(0).max(0);
    let mut seen = HashSet::new();
    for profile in &mut profiles {
        if profile.id == 0 {
            next_id += 1;
            profile.id = next_id;
        }
        if !seen.insert(profile.id) {
            bail!("duplicate profile id {}", profile.id);
        }
        if profile.name.trim().is_empty() {
            profile.name = format!("profile-{}", profile.id);
        }
    }
    Ok(profiles)
}
