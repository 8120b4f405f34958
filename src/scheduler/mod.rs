//! Poll-cycle coordination.
//!
//! One cycle: quiet-hours gate, discovery per active profile, the
//! notification pass, then the action pass selected by the current
//! [`ActionMode`]. Cycles never overlap.

mod quiet_hours;

pub use quiet_hours::QuietHours;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::compose::{Composer, Enhancer};
use crate::contact::Submitter;
use crate::filter::FilterEngine;
use crate::mode::{ActionMode, ActionModeController};
use crate::models::{ActivityEntry, ActivityKind, AttemptStatus, Listing, SearchProfile};
use crate::notify::Notifier;
use crate::ratelimit::RateLimiter;
use crate::sources::Source;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    /// Fetch the detail page of every new candidate before persisting it.
    pub fetch_details: bool,
    pub quiet_hours: Option<QuietHours>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            fetch_details: true,
            quiet_hours: None,
        }
    }
}

/// External services a cycle talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn Source>,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub composer: Arc<dyn Composer>,
    pub enhancer: Option<Arc<dyn Enhancer>>,
    /// `None` when contact submission is disabled.
    pub submitter: Option<Arc<dyn Submitter>>,
    pub rate_limiter: Arc<RateLimiter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFailure {
    pub profile_id: i64,
    pub profile_name: String,
    pub error: String,
}

/// Counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollCycleResult {
    pub skipped_quiet_hours: bool,
    pub profiles_processed: usize,
    pub candidates_found: usize,
    pub candidates_filtered: usize,
    pub new_listings: usize,
    pub late_rejections: usize,
    pub notified: usize,
    pub notify_failures: usize,
    pub contacted: usize,
    pub contact_failures: usize,
    pub previewed: usize,
    pub profile_failures: Vec<ProfileFailure>,
    /// Source requests inside the rate limiter's window when the cycle ended.
    pub requests_in_window: usize,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    settings: SchedulerSettings,
    collab: Collaborators,
    mode: ActionModeController,
    filter: FilterEngine,
    cycle_lock: tokio::sync::Mutex<()>,
    worker: Mutex<Option<Worker>>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        collab: Collaborators,
        mode: ActionModeController,
    ) -> Self {
        Self {
            settings,
            collab,
            mode,
            filter: FilterEngine::new(),
            cycle_lock: tokio::sync::Mutex::new(()),
            worker: Mutex::new(None),
        }
    }

    /// Starts the polling loop: one cycle right away, then one per interval.
    /// Returns `false` if the loop is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("scheduler already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(self).run_loop(cancel.clone()));
        *worker = Some(Worker { cancel, handle });
        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            "scheduler started"
        );
        true
    }

    /// Stops the loop after the in-flight cycle, if any, and waits for it.
    pub async fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };
        worker.cancel.cancel();
        if let Err(e) = worker.handle.await {
            error!(error = %e, "scheduler task ended abnormally");
        }
        info!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.settings.poll_interval.max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.poll().await {
                let reason = format!("{e:#}");
                error!(error = %reason, "poll cycle failed");
                if let Err(notify_err) = self
                    .collab
                    .notifier
                    .notify_error(&format!("Poll-Zyklus fehlgeschlagen: {reason}"))
                    .await
                {
                    warn!(error = %notify_err, "failed to report cycle failure");
                }
            }
        }
    }

    /// Runs one cycle now.
    pub async fn poll(&self) -> Result<PollCycleResult> {
        self.poll_at(Utc::now()).await
    }

    /// Runs one cycle with `now` as the wall-clock time for the quiet-hours
    /// check.
    pub async fn poll_at(&self, now: DateTime<Utc>) -> Result<PollCycleResult> {
        let _cycle = self.cycle_lock.lock().await;
        let mut result = PollCycleResult::default();

        if let Some(quiet) = &self.settings.quiet_hours {
            if quiet.contains(now) {
                info!(start = %quiet.start, end = %quiet.end, "quiet hours, skipping cycle");
                result.skipped_quiet_hours = true;
                return Ok(result);
            }
        }

        let profiles = self
            .collab
            .store
            .active_profiles()
            .await
            .context("Failed to load active search profiles")?;
        info!(count = profiles.len(), "starting poll cycle");

        for profile in &profiles {
            match self.process_profile(profile, &mut result).await {
                Ok(()) => result.profiles_processed += 1,
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(profile = %profile.name, error = %reason, "profile skipped");
                    result.profile_failures.push(ProfileFailure {
                        profile_id: profile.id,
                        profile_name: profile.name.clone(),
                        error: reason,
                    });
                }
            }
        }

        self.send_notifications(&mut result).await;
        self.run_actions(&mut result).await;
        result.requests_in_window = self.collab.rate_limiter.in_flight_window().await;

        info!(
            profiles = result.profiles_processed,
            found = result.candidates_found,
            new = result.new_listings,
            notified = result.notified,
            contacted = result.contacted,
            previewed = result.previewed,
            failures = result.profile_failures.len(),
            requests_in_window = result.requests_in_window,
            "poll cycle complete"
        );
        Ok(result)
    }

    async fn process_profile(
        &self,
        profile: &SearchProfile,
        result: &mut PollCycleResult,
    ) -> Result<()> {
        let store = &self.collab.store;

        self.collab.rate_limiter.wait().await;
        let candidates = self
            .collab
            .source
            .search(profile)
            .await
            .with_context(|| format!("Search failed for profile {}", profile.name))?;
        info!(
            source = self.collab.source.source_name(),
            profile = %profile.name,
            count = candidates.len(),
            "search returned candidates"
        );
        result.candidates_found += candidates.len();

        for mut candidate in candidates {
            candidate.profile_id = Some(profile.id);

            let verdict = self.filter.evaluate(&candidate, profile);
            if !verdict.passed {
                debug!(id = %candidate.external_id, reasons = %verdict, "candidate filtered");
                result.candidates_filtered += 1;
                continue;
            }

            match store.exists(&candidate.external_id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(id = %candidate.external_id, error = %e, "existence check failed");
                    continue;
                }
            }

            let listing = if self.settings.fetch_details {
                self.with_details(candidate).await
            } else {
                candidate
            };

            let verdict = self.filter.evaluate(&listing, profile);
            if !verdict.passed {
                debug!(id = %listing.external_id, reasons = %verdict, "candidate rejected after detail fetch");
                result.late_rejections += 1;
                continue;
            }

            if let Err(e) = store.create(&listing).await {
                warn!(id = %listing.external_id, error = %e, "failed to persist listing");
                continue;
            }
            result.new_listings += 1;
            info!(id = %listing.external_id, title = %listing.title, "new listing");
            self.log_activity(
                ActivityEntry::new(ActivityKind::ListingFound, &listing.external_id)
                    .with_details(listing.title.clone()),
            )
            .await;
        }
        Ok(())
    }

    async fn with_details(&self, basic: Listing) -> Listing {
        self.collab.rate_limiter.wait().await;
        match self.collab.source.fetch_detail(&basic.external_id).await {
            Ok(detail) => Listing::enriched_with(basic, detail),
            Err(e) => {
                warn!(id = %basic.external_id, error = %e, "detail fetch failed, keeping search record");
                basic
            }
        }
    }

    async fn send_notifications(&self, result: &mut PollCycleResult) {
        let pending = match self.collab.store.unnotified().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "failed to load unnotified listings");
                return;
            }
        };

        for listing in pending {
            if let Err(e) = self.collab.notifier.notify_new(&listing).await {
                warn!(id = %listing.external_id, error = %e, "notification failed");
                result.notify_failures += 1;
                continue;
            }
            result.notified += 1;
            match self.collab.store.mark_notified(&listing.external_id).await {
                Ok(()) => {
                    self.log_activity(ActivityEntry::new(
                        ActivityKind::NotificationSent,
                        &listing.external_id,
                    ))
                    .await
                }
                Err(e) => warn!(id = %listing.external_id, error = %e, "failed to mark listing notified"),
            }
        }
    }

    async fn run_actions(&self, result: &mut PollCycleResult) {
        if self.mode.current() == ActionMode::Off {
            return;
        }
        let pending = match self.collab.store.uncontacted().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "failed to load uncontacted listings");
                return;
            }
        };

        for listing in pending {
            match self.mode.current() {
                ActionMode::Off => {
                    info!("action mode switched off, ending action pass");
                    break;
                }
                ActionMode::On => {
                    let Some(submitter) = self.collab.submitter.as_deref() else {
                        warn!("action mode is on but contact submission is disabled");
                        break;
                    };
                    let message = self.compose(&listing).await;
                    self.contact(submitter, &listing, &message, result).await;
                }
                ActionMode::Preview => {
                    let message = self.compose(&listing).await;
                    self.preview(&listing, &message, result).await;
                }
            }
        }
    }

    async fn compose(&self, listing: &Listing) -> String {
        let base = self.collab.composer.compose(listing);
        let Some(enhancer) = &self.collab.enhancer else {
            return base;
        };
        match enhancer.enhance(&base, listing).await {
            Ok(text) => text,
            Err(e) => {
                warn!(id = %listing.external_id, error = %e, "enhancement failed, using base message");
                base
            }
        }
    }

    async fn contact(
        &self,
        submitter: &dyn Submitter,
        listing: &Listing,
        message: &str,
        result: &mut PollCycleResult,
    ) {
        let store = &self.collab.store;
        let id = &listing.external_id;

        let attempt = match store.record_attempt(id, message).await {
            Ok(attempt) => attempt,
            Err(e) => {
                warn!(%id, error = %e, "failed to record contact attempt, not submitting");
                return;
            }
        };

        match submitter.submit(listing, message).await {
            Ok(()) => {
                if let Err(e) = store
                    .update_attempt_status(attempt, AttemptStatus::Sent, None)
                    .await
                {
                    warn!(%id, attempt, error = %e, "failed to update contact attempt");
                }
                match store.mark_contacted(id).await {
                    Ok(()) => result.contacted += 1,
                    Err(e) => error!(%id, error = %e, "contact sent but listing not marked contacted"),
                }
                info!(%id, "contact request sent");
                self.log_activity(ActivityEntry::new(ActivityKind::ContactSent, id))
                    .await;
                if let Err(e) = self.collab.notifier.notify_contact_sent(listing).await {
                    warn!(%id, error = %e, "failed to report sent contact");
                }
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(%id, error = %reason, "contact submission failed");
                result.contact_failures += 1;
                if let Err(e) = store
                    .update_attempt_status(attempt, AttemptStatus::Failed, Some(&reason))
                    .await
                {
                    warn!(%id, attempt, error = %e, "failed to update contact attempt");
                }
                self.log_activity(
                    ActivityEntry::new(ActivityKind::ContactFailed, id).with_details(reason.clone()),
                )
                .await;
                if let Err(e) = self
                    .collab
                    .notifier
                    .notify_contact_failed(listing, &reason)
                    .await
                {
                    warn!(%id, error = %e, "failed to report contact failure");
                }
            }
        }
    }

    async fn preview(&self, listing: &Listing, message: &str, result: &mut PollCycleResult) {
        let id = &listing.external_id;
        if let Err(e) = self.collab.notifier.notify_preview(listing, message).await {
            warn!(%id, error = %e, "preview notification failed");
            result.notify_failures += 1;
            return;
        }
        match self.collab.store.mark_contacted(id).await {
            Ok(()) => {
                result.previewed += 1;
                self.log_activity(ActivityEntry::new(ActivityKind::PreviewSent, id))
                    .await;
            }
            Err(e) => warn!(%id, error = %e, "failed to mark previewed listing"),
        }
    }

    async fn log_activity(&self, entry: ActivityEntry) {
        if let Err(e) = self.collab.store.log_activity(entry).await {
            debug!(error = %e, "failed to record activity");
        }
    }
}
