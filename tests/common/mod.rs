#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use rental_scout::compose::{Composer, Enhancer, TemplateComposer};
use rental_scout::contact::Submitter;
use rental_scout::mode::{ActionMode, ActionModeController};
use rental_scout::models::{
    ActivityEntry, ApplicantProfile, AttemptStatus, Listing, SearchProfile,
};
use rental_scout::notify::Notifier;
use rental_scout::ratelimit::RateLimiter;
use rental_scout::scheduler::{Collaborators, Scheduler, SchedulerSettings};
use rental_scout::sources::Source;
use rental_scout::store::{FileStore, Store, StoreStats};

pub fn profile(id: i64, name: &str) -> SearchProfile {
    SearchProfile {
        id,
        name: name.to_string(),
        city: Some("Berlin".to_string()),
        ..SearchProfile::default()
    }
}

pub fn listing(id: &str, price: Option<u32>) -> Listing {
    let mut listing = Listing::new(id);
    listing.title = format!("Wohnung {id}");
    listing.url = format!("https://www.immobilienscout24.de/expose/{id}");
    listing.city = Some("Berlin".to_string());
    listing.price = price;
    listing
}

/// Source serving canned search results per profile id.
#[derive(Default)]
pub struct FakeSource {
    results: Mutex<HashMap<i64, Vec<Listing>>>,
    details: Mutex<HashMap<String, Listing>>,
    failing: Mutex<HashSet<i64>>,
    pub searches: AtomicUsize,
    pub detail_fetches: AtomicUsize,
}

impl FakeSource {
    pub fn set_results(&self, profile_id: i64, listings: Vec<Listing>) {
        self.results.lock().unwrap().insert(profile_id, listings);
    }

    pub fn set_detail(&self, listing: Listing) {
        self.details
            .lock()
            .unwrap()
            .insert(listing.external_id.clone(), listing);
    }

    pub fn fail_profile(&self, profile_id: i64) {
        self.failing.lock().unwrap().insert(profile_id);
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for FakeSource {
    async fn search(&self, profile: &SearchProfile) -> Result<Vec<Listing>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&profile.id) {
            bail!("search page returned 503");
        }
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(&profile.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_detail(&self, external_id: &str) -> Result<Listing> {
        self.detail_fetches.fetch_add(1, Ordering::SeqCst);
        self.details
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| anyhow!("no detail page for {external_id}"))
    }

    fn source_name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    New(String),
    ContactSent(String),
    ContactFailed(String, String),
    Preview(String, String),
    Error(String),
    Text(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    pub fail_new: AtomicBool,
    pub fail_previews: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn new_ids(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::New(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn previews(&self) -> Vec<(String, String)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Preview(id, message) => Some((id, message)),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_new(&self, listing: &Listing) -> Result<()> {
        if self.fail_new.load(Ordering::SeqCst) {
            bail!("telegram unavailable");
        }
        self.push(Sent::New(listing.external_id.clone()));
        Ok(())
    }

    async fn notify_contact_sent(&self, listing: &Listing) -> Result<()> {
        self.push(Sent::ContactSent(listing.external_id.clone()));
        Ok(())
    }

    async fn notify_contact_failed(&self, listing: &Listing, error: &str) -> Result<()> {
        self.push(Sent::ContactFailed(
            listing.external_id.clone(),
            error.to_string(),
        ));
        Ok(())
    }

    async fn notify_preview(&self, listing: &Listing, message: &str) -> Result<()> {
        if self.fail_previews.load(Ordering::SeqCst) {
            bail!("telegram unavailable");
        }
        self.push(Sent::Preview(
            listing.external_id.clone(),
            message.to_string(),
        ));
        Ok(())
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        self.push(Sent::Error(message.to_string()));
        Ok(())
    }

    async fn notify_text(&self, text: &str) -> Result<()> {
        self.push(Sent::Text(text.to_string()));
        Ok(())
    }
}

/// Records submissions; fails while `fail` is set. Optionally switches the
/// action mode off after the first submission.
#[derive(Default)]
pub struct FakeSubmitter {
    submitted: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
    switch_off_after_first: Mutex<Option<ActionModeController>>,
}

impl FakeSubmitter {
    pub fn failing() -> Self {
        let submitter = Self::default();
        submitter.fail.store(true, Ordering::SeqCst);
        submitter
    }

    pub fn switching_off(mode: ActionModeController) -> Self {
        Self {
            switch_off_after_first: Mutex::new(Some(mode)),
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<(String, String)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.submitted().into_iter().map(|(id, _)| id).collect()
    }
}

#[async_trait]
impl Submitter for FakeSubmitter {
    async fn submit(&self, listing: &Listing, message: &str) -> Result<()> {
        self.submitted
            .lock()
            .unwrap()
            .push((listing.external_id.clone(), message.to_string()));
        if let Some(mode) = self.switch_off_after_first.lock().unwrap().take() {
            mode.set(ActionMode::Off);
        }
        if self.fail.load(Ordering::SeqCst) {
            bail!("contact form did not appear");
        }
        Ok(())
    }
}

pub struct FixedEnhancer(pub &'static str);

#[async_trait]
impl Enhancer for FixedEnhancer {
    async fn enhance(&self, _text: &str, _listing: &Listing) -> Result<String> {
        Ok(self.0.to_string())
    }
}

pub struct FailingEnhancer;

#[async_trait]
impl Enhancer for FailingEnhancer {
    async fn enhance(&self, _text: &str, _listing: &Listing) -> Result<String> {
        bail!("openai returned 500")
    }
}

/// Contact submitter that takes `delay` per form and tracks overlap.
pub struct SlowSubmitter {
    delay: Duration,
    pub started: AtomicUsize,
    pub done: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    submitted: Mutex<Vec<String>>,
}

impl SlowSubmitter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Submitter for SlowSubmitter {
    async fn submit(&self, listing: &Listing, _message: &str) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.submitted
            .lock()
            .unwrap()
            .push(listing.external_id.clone());
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Switches for the store failures a [`FlakyStore`] injects.
#[derive(Default)]
pub struct StoreFaults {
    pub fail_profiles: AtomicBool,
    pub fail_mark_notified: AtomicBool,
    pub fail_mark_contacted: AtomicBool,
    fail_create: Mutex<HashSet<String>>,
}

impl StoreFaults {
    pub fn fail_create_for(&self, external_id: &str) {
        self.fail_create
            .lock()
            .unwrap()
            .insert(external_id.to_string());
    }

    pub fn clear(&self) {
        self.fail_profiles.store(false, Ordering::SeqCst);
        self.fail_mark_notified.store(false, Ordering::SeqCst);
        self.fail_mark_contacted.store(false, Ordering::SeqCst);
        self.fail_create.lock().unwrap().clear();
    }
}

/// Delegates to a [`FileStore`], failing the operations switched on in
/// its [`StoreFaults`].
pub struct FlakyStore {
    inner: Arc<FileStore>,
    faults: Arc<StoreFaults>,
}

#[async_trait]
impl Store for FlakyStore {
    async fn active_profiles(&self) -> Result<Vec<SearchProfile>> {
        if self.faults.fail_profiles.load(Ordering::SeqCst) {
            bail!("profile table unavailable");
        }
        self.inner.active_profiles().await
    }

    async fn exists(&self, external_id: &str) -> Result<bool> {
        self.inner.exists(external_id).await
    }

    async fn create(&self, listing: &Listing) -> Result<()> {
        if self
            .faults
            .fail_create
            .lock()
            .unwrap()
            .contains(&listing.external_id)
        {
            bail!("disk full");
        }
        self.inner.create(listing).await
    }

    async fn unnotified(&self) -> Result<Vec<Listing>> {
        self.inner.unnotified().await
    }

    async fn uncontacted(&self) -> Result<Vec<Listing>> {
        self.inner.uncontacted().await
    }

    async fn mark_notified(&self, external_id: &str) -> Result<()> {
        if self.faults.fail_mark_notified.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.inner.mark_notified(external_id).await
    }

    async fn mark_contacted(&self, external_id: &str) -> Result<()> {
        if self.faults.fail_mark_contacted.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.inner.mark_contacted(external_id).await
    }

    async fn record_attempt(&self, external_id: &str, message: &str) -> Result<u64> {
        self.inner.record_attempt(external_id, message).await
    }

    async fn update_attempt_status(
        &self,
        id: u64,
        status: AttemptStatus,
        error: Option<&str>,
    ) -> Result<()> {
        self.inner.update_attempt_status(id, status, error).await
    }

    async fn log_activity(&self, entry: ActivityEntry) -> Result<()> {
        self.inner.log_activity(entry).await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.inner.stats().await
    }
}

pub fn applicant() -> ApplicantProfile {
    ApplicantProfile {
        salutation: "Frau".to_string(),
        first_name: "Alex".to_string(),
        last_name: "Muster".to_string(),
        email: "alex@example.test".to_string(),
        phone: "+49 30 1234567".to_string(),
    }
}

pub fn composer() -> TemplateComposer {
    TemplateComposer::with_default_template(applicant())
}

/// A scheduler wired to fakes, without pacing delays. `store` is the
/// backing store behind the scheduler's [`FlakyStore`].
pub struct Harness {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<FileStore>,
    pub faults: Arc<StoreFaults>,
    pub source: Arc<FakeSource>,
    pub notifier: Arc<RecordingNotifier>,
    pub mode: ActionModeController,
}

pub struct HarnessBuilder {
    pub settings: SchedulerSettings,
    pub profiles: Vec<SearchProfile>,
    pub submitter: Option<Arc<dyn Submitter>>,
    pub enhancer: Option<Arc<dyn Enhancer>>,
    pub notifier: Arc<RecordingNotifier>,
    pub controller: ActionModeController,
}

impl HarnessBuilder {
    pub fn new(mode: ActionMode) -> Self {
        Self {
            settings: SchedulerSettings {
                poll_interval: Duration::from_secs(3600),
                fetch_details: false,
                quiet_hours: None,
            },
            profiles: vec![profile(1, "Mitte")],
            submitter: None,
            enhancer: None,
            notifier: Arc::new(RecordingNotifier::default()),
            controller: ActionModeController::new(mode),
        }
    }

    pub fn submitter(mut self, submitter: Arc<dyn Submitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn enhancer(mut self, enhancer: Arc<dyn Enhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn profiles(mut self, profiles: Vec<SearchProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn fetch_details(mut self) -> Self {
        self.settings.fetch_details = true;
        self
    }

    pub async fn build(self) -> Harness {
        let store = Arc::new(FileStore::in_memory());
        store.replace_profiles(self.profiles).await.unwrap();
        let faults = Arc::new(StoreFaults::default());
        let source = Arc::new(FakeSource::default());
        let composer: Arc<dyn Composer> = Arc::new(composer());

        let collab = Collaborators {
            source: source.clone(),
            store: Arc::new(FlakyStore {
                inner: store.clone(),
                faults: faults.clone(),
            }),
            notifier: self.notifier.clone(),
            composer,
            enhancer: self.enhancer,
            submitter: self.submitter,
            rate_limiter: Arc::new(RateLimiter::new(1000, Duration::ZERO, Duration::ZERO)),
        };
        let scheduler = Arc::new(Scheduler::new(
            self.settings,
            collab,
            self.controller.clone(),
        ));

        Harness {
            scheduler,
            store,
            faults,
            source,
            notifier: self.notifier,
            mode: self.controller,
        }
    }
}
