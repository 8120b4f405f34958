mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rental_scout::mode::ActionMode;
use rental_scout::store::Store;

use common::{listing, HarnessBuilder, SlowSubmitter};

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn start_runs_a_cycle_immediately_and_stop_ends_the_loop() {
    let h = HarnessBuilder::new(ActionMode::Off).build().await;
    h.source.set_results(1, vec![listing("a", Some(800))]);

    assert!(!h.scheduler.is_running());
    assert!(h.scheduler.start());
    assert!(h.scheduler.is_running());
    assert!(!h.scheduler.start(), "second start must be refused");

    eventually(|| h.notifier.new_ids() == ["a"]).await;

    h.scheduler.stop().await;
    assert!(!h.scheduler.is_running());
    assert_eq!(h.source.searches(), 1);

    // Stopping twice is harmless and the loop can be restarted.
    h.scheduler.stop().await;
    assert!(h.scheduler.start());
    eventually(|| h.source.searches() == 2).await;
    h.scheduler.stop().await;
}

#[tokio::test]
async fn failed_cycle_is_reported_and_loop_keeps_running() {
    let h = HarnessBuilder::new(ActionMode::Off).build().await;
    h.faults.fail_profiles.store(true, Ordering::SeqCst);
    let scheduler = &h.scheduler;

    assert!(scheduler.start());
    eventually(|| !h.notifier.errors().is_empty()).await;

    let errors = h.notifier.errors();
    assert!(errors[0].starts_with("Poll-Zyklus fehlgeschlagen"));
    assert!(errors[0].contains("profile table unavailable"));
    assert!(scheduler.is_running());

    scheduler.stop().await;
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn stop_waits_for_the_cycle_in_flight() {
    let submitter = Arc::new(SlowSubmitter::new(Duration::from_millis(200)));
    let h = HarnessBuilder::new(ActionMode::On)
        .submitter(submitter.clone())
        .build()
        .await;
    h.source.set_results(
        1,
        vec![
            listing("a", Some(800)),
            listing("b", Some(850)),
            listing("c", Some(900)),
        ],
    );

    assert!(h.scheduler.start());
    eventually(|| submitter.started.load(Ordering::SeqCst) >= 1).await;
    h.scheduler.stop().await;

    assert!(!h.scheduler.is_running());
    assert_eq!(submitter.done.load(Ordering::SeqCst), 3);
    assert_eq!(submitter.submitted_ids(), ["a", "b", "c"]);
    assert!(h.store.uncontacted().await.unwrap().is_empty());
}

#[tokio::test]
async fn manual_poll_waits_for_the_running_cycle() {
    let submitter = Arc::new(SlowSubmitter::new(Duration::from_millis(100)));
    let h = HarnessBuilder::new(ActionMode::On)
        .submitter(submitter.clone())
        .build()
        .await;
    h.source.set_results(
        1,
        vec![
            listing("a", Some(800)),
            listing("b", Some(850)),
            listing("c", Some(900)),
        ],
    );

    assert!(h.scheduler.start());
    eventually(|| submitter.started.load(Ordering::SeqCst) >= 1).await;

    let manual = h.scheduler.poll().await.unwrap();
    assert_eq!(manual.new_listings, 0);
    assert_eq!(manual.contacted, 0);
    assert_eq!(submitter.submitted_ids(), ["a", "b", "c"]);
    assert_eq!(submitter.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(h.source.searches(), 2);

    h.scheduler.stop().await;
}
