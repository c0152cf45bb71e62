//! Label pool state machine under concurrency, release and expiry.

mod common;

use std::sync::Barrier;

use chrono::{Duration, Utc};

use common::{new_page, TestHarness};
use labelpool::db::page_repo;
use labelpool::model::{LabelStatus, PooledLabel};
use labelpool::pool::Enrollment;
use labelpool::ClaimOutcome;

fn enroll(harness: &TestHarness, page_id: &str, reference: &str, created: chrono::DateTime<Utc>) -> PooledLabel {
    let page = page_repo::find_by_id(&harness.app.db, page_id).unwrap().unwrap();
    harness
        .app
        .pool
        .enroll(
            Enrollment {
                upload_id: &page.upload_id,
                split_page_id: &page.id,
                order_reference: reference,
                tracking_number: &page.tracking_number,
                courier_service_id: "courier-1",
                owner_id: "owner-a",
            },
            created,
        )
        .unwrap()
}

fn harness_with_pages(references: &[&str]) -> TestHarness {
    let harness = TestHarness::new();
    harness.insert_upload("u1", "owner-a", "courier-1");
    for (i, reference) in references.iter().enumerate() {
        let n = i as u32 + 1;
        page_repo::insert(&harness.app.db, &new_page(&format!("p{}", n), "u1", n, reference))
            .unwrap();
    }
    harness
}

#[test]
fn test_concurrent_claims_have_one_winner() {
    const CLAIMANTS: usize = 16;
    let harness = harness_with_pages(&["42"]);
    let label = enroll(&harness, "p1", "42", Utc::now());
    let pool = &harness.app.pool;
    let barrier = Barrier::new(CLAIMANTS);

    let outcomes: Vec<(String, ClaimOutcome)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..CLAIMANTS)
            .map(|i| {
                let barrier = &barrier;
                let label_id = label.id.clone();
                scope.spawn(move || {
                    let consumer = format!("order-{}", i);
                    barrier.wait();
                    let outcome = pool.claim(&label_id, &consumer).unwrap();
                    (consumer, outcome)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<&String> = outcomes
        .iter()
        .filter(|(_, o)| matches!(o, ClaimOutcome::Claimed(_)))
        .map(|(consumer, _)| consumer)
        .collect();
    assert_eq!(winners.len(), 1);
    assert!(outcomes.iter().all(|(_, o)| match o {
        ClaimOutcome::Claimed(_) => true,
        ClaimOutcome::Unavailable { status } => *status == LabelStatus::Claimed,
        ClaimOutcome::NotFound => false,
    }));

    let stored = pool.get(&label.id).unwrap().unwrap();
    assert_eq!(stored.status, LabelStatus::Claimed);
    assert_eq!(stored.claimed_by.as_ref(), Some(winners[0]));
    assert!(stored.claimed_at.is_some());
}

#[test]
fn test_release_is_idempotent_and_reclaimable() {
    let harness = harness_with_pages(&["42"]);
    let label = enroll(&harness, "p1", "42", Utc::now());
    let pool = &harness.app.pool;

    // Releasing an available label changes nothing.
    assert!(pool.release(&label.id).unwrap().is_none());
    assert_eq!(pool.get(&label.id).unwrap().unwrap().status, LabelStatus::Available);

    assert!(matches!(pool.claim(&label.id, "order-1").unwrap(), ClaimOutcome::Claimed(_)));
    let released = pool.release(&label.id).unwrap().unwrap();
    assert_eq!(released.status, LabelStatus::Available);
    assert_eq!(released.claimed_by, None);
    assert!(pool.release(&label.id).unwrap().is_none());

    match pool.claim(&label.id, "order-2").unwrap() {
        ClaimOutcome::Claimed(l) => assert_eq!(l.claimed_by.as_deref(), Some("order-2")),
        other => panic!("Expected claim to succeed, got {:?}", other),
    }
}

#[test]
fn test_release_for_order_finds_claim() {
    let harness = harness_with_pages(&["42", "43"]);
    let first = enroll(&harness, "p1", "42", Utc::now());
    enroll(&harness, "p2", "43", Utc::now());
    let pool = &harness.app.pool;

    pool.claim(&first.id, "ORD-1").unwrap();
    assert!(pool.release_for_order("ORD-1", "owner-b", None).unwrap().is_none());

    let released = pool.release_for_order("ORD-1", "owner-a", None).unwrap().unwrap();
    assert_eq!(released.id, first.id);
    assert!(pool.release_for_order("ORD-1", "owner-a", None).unwrap().is_none());
}

#[test]
fn test_expired_label_leaves_lookup() {
    let harness = harness_with_pages(&["42"]);
    let pool = &harness.app.pool;
    let created = Utc::now() - pool.retention() - Duration::minutes(1);
    let label = enroll(&harness, "p1", "42", created);

    assert_eq!(pool.get(&label.id).unwrap().unwrap().status, LabelStatus::Available);
    assert!(pool.lookup("42", "courier-1", "owner-a").unwrap().is_none());

    assert_eq!(pool.expire_sweep().unwrap(), 1);
    assert_eq!(pool.get(&label.id).unwrap().unwrap().status, LabelStatus::Expired);
    assert!(pool.lookup("42", "courier-1", "owner-a").unwrap().is_none());
    assert_eq!(pool.expire_sweep().unwrap(), 0);

    // Expired is final.
    assert!(matches!(
        pool.claim(&label.id, "order-1").unwrap(),
        ClaimOutcome::Unavailable { status: LabelStatus::Expired }
    ));
    assert!(pool.cancel(&label.id).unwrap().is_none());
}

#[test]
fn test_sweep_leaves_claimed_labels() {
    let harness = harness_with_pages(&["42"]);
    let pool = &harness.app.pool;
    let label = enroll(&harness, "p1", "42", Utc::now());
    pool.claim(&label.id, "order-1").unwrap();

    let later = Utc::now() + pool.retention() + Duration::days(1);
    assert_eq!(pool.expire_sweep_at(later).unwrap(), 0);
    assert_eq!(pool.get(&label.id).unwrap().unwrap().status, LabelStatus::Claimed);
}

#[test]
fn test_lookup_prefers_earliest_label() {
    let harness = harness_with_pages(&["42", "42", "7"]);
    let now = Utc::now();
    let newer = enroll(&harness, "p1", "42", now);
    let older = enroll(&harness, "p2", "42", now - Duration::hours(1));
    enroll(&harness, "p3", "7", now);
    let pool = &harness.app.pool;

    assert_eq!(pool.lookup("42", "courier-1", "owner-a").unwrap().unwrap().id, older.id);
    assert!(pool.lookup("42", "courier-2", "owner-a").unwrap().is_none());
    assert!(pool.lookup("42", "courier-1", "owner-b").unwrap().is_none());

    pool.claim(&older.id, "order-1").unwrap();
    assert_eq!(pool.lookup("42", "courier-1", "owner-a").unwrap().unwrap().id, newer.id);
}

#[test]
fn test_stats_and_hints() {
    let harness = harness_with_pages(&["1", "2", "2", "3"]);
    let pool = &harness.app.pool;
    let now = Utc::now();
    let a = enroll(&harness, "p1", "1", now - Duration::minutes(3));
    enroll(&harness, "p2", "2", now - Duration::minutes(2));
    enroll(&harness, "p3", "2", now - Duration::minutes(1));
    let d = enroll(&harness, "p4", "3", now);

    pool.claim(&a.id, "order-1").unwrap();
    pool.cancel(&d.id).unwrap();

    let stats = pool.stats("owner-a", None).unwrap();
    assert_eq!(stats.counts.total, 4);
    assert_eq!(stats.counts.available, 2);
    assert_eq!(stats.counts.claimed, 1);
    assert_eq!(stats.counts.cancelled, 1);
    assert_eq!(stats.labels.len(), 2);
    assert!(stats.labels[0].created_at >= stats.labels[1].created_at);

    assert_eq!(pool.stats("owner-b", None).unwrap().counts.total, 0);
    assert_eq!(pool.stats("owner-a", Some("courier-9")).unwrap().counts.total, 0);

    assert_eq!(
        pool.available_references("owner-a", "courier-1", 5).unwrap(),
        vec!["2".to_string()]
    );
    assert!(pool.available_references("owner-a", "courier-1", 0).unwrap().is_empty());
}
