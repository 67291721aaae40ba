//! Architectural Contract Test: Reconciliation Decisions
//!
//! This test verifies the end-to-end decision flow of the Reconciler against
//! mock services.
//!
//! Constraints verified:
//! - A new domain is registered, delegated, published and awaited
//! - An already-correct delegation causes no remote mutation
//! - A stale delegation is deleted before it is recreated
//! - Wildcard and base domain reuse the same stored account
//!
//! If this test fails, the reconciliation state machine is broken.

mod common;

use acmedns_core::traits::AccountStore;
use acmedns_core::{
    Challenge, Domain, Error, HookConfig, MemoryAccountStore, ReconcileEvent, ReconcileOutcome,
    Reconciler,
};
use common::*;
use tokio::sync::mpsc::Receiver;

fn challenge(domain: &str, token: &str) -> Challenge {
    Challenge::new(Domain::new(domain).unwrap(), token).unwrap()
}

struct Harness {
    journal: Journal,
    delegation: MockDelegation,
    records: MockRecordManager,
    probe: ScriptedProbe,
    store: MemoryAccountStore,
}

impl Harness {
    fn new(store: MemoryAccountStore, answers: &[ProbeAnswer]) -> Self {
        let journal = Journal::new();
        Self {
            delegation: MockDelegation::new(&journal),
            records: MockRecordManager::new(&journal),
            probe: ScriptedProbe::new(&journal, answers),
            store,
            journal,
        }
    }

    fn reconciler(&self, config: &HookConfig) -> (Reconciler, Receiver<ReconcileEvent>) {
        let (reconciler, events) = Reconciler::new(
            Box::new(self.delegation.clone()),
            Some(Box::new(self.records.clone())),
            Box::new(self.probe.clone()),
            Box::new(self.store.clone()),
            config,
        )
        .expect("reconciler construction succeeds");
        (reconciler.with_propagation(fast_propagation()), events)
    }
}

fn drain(mut events: Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn new_domain_is_registered_delegated_and_published() {
    let h = Harness::new(MemoryAccountStore::new(), &[ProbeAnswer::Match]);
    let (reconciler, events) = h.reconciler(&minimal_config());

    let outcome = reconciler
        .reconcile(&challenge("example.org", "token-1"))
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Propagated { .. }));
    assert!(outcome.is_success());

    assert_eq!(
        h.journal.entries(),
        vec![
            "register allow_from=129.123.0.0/16,144.39.0.0/16".to_string(),
            "create _acme-challenge.example.org new-1.auth.example.org".to_string(),
            "update new-1 token-1".to_string(),
            "probe _acme-challenge.example.org token-1".to_string(),
        ]
    );

    // Account persisted before the TXT update
    assert_eq!(
        h.store.fetch("example.org").await.unwrap(),
        Some(account("new-1"))
    );
    assert_eq!(h.store.save_count(), 1);

    let events = drain(events);
    assert!(matches!(
        events.first(),
        Some(ReconcileEvent::AccountRegistered { .. })
    ));
    assert!(matches!(
        events.last(),
        Some(ReconcileEvent::PropagationConfirmed { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn correct_existing_delegation_makes_no_mutation() {
    let store = MemoryAccountStore::with_account("example.org", account("old"));
    let h = Harness::new(store, &[ProbeAnswer::Match]);
    let (reconciler, events) = h.reconciler(&minimal_config());

    let outcome = reconciler
        .reconcile(&challenge("example.org", "token-1"))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::AlreadyValid);
    assert_eq!(
        h.journal.entries(),
        vec!["probe _acme-challenge.example.org token-1".to_string()]
    );
    assert_eq!(h.store.save_count(), 0);
    assert_eq!(
        drain(events),
        vec![ReconcileEvent::RecordValid {
            name: "_acme-challenge.example.org".to_string()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn stale_delegation_is_deleted_then_recreated() {
    let store = MemoryAccountStore::with_account("example.org", account("old"));
    let h = Harness::new(store, &[ProbeAnswer::Mismatch, ProbeAnswer::Match]);
    h.records.set_existing(2);
    let (reconciler, events) = h.reconciler(&minimal_config());

    let outcome = reconciler
        .reconcile(&challenge("example.org", "token-2"))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(h.delegation.registration_count(), 0);

    let delete = h.journal.position("delete ").unwrap();
    let create = h.journal.position("create ").unwrap();
    let update = h.journal.position("update ").unwrap();
    assert!(delete < create, "delete must precede create");
    assert!(create < update, "create must precede the TXT update");

    assert!(drain(events).contains(&ReconcileEvent::CnameDeleted {
        name: "_acme-challenge.example.org".to_string(),
        count: 2,
    }));

    // The stored account is reused, not replaced
    assert_eq!(
        h.journal.matching("create "),
        vec!["create _acme-challenge.example.org old.auth.example.org".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn unresolvable_delegation_is_treated_as_stale() {
    let store = MemoryAccountStore::with_account("example.org", account("old"));
    let h = Harness::new(store, &[ProbeAnswer::NotFound, ProbeAnswer::Match]);
    let (reconciler, events) = h.reconciler(&minimal_config());

    let outcome = reconciler
        .reconcile(&challenge("example.org", "token-3"))
        .await
        .unwrap();

    assert!(outcome.is_success());
    // Nothing to delete is still a successful deletion
    assert!(drain(events).contains(&ReconcileEvent::CnameDeleted {
        name: "_acme-challenge.example.org".to_string(),
        count: 0,
    }));
    assert_eq!(h.journal.matching("create ").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn wildcard_reuses_base_domain_account() {
    let store = MemoryAccountStore::with_account("example.org", account("old"));
    let h = Harness::new(store, &[ProbeAnswer::Match]);
    let (reconciler, _events) = h.reconciler(&minimal_config());

    let outcome = reconciler
        .reconcile(&challenge("*.example.org", "token-4"))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::AlreadyValid);
    assert_eq!(h.delegation.registration_count(), 0);
    assert_eq!(
        h.journal.entries(),
        vec!["probe _acme-challenge.example.org token-4".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn force_register_replaces_stored_account() {
    let store = MemoryAccountStore::with_account("example.org", account("old"));
    let h = Harness::new(store, &[ProbeAnswer::Match]);
    let mut config = minimal_config();
    config.acmedns.force_register = true;
    config.acmedns.allow_from.clear();
    let (reconciler, _events) = h.reconciler(&config);

    reconciler
        .reconcile(&challenge("example.org", "token-5"))
        .await
        .unwrap();

    // No probe of the old delegation, and no allow-list requested
    assert_eq!(h.journal.entries()[0], "register allow_from=");
    assert_eq!(
        h.store.fetch("example.org").await.unwrap(),
        Some(account("new-1"))
    );
}

#[tokio::test(start_paused = true)]
async fn propagation_timeout_is_fatal_after_publishing() {
    let h = Harness::new(MemoryAccountStore::new(), &[ProbeAnswer::Mismatch]);
    let (reconciler, events) = h.reconciler(&minimal_config());

    let err = reconciler
        .reconcile(&challenge("example.org", "token-6"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::PropagationTimeout { .. }), "got {:?}", err);
    assert_eq!(h.journal.matching("update ").len(), 1);
    assert!(h.probe.call_count() > 1);
    assert!(matches!(
        drain(events).last(),
        Some(ReconcileEvent::PropagationTimedOut { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn resolver_failure_on_existing_delegation_is_fatal() {
    let store = MemoryAccountStore::with_account("example.org", account("old"));
    let h = Harness::new(store, &[ProbeAnswer::Fail]);
    let (reconciler, _events) = h.reconciler(&minimal_config());

    let err = reconciler
        .reconcile(&challenge("example.org", "token-7"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Resolve(_)), "got {:?}", err);
    assert_eq!(h.journal.entries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_registration_stops_before_any_mutation() {
    let journal = Journal::new();
    let store = MemoryAccountStore::new();
    let (reconciler, _events) = Reconciler::new(
        Box::new(MockDelegation::new(&journal).failing_register()),
        Some(Box::new(MockRecordManager::new(&journal))),
        Box::new(ScriptedProbe::new(&journal, &[ProbeAnswer::Match])),
        Box::new(store.clone()),
        &minimal_config(),
    )
    .unwrap();

    let err = reconciler
        .reconcile(&challenge("example.org", "token-8"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RegistrationFailed { status: 500, .. }));
    assert_eq!(journal.entries().len(), 1);
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn invalid_config_is_rejected_at_construction() {
    let journal = Journal::new();
    let mut config = minimal_config();
    config.dns.propagation_wait = 0;

    let result = Reconciler::new(
        Box::new(MockDelegation::new(&journal)),
        None,
        Box::new(ScriptedProbe::new(&journal, &[ProbeAnswer::Match])),
        Box::new(MemoryAccountStore::new()),
        &config,
    );

    assert!(matches!(result, Err(Error::Config(_))));
}
