//! Test doubles and common utilities for reconciliation contract tests
//!
//! Every double appends to a shared [`Journal`], so tests can assert the
//! exact order of remote mutations across components.

#![allow(dead_code)]

use acmedns_core::error::{Error, Result};
use acmedns_core::traits::{DelegationService, RecordManager, RecordProbe};
use acmedns_core::{Account, HookConfig, PropagationConfig, RecordId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered log of calls made by the reconciler
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries starting with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    /// Position of the first entry starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }
}

pub fn account(id: &str) -> Account {
    Account {
        subdomain: id.to_string(),
        username: format!("user-{}", id),
        password: format!("pass-{}", id),
        fulldomain: format!("{}.auth.example.org", id),
    }
}

/// A mock acme-dns service
///
/// Registration hands out `account("new-1")`, `account("new-2")`, ...
#[derive(Clone)]
pub struct MockDelegation {
    journal: Journal,
    registrations: Arc<AtomicUsize>,
    fail_register: bool,
    fail_update: bool,
}

impl MockDelegation {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            registrations: Arc::new(AtomicUsize::new(0)),
            fail_register: false,
            fail_update: false,
        }
    }

    pub fn failing_register(mut self) -> Self {
        self.fail_register = true;
        self
    }

    pub fn failing_update(mut self) -> Self {
        self.fail_update = true;
        self
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DelegationService for MockDelegation {
    async fn register_account(&self, allow_from: &[String]) -> Result<Account> {
        self.journal
            .record(format!("register allow_from={}", allow_from.join(",")));
        if self.fail_register {
            return Err(Error::RegistrationFailed {
                status: 500,
                body: "registration disabled".to_string(),
            });
        }
        let n = self.registrations.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(account(&format!("new-{}", n)))
    }

    async fn update_txt_record(&self, account: &Account, txt: &str) -> Result<()> {
        self.journal
            .record(format!("update {} {}", account.subdomain, txt));
        if self.fail_update {
            return Err(Error::UpdateFailed {
                status: 401,
                request: "POST /update".to_string(),
                body: "forbidden".to_string(),
            });
        }
        Ok(())
    }

    fn service_name(&self) -> &'static str {
        "mock-acmedns"
    }
}

/// A mock zone-management API
#[derive(Clone)]
pub struct MockRecordManager {
    journal: Journal,
    existing: Arc<AtomicUsize>,
    fail_create: bool,
    fail_delete: bool,
}

impl MockRecordManager {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            existing: Arc::new(AtomicUsize::new(0)),
            fail_create: false,
            fail_delete: false,
        }
    }

    /// Pretend `count` CNAME records already exist
    pub fn set_existing(&self, count: usize) {
        self.existing.store(count, Ordering::SeqCst);
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }
}

#[async_trait::async_trait]
impl RecordManager for MockRecordManager {
    async fn create_cname(&self, name: &str, target: &str) -> Result<()> {
        self.journal.record(format!("create {} {}", name, target));
        if self.fail_create {
            return Err(Error::cname_create("HTTP 400: record exists"));
        }
        self.existing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_cnames(&self, name: &str) -> Result<Vec<RecordId>> {
        self.journal.record(format!("list {}", name));
        let count = self.existing.load(Ordering::SeqCst) as u64;
        Ok((1..=count).map(RecordId::Number).collect())
    }

    async fn delete_cname(&self, name: &str) -> Result<usize> {
        self.journal.record(format!("delete {}", name));
        if self.fail_delete {
            return Err(Error::cname_delete("HTTP 500"));
        }
        Ok(self.existing.swap(0, Ordering::SeqCst))
    }

    fn provider_name(&self) -> &'static str {
        "mock-zone"
    }
}

/// What the probe answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAnswer {
    Match,
    Mismatch,
    NotFound,
    Fail,
}

/// A probe answering from a script, then repeating the last answer
#[derive(Clone)]
pub struct ScriptedProbe {
    journal: Journal,
    answers: Arc<Mutex<Vec<ProbeAnswer>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(journal: &Journal, answers: &[ProbeAnswer]) -> Self {
        let mut answers = answers.to_vec();
        answers.reverse();
        Self {
            journal: journal.clone(),
            answers: Arc::new(Mutex::new(answers)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordProbe for ScriptedProbe {
    async fn validate_record(&self, name: &str, expected: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.journal.record(format!("probe {} {}", name, expected));

        let answer = {
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.pop().unwrap()
            } else {
                answers.last().copied().unwrap_or(ProbeAnswer::NotFound)
            }
        };

        match answer {
            ProbeAnswer::Match => Ok(true),
            ProbeAnswer::Mismatch => Ok(false),
            ProbeAnswer::NotFound => Err(Error::not_found(name.to_string())),
            ProbeAnswer::Fail => Err(Error::resolve("SERVFAIL")),
        }
    }
}

/// Default hook configuration
pub fn minimal_config() -> HookConfig {
    HookConfig::default()
}

/// Short propagation window for tests running on a paused clock
pub fn fast_propagation() -> PropagationConfig {
    PropagationConfig {
        pre_wait: Duration::from_secs(1),
        poll_interval: Duration::from_secs(1),
        timeout: Duration::from_secs(5),
        post_wait: Duration::from_secs(1),
    }
}
