// # Memory Account Store
//
// In-memory implementation of AccountStore.
//
// ## Purpose
//
// Holds accounts for the lifetime of the process only. Useful for tests and
// for embedding the reconciler where the caller persists accounts itself.
//
// ## Crash Behavior
//
// - All accounts are lost on exit
// - The next run registers a new account and has to re-point the CNAME

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::domain::{Account, normalize_domain};
use crate::traits::AccountStore;

/// In-memory account store implementation
///
/// Clones share the same mapping, so a test can keep a handle while the
/// reconciler owns another.
///
/// # Example
///
/// ```rust,no_run
/// use acmedns_core::state::MemoryAccountStore;
/// use acmedns_core::traits::AccountStore;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryAccountStore::new();
///     assert!(store.fetch("example.org").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountStore {
    inner: Arc<RwLock<HashMap<String, Account>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryAccountStore {
    /// Create a new empty memory account store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one account
    pub fn with_account(domain: &str, account: Account) -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(normalize_domain(domain).to_string(), account);
        Self {
            inner: Arc::new(RwLock::new(accounts)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times `save` was called
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn fetch(&self, domain: &str) -> Result<Option<Account>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(normalize_domain(domain)).cloned())
    }

    async fn put(&self, domain: &str, account: Account) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(normalize_domain(domain).to_string(), account);
        Ok(())
    }

    async fn save(&self) -> Result<(), Error> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
