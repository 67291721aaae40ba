// # Account Store Trait
//
// Defines the interface for durable delegation-account storage.
//
// ## Purpose
//
// The store keeps the acme-dns account issued for each base domain so that
// renewals reuse the same delegation target instead of registering again and
// invalidating the CNAME that points at it.
//
// ## Keying
//
// Keys are normalized with `normalize_domain`: a wildcard domain and its base
// domain address the same entry.

use async_trait::async_trait;

use crate::domain::Account;

/// Trait for account store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Cache the full mapping in memory between `put` and `save`
///
/// ## Forbidden Capabilities
/// - ❌ Decide when an account is (re)registered (owned by `Reconciler`)
/// - ❌ Exit the process on failure (return an error instead)
/// - ❌ Recover silently from a corrupted file
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get the stored account for a domain
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Account))`: The stored account
    /// - `Ok(None)`: No account for this domain
    async fn fetch(&self, domain: &str) -> Result<Option<Account>, crate::Error>;

    /// Insert or overwrite the account for a domain
    ///
    /// Only changes the in-memory mapping; call [`AccountStore::save`] for
    /// durability.
    async fn put(&self, domain: &str, account: Account) -> Result<(), crate::Error>;

    /// Persist the full mapping
    ///
    /// # Errors
    ///
    /// `Error::StorageWriteFailed` if the mapping could not be written.
    async fn save(&self) -> Result<(), crate::Error>;

    /// Number of stored accounts
    async fn len(&self) -> usize;

    /// Whether the store holds no accounts
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
