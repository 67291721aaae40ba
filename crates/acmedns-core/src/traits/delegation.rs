// # Delegation Service Trait
//
// Defines the interface to the delegated TXT service (acme-dns).
//
// ## Implementations
//
// - acme-dns HTTP API: `acmedns-delegation-http` crate

use async_trait::async_trait;

use crate::domain::Account;

/// Trait for delegated TXT services
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to the service endpoint only
/// - ✅ Return success or a descriptive failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry mutations (a rejected registration or update is surfaced at once)
/// - ❌ Access the account store (owned by `Reconciler`)
/// - ❌ Log account passwords
#[async_trait]
pub trait DelegationService: Send + Sync {
    /// Register a new account
    ///
    /// # Parameters
    ///
    /// - `allow_from`: CIDR ranges allowed to push updates; empty means no
    ///   restriction is requested
    ///
    /// # Errors
    ///
    /// `Error::RegistrationFailed` carrying the HTTP status and body when the
    /// service does not answer with its "created" status.
    async fn register_account(&self, allow_from: &[String]) -> Result<Account, crate::Error>;

    /// Publish `txt` as the account's TXT value
    ///
    /// # Errors
    ///
    /// `Error::UpdateFailed` carrying a redacted request dump and the response.
    async fn update_txt_record(&self, account: &Account, txt: &str) -> Result<(), crate::Error>;

    /// Service name (for logging/debugging)
    fn service_name(&self) -> &'static str;
}
