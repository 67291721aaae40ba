// # Record Manager Trait
//
// Defines the interface for managing the delegating CNAME in the zone that is
// being validated.
//
// ## Implementations
//
// - openIPAM: `acmedns-provider-openipam` crate

use async_trait::async_trait;

use crate::domain::RecordId;

/// Trait for zone-management APIs
///
/// Failures of `create_cname` and `delete_cname` are recoverable: the
/// reconciler falls back to printing the record for the operator.
///
/// # Trust Level: Untrusted
///
/// ## Forbidden Capabilities
/// - ❌ Retry logic (a failure is returned once)
/// - ❌ Decide whether a record needs to change (owned by `Reconciler`)
/// - ❌ Log the API token
#[async_trait]
pub trait RecordManager: Send + Sync {
    /// Create `name CNAME target`
    ///
    /// # Errors
    ///
    /// `Error::CnameCreateFailed` on transport failure or a non-2xx status.
    async fn create_cname(&self, name: &str, target: &str) -> Result<(), crate::Error>;

    /// List the ids of CNAME records named `name`
    async fn list_cnames(&self, name: &str) -> Result<Vec<RecordId>, crate::Error>;

    /// Delete every CNAME record named `name`
    ///
    /// Deleting when no record exists succeeds without a delete call.
    ///
    /// # Returns
    ///
    /// The number of records removed.
    ///
    /// # Errors
    ///
    /// `Error::CnameDeleteFailed` if listing or any deletion fails.
    async fn delete_cname(&self, name: &str) -> Result<usize, crate::Error>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
