// # Record Probe Trait
//
// Defines the interface for checking what the validation subdomain resolves
// to from the outside.

use async_trait::async_trait;

/// Trait for TXT record probes
#[async_trait]
pub trait RecordProbe: Send + Sync {
    /// Check whether `name` serves the TXT value `expected`
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Some TXT record equals `expected`
    /// - `Ok(false)`: TXT records exist but none match
    /// - `Err(Error::NotFound)`: The name does not resolve (yet)
    /// - `Err(Error::Resolve)`: Any other resolution failure
    async fn validate_record(&self, name: &str, expected: &str) -> Result<bool, crate::Error>;
}
