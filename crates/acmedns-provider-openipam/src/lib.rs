// # openIPAM Record Manager
//
// This crate manages the delegating CNAME through the openIPAM REST API.
//
// ## Architectural Constraints
//
// ### Trust Level: Untrusted (Record Manager)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to the openIPAM endpoint only
// - ✅ Parse openIPAM responses
//
// **Forbidden Capabilities**:
// - ❌ Retry logic (a failure is returned once; the reconciler falls back
//   to manual instructions)
// - ❌ Decide whether a record needs to change (owned by `Reconciler`)
// - ❌ Spawn tasks or threads
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - Add record: POST `/api/dns/add/` (form: name, dns_type, content, ttl)
// - List records: GET `/api/dns/?name=...&type=CNAME&limit=0` (bare array)
// - Delete record: DELETE `/api/dns/:id/delete`

use acmedns_core::traits::RecordManager;
use acmedns_core::{Error, RecordId, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Default TTL of the delegating CNAME (seconds)
///
/// Must stay below the propagation timeout so a corrected record takes
/// effect within one wait window.
pub const DEFAULT_CNAME_TTL: u64 = 60;

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Entry of the unpaginated record listing
#[derive(Debug, Deserialize)]
struct RecordEntry {
    id: RecordId,
}

/// openIPAM CNAME manager
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct OpenIpamProvider {
    /// Base URL without trailing slash
    base_url: String,

    /// openIPAM API token
    /// ⚠️ NEVER log this value
    token: String,

    /// TTL of created records
    cname_ttl: u64,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for OpenIpamProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenIpamProvider")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .field("cname_ttl", &self.cname_ttl)
            .finish()
    }
}

impl OpenIpamProvider {
    /// Create a new openIPAM provider
    ///
    /// # Parameters
    ///
    /// - `base_url`: openIPAM instance, e.g. `https://openipam.usu.edu`
    /// - `token`: API token sent as `Authorization: Token <token>`
    /// - `cname_ttl`: TTL of created CNAME records, in seconds
    /// - `timeout`: Per-request timeout
    ///
    /// # Errors
    ///
    /// `Error::Config` if the token is empty.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        cname_ttl: u64,
        timeout: Duration,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::config("openIPAM API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            cname_ttl,
            client,
        })
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Delete a single record by id
    ///
    /// ```http
    /// DELETE /api/dns/:id/delete
    /// Authorization: Token <token>
    /// ```
    async fn delete_record(&self, id: &RecordId) -> Result<()> {
        let url = format!("{}/api/dns/{}/delete", self.base_url, id);

        let response = self
            .client
            .delete(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| Error::cname_delete(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::cname_delete(format!(
                "Deleting record {} failed: {} - {}",
                id, status, error_text
            )));
        }

        tracing::debug!("Deleted DNS record {}", id);
        Ok(())
    }
}

#[async_trait]
impl RecordManager for OpenIpamProvider {
    /// Create `name CNAME target`
    ///
    /// ```http
    /// POST /api/dns/add/
    /// Authorization: Token <token>
    /// Content-Type: application/x-www-form-urlencoded
    ///
    /// name=...&dns_type=CNAME&content=...&ttl=60
    /// ```
    async fn create_cname(&self, name: &str, target: &str) -> Result<()> {
        let url = format!("{}/api/dns/add/", self.base_url);
        let ttl = self.cname_ttl.to_string();

        tracing::debug!("Creating CNAME {} -> {} (ttl {})", name, target, ttl);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .form(&[
                ("name", name),
                ("dns_type", "CNAME"),
                ("content", target),
                ("ttl", ttl.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::cname_create(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // openIPAM explains validation failures in the body of a 400
        if status == StatusCode::BAD_REQUEST {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::cname_create(format!(
                "{} - Response: {}",
                status, error_text
            )));
        }

        Err(Error::cname_create(format!("{}", status)))
    }

    /// List CNAME records named `name`
    ///
    /// ```http
    /// GET /api/dns/?name=...&type=CNAME&limit=0
    /// Authorization: Token <token>
    /// ```
    ///
    /// With `limit=0` the API skips pagination and returns a bare array.
    async fn list_cnames(&self, name: &str) -> Result<Vec<RecordId>> {
        let url = format!("{}/api/dns/", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .query(&[("name", name), ("type", "CNAME"), ("limit", "0")])
            .send()
            .await
            .map_err(|e| Error::cname_delete(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::cname_delete(format!(
                "Record lookup failed: {} - {}",
                status, error_text
            )));
        }

        let records: Vec<RecordEntry> = response
            .json()
            .await
            .map_err(|e| Error::cname_delete(format!("Failed to parse response: {}", e)))?;

        Ok(records.into_iter().map(|r| r.id).collect())
    }

    async fn delete_cname(&self, name: &str) -> Result<usize> {
        let ids = self.list_cnames(name).await?;

        if ids.is_empty() {
            tracing::info!("No CNAME record found for {}", name);
            return Ok(0);
        }

        // Normally a single record, but remove every match
        for id in &ids {
            self.delete_record(id).await?;
        }

        Ok(ids.len())
    }

    fn provider_name(&self) -> &'static str {
        "openipam"
    }
}
