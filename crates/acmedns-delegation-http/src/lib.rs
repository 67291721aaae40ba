// # acme-dns Delegation Client
//
// This crate provides the acme-dns HTTP API client for the acme-dns hook.
//
// ## Architectural Constraints
//
// ### Trust Level: Untrusted (Delegation Service)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to the acme-dns endpoint only
// - ✅ Parse acme-dns responses
//
// **Forbidden Capabilities**:
// - ❌ Retry registration or updates (a rejection is surfaced at once)
// - ❌ Access the account store (owned by `Reconciler`)
// - ❌ Spawn tasks or threads
//
// ## Security Requirements
//
// - Account passwords travel in the `X-Api-Key` header, never in the URL
// - Passwords NEVER appear in logs or error messages
//
// ## API Reference
//
// - Register: POST `/register` with optional `{"allowfrom": [...]}`, 201 on success
// - Update: POST `/update` with `X-Api-User`/`X-Api-Key`, 200 on success

use acmedns_core::traits::DelegationService;
use acmedns_core::{Account, Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const API_USER_HEADER: &str = "X-Api-User";
const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Serialize)]
struct RegisterRequest<'a> {
    allowfrom: &'a [String],
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    subdomain: &'a str,
    txt: &'a str,
}

/// acme-dns HTTP API client
///
/// Stateless apart from the connection pool; every call is one request.
#[derive(Debug, Clone)]
pub struct AcmeDnsClient {
    /// Base URL without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl AcmeDnsClient {
    /// Create a new client
    ///
    /// # Parameters
    ///
    /// - `base_url`: acme-dns instance, e.g. `https://acmedns.usu.edu`
    /// - `timeout`: Per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Pretty-print a JSON body, falling back to the raw text
fn pretty_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| body.to_string())
}

/// Diagnostic dump of an update request with the API key masked
fn describe_update(account: &Account, update: &UpdateRequest<'_>) -> String {
    let headers = serde_json::json!({
        "X-Api-User": account.username,
        "X-Api-Key": "<REDACTED>",
        "Content-Type": "application/json",
    });
    let body = serde_json::json!({
        "subdomain": update.subdomain,
        "txt": update.txt,
    });

    format!(
        "{}\n{}",
        serde_json::to_string_pretty(&headers).unwrap_or_default(),
        serde_json::to_string_pretty(&body).unwrap_or_default()
    )
}

#[async_trait]
impl DelegationService for AcmeDnsClient {
    /// Register a new account
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /register
    /// Content-Type: application/json
    ///
    /// {"allowfrom": ["129.123.0.0/16"]}
    /// ```
    ///
    /// The body is omitted entirely when `allow_from` is empty.
    async fn register_account(&self, allow_from: &[String]) -> Result<Account> {
        let url = format!("{}/register", self.base_url);
        tracing::debug!(
            "Registering acme-dns account at {} (allow_from: {:?})",
            url,
            allow_from
        );

        let mut request = self.client.post(&url);
        if !allow_from.is_empty() {
            request = request.json(&RegisterRequest {
                allowfrom: allow_from,
            });
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("Registration request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::RegistrationFailed {
                status: status.as_u16(),
                body,
            });
        }

        let account: Account = response
            .json()
            .await
            .map_err(|e| Error::http(format!("Invalid registration response: {}", e)))?;

        tracing::debug!("Registered acme-dns subdomain {}", account.subdomain);
        Ok(account)
    }

    /// Publish the TXT value
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /update
    /// X-Api-User: <username>
    /// X-Api-Key: <password>
    ///
    /// {"subdomain": "...", "txt": "..."}
    /// ```
    async fn update_txt_record(&self, account: &Account, txt: &str) -> Result<()> {
        let url = format!("{}/update", self.base_url);
        let update = UpdateRequest {
            subdomain: &account.subdomain,
            txt,
        };

        tracing::debug!("Updating TXT record for {}", account.fulldomain);

        let response = self
            .client
            .post(&url)
            .header(API_USER_HEADER, &account.username)
            .header(API_KEY_HEADER, &account.password)
            .json(&update)
            .send()
            .await
            .map_err(|e| Error::http(format!("Update request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(Error::UpdateFailed {
            status: status.as_u16(),
            request: describe_update(account, &update),
            body: pretty_body(&body),
        })
    }

    fn service_name(&self) -> &'static str {
        "acme-dns"
    }
}
