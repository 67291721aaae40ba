//! Domain types shared by every component
//!
//! A wildcard domain and its base domain share one validation subdomain, so
//! every lookup key and record name goes through [`normalize_domain`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Label prepended to the domain to form the validation subdomain
pub const VALIDATION_LABEL: &str = "_acme-challenge";

/// Strip a single leading wildcard marker (`*.`)
pub fn normalize_domain(domain: &str) -> &str {
    domain.strip_prefix("*.").unwrap_or(domain)
}

/// Base domain under validation, wildcard marker already removed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    /// Parse and validate a domain name
    ///
    /// This implements basic DNS name validation per RFC 1035. Underscores
    /// are accepted because service labels are legal in record names.
    pub fn new(raw: &str) -> Result<Self> {
        let domain = normalize_domain(raw.trim()).trim_end_matches('.');

        if domain.is_empty() {
            return Err(Error::invalid_input("Domain name cannot be empty"));
        }

        if domain.len() > 253 {
            return Err(Error::invalid_input(format!(
                "Domain name too long: {} chars (max 253). Got: {}",
                domain.len(),
                domain
            )));
        }

        for label in domain.split('.') {
            if label.is_empty() {
                return Err(Error::invalid_input(format!(
                    "Domain name has empty label: '{}'",
                    domain
                )));
            }

            if label.len() > 63 {
                return Err(Error::invalid_input(format!(
                    "Domain label too long: {} chars (max 63). Label: '{}'",
                    label.len(),
                    label
                )));
            }

            if !label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(Error::invalid_input(format!(
                    "Domain label contains invalid characters. Label: '{}'",
                    label
                )));
            }

            if label.starts_with('-') || label.ends_with('-') {
                return Err(Error::invalid_input(format!(
                    "Domain label cannot start or end with hyphen. Label: '{}'",
                    label
                )));
            }
        }

        Ok(Self(domain.to_ascii_lowercase()))
    }

    /// The domain as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `_acme-challenge.<domain>`, always recomputed
    pub fn validation_subdomain(&self) -> String {
        format!("{}.{}", VALIDATION_LABEL, self.0)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One DNS-01 validation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Domain under validation
    pub domain: Domain,
    /// Expected TXT content
    pub token: String,
}

impl Challenge {
    /// Create a challenge, rejecting an empty token
    pub fn new(domain: Domain, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::invalid_input("Validation token cannot be empty"));
        }
        Ok(Self { domain, token })
    }

    /// Name the TXT record is published under
    pub fn validation_subdomain(&self) -> String {
        self.domain.validation_subdomain()
    }
}

/// Credentials and target issued by acme-dns on registration
///
/// Field names match the acme-dns `/register` response and the storage file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Subdomain identifier the TXT value is published under
    pub subdomain: String,
    /// API user (`X-Api-User`)
    pub username: String,
    /// API key (`X-Api-Key`)
    /// ⚠️ NEVER log this value
    pub password: String,
    /// Fully qualified target of the delegating CNAME
    pub fulldomain: String,
}

// Custom Debug implementation that hides the API key
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("subdomain", &self.subdomain)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("fulldomain", &self.fulldomain)
            .finish()
    }
}

/// The delegating record `_acme-challenge.<domain> CNAME <fulldomain>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnameRecord {
    /// Validation subdomain
    pub name: String,
    /// acme-dns `fulldomain`
    pub target: String,
}

impl CnameRecord {
    /// Build the record delegating `challenge` to `account`
    pub fn for_account(challenge: &Challenge, account: &Account) -> Self {
        Self {
            name: challenge.validation_subdomain(),
            target: account.fulldomain.trim_end_matches('.').to_string(),
        }
    }
}

/// Zone-file form of the record, exactly as an operator has to add it
impl fmt::Display for CnameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} CNAME {}.", self.name, self.target)
    }
}

/// Provider-side identifier of a DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric primary key
    Number(u64),
    /// Opaque string key
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(id) => write!(f, "{}", id),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}
