//! Configuration types for the acme-dns hook
//!
//! The configuration is built once at startup and passed by reference. Every
//! field has a default, so a missing config file is not an error.
//!
//! ```toml
//! [acmedns]
//! url = "https://acmedns.usu.edu"
//! storage = "/etc/letsencrypt/acmedns.json"
//! allow_from = ["129.123.0.0/16", "144.39.0.0/16"]
//! force_register = false
//!
//! [openipam]
//! url = "https://openipam.usu.edu"
//! token = "..."
//!
//! [dns]
//! nameservers = ["129.123.0.1", "129.123.0.2"]
//! propagation_timeout = 300
//! ```

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::PropagationConfig;
use crate::error::{Error, Result};

/// Default location of the config file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/letsencrypt/acmedns.toml";

/// Main hook configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// acme-dns service and account storage
    pub acmedns: AcmeDnsConfig,

    /// Zone-management API used for the delegating CNAME
    pub openipam: ZoneApiConfig,

    /// Resolution and propagation settings
    pub dns: DnsConfig,

    /// Outbound HTTP settings
    pub http: HttpConfig,
}

impl HookConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Invalid config: {}", e)))
    }

    /// Load configuration from a file
    ///
    /// A missing file yields the defaults. An unreadable or malformed file is
    /// an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!("Loaded config file: {}", path.display());
                Self::from_toml_str(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Config file not found, using defaults: {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_url("acmedns.url", &self.acmedns.url)?;
        validate_url("openipam.url", &self.openipam.url)?;

        if self.acmedns.storage.as_os_str().is_empty() {
            return Err(Error::config("acmedns.storage cannot be empty"));
        }

        if self.openipam.token.as_deref().is_some_and(str::is_empty) {
            return Err(Error::config("openipam.token cannot be empty when set"));
        }

        self.dns.validate()?;

        // A corrected record must be able to take effect within the wait window
        if self.openipam.cname_ttl >= self.dns.propagation_timeout {
            return Err(Error::config(format!(
                "openipam.cname_ttl ({}s) must be shorter than dns.propagation_timeout ({}s)",
                self.openipam.cname_ttl, self.dns.propagation_timeout
            )));
        }

        if self.http.timeout == 0 {
            return Err(Error::config("http.timeout must be > 0"));
        }

        Ok(())
    }
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(Error::config(format!("{} cannot be empty", field)));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(Error::config(format!(
            "{} must use HTTP or HTTPS scheme. Got: {}",
            field, url
        )));
    }
    Ok(())
}

/// acme-dns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcmeDnsConfig {
    /// Base URL of the acme-dns instance
    pub url: String,

    /// Path of the account storage file
    pub storage: PathBuf,

    /// Networks allowed to push TXT updates for newly registered accounts
    pub allow_from: Vec<String>,

    /// Register a new account even when one is stored
    pub force_register: bool,
}

impl Default for AcmeDnsConfig {
    fn default() -> Self {
        Self {
            url: "https://acmedns.usu.edu".to_string(),
            storage: PathBuf::from("/etc/letsencrypt/acmedns.json"),
            allow_from: vec!["129.123.0.0/16".to_string(), "144.39.0.0/16".to_string()],
            force_register: false,
        }
    }
}

/// Zone-management API configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneApiConfig {
    /// Base URL of the openIPAM instance
    pub url: String,

    /// API token; `None` means CNAMEs are managed by hand
    /// ⚠️ NEVER log this value
    pub token: Option<String>,

    /// TTL of the delegating CNAME, in seconds
    pub cname_ttl: u64,
}

impl Default for ZoneApiConfig {
    fn default() -> Self {
        Self {
            url: "https://openipam.usu.edu".to_string(),
            token: None,
            cname_ttl: 60,
        }
    }
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for ZoneApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneApiConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("cname_ttl", &self.cname_ttl)
            .finish()
    }
}

/// DNS resolution and propagation configuration (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Nameservers to query; empty means the system resolver
    pub nameservers: Vec<IpAddr>,

    /// Wait before the first check
    pub propagation_pre_wait: u64,

    /// Wait between checks
    pub propagation_wait: u64,

    /// Maximum time spent checking
    pub propagation_timeout: u64,

    /// Extra wait after the record is seen, for safety
    pub propagation_post_wait: u64,
}

impl DnsConfig {
    /// Validate the DNS configuration
    pub fn validate(&self) -> Result<()> {
        if self.propagation_wait == 0 {
            return Err(Error::config("dns.propagation_wait must be > 0"));
        }
        if self.propagation_timeout == 0 {
            return Err(Error::config("dns.propagation_timeout must be > 0"));
        }
        Ok(())
    }

    /// Propagation timings as durations
    pub fn propagation(&self) -> PropagationConfig {
        PropagationConfig {
            pre_wait: Duration::from_secs(self.propagation_pre_wait),
            poll_interval: Duration::from_secs(self.propagation_wait),
            timeout: Duration::from_secs(self.propagation_timeout),
            post_wait: Duration::from_secs(self.propagation_post_wait),
        }
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            propagation_pre_wait: 30,
            propagation_wait: 10,
            propagation_timeout: 300,
            propagation_post_wait: 10,
        }
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout: u64,
}

impl HttpConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout: 30 }
    }
}
