// # Hickory TXT Probe
//
// This crate resolves the validation subdomain and compares its TXT records
// with the expected token.
//
// ## Matching
//
// Each TXT record is rendered in zone-file presentation form (every
// character-string quoted, strings separated by a space) and compared to the
// token wrapped in double quotes. A token split across several strings
// therefore never matches.
//
// ## Resolution
//
// - Configured nameservers are queried over UDP port 53
// - With no nameservers configured, the system resolver configuration is used
// - Caching is disabled: every check asks the nameservers again
// - NXDOMAIN and empty answers are reported as `Error::NotFound`

use acmedns_core::traits::RecordProbe;
use acmedns_core::{Error, Result};
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{ResolveError, Resolver, TokioResolver};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Per-query timeout
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// DNS port of configured nameservers
const DNS_PORT: u16 = 53;

/// TXT probe backed by hickory-resolver
pub struct HickoryProbe {
    resolver: TokioResolver,
    nameservers: Vec<IpAddr>,
}

impl std::fmt::Debug for HickoryProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryProbe")
            .field("nameservers", &self.nameservers)
            .finish()
    }
}

impl HickoryProbe {
    /// Create a probe querying `nameservers`
    ///
    /// An empty list selects the system resolver configuration.
    ///
    /// # Errors
    ///
    /// `Error::Resolve` if the system configuration cannot be read.
    pub fn new(nameservers: &[IpAddr]) -> Result<Self> {
        let mut opts = ResolverOpts::default();
        opts.timeout = QUERY_TIMEOUT;
        opts.cache_size = 0;

        let resolver = if nameservers.is_empty() {
            Resolver::builder_tokio()
                .map_err(|e| {
                    Error::resolve(format!("Failed to read system resolver configuration: {}", e))
                })?
                .with_options(opts)
                .build()
        } else {
            let mut config = ResolverConfig::new();
            for ip in nameservers {
                config.add_name_server(NameServerConfig::new(
                    SocketAddr::new(*ip, DNS_PORT),
                    Protocol::Udp,
                ));
            }
            Resolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build()
        };

        tracing::debug!("TXT probe using nameservers: {:?}", nameservers);

        Ok(Self {
            resolver,
            nameservers: nameservers.to_vec(),
        })
    }
}

/// Zone-file presentation of one TXT record
///
/// Bytes outside UTF-8 are replaced rather than written as `\DDD` escapes;
/// validation tokens are base64url and never contain them.
fn presentation(strings: &[Box<[u8]>]) -> String {
    strings
        .iter()
        .map(|s| {
            let mut quoted = String::with_capacity(s.len() + 2);
            quoted.push('"');
            for c in String::from_utf8_lossy(s).chars() {
                if c == '"' || c == '\\' {
                    quoted.push('\\');
                }
                quoted.push(c);
            }
            quoted.push('"');
            quoted
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether one TXT record carries exactly `expected`
fn matches_token(strings: &[Box<[u8]>], expected: &str) -> bool {
    presentation(strings) == format!("\"{}\"", expected)
}

/// Map a failed lookup of `name` to the hook's error taxonomy
///
/// NXDOMAIN and NODATA answers become `Error::NotFound`; everything else is
/// `Error::Resolve`.
fn classify(e: ResolveError, name: &str) -> Error {
    if e.is_nx_domain() || e.is_no_records_found() {
        Error::not_found(format!("{}: {}", name, e))
    } else {
        Error::resolve(format!("TXT lookup for '{}' failed: {}", name, e))
    }
}

/// Absolute form of `name`, so no search domain is appended
fn absolute(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

#[async_trait]
impl RecordProbe for HickoryProbe {
    async fn validate_record(&self, name: &str, expected: &str) -> Result<bool> {
        let lookup = self
            .resolver
            .txt_lookup(absolute(name))
            .await
            .map_err(|e| classify(e, name))?;

        for record in lookup.iter() {
            let found = presentation(record.txt_data());
            tracing::trace!(
                record = %name,
                found_value = %found,
                "Checking TXT record"
            );
            if matches_token(record.txt_data(), expected) {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
