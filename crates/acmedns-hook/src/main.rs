// # acmedns-hook - certbot manual-auth hook
//
// This binary is a THIN integration layer. All reconciliation logic lives in
// acmedns-core; this file only:
// 1. Reads the certbot environment and the optional config file
// 2. Initializes logging and the runtime
// 3. Wires the acme-dns client, openIPAM provider, TXT probe and account store
// 4. Runs one reconciliation and maps its outcome to an exit code
//
// ## Configuration
//
// ### Environment
// - `CERTBOT_DOMAIN`: Domain under validation (set by certbot)
// - `CERTBOT_VALIDATION`: TXT token (set by certbot)
// - `OPENIPAM_URL`: Overrides `openipam.url`
// - `OPENIPAM_TOKEN`: Overrides `openipam.token`; without a token the CNAME
//   has to be added by hand
// - `ACMEDNS_CONFIG`: Config file path (default `/etc/letsencrypt/acmedns.toml`)
// - `ACMEDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// certbot certonly --manual --preferred-challenges dns \
//     --manual-auth-hook /usr/local/bin/acmedns-hook \
//     -d example.org -d '*.example.org'
// ```
//
// Logs go to stderr; stdout carries only the instructions for the operator.

use acmedns_core::config::DEFAULT_CONFIG_PATH;
use acmedns_core::{
    Challenge, Domain, FileAccountStore, HookConfig, ReconcileEvent, ReconcileOutcome, Reconciler,
    RecordManager,
};
use acmedns_delegation_http::AcmeDnsClient;
use acmedns_probe_hickory::HickoryProbe;
use acmedns_provider_openipam::OpenIpamProvider;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the possible outcomes of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookExitCode {
    /// Record propagated, or already correct
    Success = 0,
    /// Configuration or startup failure
    ConfigError = 1,
    /// Storage, acme-dns, DNS or propagation failure
    RuntimeError = 2,
    /// The operator has to change DNS by hand
    ManualAction = 3,
}

impl From<HookExitCode> for ExitCode {
    fn from(code: HookExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process environment
struct Config {
    domain: String,
    validation: String,
    openipam_url: Option<String>,
    openipam_token: Option<String>,
    config_path: PathBuf,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            domain: env::var("CERTBOT_DOMAIN")
                .context("CERTBOT_DOMAIN is required (this hook is run by certbot)")?,
            validation: env::var("CERTBOT_VALIDATION")
                .context("CERTBOT_VALIDATION is required (this hook is run by certbot)")?,
            openipam_url: env::var("OPENIPAM_URL").ok(),
            openipam_token: env::var("OPENIPAM_TOKEN").ok(),
            config_path: env::var("ACMEDNS_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
            log_level: env::var("ACMEDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Parsed log level
    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ACMEDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Apply environment overrides on top of the file configuration
    fn apply_overrides(&self, hook_config: &mut HookConfig) {
        if let Some(ref url) = self.openipam_url {
            hook_config.openipam.url = url.clone();
        }
        // An empty variable means "unset", not "empty token"
        if let Some(ref token) = self.openipam_token {
            hook_config.openipam.token = if token.is_empty() {
                None
            } else {
                Some(token.clone())
            };
        }
    }

    /// Load the config file, apply overrides and validate
    fn hook_config(&self) -> Result<HookConfig> {
        let mut hook_config = HookConfig::load(&self.config_path)?;
        self.apply_overrides(&mut hook_config);
        hook_config.validate()?;
        Ok(hook_config)
    }

    /// The validation request certbot asked for
    fn challenge(&self) -> Result<Challenge> {
        let domain = Domain::new(&self.domain).context("Invalid CERTBOT_DOMAIN")?;
        Ok(Challenge::new(domain, self.validation.clone())?)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return HookExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return HookExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return HookExitCode::ConfigError.into();
    }

    let (hook_config, challenge) = match config.hook_config().and_then(|hc| {
        let challenge = config.challenge()?;
        Ok((hc, challenge))
    }) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return HookExitCode::ConfigError.into();
        }
    };

    info!(
        "Starting acme-dns hook for {} (config: {})",
        challenge.domain,
        config.config_path.display()
    );

    // Single-threaded: one sequential reconciliation per process
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HookExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_hook(hook_config, challenge)).into()
}

/// Wire the components, run one reconciliation and report the result
async fn run_hook(hook_config: HookConfig, challenge: Challenge) -> HookExitCode {
    let (reconciler, mut events) = match build_reconciler(&hook_config).await {
        Ok(built) => built,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return HookExitCode::RuntimeError;
        }
    };

    let result = reconciler.reconcile(&challenge).await;

    // The run is over; drain what was emitted
    while let Ok(event) = events.try_recv() {
        debug!(?event, "Reconcile event");
    }

    match result {
        Ok(ReconcileOutcome::ManualActionRequired(instruction)) => {
            println!("{}", instruction);
            HookExitCode::ManualAction
        }
        Ok(ReconcileOutcome::AlreadyValid) => {
            info!("Validation record already in place");
            HookExitCode::Success
        }
        Ok(ReconcileOutcome::Propagated { elapsed }) => {
            info!("Validation record propagated after {:?}", elapsed);
            HookExitCode::Success
        }
        Err(e) => {
            error!("{}", e);
            HookExitCode::RuntimeError
        }
    }
}

async fn build_reconciler(
    hook_config: &HookConfig,
) -> Result<(Reconciler, mpsc::Receiver<ReconcileEvent>)> {
    let store = FileAccountStore::load(&hook_config.acmedns.storage).await?;

    let delegation = AcmeDnsClient::new(&hook_config.acmedns.url, hook_config.http.timeout())?;

    let records: Option<Box<dyn RecordManager>> = match hook_config.openipam.token {
        Some(ref token) => Some(Box::new(OpenIpamProvider::new(
            &hook_config.openipam.url,
            token.as_str(),
            hook_config.openipam.cname_ttl,
            hook_config.http.timeout(),
        )?)),
        None => {
            info!("No openIPAM token configured; the CNAME record has to be added manually");
            None
        }
    };

    let probe = HickoryProbe::new(&hook_config.dns.nameservers)?;

    let built = Reconciler::new(
        Box::new(delegation),
        records,
        Box::new(probe),
        Box::new(store),
        hook_config,
    )?;
    Ok(built)
}
