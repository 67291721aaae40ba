//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Looking up (or registering) the delegation account for a domain
//! - Checking whether the validation subdomain already serves the token
//! - Re-pointing the delegating CNAME when it does not
//! - Pushing the TXT value and waiting for it to propagate
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────┐
//!                      │  Reconciler  │
//!                      └──────────────┘
//!                              │
//!      ┌──────────────┬────────┴───────┬───────────────┐
//!      ▼              ▼                ▼               ▼
//! ┌──────────┐ ┌─────────────┐ ┌───────────────┐ ┌─────────────┐
//! │ Account  │ │ Delegation  │ │ RecordManager │ │ RecordProbe │
//! │ Store    │ │ Service     │ │ (CNAME)       │ │ (TXT)       │
//! └──────────┘ └─────────────┘ └───────────────┘ └─────────────┘
//! ```
//!
//! ## Decision Flow
//!
//! 1. No stored account, or force re-registration: register, then provision
//! 2. Stored account: probe the validation subdomain
//!    - Token already served: done, no mutation
//!    - Wrong value or not found: delete the CNAME, then provision
//! 3. Provision: create the CNAME, save the account, push the TXT value,
//!    wait for propagation
//! 4. Any CNAME failure: save the account, push the TXT value anyway and
//!    hand the exact record to the operator

pub mod propagation;

pub use propagation::{PropagationConfig, wait_for_propagation};

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::HookConfig;
use crate::domain::{Account, Challenge, CnameRecord};
use crate::error::{Error, Result};
use crate::traits::{AccountStore, DelegationService, RecordManager, RecordProbe};

/// Capacity of the event channel
///
/// A single run emits a handful of events; when full, new events are dropped
/// with a warning.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A new acme-dns account was registered
    AccountRegistered { domain: String, fulldomain: String },

    /// The validation subdomain already serves the token
    RecordValid { name: String },

    /// The validation subdomain serves something else or nothing
    RecordStale { name: String, reason: String },

    /// Existing CNAME records were removed
    CnameDeleted { name: String, count: usize },

    /// The delegating CNAME was created
    CnameCreated { name: String, target: String },

    /// Creating or deleting the CNAME failed
    CnameFailed { name: String, error: String },

    /// The account was written to the store
    AccountSaved { domain: String },

    /// The TXT value was pushed to acme-dns
    TxtUpdated { subdomain: String },

    /// Propagation wait started
    PropagationStarted { name: String },

    /// The TXT value was observed
    PropagationConfirmed { name: String, elapsed: Duration },

    /// The TXT value was not observed in time
    PropagationTimedOut { name: String, elapsed: Duration },

    /// The operator has to add the record by hand
    ManualActionRequired { record: String },
}

/// Why automatic CNAME management could not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualReason {
    /// No zone-management token is configured
    NoZoneCredentials,
    /// The CNAME could not be created
    CreateFailed(String),
    /// The stale CNAME could not be removed
    DeleteFailed(String),
}

/// Record the operator has to configure, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualInstruction {
    /// Why the record could not be managed automatically
    pub reason: ManualReason,
    /// The exact record to add
    pub record: CnameRecord,
}

impl fmt::Display for ManualInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ManualReason::NoZoneCredentials => {
                writeln!(f, "Please add the following CNAME record to your main DNS zone:")?;
                write!(f, "{}", self.record)
            }
            ManualReason::CreateFailed(error) => {
                writeln!(f, "Failed to create CNAME record for {}: {}", self.record.name, error)?;
                writeln!(f, "It may already exist. If so, please delete it and try again.")?;
                writeln!(f, "To add the record manually, add the following CNAME record to your main DNS zone:")?;
                write!(f, "{}", self.record)
            }
            ManualReason::DeleteFailed(error) => {
                writeln!(f, "Failed to update CNAME record: {}", error)?;
                writeln!(f, "Please update the record to the following and run this script again:")?;
                write!(f, "{}", self.record)
            }
        }
    }
}

/// Result of a reconciliation run that did not fail outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The validation subdomain already served the token; nothing changed
    AlreadyValid,

    /// The delegation was (re)created and the token propagated
    Propagated {
        /// Time spent polling until the token was observed
        elapsed: Duration,
    },

    /// The run could not complete automatically
    ManualActionRequired(ManualInstruction),
}

impl ReconcileOutcome {
    /// Whether certbot may proceed with validation
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::ManualActionRequired(_))
    }
}

/// Reconciliation engine
///
/// Orchestrates one DNS-01 validation: account lookup or registration, CNAME
/// verification and repair, TXT update and propagation wait.
///
/// ## Threading
///
/// Every remote call is awaited in sequence; the engine spawns no tasks. The
/// propagation wait is the only suspension point between mutations.
///
/// ## Failure Policy
///
/// - Store, registration and TXT update failures are returned as errors
/// - CNAME failures become [`ReconcileOutcome::ManualActionRequired`]
/// - Only probes are retried (inside the propagation wait)
pub struct Reconciler {
    /// acme-dns client
    delegation: Box<dyn DelegationService>,

    /// Zone-management API, if credentials are configured
    records: Option<Box<dyn RecordManager>>,

    /// TXT probe
    probe: Box<dyn RecordProbe>,

    /// Account storage
    store: Box<dyn AccountStore>,

    /// Networks allowed to update newly registered accounts
    allow_from: Vec<String>,

    /// Register even when an account is stored
    force_register: bool,

    /// Propagation timings
    propagation: PropagationConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `delegation`: acme-dns client
    /// - `records`: zone-management API; `None` selects manual CNAME mode
    /// - `probe`: TXT probe
    /// - `store`: account storage
    /// - `config`: hook configuration
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// reconciliation events
    pub fn new(
        delegation: Box<dyn DelegationService>,
        records: Option<Box<dyn RecordManager>>,
        probe: Box<dyn RecordProbe>,
        store: Box<dyn AccountStore>,
        config: &HookConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let reconciler = Self {
            delegation,
            records,
            probe,
            store,
            allow_from: config.acmedns.allow_from.clone(),
            force_register: config.acmedns.force_register,
            propagation: config.dns.propagation(),
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Override the propagation timings
    pub fn with_propagation(mut self, propagation: PropagationConfig) -> Self {
        self.propagation = propagation;
        self
    }

    /// Run one reconciliation for `challenge`
    ///
    /// # Returns
    ///
    /// - `Ok(ReconcileOutcome)`: The run finished; check `is_success()`
    /// - `Err(Error)`: A fatal failure (storage, registration, TXT update,
    ///   resolution or propagation timeout)
    pub async fn reconcile(&self, challenge: &Challenge) -> Result<ReconcileOutcome> {
        let domain = challenge.domain.as_str();

        match self.store.fetch(domain).await? {
            Some(account) if !self.force_register => {
                debug!("Found stored account for {}", domain);
                self.verify_existing(challenge, account).await
            }
            stored => {
                if stored.is_some() {
                    info!("Force re-registration configured, replacing account for {}", domain);
                }
                let account = self.delegation.register_account(&self.allow_from).await?;
                info!(
                    "Registered {} account for {} -> {}",
                    self.delegation.service_name(),
                    domain,
                    account.fulldomain
                );
                self.emit_event(ReconcileEvent::AccountRegistered {
                    domain: domain.to_string(),
                    fulldomain: account.fulldomain.clone(),
                });
                self.provision(challenge, account).await
            }
        }
    }

    /// Check a previously stored delegation and repair it if needed
    async fn verify_existing(
        &self,
        challenge: &Challenge,
        account: Account,
    ) -> Result<ReconcileOutcome> {
        let name = challenge.validation_subdomain();

        let reason = match self.probe.validate_record(&name, &challenge.token).await {
            Ok(true) => {
                info!("Validation record for {} is already correct", name);
                self.emit_event(ReconcileEvent::RecordValid { name });
                return Ok(ReconcileOutcome::AlreadyValid);
            }
            Ok(false) => "record serves a different value",
            Err(e) if e.is_not_found() => "record does not resolve",
            Err(e) => return Err(e),
        };

        info!("Existing record is incorrect ({}). Updating...", reason);
        self.emit_event(ReconcileEvent::RecordStale {
            name: name.clone(),
            reason: reason.to_string(),
        });

        let Some(records) = &self.records else {
            return self
                .fall_back(challenge, account, ManualReason::NoZoneCredentials)
                .await;
        };

        match records.delete_cname(&name).await {
            Ok(count) => {
                debug!("Deleted {} CNAME record(s) for {}", count, name);
                self.emit_event(ReconcileEvent::CnameDeleted { name, count });
                self.provision(challenge, account).await
            }
            Err(e) if e.is_recoverable() => {
                warn!("{} failed to delete CNAME for {}: {}", records.provider_name(), name, e);
                self.emit_event(ReconcileEvent::CnameFailed {
                    name,
                    error: e.to_string(),
                });
                self.fall_back(challenge, account, ManualReason::DeleteFailed(e.to_string()))
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Create the CNAME, persist the account, publish and wait
    async fn provision(&self, challenge: &Challenge, account: Account) -> Result<ReconcileOutcome> {
        let Some(records) = &self.records else {
            return self
                .fall_back(challenge, account, ManualReason::NoZoneCredentials)
                .await;
        };

        let record = CnameRecord::for_account(challenge, &account);

        if let Err(e) = records.create_cname(&record.name, &record.target).await {
            if !e.is_recoverable() {
                return Err(e);
            }
            warn!("{} failed to create CNAME for {}: {}", records.provider_name(), record.name, e);
            self.emit_event(ReconcileEvent::CnameFailed {
                name: record.name.clone(),
                error: e.to_string(),
            });
            return self
                .fall_back(challenge, account, ManualReason::CreateFailed(e.to_string()))
                .await;
        }

        info!("Created CNAME {}", record);
        self.emit_event(ReconcileEvent::CnameCreated {
            name: record.name.clone(),
            target: record.target.clone(),
        });

        self.persist(challenge, &account).await?;
        self.push_txt(challenge, &account).await?;

        let elapsed = self.await_propagation(challenge).await?;
        Ok(ReconcileOutcome::Propagated { elapsed })
    }

    /// Manual-instruction mode
    ///
    /// The account is saved and the TXT value pushed regardless, so the
    /// record the operator adds points at a live, stored account.
    async fn fall_back(
        &self,
        challenge: &Challenge,
        account: Account,
        reason: ManualReason,
    ) -> Result<ReconcileOutcome> {
        let instruction = ManualInstruction {
            reason,
            record: CnameRecord::for_account(challenge, &account),
        };

        warn!("Manual DNS change required: {}", instruction.record);
        self.emit_event(ReconcileEvent::ManualActionRequired {
            record: instruction.record.to_string(),
        });

        self.persist(challenge, &account).await?;
        self.push_txt(challenge, &account).await?;

        Ok(ReconcileOutcome::ManualActionRequired(instruction))
    }

    async fn persist(&self, challenge: &Challenge, account: &Account) -> Result<()> {
        let domain = challenge.domain.as_str();
        self.store.put(domain, account.clone()).await?;
        self.store.save().await?;
        debug!("Saved account for {}", domain);
        self.emit_event(ReconcileEvent::AccountSaved {
            domain: domain.to_string(),
        });
        Ok(())
    }

    async fn push_txt(&self, challenge: &Challenge, account: &Account) -> Result<()> {
        self.delegation
            .update_txt_record(account, &challenge.token)
            .await?;
        info!("Updated TXT record for {}", account.fulldomain);
        self.emit_event(ReconcileEvent::TxtUpdated {
            subdomain: account.subdomain.clone(),
        });
        Ok(())
    }

    async fn await_propagation(&self, challenge: &Challenge) -> Result<Duration> {
        let name = challenge.validation_subdomain();
        self.emit_event(ReconcileEvent::PropagationStarted { name: name.clone() });

        match wait_for_propagation(
            self.probe.as_ref(),
            &name,
            &challenge.token,
            &self.propagation,
        )
        .await
        {
            Ok(elapsed) => {
                info!("DNS propagation confirmed for {} after {:?}", name, elapsed);
                self.emit_event(ReconcileEvent::PropagationConfirmed { name, elapsed });
                Ok(elapsed)
            }
            Err(Error::PropagationTimeout { elapsed }) => {
                error!("DNS propagation failed for {}", name);
                self.emit_event(ReconcileEvent::PropagationTimedOut { name, elapsed });
                Err(Error::PropagationTimeout { elapsed })
            }
            Err(e) => Err(e),
        }
    }

    /// Emit a reconciliation event
    fn emit_event(&self, event: ReconcileEvent) {
        // Send event, logging warning if channel is full or closed
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping event");
        }
    }
}
