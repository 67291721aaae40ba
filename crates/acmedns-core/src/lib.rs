// # acmedns-core
//
// Core library for the acme-dns certbot authentication hook.
//
// ## Architecture Overview
//
// The hook proves control of a domain for DNS-01 validation without write
// access to the domain's zone on every renewal. The validation subdomain is
// delegated once, via a CNAME, to an acme-dns account; each run only pushes
// the new TXT value to that account and waits until it resolves.
//
// - **AccountStore**: Durable domain → delegation account mapping
// - **DelegationService**: Registers acme-dns accounts and pushes TXT values
// - **RecordManager**: Creates and deletes the delegating CNAME in the zone
// - **RecordProbe**: Resolves the validation subdomain and compares the token
// - **Reconciler**: Decides which mutations are needed and drives the
//   propagation wait
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Remote services sit behind traits; the
//    reconciliation logic never talks HTTP or DNS directly
// 2. **Library-First**: No component exits the process; the binary alone maps
//    outcomes to exit codes
// 3. **Idempotency**: A run against an already-correct delegation makes no
//    remote mutation

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::HookConfig;
pub use domain::{Account, Challenge, CnameRecord, Domain, RecordId};
pub use engine::{
    ManualInstruction, ManualReason, PropagationConfig, ReconcileEvent, ReconcileOutcome,
    Reconciler,
};
pub use error::{Error, Result};
pub use state::{FileAccountStore, MemoryAccountStore};
pub use traits::{AccountStore, DelegationService, RecordManager, RecordProbe};
