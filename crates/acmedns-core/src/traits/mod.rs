//! Core traits for the acme-dns hook
//!
//! This module defines the abstract interfaces the reconciler is written against.
//!
//! - [`AccountStore`]: Durable domain → delegation account mapping
//! - [`DelegationService`]: acme-dns account registration and TXT updates
//! - [`RecordManager`]: CNAME management in the authoritative zone
//! - [`RecordProbe`]: TXT resolution of the validation subdomain

pub mod account_store;
pub mod delegation;
pub mod probe;
pub mod record_manager;

pub use account_store::AccountStore;
pub use delegation::DelegationService;
pub use probe::RecordProbe;
pub use record_manager::RecordManager;
