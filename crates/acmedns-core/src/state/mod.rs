// # Account Store Implementations
//
// This module provides implementations of the AccountStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileAccountStore;
pub use memory::MemoryAccountStore;
