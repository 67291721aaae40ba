// # File Account Store
//
// File-based implementation of AccountStore.
//
// ## Purpose
//
// Keeps the acme-dns account issued for each base domain across runs, so
// renewals reuse the delegation target the zone's CNAME already points at.
//
// ## Integrity
//
// - Atomic writes: the full mapping is written to a sibling temp file with
//   owner-only permissions, then renamed over the storage file
// - Corruption is fatal: a non-empty file that is not a valid mapping fails
//   with `StorageCorrupt`; nothing is guessed or recovered
// - One run per storage file: `save` writes the whole in-memory mapping, so
//   overlapping runs against the same file can lose each other's entries
//
// ## File Format
//
// ```json
// {
//   "example.org": {
//     "subdomain": "d420c923-bbd7-4056-ab64-c3ca54c9b3cf",
//     "username": "c36f50e8-4632-44f0-83fe-e070fef28a10",
//     "password": "htB9mR9DYgcu9bX_afHF62erXaH2TS7bg9KW3F7Z",
//     "fulldomain": "d420c923-bbd7-4056-ab64-c3ca54c9b3cf.auth.example.org"
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::domain::{Account, normalize_domain};
use crate::traits::AccountStore;

/// Permissions of the storage file (owner read/write)
#[cfg(unix)]
const STORAGE_FILE_MODE: u32 = 0o600;

/// File-based account store
///
/// # Example
///
/// ```rust,no_run
/// use acmedns_core::state::FileAccountStore;
/// use acmedns_core::traits::AccountStore;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileAccountStore::load("/etc/letsencrypt/acmedns.json").await?;
///
///     if let Some(account) = store.fetch("*.example.org").await? {
///         println!("delegated to {}", account.fulldomain);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileAccountStore {
    path: PathBuf,
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl FileAccountStore {
    /// Load the store from `path`
    ///
    /// - Missing file: empty store
    /// - Empty file: empty store
    /// - Unreadable file: `Error::StorageUnreadable`
    /// - Invalid content: `Error::StorageCorrupt`
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let accounts = Self::read_accounts(&path).await?;

        tracing::debug!(
            "Loaded account store {}: {} account(s)",
            path.display(),
            accounts.len()
        );

        Ok(Self {
            path,
            accounts: Arc::new(RwLock::new(accounts)),
        })
    }

    /// Path of the storage file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_accounts(path: &Path) -> Result<HashMap<String, Account>, Error> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) => {
                // Only an existing entry is unreadable; a path that cannot
                // exist (missing, or under a regular file) has no accounts
                if fs::metadata(path).await.is_ok() {
                    return Err(Error::storage_unreadable(format!(
                        "Failed to read storage file {}: {}",
                        path.display(),
                        e
                    )));
                }
                tracing::debug!("Storage file does not exist: {}", path.display());
                return Ok(HashMap::new());
            }
        };

        if content.is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_slice(&content).map_err(|e| {
            Error::storage_corrupt(format!(
                "Failed to parse storage file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the mapping atomically
    async fn write_accounts(&self) -> Result<(), Error> {
        let json = {
            let guard = self.accounts.read().await;
            serde_json::to_string_pretty(&*guard)
                .map_err(|e| Error::storage_write(format!("Failed to serialize accounts: {}", e)))?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::storage_write(format!(
                        "Failed to create storage directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            options.mode(STORAGE_FILE_MODE);

            let mut file = options.open(&temp_path).await.map_err(|e| {
                Error::storage_write(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            // The temp file may predate this run with wider permissions
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(STORAGE_FILE_MODE))
                    .await
                    .map_err(|e| {
                        Error::storage_write(format!(
                            "Failed to restrict permissions of {}: {}",
                            temp_path.display(),
                            e
                        ))
                    })?;
            }

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::storage_write(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::storage_write(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::storage_write(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Account store written to file: {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

#[async_trait]
impl AccountStore for FileAccountStore {
    async fn fetch(&self, domain: &str) -> Result<Option<Account>, Error> {
        let guard = self.accounts.read().await;
        Ok(guard.get(normalize_domain(domain)).cloned())
    }

    async fn put(&self, domain: &str, account: Account) -> Result<(), Error> {
        let mut guard = self.accounts.write().await;
        guard.insert(normalize_domain(domain).to_string(), account);
        Ok(())
    }

    async fn save(&self) -> Result<(), Error> {
        self.write_accounts().await
    }

    async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }
}
