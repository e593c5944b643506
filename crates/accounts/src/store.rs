use std::{fs, path::PathBuf};

use {
    anyhow::{Context, Result},
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::account::Account;

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    account: Vec<Account>,
}

/// TOML file-backed account persistence (`accounts.toml`).
///
/// The on-disk format is an implementation detail of this crate; nothing
/// else in the workspace reads it.
pub struct AccountStore {
    path: PathBuf,
}

impl AccountStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load accounts from disk. A missing file is an empty account list; a
    /// malformed file logs a warning and also yields an empty list so the
    /// client still starts.
    pub fn load(&self) -> Vec<Account> {
        if !self.path.exists() {
            return Vec::new();
        }
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read accounts file");
                return Vec::new();
            },
        };
        match toml::from_str::<AccountsFile>(&raw) {
            Ok(file) => {
                debug!(path = %self.path.display(), count = file.account.len(), "accounts loaded");
                file.account
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "malformed accounts file, ignoring");
                Vec::new()
            },
        }
    }

    /// Persist the given accounts, creating parent directories as needed.
    pub fn save(&self, accounts: &[Account]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = AccountsFile {
            account: accounts.to_vec(),
        };
        let data = toml::to_string_pretty(&file)
            .with_context(|| format!("failed to serialize {}", self.path.display()))?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
