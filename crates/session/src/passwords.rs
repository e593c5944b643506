use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use {
    gossip_accounts::Account,
    gossip_protocol::{PasswordProvider, StoredPassword},
};

/// Late-bindable password provider handed to every backend.
///
/// Backends capture this once at setup; swapping the inner provider (e.g.
/// when the UI installs a prompt) takes effect for all of them immediately.
pub(crate) struct PasswordRelay {
    inner: RwLock<Arc<dyn PasswordProvider>>,
}

impl PasswordRelay {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(StoredPassword)),
        }
    }

    pub fn set(&self, provider: Arc<dyn PasswordProvider>) {
        if let Ok(mut inner) = self.inner.write() {
            *inner = provider;
        }
    }
}

#[async_trait]
impl PasswordProvider for PasswordRelay {
    async fn request_password(&self, account: &Account) -> Option<String> {
        // Clone out of the lock before suspending.
        let provider = match self.inner.read() {
            Ok(inner) => Arc::clone(&inner),
            Err(_) => return None,
        };
        provider.request_password(account).await
    }
}
