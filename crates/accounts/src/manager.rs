use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::account::{Account, AccountId};

/// Change notifications emitted by the manager.
#[derive(Debug, Clone)]
pub enum AccountEvent {
    Added(Account),
    Removed(Account),
}

/// Owns the configured account set and broadcasts add/remove notifications.
///
/// Insertion order is preserved; account ids are unique.
pub struct AccountManager {
    accounts: RwLock<Vec<Account>>,
    events: broadcast::Sender<AccountEvent>,
}

impl Default for AccountManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountManager {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            accounts: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Seed the manager with an initial account list (e.g. from disk).
    /// No notifications are emitted for seeded accounts.
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            accounts: RwLock::new(accounts),
            events,
        }
    }

    /// Subscribe to add/remove notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.events.subscribe()
    }

    /// Add an account. Returns false (and does nothing) if an account with
    /// the same id already exists.
    pub async fn add(&self, account: Account) -> bool {
        let mut accounts = self.accounts.write().await;
        if accounts.iter().any(|a| a.id == account.id) {
            return false;
        }
        debug!(account = %account.id, "account added");
        accounts.push(account.clone());
        let _ = self.events.send(AccountEvent::Added(account));
        true
    }

    /// Remove an account by id. Returns the removed account if found.
    pub async fn remove(&self, id: &AccountId) -> Option<Account> {
        let mut accounts = self.accounts.write().await;
        let pos = accounts.iter().position(|a| &a.id == id)?;
        let account = accounts.remove(pos);
        debug!(account = %account.id, "account removed");
        let _ = self.events.send(AccountEvent::Removed(account.clone()));
        Some(account)
    }

    pub async fn get(&self, id: &AccountId) -> Option<Account> {
        self.accounts.read().await.iter().find(|a| &a.id == id).cloned()
    }

    /// All accounts in insertion order.
    pub async fn accounts(&self) -> Vec<Account> {
        self.accounts.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::ProtocolKind;

    fn account(id: &str) -> Account {
        Account::new(id, id, ProtocolKind::Loopback)
    }

    #[tokio::test]
    async fn add_is_keyed_by_id() {
        let manager = AccountManager::new();
        assert!(manager.add(account("a")).await);
        assert!(!manager.add(account("a")).await);
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn remove_returns_account() {
        let manager = AccountManager::new();
        manager.add(account("a")).await;
        let removed = manager.remove(&AccountId::from("a")).await;
        assert_eq!(removed.map(|a| a.id.0), Some("a".to_string()));
        assert!(manager.remove(&AccountId::from("a")).await.is_none());
    }

    #[tokio::test]
    async fn notifications_fire_on_add_and_remove() {
        let manager = AccountManager::new();
        let mut events = manager.subscribe();
        manager.add(account("a")).await;
        manager.remove(&AccountId::from("a")).await;

        match events.recv().await.unwrap() {
            AccountEvent::Added(a) => assert_eq!(a.id.as_str(), "a"),
            other => panic!("expected Added, got {other:?}"),
        }
        match events.recv().await.unwrap() {
            AccountEvent::Removed(a) => assert_eq!(a.id.as_str(), "a"),
            other => panic!("expected Removed, got {other:?}"),
        }
    }
}
