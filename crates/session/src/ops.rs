//! Outbound operations: messaging, presence, vcards, version queries and
//! account registration, each resolved to the right backend(s).

use std::sync::Arc;

use tracing::{debug, warn};

use {
    gossip_accounts::{Account, AccountId},
    gossip_common::{Contact, Message, Presence, Vcard, VersionInfo},
};

use crate::{core::Session, error::SessionError, events::SessionEvent};

impl Session {
    /// Send a message, routed to the backend owning the recipient. When no
    /// backend claims the recipient (temporary contacts, typed-in
    /// addresses), the message is broadcast to every connected backend and
    /// backends that cannot address it are expected to ignore it. That
    /// fallback is deliberate policy, not an error path.
    pub async fn send_message(&self, message: &Message) {
        let owner = self.state.read().await.owner_of(&message.to);
        match owner {
            Some(entry) => entry.backend.send_message(message).await,
            None => {
                debug!(to = %message.to, "recipient unowned, broadcasting to connected backends");
                let targets = self.state.read().await.connected_entries();
                for entry in targets {
                    entry.backend.send_message(message).await;
                }
            },
        }
    }

    /// Notify the recipient's backend that we started/stopped typing.
    /// Silently does nothing when no backend owns the contact or the owner
    /// is disconnected — ephemeral contacts have no backend.
    pub async fn send_composing(&self, contact: &Contact, composing: bool) {
        let Some(entry) = self.state.read().await.owner_of(&contact.id) else {
            return;
        };
        if !entry.backend.is_connected() {
            return;
        }
        entry.backend.send_composing(&contact.id, composing).await;
    }

    /// Store the new session-wide presence and push it to every connected
    /// backend. Emits `PresenceChanged` exactly once, however many backends
    /// were updated.
    pub async fn set_presence(&self, presence: Presence) {
        let targets = {
            let mut state = self.state.write().await;
            state.presence = presence.clone();
            state.connected_entries()
        };
        for entry in &targets {
            entry.backend.set_presence(&presence).await;
        }
        debug!(state = ?presence.state, backends = targets.len(), "presence updated");
        self.emit(SessionEvent::PresenceChanged(presence));
    }

    /// Register a new account with its server: the account is added to the
    /// registry first (idempotent), its backend configured, then the
    /// registration delegated.
    pub async fn register_account(
        self: &Arc<Self>,
        account: &Account,
        vcard: Option<&Vcard>,
    ) -> Result<(), SessionError> {
        self.add_account(account).await?;
        let backend = self
            .backend(&account.id)
            .await
            .ok_or_else(|| SessionError::UnknownAccount(account.id.clone()))?;
        backend.register_account(vcard).await?;
        Ok(())
    }

    /// Cancel an in-flight registration, if any.
    pub async fn register_cancel(&self, id: &AccountId) {
        if let Some(backend) = self.backend(id).await {
            backend.register_cancel().await;
        }
    }

    /// Fetch a vcard. Exactly one of account/contact must resolve to a
    /// backend: a contact's owning backend is preferred, the explicit
    /// account's backend is the fallback for unowned (temporary) contacts,
    /// and an account alone fetches that account's own vcard.
    pub async fn vcard(
        &self,
        account: Option<&AccountId>,
        contact: Option<&Contact>,
    ) -> Result<Vcard, SessionError> {
        if let Some(contact) = contact {
            if let Some(entry) = self.state.read().await.owner_of(&contact.id) {
                return Ok(entry.backend.vcard(Some(&contact.id)).await?);
            }
            // Temporary contact: not on any roster, use the explicit account.
            if let Some(id) = account {
                if let Some(backend) = self.backend(id).await {
                    return Ok(backend.vcard(Some(&contact.id)).await?);
                }
            }
            warn!(contact = %contact.id, "no backend to fetch vcard from");
            return Err(SessionError::NoBackend);
        }
        if let Some(id) = account {
            if let Some(backend) = self.backend(id).await {
                return Ok(backend.vcard(None).await?);
            }
        }
        warn!("vcard requested with neither a usable account nor contact");
        Err(SessionError::NoBackend)
    }

    /// Publish a vcard on one account, or on every registered account when
    /// `None`. The bulk path combines per-backend results with AND
    /// semantics: any failure makes the whole call fail, without reporting
    /// which backend it was.
    pub async fn set_vcard(
        &self,
        account: Option<&AccountId>,
        vcard: &Vcard,
    ) -> Result<(), SessionError> {
        match account {
            Some(id) => {
                let backend = self
                    .backend(id)
                    .await
                    .ok_or_else(|| SessionError::UnknownAccount(id.clone()))?;
                backend.set_vcard(vcard).await?;
                Ok(())
            },
            None => {
                let targets = self.state.read().await.entries();
                let mut all_ok = true;
                for entry in targets {
                    if let Err(e) = entry.backend.set_vcard(vcard).await {
                        warn!(account = %entry.account.id, error = %e, "vcard update failed");
                        all_ok = false;
                    }
                }
                if all_ok {
                    Ok(())
                } else {
                    Err(SessionError::VcardUpdateFailed)
                }
            },
        }
    }

    /// Query the client software a contact is running.
    pub async fn version(
        &self,
        id: &AccountId,
        contact_id: &str,
    ) -> Result<VersionInfo, SessionError> {
        let backend = self
            .backend(id)
            .await
            .ok_or_else(|| SessionError::UnknownAccount(id.clone()))?;
        Ok(backend.version(contact_id).await?)
    }

    /// Rename a roster group on every registered backend.
    pub async fn rename_group(&self, group: &str, new_name: &str) {
        let targets = self.state.read().await.entries();
        for entry in targets {
            entry.backend.rename_group(group, new_name).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use gossip_common::PresenceState;

    use super::*;
    use crate::testing::{drain, jabber_account, mock_session};

    #[tokio::test]
    async fn message_to_owned_recipient_goes_to_owner_only() {
        let accounts = vec![jabber_account("a", true), jabber_account("b", true)];
        let (session, created) = mock_session(accounts).await;
        let mocks = created.lock().unwrap().clone();
        for mock in &mocks {
            mock.set_connected(true);
        }
        mocks[0].add_to_roster(Contact::new("juliet@example.org", "Juliet"));

        session
            .send_message(&Message::to("juliet@example.org", "hi"))
            .await;

        assert_eq!(mocks[0].sent.lock().unwrap().len(), 1);
        assert!(mocks[1].sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn message_to_unowned_recipient_is_broadcast_to_connected() {
        let accounts = vec![
            jabber_account("a", true),
            jabber_account("b", true),
            jabber_account("c", true),
        ];
        let (session, created) = mock_session(accounts).await;
        let mocks = created.lock().unwrap().clone();
        mocks[0].set_connected(true);
        mocks[1].set_connected(true);
        // mocks[2] stays disconnected.

        session
            .send_message(&Message::to("stranger@example.org", "hi"))
            .await;

        assert_eq!(mocks[0].sent.lock().unwrap().len(), 1);
        assert_eq!(mocks[1].sent.lock().unwrap().len(), 1);
        assert!(mocks[2].sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn composing_needs_a_connected_owner() {
        let accounts = vec![jabber_account("a", true)];
        let (session, created) = mock_session(accounts).await;
        let mock = created.lock().unwrap()[0].clone();
        let juliet = Contact::new("juliet@example.org", "Juliet");

        // Unowned contact: silent no-op.
        session.send_composing(&juliet, true).await;
        assert!(mock.composing.lock().unwrap().is_empty());

        // Owned but disconnected: still a no-op.
        mock.add_to_roster(juliet.clone());
        session.send_composing(&juliet, true).await;
        assert!(mock.composing.lock().unwrap().is_empty());

        mock.set_connected(true);
        session.send_composing(&juliet, true).await;
        assert_eq!(
            mock.composing.lock().unwrap().as_slice(),
            &[("juliet@example.org".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn presence_pushed_once_per_backend_one_event() {
        let accounts = vec![jabber_account("a", true), jabber_account("b", true)];
        let (session, created) = mock_session(accounts).await;
        let mocks = created.lock().unwrap().clone();
        for mock in &mocks {
            mock.set_connected(true);
        }
        let mut events = session.subscribe();

        let away = Presence::new(PresenceState::Away, Some("lunch".into()));
        session.set_presence(away.clone()).await;

        for mock in &mocks {
            assert_eq!(mock.presences.lock().unwrap().as_slice(), &[away.clone()]);
        }
        assert_eq!(session.presence().await, away);
        let changed = drain(&mut events)
            .iter()
            .filter(|e| matches!(e, SessionEvent::PresenceChanged(_)))
            .count();
        assert_eq!(changed, 1);
    }

    #[tokio::test]
    async fn set_vcard_everywhere_has_and_semantics() {
        let accounts = vec![jabber_account("a", true), jabber_account("b", true)];
        let (session, created) = mock_session(accounts).await;
        let vcard = Vcard {
            nickname: Some("gossip".into()),
            ..Vcard::default()
        };

        assert!(session.set_vcard(None, &vcard).await.is_ok());

        created.lock().unwrap()[1]
            .fail_set_vcard
            .store(true, Ordering::SeqCst);
        assert_eq!(
            session.set_vcard(None, &vcard).await,
            Err(SessionError::VcardUpdateFailed)
        );

        // The healthy backend alone still succeeds when addressed directly.
        assert!(
            session
                .set_vcard(Some(&AccountId::from("a")), &vcard)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn vcard_prefers_owner_then_explicit_account() {
        let accounts = vec![jabber_account("a", true), jabber_account("b", true)];
        let (session, created) = mock_session(accounts).await;
        let juliet = Contact::new("juliet@example.org", "Juliet");
        created.lock().unwrap()[1].add_to_roster(juliet.clone());

        // Owned: the owner answers even when another account is passed.
        let vcard = session
            .vcard(Some(&AccountId::from("a")), Some(&juliet))
            .await
            .unwrap();
        assert_eq!(vcard.name.as_deref(), Some("juliet@example.org"));

        // Unowned temporary contact: the explicit account's backend answers.
        let stranger = Contact::new("stranger@example.org", "Stranger");
        assert!(
            session
                .vcard(Some(&AccountId::from("a")), Some(&stranger))
                .await
                .is_ok()
        );

        // Neither usable: typed error.
        assert_eq!(
            session.vcard(None, None).await,
            Err(SessionError::NoBackend)
        );
    }

    #[tokio::test]
    async fn register_account_adds_then_delegates() {
        let (session, created) = mock_session(vec![]).await;
        let fresh = jabber_account("fresh", true);

        session.register_account(&fresh, None).await.unwrap();

        assert_eq!(session.accounts().await.len(), 1);
        assert_eq!(created.lock().unwrap().len(), 1);
        session.register_cancel(&fresh.id).await;
    }

    #[tokio::test]
    async fn version_goes_through_the_account_backend() {
        let accounts = vec![jabber_account("a", true)];
        let (session, _) = mock_session(accounts).await;

        let info = session
            .version(&AccountId::from("a"), "juliet@example.org")
            .await
            .unwrap();
        assert_eq!(info.name, "mock");

        assert!(matches!(
            session.version(&AccountId::from("nope"), "x").await,
            Err(SessionError::UnknownAccount(_))
        ));
    }
}
