use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use gossip_accounts::ProtocolKind;

use crate::{backend::ProtocolBackend, loopback::LoopbackBackend};

type Constructor = Arc<dyn Fn() -> Arc<dyn ProtocolBackend> + Send + Sync>;

/// Maps protocol kinds to backend constructors.
///
/// Backends are constructed unbound; the session binds the fresh instance to
/// its account via `setup`. The factory is the only place in the workspace
/// that knows which concrete backends exist.
pub struct BackendFactory {
    constructors: HashMap<ProtocolKind, Constructor>,
}

impl Default for BackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendFactory {
    /// An empty factory with no registered protocols.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A factory with the in-tree loopback backend registered.
    pub fn with_loopback() -> Self {
        let mut factory = Self::new();
        factory.register(ProtocolKind::Loopback, || {
            Arc::new(LoopbackBackend::new()) as Arc<dyn ProtocolBackend>
        });
        factory
    }

    /// Register (or replace) the constructor for a protocol kind.
    pub fn register<F>(&mut self, kind: ProtocolKind, constructor: F)
    where
        F: Fn() -> Arc<dyn ProtocolBackend> + Send + Sync + 'static,
    {
        debug!(protocol = %kind, "backend constructor registered");
        self.constructors.insert(kind, Arc::new(constructor));
    }

    /// Construct a fresh backend for the kind, or `None` when no
    /// implementation is registered.
    pub fn create(&self, kind: ProtocolKind) -> Option<Arc<dyn ProtocolBackend>> {
        self.constructors.get(&kind).map(|c| c())
    }

    pub fn supports(&self, kind: ProtocolKind) -> bool {
        self.constructors.contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_protocol_yields_none() {
        let factory = BackendFactory::new();
        assert!(factory.create(ProtocolKind::Jabber).is_none());
        assert!(!factory.supports(ProtocolKind::Jabber));
    }

    #[test]
    fn loopback_is_registered() {
        let factory = BackendFactory::with_loopback();
        assert!(factory.supports(ProtocolKind::Loopback));
        assert!(factory.create(ProtocolKind::Loopback).is_some());
    }
}
