use std::sync::{Arc, PoisonError, RwLock};

use tether_net::Request;

use crate::handler::{Protocol, ProtocolHandler};

/// The set of protocols a host consults before sending a request. Later registrations
/// are consulted first.
#[derive(Debug, Default)]
pub struct ProtocolRegistry {
    protocols: RwLock<Vec<Arc<Protocol>>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the protocol was already registered.
    pub fn register(&self, protocol: &Arc<Protocol>) -> bool {
        let mut protocols = self.protocols.write().unwrap_or_else(PoisonError::into_inner);
        if protocols.iter().any(|known| Arc::ptr_eq(known, protocol)) {
            return false;
        }
        protocols.push(Arc::clone(protocol));
        true
    }

    /// Returns `false` when the protocol was not registered. Handlers already created
    /// keep running.
    pub fn unregister(&self, protocol: &Arc<Protocol>) -> bool {
        let mut protocols = self.protocols.write().unwrap_or_else(PoisonError::into_inner);
        let before = protocols.len();
        protocols.retain(|known| !Arc::ptr_eq(known, protocol));
        before != protocols.len()
    }

    pub fn is_registered(&self, protocol: &Arc<Protocol>) -> bool {
        self.protocols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|known| Arc::ptr_eq(known, protocol))
    }

    pub fn len(&self) -> usize {
        self.protocols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The protocol that would service `request`, if any.
    pub fn protocol_for(&self, request: &Request) -> Option<Arc<Protocol>> {
        self.protocols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|protocol| protocol.can_handle(request))
            .cloned()
    }

    pub fn handler_for(&self, request: Request) -> Option<ProtocolHandler> {
        self.protocol_for(&request)
            .map(|protocol| protocol.handler(request))
    }
}
