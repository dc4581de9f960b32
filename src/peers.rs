//! Peer directory
//!
//! The engine never decides which peers exist; the host tells it through
//! [`PeerDirectory`].

use crate::types::PeerId;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

pub trait PeerDirectory {
    fn self_id(&self) -> PeerId;

    /// Every known peer except self, in ascending order.
    fn peers(&self) -> Vec<PeerId>;
}

impl<T: PeerDirectory + ?Sized> PeerDirectory for Arc<T> {
    fn self_id(&self) -> PeerId {
        (**self).self_id()
    }

    fn peers(&self) -> Vec<PeerId> {
        (**self).peers()
    }
}

/// Peer set fixed at construction but editable through a shared handle.
#[derive(Debug)]
pub struct StaticPeers {
    self_id: PeerId,
    peers: RwLock<BTreeSet<PeerId>>,
}

impl StaticPeers {
    pub fn new(self_id: PeerId, peers: impl IntoIterator<Item = PeerId>) -> Self {
        let peers = peers.into_iter().filter(|p| *p != self_id).collect();
        Self {
            self_id,
            peers: RwLock::new(peers),
        }
    }

    /// Returns false if the peer was already known (or is self).
    pub fn add_peer(&self, peer: PeerId) -> bool {
        peer != self.self_id && self.peers.write().insert(peer)
    }

    pub fn remove_peer(&self, peer: PeerId) -> bool {
        self.peers.write().remove(&peer)
    }
}

impl PeerDirectory for StaticPeers {
    fn self_id(&self) -> PeerId {
        self.self_id
    }

    fn peers(&self) -> Vec<PeerId> {
        self.peers.read().iter().copied().collect()
    }
}
