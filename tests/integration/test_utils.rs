//! Shared test utilities for integration tests
//!
//! In-memory replica helpers, hand-driven delivery between replicas, and
//! environment isolation for config tests.

use movetree::op::NodeMeta;
use movetree::peers::StaticPeers;
use movetree::store::MemoryNodeStore;
use movetree::tree::TreeEngine;
use movetree::types::{NodeId, PeerId};
use std::sync::Mutex;
use tempfile::TempDir;

pub type Replica = TreeEngine<MemoryNodeStore, StaticPeers>;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// In-memory replica `peer` that replicates with `peers`.
pub fn replica(peer: u64, peers: &[u64]) -> Replica {
    let directory = StaticPeers::new(PeerId(peer), peers.iter().copied().map(PeerId));
    TreeEngine::new(MemoryNodeStore::new(PeerId(peer)), directory).unwrap()
}

pub fn mkdir(replica: &mut Replica, parent: NodeId, name: &str) -> NodeId {
    let id = replica.new_node_id().unwrap();
    replica
        .move_node(parent, NodeMeta::directory(name), id)
        .unwrap();
    id
}

pub fn touch(replica: &mut Replica, parent: NodeId, name: &str) -> NodeId {
    let id = replica.new_node_id().unwrap();
    replica.move_node(parent, NodeMeta::file(name, 0), id).unwrap();
    id
}

/// Deliver everything `from` has queued for `to`, oldest first, committing
/// each op on the sender once the receiver has integrated it.
pub fn deliver(from: &Replica, to: &mut Replica) -> usize {
    let outbox = from.outbox();
    let to_id = to.self_id();
    let mut delivered = 0;
    loop {
        let batch = outbox.pending_for(to_id, 8);
        if batch.is_empty() {
            break;
        }
        for op in batch {
            to.apply_external_op(from.self_id(), op.clone()).unwrap();
            outbox.commit(to_id, &op).unwrap();
            delivered += 1;
        }
    }
    delivered
}

/// Send a periodic push from `from` to `to` if `from` has nothing queued.
/// Returns whether a push was sent.
pub fn push(from: &Replica, to: &mut Replica) -> bool {
    match from.periodic_push(to.self_id()) {
        Some(p) => {
            to.update_external_timestamp(p.from, p.timestamp).unwrap();
            true
        }
        None => false,
    }
}

/// Deliver between every ordered pair until no replica has anything queued.
pub fn exchange(replicas: &mut [Replica]) {
    loop {
        let mut moved = 0;
        for i in 0..replicas.len() {
            for j in 0..replicas.len() {
                if i != j {
                    let (from, to) = pair_mut(replicas, i, j);
                    moved += deliver(from, to);
                }
            }
        }
        if moved == 0 {
            break;
        }
    }
}

/// Borrow `replicas[i]` shared and `replicas[j]` mutably.
pub fn pair_mut(replicas: &mut [Replica], i: usize, j: usize) -> (&Replica, &mut Replica) {
    assert_ne!(i, j);
    if i < j {
        let (left, right) = replicas.split_at_mut(j);
        (&left[i], &mut right[0])
    } else {
        let (left, right) = replicas.split_at_mut(i);
        (&right[0], &mut left[j])
    }
}

/// Child names of `id`, in order.
pub fn child_names(replica: &Replica, id: NodeId) -> Vec<String> {
    replica
        .get_node(id)
        .unwrap()
        .unwrap()
        .children
        .keys()
        .cloned()
        .collect()
}

/// (path, id) for every node below Root.
pub fn listing(replica: &Replica) -> Vec<(String, NodeId)> {
    replica
        .walk(NodeId::ROOT)
        .unwrap()
        .into_iter()
        .map(|e| (e.path, e.id))
        .collect()
}

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
        }
    }

    fn restore(self) {
        match self.home {
            Some(orig) => std::env::set_var("HOME", orig),
            None => std::env::remove_var("HOME"),
        }
        match self.xdg_config_home {
            Some(orig) => std::env::set_var("XDG_CONFIG_HOME", orig),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`.
///
/// Holds a global mutex for the duration so parallel tests never observe each
/// other's environment. The original values are restored afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_config_home = test_dir.path().join("xdg");
    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", &test_config_home);

    let result = f();

    env_state.restore();
    result
}
