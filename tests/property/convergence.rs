//! Property-based tests for convergence guarantees

use movetree::op::{MetaKind, NodeMeta};
use movetree::peers::{PeerDirectory, StaticPeers};
use movetree::store::MemoryNodeStore;
use movetree::tree::TreeEngine;
use movetree::types::{NodeId, PeerId};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};

type Replica = TreeEngine<MemoryNodeStore, StaticPeers>;

const REPLICAS: usize = 3;
// A tiny name pool makes collisions common
const NAMES: [&str; 3] = ["a", "b", "c"];

#[derive(Debug, Clone)]
enum Action {
    Mkdir { at: usize, parent: usize, name: usize },
    Touch { at: usize, parent: usize, name: usize },
    Mv { at: usize, child: usize, parent: usize, name: usize },
    Rm { at: usize, child: usize },
    /// Move any node ever created (attached, trashed or purged) under Root,
    /// with either kind
    Restore { at: usize, child: usize, name: usize, as_dir: bool },
    Deliver { from: usize, to: usize, count: usize },
    Push { from: usize, to: usize },
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0..REPLICAS, any::<usize>(), 0..NAMES.len())
            .prop_map(|(at, parent, name)| Action::Mkdir { at, parent, name }),
        (0..REPLICAS, any::<usize>(), 0..NAMES.len())
            .prop_map(|(at, parent, name)| Action::Touch { at, parent, name }),
        (0..REPLICAS, any::<usize>(), any::<usize>(), 0..NAMES.len()).prop_map(
            |(at, child, parent, name)| Action::Mv {
                at,
                child,
                parent,
                name
            }
        ),
        (0..REPLICAS, any::<usize>()).prop_map(|(at, child)| Action::Rm { at, child }),
        (0..REPLICAS, any::<usize>(), 0..NAMES.len(), any::<bool>()).prop_map(
            |(at, child, name, as_dir)| Action::Restore {
                at,
                child,
                name,
                as_dir
            }
        ),
        (0..REPLICAS, 0..REPLICAS, 1..5usize)
            .prop_map(|(from, to, count)| Action::Deliver { from, to, count }),
        (0..REPLICAS, 0..REPLICAS).prop_map(|(from, to)| Action::Push { from, to }),
    ]
}

fn replicas() -> Vec<Replica> {
    (1..=REPLICAS as u64)
        .map(|peer| {
            let others = (1..=REPLICAS as u64).filter(|p| *p != peer).map(PeerId);
            TreeEngine::new(
                MemoryNodeStore::new(PeerId(peer)),
                StaticPeers::new(PeerId(peer), others),
            )
            .unwrap()
        })
        .collect()
}

/// Everything currently reachable from Root.
fn attached(replica: &Replica) -> Vec<(NodeId, NodeMeta)> {
    replica
        .walk(NodeId::ROOT)
        .unwrap()
        .into_iter()
        .map(|e| (e.id, e.meta))
        .collect()
}

/// Root plus every reachable directory.
fn directories(replica: &Replica) -> Vec<NodeId> {
    let mut dirs = vec![NodeId::ROOT];
    dirs.extend(
        attached(replica)
            .into_iter()
            .filter(|(_, meta)| meta.kind() == MetaKind::Directory)
            .map(|(id, _)| id),
    );
    dirs
}

fn pick<T: Clone>(items: &[T], index: usize) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[index % items.len()].clone())
    }
}

fn pair_mut(replicas: &mut [Replica], i: usize, j: usize) -> (&Replica, &mut Replica) {
    if i < j {
        let (left, right) = replicas.split_at_mut(j);
        (&left[i], &mut right[0])
    } else {
        let (left, right) = replicas.split_at_mut(i);
        (&right[0], &mut left[j])
    }
}

/// Deliver up to `limit` of the oldest ops `from` has queued for `to`.
fn deliver(from: &Replica, to: &mut Replica, limit: usize) -> usize {
    let outbox = from.outbox();
    let batch = outbox.pending_for(to.self_id(), limit);
    for op in &batch {
        to.apply_external_op(from.self_id(), op.clone()).unwrap();
        outbox.commit(to.self_id(), op).unwrap();
    }
    batch.len()
}

/// Applies `action`. `created` collects every id a replica has allocated, so
/// later actions can reach nodes that are no longer attached anywhere.
fn run(replicas: &mut [Replica], created: &mut Vec<NodeId>, action: &Action) {
    match *action {
        Action::Mkdir { at, parent, name } => {
            let r = &mut replicas[at];
            if let Some(parent) = pick(&directories(r), parent) {
                let id = r.new_node_id().unwrap();
                if r.move_node(parent, NodeMeta::directory(NAMES[name]), id).is_ok() {
                    created.push(id);
                }
            }
        }
        Action::Touch { at, parent, name } => {
            let r = &mut replicas[at];
            if let Some(parent) = pick(&directories(r), parent) {
                let id = r.new_node_id().unwrap();
                if r.move_node(parent, NodeMeta::file(NAMES[name], 0), id).is_ok() {
                    created.push(id);
                }
            }
        }
        Action::Mv {
            at,
            child,
            parent,
            name,
        } => {
            let r = &mut replicas[at];
            let child = pick(&attached(r), child);
            let parent = pick(&directories(r), parent);
            if let (Some((child, meta)), Some(parent)) = (child, parent) {
                // Cycles and collisions are rejected locally and never sent
                let _ = r.move_node(parent, meta.with_name(NAMES[name]), child);
            }
        }
        Action::Rm { at, child } => {
            let r = &mut replicas[at];
            if let Some((child, meta)) = pick(&attached(r), child) {
                r.trash(meta, child).unwrap();
            }
        }
        Action::Restore {
            at,
            child,
            name,
            as_dir,
        } => {
            let r = &mut replicas[at];
            let known = pick(created.as_slice(), child)
                .and_then(|id| r.get_node(id).unwrap().map(|node| (id, node)))
                .filter(|(_, node)| node.meta.is_some());
            if let Some((id, _)) = known {
                let meta = if as_dir {
                    NodeMeta::directory(NAMES[name])
                } else {
                    NodeMeta::file(NAMES[name], 0)
                };
                // A kind mismatch must be refused whether or not this
                // replica has purged the node yet
                let _ = r.move_node(NodeId::ROOT, meta, id);
            }
        }
        Action::Deliver { from, to, count } => {
            if from != to {
                let (from, to) = pair_mut(replicas, from, to);
                deliver(from, to, count);
            }
        }
        Action::Push { from, to } => {
            if from != to {
                let (from, to) = pair_mut(replicas, from, to);
                push(from, to);
            }
        }
    }
}

fn exchange_all(replicas: &mut [Replica]) {
    loop {
        let mut moved = 0;
        for i in 0..replicas.len() {
            for j in 0..replicas.len() {
                if i != j {
                    let (from, to) = pair_mut(replicas, i, j);
                    moved += deliver(from, to, usize::MAX);
                }
            }
        }
        if moved == 0 {
            break;
        }
    }
}

/// Clock advertisement from `from` to `to`, if `from` has nothing queued.
fn push(from: &Replica, to: &mut Replica) {
    if let Some(push) = from.periodic_push(to.self_id()) {
        to.update_external_timestamp(push.from, push.timestamp)
            .unwrap();
    }
}

fn push_all(replicas: &mut [Replica]) {
    for i in 0..replicas.len() {
        for j in 0..replicas.len() {
            if i != j {
                let (from, to) = pair_mut(replicas, i, j);
                push(from, to);
            }
        }
    }
}

/// Test that replicas converge on the same Root subtree whatever the
/// interleaving of local edits, per-sender FIFO deliveries and clock pushes.
/// Pushes trim logs and purge Trash mid-run, and restores then reach nodes
/// some replicas have purged and others have not
#[test]
fn test_replicas_converge_property() {
    let mut runner = TestRunner::new(Config {
        cases: 96,
        ..Config::default()
    });

    runner
        .run(&prop::collection::vec(action(), 1..60), |actions| {
            let mut replicas = replicas();
            let mut created = Vec::new();
            for action in &actions {
                run(&mut replicas, &mut created, action);
            }
            exchange_all(&mut replicas);

            let expected = replicas[0].walk(NodeId::ROOT).unwrap();
            for other in &replicas[1..] {
                prop_assert_eq!(&other.walk(NodeId::ROOT).unwrap(), &expected);
            }

            // Sibling names are unique by construction of the children map,
            // so the listing size matches the number of distinct ids
            let mut ids: Vec<_> = expected.iter().map(|e| e.id).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), expected.len());

            Ok(())
        })
        .unwrap();
}

/// Test that once everything is delivered and every replica has pushed its
/// clock, no log record is left anywhere
#[test]
fn test_quiescent_replicas_trim_everything_property() {
    let mut runner = TestRunner::new(Config {
        cases: 64,
        ..Config::default()
    });

    runner
        .run(&prop::collection::vec(action(), 1..40), |actions| {
            let mut replicas = replicas();
            let mut created = Vec::new();
            for action in &actions {
                run(&mut replicas, &mut created, action);
            }
            exchange_all(&mut replicas);
            push_all(&mut replicas);

            for r in &replicas {
                prop_assert_eq!(r.log_len(), 0);
                for peer in r.peers().peers() {
                    prop_assert!(!r.outbox().has_pending(peer));
                }
            }

            Ok(())
        })
        .unwrap();
}

/// Test that log records stay in timestamp order and the clock stays ahead of
/// every logged counter
#[test]
fn test_log_order_and_clock_property() {
    let mut runner = TestRunner::default();

    runner
        .run(&prop::collection::vec(action(), 1..40), |actions| {
            let mut replicas = replicas();
            let mut created = Vec::new();
            for action in &actions {
                run(&mut replicas, &mut created, action);
                for r in &replicas {
                    let stamps: Vec<_> = r.log_records().map(|rec| rec.timestamp).collect();
                    prop_assert!(stamps.windows(2).all(|w| w[0] < w[1]));
                    if let Some(last) = stamps.last() {
                        prop_assert!(r.clock().current() >= last.counter);
                    }
                }
            }
            Ok(())
        })
        .unwrap();
}
