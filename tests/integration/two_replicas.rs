//! Two replicas editing concurrently and exchanging their moves

use crate::integration::test_utils::{
    child_names, deliver, exchange, listing, mkdir, replica, touch,
};
use movetree::op::NodeMeta;
use movetree::tree::ApplyOutcome;
use movetree::types::{NodeId, PeerId};

#[test]
fn test_concurrent_creates_converge() {
    let mut a = replica(1, &[2]);
    let mut b = replica(2, &[1]);

    let d1 = mkdir(&mut a, NodeId::ROOT, "Test1");
    let d2 = mkdir(&mut b, NodeId::ROOT, "Test2");

    assert_eq!(deliver(&a, &mut b), 1);
    assert_eq!(deliver(&b, &mut a), 1);

    for r in [&a, &b] {
        assert_eq!(child_names(r, NodeId::ROOT), vec!["Test1", "Test2"]);
        assert_eq!(r.traverse(&["Test1"]).unwrap(), Some(d1));
        assert_eq!(r.traverse(&["Test2"]).unwrap(), Some(d2));
        // Both peers are caught up to counter 1, so nothing older can arrive
        assert_eq!(r.log_len(), 0);
    }
}

#[test]
fn test_file_created_under_remote_directory() {
    let mut a = replica(1, &[2]);
    let mut b = replica(2, &[1]);

    mkdir(&mut a, NodeId::ROOT, "Test1");
    let d2 = mkdir(&mut b, NodeId::ROOT, "Test2");
    deliver(&a, &mut b);
    deliver(&b, &mut a);

    let f = touch(&mut a, d2, "TestFile");
    deliver(&a, &mut b);

    assert_eq!(a.traverse(&["Test2", "TestFile"]).unwrap(), Some(f));
    assert_eq!(b.traverse(&["Test2", "TestFile"]).unwrap(), Some(f));
    assert_eq!(listing(&a), listing(&b));
}

#[test]
fn test_concurrent_renames_of_same_node_last_writer_wins() {
    let mut a = replica(1, &[2]);
    let mut b = replica(2, &[1]);

    let d = mkdir(&mut a, NodeId::ROOT, "draft");
    deliver(&a, &mut b);

    // B's clock moved past A's on receipt, so B's rename sorts last and wins
    a.move_node(NodeId::ROOT, NodeMeta::directory("from-a"), d)
        .unwrap();
    b.move_node(NodeId::ROOT, NodeMeta::directory("from-b"), d)
        .unwrap();
    let mut replicas = [a, b];
    exchange(&mut replicas);

    for r in &replicas {
        assert_eq!(child_names(r, NodeId::ROOT), vec!["from-b"]);
        assert_eq!(r.traverse(&["from-b"]).unwrap(), Some(d));
    }
}

#[test]
fn test_redelivery_is_duplicate() {
    let mut a = replica(1, &[2]);
    let mut b = replica(2, &[1, 3]);

    let d = a.new_node_id().unwrap();
    let op = a
        .move_node(NodeId::ROOT, NodeMeta::directory("once"), d)
        .unwrap();

    assert_eq!(
        b.apply_external_op(PeerId(1), op.clone()).unwrap(),
        ApplyOutcome::Applied
    );
    assert_eq!(
        b.apply_external_op(PeerId(1), op.clone()).unwrap(),
        ApplyOutcome::Duplicate
    );
    // Relayed by another peer after the author already delivered it
    assert_eq!(
        b.apply_external_op(PeerId(3), op.clone()).unwrap(),
        ApplyOutcome::Duplicate
    );
    // Own op echoed back
    assert_eq!(
        a.apply_external_op(PeerId(2), op).unwrap(),
        ApplyOutcome::Duplicate
    );
    assert_eq!(child_names(&b, NodeId::ROOT), vec!["once"]);
}

#[test]
fn test_clock_advances_past_received_ops() {
    let mut a = replica(1, &[2]);
    let mut b = replica(2, &[1]);

    for name in ["a", "b", "c", "d"] {
        mkdir(&mut a, NodeId::ROOT, name);
    }
    deliver(&a, &mut b);
    assert!(b.clock().current() > a.clock().current());

    // B's next op sorts after everything it has seen
    let e = mkdir(&mut b, NodeId::ROOT, "e");
    deliver(&b, &mut a);
    assert_eq!(a.traverse(&["e"]).unwrap(), Some(e));
    assert_eq!(listing(&a), listing(&b));
}
