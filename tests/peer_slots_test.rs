use lobby_relay::relay::peer_slots::{HandshakeStage, PeerSlotTable};
use lobby_relay::relay::registry::{ConnectionId, ConnectionRegistry, Outbox};
use tokio::sync::mpsc;

fn peers(count: usize) -> (ConnectionRegistry, Vec<(ConnectionId, Outbox)>) {
    let mut registry = ConnectionRegistry::new();
    let peers = (0..count)
        .map(|_| {
            let (tx, _rx) = mpsc::unbounded_channel();
            let handle = registry.register("192.0.2.1".to_string(), tx);
            (handle.id(), handle.outbox().clone())
        })
        .collect();
    (registry, peers)
}

#[test]
fn test_allocate_appends_distinct_indices() {
    let (_registry, peers) = peers(3);
    let mut table = PeerSlotTable::new();

    let indices: Vec<usize> = peers
        .iter()
        .map(|(id, outbox)| table.allocate(*id, outbox.clone()))
        .collect();

    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(table.occupied(), 3);
    for (index, (id, _)) in peers.iter().enumerate() {
        let slot = table.resolve(index).expect("slot should be occupied");
        assert_eq!(slot.peer(), *id);
        assert_eq!(slot.stage(), HandshakeStage::Offered);
        assert_eq!(table.find(*id), Some(index));
    }
}

#[test]
fn test_release_does_not_shift_other_slots() {
    let (_registry, peers) = peers(3);
    let mut table = PeerSlotTable::new();
    for (id, outbox) in &peers {
        table.allocate(*id, outbox.clone());
    }

    let released = table.release(1).expect("slot 1 was occupied");
    assert_eq!(released.peer(), peers[1].0);

    assert!(table.resolve(1).is_none());
    assert_eq!(table.find(peers[1].0), None);
    assert_eq!(table.resolve(0).map(|s| s.peer()), Some(peers[0].0));
    assert_eq!(table.resolve(2).map(|s| s.peer()), Some(peers[2].0));
    assert_eq!(table.occupied(), 2);
}

#[test]
fn test_lowest_free_index_is_reused_first() {
    let (_registry, peers) = peers(6);
    let mut table = PeerSlotTable::new();
    for (id, outbox) in peers.iter().take(4) {
        table.allocate(*id, outbox.clone());
    }

    table.release(3);
    table.release(1);

    assert_eq!(table.allocate(peers[4].0, peers[4].1.clone()), 1);
    assert_eq!(table.allocate(peers[5].0, peers[5].1.clone()), 3);
    assert_eq!(table.allocate(peers[1].0, peers[1].1.clone()), 4);
}

#[test]
fn test_same_peer_occupies_one_slot() {
    let (_registry, peers) = peers(2);
    let mut table = PeerSlotTable::new();

    assert_eq!(table.allocate(peers[0].0, peers[0].1.clone()), 0);
    let slot = table.resolve_mut(0).expect("occupied");
    assert_eq!(slot.advance(HandshakeStage::Answered), HandshakeStage::Offered);
    assert_eq!(slot.advance(HandshakeStage::Trickling), HandshakeStage::Answered);

    // 再オファーは同じスロットでやり直し
    assert_eq!(table.allocate(peers[0].0, peers[0].1.clone()), 0);
    assert_eq!(table.resolve(0).map(|s| s.stage()), Some(HandshakeStage::Offered));
    assert_eq!(table.allocate(peers[1].0, peers[1].1.clone()), 1);
    assert_eq!(table.occupied(), 2);
}

#[test]
fn test_release_of_empty_or_out_of_range_is_noop() {
    let (_registry, peers) = peers(1);
    let mut table = PeerSlotTable::new();
    table.allocate(peers[0].0, peers[0].1.clone());

    assert!(table.release(7).is_none());
    assert!(table.release(0).is_some());
    assert!(table.release(0).is_none());

    // 二重解放で空きが重複しないこと
    let (_registry2, more) = self::peers(2);
    assert_eq!(table.allocate(more[0].0, more[0].1.clone()), 0);
    assert_eq!(table.allocate(more[1].0, more[1].1.clone()), 1);
}

#[test]
fn test_clear_discards_everything() {
    let (_registry, peers) = peers(2);
    let mut table = PeerSlotTable::new();
    for (id, outbox) in &peers {
        table.allocate(*id, outbox.clone());
    }

    table.clear();
    assert_eq!(table.occupied(), 0);
    assert_eq!(table.find(peers[0].0), None);
    assert_eq!(table.allocate(peers[1].0, peers[1].1.clone()), 0);
}
