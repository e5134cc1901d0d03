use crate::relay::registry::{ConnectionId, Outbox};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

// ハンドシェイク段階（DONE はスロット解放で表現）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Offered,
    Answered,
    Trickling,
}

/// 参加交渉中のピア1件
#[derive(Debug, Clone)]
pub struct PeerSlot {
    peer: ConnectionId,
    outbox: Outbox,
    stage: HandshakeStage,
}

impl PeerSlot {
    pub fn peer(&self) -> ConnectionId {
        self.peer
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn stage(&self) -> HandshakeStage {
        self.stage
    }

    /// 段階を進め、直前の段階を返す
    pub fn advance(&mut self, stage: HandshakeStage) -> HandshakeStage {
        std::mem::replace(&mut self.stage, stage)
    }
}

/// ホスト接続ごとのピアスロット表
///
/// インデックスは割り当て後に変わらない（解放しても詰めない）。
/// 空きスロットは最小インデックスから再利用し、なければ末尾に追加する。
/// 1つの接続は同じ表の中で高々1スロットしか占有しない。
#[derive(Debug, Default)]
pub struct PeerSlotTable {
    slots: Vec<Option<PeerSlot>>,
    free: BinaryHeap<Reverse<usize>>,
    by_peer: HashMap<ConnectionId, usize>,
}

impl PeerSlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// ピアにスロットを割り当て、そのインデックスを返す
    ///
    /// 既に占有しているピアからの再オファーは同じスロットを交渉の最初からやり直す
    pub fn allocate(&mut self, peer: ConnectionId, outbox: Outbox) -> usize {
        let slot = PeerSlot {
            peer,
            outbox,
            stage: HandshakeStage::Offered,
        };

        if let Some(&index) = self.by_peer.get(&peer) {
            self.slots[index] = Some(slot);
            return index;
        }

        let index = match self.free.pop() {
            Some(Reverse(index)) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.by_peer.insert(peer, index);
        index
    }

    pub fn resolve(&self, index: usize) -> Option<&PeerSlot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn resolve_mut(&mut self, index: usize) -> Option<&mut PeerSlot> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// スロットを空にする。空・範囲外なら何もしない
    pub fn release(&mut self, index: usize) -> Option<PeerSlot> {
        let slot = self.slots.get_mut(index)?.take()?;
        self.by_peer.remove(&slot.peer);
        self.free.push(Reverse(index));
        Some(slot)
    }

    pub fn find(&self, peer: ConnectionId) -> Option<usize> {
        self.by_peer.get(&peer).copied()
    }

    /// ホスト切断時に全スロットを破棄
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_peer.clear();
    }

    /// 占有中のスロット数
    pub fn occupied(&self) -> usize {
        self.by_peer.len()
    }
}
