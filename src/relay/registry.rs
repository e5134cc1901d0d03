use crate::models::ServerMessage;
use crate::relay::peer_slots::PeerSlotTable;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// 接続ごとの送信キュー（セッションアクターがソケットへ書き出す）
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// 登録時に割り当てる接続ID（プロセス内で再利用しない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 登録済み接続
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    origin: Arc<str>,
    outbox: Outbox,
    peers: Arc<Mutex<PeerSlotTable>>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// この接続がホストとして持つピアスロット表
    pub fn peers(&self) -> &Arc<Mutex<PeerSlotTable>> {
        &self.peers
    }
}

// 接続管理
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    last_id: u64,
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, origin: String, outbox: Outbox) -> ConnectionHandle {
        self.last_id += 1;
        let handle = ConnectionHandle {
            id: ConnectionId(self.last_id),
            origin: origin.into(),
            outbox,
            peers: Arc::new(Mutex::new(PeerSlotTable::new())),
        };
        self.connections.insert(handle.id, handle.clone());
        handle
    }

    pub fn deregister(&mut self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionHandle> {
        self.connections.get(&id)
    }

    /// ブロードキャスト先（現在登録されている全接続）
    pub fn outboxes(&self) -> impl Iterator<Item = &Outbox> {
        self.connections.values().map(ConnectionHandle::outbox)
    }

    pub(crate) fn len(&self) -> usize {
        self.connections.len()
    }
}

/// 接続元の識別子を決定
///
/// 主にリバースプロキシ（Apache の mod_proxy など）対策。
/// ループバックからの接続で `X-Forwarded-For` があれば、その先頭のアドレスを使う。
pub fn resolve_origin(
    peer_addr: Option<SocketAddr>,
    forwarded_for: Option<&str>,
    trust_forwarded_for: bool,
) -> String {
    let Some(addr) = peer_addr else {
        return "unknown".to_owned();
    };

    if trust_forwarded_for && addr.ip().is_loopback() {
        if let Some(forwarded) = forwarded_for.and_then(first_forwarded) {
            return forwarded.to_owned();
        }
    }
    addr.ip().to_string()
}

fn first_forwarded(header: &str) -> Option<&str> {
    header
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
