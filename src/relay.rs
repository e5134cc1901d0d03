pub mod directory;
pub mod peer_slots;
pub mod quota;
pub mod registry;

use crate::error::{ErrorCode, ProtocolViolation};
use crate::models::{ClientMessage, LobbyId, LobbyRecord, OpenLobby, ServerMessage};
use crate::utils::lock;
use directory::{LobbyDirectory, LobbyUpdate};
use peer_slots::HandshakeStage;
use quota::QuotaTracker;
use registry::{ConnectionHandle, ConnectionRegistry, Outbox};
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info, trace};

/// 送信予定のメッセージ1件
///
/// ロックを解放してから [`deliver`] で送る
#[derive(Debug)]
pub struct Delivery {
    outbox: Outbox,
    message: ServerMessage,
}

impl Delivery {
    pub fn new(outbox: Outbox, message: ServerMessage) -> Self {
        Self { outbox, message }
    }

    /// 相手が切断済みなら false
    pub fn send(self) -> bool {
        self.outbox.send(self.message).is_ok()
    }
}

/// 溜めたメッセージを送信（切断済みの宛先は無視）
pub fn deliver(deliveries: impl IntoIterator<Item = Delivery>) {
    for delivery in deliveries {
        if !delivery.send() {
            trace!("dropped message for a closed connection");
        }
    }
}

fn broadcast(
    connections: &ConnectionRegistry,
    message: ServerMessage,
) -> impl Iterator<Item = Delivery> + '_ {
    connections
        .outboxes()
        .map(move |outbox| Delivery::new(outbox.clone(), message.clone()))
}

// ロック下で扱う共有状態
#[derive(Debug)]
struct RelayState {
    connections: ConnectionRegistry,
    quotas: QuotaTracker,
    lobbies: LobbyDirectory,
}

/// ロビー一覧とシグナリング中継
///
/// ロック順は常に「共有状態 → ピアスロット表」。
/// どのハンドラもロック中に送信内容を組み立てるだけで、送信はロック解放後に行う。
#[derive(Debug)]
pub struct Relay {
    state: Mutex<RelayState>,
}

type Handled = Result<Vec<Delivery>, ErrorCode>;

impl Relay {
    pub fn new(lobbies_per_origin: u32) -> Self {
        Self {
            state: Mutex::new(RelayState {
                connections: ConnectionRegistry::new(),
                quotas: QuotaTracker::new(lobbies_per_origin),
                lobbies: LobbyDirectory::new(),
            }),
        }
    }

    /// 接続を登録し、現在のロビー一覧をその接続のキューに積む
    ///
    /// 一覧は登録と同じクリティカルセクションで積むため、以降のブロードキャストより必ず先に届く
    pub fn register(&self, origin: String, outbox: Outbox) -> ConnectionHandle {
        let mut state = lock(&self.state);
        let connection = state.connections.register(origin, outbox);
        let lobbies = state.lobbies.snapshot();
        // 無制限キューへの追加なのでブロックしない
        let _ = connection.outbox().send(ServerMessage::LobbyList { lobbies });
        info!(
            connection = %connection.id(),
            origin = connection.origin(),
            connections = state.connections.len(),
            "connection registered"
        );
        connection
    }

    /// 接続の後始末（ホスト中のロビーの削除、クォータ返却、ピアスロット表の破棄）
    pub fn deregister(&self, connection: &ConnectionHandle) -> Vec<Delivery> {
        let mut state = lock(&self.state);
        let state = &mut *state;
        if state.connections.deregister(connection.id()).is_none() {
            return Vec::new();
        }

        let mut deliveries = Vec::new();
        if let Some(lobby) = state.lobbies.remove_for_disconnect(connection.id()) {
            deliveries.extend(broadcast(
                &state.connections,
                ServerMessage::LobbyClosed {
                    lobby_id: lobby.id(),
                },
            ));
            state.quotas.release(lobby.origin());
            info!(
                lobby_id = lobby.id(),
                host = %connection.id(),
                origins = state.quotas.tracked_origins(),
                "lobby closed by disconnect"
            );
        }
        lock(connection.peers()).clear();

        info!(
            connection = %connection.id(),
            connections = state.connections.len(),
            "connection deregistered"
        );
        deliveries
    }

    pub fn snapshot(&self) -> Vec<LobbyRecord> {
        lock(&self.state).lobbies.snapshot()
    }

    /// テキストフレーム1件を処理して応答を送信
    ///
    /// エンベロープとして解釈できない場合のみエラーを返す（呼び出し側で切断する）
    pub fn process(
        &self,
        connection: &ConnectionHandle,
        text: &str,
    ) -> Result<(), ProtocolViolation> {
        let deliveries = match ClientMessage::decode(text)? {
            Ok(message) => self.handle(connection, message),
            Err(code) => vec![rejection(connection, code)],
        };
        deliver(deliveries);
        Ok(())
    }

    /// 検証済みメッセージを処理し、送信すべきメッセージを返す
    pub fn handle(&self, connection: &ConnectionHandle, message: ClientMessage) -> Vec<Delivery> {
        let handled = match message {
            ClientMessage::OpenLobby(request) => self.open_lobby(connection, request),
            ClientMessage::CloseLobby => self.close_lobby(connection),
            ClientMessage::SetUserCount(value) => {
                self.update_lobby(connection, LobbyUpdate::UserCount(value))
            }
            ClientMessage::SetUserLimit(value) => {
                self.update_lobby(connection, LobbyUpdate::UserLimit(value))
            }
            ClientMessage::SetHasPassword(value) => {
                self.update_lobby(connection, LobbyUpdate::HasPassword(value))
            }
            ClientMessage::SetName(value) => self.update_lobby(connection, LobbyUpdate::Name(value)),
            ClientMessage::JoinLobbyOffer { lobby_id, sdp } => {
                self.join_offer(connection, lobby_id, sdp)
            }
            ClientMessage::JoinLobbyAnswer { peer, sdp } => self.join_answer(connection, peer, sdp),
            ClientMessage::JoinLobbyOfferIceCandidate {
                lobby_id,
                candidate,
            } => self.offer_candidate(connection, lobby_id, candidate),
            ClientMessage::JoinLobbyAnswerIceCandidate { peer, candidate } => {
                self.answer_candidate(connection, peer, candidate)
            }
            ClientMessage::AllIcesSent { peer } => self.all_ices_sent(connection, peer),
        };

        handled.unwrap_or_else(|code| {
            debug!(connection = %connection.id(), %code, "request rejected");
            vec![rejection(connection, code)]
        })
    }

    fn open_lobby(&self, connection: &ConnectionHandle, request: OpenLobby) -> Handled {
        let mut state = lock(&self.state);
        let state = &mut *state;
        let record = state.lobbies.open(
            &mut state.quotas,
            connection.id(),
            connection.origin(),
            request,
        )?;
        info!(
            lobby_id = record.id,
            host = %connection.id(),
            name = %record.name,
            language = %record.language,
            lobbies = state.lobbies.len(),
            "lobby opened"
        );

        let mut deliveries = vec![Delivery::new(
            connection.outbox().clone(),
            ServerMessage::Created {
                data: record.clone(),
            },
        )];
        deliveries.extend(broadcast(
            &state.connections,
            ServerMessage::LobbyOpened { lobby: record },
        ));
        Ok(deliveries)
    }

    fn close_lobby(&self, connection: &ConnectionHandle) -> Handled {
        let mut state = lock(&self.state);
        let state = &mut *state;
        let lobby = state.lobbies.close(connection.id())?;
        let deliveries = broadcast(
            &state.connections,
            ServerMessage::LobbyClosed {
                lobby_id: lobby.id(),
            },
        )
        .collect();
        state.quotas.release(lobby.origin());
        info!(
            lobby_id = lobby.id(),
            host = %connection.id(),
            origins = state.quotas.tracked_origins(),
            "lobby closed"
        );
        Ok(deliveries)
    }

    fn update_lobby(&self, connection: &ConnectionHandle, update: LobbyUpdate) -> Handled {
        let mut state = lock(&self.state);
        let (lobby_id, applied) = state.lobbies.update(connection.id(), update)?;
        debug!(lobby_id, update = ?applied, "lobby updated");
        Ok(broadcast(&state.connections, applied.into_event(lobby_id)).collect())
    }

    fn join_offer(&self, connection: &ConnectionHandle, lobby_id: LobbyId, sdp: Value) -> Handled {
        let state = lock(&self.state);
        let lobby = state
            .lobbies
            .get(lobby_id)
            .ok_or(ErrorCode::CannotJoinInvalidLobby)?;
        if lobby.is_full() {
            return Err(ErrorCode::CannotJoinFullLobby);
        }
        let host = state
            .connections
            .get(lobby.host())
            .ok_or(ErrorCode::CannotJoinInvalidLobby)?;

        let mut peers = lock(host.peers());
        let peer = peers.allocate(connection.id(), connection.outbox().clone());
        debug!(
            lobby_id,
            peer,
            joiner = %connection.id(),
            waiting = peers.occupied(),
            "join offer relayed to host"
        );
        Ok(vec![Delivery::new(
            host.outbox().clone(),
            ServerMessage::JoinRequestOffer { peer, sdp },
        )])
    }

    fn join_answer(&self, connection: &ConnectionHandle, peer: usize, sdp: Value) -> Handled {
        let mut peers = lock(connection.peers());
        let slot = peers.resolve_mut(peer).ok_or(ErrorCode::NoWaitingPeer)?;
        let from = slot.advance(HandshakeStage::Answered);
        debug!(host = %connection.id(), peer, ?from, "join answer relayed to peer");
        Ok(vec![Delivery::new(
            slot.outbox().clone(),
            ServerMessage::JoinRequestAnswer { sdp },
        )])
    }

    fn offer_candidate(
        &self,
        connection: &ConnectionHandle,
        lobby_id: LobbyId,
        candidate: Value,
    ) -> Handled {
        let state = lock(&self.state);
        let host = state
            .lobbies
            .get(lobby_id)
            .and_then(|lobby| state.connections.get(lobby.host()))
            .ok_or(ErrorCode::CannotJoinInvalidLobby)?;

        let mut peers = lock(host.peers());
        let peer = peers
            .find(connection.id())
            .ok_or(ErrorCode::CannotSendIceCandidateToLobbyYouAreNotJoining)?;
        let from = peers
            .resolve_mut(peer)
            .map(|slot| slot.advance(HandshakeStage::Trickling));
        trace!(lobby_id, peer, ?from, "offer candidate relayed to host");
        Ok(vec![Delivery::new(
            host.outbox().clone(),
            ServerMessage::JoinRequestOfferIceCandidate { peer, candidate },
        )])
    }

    fn answer_candidate(
        &self,
        connection: &ConnectionHandle,
        peer: usize,
        candidate: Value,
    ) -> Handled {
        let mut peers = lock(connection.peers());
        let slot = peers.resolve_mut(peer).ok_or(ErrorCode::PeerNotWaiting)?;
        let from = slot.advance(HandshakeStage::Trickling);
        trace!(host = %connection.id(), peer, ?from, "answer candidate relayed to peer");
        Ok(vec![Delivery::new(
            slot.outbox().clone(),
            ServerMessage::JoinRequestAnswerIceCandidate { candidate },
        )])
    }

    fn all_ices_sent(&self, connection: &ConnectionHandle, peer: usize) -> Handled {
        let slot = lock(connection.peers())
            .release(peer)
            .ok_or(ErrorCode::PeerNotWaiting)?;
        debug!(
            host = %connection.id(),
            peer,
            joiner = %slot.peer(),
            stage = ?slot.stage(),
            "peer slot released"
        );
        Ok(Vec::new())
    }
}

fn rejection(connection: &ConnectionHandle, code: ErrorCode) -> Delivery {
    Delivery::new(connection.outbox().clone(), ServerMessage::error(code))
}
