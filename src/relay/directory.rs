use crate::error::ErrorCode;
use crate::models::{
    Language, LobbyId, LobbyRecord, OpenLobby, ServerMessage, MAX_LOBBY_NAME_CHARS,
    MAX_RENAMED_LOBBY_NAME_CHARS,
};
use crate::relay::quota::QuotaTracker;
use crate::relay::registry::ConnectionId;
use crate::utils::truncate_chars;
use std::collections::{BTreeMap, HashMap};

// 公開中のロビー
#[derive(Debug, Clone)]
pub struct Lobby {
    id: LobbyId,
    host: ConnectionId,
    origin: String, // クォータ返却用
    name: String,
    language: Language,
    user_count: u32,
    user_limit: u32,
    has_password: bool,
}

impl Lobby {
    pub fn id(&self) -> LobbyId {
        self.id
    }

    pub fn host(&self) -> ConnectionId {
        self.host
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn is_full(&self) -> bool {
        self.user_count >= self.user_limit
    }

    pub fn record(&self) -> LobbyRecord {
        LobbyRecord {
            id: self.id,
            name: self.name.clone(),
            language: self.language,
            user_count: self.user_count,
            user_limit: self.user_limit,
            has_password: self.has_password,
        }
    }
}

/// ホストによるロビー情報の変更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyUpdate {
    UserCount(u32),
    UserLimit(u32),
    HasPassword(bool),
    Name(String),
}

impl LobbyUpdate {
    fn none_error(&self) -> ErrorCode {
        match self {
            LobbyUpdate::UserCount(_) => ErrorCode::CannotSetUserCountOnNone,
            LobbyUpdate::UserLimit(_) => ErrorCode::CannotSetUserLimitOnNone,
            LobbyUpdate::HasPassword(_) => ErrorCode::CannotSetHasPasswordOnNone,
            LobbyUpdate::Name(_) => ErrorCode::CannotSetNameOnNone,
        }
    }

    /// 変更通知イベント
    pub fn into_event(self, lobby_id: LobbyId) -> ServerMessage {
        match self {
            LobbyUpdate::UserCount(new_value) => ServerMessage::LobbyUserCountChanged {
                lobby_id,
                new_value,
            },
            LobbyUpdate::UserLimit(new_value) => ServerMessage::LobbyUserLimitChanged {
                lobby_id,
                new_value,
            },
            LobbyUpdate::HasPassword(new_value) => ServerMessage::LobbyHasPasswordChanged {
                lobby_id,
                new_value,
            },
            LobbyUpdate::Name(new_value) => ServerMessage::LobbyNameChanged {
                lobby_id,
                new_value,
            },
        }
    }
}

/// 公開中ロビーの一覧
///
/// IDは1から単調増加し、プロセス生存中は再利用しない。
/// 1つの接続がホストできるロビーは1つまで。
#[derive(Debug, Default)]
pub struct LobbyDirectory {
    last_id: LobbyId,
    lobbies: BTreeMap<LobbyId, Lobby>,
    by_host: HashMap<ConnectionId, LobbyId>,
}

impl LobbyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// ロビーを作成し、オリジンのクォータを1つ消費する
    ///
    /// 失敗時はディレクトリもクォータも変更しない
    pub fn open(
        &mut self,
        quotas: &mut QuotaTracker,
        host: ConnectionId,
        origin: &str,
        request: OpenLobby,
    ) -> Result<LobbyRecord, ErrorCode> {
        if self.by_host.contains_key(&host) || quotas.is_exhausted(origin) {
            return Err(ErrorCode::LobbyLimitReached);
        }
        if request.name.chars().count() > MAX_LOBBY_NAME_CHARS {
            return Err(ErrorCode::LobbyNameTooLong);
        }
        if !quotas.try_reserve(origin) {
            return Err(ErrorCode::LobbyLimitReached);
        }

        self.last_id += 1;
        let lobby = Lobby {
            id: self.last_id,
            host,
            origin: origin.to_owned(),
            name: request.name,
            language: request.language,
            user_count: request.user_count,
            user_limit: request.user_limit,
            has_password: request.has_password,
        };
        let record = lobby.record();
        self.by_host.insert(host, lobby.id);
        self.lobbies.insert(lobby.id, lobby);
        Ok(record)
    }

    /// ホスト中のロビーを取り除く（クォータの返却は呼び出し側）
    pub fn close(&mut self, host: ConnectionId) -> Result<Lobby, ErrorCode> {
        self.remove_for_disconnect(host)
            .ok_or(ErrorCode::CannotCloseNone)
    }

    /// 切断時の後始末。ホストしていなければ何もしない
    pub fn remove_for_disconnect(&mut self, host: ConnectionId) -> Option<Lobby> {
        let id = self.by_host.remove(&host)?;
        self.lobbies.remove(&id)
    }

    /// ホスト中のロビーを更新し、実際に設定した値を返す
    pub fn update(
        &mut self,
        host: ConnectionId,
        update: LobbyUpdate,
    ) -> Result<(LobbyId, LobbyUpdate), ErrorCode> {
        let Some(lobby) = self
            .by_host
            .get(&host)
            .and_then(|id| self.lobbies.get_mut(id))
        else {
            return Err(update.none_error());
        };

        let applied = match update {
            LobbyUpdate::UserCount(value) => {
                lobby.user_count = value;
                LobbyUpdate::UserCount(value)
            }
            LobbyUpdate::UserLimit(value) => {
                lobby.user_limit = value;
                LobbyUpdate::UserLimit(value)
            }
            LobbyUpdate::HasPassword(value) => {
                lobby.has_password = value;
                LobbyUpdate::HasPassword(value)
            }
            LobbyUpdate::Name(value) => {
                lobby.name = truncate_chars(value.trim(), MAX_RENAMED_LOBBY_NAME_CHARS).to_owned();
                LobbyUpdate::Name(lobby.name.clone())
            }
        };
        Ok((lobby.id, applied))
    }

    pub fn get(&self, id: LobbyId) -> Option<&Lobby> {
        self.lobbies.get(&id)
    }

    pub fn hosted_by(&self, host: ConnectionId) -> Option<&Lobby> {
        self.by_host.get(&host).and_then(|id| self.lobbies.get(id))
    }

    /// ID順の公開レコード一覧
    pub fn snapshot(&self) -> Vec<LobbyRecord> {
        self.lobbies.values().map(Lobby::record).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lobbies.len()
    }
}
