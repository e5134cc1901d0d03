use crate::error::{ErrorCode, ProtocolViolation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub type LobbyId = u64;

/// 新規ロビー名の上限（文字数）
pub const MAX_LOBBY_NAME_CHARS: usize = 50;
/// setName で受け付ける名前の上限（トリム後に切り詰め）
pub const MAX_RENAMED_LOBBY_NAME_CHARS: usize = 100;
pub const MIN_USER_LIMIT: u32 = 1;
pub const MAX_USER_LIMIT: u32 = 1000;

// ロビー言語
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    De,
    En,
    Ja,
}

impl FromStr for Language {
    type Err = ErrorCode;

    /// 大文字小文字は区別しない
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "de" => Ok(Language::De),
            "en" => Ok(Language::En),
            "ja" => Ok(Language::Ja),
            _ => Err(ErrorCode::InvalidLobbyData),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::De => "de",
            Language::En => "en",
            Language::Ja => "ja",
        })
    }
}

// ロビー情報（一覧・ブロードキャスト用の公開レコード）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyRecord {
    pub id: LobbyId,
    pub name: String,
    pub language: Language,
    pub user_count: u32,
    pub user_limit: u32,
    pub has_password: bool,
}

// ロビー作成要求（検証済み）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenLobby {
    pub name: String,
    pub language: Language,
    pub user_count: u32,
    pub user_limit: u32,
    pub has_password: bool,
}

/// WebSocketメッセージ（クライアント→サーバー）、操作ごとに1バリアント
///
/// 各フィールドは [`ClientMessage::decode`] で型・範囲チェック済み
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    OpenLobby(OpenLobby),
    CloseLobby,
    SetUserCount(u32),
    SetUserLimit(u32),
    SetHasPassword(bool),
    SetName(String),
    JoinLobbyOffer { lobby_id: LobbyId, sdp: Value },
    JoinLobbyAnswer { peer: usize, sdp: Value },
    JoinLobbyOfferIceCandidate { lobby_id: LobbyId, candidate: Value },
    JoinLobbyAnswerIceCandidate { peer: usize, candidate: Value },
    AllIcesSent { peer: usize },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenLobbyRequest {
    name: String,
    user_count: u32,
    user_limit: u32,
    has_password: bool,
    language: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewValueRequest<T> {
    new_value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferRequest {
    lobby_id: LobbyId,
    sdp: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferCandidateRequest {
    lobby_id: LobbyId,
    candidate: Value,
}

#[derive(Deserialize)]
struct AnswerRequest {
    peer: i64,
    sdp: Value,
}

#[derive(Deserialize)]
struct AnswerCandidateRequest {
    peer: i64,
    candidate: Value,
}

#[derive(Deserialize)]
struct PeerRequest {
    peer: i64,
}

fn parse<T: DeserializeOwned>(value: Value, code: ErrorCode) -> Result<T, ErrorCode> {
    serde_json::from_value(value).map_err(|_| code)
}

fn peer_index(peer: i64) -> Result<usize, ErrorCode> {
    usize::try_from(peer).map_err(|_| ErrorCode::InvalidPeer)
}

impl ClientMessage {
    /// テキストフレームをデコード
    ///
    /// 外側のエラーはエンベロープとして解釈できないフレーム（接続を切断する）。
    /// 内側のエラーは送信者にのみ返す回復可能なエラー。
    /// `type` が文字列以外でも、キーがあれば未知の種別として扱う。
    pub fn decode(text: &str) -> Result<Result<Self, ErrorCode>, ProtocolViolation> {
        let value: Value = serde_json::from_str(text)?;
        let kind = match value.get("type") {
            None => return Err(ProtocolViolation::MissingType),
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Ok(Err(ErrorCode::UnknownMessageType)),
        };
        Ok(Self::from_envelope(&kind, value))
    }

    fn from_envelope(kind: &str, value: Value) -> Result<Self, ErrorCode> {
        match kind {
            "openLobby" => {
                let request: OpenLobbyRequest = parse(value, ErrorCode::InvalidLobbyData)?;
                if !(MIN_USER_LIMIT..=MAX_USER_LIMIT).contains(&request.user_limit) {
                    return Err(ErrorCode::InvalidLobbyData);
                }
                Ok(ClientMessage::OpenLobby(OpenLobby {
                    language: request.language.parse()?,
                    name: request.name,
                    user_count: request.user_count,
                    user_limit: request.user_limit,
                    has_password: request.has_password,
                }))
            }
            "closeLobby" => Ok(ClientMessage::CloseLobby),
            "setUserCount" => {
                let request: NewValueRequest<u32> = parse(value, ErrorCode::InvalidUserCount)?;
                Ok(ClientMessage::SetUserCount(request.new_value))
            }
            "setUserLimit" => {
                let request: NewValueRequest<u32> = parse(value, ErrorCode::InvalidUserLimit)?;
                if !(MIN_USER_LIMIT..=MAX_USER_LIMIT).contains(&request.new_value) {
                    return Err(ErrorCode::InvalidUserLimit);
                }
                Ok(ClientMessage::SetUserLimit(request.new_value))
            }
            "setHasPassword" => {
                let request: NewValueRequest<bool> = parse(value, ErrorCode::InvalidHasPassword)?;
                Ok(ClientMessage::SetHasPassword(request.new_value))
            }
            "setName" => {
                let request: NewValueRequest<String> = parse(value, ErrorCode::InvalidName)?;
                Ok(ClientMessage::SetName(request.new_value))
            }
            "joinLobbyOffer" => {
                let request: OfferRequest = parse(value, ErrorCode::CannotJoinInvalidLobby)?;
                Ok(ClientMessage::JoinLobbyOffer {
                    lobby_id: request.lobby_id,
                    sdp: request.sdp,
                })
            }
            "joinLobbyAnswer" => {
                let request: AnswerRequest = parse(value, ErrorCode::InvalidPeer)?;
                Ok(ClientMessage::JoinLobbyAnswer {
                    peer: peer_index(request.peer)?,
                    sdp: request.sdp,
                })
            }
            "joinLobbyOfferIceCandidate" => {
                let request: OfferCandidateRequest =
                    parse(value, ErrorCode::CannotJoinInvalidLobby)?;
                Ok(ClientMessage::JoinLobbyOfferIceCandidate {
                    lobby_id: request.lobby_id,
                    candidate: request.candidate,
                })
            }
            "joinLobbyAnswerIceCandidate" => {
                let request: AnswerCandidateRequest = parse(value, ErrorCode::InvalidPeer)?;
                Ok(ClientMessage::JoinLobbyAnswerIceCandidate {
                    peer: peer_index(request.peer)?,
                    candidate: request.candidate,
                })
            }
            "allIcesSent" => {
                let request: PeerRequest = parse(value, ErrorCode::InvalidPeer)?;
                Ok(ClientMessage::AllIcesSent {
                    peer: peer_index(request.peer)?,
                })
            }
            _ => Err(ErrorCode::UnknownMessageType),
        }
    }
}

// WebSocketメッセージ（サーバー→クライアント）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    LobbyList {
        lobbies: Vec<LobbyRecord>,
    },
    // 作成者への応答
    Created {
        data: LobbyRecord,
    },

    // 全接続へのブロードキャスト
    LobbyOpened {
        lobby: LobbyRecord,
    },
    LobbyClosed {
        lobby_id: LobbyId,
    },
    LobbyUserCountChanged {
        lobby_id: LobbyId,
        new_value: u32,
    },
    LobbyUserLimitChanged {
        lobby_id: LobbyId,
        new_value: u32,
    },
    LobbyHasPasswordChanged {
        lobby_id: LobbyId,
        new_value: bool,
    },
    LobbyNameChanged {
        lobby_id: LobbyId,
        new_value: String,
    },

    // ホスト⇔ピア間の中継
    JoinRequestOffer {
        peer: usize,
        sdp: Value,
    },
    JoinRequestAnswer {
        sdp: Value,
    },
    JoinRequestOfferIceCandidate {
        peer: usize,
        candidate: Value,
    },
    JoinRequestAnswerIceCandidate {
        candidate: Value,
    },

    // エラー
    Error {
        code: ErrorCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request: Option<String>,
    },
}

impl ServerMessage {
    pub fn error(code: ErrorCode) -> Self {
        ServerMessage::Error {
            code,
            request: code.request().map(str::to_owned),
        }
    }
}

// ロビー一覧（HTTP API）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPage {
    pub lobbies: Vec<LobbyRecord>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}
