use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 送信者にのみ `{"type":"error","code":...}` として返すエラーコード
///
/// 接続は維持され、共有状態も変更されない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    #[error("lobby data is missing or malformed")]
    InvalidLobbyData,
    #[error("lobby limit reached")]
    LobbyLimitReached,
    #[error("lobby name is too long")]
    LobbyNameTooLong,
    #[error("no lobby to close")]
    CannotCloseNone,

    #[error("invalid user count")]
    InvalidUserCount,
    #[error("no lobby to set the user count on")]
    CannotSetUserCountOnNone,
    #[error("invalid user limit")]
    InvalidUserLimit,
    #[error("no lobby to set the user limit on")]
    CannotSetUserLimitOnNone,
    #[error("invalid password flag")]
    InvalidHasPassword,
    #[error("no lobby to set the password flag on")]
    CannotSetHasPasswordOnNone,
    #[error("invalid name")]
    InvalidName,
    #[error("no lobby to set the name on")]
    CannotSetNameOnNone,

    #[error("lobby is full")]
    CannotJoinFullLobby,
    #[error("lobby does not exist")]
    CannotJoinInvalidLobby,
    #[error("peer index is malformed")]
    InvalidPeer,
    #[error("no peer is waiting for an answer in that slot")]
    NoWaitingPeer,
    #[error("no peer is waiting in that slot")]
    PeerNotWaiting,
    #[error("not joining that lobby")]
    CannotSendIceCandidateToLobbyYouAreNotJoining,

    #[error("unknown message type")]
    UnknownMessageType,
}

impl ErrorCode {
    /// エラーの原因となったリクエスト名（クライアント側での識別用）
    pub fn request(self) -> Option<&'static str> {
        match self {
            ErrorCode::InvalidLobbyData => Some("openLobby"),
            _ => None,
        }
    }
}

/// 解釈できないフレーム（接続を切断する）
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not an object with a string `type` field")]
    MissingType,
    #[error("binary frames are not supported")]
    Binary,
}
