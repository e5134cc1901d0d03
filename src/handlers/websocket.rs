use crate::config::Config;
use crate::error::ProtocolViolation;
use crate::models::ServerMessage;
use crate::relay::registry::{resolve_origin, ConnectionHandle};
use crate::relay::{deliver, Relay};
use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 送信キューの確認間隔
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// WebSocketアクター（1接続につき1つ）
pub struct WsSession {
    /// ハートビート最終時刻
    hb: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
    /// 接続元（クォータ判定用）
    origin: String,
    /// 共有の中継サービス
    relay: web::Data<Relay>,
    /// 登録済みの接続（started で登録、stopped で解除）
    connection: Option<ConnectionHandle>,
    /// メッセージ受信チャンネル
    rx: Option<mpsc::UnboundedReceiver<ServerMessage>>,
    /// メッセージ送信チャンネル
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl WsSession {
    pub fn new(relay: web::Data<Relay>, origin: String, config: &Config) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            hb: Instant::now(),
            heartbeat_interval: config.heartbeat_interval(),
            client_timeout: config.client_timeout(),
            origin,
            relay,
            connection: None,
            rx: Some(rx),
            tx,
        }
    }

    /// ハートビート送信
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.client_timeout {
                info!(origin = %act.origin, "heartbeat timed out, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// メッセージポーリング
    fn poll_messages(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(POLL_INTERVAL, |act, ctx| {
            if let Some(rx) = &mut act.rx {
                while let Ok(msg) = rx.try_recv() {
                    match serde_json::to_string(&msg) {
                        Ok(json) => ctx.text(json),
                        Err(err) => warn!(%err, "failed to serialize outgoing message"),
                    }
                }
            }
        });
    }

    /// プロトコル違反による切断
    fn reject(&self, violation: ProtocolViolation, ctx: &mut ws::WebsocketContext<Self>) {
        warn!(origin = %self.origin, %violation, "protocol violation, closing connection");
        let code = match violation {
            ProtocolViolation::Binary => ws::CloseCode::Unsupported,
            _ => ws::CloseCode::Invalid,
        };
        ctx.close(Some((code, violation.to_string()).into()));
        ctx.stop();
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        self.connection = Some(self.relay.register(self.origin.clone(), self.tx.clone()));
        self.poll_messages(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // ホスト中のロビー・ピアスロット表を破棄
        if let Some(connection) = self.connection.take() {
            deliver(self.relay.deregister(&connection));
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                let Some(connection) = &self.connection else {
                    return;
                };
                debug!(connection = %connection.id(), "received: {}", text);
                if let Err(violation) = self.relay.process(connection, &text) {
                    self.reject(violation, ctx);
                }
            }
            Ok(ws::Message::Binary(_)) => {
                self.reject(ProtocolViolation::Binary, ctx);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(err) => {
                warn!(origin = %self.origin, %err, "websocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// WebSocketエンドポイント
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    relay: web::Data<Relay>,
    config: web::Data<Config>,
) -> Result<HttpResponse, Error> {
    let forwarded_for = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok());
    let origin = resolve_origin(req.peer_addr(), forwarded_for, config.trust_forwarded_for);
    debug!(%origin, "websocket connection attempt");

    ws::start(WsSession::new(relay, origin, &config), &req, stream)
}
