pub mod lobbies;
pub mod websocket;

pub use lobbies::list_lobbies;
pub use websocket::ws_handler;

use actix_web::web;

/// ルーティング登録
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(ws_handler))
        .route("/api/lobbies", web::get().to(list_lobbies));
}
