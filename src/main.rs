use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use lobby_relay::config::Config;
use lobby_relay::handlers;
use lobby_relay::relay::Relay;
use lobby_relay::tracing_helper;
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    tracing_helper::init_tracing()?;

    info!(
        lobbies_per_origin = config.lobbies_per_origin,
        trust_forwarded_for = config.trust_forwarded_for,
        "starting lobby relay"
    );

    // 共有状態初期化
    let relay = web::Data::new(Relay::new(config.lobbies_per_origin));
    let bind_addr = config.bind_addr.clone();
    let config = web::Data::new(config);

    info!("listening on ws://{}/ws", bind_addr);

    // HTTPサーバー起動
    HttpServer::new(move || {
        App::new()
            .app_data(relay.clone())
            .app_data(config.clone())
            .configure(handlers::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {bind_addr}"))?
    .run()
    .await?;

    Ok(())
}
