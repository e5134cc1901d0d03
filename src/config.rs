use crate::relay::quota::DEFAULT_LOBBIES_PER_ORIGIN;
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4538";
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 10;

/// サーバー設定（コマンドライン引数または環境変数）
#[derive(Parser, Debug, Clone)]
#[command(name = "lobby-relay")]
#[command(about = "Lobby directory and WebRTC signalling relay", long_about = None)]
pub struct Config {
    /// Listen address
    #[arg(long, env = "RELAY_BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: String,

    /// Maximum number of lobbies hosted from one origin at the same time
    #[arg(long, env = "RELAY_LOBBIES_PER_ORIGIN", default_value_t = DEFAULT_LOBBIES_PER_ORIGIN)]
    pub lobbies_per_origin: u32,

    /// Seconds between heartbeat pings
    #[arg(long, env = "RELAY_HEARTBEAT_INTERVAL_SECS", default_value_t = DEFAULT_HEARTBEAT_INTERVAL_SECS)]
    pub heartbeat_interval_secs: u64,

    /// Seconds without ping/pong before a client is dropped
    #[arg(long, env = "RELAY_CLIENT_TIMEOUT_SECS", default_value_t = DEFAULT_CLIENT_TIMEOUT_SECS)]
    pub client_timeout_secs: u64,

    /// Use X-Forwarded-For for connections arriving from loopback (reverse proxy)
    #[arg(
        long,
        env = "RELAY_TRUST_FORWARDED_FOR",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub trust_forwarded_for: bool,
}

impl Config {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            lobbies_per_origin: DEFAULT_LOBBIES_PER_ORIGIN,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            client_timeout_secs: DEFAULT_CLIENT_TIMEOUT_SECS,
            trust_forwarded_for: true,
        }
    }
}
