use std::panic;

use tracing::error;
use tracing_subscriber::{
    fmt::{
        self,
        format::{Compact, DefaultFields, Format},
    },
    prelude::__tracing_subscriber_SubscriberExt,
    util::TryInitError,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

fn default_subscriber_builder() -> fmt::Layer<Registry, DefaultFields, Format<Compact>> {
    const WITH_FILE_PATH: bool = cfg!(debug_assertions);
    fmt::layer()
        .compact()
        .with_file(WITH_FILE_PATH)
        .with_line_number(WITH_FILE_PATH)
        .with_target(!WITH_FILE_PATH)
        .with_thread_ids(true)
}

/// ログ出力を初期化（`RUST_LOG` 未設定時は `lobby_relay=info`）
pub fn init_tracing() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(concat!(env!("CARGO_CRATE_NAME"), "=info")));
    tracing_subscriber::registry()
        .with(default_subscriber_builder().with_filter(filter))
        .try_init()?;
    panic::set_hook(Box::new(|panic| error!("{}", panic)));
    Ok(())
}
