use anyhow::Context;
use limbo_logger::{Logger, parse_level};
use limbo_server::Server;
use limbo_server::config::{AppConfig, DEFAULT_CONFIG_FILE, load_config};
use std::path::PathBuf;
use tracing::info;

#[limbo_runtime::main(high_performance)]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg: AppConfig =
        load_config(path.as_deref()).context("Critical: Configuration is malformed")?;

    let builder = Logger::builder()
        .name(env!("CARGO_PKG_NAME"))
        .level(parse_level(&cfg.logging.level)?);
    let _log = match &cfg.logging.directory {
        Some(dir) => builder.path(dir).json(cfg.logging.json).init()?,
        None => builder.init()?,
    };
    match &path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!(file = DEFAULT_CONFIG_FILE, "Configuration loaded, file optional"),
    }

    Server::builder().config(cfg).build().await?.run().await
}
