use anyhow::Context;
use corn_gate::{config::AppConfig, init_server, init_tracing};
use std::env;
use std::path::Path;
use std::process;
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/corn-gate.yaml";

fn load_config() -> anyhow::Result<AppConfig> {
    match env::args().nth(1) {
        Some(path) => AppConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path)),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => AppConfig::from_file(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG_PATH)),
        None => {
            warn!("No configuration file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    init_tracing();

    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{:#}", e);
            eprintln!("Usage: corn-gate [config_file]");
            process::exit(1);
        }
    };

    if let Err(e) = init_server(config).await {
        eprintln!("corn-gate error: {}", e);
        process::exit(1);
    }
}
