use lint_bridge::{config::BridgeConfig, init_bridge, init_tracing};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/lint-bridge.yaml".to_string());

    // Load configuration
    let config = match BridgeConfig::from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            eprintln!("Usage: lint-bridge [config_file]");
            process::exit(1);
        }
    };

    init_tracing(&config.logging);

    // Start the bridge
    if let Err(e) = init_bridge(config).await {
        eprintln!("Lint bridge error: {}", e);
        process::exit(1);
    }
}
