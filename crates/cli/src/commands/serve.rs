//! `skald serve`: Start the HTTP gateway.

use std::path::Path;

use super::load_config;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Skald gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:      {:?}", config.store.backend);
    println!(
        "   Generation: {}",
        config.generation.base_url.as_deref().unwrap_or("(not configured)")
    );

    skald_gateway::start(config).await?;

    Ok(())
}
