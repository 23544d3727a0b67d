//! `biochat serve` — Start the HTTP gateway.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("biochat gateway");
    println!("   Listening: {}", config.bind_addr());
    println!("   Model:     {}", config.generation.model);
    println!("   Index:     {}", config.index.backend);
    if config.gateway.allowed_origins.is_empty() {
        println!("   CORS:      no cross-origin access");
    } else {
        println!("   CORS:      {}", config.gateway.allowed_origins.join(", "));
    }

    biochat_gateway::start(config).await?;

    Ok(())
}
