//! `tutorgate serve`: Start the HTTP chat gateway.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("tutorgate gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.model.chat_model);
    println!(
        "   Rate limit: {}",
        match config.gateway.rate_limit_per_minute {
            0 => "off".to_string(),
            n => format!("{n}/min per client"),
        }
    );
    super::report_missing_credentials(&config);

    tutorgate_gateway::start(config).await?;

    Ok(())
}
