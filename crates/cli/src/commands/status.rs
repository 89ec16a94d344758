//! `runwire status` — Show effective configuration.

use runwire_config::{AppConfig, LogFormat};
use std::path::Path;

pub async fn run(config: &AppConfig, explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    println!("runwire Status");
    println!("==============");
    println!("  Config file:     {}", config_path.display());
    println!("  Root namespace:  {}", config.emitter.root_namespace);
    println!(
        "  Max listeners:   {}",
        match config.emitter.max_listeners {
            0 => "unlimited".to_string(),
            n => n.to_string(),
        }
    );
    println!(
        "  Trace dispatch:  {}",
        if config.emitter.trace_dispatch { "enabled" } else { "disabled" }
    );
    println!("  Log level:       {}", config.logging.level);
    println!(
        "  Log format:      {}",
        match config.logging.format {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    );

    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, using defaults (see `runwire config default`)");
    }

    Ok(())
}
