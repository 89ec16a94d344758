//! `runwire config` — Configuration management commands.

use runwire_config::AppConfig;

pub async fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn default() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", AppConfig::default_toml());
    Ok(())
}
