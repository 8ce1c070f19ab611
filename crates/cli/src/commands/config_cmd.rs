//! `skald config`: Configuration management commands.

use skald_config::{AppConfig, StoreBackend};
use std::path::{Path, PathBuf};

use super::load_config;

fn config_file(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Non-fatal problems worth pointing out.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if config.generation.base_url.is_none() {
        warnings.push("No generation URL set (generation.base_url or BALDR_URL)");
    }
    if config.generation.inpaint_url.is_none() {
        warnings.push("No inpaint URL set (generation.inpaint_url or BALDR_SDXL_URL)");
    }
    if !config.oauth.is_configured() {
        warnings.push("OAuth not configured; POST /auth will answer 503");
    }
    if config.store.backend == StoreBackend::Memory {
        warnings.push("In-memory store: turns are lost on restart");
    }
    if config.gateway.allowed_origins.is_empty() {
        warnings.push("No CORS origins allowed; browsers on other origins are blocked");
    }
    warnings
}

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match load_config(config_path) {
        Ok(config) => {
            println!("   Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!(
                "   Gateway:    {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("   Store:      {:?} ({})", config.store.backend, config.store.url);
            println!("   Decode:     {:?}", config.store.decode_policy);
            println!(
                "   Deadlines:  store {}s, generation {}s",
                config.chat.store_timeout_secs, config.chat.generation_timeout_secs
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    if config.oauth.client_secret.is_some() {
        config.oauth.client_secret = Some("[REDACTED]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_file(config_path).display());
    Ok(())
}

pub async fn init(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let file = config_file(config_path);
    if file.exists() {
        println!("Config already exists at {}", file.display());
        return Ok(());
    }
    if let Some(dir) = file.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&file, AppConfig::default_toml())?;
    println!("Wrote default config to {}", file.display());
    Ok(())
}
