//! `skald history`: Print stored turns as JSON.

use skald_chat::{ChatOptions, HistoryQuery, QueryResult};
use std::path::Path;

use super::load_config;

async fn query(config_path: Option<&Path>) -> Result<HistoryQuery, Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let store = skald_gateway::open_store(&config).await?;
    let options = ChatOptions::from_config(&config);
    Ok(HistoryQuery::new(
        store,
        options.decode_policy,
        options.store_timeout,
    ))
}

pub async fn by_chat(
    config_path: Option<&Path>,
    chat_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = query(config_path).await?.by_chat(chat_id).await?;
    println!("{}", render(&result)?);
    Ok(())
}

pub async fn by_user(
    config_path: Option<&Path>,
    user_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = query(config_path).await?.by_user(user_id).await?;
    println!("{}", render(&result)?);
    Ok(())
}

fn render(result: &QueryResult) -> Result<String, serde_json::Error> {
    if result.skipped > 0 {
        eprintln!("warning: {} undecodable record(s) skipped", result.skipped);
    }
    serde_json::to_string_pretty(&result.turns)
}
