use anyhow::Result;
use std::sync::OnceLock;

use config::{Config, FileFormat};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn get_config() -> Result<&'static Config> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = build_config()?;
    Ok(CONFIG.get_or_init(|| config))
}

fn build_config() -> Result<Config> {
    Ok(Config::builder()
        .set_default("database_url", "sqlite://iss-speed.db?mode=rwc")?
        .set_default("source_url", "http://api.open-notify.org/iss-now.json")?
        .set_default("request_timeout_secs", 30)?
        .set_default("sample_interval_secs", 20)?
        .set_default("freshness_threshold_secs", 1800)?
        .set_default("pairing", "stored")?
        .set_default("watch_interval_secs", 300)?
        .set_default("show_count", 10)?
        .add_source(config::Environment::with_prefix("ISS_SPEED"))
        .add_source(config::File::new("iss-speed.toml", FileFormat::Toml).required(false))
        .build()?)
}
