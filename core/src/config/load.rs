use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default kondate data directory: ~/.kondate
pub fn get_kondate_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".kondate"))
}

/// Layered config load: ~/.kondate/config.toml, then ./config.toml, then
/// built-in defaults; `KONDATE_*` environment variables override last.
pub fn load_default() -> anyhow::Result<AppConfig> {
    let kondate_dir = get_kondate_data_dir()?;
    let home_config = kondate_dir.join("config.toml");
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if home_config.exists() {
        let s = std::fs::read_to_string(&home_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else {
        AppConfig::default()
    };

    if let Ok(v) = std::env::var("KONDATE_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }
    if let Ok(v) = std::env::var("KONDATE_MAX_PARALLEL") {
        if let Ok(n) = v.trim().parse::<usize>() {
            cfg.executor.max_parallel = n.max(1);
        }
    }
    if let Ok(v) = std::env::var("KONDATE_PAUSED_TTL_SECS") {
        if let Ok(n) = v.trim().parse::<u64>() {
            cfg.confirmation.paused_ttl_secs = n;
        }
    }
    if let Ok(v) = std::env::var("KONDATE_SESSION_MAX_AGE_HOURS") {
        if let Ok(n) = v.trim().parse::<u64>() {
            cfg.session.max_age_hours = n;
        }
    }

    Ok(cfg)
}
