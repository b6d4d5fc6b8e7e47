use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::fs;

use crate::error::{StudyError, StudyResult};
use crate::models::{AppConfig, CURRENT_CONFIG_VERSION};

pub const APP_DIR_NAME: &str = "study-reminders";
const CONFIG_FILE_NAME: &str = "settings.json";

/// Check if debug mode is forced via environment variable
fn is_debug_env() -> bool {
    std::env::var("STUDY_REMINDERS_DEBUG")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Check if URL is valid (https:// always, or http:// in debug mode)
fn is_valid_url(url: &str, debug: bool) -> bool {
    if url.starts_with("https://") {
        return true;
    }
    if debug && url.starts_with("http://") {
        return true;
    }
    false
}

fn trimmed_or_none(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Clamp, trim, and sanitise every field so the rest of the app can trust it.
fn validate(mut cfg: AppConfig) -> AppConfig {
    cfg.debug = cfg.debug || is_debug_env();
    cfg.data_directory = trimmed_or_none(cfg.data_directory);
    cfg.log_directory = trimmed_or_none(cfg.log_directory);
    cfg.max_log_days = cfg.max_log_days.clamp(1, 365);

    cfg.alarm_webhook_url = trimmed_or_none(cfg.alarm_webhook_url).and_then(|url| {
        if is_valid_url(&url, cfg.debug) {
            Some(url)
        } else {
            warn!("config: invalid alarm_webhook_url '{url}', delegated alarms disabled");
            None
        }
    });

    if cfg.config_version > CURRENT_CONFIG_VERSION {
        warn!(
            "config: version {} is newer than supported {}",
            cfg.config_version, CURRENT_CONFIG_VERSION
        );
    }
    cfg.config_version = CURRENT_CONFIG_VERSION;
    cfg
}

fn base_config_dir() -> StudyResult<PathBuf> {
    let mut base = dirs::config_dir()
        .ok_or_else(|| StudyError::config("failed to resolve config dir"))?;
    base.push(APP_DIR_NAME);
    Ok(base)
}

pub fn config_path() -> StudyResult<PathBuf> {
    Ok(base_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Directory holding `reminders.json`.
pub fn data_dir(cfg: &AppConfig) -> StudyResult<PathBuf> {
    if let Some(dir) = &cfg.data_directory {
        return Ok(PathBuf::from(dir));
    }
    let mut base = dirs::data_local_dir()
        .ok_or_else(|| StudyError::config("failed to resolve data dir"))?;
    base.push(APP_DIR_NAME);
    Ok(base)
}

/// Directory for the daily JSONL activity logs.
pub fn log_dir(cfg: &AppConfig) -> StudyResult<PathBuf> {
    let mut dir = match &cfg.log_directory {
        Some(dir) => PathBuf::from(dir),
        None => base_config_dir()?,
    };
    dir.push("logs");
    Ok(dir)
}

pub async fn load_config(path: &Path) -> StudyResult<AppConfig> {
    if !path.exists() {
        info!("no config file at {}, using defaults", path.display());
        return Ok(validate(AppConfig::default()));
    }

    debug!("loading config from {}", path.display());

    let content = fs::read_to_string(path)
        .await
        .map_err(|err| StudyError::config(format!("failed to read config: {err}")))?;

    let parsed: AppConfig = serde_json::from_str(&content)
        .map_err(|err| StudyError::config(format!("invalid config JSON: {err}")))?;

    // always persist after load so the file reflects the latest schema
    match save_config(path, parsed.clone()).await {
        Ok(saved) => Ok(saved),
        Err(err) => {
            warn!("could not rewrite config {}: {}", path.display(), err);
            Ok(validate(parsed))
        }
    }
}

pub async fn save_config(path: &Path, input: AppConfig) -> StudyResult<AppConfig> {
    let validated = validate(input);

    info!("saving config to {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| StudyError::config(format!("failed to create config directory: {err}")))?;
    }

    let serialized = serde_json::to_string_pretty(&validated)
        .map_err(|err| StudyError::config(format!("failed to serialize config: {err}")))?;

    fs::write(path, serialized)
        .await
        .map_err(|err| StudyError::config(format!("failed to write config: {err}")))?;

    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_config(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("study_reminders_cfg_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_validate_clamps_and_trims() {
        let cfg = validate(AppConfig {
            data_directory: Some("   ".to_string()),
            log_directory: Some(" /tmp/logs ".to_string()),
            max_log_days: 0,
            alarm_webhook_url: Some("ftp://alarm.example".to_string()),
            debug: false,
            terminal_bell: true,
            config_version: 0,
        });
        assert_eq!(cfg.data_directory, None);
        assert_eq!(cfg.log_directory.as_deref(), Some("/tmp/logs"));
        assert_eq!(cfg.max_log_days, 1);
        assert_eq!(cfg.alarm_webhook_url, None);
        assert_eq!(cfg.config_version, CURRENT_CONFIG_VERSION);
    }

    #[test]
    fn test_http_url_needs_debug() {
        assert!(is_valid_url("https://alarm.example/hook", false));
        assert!(!is_valid_url("http://localhost:3456/hook", false));
        assert!(is_valid_url("http://localhost:3456/hook", true));
    }

    #[test]
    fn test_log_dir_uses_override() {
        let cfg = AppConfig {
            log_directory: Some("/var/tmp/study".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(log_dir(&cfg).unwrap(), PathBuf::from("/var/tmp/study/logs"));
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let path = temp_config("roundtrip");
        let saved = save_config(
            &path,
            AppConfig {
                alarm_webhook_url: Some("https://alarm.example/hook".to_string()),
                max_log_days: 30,
                ..AppConfig::default()
            },
        )
        .await
        .unwrap();

        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded.alarm_webhook_url, saved.alarm_webhook_url);
        assert_eq!(loaded.max_log_days, 30);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let path = temp_config("missing");
        let cfg = load_config(&path).await.unwrap();
        assert_eq!(cfg.max_log_days, 7);
        assert!(cfg.terminal_bell);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let path = temp_config("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "terminal_bell": false }"#).unwrap();

        let cfg = load_config(&path).await.unwrap();
        assert!(!cfg.terminal_bell);
        assert_eq!(cfg.max_log_days, 7);

        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("\"config_version\": 1"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
