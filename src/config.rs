use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::alquran;
use crate::quran;

const DEFAULT_ENV_PREFIX: &str = "NOOR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
    #[serde(default = "default_page_edition")]
    pub page_edition: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            fallback_url: default_fallback_url(),
            page_edition: default_page_edition(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_primary_url() -> String {
    quran::QURAN_API_BASE.to_string()
}

fn default_fallback_url() -> String {
    alquran::ALQURAN_API_BASE.to_string()
}

fn default_page_edition() -> String {
    alquran::DEFAULT_PAGE_EDITION.to_string()
}

fn default_user_agent() -> String {
    "noor-tui/0.1 (+https://github.com/noor-app/noor-tui)".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_audio_command")]
    pub audio_command: Vec<String>,
    #[serde(default = "default_audio_detach")]
    pub audio_detach: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio_command: default_audio_command(),
            audio_detach: default_audio_detach(),
        }
    }
}

fn default_audio_command() -> Vec<String> {
    vec!["mpv".into(), "--no-video".into(), "%URL%".into()]
}

fn default_audio_detach() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.primary_url.is_empty() {
        base.api.primary_url = other.api.primary_url;
    }
    if !other.api.fallback_url.is_empty() {
        base.api.fallback_url = other.api.fallback_url;
    }
    if !other.api.page_edition.is_empty() {
        base.api.page_edition = other.api.page_edition;
    }
    if !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    base.api.timeout = other.api.timeout;

    if !other.ui.theme.is_empty() {
        base.ui.theme = other.ui.theme;
    }

    if !other.player.audio_command.is_empty() {
        base.player.audio_command = other.player.audio_command;
    }
    base.player.audio_detach = other.player.audio_detach;

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return Ok(Config::default());
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.primary_url" => cfg.api.primary_url = value,
        "api.fallback_url" => cfg.api.fallback_url = value,
        "api.page_edition" => cfg.api.page_edition = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "ui.theme" => cfg.ui.theme = value,
        "player.audio_command" => {
            cfg.player.audio_command = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "player.audio_detach" => {
            cfg.player.audio_detach = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("noor-tui").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions {
            config_file: None,
            env_prefix: Some("NOOR_TEST_DEFAULTS".into()),
        })
        .unwrap();
        assert_eq!(cfg.ui.theme, "default");
        assert_eq!(cfg.api.primary_url, quran::QURAN_API_BASE);
        assert_eq!(cfg.api.fallback_url, alquran::ALQURAN_API_BASE);
        assert_eq!(cfg.api.page_edition, "quran-uthmani");
        assert_eq!(cfg.api.timeout, Duration::from_secs(20));
        assert_eq!(cfg.player.audio_command[0], "mpv");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "api:\n  fallback_url: http://localhost:8080/v1\nui:\n  theme: sepia"
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("NOOR_TEST_UNSET".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.fallback_url, "http://localhost:8080/v1");
        assert_eq!(cfg.ui.theme, "sepia");
        assert_eq!(cfg.api.primary_url, quran::QURAN_API_BASE);
    }

    #[test]
    fn env_overrides() {
        env::set_var("NOOR_TEST_THEME_UI__THEME", "night");
        let cfg = load(LoadOptions {
            config_file: None,
            env_prefix: Some("NOOR_TEST_THEME".into()),
        })
        .unwrap();
        assert_eq!(cfg.ui.theme, "night");
        env::remove_var("NOOR_TEST_THEME_UI__THEME");
    }

    #[test]
    fn env_timeout_parses_humantime() {
        env::set_var("NOOR_TEST_TIMEOUT_API__TIMEOUT", "5s");
        let cfg = load(LoadOptions {
            config_file: None,
            env_prefix: Some("NOOR_TEST_TIMEOUT".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.timeout, Duration::from_secs(5));
        env::remove_var("NOOR_TEST_TIMEOUT_API__TIMEOUT");
    }
}
