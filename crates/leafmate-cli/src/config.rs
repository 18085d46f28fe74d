//! Configuration Vault – reads/writes `~/.leafmate/config.toml`.

use leafmate_runtime::{ApiConfig, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.leafmate/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Ollama instance.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model the companion chats with.
    #[serde(default = "default_model")]
    pub active_model: String,

    /// Directory holding `data.json`.  Defaults to `~/.leafmate/data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Where `/export` writes when no directory is given.  Defaults to the
    /// data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,

    /// TTS command line fed the reply on stdin.  Empty disables the entry.
    #[serde(default = "default_speech_command")]
    pub speech_command: String,

    /// Replaces the built-in companion persona.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_speech_command() -> String {
    "espeak".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            active_model: default_model(),
            data_dir: None,
            export_dir: None,
            speech_command: default_speech_command(),
            system_prompt: None,
        }
    }
}

impl Config {
    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| leafmate_home(&home_dir()).join("data"))
    }

    /// Resolved export directory.
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| self.data_dir())
    }

    /// The subset of settings the runtime builds its capabilities from.
    pub fn api_config(&self) -> ApiConfig {
        let speech = self.speech_command.trim();
        ApiConfig {
            ollama_url: self.ollama_url.clone(),
            model: self.active_model.clone(),
            system_prompt: self.system_prompt.clone(),
            speech_command: (!speech.is_empty()).then(|| speech.to_string()),
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn leafmate_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".leafmate")
}

/// Return the path to `~/.leafmate/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    leafmate_home(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `LEAFMATE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `LEAFMATE_OLLAMA_URL` | `ollama_url` |
/// | `LEAFMATE_MODEL` | `active_model` |
/// | `LEAFMATE_DATA_DIR` | `data_dir` |
/// | `LEAFMATE_EXPORT_DIR` | `export_dir` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("LEAFMATE_OLLAMA_URL") {
        cfg.ollama_url = v;
    }
    if let Ok(v) = std::env::var("LEAFMATE_MODEL") {
        cfg.active_model = v;
    }
    if let Ok(v) = std::env::var("LEAFMATE_DATA_DIR")
        && !v.is_empty()
    {
        cfg.data_dir = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("LEAFMATE_EXPORT_DIR")
        && !v.is_empty()
    {
        cfg.export_dir = Some(PathBuf::from(v));
    }
}

/// Save the config to disk, creating `~/.leafmate/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
