//! Application configuration stored in `skyreply.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "skyreply.toml";
/// Upper bound accepted by the timeline endpoint.
pub const MAX_TIMELINE_LIMIT: u32 = 100;

/// Application configuration (TOML).
///
/// Meant to be edited by humans. Missing sections and fields fall back to
/// defaults; credentials never live here, only the names of the environment
/// variables that hold them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub timeline: TimelineConfig,
    pub backend: BackendConfig,
    pub bluesky: BlueskyConfig,
    pub post: PostConfig,
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimelineConfig {
    /// Number of posts fetched per reply workflow.
    pub limit: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self { limit: 20 }
    }
}

/// Generative backend selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Spawn a local command per completion.
    Command(CommandBackendConfig),
    /// OpenAI-compatible chat completions endpoint.
    Chat(ChatBackendConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Command(CommandBackendConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandBackendConfig {
    /// Program and arguments; the prompt is written to stdin.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for CommandBackendConfig {
    fn default() -> Self {
        Self {
            command: vec!["llm".to_string()],
            timeout_secs: 120,
            output_limit_bytes: 100_000,
        }
    }
}

/// How the API key is presented to the chat endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ChatAuth {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// `api-key: <key>` (Azure OpenAI).
    ApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatBackendConfig {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub auth: ChatAuth,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for ChatBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            auth: ChatAuth::Bearer,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BlueskyConfig {
    /// PDS / entryway base URL.
    pub service: String,
    /// Environment variable holding the account handle.
    pub handle_env: String,
    /// Environment variable holding the app password.
    pub password_env: String,
    pub timeout_secs: u64,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".to_string(),
            handle_env: "BSKY_HANDLE".to_string(),
            password_env: "BSKY_APP_PASSWORD".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PostConfig {
    /// Alt text attached to uploaded images.
    pub image_alt: String,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            image_alt: "Image shared by skyreply".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Directory for per-session JSON transcripts. Disabled when unset.
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeline.limit == 0 || self.timeline.limit > MAX_TIMELINE_LIMIT {
            return Err(anyhow!(
                "timeline.limit must be between 1 and {MAX_TIMELINE_LIMIT}"
            ));
        }
        match &self.backend {
            BackendConfig::Command(cfg) => {
                if cfg.command.is_empty() || cfg.command[0].trim().is_empty() {
                    return Err(anyhow!("backend.command must be a non-empty array"));
                }
                if cfg.timeout_secs == 0 {
                    return Err(anyhow!("backend.timeout_secs must be > 0"));
                }
                if cfg.output_limit_bytes == 0 {
                    return Err(anyhow!("backend.output_limit_bytes must be > 0"));
                }
            }
            BackendConfig::Chat(cfg) => {
                if cfg.base_url.trim().is_empty() || cfg.model.trim().is_empty() {
                    return Err(anyhow!("backend.base_url and backend.model must be set"));
                }
                if cfg.api_key_env.trim().is_empty() {
                    return Err(anyhow!("backend.api_key_env must be set"));
                }
                if cfg.timeout_secs == 0 {
                    return Err(anyhow!("backend.timeout_secs must be > 0"));
                }
                if !(0.0..=2.0).contains(&cfg.temperature) {
                    return Err(anyhow!("backend.temperature must be within 0.0..=2.0"));
                }
            }
        }
        if self.bluesky.service.trim().is_empty() {
            return Err(anyhow!("bluesky.service must be set"));
        }
        if self.bluesky.handle_env.trim().is_empty() || self.bluesky.password_env.trim().is_empty()
        {
            return Err(anyhow!("bluesky.handle_env and bluesky.password_env must be set"));
        }
        if self.bluesky.timeout_secs == 0 {
            return Err(anyhow!("bluesky.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AppConfig::default()`.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        let cfg = AppConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("skyreply.toml");
        fs::write(&path, "[timeline]\nlimit = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.timeline.limit, 5);
        assert_eq!(cfg.backend, BackendConfig::default());
        assert_eq!(cfg.bluesky, BlueskyConfig::default());
    }

    #[test]
    fn parses_chat_backend() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("skyreply.toml");
        fs::write(
            &path,
            concat!(
                "[backend]\n",
                "kind = \"chat\"\n",
                "base_url = \"https://example.openai.azure.com/openai/v1\"\n",
                "model = \"gpt-4o\"\n",
                "auth = \"api-key\"\n",
            ),
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        let BackendConfig::Chat(chat) = cfg.backend else {
            panic!("expected chat backend");
        };
        assert_eq!(chat.model, "gpt-4o");
        assert_eq!(chat.auth, ChatAuth::ApiKey);
        assert_eq!(chat.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn rejects_zero_limit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("skyreply.toml");
        fs::write(&path, "[timeline]\nlimit = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("timeline.limit"));
    }

    #[test]
    fn rejects_empty_command() {
        let cfg = AppConfig {
            backend: BackendConfig::Command(CommandBackendConfig {
                command: Vec::new(),
                ..CommandBackendConfig::default()
            }),
            ..AppConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("backend.command"));
    }

    #[test]
    fn rejects_unknown_backend_kind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("skyreply.toml");
        fs::write(&path, "[backend]\nkind = \"carrier-pigeon\"\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}
