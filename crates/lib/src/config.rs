//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.meshbot/config.json`) and environment.
//! Secrets (webhook URL, bot token) are usually supplied via environment instead of
//! the file; the `resolve_*` helpers apply the override order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Mesh device connection and channel naming.
    #[serde(default)]
    pub mesh: MeshConfig,

    /// Chat side: webhook sink and command surface.
    #[serde(default)]
    pub chat: ChatConfig,

    /// When true, chat delivery is disabled entirely (local testing against a live mesh).
    #[serde(default)]
    pub debug: bool,
}

/// Mesh device host/port and the channel names resolved at discovery time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshConfig {
    /// Companion device host. Overridden by MESH_HOST env when set.
    pub host: Option<String>,

    /// Companion device TCP port (default 5000).
    #[serde(default = "default_mesh_port")]
    pub port: u16,

    /// Name of the public channel (default "Public").
    #[serde(default = "default_public_name")]
    pub public_name: String,

    /// Name of the test channel (default "#test").
    #[serde(default = "default_test_name")]
    pub test_name: String,

    /// Name of the direct bot-command channel (default "#bot").
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Messages on this channel are never mirrored to chat (default "#crispr").
    #[serde(default = "default_no_mirror_name")]
    pub no_mirror_name: String,

    /// Prefacing a message with this token addresses the bot from any channel.
    /// Matched case-insensitively (default "@[msg bot").
    #[serde(default = "default_mention")]
    pub mention: String,
}

fn default_mesh_port() -> u16 {
    5000
}

fn default_public_name() -> String {
    "Public".to_string()
}

fn default_test_name() -> String {
    "#test".to_string()
}

fn default_bot_name() -> String {
    "#bot".to_string()
}

fn default_no_mirror_name() -> String {
    "#crispr".to_string()
}

fn default_mention() -> String {
    "@[msg bot".to_string()
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_mesh_port(),
            public_name: default_public_name(),
            test_name: default_test_name(),
            bot_name: default_bot_name(),
            no_mirror_name: default_no_mirror_name(),
            mention: default_mention(),
        }
    }
}

/// Chat platform config: webhook for notifications, bot credential for the command surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Webhook URL for posting notifications. Overridden by DISCORD_WEBHOOK_URL env.
    pub webhook_url: Option<String>,

    /// Bot token for the chat REST API. Overridden by MESHBOT_TOKEN env.
    pub bot_token: Option<String>,

    /// Chat channel id to watch for `$pub`/`$test`/`help`. Overridden by DISCORD_CHANNEL_ID env.
    pub channel_id: Option<u64>,

    /// Chat REST API base URL (default Discord v10). Mostly useful for tests.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            bot_token: None,
            channel_id: None,
            api_base: default_api_base(),
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the mesh device host: env MESH_HOST overrides config.
pub fn resolve_mesh_host(config: &Config) -> Option<String> {
    env_nonempty("MESH_HOST").or_else(|| {
        config
            .mesh
            .host
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the chat webhook URL: env DISCORD_WEBHOOK_URL overrides config.
pub fn resolve_webhook_url(config: &Config) -> Option<String> {
    env_nonempty("DISCORD_WEBHOOK_URL").or_else(|| {
        config
            .chat
            .webhook_url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the chat bot token: env MESHBOT_TOKEN overrides config.
pub fn resolve_bot_token(config: &Config) -> Option<String> {
    env_nonempty("MESHBOT_TOKEN").or_else(|| {
        config
            .chat
            .bot_token
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the watched chat channel id: env DISCORD_CHANNEL_ID overrides config.
pub fn resolve_chat_channel_id(config: &Config) -> Option<u64> {
    env_nonempty("DISCORD_CHANNEL_ID")
        .and_then(|s| s.parse().ok())
        .or(config.chat.channel_id)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MESHBOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".meshbot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or MESHBOT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
