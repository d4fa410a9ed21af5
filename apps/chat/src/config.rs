//! Chat client configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux/macOS: `~/.config/agora/chat.toml`
//! - Windows: `%APPDATA%/agora/chat.toml`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Chat client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the chat server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Agent identity carried on outbound messages.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:8001/ws/project/21/".into()
}

fn default_agent_name() -> String {
    "researcher".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            agent_name: default_agent_name(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")?;
        Ok(PathBuf::from(appdata).join("agora").join("chat.toml"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("agora")
            .join("chat.toml"))
    }
}
