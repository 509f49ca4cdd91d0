//! CLI configuration from `~/.skiff/config.toml`.

use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_URL: &str = "ws://127.0.0.1:4000/ws";

#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerSection {
    pub url: Option<String>,
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".skiff").join("config.toml"))
}

/// Load the config file if present; a missing file is the default config,
/// a malformed one is an error worth surfacing.
pub fn load() -> anyhow::Result<CliConfig> {
    let Some(path) = config_path() else {
        return Ok(CliConfig::default());
    };
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CliConfig::default()),
        Err(e) => return Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    };
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))
}

/// Resolve the server URL: explicit flag, then config file, then default.
pub fn resolve_url(flag: Option<String>, config: &CliConfig) -> String {
    flag.or_else(|| config.server.url.clone())
        .unwrap_or_else(|| DEFAULT_URL.to_string())
}
