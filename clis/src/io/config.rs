//! Harness configuration stored in `clis.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::server::ServerOptions;
use crate::io::stream::{InvocationMode, StreamOptions};

/// Harness configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults the
/// clients are usually run with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Ask clients to write per-transaction traces.
    pub trace: bool,

    pub binaries: ClientBinaries,

    pub stream: StreamConfig,

    pub server: ServerConfig,
}

/// Explicit binary paths; unset clients use their default command name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientBinaries {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geth: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub besu: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethrex: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    pub mode: InvocationMode,

    /// Kill a one-shot tool after this many seconds. Unset waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,

    /// How long to wait for the server to report its port.
    pub startup_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 5,
            startup_timeout_secs: 60,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server.request_timeout_secs == 0 {
            return Err(anyhow!("server.request_timeout_secs must be > 0"));
        }
        if self.server.startup_timeout_secs == 0 {
            return Err(anyhow!("server.startup_timeout_secs must be > 0"));
        }
        if self.stream.timeout_secs == Some(0) {
            return Err(anyhow!("stream.timeout_secs must be > 0 when set"));
        }
        for (client, path) in [
            ("geth", &self.binaries.geth),
            ("besu", &self.binaries.besu),
            ("ethrex", &self.binaries.ethrex),
        ] {
            if path.as_ref().is_some_and(|path| path.as_os_str().is_empty()) {
                return Err(anyhow!("binaries.{client} must not be empty"));
            }
        }
        Ok(())
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            mode: self.stream.mode,
            trace: self.trace,
            timeout: self.stream.timeout_secs.map(Duration::from_secs),
            ..StreamOptions::default()
        }
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            trace: self.trace,
            request_timeout: Duration::from_secs(self.server.request_timeout_secs),
            startup_timeout: Duration::from_secs(self.server.startup_timeout_secs),
            ..ServerOptions::default()
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
