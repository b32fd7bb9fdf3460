//! Handle to one external client binary and its declared capabilities.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_command;

/// Upper bound for `--help` / `--version` probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// A resolved client binary with its identity and capability text cached.
///
/// Construction runs the capability probe once; every later fork-support
/// query is a lookup in that cached text.
#[derive(Debug)]
pub struct EvmBinary {
    binary: PathBuf,
    version: Option<String>,
    capabilities: String,
    help_cache: Mutex<BTreeMap<String, String>>,
}

impl EvmBinary {
    /// Probe `binary` (or `default_binary` when unset).
    ///
    /// Runs `<binary> [capability_subcommand] --help` and fails if the binary
    /// cannot be spawned at all. The `--version` probe is best effort.
    #[instrument(skip_all, fields(binary))]
    pub fn probe(
        binary: Option<&Path>,
        default_binary: &str,
        capability_subcommand: Option<&str>,
    ) -> Result<Self> {
        let binary = binary.map_or_else(|| PathBuf::from(default_binary), Path::to_path_buf);
        tracing::Span::current().record("binary", tracing::field::display(binary.display()));

        let capabilities = run_help(&binary, capability_subcommand).with_context(|| {
            format!(
                "unable to run {}; is the client installed and executable?",
                binary.display()
            )
        })?;
        let version = run_version(&binary);
        info!(version = ?version, "detected client binary");

        let mut help_cache = BTreeMap::new();
        help_cache.insert(
            capability_subcommand.unwrap_or_default().to_string(),
            capabilities.clone(),
        );
        Ok(Self {
            binary,
            version,
            capabilities,
            help_cache: Mutex::new(help_cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.binary
    }

    /// First line of `--version` output, when the binary reports one.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn capabilities(&self) -> &str {
        &self.capabilities
    }

    /// Substring lookup of a fork-transition name in the cached help text.
    pub fn is_fork_supported(&self, fork: &str) -> bool {
        !fork.is_empty() && self.capabilities.contains(fork)
    }

    /// Help text for a subcommand (or the top level), fetched once per name.
    pub fn help(&self, subcommand: Option<&str>) -> Result<String> {
        let key = subcommand.unwrap_or_default().to_string();
        let mut cache = self
            .help_cache
            .lock()
            .map_err(|_| anyhow!("help cache lock poisoned"))?;
        if let Some(text) = cache.get(&key) {
            return Ok(text.clone());
        }
        let text = run_help(&self.binary, subcommand)?;
        cache.insert(key, text.clone());
        Ok(text)
    }

    pub fn command(&self) -> Command {
        Command::new(&self.binary)
    }
}

fn run_help(binary: &Path, subcommand: Option<&str>) -> Result<String> {
    let mut cmd = Command::new(binary);
    if let Some(subcommand) = subcommand {
        cmd.arg(subcommand);
    }
    cmd.arg("--help");
    let output = run_command(cmd, None, Some(PROBE_TIMEOUT))?;
    if !output.status.success() {
        debug!(exit_code = ?output.status.code(), "help probe exited non-zero");
    }
    // Some CLIs print usage on stderr.
    let stdout = output.stdout_lossy();
    if stdout.trim().is_empty() {
        Ok(output.stderr_lossy())
    } else {
        Ok(stdout)
    }
}

fn run_version(binary: &Path) -> Option<String> {
    let mut cmd = Command::new(binary);
    cmd.arg("--version");
    match run_command(cmd, None, Some(PROBE_TIMEOUT)) {
        Ok(output) if output.status.success() => output
            .stdout_lossy()
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string),
        Ok(output) => {
            debug!(exit_code = ?output.status.code(), "version probe exited non-zero");
            None
        }
        Err(err) => {
            warn!(err = %err, "version probe failed");
            None
        }
    }
}
