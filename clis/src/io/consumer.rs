//! Fixture consumption through a client's own batch validation subcommands.
//!
//! `statetest` always runs every case in a file, so its result list is cached
//! per (file, debug dir) for the consumer's lifetime and single-case lookups
//! select from it. `blocktest` can select one case with `--run` and is never
//! cached.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::fixtures::{
    CaseResult, ConsumeError, FixtureFormat, check_all_passed, check_one_passed,
};
use crate::io::debug_dump::DebugDump;
use crate::io::process::{CommandOutput, render_command, run_command};
use crate::io::tool::EvmBinary;

/// Replays fixture files against a client binary.
pub trait FixtureConsumer {
    /// Run `path` and fail with every failing case, or only `name` when given.
    fn consume_fixture(
        &self,
        format: FixtureFormat,
        path: &Path,
        name: Option<&str>,
        debug_dir: Option<&Path>,
    ) -> Result<()>;
}

type CacheKey = (PathBuf, Option<PathBuf>);

/// Canonical form of `path`, or the path as given when it cannot be resolved.
fn file_identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Consumer driving `statetest` / `blocktest` subcommands.
#[derive(Debug)]
pub struct BatchFixtureConsumer {
    binary: EvmBinary,
    formats: Vec<FixtureFormat>,
    cache: Mutex<HashMap<CacheKey, Arc<Vec<CaseResult>>>>,
}

impl BatchFixtureConsumer {
    pub fn new(binary: EvmBinary) -> Self {
        Self {
            binary,
            formats: vec![FixtureFormat::StateTest, FixtureFormat::BlockchainTest],
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn binary(&self) -> &EvmBinary {
        &self.binary
    }

    pub fn supports(&self, format: FixtureFormat) -> bool {
        self.formats.contains(&format)
    }

    /// All case results of a state-test file, computed once per key.
    ///
    /// The cache lock is held across the run so concurrent callers on the same
    /// consumer never invoke the binary twice for one key.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn consume_state_file(
        &self,
        path: &Path,
        debug_dir: Option<&Path>,
    ) -> Result<Arc<Vec<CaseResult>>> {
        if let Some(dir) = debug_dir {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let key = (file_identity(path), debug_dir.map(file_identity));
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("state test cache lock poisoned"))?;
        if let Some(results) = cache.get(&key) {
            debug!("state test results served from cache");
            return Ok(Arc::clone(results));
        }
        let results = Arc::new(self.run_batch("statetest", path, None, debug_dir)?);
        cache.insert(key, Arc::clone(&results));
        Ok(results)
    }

    pub fn consume_state_test(
        &self,
        path: &Path,
        name: Option<&str>,
        debug_dir: Option<&Path>,
    ) -> Result<()> {
        let results = self.consume_state_file(path, debug_dir)?;
        match name {
            Some(name) => check_one_passed(FixtureFormat::StateTest, &results, name)?,
            None => check_all_passed(FixtureFormat::StateTest, &results)?,
        }
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path.display(), name = ?name))]
    pub fn consume_blockchain_test(
        &self,
        path: &Path,
        name: Option<&str>,
        debug_dir: Option<&Path>,
    ) -> Result<()> {
        let selector = name.map(regex::escape);
        let results = self.run_batch("blocktest", path, selector.as_deref(), debug_dir)?;
        check_all_passed(FixtureFormat::BlockchainTest, &results)?;
        Ok(())
    }

    fn command(
        &self,
        subcommand: &str,
        path: &Path,
        run: Option<&str>,
        debug: bool,
    ) -> Command {
        let mut cmd = self.binary.command();
        if debug {
            cmd.args(["--verbosity", "100"]);
        }
        cmd.arg(subcommand);
        if debug {
            cmd.arg("--trace");
        }
        if let Some(run) = run {
            cmd.args(["--run", run]);
        }
        cmd.arg(path);
        cmd
    }

    fn run_batch(
        &self,
        subcommand: &str,
        path: &Path,
        run: Option<&str>,
        debug_dir: Option<&Path>,
    ) -> Result<Vec<CaseResult>> {
        let cmd = self.command(subcommand, path, run, debug_dir.is_some());
        let args: Vec<String> = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let output = run_command(cmd, None, None)?;

        if let Some(dump) = DebugDump::maybe(debug_dir) {
            self.dump_invocation(&dump, subcommand, path, run, &args, &output)?;
        }
        output.ensure_success()?;

        let parsed: Value = serde_json::from_slice(&output.stdout).with_context(|| {
            format!(
                "parse evm {subcommand} output:\n{}",
                output.stdout_lossy()
            )
        })?;
        if !parsed.is_array() {
            return Err(anyhow!("Unexpected result from evm {subcommand}: {parsed}"));
        }
        let results: Vec<CaseResult> = serde_json::from_value(parsed)
            .with_context(|| format!("decode evm {subcommand} case results"))?;
        info!(
            cases = results.len(),
            failed = results.iter().filter(|result| !result.pass).count(),
            "{subcommand} finished"
        );
        Ok(results)
    }

    /// `consume_direct_*` artifacts plus a copy of the fixture the script replays.
    fn dump_invocation(
        &self,
        dump: &DebugDump,
        subcommand: &str,
        path: &Path,
        run: Option<&str>,
        args: &[String],
        output: &CommandOutput,
    ) -> Result<()> {
        let fixture_copy = dump.copy_file(path, "fixtures.json")?;
        let replay = render_command(&self.command(subcommand, &fixture_copy, run, true));
        let mut full_args = vec![self.binary.path().display().to_string()];
        full_args.extend(args.iter().cloned());
        dump.write_json("consume_direct_args.json", &full_args)?;
        dump.write_text(
            "consume_direct_returncode.txt",
            &format!("{:?}", output.status.code()),
        )?;
        dump.write_text("consume_direct_stdout.txt", &output.stdout_lossy())?;
        dump.write_text("consume_direct_stderr.txt", &output.stderr_lossy())?;
        dump.write_script("consume_direct.sh", &format!("#!/bin/bash\n{replay}\n"))?;
        Ok(())
    }
}

impl FixtureConsumer for BatchFixtureConsumer {
    fn consume_fixture(
        &self,
        format: FixtureFormat,
        path: &Path,
        name: Option<&str>,
        debug_dir: Option<&Path>,
    ) -> Result<()> {
        if !self.supports(format) {
            return Err(ConsumeError::UnsupportedFormat {
                format,
                binary: self.binary.path().display().to_string(),
            }
            .into());
        }
        match format {
            FixtureFormat::StateTest => self.consume_state_test(path, name, debug_dir),
            FixtureFormat::BlockchainTest => self.consume_blockchain_test(path, name, debug_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn consumer(dir: &Path) -> BatchFixtureConsumer {
        let script = crate::test_support::write_fake_binary(dir, "evm", "echo usage")
            .expect("script");
        BatchFixtureConsumer::new(EvmBinary::probe(Some(&script), "evm", None).expect("probe"))
    }

    #[cfg(unix)]
    #[test]
    fn debug_command_adds_verbosity_and_trace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let consumer = consumer(temp.path());
        let cmd = consumer.command("blocktest", Path::new("/f.json"), Some("a\\.b"), true);
        let args: Vec<String> = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["--verbosity", "100", "blocktest", "--trace", "--run", "a\\.b", "/f.json"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn plain_command_is_subcommand_and_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let consumer = consumer(temp.path());
        let cmd = consumer.command("statetest", Path::new("/f.json"), None, false);
        let args: Vec<String> = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["statetest", "/f.json"]);
    }
}
