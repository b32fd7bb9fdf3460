//! One-shot transition strategy: a fresh `<binary> t8n` process per call.
//!
//! Inputs either travel on stdin as one JSON object (`Stream`) or as three
//! files in a temporary directory (`Files`). The tool answers with the output
//! JSON on stdout, or with output files in the same directory. A non-zero exit
//! is an infrastructure failure; rejected transactions are data.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tempfile::TempDir;
use tracing::{debug, info, instrument};

use crate::core::mapper::ExceptionMapper;
use crate::core::types::{TransitionOutput, TransitionRequest};
use crate::io::debug_dump::DebugDump;
use crate::io::process::{run_command, shell_quote};
use crate::io::tool::EvmBinary;
use crate::io::transition_tool::{TransitionTool, collect_traces};

const SCRIPT_DIR: &str = "${DIR}";

/// How inputs and outputs are exchanged with the one-shot tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    /// JSON over stdin/stdout.
    #[default]
    Stream,
    /// Input and output files in a temporary directory.
    Files,
}

/// Settings for a one-shot transition tool.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub subcommand: &'static str,
    pub mode: InvocationMode,
    pub trace: bool,
    /// `None` waits for the child indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            subcommand: "t8n",
            mode: InvocationMode::Stream,
            trace: false,
            timeout: None,
        }
    }
}

/// Where the tool reads inputs and writes outputs, as argument strings.
struct IoLocations {
    alloc: String,
    env: String,
    txs: String,
    basedir: Option<String>,
    result: String,
    alloc_out: String,
    body: String,
}

impl IoLocations {
    fn stream(basedir: Option<String>) -> Self {
        Self {
            alloc: "stdin".to_string(),
            env: "stdin".to_string(),
            txs: "stdin".to_string(),
            basedir,
            result: "stdout".to_string(),
            alloc_out: "stdout".to_string(),
            body: "stdout".to_string(),
        }
    }

    fn files(input_dir: &str, basedir: String) -> Self {
        Self {
            alloc: format!("{input_dir}/alloc.json"),
            env: format!("{input_dir}/env.json"),
            txs: format!("{input_dir}/txs.json"),
            basedir: Some(basedir),
            result: "result.json".to_string(),
            alloc_out: "alloc.json".to_string(),
            body: "txs.rlp".to_string(),
        }
    }
}

/// Transition tool that spawns the client once per evaluation.
#[derive(Debug)]
pub struct StreamTransitionTool {
    client: &'static str,
    binary: EvmBinary,
    mapper: &'static ExceptionMapper,
    options: StreamOptions,
}

impl StreamTransitionTool {
    pub fn new(
        client: &'static str,
        binary: EvmBinary,
        mapper: &'static ExceptionMapper,
        options: StreamOptions,
    ) -> Self {
        Self {
            client,
            binary,
            mapper,
            options,
        }
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    fn args(&self, request: &TransitionRequest, io: &IoLocations) -> Vec<String> {
        let mut args = vec![
            self.options.subcommand.to_string(),
            format!("--input.alloc={}", io.alloc),
            format!("--input.txs={}", io.txs),
            format!("--input.env={}", io.env),
            format!("--output.result={}", io.result),
            format!("--output.alloc={}", io.alloc_out),
            format!("--output.body={}", io.body),
            format!("--state.fork={}", request.state.fork),
            format!("--state.chainid={}", request.state.chain_id),
            format!("--state.reward={}", request.state.reward),
        ];
        if let Some(basedir) = &io.basedir {
            args.push(format!("--output.basedir={basedir}"));
        }
        if self.options.trace {
            args.push("--trace".to_string());
        }
        args
    }

    /// Arguments for the replay script, with paths relative to the script.
    fn script_locations(&self) -> IoLocations {
        let basedir = format!("{SCRIPT_DIR}/evm-tools-output");
        match self.options.mode {
            InvocationMode::Stream => IoLocations::stream(self.options.trace.then_some(basedir)),
            InvocationMode::Files => IoLocations::files(&format!("{SCRIPT_DIR}/input"), basedir),
        }
    }

    fn replay_script(&self, request: &TransitionRequest) -> String {
        let io = self.script_locations();
        let mut line = shell_quote(self.binary.path());
        for arg in self.args(request, &io) {
            line.push(' ');
            if arg.contains(SCRIPT_DIR) {
                line.push_str(&format!("\"{arg}\""));
            } else {
                line.push_str(&shell_quote(&arg));
            }
        }
        if self.options.mode == InvocationMode::Stream {
            line.push_str(&format!(" < \"{SCRIPT_DIR}/stdin.json\""));
        }
        let mut script = String::from("#!/bin/bash\nDIR=\"$(cd \"$(dirname \"$0\")\" && pwd)\"\n");
        if io.basedir.is_some() {
            script.push_str(&format!("mkdir -p \"{SCRIPT_DIR}/evm-tools-output\"\n"));
        }
        script.push_str(&line);
        script.push('\n');
        script
    }
}

fn stdin_payload(request: &TransitionRequest) -> Value {
    json!({
        "alloc": request.input.alloc,
        "txs": request.input.txs,
        "env": request.input.env,
    })
}

fn write_json_file(path: &Path, value: &Value) -> Result<()> {
    let buf = serde_json::to_vec(value).context("serialize input")?;
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

fn read_json_file(path: &Path) -> Result<Value> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&contents).with_context(|| format!("parse {}", path.display()))
}

/// `txs.rlp` holds a JSON string; older tools write the bare hex.
fn read_body_file(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(serde_json::from_str::<Value>(&contents)
        .unwrap_or_else(|_| Value::String(contents.trim().to_string())))
}

impl TransitionTool for StreamTransitionTool {
    fn client(&self) -> &'static str {
        self.client
    }

    fn version(&self) -> Option<&str> {
        self.binary.version()
    }

    fn exception_mapper(&self) -> &ExceptionMapper {
        self.mapper
    }

    #[instrument(skip_all, fields(client = self.client, fork = %request.state.fork, mode = ?self.options.mode))]
    fn evaluate(
        &mut self,
        request: &TransitionRequest,
        debug_dir: Option<&Path>,
    ) -> Result<TransitionOutput> {
        let dump = DebugDump::maybe(debug_dir);
        let workdir = TempDir::new().context("create t8n temp dir")?;
        let work = workdir.path();
        let output_dir = work.join("output");

        let (io, stdin) = match self.options.mode {
            InvocationMode::Stream => {
                let basedir = self
                    .options
                    .trace
                    .then(|| output_dir.display().to_string());
                let payload = serde_json::to_vec(&stdin_payload(request))
                    .context("serialize t8n stdin")?;
                (IoLocations::stream(basedir), Some(payload))
            }
            InvocationMode::Files => {
                let input_dir = work.join("input");
                fs::create_dir_all(&input_dir)
                    .with_context(|| format!("create {}", input_dir.display()))?;
                write_json_file(&input_dir.join("alloc.json"), &request.input.alloc)?;
                write_json_file(&input_dir.join("env.json"), &request.input.env)?;
                write_json_file(&input_dir.join("txs.json"), &request.input.txs)?;
                let io = IoLocations::files(
                    &input_dir.display().to_string(),
                    output_dir.display().to_string(),
                );
                (io, None)
            }
        };
        if io.basedir.is_some() {
            fs::create_dir_all(&output_dir)
                .with_context(|| format!("create {}", output_dir.display()))?;
        }

        let args = self.args(request, &io);
        let mut cmd = self.binary.command();
        cmd.args(&args);

        if let Some(dump) = &dump {
            dump.write_request(request)?;
            dump.write_json("args.json", &args)?;
            if self.options.mode == InvocationMode::Stream {
                dump.write_json("stdin.json", &stdin_payload(request))?;
            }
            dump.write_script("t8n.sh", &self.replay_script(request))?;
        }

        let output = run_command(cmd, stdin.as_deref(), self.options.timeout)
            .with_context(|| format!("run {} {}", self.client, self.options.subcommand))?;

        if let Some(dump) = &dump {
            dump.write_text("returncode.txt", &format!("{:?}", output.status.code()))?;
            dump.write_text("stdout.txt", &output.stdout_lossy())?;
            dump.write_text("stderr.txt", &output.stderr_lossy())?;
        }
        output.ensure_success()?;

        let parsed = match self.options.mode {
            InvocationMode::Stream => TransitionOutput::from_json(&output.stdout, self.mapper)
                .with_context(|| {
                    format!(
                        "parse {} t8n stdout:\n{}",
                        self.client,
                        output.stdout_lossy()
                    )
                })?,
            InvocationMode::Files => {
                let combined = json!({
                    "alloc": read_json_file(&output_dir.join("alloc.json"))?,
                    "result": read_json_file(&output_dir.join("result.json"))?,
                    "body": read_body_file(&output_dir.join("txs.rlp"))?,
                });
                let payload = serde_json::to_vec(&combined).context("serialize t8n output")?;
                TransitionOutput::from_json(&payload, self.mapper)
                    .with_context(|| format!("parse {} t8n output files", self.client))?
            }
        };

        if let Some(dump) = &dump {
            dump.write_output(&parsed)?;
        }
        if self.options.trace {
            let collected = collect_traces(&parsed.result.receipts, &output_dir, dump.as_ref())?;
            debug!(collected, "collected traces");
        }

        info!(
            rejected = parsed.result.rejected.len(),
            receipts = parsed.result.receipts.len(),
            "t8n evaluation finished"
        );
        Ok(parsed)
    }

    fn is_fork_supported(&self, fork: &str) -> bool {
        self.binary.is_fork_supported(fork)
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
