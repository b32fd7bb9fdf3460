//! Persistent-server transition strategy.
//!
//! The client is started once in server mode on an OS-assigned port and kept
//! alive across evaluations. Readiness is a two-state handshake read from the
//! child's output: a "listening on N" line or a failure line, bounded by a
//! startup timeout. Each evaluation is one blocking HTTP POST.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tempfile::TempDir;
use tracing::{debug, info, instrument, trace, warn};

use crate::core::mapper::ExceptionMapper;
use crate::core::types::{TransitionOutput, TransitionRequest};
use crate::io::debug_dump::DebugDump;
use crate::io::process::render_command;
use crate::io::tool::EvmBinary;
use crate::io::transition_tool::{TransitionTool, collect_traces};

/// Settings for a server-backed transition tool.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub subcommand: &'static str,
    /// Regex with one capture group holding the port.
    pub listening_pattern: &'static str,
    pub failure_marker: &'static str,
    pub trace: bool,
    pub request_timeout: Duration,
    pub startup_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            subcommand: "t8n-server",
            listening_pattern: r"Transition server listening on (\d+)",
            failure_marker: "Failed to start transition server",
            trace: false,
            request_timeout: Duration::from_secs(5),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

/// What one line of server output says about readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupLine {
    Ready(u16),
    Failed,
}

/// Classify one startup line; `None` means keep reading.
pub fn parse_startup_line(line: &str, listening: &Regex, failure_marker: &str) -> Option<StartupLine> {
    if line.contains(failure_marker) {
        return Some(StartupLine::Failed);
    }
    listening
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|port| port.as_str().parse().ok())
        .map(StartupLine::Ready)
}

/// Block until the server reports a port, reports failure, or `timeout` passes.
///
/// A timeout too large to form a deadline waits for output indefinitely.
pub fn wait_for_startup(
    lines: &Receiver<String>,
    listening: &Regex,
    failure_marker: &str,
    client: &str,
    timeout: Duration,
) -> Result<u16> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let next = match deadline {
            Some(deadline) => lines.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(line) => match parse_startup_line(&line, listening, failure_marker) {
                Some(StartupLine::Ready(port)) => return Ok(port),
                Some(StartupLine::Failed) => bail!("Failed starting {client} server\n{line}"),
                None => debug!(line = %line, "waiting for server startup"),
            },
            Err(RecvTimeoutError::Timeout) => bail!(
                "{client} server did not report a listening port within {timeout:?}"
            ),
            Err(RecvTimeoutError::Disconnected) => {
                bail!("Failed starting {client} server\nexited before reporting a listening port")
            }
        }
    }
}

/// Forward every line of `reader` to `tx`, draining to EOF even after the
/// receiver is gone so the child never blocks on a full pipe.
fn forward_lines<R: Read + Send + 'static>(reader: R, tx: Sender<String>, stream: &'static str) {
    thread::spawn(move || {
        let mut forwarding = true;
        for line in BufReader::new(reader).lines() {
            let Ok(line) = line else { break };
            trace!(stream, line = %line, "server output");
            if forwarding && tx.send(line).is_err() {
                forwarding = false;
            }
        }
    });
}

struct RunningServer {
    child: Child,
    url: String,
    trace_dir: Option<TempDir>,
}

enum ServerState {
    Stopped,
    Running(RunningServer),
}

/// Transition tool backed by a long-lived local server process.
pub struct ServerTransitionTool {
    client: &'static str,
    binary: EvmBinary,
    mapper: &'static ExceptionMapper,
    options: ServerOptions,
    listening: Regex,
    http: reqwest::blocking::Client,
    state: ServerState,
}

impl ServerTransitionTool {
    pub fn new(
        client: &'static str,
        binary: EvmBinary,
        mapper: &'static ExceptionMapper,
        options: ServerOptions,
    ) -> Result<Self> {
        let listening = Regex::new(options.listening_pattern)
            .with_context(|| format!("compile listening pattern {:?}", options.listening_pattern))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(options.request_timeout)
            .no_proxy()
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            binary,
            mapper,
            options,
            listening,
            http,
            state: ServerState::Stopped,
        })
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ServerState::Running(_))
    }

    /// Endpoint of the running server, if started.
    pub fn url(&self) -> Option<&str> {
        match &self.state {
            ServerState::Running(server) => Some(&server.url),
            ServerState::Stopped => None,
        }
    }

    #[instrument(skip_all, fields(client = self.client))]
    fn start(&mut self) -> Result<()> {
        let trace_dir = if self.options.trace {
            Some(TempDir::new().context("create server trace dir")?)
        } else {
            None
        };

        let mut cmd = self.binary.command();
        cmd.arg(self.options.subcommand).arg("--port=0");
        if let Some(dir) = &trace_dir {
            cmd.arg("--trace")
                .arg(format!("--output.basedir={}", dir.path().display()));
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let command_line = render_command(&cmd);
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {command_line}"))?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx, "stderr");
        }

        let port = match wait_for_startup(
            &rx,
            &self.listening,
            self.options.failure_marker,
            self.client,
            self.options.startup_timeout,
        ) {
            Ok(port) => port,
            Err(err) => {
                kill_child(&mut child);
                return Err(err.context(command_line));
            }
        };

        let url = format!("http://localhost:{port}/");
        info!(url = %url, "transition server started");
        self.state = ServerState::Running(RunningServer {
            child,
            url,
            trace_dir,
        });
        Ok(())
    }
}

fn kill_child(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(err = %err, "server already exited");
    }
    if let Err(err) = child.wait() {
        warn!(err = %err, "failed to reap server process");
    }
}

/// Replay script that POSTs the dumped request to a server on `$1` (default 3000).
fn curl_script(request: &TransitionRequest) -> Result<String> {
    let body = serde_json::to_string_pretty(request).context("serialize t8n request")?;
    let body = body.replace('\'', "'\\''");
    Ok(format!(
        "#!/bin/bash\n\
         # Use $1 as t8n-server port if provided, else default to 3000\n\
         PORT=${{1:-3000}}\n\
         curl http://localhost:${{PORT}}/ -X POST -H \"Content-Type: application/json\" \\\n\
         --data '{body}'\n"
    ))
}

impl TransitionTool for ServerTransitionTool {
    fn client(&self) -> &'static str {
        self.client
    }

    fn version(&self) -> Option<&str> {
        self.binary.version()
    }

    fn exception_mapper(&self) -> &ExceptionMapper {
        self.mapper
    }

    #[instrument(skip_all, fields(client = self.client, fork = %request.state.fork))]
    fn evaluate(
        &mut self,
        request: &TransitionRequest,
        debug_dir: Option<&Path>,
    ) -> Result<TransitionOutput> {
        if !self.is_running() {
            self.start()?;
        }
        let ServerState::Running(server) = &self.state else {
            return Err(anyhow!("{} server is not running", self.client));
        };

        let dump = DebugDump::maybe(debug_dir);
        if let Some(dump) = &dump {
            dump.write_request(request)?;
            dump.write_script("t8n.sh", &curl_script(request)?)?;
        }

        let started = Instant::now();
        let response = self
            .http
            .post(server.url.as_str())
            .json(request)
            .send()
            .with_context(|| format!("POST {}", server.url))?;
        let status = response.status();
        let text = response
            .text()
            .with_context(|| format!("read response from {}", server.url))?;
        let elapsed = started.elapsed();
        debug!(status = %status, elapsed = ?elapsed, "server responded");

        if let Some(dump) = &dump {
            dump.write_text("response.txt", &text)?;
            dump.write_text("status_code.txt", status.as_str())?;
            dump.write_text("time_elapsed_seconds.txt", &elapsed.as_secs_f64().to_string())?;
        }

        if !status.is_success() {
            bail!(
                "{} returned status code {}, response: {text}",
                self.options.subcommand,
                status.as_u16()
            );
        }

        let output = TransitionOutput::from_json(text.as_bytes(), self.mapper)
            .with_context(|| format!("parse {} server response:\n{text}", self.client))?;

        if let Some(dump) = &dump {
            dump.write_output(&output)?;
        }
        if let Some(trace_dir) = &server.trace_dir {
            let collected = collect_traces(&output.result.receipts, trace_dir.path(), dump.as_ref())?;
            debug!(collected, "collected traces");
        }
        Ok(output)
    }

    fn is_fork_supported(&self, fork: &str) -> bool {
        self.binary.is_fork_supported(fork)
    }

    fn shutdown(&mut self) -> Result<()> {
        let ServerState::Running(mut server) = std::mem::replace(&mut self.state, ServerState::Stopped)
        else {
            return Ok(());
        };
        kill_child(&mut server.child);
        if let Some(trace_dir) = server.trace_dir.take() {
            let path = trace_dir.path().to_path_buf();
            trace_dir
                .close()
                .with_context(|| format!("remove trace dir {}", path.display()))?;
        }
        info!(client = self.client, "transition server stopped");
        Ok(())
    }
}

impl Drop for ServerTransitionTool {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(err = %err, "failed to shut down transition server");
        }
    }
}
