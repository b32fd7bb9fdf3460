//! Command-line front end for the client harness.
//!
//! Evaluates single transitions, replays fixture files through a client's own
//! consumer, and inspects the per-client exception tables.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use ethereum_clis::clients::Client;
use ethereum_clis::core::fixtures::{ConsumeError, FixtureFormat};
use ethereum_clis::core::types::TransitionRequest;
use ethereum_clis::exit_codes;
use ethereum_clis::io::config::load_config;
use ethereum_clis::logging;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "consume",
    version,
    about = "Drive Ethereum client transition tools through one interface"
)]
struct Cli {
    /// Harness config; defaults apply when the file is missing.
    #[arg(long, global = true, default_value = "clis.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one transition request and print the output JSON.
    T8n {
        /// Detected from `--binary --version` when omitted.
        #[arg(long, value_enum)]
        client: Option<ClientArg>,
        /// JSON file with `state` and `input`.
        #[arg(long)]
        request: PathBuf,
        /// Client binary; overrides the config.
        #[arg(long)]
        binary: Option<PathBuf>,
        /// Write request, response and a replay script here.
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Replay a fixture file through the client's consumer.
    Consume {
        /// Detected from `--binary --version` when omitted.
        #[arg(long, value_enum)]
        client: Option<ClientArg>,
        #[arg(long, value_enum)]
        format: FormatArg,
        fixture: PathBuf,
        /// Only check the case with this name.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        binary: Option<PathBuf>,
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Map a raw client error message to its canonical exception.
    Classify {
        #[arg(long, value_enum)]
        client: ClientArg,
        message: String,
    },
    /// Check whether the client's binary advertises a fork.
    Supports {
        /// Detected from `--binary --version` when omitted.
        #[arg(long, value_enum)]
        client: Option<ClientArg>,
        fork: String,
        #[arg(long)]
        binary: Option<PathBuf>,
    },
    /// List rules that can never win because an earlier rule claims their message.
    Shadows {
        #[arg(long, value_enum)]
        client: ClientArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ClientArg {
    Geth,
    Besu,
    Ethrex,
}

impl From<ClientArg> for Client {
    fn from(value: ClientArg) -> Self {
        match value {
            ClientArg::Geth => Client::Geth,
            ClientArg::Besu => Client::Besu,
            ClientArg::Ethrex => Client::Ethrex,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    State,
    Blockchain,
}

impl From<FormatArg> for FixtureFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::State => FixtureFormat::StateTest,
            FormatArg::Blockchain => FixtureFormat::BlockchainTest,
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ConsumeError>() {
        Some(
            ConsumeError::CasesFailed { .. }
            | ConsumeError::MissingCase { .. }
            | ConsumeError::DuplicateCase { .. },
        ) => exit_codes::CONSUME_FAILED,
        Some(ConsumeError::UnsupportedFormat { .. }) | None => exit_codes::INVALID,
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::T8n {
            client,
            request,
            binary,
            debug_dir,
        } => cmd_t8n(
            &cli.config,
            resolve_client(client, binary.as_deref())?,
            &request,
            binary.as_deref(),
            debug_dir.as_deref(),
        ),
        Command::Consume {
            client,
            format,
            fixture,
            name,
            binary,
            debug_dir,
        } => cmd_consume(
            &cli.config,
            resolve_client(client, binary.as_deref())?,
            format.into(),
            &fixture,
            name.as_deref(),
            binary.as_deref(),
            debug_dir.as_deref(),
        ),
        Command::Classify { client, message } => cmd_classify(client.into(), &message),
        Command::Supports {
            client,
            fork,
            binary,
        } => cmd_supports(
            &cli.config,
            resolve_client(client, binary.as_deref())?,
            &fork,
            binary.as_deref(),
        ),
        Command::Shadows { client } => cmd_shadows(client.into()),
    }
}

fn resolve_client(client: Option<ClientArg>, binary: Option<&Path>) -> Result<Client> {
    match (client, binary) {
        (Some(client), _) => Ok(client.into()),
        (None, Some(binary)) => {
            let client = Client::detect_binary(binary)?;
            info!(client = %client, "detected client from binary");
            Ok(client)
        }
        (None, None) => bail!("--client is required unless --binary is given"),
    }
}

fn cmd_t8n(
    config: &Path,
    client: Client,
    request: &Path,
    binary: Option<&Path>,
    debug_dir: Option<&Path>,
) -> Result<i32> {
    let config = load_config(config)?;
    let contents =
        fs::read_to_string(request).with_context(|| format!("read {}", request.display()))?;
    let request: TransitionRequest =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", request.display()))?;

    let mut tool = client.transition_tool(binary, &config)?;
    let evaluated = tool.evaluate(&request, debug_dir);
    if let Err(err) = tool.shutdown() {
        warn!(err = %err, "shutdown failed");
    }
    let output = evaluated?;

    for rejected in &output.result.rejected {
        match rejected.exception() {
            Some(kind) => info!(index = rejected.index, kind = %kind, "transaction rejected"),
            None => warn!(index = rejected.index, error = %rejected.error, "unclassified rejection"),
        }
    }
    let rendered = serde_json::to_string_pretty(&output).context("serialize t8n output")?;
    println!("{rendered}");
    Ok(exit_codes::OK)
}

fn cmd_consume(
    config: &Path,
    client: Client,
    format: FixtureFormat,
    fixture: &Path,
    name: Option<&str>,
    binary: Option<&Path>,
    debug_dir: Option<&Path>,
) -> Result<i32> {
    let config = load_config(config)?;
    let consumer = client.fixture_consumer(binary, &config)?;
    consumer.consume_fixture(format, fixture, name, debug_dir)?;
    println!("{} {}: all cases passed", format.label(), fixture.display());
    Ok(exit_codes::OK)
}

fn cmd_classify(client: Client, message: &str) -> Result<i32> {
    match client.exception_mapper().classify(message) {
        Some(kind) => println!("{kind}"),
        None => println!("unknown"),
    }
    Ok(exit_codes::OK)
}

fn cmd_supports(config: &Path, client: Client, fork: &str, binary: Option<&Path>) -> Result<i32> {
    let config = load_config(config)?;
    let tool = client.transition_tool(binary, &config)?;
    println!("{}", tool.is_fork_supported(fork));
    Ok(exit_codes::OK)
}

fn cmd_shadows(client: Client) -> Result<i32> {
    let shadowed = client.exception_mapper().shadowed_rules();
    if shadowed.is_empty() {
        println!("{client}: no shadowed rules");
    }
    for rule in shadowed {
        println!("{} {:?} -> {}", rule.kind, rule.pattern, rule.shadowed_by);
    }
    Ok(exit_codes::OK)
}
