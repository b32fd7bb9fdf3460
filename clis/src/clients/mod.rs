//! Supported execution clients and how each one is driven.
//!
//! | client | transition strategy | fixture consumer |
//! |--------|---------------------|------------------|
//! | geth   | one-shot `evm t8n`  | `evm statetest` / `evm blocktest` |
//! | besu   | `evm t8n-server`    | none |
//! | ethrex | none                | none |

pub mod besu;
pub mod ethrex;
pub mod geth;

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::core::mapper::ExceptionMapper;
use crate::io::config::HarnessConfig;
use crate::io::consumer::{BatchFixtureConsumer, FixtureConsumer};
use crate::io::server::ServerTransitionTool;
use crate::io::stream::StreamTransitionTool;
use crate::io::tool::EvmBinary;
use crate::io::transition_tool::TransitionTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Client {
    Geth,
    Besu,
    Ethrex,
}

impl Client {
    pub const ALL: [Client; 3] = [Client::Geth, Client::Besu, Client::Ethrex];

    pub fn name(self) -> &'static str {
        match self {
            Self::Geth => "geth",
            Self::Besu => "besu",
            Self::Ethrex => "ethrex",
        }
    }

    /// Command looked up on `PATH` when no binary is configured.
    pub fn default_binary(self) -> &'static str {
        match self {
            Self::Geth | Self::Besu => "evm",
            Self::Ethrex => "ethrex",
        }
    }

    pub fn exception_mapper(self) -> &'static ExceptionMapper {
        match self {
            Self::Geth => &geth::MAPPER,
            Self::Besu => &besu::MAPPER,
            Self::Ethrex => &ethrex::MAPPER,
        }
    }

    /// Identify a client from the first line of `<binary> --version`.
    ///
    /// Ethrex has no identity line and is never detected.
    pub fn detect(version_line: &str) -> Option<Self> {
        let line = version_line.trim();
        if geth::DETECT.is_match(line) {
            Some(Self::Geth)
        } else if besu::DETECT.is_match(line) {
            Some(Self::Besu)
        } else {
            None
        }
    }

    /// Identify the client behind `binary` by probing its `--version` line.
    pub fn detect_binary(binary: &Path) -> Result<Self> {
        let probed = EvmBinary::probe(Some(binary), "evm", None)?;
        let version = probed.version().unwrap_or_default();
        Self::detect(version).with_context(|| {
            format!(
                "cannot identify the client behind {} from version {version:?}",
                binary.display()
            )
        })
    }

    fn binary<'a>(self, binary: Option<&'a Path>, config: &'a HarnessConfig) -> Option<&'a Path> {
        binary.or(match self {
            Self::Geth => config.binaries.geth.as_deref(),
            Self::Besu => config.binaries.besu.as_deref(),
            Self::Ethrex => config.binaries.ethrex.as_deref(),
        })
    }

    /// Probe the client's binary and build its transition strategy.
    ///
    /// `binary` overrides the configured path.
    pub fn transition_tool(
        self,
        binary: Option<&Path>,
        config: &HarnessConfig,
    ) -> Result<Box<dyn TransitionTool>> {
        let binary = self.binary(binary, config);
        match self {
            Self::Geth => {
                let binary = EvmBinary::probe(binary, self.default_binary(), Some("t8n"))?;
                Ok(Box::new(StreamTransitionTool::new(
                    self.name(),
                    binary,
                    self.exception_mapper(),
                    config.stream_options(),
                )))
            }
            Self::Besu => {
                let binary = EvmBinary::probe(binary, self.default_binary(), Some("t8n"))?;
                Ok(Box::new(ServerTransitionTool::new(
                    self.name(),
                    binary,
                    self.exception_mapper(),
                    config.server_options(),
                )?))
            }
            Self::Ethrex => bail!(
                "{} has no transition tool; only its exception table is available",
                self.name()
            ),
        }
    }

    /// Probe the client's binary and build its fixture consumer.
    pub fn fixture_consumer(
        self,
        binary: Option<&Path>,
        config: &HarnessConfig,
    ) -> Result<Box<dyn FixtureConsumer>> {
        match self {
            Self::Geth => {
                let binary =
                    EvmBinary::probe(self.binary(binary, config), self.default_binary(), None)?;
                Ok(Box::new(BatchFixtureConsumer::new(binary)))
            }
            Self::Besu | Self::Ethrex => bail!("{} has no fixture consumer", self.name()),
        }
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
