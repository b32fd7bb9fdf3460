//! Debug artifact directories mirroring every tool invocation.
//!
//! When a caller passes a debug directory, each strategy writes the request it
//! sent, the raw response it got, the parsed output and an executable script
//! that replays the exact invocation. Files are plain JSON/text so they can be
//! diffed between clients.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::core::types::{TransitionOutput, TransitionRequest};

/// Writer rooted at one invocation's debug directory.
#[derive(Debug, Clone)]
pub struct DebugDump {
    dir: PathBuf,
}

impl DebugDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Build a writer only when a debug directory was requested.
    pub fn maybe(dir: Option<&Path>) -> Option<Self> {
        dir.map(Self::new)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_text(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create debug dir {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        debug!(path = %path.display(), "wrote debug artifact");
        Ok(path)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let mut buf = serde_json::to_string_pretty(value)
            .with_context(|| format!("serialize debug artifact {name}"))?;
        buf.push('\n');
        self.write_text(name, &buf)
    }

    /// Write a shell script and mark it executable.
    pub fn write_script(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.write_text(name, contents)?;
        set_executable(&path)?;
        Ok(path)
    }

    pub fn copy_file(&self, source: &Path, name: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create debug dir {}", parent.display()))?;
        }
        fs::copy(source, &path)
            .with_context(|| format!("copy {} to {}", source.display(), path.display()))?;
        Ok(path)
    }

    /// `state.json` plus the three `input/*.json` files.
    pub fn write_request(&self, request: &TransitionRequest) -> Result<()> {
        self.write_json("state.json", &request.state)?;
        self.write_json("input/alloc.json", &request.input.alloc)?;
        self.write_json("input/env.json", &request.input.env)?;
        self.write_json("input/txs.json", &request.input.txs)?;
        Ok(())
    }

    /// `output/alloc.json`, `output/result.json` and `output/txs.rlp`.
    pub fn write_output(&self, output: &TransitionOutput) -> Result<()> {
        self.write_json("output/alloc.json", &output.alloc)?;
        self.write_json("output/result.json", &output.result)?;
        self.write_text("output/txs.rlp", &output.body)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms).with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{StateArgs, TransitionInput};
    use serde_json::json;

    fn request() -> TransitionRequest {
        TransitionRequest {
            state: StateArgs {
                fork: "Prague".to_string(),
                chain_id: 1,
                reward: 0,
            },
            input: TransitionInput {
                alloc: json!({"0x01": {"balance": "0x10"}}),
                env: json!({"currentNumber": "0x1"}),
                txs: json!([]),
            },
        }
    }

    #[test]
    fn write_request_lays_out_inputs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dump = DebugDump::new(temp.path().join("case"));
        dump.write_request(&request()).expect("write");

        let state: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(temp.path().join("case/state.json")).expect("read"),
        )
        .expect("parse");
        assert_eq!(state, json!({"fork": "Prague", "chainid": 1, "reward": 0}));
        assert!(temp.path().join("case/input/alloc.json").is_file());
        assert!(temp.path().join("case/input/env.json").is_file());
        assert!(temp.path().join("case/input/txs.json").is_file());
    }

    #[test]
    fn write_json_appends_newline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dump = DebugDump::new(temp.path());
        let path = dump.write_json("x.json", &json!([1])).expect("write");
        let contents = fs::read_to_string(path).expect("read");
        assert_eq!(contents, "[\n  1\n]\n");
    }

    #[cfg(unix)]
    #[test]
    fn scripts_are_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let dump = DebugDump::new(temp.path());
        let path = dump.write_script("t8n.sh", "#!/bin/bash\n").expect("write");
        let mode = fs::metadata(path).expect("stat").permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn maybe_is_none_without_dir() {
        assert!(DebugDump::maybe(None).is_none());
    }
}
