//! The uniform "evaluate a state transition" capability.
//!
//! The [`TransitionTool`] trait decouples callers from how a client is driven:
//! a fresh subprocess per call ([`crate::io::stream`]) or a long-lived local
//! server ([`crate::io::server`]). Callers pick a client once and depend only on
//! this trait afterwards.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::mapper::ExceptionMapper;
use crate::core::types::{Receipt, TransitionOutput, TransitionRequest};
use crate::io::debug_dump::DebugDump;

/// A client that can evaluate state transitions.
pub trait TransitionTool {
    /// Client name used in logs and diagnostics.
    fn client(&self) -> &'static str;

    /// Identity line reported by the binary, when available.
    fn version(&self) -> Option<&str>;

    /// The client's classification table.
    fn exception_mapper(&self) -> &ExceptionMapper;

    /// Run one transition. Rejected transactions in the returned output are
    /// already classified with [`TransitionTool::exception_mapper`].
    ///
    /// With `debug_dir` set, request, response and a replay script are written
    /// there before returning.
    fn evaluate(
        &mut self,
        request: &TransitionRequest,
        debug_dir: Option<&Path>,
    ) -> Result<TransitionOutput>;

    /// Whether the cached capability text mentions `fork`.
    fn is_fork_supported(&self, fork: &str) -> bool;

    /// Release every external resource. Safe to call repeatedly.
    fn shutdown(&mut self) -> Result<()>;
}

/// Move per-transaction trace files out of `trace_dir`.
///
/// Traces are named `trace-<index>-<hash>.jsonl`. They are copied into
/// `<debug>/traces/` when a dump is active and always removed from
/// `trace_dir` so the next evaluation starts empty.
pub fn collect_traces(
    receipts: &[Receipt],
    trace_dir: &Path,
    dump: Option<&DebugDump>,
) -> Result<usize> {
    let mut collected = 0;
    for (index, receipt) in receipts.iter().enumerate() {
        let file_name = format!("trace-{index}-{}.jsonl", receipt.transaction_hash);
        let source = trace_dir.join(&file_name);
        if !source.is_file() {
            debug!(file = %file_name, "no trace for transaction");
            continue;
        }
        if let Some(dump) = dump {
            dump.copy_file(&source, &format!("traces/{file_name}"))?;
        }
        fs::remove_file(&source).with_context(|| format!("remove {}", source.display()))?;
        collected += 1;
    }
    Ok(collected)
}
