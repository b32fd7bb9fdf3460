//! Test-only helpers: fake client binaries, a scripted HTTP peer, sample
//! requests and table checks.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::json;
use tokio::sync::Notify;

use crate::core::mapper::ExceptionMapper;
use crate::core::types::{StateArgs, TransitionInput, TransitionRequest};

/// Write an executable `/bin/sh` script standing in for a client binary.
///
/// The file is fully written and closed before its mode is changed, so it can
/// be executed immediately.
#[cfg(unix)]
pub fn write_fake_binary(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))
        .with_context(|| format!("write fake binary {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod fake binary {}", path.display()))?;
    Ok(path)
}

/// Count how many lines a fake binary appended to its invocation log.
pub fn invocation_count(log: &Path) -> usize {
    fs::read_to_string(log)
        .map(|contents| contents.lines().count())
        .unwrap_or(0)
}

/// A minimal, deterministic transition request.
pub fn sample_request(fork: &str) -> TransitionRequest {
    TransitionRequest {
        state: StateArgs {
            fork: fork.to_string(),
            chain_id: 1,
            reward: -1,
        },
        input: TransitionInput {
            alloc: json!({
                "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": {"balance": "0x3635c9adc5dea00000", "nonce": "0x0"}
            }),
            env: json!({
                "currentCoinbase": "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba",
                "currentGasLimit": "0x1c9c380",
                "currentNumber": "0x1",
                "currentTimestamp": "0x3e8"
            }),
            txs: json!([]),
        },
    }
}

/// Raw tool output with one accepted and one rejected transaction.
pub fn sample_output_json(rejection: &str) -> serde_json::Value {
    json!({
        "alloc": {"0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": {"balance": "0x1"}},
        "result": {
            "stateRoot": "0x1f",
            "txRoot": "0x2f",
            "receiptsRoot": "0x3f",
            "logsHash": "0x4f",
            "receipts": [{"transactionHash": "0xaa", "gasUsed": "0x5208", "status": "0x1"}],
            "rejected": [{"index": 1, "error": rejection}],
            "gasUsed": "0x5208"
        },
        "body": "0xf862"
    })
}

/// Serve one canned HTTP response per `(status, body)` on a local port.
///
/// Returns the port and a handle yielding the request bodies received, in
/// order. The server stops once every scripted response has been sent.
pub fn serve_http(responses: Vec<(u16, String)>) -> Result<(u16, JoinHandle<Result<Vec<String>>>)> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build test runtime")?;
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .context("bind test listener")?;
    let port = listener.local_addr().context("listener addr")?.port();

    let state = PeerState {
        script: Arc::new(Mutex::new(Script {
            responses: responses.into(),
            bodies: Vec::new(),
        })),
        done: Arc::new(Notify::new()),
    };
    let app = Router::new()
        .route("/", post(respond))
        .with_state(state.clone());

    let handle = thread::spawn(move || -> Result<Vec<String>> {
        let done = Arc::clone(&state.done);
        let finished = state
            .script
            .lock()
            .map_err(|_| anyhow!("scripted peer lock poisoned"))?
            .responses
            .is_empty();
        if finished {
            done.notify_one();
        }
        runtime
            .block_on(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { done.notified().await })
                    .await
            })
            .context("serve scripted responses")?;
        let script = state
            .script
            .lock()
            .map_err(|_| anyhow!("scripted peer lock poisoned"))?;
        Ok(script.bodies.clone())
    });
    Ok((port, handle))
}

struct Script {
    responses: VecDeque<(u16, String)>,
    bodies: Vec<String>,
}

#[derive(Clone)]
struct PeerState {
    script: Arc<Mutex<Script>>,
    done: Arc<Notify>,
}

async fn respond(State(state): State<PeerState>, body: String) -> (StatusCode, String) {
    let Ok(mut script) = state.script.lock() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "scripted peer lock poisoned".to_string());
    };
    script.bodies.push(body);
    let reply = script.responses.pop_front();
    if script.responses.is_empty() {
        state.done.notify_one();
    }
    match reply {
        Some((status, body)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        ),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no scripted response left".to_string()),
    }
}

/// Assert that every rule not reported by `shadowed_rules` classifies its
/// own sample to its own kind. Returns the number of rules checked.
pub fn assert_rules_classify_samples(mapper: &ExceptionMapper) -> usize {
    let shadowed = mapper.shadowed_rules();
    let mut checked = 0;
    for rule in mapper.rules() {
        let pattern = rule.rule.pattern();
        if shadowed
            .iter()
            .any(|entry| entry.kind == rule.kind && entry.pattern == pattern)
        {
            continue;
        }
        let sample = rule.rule.sample();
        assert_eq!(
            mapper.classify(sample),
            Some(rule.kind),
            "{} rule {pattern:?} with sample {sample:?}",
            mapper.client()
        );
        checked += 1;
    }
    checked
}
