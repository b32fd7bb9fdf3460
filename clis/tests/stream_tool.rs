//! End-to-end tests for the one-shot `evm t8n` strategy.
//!
//! A shell script stands in for geth's `evm`: it answers the capability
//! probes and prints (or writes) a canned transition output.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use ethereum_clis::clients::Client;
use ethereum_clis::core::exceptions::TransactionException;
use ethereum_clis::io::config::HarnessConfig;
use ethereum_clis::io::stream::InvocationMode;
use ethereum_clis::io::transition_tool::TransitionTool;
use ethereum_clis::test_support::{
    invocation_count, sample_output_json, sample_request, write_fake_binary,
};
use serde_json::{Value, json};

const NONCE_ERROR: &str = "nonce too low: address 0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b, tx: 0 state: 1";

fn fake_geth(dir: &Path, t8n_body: &str) -> PathBuf {
    let log = dir.join("t8n.log");
    let body = format!(
        r#"
case "$1" in
  --version) echo "evm version 1.15.0-stable" ; exit 0 ;;
esac
if [ "$2" = "--help" ]; then
  echo "--state.fork value  Name of ruleset to use (Cancun, Prague, CancunToPragueAtTime15k)"
  exit 0
fi
echo "$@" >> "{log}"
{t8n_body}
"#,
        log = log.display()
    );
    write_fake_binary(dir, "evm", &body).expect("fake evm")
}

fn stdout_body() -> String {
    let output = sample_output_json(NONCE_ERROR).to_string();
    format!("cat > /dev/null\ncat <<'JSON'\n{output}\nJSON")
}

#[test]
fn stream_mode_classifies_rejections_and_dumps_artifacts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let binary = fake_geth(temp.path(), &stdout_body());
    let debug = temp.path().join("debug");

    let mut tool = Client::Geth
        .transition_tool(Some(&binary), &HarnessConfig::default())
        .expect("geth tool");
    assert_eq!(tool.client(), "geth");
    assert_eq!(tool.version(), Some("evm version 1.15.0-stable"));
    assert!(tool.is_fork_supported("CancunToPragueAtTime15k"));
    assert!(!tool.is_fork_supported("Osaka"));

    let output = tool
        .evaluate(&sample_request("Cancun"), Some(&debug))
        .expect("evaluate");
    assert_eq!(output.result.state_root, "0x1f");
    assert_eq!(output.body, "0xf862");
    assert!(!output.is_success());
    let rejected = &output.result.rejected[0];
    assert_eq!(rejected.index, 1);
    assert_eq!(rejected.error, NONCE_ERROR);
    assert_eq!(
        rejected.exception(),
        Some(TransactionException::NonceMismatchTooLow.into())
    );

    for name in [
        "args.json",
        "stdin.json",
        "t8n.sh",
        "returncode.txt",
        "stdout.txt",
        "stderr.txt",
        "state.json",
        "input/alloc.json",
        "input/env.json",
        "input/txs.json",
        "output/alloc.json",
        "output/result.json",
        "output/txs.rlp",
    ] {
        assert!(debug.join(name).is_file(), "missing {name}");
    }
    let stdin: Value =
        serde_json::from_str(&fs::read_to_string(debug.join("stdin.json")).expect("read"))
            .expect("parse");
    assert_eq!(stdin["txs"], json!([]));
    assert!(stdin["alloc"].is_object());
    assert_eq!(
        fs::read_to_string(debug.join("output/txs.rlp")).expect("read"),
        "0xf862"
    );

    tool.shutdown().expect("shutdown");
}

#[test]
fn every_evaluation_spawns_a_fresh_process() {
    let temp = tempfile::tempdir().expect("tempdir");
    let binary = fake_geth(temp.path(), &stdout_body());
    let mut tool = Client::Geth
        .transition_tool(Some(&binary), &HarnessConfig::default())
        .expect("geth tool");

    tool.evaluate(&sample_request("Cancun"), None).expect("first");
    tool.evaluate(&sample_request("Prague"), None).expect("second");

    let log = temp.path().join("t8n.log");
    assert_eq!(invocation_count(&log), 2);
    let calls = fs::read_to_string(&log).expect("log");
    assert!(calls.contains("--state.fork=Cancun"));
    assert!(calls.contains("--state.fork=Prague"));
    assert!(calls.contains("--input.alloc=stdin"));
}

#[test]
fn non_zero_exit_reports_stderr() {
    let temp = tempfile::tempdir().expect("tempdir");
    let binary = fake_geth(
        temp.path(),
        "echo 'ERROR: unsupported fork Frontier2' >&2\nexit 3",
    );
    let mut tool = Client::Geth
        .transition_tool(Some(&binary), &HarnessConfig::default())
        .expect("geth tool");

    let err = tool
        .evaluate(&sample_request("Frontier2"), None)
        .expect_err("t8n should fail");
    let message = format!("{err:#}");
    assert!(message.contains("unexpected exit code Some(3)"), "{message}");
    assert!(message.contains("unsupported fork Frontier2"), "{message}");
}

#[test]
fn malformed_stdout_is_an_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let binary = fake_geth(temp.path(), "cat > /dev/null\necho 'not json'");
    let mut tool = Client::Geth
        .transition_tool(Some(&binary), &HarnessConfig::default())
        .expect("geth tool");

    let err = tool
        .evaluate(&sample_request("Cancun"), None)
        .expect_err("parse should fail");
    assert!(format!("{err:#}").contains("not json"));
}

#[test]
fn files_mode_reads_outputs_from_basedir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = sample_output_json("intrinsic gas too low: have 0, want 21000");
    let body = format!(
        r#"
for arg in "$@"; do
  case "$arg" in
    --output.basedir=*) OUT="${{arg#--output.basedir=}}" ;;
    --input.alloc=*) ALLOC="${{arg#--input.alloc=}}" ;;
  esac
done
test -f "$ALLOC" || exit 4
printf '%s' '{result}' > "$OUT/result.json"
printf '%s' '{alloc}' > "$OUT/alloc.json"
printf '%s' '"0xf862"' > "$OUT/txs.rlp"
"#,
        result = output["result"],
        alloc = output["alloc"],
    );
    let binary = fake_geth(temp.path(), &body);
    let mut config = HarnessConfig::default();
    config.stream.mode = InvocationMode::Files;
    let mut tool = Client::Geth
        .transition_tool(Some(&binary), &config)
        .expect("geth tool");

    let parsed = tool
        .evaluate(&sample_request("Cancun"), None)
        .expect("evaluate");
    assert_eq!(parsed.body, "0xf862");
    assert_eq!(
        parsed.result.rejected[0].exception(),
        Some(TransactionException::IntrinsicGasTooLow.into())
    );
}

#[test]
fn traces_are_collected_into_debug_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = sample_output_json(NONCE_ERROR).to_string();
    let body = format!(
        r#"
for arg in "$@"; do
  case "$arg" in
    --output.basedir=*) OUT="${{arg#--output.basedir=}}" ;;
  esac
done
echo '{{"op":0}}' > "$OUT/trace-0-0xaa.jsonl"
cat > /dev/null
cat <<'JSON'
{output}
JSON
"#
    );
    let binary = fake_geth(temp.path(), &body);
    let debug = temp.path().join("debug");
    let mut config = HarnessConfig::default();
    config.trace = true;
    let mut tool = Client::Geth
        .transition_tool(Some(&binary), &config)
        .expect("geth tool");

    tool.evaluate(&sample_request("Cancun"), Some(&debug))
        .expect("evaluate");
    assert!(debug.join("traces/trace-0-0xaa.jsonl").is_file());
    let calls = fs::read_to_string(temp.path().join("t8n.log")).expect("log");
    assert!(calls.contains("--trace"));
}
