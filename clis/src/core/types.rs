//! Wire types exchanged with transition tools.
//!
//! The payload schemas (allocations, environments, transactions, receipts) are
//! owned by callers and clients, so they are carried as opaque JSON values.
//! Only the fields the harness itself reads are typed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::exceptions::ExceptionKind;
use crate::core::mapper::ExceptionMapper;

/// Fork and chain parameters of a transition (`state` in the wire request).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateArgs {
    pub fork: String,
    #[serde(rename = "chainid")]
    pub chain_id: u64,
    /// Block reward in wei; `-1` disables reward processing.
    pub reward: i64,
}

/// Pre-state inputs of a transition (`input` in the wire request).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionInput {
    pub alloc: Value,
    pub env: Value,
    pub txs: Value,
}

/// Full request for one state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub state: StateArgs,
    pub input: TransitionInput,
}

impl TransitionRequest {
    pub fn fork(&self) -> &str {
        &self.state.fork
    }
}

/// A transaction the tool refused to include.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedTransaction {
    pub index: u64,
    /// Raw client message, preserved verbatim.
    pub error: String,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    exception: Option<ExceptionKind>,
}

impl RejectedTransaction {
    pub fn new(index: u64, error: impl Into<String>) -> Self {
        Self {
            index,
            error: error.into(),
            exception: None,
        }
    }

    /// Canonical kind assigned by the client's classifier, if any rule matched.
    pub fn exception(&self) -> Option<ExceptionKind> {
        self.exception
    }
}

/// Per-transaction receipt. Only the transaction hash is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Summary section of a transition output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
    pub state_root: String,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedTransaction>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Parsed tool output: post-state, summary and encoded body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutput {
    pub alloc: Value,
    pub result: TransitionResult,
    /// RLP-encoded transaction list of the produced block, hex string.
    pub body: String,
}

impl TransitionOutput {
    /// Parse raw tool JSON and classify every rejection with `mapper`.
    pub fn from_json(payload: &[u8], mapper: &ExceptionMapper) -> serde_json::Result<Self> {
        let mut output: Self = serde_json::from_slice(payload)?;
        output.classify(mapper);
        Ok(output)
    }

    fn classify(&mut self, mapper: &ExceptionMapper) {
        for rejected in &mut self.result.rejected {
            rejected.exception = mapper.classify(&rejected.error);
        }
    }

    /// True when every transaction was accepted.
    pub fn is_success(&self) -> bool {
        self.result.rejected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exceptions::TransactionException;
    use serde_json::json;

    fn mapper() -> ExceptionMapper {
        ExceptionMapper::builder("test")
            .substring(TransactionException::NonceMismatchTooLow, "nonce too low")
            .build()
            .expect("mapper")
    }

    #[test]
    fn request_serializes_wire_field_names() {
        let request = TransitionRequest {
            state: StateArgs {
                fork: "Cancun".to_string(),
                chain_id: 1,
                reward: -1,
            },
            input: TransitionInput {
                alloc: json!({}),
                env: json!({"currentNumber": "0x1"}),
                txs: json!([]),
            },
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["state"]["chainid"], json!(1));
        assert_eq!(value["state"]["reward"], json!(-1));
        assert_eq!(value["input"]["env"]["currentNumber"], json!("0x1"));
    }

    #[test]
    fn rejections_are_classified_on_parse() {
        let payload = json!({
            "alloc": {},
            "result": {
                "stateRoot": "0x01",
                "receipts": [],
                "rejected": [
                    {"index": 0, "error": "nonce too low: address 0xab, tx: 1 state: 2"},
                    {"index": 1, "error": "something unheard of"}
                ],
                "gasUsed": "0x0"
            },
            "body": "0xc0"
        });
        let output =
            TransitionOutput::from_json(payload.to_string().as_bytes(), &mapper()).expect("parse");
        assert!(!output.is_success());
        assert_eq!(
            output.result.rejected[0].exception(),
            Some(TransactionException::NonceMismatchTooLow.into())
        );
        assert_eq!(output.result.rejected[1].exception(), None);
        assert_eq!(output.result.rejected[1].error, "something unheard of");
        assert_eq!(output.result.fields["gasUsed"], json!("0x0"));
    }

    #[test]
    fn incoming_exception_field_is_ignored() {
        let payload = json!({
            "alloc": {},
            "result": {
                "stateRoot": "0x01",
                "rejected": [{"index": 0, "error": "boom", "exception": {"family": "Block", "kind": "INVALID_REQUESTS"}}]
            },
            "body": "0xc0"
        });
        let output =
            TransitionOutput::from_json(payload.to_string().as_bytes(), &mapper()).expect("parse");
        assert_eq!(output.result.rejected[0].exception(), None);
    }

    #[test]
    fn receipts_keep_unknown_fields() {
        let payload = json!({
            "alloc": {},
            "result": {
                "stateRoot": "0x01",
                "receipts": [{"transactionHash": "0xaa", "gasUsed": "0x5208", "status": "0x1"}]
            },
            "body": "0xc0"
        });
        let output =
            TransitionOutput::from_json(payload.to_string().as_bytes(), &mapper()).expect("parse");
        assert!(output.is_success());
        let receipt = &output.result.receipts[0];
        assert_eq!(receipt.transaction_hash, "0xaa");
        assert_eq!(receipt.fields["status"], json!("0x1"));
    }
}
