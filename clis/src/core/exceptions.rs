//! Canonical exception taxonomy shared by every client table.
//!
//! Kinds are split into two families. `Transaction` kinds describe why a single
//! transaction was rejected; `Block` kinds describe why a whole block failed
//! validation. The rendered form (`TransactionException.NONCE_IS_MAX`) is
//! stable and used in logs, CLI output and debug artifacts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reasons a transaction is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionException {
    GasAllowanceExceeded,
    GasLimitExceedsMaximum,
    GaslimitPriceProductOverflow,
    InitcodeSizeExceeded,
    InsufficientAccountFunds,
    InsufficientMaxFeePerBlobGas,
    InsufficientMaxFeePerGas,
    IntrinsicGasBelowFloorGasCost,
    IntrinsicGasTooLow,
    NonceIsMax,
    NonceMismatchTooLow,
    PriorityGreaterThanMaxFeePerGas,
    SenderNotEoa,
    #[serde(rename = "TYPE_3_TX_BLOB_COUNT_EXCEEDED")]
    Type3TxBlobCountExceeded,
    #[serde(rename = "TYPE_3_TX_CONTRACT_CREATION")]
    Type3TxContractCreation,
    #[serde(rename = "TYPE_3_TX_INVALID_BLOB_VERSIONED_HASH")]
    Type3TxInvalidBlobVersionedHash,
    #[serde(rename = "TYPE_3_TX_MAX_BLOB_GAS_ALLOWANCE_EXCEEDED")]
    Type3TxMaxBlobGasAllowanceExceeded,
    #[serde(rename = "TYPE_3_TX_PRE_FORK")]
    Type3TxPreFork,
    #[serde(rename = "TYPE_3_TX_WITH_FULL_BLOBS")]
    Type3TxWithFullBlobs,
    #[serde(rename = "TYPE_3_TX_ZERO_BLOBS")]
    Type3TxZeroBlobs,
    #[serde(rename = "TYPE_4_EMPTY_AUTHORIZATION_LIST")]
    Type4EmptyAuthorizationList,
    #[serde(rename = "TYPE_4_TX_CONTRACT_CREATION")]
    Type4TxContractCreation,
    #[serde(rename = "TYPE_4_TX_PRE_FORK")]
    Type4TxPreFork,
}

impl TransactionException {
    pub fn name(self) -> &'static str {
        match self {
            Self::GasAllowanceExceeded => "GAS_ALLOWANCE_EXCEEDED",
            Self::GasLimitExceedsMaximum => "GAS_LIMIT_EXCEEDS_MAXIMUM",
            Self::GaslimitPriceProductOverflow => "GASLIMIT_PRICE_PRODUCT_OVERFLOW",
            Self::InitcodeSizeExceeded => "INITCODE_SIZE_EXCEEDED",
            Self::InsufficientAccountFunds => "INSUFFICIENT_ACCOUNT_FUNDS",
            Self::InsufficientMaxFeePerBlobGas => "INSUFFICIENT_MAX_FEE_PER_BLOB_GAS",
            Self::InsufficientMaxFeePerGas => "INSUFFICIENT_MAX_FEE_PER_GAS",
            Self::IntrinsicGasBelowFloorGasCost => "INTRINSIC_GAS_BELOW_FLOOR_GAS_COST",
            Self::IntrinsicGasTooLow => "INTRINSIC_GAS_TOO_LOW",
            Self::NonceIsMax => "NONCE_IS_MAX",
            Self::NonceMismatchTooLow => "NONCE_MISMATCH_TOO_LOW",
            Self::PriorityGreaterThanMaxFeePerGas => "PRIORITY_GREATER_THAN_MAX_FEE_PER_GAS",
            Self::SenderNotEoa => "SENDER_NOT_EOA",
            Self::Type3TxBlobCountExceeded => "TYPE_3_TX_BLOB_COUNT_EXCEEDED",
            Self::Type3TxContractCreation => "TYPE_3_TX_CONTRACT_CREATION",
            Self::Type3TxInvalidBlobVersionedHash => "TYPE_3_TX_INVALID_BLOB_VERSIONED_HASH",
            Self::Type3TxMaxBlobGasAllowanceExceeded => "TYPE_3_TX_MAX_BLOB_GAS_ALLOWANCE_EXCEEDED",
            Self::Type3TxPreFork => "TYPE_3_TX_PRE_FORK",
            Self::Type3TxWithFullBlobs => "TYPE_3_TX_WITH_FULL_BLOBS",
            Self::Type3TxZeroBlobs => "TYPE_3_TX_ZERO_BLOBS",
            Self::Type4EmptyAuthorizationList => "TYPE_4_EMPTY_AUTHORIZATION_LIST",
            Self::Type4TxContractCreation => "TYPE_4_TX_CONTRACT_CREATION",
            Self::Type4TxPreFork => "TYPE_4_TX_PRE_FORK",
        }
    }
}

/// Reasons a block fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockException {
    BlobGasUsedAboveLimit,
    IncorrectBlobGasUsed,
    IncorrectExcessBlobGas,
    InvalidBlockHash,
    InvalidDepositEventLayout,
    InvalidGasUsed,
    InvalidGasUsedAboveLimit,
    InvalidReceiptsRoot,
    InvalidRequests,
    InvalidStateRoot,
    InvalidVersionedHashes,
    RlpBlockLimitExceeded,
    RlpStructuresEncoding,
    SystemContractCallFailed,
    SystemContractEmpty,
}

impl BlockException {
    pub fn name(self) -> &'static str {
        match self {
            Self::BlobGasUsedAboveLimit => "BLOB_GAS_USED_ABOVE_LIMIT",
            Self::IncorrectBlobGasUsed => "INCORRECT_BLOB_GAS_USED",
            Self::IncorrectExcessBlobGas => "INCORRECT_EXCESS_BLOB_GAS",
            Self::InvalidBlockHash => "INVALID_BLOCK_HASH",
            Self::InvalidDepositEventLayout => "INVALID_DEPOSIT_EVENT_LAYOUT",
            Self::InvalidGasUsed => "INVALID_GAS_USED",
            Self::InvalidGasUsedAboveLimit => "INVALID_GAS_USED_ABOVE_LIMIT",
            Self::InvalidReceiptsRoot => "INVALID_RECEIPTS_ROOT",
            Self::InvalidRequests => "INVALID_REQUESTS",
            Self::InvalidStateRoot => "INVALID_STATE_ROOT",
            Self::InvalidVersionedHashes => "INVALID_VERSIONED_HASHES",
            Self::RlpBlockLimitExceeded => "RLP_BLOCK_LIMIT_EXCEEDED",
            Self::RlpStructuresEncoding => "RLP_STRUCTURES_ENCODING",
            Self::SystemContractCallFailed => "SYSTEM_CONTRACT_CALL_FAILED",
            Self::SystemContractEmpty => "SYSTEM_CONTRACT_EMPTY",
        }
    }
}

/// A canonical exception kind from either family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", content = "kind")]
pub enum ExceptionKind {
    Transaction(TransactionException),
    Block(BlockException),
}

impl ExceptionKind {
    pub fn is_transaction(self) -> bool {
        matches!(self, Self::Transaction(_))
    }
}

impl From<TransactionException> for ExceptionKind {
    fn from(value: TransactionException) -> Self {
        Self::Transaction(value)
    }
}

impl From<BlockException> for ExceptionKind {
    fn from(value: BlockException) -> Self {
        Self::Block(value)
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction(kind) => write!(f, "TransactionException.{}", kind.name()),
            Self::Block(kind) => write!(f, "BlockException.{}", kind.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_family_prefix() {
        let kind = ExceptionKind::from(TransactionException::NonceMismatchTooLow);
        assert_eq!(kind.to_string(), "TransactionException.NONCE_MISMATCH_TOO_LOW");
        let kind = ExceptionKind::from(BlockException::InvalidRequests);
        assert_eq!(kind.to_string(), "BlockException.INVALID_REQUESTS");
    }

    #[test]
    fn serde_name_matches_display_name() {
        let kinds = [
            TransactionException::Type3TxMaxBlobGasAllowanceExceeded,
            TransactionException::Type4EmptyAuthorizationList,
            TransactionException::GaslimitPriceProductOverflow,
        ];
        for kind in kinds {
            let json = serde_json::to_value(kind).expect("serialize");
            assert_eq!(json, serde_json::Value::String(kind.name().to_string()));
        }
    }
}
