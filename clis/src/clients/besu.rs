//! Hyperledger Besu `evmtool`.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::exceptions::{BlockException, TransactionException};
use crate::core::mapper::ExceptionMapper;

/// First line of `evm --version`.
pub static DETECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Besu evm .*$").expect("besu detect pattern"));

pub static MAPPER: LazyLock<ExceptionMapper> = LazyLock::new(|| {
    ExceptionMapper::builder("besu")
        .substring(TransactionException::NonceIsMax, "invalid Nonce must be less than")
        .substring(
            TransactionException::InsufficientMaxFeePerBlobGas,
            "transaction invalid tx max fee per blob gas less than block blob gas fee",
        )
        .substring(
            TransactionException::GaslimitPriceProductOverflow,
            "invalid Upfront gas cost cannot exceed 2^256 Wei",
        )
        .substring(
            TransactionException::InsufficientMaxFeePerGas,
            "transaction invalid gasPrice is less than the current BaseFee",
        )
        .substring(TransactionException::GasAllowanceExceeded, "provided gas insufficient")
        .substring(
            TransactionException::PriorityGreaterThanMaxFeePerGas,
            "transaction invalid max priority fee per gas cannot be greater than max fee per gas",
        )
        .substring(TransactionException::Type3TxInvalidBlobVersionedHash, "Invalid versionedHash")
        .substring(
            TransactionException::Type3TxContractCreation,
            "transaction invalid transaction blob transactions must have a to address",
        )
        .substring(
            TransactionException::Type3TxWithFullBlobs,
            "Failed to decode transactions from block parameter",
        )
        .substring(
            TransactionException::Type3TxZeroBlobs,
            "Failed to decode transactions from block parameter",
        )
        .substring(TransactionException::Type3TxMaxBlobGasAllowanceExceeded, "Invalid Blob Count")
        .substring(TransactionException::Type3TxBlobCountExceeded, "Invalid Blob Count")
        .substring(
            TransactionException::Type3TxPreFork,
            "Transaction type BLOB is invalid, accepted transaction types are",
        )
        .substring(
            TransactionException::Type4EmptyAuthorizationList,
            "transaction invalid transaction code delegation transactions must have a \
             non-empty code delegation list",
        )
        .substring(
            TransactionException::Type4TxContractCreation,
            "transaction invalid transaction code delegation transactions must have a to address",
        )
        .substring(
            TransactionException::Type4TxPreFork,
            "transaction invalid Transaction type DELEGATE_CODE is invalid",
        )
        .substring(
            BlockException::RlpStructuresEncoding,
            "Failed to decode transactions from block parameter",
        )
        .substring(
            BlockException::IncorrectExcessBlobGas,
            "Payload excessBlobGas does not match calculated excessBlobGas",
        )
        .substring(
            BlockException::BlobGasUsedAboveLimit,
            "Payload BlobGasUsed does not match calculated BlobGasUsed",
        )
        .substring(
            BlockException::IncorrectBlobGasUsed,
            "Payload BlobGasUsed does not match calculated BlobGasUsed",
        )
        .substring(BlockException::InvalidGasUsedAboveLimit, "Header validation failed (FULL)")
        .regex(
            BlockException::InvalidRequests,
            r"Invalid execution requests|Requests hash mismatch, calculated: 0x[0-9a-f]+ header: 0x[0-9a-f]+",
            "Requests hash mismatch, calculated: 0xabc header: 0xdef",
        )
        .regex(
            BlockException::InvalidBlockHash,
            r"Computed block hash 0x[0-9a-f]+ does not match block hash parameter 0x[0-9a-f]+",
            "Computed block hash 0xabc does not match block hash parameter 0xdef",
        )
        .regex(
            BlockException::SystemContractCallFailed,
            r"System call halted|System call did not execute to completion",
            "System call halted",
        )
        .regex(
            BlockException::SystemContractEmpty,
            r"(Invalid system call, no code at address)|(Invalid system call address:)",
            "Invalid system call, no code at address 0x00000961ef480eb55e80d19ad83579a64c007002",
        )
        .regex(
            BlockException::InvalidDepositEventLayout,
            r"Invalid (amount|index|pubKey|signature|withdrawalCred) (offset|size): expected (\d+), but got (-?\d+)|Invalid deposit log length\. Must be \d+ bytes, but is \d+ bytes",
            "Invalid deposit log length. Must be 576 bytes, but is 544 bytes",
        )
        .regex(
            BlockException::RlpBlockLimitExceeded,
            r"Block size of \d+ bytes exceeds limit of \d+ bytes",
            "Block size of 10485761 bytes exceeds limit of 10485760 bytes",
        )
        .regex(
            TransactionException::InitcodeSizeExceeded,
            r"transaction invalid Initcode size of \d+ exceeds maximum size of \d+",
            "transaction invalid Initcode size of 49153 exceeds maximum size of 49152",
        )
        .regex(
            TransactionException::InsufficientAccountFunds,
            r"transaction invalid transaction up-front cost 0x[0-9a-f]+ exceeds transaction sender account balance 0x[0-9a-f]+",
            "transaction invalid transaction up-front cost 0x1 exceeds transaction sender account balance 0x0",
        )
        .regex(
            TransactionException::IntrinsicGasTooLow,
            r"transaction invalid intrinsic gas cost \d+ exceeds gas limit \d+",
            "transaction invalid intrinsic gas cost 21000 exceeds gas limit 20000",
        )
        .regex(
            TransactionException::IntrinsicGasBelowFloorGasCost,
            r"transaction invalid intrinsic gas cost \d+ exceeds gas limit \d+",
            "transaction invalid intrinsic gas cost 21000 exceeds gas limit 20000",
        )
        .regex(
            TransactionException::SenderNotEoa,
            r"transaction invalid Sender 0x[0-9a-f]+ has deployed code and so is not authorized to send transactions",
            "transaction invalid Sender 0xa94f has deployed code and so is not authorized to send transactions",
        )
        .regex(
            TransactionException::NonceMismatchTooLow,
            r"transaction invalid transaction nonce \d+ below sender account nonce \d+",
            "transaction invalid transaction nonce 0 below sender account nonce 1",
        )
        .regex(
            TransactionException::GasLimitExceedsMaximum,
            r"transaction invalid Transaction gas limit must be at most \d+",
            "transaction invalid Transaction gas limit must be at most 16777216",
        )
        .build()
        .expect("besu exception patterns")
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exceptions::ExceptionKind;
    use crate::core::mapper::ShadowedRule;
    use crate::test_support::assert_rules_classify_samples;

    #[test]
    fn base_fee_message_is_insufficient_max_fee() {
        assert_eq!(
            MAPPER.classify("transaction invalid gasPrice is less than the current BaseFee"),
            Some(TransactionException::InsufficientMaxFeePerGas.into())
        );
    }

    #[test]
    fn classifies_numeric_messages_with_regexes() {
        let cases: [(&str, ExceptionKind); 4] = [
            (
                "transaction invalid transaction nonce 0 below sender account nonce 1",
                TransactionException::NonceMismatchTooLow.into(),
            ),
            (
                "Block size of 10485761 bytes exceeds limit of 10485760 bytes",
                BlockException::RlpBlockLimitExceeded.into(),
            ),
            (
                "Invalid deposit log length. Must be 576 bytes, but is 544 bytes",
                BlockException::InvalidDepositEventLayout.into(),
            ),
            (
                "Requests hash mismatch, calculated: 0xabc header: 0xdef",
                BlockException::InvalidRequests.into(),
            ),
        ];
        for (raw, expected) in cases {
            assert_eq!(MAPPER.classify(raw), Some(expected), "{raw}");
        }
    }

    #[test]
    fn every_reachable_rule_classifies_its_sample() {
        let checked = assert_rules_classify_samples(&MAPPER);
        assert_eq!(checked, MAPPER.rules().count() - 5);
    }

    #[test]
    fn known_shadowed_rules() {
        let shadowed: Vec<(ExceptionKind, ExceptionKind)> = MAPPER
            .shadowed_rules()
            .into_iter()
            .map(|ShadowedRule { kind, shadowed_by, .. }| (kind, shadowed_by))
            .collect();
        assert_eq!(
            shadowed,
            vec![
                (
                    TransactionException::Type3TxZeroBlobs.into(),
                    TransactionException::Type3TxWithFullBlobs.into(),
                ),
                (
                    TransactionException::Type3TxBlobCountExceeded.into(),
                    TransactionException::Type3TxMaxBlobGasAllowanceExceeded.into(),
                ),
                (
                    BlockException::RlpStructuresEncoding.into(),
                    TransactionException::Type3TxWithFullBlobs.into(),
                ),
                (
                    BlockException::IncorrectBlobGasUsed.into(),
                    BlockException::BlobGasUsedAboveLimit.into(),
                ),
                (
                    TransactionException::IntrinsicGasBelowFloorGasCost.into(),
                    TransactionException::IntrinsicGasTooLow.into(),
                ),
            ]
        );
    }
}
