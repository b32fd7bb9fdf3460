//! go-ethereum `evm`.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::exceptions::{BlockException, TransactionException};
use crate::core::mapper::ExceptionMapper;

/// First line of `evm --version`.
pub static DETECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^evm(.exe)? version\b").expect("geth detect pattern"));

pub static MAPPER: LazyLock<ExceptionMapper> = LazyLock::new(|| {
    ExceptionMapper::builder("geth")
        .substring(TransactionException::SenderNotEoa, "sender not an eoa")
        .substring(TransactionException::GasAllowanceExceeded, "gas limit reached")
        .substring(
            TransactionException::InsufficientAccountFunds,
            "insufficient funds for gas * price + value",
        )
        .substring(TransactionException::IntrinsicGasTooLow, "intrinsic gas too low")
        .substring(
            TransactionException::IntrinsicGasBelowFloorGasCost,
            "insufficient gas for floor data gas cost",
        )
        .substring(TransactionException::NonceIsMax, "nonce has max value")
        .substring(
            TransactionException::Type3TxMaxBlobGasAllowanceExceeded,
            "would exceed maximum allowance",
        )
        .substring(
            TransactionException::InsufficientMaxFeePerBlobGas,
            "max fee per blob gas less than block blob gas fee",
        )
        .substring(
            TransactionException::InsufficientMaxFeePerGas,
            "max fee per gas less than block base fee",
        )
        .substring(
            TransactionException::PriorityGreaterThanMaxFeePerGas,
            "max priority fee per gas higher than max fee per gas",
        )
        .substring(TransactionException::Type3TxPreFork, "transaction type not supported")
        .substring(
            TransactionException::Type3TxInvalidBlobVersionedHash,
            "has invalid hash version",
        )
        // Same message family as the max-allowance rule above.
        .substring(TransactionException::Type3TxBlobCountExceeded, "exceed maximum allowance")
        .substring(TransactionException::Type3TxZeroBlobs, "blob transaction missing blob hashes")
        .substring(
            TransactionException::Type3TxWithFullBlobs,
            "unexpected blob sidecar in transaction at index",
        )
        .substring(
            TransactionException::Type3TxContractCreation,
            "input string too short for common.Address, decoding into (types.BlobTx).To",
        )
        .substring(
            TransactionException::Type4EmptyAuthorizationList,
            "EIP-7702 transaction with empty auth list",
        )
        .substring(
            TransactionException::Type4TxContractCreation,
            "input string too short for common.Address, decoding into (types.SetCodeTx).To",
        )
        .substring(TransactionException::GasLimitExceedsMaximum, "transaction gas limit too high")
        .substring(TransactionException::Type4TxPreFork, "transaction type not supported")
        .substring(TransactionException::InitcodeSizeExceeded, "max initcode size exceeded")
        .substring(TransactionException::NonceMismatchTooLow, "nonce too low")
        .substring(BlockException::InvalidDepositEventLayout, "unable to parse deposit data")
        .substring(BlockException::IncorrectBlobGasUsed, "blob gas used mismatch")
        .substring(BlockException::IncorrectExcessBlobGas, "invalid excessBlobGas")
        .substring(BlockException::InvalidVersionedHashes, "invalid number of versionedHashes")
        .substring(BlockException::InvalidRequests, "invalid requests hash")
        .substring(BlockException::SystemContractCallFailed, "system call failed to execute:")
        .substring(BlockException::InvalidBlockHash, "blockhash mismatch")
        .substring(
            BlockException::RlpBlockLimitExceeded,
            "block RLP-encoded size exceeds maximum",
        )
        .regex(
            TransactionException::Type3TxMaxBlobGasAllowanceExceeded,
            r"blob gas used \d+ exceeds maximum allowance \d+",
            "blob gas used 917504 exceeds maximum allowance 786432",
        )
        .regex(
            BlockException::BlobGasUsedAboveLimit,
            r"blob gas used \d+ exceeds maximum allowance \d+",
            "blob gas used 917504 exceeds maximum allowance 786432",
        )
        .regex(
            BlockException::InvalidGasUsedAboveLimit,
            r"invalid gasUsed: have \d+, gasLimit \d+",
            "invalid gasUsed: have 30000001, gasLimit 30000000",
        )
        .build()
        .expect("geth exception patterns")
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exceptions::ExceptionKind;
    use crate::core::mapper::ShadowedRule;
    use crate::test_support::assert_rules_classify_samples;

    #[test]
    fn classifies_typical_messages() {
        let cases: [(&str, ExceptionKind); 5] = [
            (
                "nonce too low: address 0xa94f, tx: 0 state: 1",
                TransactionException::NonceMismatchTooLow.into(),
            ),
            (
                "insufficient funds for gas * price + value: address 0xa94f have 0 want 1",
                TransactionException::InsufficientAccountFunds.into(),
            ),
            (
                "invalid gasUsed: have 30000001, gasLimit 30000000",
                BlockException::InvalidGasUsedAboveLimit.into(),
            ),
            (
                "blob gas used 917504 exceeds maximum allowance 786432",
                TransactionException::Type3TxMaxBlobGasAllowanceExceeded.into(),
            ),
            (
                "could not apply tx 0: max initcode size exceeded: code size 49153 limit 49152",
                TransactionException::InitcodeSizeExceeded.into(),
            ),
        ];
        for (raw, expected) in cases {
            assert_eq!(MAPPER.classify(raw), Some(expected), "{raw}");
        }
        assert_eq!(MAPPER.classify("out of gas"), None);
    }

    #[test]
    fn every_reachable_rule_classifies_its_sample() {
        let checked = assert_rules_classify_samples(&MAPPER);
        assert_eq!(checked, MAPPER.rules().count() - 2);
    }

    #[test]
    fn known_shadowed_rules() {
        assert_eq!(
            MAPPER.shadowed_rules(),
            vec![
                ShadowedRule {
                    kind: TransactionException::Type4TxPreFork.into(),
                    pattern: "transaction type not supported".to_string(),
                    shadowed_by: TransactionException::Type3TxPreFork.into(),
                },
                ShadowedRule {
                    kind: BlockException::BlobGasUsedAboveLimit.into(),
                    pattern: r"blob gas used \d+ exceeds maximum allowance \d+".to_string(),
                    shadowed_by: TransactionException::Type3TxMaxBlobGasAllowanceExceeded.into(),
                },
            ]
        );
    }
}
