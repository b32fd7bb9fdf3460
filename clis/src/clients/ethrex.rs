//! ethrex. Only its exception table is wired up.

use std::sync::LazyLock;

use crate::core::exceptions::{BlockException, TransactionException};
use crate::core::mapper::ExceptionMapper;

pub static MAPPER: LazyLock<ExceptionMapper> = LazyLock::new(|| {
    ExceptionMapper::builder("ethrex")
        .substring(
            TransactionException::SenderNotEoa,
            "reject transactions from senders with deployed code",
        )
        .substring(TransactionException::InitcodeSizeExceeded, "create initcode size limit")
        .substring(
            TransactionException::InsufficientMaxFeePerGas,
            "gas price is less than basefee",
        )
        .substring(
            TransactionException::InsufficientMaxFeePerBlobGas,
            "blob gas price is greater than max fee per blob gas",
        )
        .substring(
            TransactionException::PriorityGreaterThanMaxFeePerGas,
            "priority fee is greater than max fee",
        )
        .substring(
            TransactionException::Type3TxMaxBlobGasAllowanceExceeded,
            "Exceeded MAX_BLOB_GAS_PER_BLOCK",
        )
        .substring(
            TransactionException::Type3TxInvalidBlobVersionedHash,
            "blob version not supported",
        )
        .substring(TransactionException::Type4EmptyAuthorizationList, "empty authorization list")
        .substring(TransactionException::Type4TxContractCreation, "unexpected length")
        .substring(
            TransactionException::Type4TxPreFork,
            "eip 7702 transactions present in pre-prague payload",
        )
        .substring(
            BlockException::InvalidDepositEventLayout,
            "failed to decode deposit requests from receipts",
        )
        .substring(TransactionException::Type3TxPreFork, "blob versioned hashes not supported")
        .substring(
            BlockException::InvalidRequests,
            "Requests hash does not match the one in the header after executing",
        )
        .substring(
            BlockException::InvalidReceiptsRoot,
            "Receipts Root does not match the one in the header after executing",
        )
        .substring(
            BlockException::InvalidStateRoot,
            "World State Root does not match the one in the header after executing",
        )
        .substring(BlockException::InvalidGasUsed, "Gas used doesn't match value in header")
        .substring(
            BlockException::IncorrectBlobGasUsed,
            "Blob gas used doesn't match value in header",
        )
        .regex(
            TransactionException::NonceMismatchTooLow,
            r"nonce \d+ too low, expected \d+",
            "nonce 3 too low, expected 5",
        )
        .regex(
            TransactionException::Type3TxMaxBlobGasAllowanceExceeded,
            r"blob gas used \d+ exceeds maximum allowance \d+",
            "blob gas used 917504 exceeds maximum allowance 786432",
        )
        .regex(
            TransactionException::Type3TxZeroBlobs,
            r"blob transactions present in pre-cancun payload|empty blobs",
            "blob transactions present in pre-cancun payload",
        )
        .regex(
            TransactionException::InsufficientAccountFunds,
            r"lack of funds \(\d+\) for max fee \(\d+\)",
            "lack of funds (100) for max fee (2000)",
        )
        .regex(
            TransactionException::IntrinsicGasTooLow,
            r"gas floor exceeds the gas limit|call gas cost exceeds the gas limit|Intrinsic gas too low",
            "Intrinsic gas too low",
        )
        .regex(
            BlockException::SystemContractCallFailed,
            r"failed to apply .* requests contract call",
            "failed to apply withdrawal requests contract call",
        )
        .regex(
            BlockException::IncorrectBlobGasUsed,
            r"Blob gas used doesn't match value in header",
            "Blob gas used doesn't match value in header",
        )
        .regex(
            BlockException::RlpStructuresEncoding,
            r"Error decoding field '\D+' of type \w+.*",
            "Error decoding field 'to' of type H160: unexpected length",
        )
        .regex(
            BlockException::IncorrectExcessBlobGas,
            r".* Excess blob gas is incorrect",
            "Invalid block: Excess blob gas is incorrect",
        )
        .regex(
            BlockException::InvalidBlockHash,
            r"Invalid block hash. Expected \w+, got \w+",
            "Invalid block hash. Expected 0xabc, got 0xdef",
        )
        .build()
        .expect("ethrex exception patterns")
});
