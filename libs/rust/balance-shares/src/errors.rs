use alloy::primitives::{Address, U256};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BalanceShareError>;

/// Every variant aborts the whole operation; no ledger state is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceShareError {
    // validation
    #[error("Empty array")]
    EmptyArray,
    #[error("Array length mismatch: {accounts} accounts, {values} values")]
    ArrayLengthMismatch { accounts: usize, values: usize },
    #[error("Zero address")]
    ZeroAddress,
    #[error("Invalid bps: {bps}")]
    InvalidBps { bps: u16 },
    #[error("Duplicate account in batch: {account}")]
    DuplicateAccount { account: Address },
    #[error("Duplicate asset in request: {asset}")]
    DuplicateAsset { asset: Address },
    #[error("Account share update for {account} changes nothing")]
    NoOpUpdate { account: Address },

    // authorization
    #[error("Unauthorized caller {caller}")]
    Unauthorized { caller: Address },
    #[error("Account {account} may not increase its own share")]
    AccountShareIncreaseNotAllowed { account: Address },
    #[error("Account share for {account} is locked until {removable_at}")]
    AccountShareLocked { account: Address, removable_at: u64 },
    #[error("Signature expired at {deadline}")]
    SignatureExpired { deadline: u64 },
    #[error("Invalid signature")]
    InvalidSignature,

    // state
    #[error("Account share for {account} is not active")]
    AccountShareInactive { account: Address },
    #[error("Account share not found for {account}")]
    AccountShareNotFound { account: Address },
    #[error("Period index {period_index} out of bounds, max is {max_period_index}")]
    PeriodIndexOutOfBounds {
        period_index: u64,
        max_period_index: u64,
    },
    #[error("Balance share is inactive")]
    BalanceShareInactive,

    // arithmetic
    #[error("Total bps {total_bps} exceeds 10000")]
    TotalBpsExceeded { total_bps: u32 },
    #[error("Checkpoint index overflow")]
    CheckpointIndexOverflow,
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    // transfers
    #[error("Invalid native value: expected {expected}, got {actual}")]
    InvalidNativeValue { expected: U256, actual: U256 },
    #[error("Unexpected native value {value} for token transfer")]
    UnexpectedNativeValue { value: U256 },
    #[error("Transfer failed: {reason}")]
    TransferFailed { reason: String },
}
