use bitcoin::Amount;
use thiserror::Error;

/// Protocol identifier pushed right after `OP_FALSE OP_IF` in the envelope.
pub(crate) const ORD_PROTOCOL_ID: [u8; 3] = *b"ord";

/// Envelope field tags, each pushed as a single data byte.
pub(crate) const CONTENT_TYPE_TAG: [u8; 1] = [1];
pub(crate) const POINTER_TAG: [u8; 1] = [2];
pub(crate) const RUNE_COMMITMENT_TAG: [u8; 1] = [13];

pub const DEFAULT_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// Value of the designated receiver output (index 0) when not configured.
pub const DEFAULT_RECEIVER_VALUE: Amount = Amount::from_sat(600);

/// Confirmations the commit output needs before the reveal is accepted by indexers.
pub const REQUIRED_COMMIT_CONFIRMATIONS: u32 = 6;

/// Fixed fee rate used for both the estimate and the real reveal draft.
pub const FEE_RATE_SAT_PER_VB: u64 = 1;

#[derive(Debug, Error)]
pub enum EtcherError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("Network mismatch: expected {expected}, got {actual}")]
    NetworkMismatch { expected: String, actual: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid output point: {0}")]
    InvalidOutpoint(String),

    #[error("Invalid rune: {0}")]
    InvalidRune(String),

    #[error("Invalid etching: {0}")]
    InvalidEtching(String),

    #[error("Script building error: {0}")]
    ScriptBuildError(String),

    #[error("Transaction building error: {0}")]
    TransactionBuildingError(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Finalization error: {0}")]
    FinalizationError(String),

    #[error("Insufficient funding: required {required}, funded {funded}")]
    InsufficientFunding { required: Amount, funded: Amount },

    #[error("Parsing error: {0}")]
    ParsingError(String),
}

pub type Result<T> = std::result::Result<T, EtcherError>;

pub type BitcoinSignerResult<T> = Result<T>;

impl From<bitcoin::address::ParseError> for EtcherError {
    fn from(error: bitcoin::address::ParseError) -> Self {
        EtcherError::InvalidAddress(error.to_string())
    }
}

impl From<bitcoin::hex::HexToArrayError> for EtcherError {
    fn from(error: bitcoin::hex::HexToArrayError) -> Self {
        EtcherError::InvalidOutpoint(error.to_string())
    }
}

impl From<bitcoin::key::FromWifError> for EtcherError {
    fn from(error: bitcoin::key::FromWifError) -> Self {
        EtcherError::InvalidPrivateKey(error.to_string())
    }
}

impl From<bitcoin::psbt::Error> for EtcherError {
    fn from(error: bitcoin::psbt::Error) -> Self {
        EtcherError::TransactionBuildingError(error.to_string())
    }
}
