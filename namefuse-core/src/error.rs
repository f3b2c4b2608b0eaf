//! Error types for namefuse.
//!
//! Every failure aborts the whole call: the store journal is rolled back and
//! no events are published. Errors carry enough context (node, caller) for
//! the caller to decide whether a retry makes sense.

use crate::name::{Address, LabelHash, Node};
use thiserror::Error;

/// Result type alias for namefuse operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical error codes.
///
/// Code ranges:
/// - 1000-1099: Authorization errors
/// - 1100-1199: Fuse errors
/// - 1200-1299: Name state errors
/// - 1300-1399: Label and input errors
/// - 1400-1499: Transfer errors
/// - 1500-1599: Adapter errors
/// - 1600-1699: Encoding errors
/// - 1700-1799: Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Authorization errors (1000-1099)
    Unauthorised = 1000,
    NotController = 1001,
    NotAdmin = 1002,

    // Fuse errors (1100-1199)
    OperationProhibited = 1100,

    // Name state errors (1200-1299)
    NameIsNotWrapped = 1200,
    IncompatibleParent = 1201,
    CannotUpgrade = 1202,
    NameNotAvailable = 1203,
    NameExpired = 1204,

    // Label and input errors (1300-1399)
    LabelTooShort = 1300,
    LabelTooLong = 1301,
    LabelMismatch = 1302,
    InvalidName = 1303,
    InvalidAddress = 1304,

    // Transfer errors (1400-1499)
    IncorrectTargetOwner = 1400,
    IncorrectTokenType = 1401,
    InsufficientBalance = 1402,
    ApprovalToCurrentOwner = 1403,
    TransferRejected = 1404,

    // Adapter errors (1500-1599)
    AdapterFailure = 1500,

    // Encoding errors (1600-1699)
    MalformedPayload = 1600,
    PayloadTooLarge = 1601,

    // Configuration errors (1700-1799)
    InvalidConfiguration = 1700,
}

impl ErrorCode {
    /// Get the numeric code value.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Get machine-readable name (kebab-case).
    pub fn name(self) -> &'static str {
        match self {
            Self::Unauthorised => "unauthorised",
            Self::NotController => "not-controller",
            Self::NotAdmin => "not-admin",

            Self::OperationProhibited => "operation-prohibited",

            Self::NameIsNotWrapped => "name-is-not-wrapped",
            Self::IncompatibleParent => "incompatible-parent",
            Self::CannotUpgrade => "cannot-upgrade",
            Self::NameNotAvailable => "name-not-available",
            Self::NameExpired => "name-expired",

            Self::LabelTooShort => "label-too-short",
            Self::LabelTooLong => "label-too-long",
            Self::LabelMismatch => "label-mismatch",
            Self::InvalidName => "invalid-name",
            Self::InvalidAddress => "invalid-address",

            Self::IncorrectTargetOwner => "incorrect-target-owner",
            Self::IncorrectTokenType => "incorrect-token-type",
            Self::InsufficientBalance => "insufficient-balance",
            Self::ApprovalToCurrentOwner => "approval-to-current-owner",
            Self::TransferRejected => "transfer-rejected",

            Self::AdapterFailure => "adapter-failure",

            Self::MalformedPayload => "malformed-payload",
            Self::PayloadTooLarge => "payload-too-large",

            Self::InvalidConfiguration => "invalid-configuration",
        }
    }

    /// Get human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Unauthorised => "Caller has no authority over the name",
            Self::NotController => "Caller is not a registration controller",
            Self::NotAdmin => "Caller is not the wrapper administrator",

            Self::OperationProhibited => "Operation conflicts with a burned fuse",

            Self::NameIsNotWrapped => "Name is not wrapped or has expired",
            Self::IncompatibleParent => "Operation not supported under this parent",
            Self::CannotUpgrade => "No upgrade contract is configured",
            Self::NameNotAvailable => "Name is not available for registration",
            Self::NameExpired => "Name registration has expired",

            Self::LabelTooShort => "Label is empty",
            Self::LabelTooLong => "Label exceeds the maximum length",
            Self::LabelMismatch => "Label does not hash to the token identifier",
            Self::InvalidName => "Name is malformed",
            Self::InvalidAddress => "Address is malformed",

            Self::IncorrectTargetOwner => "Target owner is the zero address or the wrapper",
            Self::IncorrectTokenType => "Token was not sent by the native registrar",
            Self::InsufficientBalance => "Sender does not hold the name",
            Self::ApprovalToCurrentOwner => "Cannot approve the current owner",
            Self::TransferRejected => "Receiver rejected the transfer",

            Self::AdapterFailure => "External adapter call failed",

            Self::MalformedPayload => "Payload could not be encoded or decoded",
            Self::PayloadTooLarge => "Payload size exceeds limit",

            Self::InvalidConfiguration => "Configuration is invalid",
        }
    }
}

/// Errors that can occur in namefuse operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Authorization Errors
    // =========================================================================
    /// Caller matched no authority rule for the name.
    #[error("unauthorised: {caller} has no authority over {node}")]
    Unauthorised { node: Node, caller: Address },

    /// Caller is not an active registration controller.
    #[error("{caller} is not a registration controller")]
    NotController { caller: Address },

    /// Caller is not the wrapper administrator.
    #[error("{caller} is not the wrapper administrator")]
    NotAdmin { caller: Address },

    // =========================================================================
    // Fuse Errors
    // =========================================================================
    /// The mutation conflicts with a fuse invariant.
    #[error("operation prohibited on {node}")]
    OperationProhibited { node: Node },

    // =========================================================================
    // Name State Errors
    // =========================================================================
    /// The name has no valid wrapped controller.
    #[error("name {node} is not wrapped")]
    NameIsNotWrapped { node: Node },

    /// Generic wrap/unwrap attempted under the native zone.
    #[error("incompatible parent: native names use their own wrap path")]
    IncompatibleParent,

    /// No successor contract configured.
    #[error("cannot upgrade: no upgrade contract configured")]
    CannotUpgrade,

    /// Registrar refused a registration.
    #[error("name {label} is not available")]
    NameNotAvailable { label: LabelHash },

    /// Registrar registration has lapsed.
    #[error("registration for {label} has expired")]
    NameExpired { label: LabelHash },

    // =========================================================================
    // Label and Input Errors
    // =========================================================================
    /// Empty label.
    #[error("label too short")]
    LabelTooShort,

    /// Label longer than the configured maximum.
    #[error("label too long: '{label}'")]
    LabelTooLong { label: String },

    /// Transfer payload label does not hash to the token id.
    #[error("label mismatch: payload hashes to {found}, token is {expected}")]
    LabelMismatch { expected: LabelHash, found: LabelHash },

    /// Malformed name or wire encoding.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Malformed address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    // =========================================================================
    // Transfer Errors
    // =========================================================================
    /// New owner is zero or the wrapper itself.
    #[error("incorrect target owner: {owner}")]
    IncorrectTargetOwner { owner: Address },

    /// Token hook invoked by something other than the native registrar.
    #[error("incorrect token type: only the native registrar may deliver tokens")]
    IncorrectTokenType,

    /// `from` does not hold the name (or it expired after emancipation).
    #[error("insufficient balance for transfer of {node}")]
    InsufficientBalance { node: Node },

    /// Approve target equals the current controller.
    #[error("approval to current owner")]
    ApprovalToCurrentOwner,

    /// A transfer receiver vetoed the transfer.
    #[error("transfer rejected by {receiver}: {reason}")]
    TransferRejected { receiver: Address, reason: String },

    // =========================================================================
    // Adapter Errors
    // =========================================================================
    /// Registry or registrar reported a failure.
    #[error("adapter error: {0}")]
    Adapter(String),

    // =========================================================================
    // Encoding Errors
    // =========================================================================
    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Payload size exceeds maximum allowed.
    #[error("payload size {size} bytes exceeds maximum {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

impl Error {
    /// Map this error to a canonical error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorised { .. } => ErrorCode::Unauthorised,
            Self::NotController { .. } => ErrorCode::NotController,
            Self::NotAdmin { .. } => ErrorCode::NotAdmin,

            Self::OperationProhibited { .. } => ErrorCode::OperationProhibited,

            Self::NameIsNotWrapped { .. } => ErrorCode::NameIsNotWrapped,
            Self::IncompatibleParent => ErrorCode::IncompatibleParent,
            Self::CannotUpgrade => ErrorCode::CannotUpgrade,
            Self::NameNotAvailable { .. } => ErrorCode::NameNotAvailable,
            Self::NameExpired { .. } => ErrorCode::NameExpired,

            Self::LabelTooShort => ErrorCode::LabelTooShort,
            Self::LabelTooLong { .. } => ErrorCode::LabelTooLong,
            Self::LabelMismatch { .. } => ErrorCode::LabelMismatch,
            Self::InvalidName(_) => ErrorCode::InvalidName,
            Self::InvalidAddress(_) => ErrorCode::InvalidAddress,

            Self::IncorrectTargetOwner { .. } => ErrorCode::IncorrectTargetOwner,
            Self::IncorrectTokenType => ErrorCode::IncorrectTokenType,
            Self::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            Self::ApprovalToCurrentOwner => ErrorCode::ApprovalToCurrentOwner,
            Self::TransferRejected { .. } => ErrorCode::TransferRejected,

            Self::Adapter(_) => ErrorCode::AdapterFailure,

            Self::SerializationError(_) => ErrorCode::MalformedPayload,
            Self::DeserializationError(_) => ErrorCode::MalformedPayload,
            Self::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,

            Self::ConfigurationError(_) => ErrorCode::InvalidConfiguration,
        }
    }

    /// Get the machine-readable error name (kebab-case).
    pub fn name(&self) -> &'static str {
        self.code().name()
    }

    /// Get human-readable description.
    pub fn description(&self) -> &'static str {
        self.code().description()
    }
}
