use thiserror::Error;

use crate::attr::{Attribute, AttributeKind};
use crate::mech::KeyType;
use crate::ops::OpKind;

pub type TokenResult<T> = Result<T, TokenError>;

/// Status codes reported by the low-level token binding.
///
/// These mirror the native return codes a real token can produce. The core
/// never retries on any of them; retry policy belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    SlotIdInvalid,
    SessionHandleInvalid,
    SessionReadOnly,
    HandleInvalid,
    AttributeTypeInvalid,
    AttributeSensitive,
    AttributeReadOnly,
    MechanismInvalid,
    MechanismParamInvalid,
    KeyTypeInconsistent,
    KeyFunctionNotPermitted,
    KeyUnextractable,
    KeySizeRange,
    TemplateIncomplete,
    EncryptedDataInvalid,
    SignatureInvalid,
    PinIncorrect,
    UserAlreadyLoggedIn,
    UserNotLoggedIn,
    TokenRemoved,
    DeviceError,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// The binding reported a failure status. Surfaced as-is.
    #[error("token operation failed: {0:?}")]
    Operation(Status),
    /// The object was not composed with the requested capability. Detected
    /// locally, before any binding call is attempted.
    #[error("object does not support the {op:?} capability")]
    CapabilityMissing { op: OpKind },
    #[error("session is closed")]
    SessionClosed,
    #[error("operation requires an authenticated session")]
    NotAuthenticated,
    #[error("no default mechanism or capabilities registered for {0:?}")]
    UnsupportedKeyType(KeyType),
    #[error("attribute {attribute:?} expects a {expected:?} value")]
    InvalidAttribute {
        attribute: Attribute,
        expected: AttributeKind,
    },
}

impl TokenError {
    /// True when the error originated inside the token rather than in the
    /// local programming contract.
    pub fn is_token_error(&self) -> bool {
        matches!(self, TokenError::Operation(_))
    }
}

impl From<Status> for TokenError {
    fn from(status: Status) -> Self {
        TokenError::Operation(status)
    }
}
