//! The low-level binding contract.
//!
//! Everything that actually talks to token hardware (or emulates it) lives
//! behind [`TokenBinding`]. The object model owns no protocol knowledge: it
//! hands the binding attribute templates and byte chunks and gets back raw
//! handles and raw attribute bytes. All calls are synchronous and blocking;
//! timeout and retry policy belong to the caller or the binding itself.

use serde::{Deserialize, Serialize};

use crate::attr::{Attribute, AttributeTemplate};
use crate::codec::RawVersion;
use crate::error::TokenResult;
use crate::mech::Mechanism;
use crate::ops::OpKind;

pub type SlotId = u64;
pub type SessionHandle = u64;
pub type ObjectHandle = u64;

/// Authentication state a session can be logged in as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    Nobody,
    User,
    SecurityOfficer,
}

/// Slot record as the binding returns it: fixed-width padded string fields,
/// packed versions and a raw flags word. Decoded by [`crate::Slot`].
#[derive(Debug, Clone, Default)]
pub struct RawSlotInfo {
    pub slot_id: SlotId,
    pub description: Vec<u8>,
    pub manufacturer_id: Vec<u8>,
    pub hardware_version: RawVersion,
    pub firmware_version: RawVersion,
    pub flags: u64,
}

/// Token record as the binding returns it.
#[derive(Debug, Clone, Default)]
pub struct RawTokenInfo {
    pub label: Vec<u8>,
    pub serial: Vec<u8>,
    pub flags: u64,
}

/// Low-level collaborator the object model delegates to.
///
/// Failures surface as [`crate::TokenError::Operation`] carrying the native
/// status; the core never retries or suppresses them.
pub trait TokenBinding: Send + Sync {
    fn slots(&self) -> TokenResult<Vec<RawSlotInfo>>;

    fn token_info(&self, slot: SlotId) -> TokenResult<RawTokenInfo>;

    /// Mechanisms the token in `slot` supports.
    fn mechanisms(&self, slot: SlotId) -> TokenResult<Vec<Mechanism>>;

    fn open_session(&self, slot: SlotId, rw: bool) -> TokenResult<SessionHandle>;

    fn close_session(&self, session: SessionHandle) -> TokenResult<()>;

    fn login(&self, session: SessionHandle, user_type: UserType, pin: &str) -> TokenResult<()>;

    fn logout(&self, session: SessionHandle) -> TokenResult<()>;

    /// Raw attribute bytes; the caller decodes them against the attribute's
    /// declared kind.
    fn get_attribute(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
        attribute: Attribute,
    ) -> TokenResult<Vec<u8>>;

    fn set_attribute(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
        attribute: Attribute,
        raw: &[u8],
    ) -> TokenResult<()>;

    fn generate_key(
        &self,
        session: SessionHandle,
        mechanism: Mechanism,
        param: &[u8],
        template: &AttributeTemplate,
    ) -> TokenResult<ObjectHandle>;

    fn generate_key_pair(
        &self,
        session: SessionHandle,
        mechanism: Mechanism,
        param: &[u8],
        public_template: &AttributeTemplate,
        private_template: &AttributeTemplate,
    ) -> TokenResult<(ObjectHandle, ObjectHandle)>;

    fn destroy_object(&self, session: SessionHandle, object: ObjectHandle) -> TokenResult<()>;

    fn find_objects(
        &self,
        session: SessionHandle,
        template: &AttributeTemplate,
    ) -> TokenResult<Vec<ObjectHandle>>;

    /// Streaming data operation: one output chunk per input chunk, chunk
    /// boundaries preserved 1:1. Used for Encrypt, Decrypt, Sign and the
    /// data half of Wrap-style mechanisms.
    fn crypto_operation(
        &self,
        kind: OpKind,
        session: SessionHandle,
        object: ObjectHandle,
        mechanism: Mechanism,
        param: &[u8],
        chunks: &[Vec<u8>],
    ) -> TokenResult<Vec<Vec<u8>>>;

    /// Verification consumes a signature and yields no output chunks, so it
    /// gets its own entry point instead of bending `crypto_operation`.
    fn verify_operation(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
        mechanism: Mechanism,
        param: &[u8],
        chunks: &[Vec<u8>],
        signature: &[u8],
    ) -> TokenResult<()>;

    fn wrap_key(
        &self,
        session: SessionHandle,
        wrapping: ObjectHandle,
        target: ObjectHandle,
        mechanism: Mechanism,
        param: &[u8],
    ) -> TokenResult<Vec<u8>>;

    fn unwrap_key(
        &self,
        session: SessionHandle,
        unwrapping: ObjectHandle,
        wrapped: &[u8],
        mechanism: Mechanism,
        param: &[u8],
        template: &AttributeTemplate,
    ) -> TokenResult<ObjectHandle>;
}
