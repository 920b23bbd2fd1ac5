//! The decoded token snapshot.

use std::fmt;

use tracing::debug;

use crate::binding::RawTokenInfo;
use crate::codec::{self, TOKEN_LABEL_LEN};
use crate::error::TokenResult;
use crate::flags::TokenFlags;
use crate::session::Session;
use crate::slot::Slot;

/// A token installed in a [`Slot`].
///
/// An immutable snapshot: a `Token` refers to exactly one slot for its whole
/// lifetime, and freshness is the caller's concern (call
/// [`Slot::token`] again rather than expecting cached state to update).
#[derive(Clone)]
pub struct Token {
    pub slot: Slot,
    pub label: String,
    /// Serial number, raw bytes as the token reports them.
    pub serial: Vec<u8>,
    pub flags: TokenFlags,
}

impl Token {
    pub(crate) fn from_raw(slot: Slot, raw: &RawTokenInfo) -> Self {
        Self {
            slot,
            label: codec::decode_fixed_string(&raw.label, TOKEN_LABEL_LEN),
            serial: raw.serial.clone(),
            flags: TokenFlags::from_raw(raw.flags),
        }
    }

    /// Open a session on this token.
    ///
    /// The session starts unauthenticated; call [`Session::login`] to
    /// transition the authentication sub-state.
    pub fn open(&self, rw: bool) -> TokenResult<Session> {
        let handle = self
            .slot
            .binding()
            .open_session(self.slot.slot_id, rw)?;
        debug!(slot = self.slot.slot_id, handle, rw, "opened session");
        Ok(Session::new(self.clone(), handle, rw))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("slot_id", &self.slot.slot_id)
            .field("label", &self.label)
            .field("serial", &self.serial)
            .field("flags", &self.flags)
            .finish()
    }
}
