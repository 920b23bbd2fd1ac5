//! Slot discovery and the decoded slot snapshot.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::binding::{RawSlotInfo, SlotId, TokenBinding};
use crate::codec::{self, MANUFACTURER_LEN, SLOT_DESCRIPTION_LEN, Version};
use crate::error::TokenResult;
use crate::flags::SlotFlags;
use crate::mech::Mechanism;
use crate::token::Token;

/// A device slot: a physical or logical position a token can occupy.
///
/// Immutable snapshot taken at enumeration time. Holds the binding alive for
/// as long as any `Slot` (or anything derived from one) exists.
#[derive(Clone)]
pub struct Slot {
    binding: Arc<dyn TokenBinding>,
    pub slot_id: SlotId,
    pub description: String,
    pub manufacturer_id: String,
    pub hardware_version: Version,
    pub firmware_version: Version,
    pub flags: SlotFlags,
}

impl Slot {
    pub(crate) fn from_raw(binding: Arc<dyn TokenBinding>, raw: &RawSlotInfo) -> Self {
        Self {
            binding,
            slot_id: raw.slot_id,
            description: codec::decode_fixed_string(&raw.description, SLOT_DESCRIPTION_LEN),
            manufacturer_id: codec::decode_fixed_string(&raw.manufacturer_id, MANUFACTURER_LEN),
            hardware_version: codec::decode_version(raw.hardware_version),
            firmware_version: codec::decode_version(raw.firmware_version),
            flags: SlotFlags::from_raw(raw.flags),
        }
    }

    pub(crate) fn binding(&self) -> &Arc<dyn TokenBinding> {
        &self.binding
    }

    /// Query the token currently installed in this slot.
    ///
    /// Re-queries the binding on every call; nothing is cached, so the
    /// result reflects current token presence.
    pub fn token(&self) -> TokenResult<Token> {
        let raw = self.binding.token_info(self.slot_id)?;
        Ok(Token::from_raw(self.clone(), &raw))
    }

    /// Mechanisms the token in this slot supports.
    pub fn mechanisms(&self) -> TokenResult<Vec<Mechanism>> {
        self.binding.mechanisms(self.slot_id)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("slot_id", &self.slot_id)
            .field("description", &self.description)
            .field("manufacturer_id", &self.manufacturer_id)
            .field("hardware_version", &self.hardware_version)
            .field("firmware_version", &self.firmware_version)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Enumerate the slots a binding exposes.
pub fn enumerate_slots(binding: Arc<dyn TokenBinding>) -> TokenResult<Vec<Slot>> {
    let raw = binding.slots()?;
    debug!(count = raw.len(), "enumerated slots");
    Ok(raw
        .iter()
        .map(|info| Slot::from_raw(Arc::clone(&binding), info))
        .collect())
}
