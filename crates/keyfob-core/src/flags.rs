//! Capability flag sets.
//!
//! Slot, token and mechanism flags are distinct bitmask vocabularies and are
//! never mixed; each gets its own type. Numeric values follow the standard
//! PKCS#11 assignments so raw binding words decode directly.

use bitflags::bitflags;

bitflags! {
    /// Capabilities of a device slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SlotFlags: u64 {
        const TOKEN_PRESENT = 0x0000_0001;
        const REMOVABLE_DEVICE = 0x0000_0002;
        const HW_SLOT = 0x0000_0004;
    }
}

bitflags! {
    /// Capabilities of a token installed in a slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TokenFlags: u64 {
        const RNG = 0x0000_0001;
        const WRITE_PROTECTED = 0x0000_0002;
        const LOGIN_REQUIRED = 0x0000_0004;
        const USER_PIN_INITIALIZED = 0x0000_0008;
        const PROTECTED_AUTHENTICATION_PATH = 0x0000_0100;
        const TOKEN_INITIALIZED = 0x0000_0400;
    }
}

bitflags! {
    /// Operations a mechanism (or, on a key, the key itself) supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MechanismFlags: u64 {
        const HW = 0x0000_0001;
        const ENCRYPT = 0x0000_0100;
        const DECRYPT = 0x0000_0200;
        const DIGEST = 0x0000_0400;
        const SIGN = 0x0000_0800;
        const VERIFY = 0x0000_2000;
        const GENERATE = 0x0000_8000;
        const GENERATE_KEY_PAIR = 0x0001_0000;
        const WRAP = 0x0002_0000;
        const UNWRAP = 0x0004_0000;
        const DERIVE = 0x0008_0000;
    }
}

impl SlotFlags {
    /// Decode a raw binding word, dropping any unknown bits.
    pub fn from_raw(raw: u64) -> Self {
        Self::from_bits_truncate(raw)
    }
}

impl TokenFlags {
    pub fn from_raw(raw: u64) -> Self {
        Self::from_bits_truncate(raw)
    }
}

impl MechanismFlags {
    pub fn from_raw(raw: u64) -> Self {
        Self::from_bits_truncate(raw)
    }
}
