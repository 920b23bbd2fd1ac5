//! Decoding of raw token-side representations into semantic values.
//!
//! Tokens return fixed-width, space-padded byte fields, packed version
//! records and integer bitmasks. Everything here is total: non-compliant
//! tokens are known to return garbage in the tail of fixed-width fields, so
//! decoding must never fail on malformed input.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Nominal width of a slot description field.
pub const SLOT_DESCRIPTION_LEN: usize = 64;
/// Nominal width of a manufacturer name field (slots and tokens).
pub const MANUFACTURER_LEN: usize = 32;
/// Nominal width of a token label field.
pub const TOKEN_LABEL_LEN: usize = 32;

/// Two-field version record as returned by the binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawVersion {
    pub major: u8,
    pub minor: u8,
}

/// Decoded hardware/firmware version, ordered by (major, minor).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

pub fn decode_version(raw: RawVersion) -> Version {
    Version {
        major: raw.major,
        minor: raw.minor,
    }
}

/// Decode a fixed-width padded string field.
///
/// Truncates at `max_len`, decodes as UTF-8 (lossily) and strips trailing
/// whitespace. At least one fielded token implementation returns up to two
/// garbage bytes past the nominal field width, so anything beyond `max_len`
/// is cut before decoding.
pub fn decode_fixed_string(raw: &[u8], max_len: usize) -> String {
    let visible = &raw[..raw.len().min(max_len)];
    String::from_utf8_lossy(visible).trim_end().to_string()
}

/// Encode an unsigned scalar the way the binding expects attribute bytes.
pub fn encode_ulong(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Decode an unsigned scalar from raw attribute bytes. Short buffers are
/// zero-extended; buffers longer than eight bytes are rejected.
pub fn decode_ulong(raw: &[u8]) -> Option<u64> {
    if raw.len() > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[..raw.len()].copy_from_slice(raw);
    Some(u64::from_le_bytes(buf))
}

pub fn encode_bool(value: bool) -> Vec<u8> {
    vec![u8::from(value)]
}

pub fn decode_bool(raw: &[u8]) -> Option<bool> {
    match raw {
        [0] => Some(false),
        [_] => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_string_strips_padding() {
        let mut raw = b"SoftToken v2".to_vec();
        raw.resize(64, b' ');
        assert_eq!(decode_fixed_string(&raw, SLOT_DESCRIPTION_LEN), "SoftToken v2");
    }

    #[test]
    fn fixed_string_tolerates_trailing_garbage() {
        // Two bogus bytes past the nominal field, as seen in the wild.
        let mut raw = Vec::new();
        raw.extend_from_slice(b"ACME");
        raw.resize(MANUFACTURER_LEN, b' ');
        raw.extend_from_slice(&[0xfe, 0xff]);
        assert_eq!(decode_fixed_string(&raw, MANUFACTURER_LEN), "ACME");
    }

    #[test]
    fn fixed_string_is_total_on_malformed_utf8() {
        let raw = [b'o', b'k', 0xc3, b' ', b' '];
        let decoded = decode_fixed_string(&raw, 5);
        assert!(decoded.starts_with("ok"));
    }

    #[test]
    fn fixed_string_decode_is_stable() {
        let mut raw = b"stable".to_vec();
        raw.resize(32, b' ');
        let first = decode_fixed_string(&raw, TOKEN_LABEL_LEN);
        let second = decode_fixed_string(&raw, TOKEN_LABEL_LEN);
        assert_eq!(first, second);
    }

    #[test]
    fn version_orders_by_major_then_minor() {
        let older = decode_version(RawVersion { major: 1, minor: 9 });
        let newer = decode_version(RawVersion { major: 2, minor: 0 });
        assert!(older < newer);
        assert_eq!(newer.to_string(), "2.0");
    }

    #[test]
    fn ulong_round_trip() {
        assert_eq!(decode_ulong(&encode_ulong(0x1f)), Some(0x1f));
        assert_eq!(decode_ulong(&[]), Some(0));
        assert_eq!(decode_ulong(&[0; 9]), None);
    }

    #[test]
    fn bool_decoding_requires_single_byte() {
        assert_eq!(decode_bool(&encode_bool(true)), Some(true));
        assert_eq!(decode_bool(&[0]), Some(false));
        assert_eq!(decode_bool(&[1, 1]), None);
    }
}
