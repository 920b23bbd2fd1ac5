//! Attribute identifiers, typed values and templates.
//!
//! The binding moves attributes as raw byte blobs. This module is the typed
//! boundary over those blobs: every attribute identifier has a fixed value
//! kind, and reads/writes are validated against that table before any bytes
//! cross to or from the token.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{TokenError, TokenResult};

/// Attribute identifier (PKCS#11 `CKA_*` numeric values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum Attribute {
    Class = 0x0000,
    Token = 0x0001,
    Private = 0x0002,
    Label = 0x0003,
    Value = 0x0011,
    KeyType = 0x0100,
    Id = 0x0102,
    Sensitive = 0x0103,
    Encrypt = 0x0104,
    Decrypt = 0x0105,
    Wrap = 0x0106,
    Unwrap = 0x0107,
    Sign = 0x0108,
    Verify = 0x010a,
    Derive = 0x010c,
    ValueLen = 0x0161,
    Extractable = 0x0162,
    Modifiable = 0x0170,
}

/// Value kind an attribute carries. Fixed per attribute identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    Bool,
    Ulong,
    Bytes,
    Text,
}

impl Attribute {
    /// The declared value kind for this attribute.
    pub fn kind(self) -> AttributeKind {
        match self {
            Attribute::Class | Attribute::KeyType | Attribute::ValueLen => AttributeKind::Ulong,
            Attribute::Token
            | Attribute::Private
            | Attribute::Sensitive
            | Attribute::Encrypt
            | Attribute::Decrypt
            | Attribute::Wrap
            | Attribute::Unwrap
            | Attribute::Sign
            | Attribute::Verify
            | Attribute::Derive
            | Attribute::Extractable
            | Attribute::Modifiable => AttributeKind::Bool,
            Attribute::Label => AttributeKind::Text,
            Attribute::Value | Attribute::Id => AttributeKind::Bytes,
        }
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttributeValue {
    Bool(bool),
    Ulong(u64),
    Bytes(Vec<u8>),
    Text(String),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Bool(_) => AttributeKind::Bool,
            AttributeValue::Ulong(_) => AttributeKind::Ulong,
            AttributeValue::Bytes(_) => AttributeKind::Bytes,
            AttributeValue::Text(_) => AttributeKind::Text,
        }
    }

    /// Encode for the binding.
    pub fn to_raw(&self) -> Vec<u8> {
        match self {
            AttributeValue::Bool(v) => codec::encode_bool(*v),
            AttributeValue::Ulong(v) => codec::encode_ulong(*v),
            AttributeValue::Bytes(v) => v.clone(),
            AttributeValue::Text(v) => v.as_bytes().to_vec(),
        }
    }

    /// Decode raw binding bytes according to the attribute's declared kind.
    pub fn from_raw(kind: AttributeKind, raw: &[u8]) -> Option<Self> {
        match kind {
            AttributeKind::Bool => codec::decode_bool(raw).map(AttributeValue::Bool),
            AttributeKind::Ulong => codec::decode_ulong(raw).map(AttributeValue::Ulong),
            AttributeKind::Bytes => Some(AttributeValue::Bytes(raw.to_vec())),
            AttributeKind::Text => String::from_utf8(raw.to_vec()).ok().map(AttributeValue::Text),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ulong(&self) -> Option<u64> {
        match self {
            AttributeValue::Ulong(v) => Some(*v),
            _ => None,
        }
    }
}

/// Reject a value whose kind disagrees with the attribute's declared kind.
pub fn check_kind(attribute: Attribute, value: &AttributeValue) -> TokenResult<()> {
    if value.kind() == attribute.kind() {
        Ok(())
    } else {
        Err(TokenError::InvalidAttribute {
            attribute,
            expected: attribute.kind(),
        })
    }
}

/// Ordered attribute template used for key generation and object search.
///
/// Insertion order is preserved; inserting an identifier that is already
/// present replaces its value in place. `merge` applies caller-supplied
/// overrides on top of computed defaults, with the caller winning on every
/// conflicting identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeTemplate {
    entries: Vec<(Attribute, AttributeValue)>,
}

impl AttributeTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: Attribute, value: AttributeValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(a, _)| *a == attribute) {
            entry.1 = value;
        } else {
            self.entries.push((attribute, value));
        }
    }

    pub fn with(mut self, attribute: Attribute, value: AttributeValue) -> Self {
        self.insert(attribute, value);
        self
    }

    pub fn get(&self, attribute: Attribute) -> Option<&AttributeValue> {
        self.entries
            .iter()
            .find(|(a, _)| *a == attribute)
            .map(|(_, v)| v)
    }

    pub fn merge(&mut self, overrides: &AttributeTemplate) {
        for (attribute, value) in overrides.entries() {
            self.insert(*attribute, value.clone());
        }
    }

    pub fn entries(&self) -> &[(Attribute, AttributeValue)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
