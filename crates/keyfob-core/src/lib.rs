//! keyfob-core: a typed, safe object model over a cryptographic token
//! binding.
//!
//! The low-level world of a token is untyped: opaque handles, attribute
//! byte-bags and integer bitmasks. This crate maps that into a statically
//! meaningful hierarchy ([`Slot`], [`Token`], [`Session`], [`Object`] and
//! its key variants) in which object types declare which operations they
//! support (the [`ops`] capability traits), key generation resolves safe
//! per-key-type defaults, and every attribute crossing the boundary is
//! validated against a fixed kind table.
//!
//! Talking to actual hardware is delegated to an implementation of
//! [`TokenBinding`]; see the `keyfob-soft` crate for an in-memory software
//! token.
//!
//! ```no_run
//! use std::sync::Arc;
//! use keyfob_core::{enumerate_slots, KeySpec, KeyType, OpParams, UserType};
//! use keyfob_core::ops::{Decrypt, Encrypt};
//!
//! # fn demo(binding: Arc<dyn keyfob_core::TokenBinding>) -> keyfob_core::TokenResult<()> {
//! let slot = enumerate_slots(binding)?.remove(0);
//! let session = slot.token()?.open(true)?;
//! session.login(UserType::User, "1234")?;
//! let key = session.generate_key(KeyType::Aes, 256, &KeySpec::labelled("demo"))?;
//! let params = OpParams::default();
//! let ciphertext = key.encrypt(b"hello world", &params)?;
//! assert_eq!(key.decrypt(ciphertext, &params)?, b"hello world");
//! # Ok(())
//! # }
//! ```

pub mod attr;
pub mod binding;
pub mod codec;
pub mod error;
pub mod flags;
pub mod mech;
pub mod object;
pub mod ops;
pub mod session;
pub mod slot;
pub mod token;

pub use attr::{Attribute, AttributeKind, AttributeTemplate, AttributeValue};
pub use binding::{
    ObjectHandle, RawSlotInfo, RawTokenInfo, SessionHandle, SlotId, TokenBinding, UserType,
};
pub use codec::{RawVersion, Version};
pub use error::{Status, TokenError, TokenResult};
pub use flags::{MechanismFlags, SlotFlags, TokenFlags};
pub use mech::{KeyType, Mechanism};
pub use object::{Object, ObjectClass, PrivateKey, PublicKey, SecretKey};
pub use ops::{CryptoInput, OpKind, OpParams};
pub use session::{KeyPairSpec, KeySpec, Session};
pub use slot::{enumerate_slots, Slot};
pub use token::Token;
