//! Token-resident objects and their typed key variants.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attr::{self, Attribute, AttributeValue};
use crate::binding::ObjectHandle;
use crate::error::{TokenError, TokenResult};
use crate::flags::MechanismFlags;
use crate::mech::KeyType;
use crate::session::{Session, CAPABILITY_ATTRIBUTES};

/// Object class discriminant, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum ObjectClass {
    Data = 0x0000,
    Certificate = 0x0001,
    PublicKey = 0x0002,
    PrivateKey = 0x0003,
    SecretKey = 0x0004,
}

impl ObjectClass {
    pub fn from_ulong(value: u64) -> Option<Self> {
        match value {
            0x0000 => Some(ObjectClass::Data),
            0x0001 => Some(ObjectClass::Certificate),
            0x0002 => Some(ObjectClass::PublicKey),
            0x0003 => Some(ObjectClass::PrivateKey),
            0x0004 => Some(ObjectClass::SecretKey),
            _ => None,
        }
    }
}

/// Any entity resident on the token, identified by a handle that is only
/// meaningful within its owning [`Session`]. The borrow makes that scoping
/// explicit: objects cannot outlive their session.
pub struct Object<'s> {
    session: &'s Session,
    handle: ObjectHandle,
    class: ObjectClass,
}

impl std::fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("handle", &self.handle)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

impl<'s> Object<'s> {
    pub(crate) fn new(session: &'s Session, handle: ObjectHandle, class: ObjectClass) -> Self {
        Self {
            session,
            handle,
            class,
        }
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Read an attribute, decoded against its declared kind.
    pub fn get(&self, attribute: Attribute) -> TokenResult<AttributeValue> {
        self.session.ensure_open()?;
        let raw =
            self.session
                .binding()
                .get_attribute(self.session.handle(), self.handle, attribute)?;
        AttributeValue::from_raw(attribute.kind(), &raw).ok_or(TokenError::InvalidAttribute {
            attribute,
            expected: attribute.kind(),
        })
    }

    /// Write an attribute. The value kind is validated locally before any
    /// bytes reach the binding.
    pub fn set(&self, attribute: Attribute, value: AttributeValue) -> TokenResult<()> {
        self.session.ensure_open()?;
        attr::check_kind(attribute, &value)?;
        self.session.binding().set_attribute(
            self.session.handle(),
            self.handle,
            attribute,
            &value.to_raw(),
        )
    }

    /// Irrevocably remove the object from the token. Consumes the object;
    /// the handle is invalid afterwards.
    pub fn destroy(self) -> TokenResult<()> {
        self.session.ensure_open()?;
        debug!(handle = self.handle, "destroying object");
        self.session
            .binding()
            .destroy_object(self.session.handle(), self.handle)
    }

    /// Read the object's capability attributes back into a flag set.
    fn read_capabilities(&self) -> TokenResult<MechanismFlags> {
        let mut capabilities = MechanismFlags::empty();
        for (flag, attribute) in CAPABILITY_ATTRIBUTES {
            match self.get(attribute) {
                Ok(value) => {
                    if value.as_bool().unwrap_or(false) {
                        capabilities |= flag;
                    }
                }
                // Tokens may simply not expose a given usage attribute.
                Err(TokenError::Operation(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Ok(capabilities)
    }

    /// Upgrade a found object into a typed secret key, deriving its
    /// capability set from the token's usage attributes.
    pub fn into_secret_key(self) -> TokenResult<SecretKey<'s>> {
        let capabilities = self.read_capabilities()?;
        Ok(SecretKey::new(self, capabilities))
    }

    /// As [`into_secret_key`](Self::into_secret_key), for public keys.
    pub fn into_public_key(self) -> TokenResult<PublicKey<'s>> {
        let capabilities = self.read_capabilities()?;
        Ok(PublicKey::new(self, capabilities))
    }

    /// As [`into_secret_key`](Self::into_secret_key), for private keys.
    pub fn into_private_key(self) -> TokenResult<PrivateKey<'s>> {
        let capabilities = self.read_capabilities()?;
        Ok(PrivateKey::new(self, capabilities))
    }
}

fn lazy_key_type(object: &Object<'_>) -> TokenResult<KeyType> {
    // Looked up on every call on purpose: the answer must always reflect
    // current token state, never a cached construction-time snapshot.
    let value = object.get(Attribute::KeyType)?;
    value
        .as_ulong()
        .and_then(KeyType::from_ulong)
        .ok_or(TokenError::InvalidAttribute {
            attribute: Attribute::KeyType,
            expected: crate::attr::AttributeKind::Ulong,
        })
}

macro_rules! key_variant {
    ($(#[$doc:meta])* $name:ident, $class:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name<'s> {
            object: Object<'s>,
            capabilities: MechanismFlags,
        }

        impl<'s> $name<'s> {
            pub(crate) fn new(object: Object<'s>, capabilities: MechanismFlags) -> Self {
                debug_assert_eq!(object.class(), $class);
                Self {
                    object,
                    capabilities,
                }
            }

            /// Capability set this key was composed with.
            pub fn capabilities(&self) -> MechanismFlags {
                self.capabilities
            }

            /// The key's type, looked up from the token on every call.
            pub fn key_type(&self) -> TokenResult<KeyType> {
                lazy_key_type(&self.object)
            }

            pub fn destroy(self) -> TokenResult<()> {
                self.object.destroy()
            }

            pub fn object(&self) -> &Object<'s> {
                &self.object
            }
        }

        impl<'s> Deref for $name<'s> {
            type Target = Object<'s>;

            fn deref(&self) -> &Object<'s> {
                &self.object
            }
        }
    };
}

key_variant!(
    /// A symmetric secret key.
    SecretKey,
    ObjectClass::SecretKey
);
key_variant!(
    /// The public half of an asymmetric key pair.
    PublicKey,
    ObjectClass::PublicKey
);
key_variant!(
    /// The private half of an asymmetric key pair.
    PrivateKey,
    ObjectClass::PrivateKey
);
