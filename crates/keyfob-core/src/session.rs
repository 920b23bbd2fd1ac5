//! Session lifecycle, key generation and object search.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::attr::{Attribute, AttributeTemplate, AttributeValue};
use crate::binding::{ObjectHandle, SessionHandle, TokenBinding, UserType};
use crate::codec::decode_ulong;
use crate::error::{Status, TokenError, TokenResult};
use crate::flags::MechanismFlags;
use crate::mech::{
    default_generate_mechanism, default_key_capabilities, default_private_key_capabilities,
    default_public_key_capabilities, KeyType, Mechanism,
};
use crate::object::{Object, ObjectClass, PrivateKey, PublicKey, SecretKey};
use crate::token::Token;

/// Capability flag to key-attribute correspondence used when building
/// generation templates.
pub(crate) const CAPABILITY_ATTRIBUTES: [(MechanismFlags, Attribute); 7] = [
    (MechanismFlags::ENCRYPT, Attribute::Encrypt),
    (MechanismFlags::DECRYPT, Attribute::Decrypt),
    (MechanismFlags::SIGN, Attribute::Sign),
    (MechanismFlags::VERIFY, Attribute::Verify),
    (MechanismFlags::WRAP, Attribute::Wrap),
    (MechanismFlags::UNWRAP, Attribute::Unwrap),
    (MechanismFlags::DERIVE, Attribute::Derive),
];

/// Caller-side options for [`Session::generate_key`].
///
/// Everything is optional; unset fields fall back to the per-key-type
/// default tables. `template` entries override any computed default for the
/// same attribute (caller wins).
#[derive(Debug, Clone)]
pub struct KeySpec {
    pub id: Option<Vec<u8>>,
    pub label: Option<String>,
    /// Store the key on the token (as opposed to a session-lifetime key).
    pub store: bool,
    pub capabilities: Option<MechanismFlags>,
    pub mechanism: Option<Mechanism>,
    pub mechanism_param: Vec<u8>,
    pub template: AttributeTemplate,
}

impl Default for KeySpec {
    fn default() -> Self {
        Self {
            id: None,
            label: None,
            store: true,
            capabilities: None,
            mechanism: None,
            mechanism_param: Vec::new(),
            template: AttributeTemplate::new(),
        }
    }
}

impl KeySpec {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_template(mut self, template: AttributeTemplate) -> Self {
        self.template = template;
        self
    }
}

/// Caller-side options for [`Session::generate_keypair`].
#[derive(Debug, Clone)]
pub struct KeyPairSpec {
    pub id: Option<Vec<u8>>,
    pub label: Option<String>,
    pub store: bool,
    pub public_capabilities: Option<MechanismFlags>,
    pub private_capabilities: Option<MechanismFlags>,
    pub mechanism: Option<Mechanism>,
    pub mechanism_param: Vec<u8>,
    pub public_template: AttributeTemplate,
    pub private_template: AttributeTemplate,
}

impl Default for KeyPairSpec {
    fn default() -> Self {
        Self {
            id: None,
            label: None,
            store: true,
            public_capabilities: None,
            private_capabilities: None,
            mechanism: None,
            mechanism_param: Vec::new(),
            public_template: AttributeTemplate::new(),
            private_template: AttributeTemplate::new(),
        }
    }
}

impl KeyPairSpec {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }
}

/// Build the attribute template for a new secret key: computed defaults
/// first, then the caller's template entries on top (caller wins).
pub(crate) fn secret_key_template(
    key_type: KeyType,
    length_bits: Option<u64>,
    capabilities: MechanismFlags,
    spec: &KeySpec,
) -> AttributeTemplate {
    let mut template = AttributeTemplate::new();
    template.insert(
        Attribute::Class,
        AttributeValue::Ulong(ObjectClass::SecretKey as u64),
    );
    template.insert(Attribute::KeyType, AttributeValue::Ulong(key_type as u64));
    template.insert(Attribute::Token, AttributeValue::Bool(spec.store));
    template.insert(Attribute::Private, AttributeValue::Bool(true));
    template.insert(Attribute::Sensitive, AttributeValue::Bool(true));
    template.insert(Attribute::Extractable, AttributeValue::Bool(false));
    if let Some(bits) = length_bits {
        template.insert(Attribute::ValueLen, AttributeValue::Ulong(bits / 8));
    }
    for (flag, attribute) in CAPABILITY_ATTRIBUTES {
        template.insert(attribute, AttributeValue::Bool(capabilities.contains(flag)));
    }
    if let Some(id) = &spec.id {
        template.insert(Attribute::Id, AttributeValue::Bytes(id.clone()));
    }
    if let Some(label) = &spec.label {
        template.insert(Attribute::Label, AttributeValue::Text(label.clone()));
    }
    template.merge(&spec.template);
    template
}

/// A stateful, scoped connection to a [`Token`].
///
/// Required for nearly all operations. A session is either open or closed;
/// once closed, everything except another `close` fails with
/// [`TokenError::SessionClosed`] before reaching the binding. Dropping the
/// session closes it.
///
/// A `Session` is deliberately not `Sync`: the underlying token connection
/// is stateful and sequential, so a session must serve at most one logical
/// operation at a time. Open multiple sessions for parallel throughput.
pub struct Session {
    token: Token,
    handle: SessionHandle,
    rw: bool,
    open: Cell<bool>,
    user_type: Cell<UserType>,
}

impl Session {
    pub(crate) fn new(token: Token, handle: SessionHandle, rw: bool) -> Self {
        Self {
            token,
            handle,
            rw,
            open: Cell::new(true),
            user_type: Cell::new(UserType::Nobody),
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn is_rw(&self) -> bool {
        self.rw
    }

    pub fn user_type(&self) -> UserType {
        self.user_type.get()
    }

    pub(crate) fn binding(&self) -> &Arc<dyn TokenBinding> {
        self.token.slot.binding()
    }

    pub(crate) fn ensure_open(&self) -> TokenResult<()> {
        if self.open.get() {
            Ok(())
        } else {
            Err(TokenError::SessionClosed)
        }
    }

    /// Authenticate the session as `user_type`.
    ///
    /// A failed login propagates the binding's error but leaves the session
    /// open and unauthenticated; operations requiring authentication will
    /// keep failing with [`TokenError::NotAuthenticated`].
    pub fn login(&self, user_type: UserType, pin: &str) -> TokenResult<()> {
        self.ensure_open()?;
        self.binding().login(self.handle, user_type, pin)?;
        self.user_type.set(user_type);
        debug!(handle = self.handle, ?user_type, "session authenticated");
        Ok(())
    }

    pub fn logout(&self) -> TokenResult<()> {
        self.ensure_open()?;
        self.binding().logout(self.handle)?;
        self.user_type.set(UserType::Nobody);
        Ok(())
    }

    /// Close the session. Safe to call more than once; only the first call
    /// reaches the binding.
    pub fn close(&self) -> TokenResult<()> {
        if !self.open.replace(false) {
            return Ok(());
        }
        debug!(handle = self.handle, "closing session");
        self.binding().close_session(self.handle)
    }

    /// Generate a single secret key (AES, DES3, generic secret).
    ///
    /// Callers should set at least one of `spec.id` / `spec.label`; the
    /// token permits anonymous keys but they are hard to find again.
    /// Mechanism and capabilities fall back to the per-key-type default
    /// tables; the caller's `spec.template` wins over every computed
    /// default.
    pub fn generate_key(
        &self,
        key_type: KeyType,
        length_bits: u64,
        spec: &KeySpec,
    ) -> TokenResult<SecretKey<'_>> {
        self.ensure_open()?;
        if !key_type.is_symmetric() {
            return Err(TokenError::UnsupportedKeyType(key_type));
        }
        let mechanism = spec
            .mechanism
            .or_else(|| default_generate_mechanism(key_type))
            .ok_or(TokenError::UnsupportedKeyType(key_type))?;
        let capabilities = match spec.capabilities {
            Some(capabilities) => capabilities,
            None => default_key_capabilities(key_type)
                .ok_or(TokenError::UnsupportedKeyType(key_type))?,
        };
        if spec.id.is_none() && spec.label.is_none() {
            warn!("generating a key with neither id nor label");
        }

        let template = secret_key_template(key_type, Some(length_bits), capabilities, spec);
        self.check_private_requires_login(&template)?;

        let handle =
            self.binding()
                .generate_key(self.handle, mechanism, &spec.mechanism_param, &template)?;
        debug!(handle, ?key_type, ?mechanism, "generated secret key");
        Ok(SecretKey::new(
            Object::new(self, handle, ObjectClass::SecretKey),
            capabilities,
        ))
    }

    /// Generate a public/private key pair (RSA, EC).
    ///
    /// The same resolver logic as [`generate_key`](Self::generate_key)
    /// applies per half, with separate default capability tables for the
    /// public and private keys.
    pub fn generate_keypair(
        &self,
        key_type: KeyType,
        spec: &KeyPairSpec,
    ) -> TokenResult<(PublicKey<'_>, PrivateKey<'_>)> {
        self.ensure_open()?;
        if key_type.is_symmetric() {
            return Err(TokenError::UnsupportedKeyType(key_type));
        }
        let mechanism = spec
            .mechanism
            .or_else(|| default_generate_mechanism(key_type))
            .ok_or(TokenError::UnsupportedKeyType(key_type))?;
        let public_capabilities = match spec.public_capabilities {
            Some(capabilities) => capabilities,
            None => default_public_key_capabilities(key_type)
                .ok_or(TokenError::UnsupportedKeyType(key_type))?,
        };
        let private_capabilities = match spec.private_capabilities {
            Some(capabilities) => capabilities,
            None => default_private_key_capabilities(key_type)
                .ok_or(TokenError::UnsupportedKeyType(key_type))?,
        };
        if spec.id.is_none() && spec.label.is_none() {
            warn!("generating a key pair with neither id nor label");
        }

        let mut public_template = AttributeTemplate::new();
        public_template.insert(
            Attribute::Class,
            AttributeValue::Ulong(ObjectClass::PublicKey as u64),
        );
        public_template.insert(Attribute::KeyType, AttributeValue::Ulong(key_type as u64));
        public_template.insert(Attribute::Token, AttributeValue::Bool(spec.store));
        public_template.insert(Attribute::Private, AttributeValue::Bool(false));
        for (flag, attribute) in CAPABILITY_ATTRIBUTES {
            public_template.insert(
                attribute,
                AttributeValue::Bool(public_capabilities.contains(flag)),
            );
        }

        let mut private_template = AttributeTemplate::new();
        private_template.insert(
            Attribute::Class,
            AttributeValue::Ulong(ObjectClass::PrivateKey as u64),
        );
        private_template.insert(Attribute::KeyType, AttributeValue::Ulong(key_type as u64));
        private_template.insert(Attribute::Token, AttributeValue::Bool(spec.store));
        private_template.insert(Attribute::Private, AttributeValue::Bool(true));
        private_template.insert(Attribute::Sensitive, AttributeValue::Bool(true));
        private_template.insert(Attribute::Extractable, AttributeValue::Bool(false));
        for (flag, attribute) in CAPABILITY_ATTRIBUTES {
            private_template.insert(
                attribute,
                AttributeValue::Bool(private_capabilities.contains(flag)),
            );
        }

        for template in [&mut public_template, &mut private_template] {
            if let Some(id) = &spec.id {
                template.insert(Attribute::Id, AttributeValue::Bytes(id.clone()));
            }
            if let Some(label) = &spec.label {
                template.insert(Attribute::Label, AttributeValue::Text(label.clone()));
            }
        }
        public_template.merge(&spec.public_template);
        private_template.merge(&spec.private_template);

        self.check_private_requires_login(&private_template)?;

        let (public_handle, private_handle) = self.binding().generate_key_pair(
            self.handle,
            mechanism,
            &spec.mechanism_param,
            &public_template,
            &private_template,
        )?;
        debug!(
            public_handle,
            private_handle,
            ?key_type,
            ?mechanism,
            "generated key pair"
        );
        Ok((
            PublicKey::new(
                Object::new(self, public_handle, ObjectClass::PublicKey),
                public_capabilities,
            ),
            PrivateKey::new(
                Object::new(self, private_handle, ObjectClass::PrivateKey),
                private_capabilities,
            ),
        ))
    }

    /// Find objects on the token matching `template`.
    pub fn find_objects(&self, template: &AttributeTemplate) -> TokenResult<Vec<Object<'_>>> {
        self.ensure_open()?;
        let handles = self.binding().find_objects(self.handle, template)?;
        handles
            .into_iter()
            .map(|handle| self.object_from_handle(handle))
            .collect()
    }

    fn object_from_handle(&self, handle: ObjectHandle) -> TokenResult<Object<'_>> {
        let raw = self
            .binding()
            .get_attribute(self.handle, handle, Attribute::Class)?;
        let class = decode_ulong(&raw)
            .and_then(ObjectClass::from_ulong)
            .ok_or(TokenError::Operation(Status::DeviceError))?;
        Ok(Object::new(self, handle, class))
    }

    /// Creating a private object requires an authenticated session; caught
    /// here, before the binding is involved.
    pub(crate) fn check_private_requires_login(
        &self,
        template: &AttributeTemplate,
    ) -> TokenResult<()> {
        let private = template
            .get(Attribute::Private)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(false);
        if private && self.user_type.get() == UserType::Nobody {
            return Err(TokenError::NotAuthenticated);
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("rw", &self.rw)
            .field("open", &self.open.get())
            .field("user_type", &self.user_type.get())
            .finish()
    }
}
