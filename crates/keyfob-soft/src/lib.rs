//! keyfob-soft: an in-memory software token.
//!
//! Implements the `keyfob-core` binding contract with no hardware behind
//! it: handle registries guarded by `RwLock`, AES-256-GCM for encryption
//! and wrapping, HMAC-SHA-256 for secret-key signatures and ECDSA/P-256
//! key pairs. Useful as a test double and as a minimal software token.
//!
//! Enforced token-side rules, mirroring what real devices reject:
//! private objects require login, persistent objects require a read/write
//! session, sensitive key values cannot be read, stale handles fail.

mod crypto;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use keyfob_core::{
    Attribute, AttributeTemplate, AttributeValue, KeyType, Mechanism, ObjectHandle, OpKind,
    RawSlotInfo, RawTokenInfo, RawVersion, SessionHandle, SlotFlags, SlotId, Status, TokenBinding,
    TokenError, TokenFlags, TokenResult, UserType,
};

const SLOT_ID: SlotId = 1;

fn err(status: Status) -> TokenError {
    TokenError::Operation(status)
}

fn pad_field(text: &str, width: usize) -> Vec<u8> {
    let mut field = text.as_bytes().to_vec();
    field.truncate(width);
    field.resize(width, b' ');
    field
}

#[derive(Clone)]
struct SoftSession {
    rw: bool,
    user: UserType,
}

struct StoredObject {
    attributes: HashMap<Attribute, AttributeValue>,
    material: Vec<u8>,
    /// `None` for persistent token objects; session objects die with their
    /// owning session.
    owner: Option<SessionHandle>,
}

impl StoredObject {
    fn flag(&self, attribute: Attribute) -> bool {
        self.attributes
            .get(&attribute)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(false)
    }

    fn matches(&self, template: &AttributeTemplate) -> bool {
        template
            .entries()
            .iter()
            .all(|(attribute, value)| self.attributes.get(attribute) == Some(value))
    }
}

/// In-memory software token exposing a single slot.
pub struct SoftToken {
    user_pin: String,
    so_pin: String,
    sessions: RwLock<HashMap<SessionHandle, SoftSession>>,
    objects: RwLock<HashMap<ObjectHandle, StoredObject>>,
    next_session: AtomicU64,
    next_object: AtomicU64,
}

impl SoftToken {
    pub fn new() -> Self {
        Self::with_pins("1234", "4321")
    }

    pub fn with_pins(user_pin: impl Into<String>, so_pin: impl Into<String>) -> Self {
        Self {
            user_pin: user_pin.into(),
            so_pin: so_pin.into(),
            sessions: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            next_object: AtomicU64::new(1),
        }
    }

    fn session(&self, handle: SessionHandle) -> TokenResult<SoftSession> {
        self.sessions
            .read()
            .get(&handle)
            .cloned()
            .ok_or_else(|| err(Status::SessionHandleInvalid))
    }

    /// The key type a generation mechanism produces.
    fn generation_key_type(mechanism: Mechanism) -> Option<KeyType> {
        match mechanism {
            Mechanism::AesKeyGen => Some(KeyType::Aes),
            Mechanism::Des2KeyGen => Some(KeyType::Des2),
            Mechanism::Des3KeyGen => Some(KeyType::Des3),
            Mechanism::GenericSecretKeyGen => Some(KeyType::Generic),
            Mechanism::EcKeyPairGen => Some(KeyType::Ec),
            Mechanism::RsaPkcsKeyPairGen => Some(KeyType::Rsa),
            _ => None,
        }
    }

    fn usage_attribute(kind: OpKind) -> Attribute {
        match kind {
            OpKind::Encrypt => Attribute::Encrypt,
            OpKind::Decrypt => Attribute::Decrypt,
            OpKind::Sign => Attribute::Sign,
            OpKind::Verify => Attribute::Verify,
            OpKind::Wrap => Attribute::Wrap,
            OpKind::Unwrap => Attribute::Unwrap,
        }
    }

    /// Admission checks shared by every object-creating call.
    fn check_creation(
        &self,
        session: &SoftSession,
        attributes: &HashMap<Attribute, AttributeValue>,
    ) -> TokenResult<()> {
        let private = attributes
            .get(&Attribute::Private)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(false);
        if private && session.user == UserType::Nobody {
            return Err(err(Status::UserNotLoggedIn));
        }
        let persistent = attributes
            .get(&Attribute::Token)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(false);
        if persistent && !session.rw {
            return Err(err(Status::SessionReadOnly));
        }
        Ok(())
    }

    fn insert_object(
        &self,
        session: SessionHandle,
        attributes: HashMap<Attribute, AttributeValue>,
        material: Vec<u8>,
    ) -> ObjectHandle {
        let persistent = attributes
            .get(&Attribute::Token)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(false);
        let handle = self.next_object.fetch_add(1, Ordering::Relaxed);
        let owner = (!persistent).then_some(session);
        self.objects.write().insert(
            handle,
            StoredObject {
                attributes,
                material,
                owner,
            },
        );
        handle
    }

    fn with_object<T>(
        &self,
        handle: ObjectHandle,
        f: impl FnOnce(&StoredObject) -> TokenResult<T>,
    ) -> TokenResult<T> {
        let objects = self.objects.read();
        let object = objects.get(&handle).ok_or_else(|| err(Status::HandleInvalid))?;
        f(object)
    }
}

impl Default for SoftToken {
    fn default() -> Self {
        Self::new()
    }
}

fn template_to_map(template: &AttributeTemplate) -> HashMap<Attribute, AttributeValue> {
    template
        .entries()
        .iter()
        .map(|(attribute, value)| (*attribute, value.clone()))
        .collect()
}

impl TokenBinding for SoftToken {
    fn slots(&self) -> TokenResult<Vec<RawSlotInfo>> {
        Ok(vec![RawSlotInfo {
            slot_id: SLOT_ID,
            description: pad_field("keyfob software token", 64),
            manufacturer_id: pad_field("keyfob", 32),
            hardware_version: RawVersion { major: 1, minor: 0 },
            firmware_version: RawVersion { major: 0, minor: 1 },
            flags: SlotFlags::TOKEN_PRESENT.bits(),
        }])
    }

    fn token_info(&self, slot: SlotId) -> TokenResult<RawTokenInfo> {
        if slot != SLOT_ID {
            return Err(err(Status::SlotIdInvalid));
        }
        Ok(RawTokenInfo {
            label: pad_field("keyfob-soft", 32),
            serial: b"KF000001".to_vec(),
            flags: (TokenFlags::RNG
                | TokenFlags::LOGIN_REQUIRED
                | TokenFlags::USER_PIN_INITIALIZED
                | TokenFlags::TOKEN_INITIALIZED)
                .bits(),
        })
    }

    fn mechanisms(&self, slot: SlotId) -> TokenResult<Vec<Mechanism>> {
        if slot != SLOT_ID {
            return Err(err(Status::SlotIdInvalid));
        }
        Ok(vec![
            Mechanism::AesKeyGen,
            Mechanism::AesGcm,
            Mechanism::Des2KeyGen,
            Mechanism::Des3KeyGen,
            Mechanism::GenericSecretKeyGen,
            Mechanism::Sha256Hmac,
            Mechanism::EcKeyPairGen,
            Mechanism::Ecdsa,
        ])
    }

    fn open_session(&self, slot: SlotId, rw: bool) -> TokenResult<SessionHandle> {
        if slot != SLOT_ID {
            return Err(err(Status::SlotIdInvalid));
        }
        let handle = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.sessions.write().insert(
            handle,
            SoftSession {
                rw,
                user: UserType::Nobody,
            },
        );
        debug!(handle, rw, "soft token opened session");
        Ok(handle)
    }

    fn close_session(&self, session: SessionHandle) -> TokenResult<()> {
        self.sessions
            .write()
            .remove(&session)
            .ok_or_else(|| err(Status::SessionHandleInvalid))?;
        // Session objects are invalidated with their session.
        self.objects
            .write()
            .retain(|_, object| object.owner != Some(session));
        Ok(())
    }

    fn login(&self, session: SessionHandle, user_type: UserType, pin: &str) -> TokenResult<()> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&session)
            .ok_or_else(|| err(Status::SessionHandleInvalid))?;
        if entry.user != UserType::Nobody {
            return Err(err(Status::UserAlreadyLoggedIn));
        }
        let expected = match user_type {
            UserType::User => &self.user_pin,
            UserType::SecurityOfficer => &self.so_pin,
            UserType::Nobody => return Err(err(Status::DeviceError)),
        };
        if pin != expected {
            return Err(err(Status::PinIncorrect));
        }
        entry.user = user_type;
        Ok(())
    }

    fn logout(&self, session: SessionHandle) -> TokenResult<()> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&session)
            .ok_or_else(|| err(Status::SessionHandleInvalid))?;
        entry.user = UserType::Nobody;
        Ok(())
    }

    fn get_attribute(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
        attribute: Attribute,
    ) -> TokenResult<Vec<u8>> {
        self.session(session)?;
        self.with_object(object, |stored| {
            if attribute == Attribute::Value {
                if stored.flag(Attribute::Sensitive) {
                    return Err(err(Status::AttributeSensitive));
                }
                return Ok(stored.material.clone());
            }
            stored
                .attributes
                .get(&attribute)
                .map(AttributeValue::to_raw)
                .ok_or_else(|| err(Status::AttributeTypeInvalid))
        })
    }

    fn set_attribute(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
        attribute: Attribute,
        raw: &[u8],
    ) -> TokenResult<()> {
        let session = self.session(session)?;
        if !session.rw {
            return Err(err(Status::SessionReadOnly));
        }
        let value = AttributeValue::from_raw(attribute.kind(), raw)
            .ok_or_else(|| err(Status::AttributeTypeInvalid))?;
        let mut objects = self.objects.write();
        let stored = objects
            .get_mut(&object)
            .ok_or_else(|| err(Status::HandleInvalid))?;
        let modifiable = stored
            .attributes
            .get(&Attribute::Modifiable)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(true);
        if !modifiable {
            return Err(err(Status::AttributeReadOnly));
        }
        stored.attributes.insert(attribute, value);
        Ok(())
    }

    fn generate_key(
        &self,
        session: SessionHandle,
        mechanism: Mechanism,
        _param: &[u8],
        template: &AttributeTemplate,
    ) -> TokenResult<ObjectHandle> {
        let info = self.session(session)?;
        let key_type = match Self::generation_key_type(mechanism) {
            Some(kt) if kt.is_symmetric() => kt,
            _ => return Err(err(Status::MechanismInvalid)),
        };
        let attributes = template_to_map(template);
        if let Some(requested) = attributes
            .get(&Attribute::KeyType)
            .and_then(AttributeValue::as_ulong)
        {
            if KeyType::from_ulong(requested) != Some(key_type) {
                return Err(err(Status::KeyTypeInconsistent));
            }
        }
        self.check_creation(&info, &attributes)?;
        let length = attributes
            .get(&Attribute::ValueLen)
            .and_then(AttributeValue::as_ulong)
            .ok_or_else(|| err(Status::TemplateIncomplete))? as usize;
        let valid = match key_type {
            // The software engine implements AES-256 only.
            KeyType::Aes => length == 32,
            KeyType::Des2 => length == 16,
            KeyType::Des3 => length == 24,
            KeyType::Generic => (1..=128).contains(&length),
            _ => false,
        };
        if !valid {
            return Err(err(Status::KeySizeRange));
        }
        let mut material = vec![0u8; length];
        OsRng.fill_bytes(&mut material);
        let handle = self.insert_object(session, attributes, material);
        debug!(handle, ?key_type, "soft token generated secret key");
        Ok(handle)
    }

    fn generate_key_pair(
        &self,
        session: SessionHandle,
        mechanism: Mechanism,
        _param: &[u8],
        public_template: &AttributeTemplate,
        private_template: &AttributeTemplate,
    ) -> TokenResult<(ObjectHandle, ObjectHandle)> {
        let info = self.session(session)?;
        if mechanism != Mechanism::EcKeyPairGen {
            return Err(err(Status::MechanismInvalid));
        }
        let public_attributes = template_to_map(public_template);
        let private_attributes = template_to_map(private_template);
        self.check_creation(&info, &public_attributes)?;
        self.check_creation(&info, &private_attributes)?;

        let signing = p256::ecdsa::SigningKey::random(&mut OsRng);
        let public_point = signing
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        let scalar = signing.to_bytes().to_vec();

        let public_handle = self.insert_object(session, public_attributes, public_point);
        let private_handle = self.insert_object(session, private_attributes, scalar);
        debug!(public_handle, private_handle, "soft token generated EC key pair");
        Ok((public_handle, private_handle))
    }

    fn destroy_object(&self, session: SessionHandle, object: ObjectHandle) -> TokenResult<()> {
        self.session(session)?;
        self.objects
            .write()
            .remove(&object)
            .map(|_| ())
            .ok_or_else(|| err(Status::HandleInvalid))
    }

    fn find_objects(
        &self,
        session: SessionHandle,
        template: &AttributeTemplate,
    ) -> TokenResult<Vec<ObjectHandle>> {
        self.session(session)?;
        let objects = self.objects.read();
        let mut handles: Vec<ObjectHandle> = objects
            .iter()
            .filter(|(_, object)| object.owner.is_none() || object.owner == Some(session))
            .filter(|(_, object)| object.matches(template))
            .map(|(handle, _)| *handle)
            .collect();
        handles.sort_unstable();
        Ok(handles)
    }

    fn crypto_operation(
        &self,
        kind: OpKind,
        session: SessionHandle,
        object: ObjectHandle,
        mechanism: Mechanism,
        param: &[u8],
        chunks: &[Vec<u8>],
    ) -> TokenResult<Vec<Vec<u8>>> {
        self.session(session)?;
        self.with_object(object, |stored| {
            if !stored.flag(Self::usage_attribute(kind)) {
                return Err(err(Status::KeyFunctionNotPermitted));
            }
            match (kind, mechanism) {
                (OpKind::Encrypt, Mechanism::AesGcm) => chunks
                    .iter()
                    .enumerate()
                    .map(|(index, chunk)| {
                        let nonce = crypto::chunk_nonce(param, index as u32);
                        crypto::gcm_encrypt_chunk(&stored.material, &nonce, chunk)
                    })
                    .collect(),
                (OpKind::Decrypt, Mechanism::AesGcm) => chunks
                    .iter()
                    .enumerate()
                    .map(|(index, chunk)| {
                        let nonce = crypto::chunk_nonce(param, index as u32);
                        crypto::gcm_decrypt_chunk(&stored.material, &nonce, chunk)
                    })
                    .collect(),
                (OpKind::Sign, Mechanism::Sha256Hmac) => {
                    Ok(vec![crypto::hmac_sign(&stored.material, chunks)?])
                }
                (OpKind::Sign, Mechanism::Ecdsa) => {
                    Ok(vec![crypto::ecdsa_sign(&stored.material, chunks)?])
                }
                _ => Err(err(Status::MechanismInvalid)),
            }
        })
    }

    fn verify_operation(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
        mechanism: Mechanism,
        _param: &[u8],
        chunks: &[Vec<u8>],
        signature: &[u8],
    ) -> TokenResult<()> {
        self.session(session)?;
        self.with_object(object, |stored| {
            if !stored.flag(Attribute::Verify) {
                return Err(err(Status::KeyFunctionNotPermitted));
            }
            match mechanism {
                Mechanism::Sha256Hmac => crypto::hmac_verify(&stored.material, chunks, signature),
                Mechanism::Ecdsa => crypto::ecdsa_verify(&stored.material, chunks, signature),
                _ => Err(err(Status::MechanismInvalid)),
            }
        })
    }

    fn wrap_key(
        &self,
        session: SessionHandle,
        wrapping: ObjectHandle,
        target: ObjectHandle,
        mechanism: Mechanism,
        param: &[u8],
    ) -> TokenResult<Vec<u8>> {
        self.session(session)?;
        if mechanism != Mechanism::AesGcm {
            return Err(err(Status::MechanismInvalid));
        }
        let objects = self.objects.read();
        let wrapping = objects
            .get(&wrapping)
            .ok_or_else(|| err(Status::HandleInvalid))?;
        if !wrapping.flag(Attribute::Wrap) {
            return Err(err(Status::KeyFunctionNotPermitted));
        }
        let target = objects
            .get(&target)
            .ok_or_else(|| err(Status::HandleInvalid))?;
        if !target.flag(Attribute::Extractable) {
            return Err(err(Status::KeyUnextractable));
        }
        let nonce = crypto::chunk_nonce(param, 0);
        crypto::gcm_encrypt_chunk(&wrapping.material, &nonce, &target.material)
    }

    fn unwrap_key(
        &self,
        session: SessionHandle,
        unwrapping: ObjectHandle,
        wrapped: &[u8],
        mechanism: Mechanism,
        param: &[u8],
        template: &AttributeTemplate,
    ) -> TokenResult<ObjectHandle> {
        let info = self.session(session)?;
        if mechanism != Mechanism::AesGcm {
            return Err(err(Status::MechanismInvalid));
        }
        let material = self.with_object(unwrapping, |stored| {
            if !stored.flag(Attribute::Unwrap) {
                return Err(err(Status::KeyFunctionNotPermitted));
            }
            let nonce = crypto::chunk_nonce(param, 0);
            crypto::gcm_decrypt_chunk(&stored.material, &nonce, wrapped)
        })?;
        let attributes = template_to_map(template);
        self.check_creation(&info, &attributes)?;
        Ok(self.insert_object(session, attributes, material))
    }
}
