//! Composable capability traits for key objects.
//!
//! Each capability (encrypt, decrypt, sign, verify, wrap, unwrap) is a trait
//! with default methods layered over a single raw seam. Which traits a key
//! variant implements is a static property of the variant; whether a given
//! *instance* may actually use one is the capability flag set recorded at
//! construction, checked locally before any binding call.

use serde::{Deserialize, Serialize};

use crate::attr::Attribute;
use crate::binding::ObjectHandle;
use crate::error::{TokenError, TokenResult};
use crate::flags::MechanismFlags;
use crate::mech::{default_key_capabilities, default_operation_mechanism, KeyType, Mechanism};
use crate::object::{Object, ObjectClass, PrivateKey, PublicKey, SecretKey};
use crate::session::{secret_key_template, KeySpec};

/// The kind of a cryptographic data operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    Wrap,
    Unwrap,
}

impl OpKind {
    /// The capability flag an object must carry to perform this operation.
    pub fn required_flag(self) -> MechanismFlags {
        match self {
            OpKind::Encrypt => MechanismFlags::ENCRYPT,
            OpKind::Decrypt => MechanismFlags::DECRYPT,
            OpKind::Sign => MechanismFlags::SIGN,
            OpKind::Verify => MechanismFlags::VERIFY,
            OpKind::Wrap => MechanismFlags::WRAP,
            OpKind::Unwrap => MechanismFlags::UNWRAP,
        }
    }
}

/// Caller input to a data operation, before normalization.
///
/// Text encodes to UTF-8 bytes. A contiguous buffer becomes a single-chunk
/// sequence whose outputs are concatenated back into one buffer. A chunk
/// sequence passes through untouched, preserving streaming boundaries.
#[derive(Debug, Clone)]
pub enum CryptoInput {
    Text(String),
    Bytes(Vec<u8>),
    Chunks(Vec<Vec<u8>>),
}

impl CryptoInput {
    pub(crate) fn into_chunks(self) -> Vec<Vec<u8>> {
        match self {
            CryptoInput::Text(text) => vec![text.into_bytes()],
            CryptoInput::Bytes(bytes) => vec![bytes],
            CryptoInput::Chunks(chunks) => chunks,
        }
    }
}

impl From<&str> for CryptoInput {
    fn from(value: &str) -> Self {
        CryptoInput::Text(value.to_string())
    }
}

impl From<String> for CryptoInput {
    fn from(value: String) -> Self {
        CryptoInput::Text(value)
    }
}

impl From<&[u8]> for CryptoInput {
    fn from(value: &[u8]) -> Self {
        CryptoInput::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for CryptoInput {
    fn from(value: &[u8; N]) -> Self {
        CryptoInput::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for CryptoInput {
    fn from(value: Vec<u8>) -> Self {
        CryptoInput::Bytes(value)
    }
}

impl From<Vec<Vec<u8>>> for CryptoInput {
    fn from(value: Vec<Vec<u8>>) -> Self {
        CryptoInput::Chunks(value)
    }
}

/// Per-call operation parameters: an optional mechanism override and the
/// mechanism parameter bytes (typically an IV or nonce). Absent a mechanism,
/// the key type's default operation mechanism applies.
#[derive(Debug, Clone, Default)]
pub struct OpParams {
    pub mechanism: Option<Mechanism>,
    pub param: Vec<u8>,
}

impl OpParams {
    pub fn mechanism(mechanism: Mechanism) -> Self {
        Self {
            mechanism: Some(mechanism),
            param: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<Vec<u8>>) -> Self {
        self.param = param.into();
        self
    }
}

/// The raw seam every capability trait dispatches through. Implemented by
/// the key variants; not meant to be called directly.
pub trait RawOperations {
    fn raw_operation(
        &self,
        kind: OpKind,
        chunks: &[Vec<u8>],
        params: &OpParams,
    ) -> TokenResult<Vec<Vec<u8>>>;

    fn raw_verify(
        &self,
        chunks: &[Vec<u8>],
        signature: &[u8],
        params: &OpParams,
    ) -> TokenResult<()>;

    fn raw_wrap(&self, target: ObjectHandle, params: &OpParams) -> TokenResult<Vec<u8>>;

    fn raw_unwrap(
        &self,
        wrapped: &[u8],
        params: &OpParams,
        template: &crate::attr::AttributeTemplate,
    ) -> TokenResult<ObjectHandle>;
}

/// Shared dispatch: session-state check, local capability check, mechanism
/// resolution, then the binding call. The capability check runs before the
/// (token-visiting) key-type lookup so a missing capability never reaches
/// the token.
fn prepare(
    object: &Object<'_>,
    capabilities: MechanismFlags,
    kind: OpKind,
    params: &OpParams,
) -> TokenResult<Mechanism> {
    object.session().ensure_open()?;
    if !capabilities.contains(kind.required_flag()) {
        return Err(TokenError::CapabilityMissing { op: kind });
    }
    match params.mechanism {
        Some(mechanism) => Ok(mechanism),
        None => {
            let key_type = object
                .get(Attribute::KeyType)?
                .as_ulong()
                .and_then(KeyType::from_ulong)
                .ok_or(TokenError::InvalidAttribute {
                    attribute: Attribute::KeyType,
                    expected: crate::attr::AttributeKind::Ulong,
                })?;
            default_operation_mechanism(key_type).ok_or(TokenError::UnsupportedKeyType(key_type))
        }
    }
}

fn perform(
    object: &Object<'_>,
    capabilities: MechanismFlags,
    kind: OpKind,
    chunks: &[Vec<u8>],
    params: &OpParams,
) -> TokenResult<Vec<Vec<u8>>> {
    let mechanism = prepare(object, capabilities, kind, params)?;
    let session = object.session();
    session.binding().crypto_operation(
        kind,
        session.handle(),
        object.handle(),
        mechanism,
        &params.param,
        chunks,
    )
}

fn perform_verify(
    object: &Object<'_>,
    capabilities: MechanismFlags,
    chunks: &[Vec<u8>],
    signature: &[u8],
    params: &OpParams,
) -> TokenResult<()> {
    let mechanism = prepare(object, capabilities, OpKind::Verify, params)?;
    let session = object.session();
    session.binding().verify_operation(
        session.handle(),
        object.handle(),
        mechanism,
        &params.param,
        chunks,
        signature,
    )
}

fn perform_wrap(
    object: &Object<'_>,
    capabilities: MechanismFlags,
    target: ObjectHandle,
    params: &OpParams,
) -> TokenResult<Vec<u8>> {
    let mechanism = prepare(object, capabilities, OpKind::Wrap, params)?;
    let session = object.session();
    session.binding().wrap_key(
        session.handle(),
        object.handle(),
        target,
        mechanism,
        &params.param,
    )
}

fn perform_unwrap(
    object: &Object<'_>,
    capabilities: MechanismFlags,
    wrapped: &[u8],
    params: &OpParams,
    template: &crate::attr::AttributeTemplate,
) -> TokenResult<ObjectHandle> {
    let mechanism = prepare(object, capabilities, OpKind::Unwrap, params)?;
    let session = object.session();
    session.binding().unwrap_key(
        session.handle(),
        object.handle(),
        wrapped,
        mechanism,
        &params.param,
        template,
    )
}

macro_rules! raw_operations {
    ($name:ident) => {
        impl RawOperations for $name<'_> {
            fn raw_operation(
                &self,
                kind: OpKind,
                chunks: &[Vec<u8>],
                params: &OpParams,
            ) -> TokenResult<Vec<Vec<u8>>> {
                perform(self.object(), self.capabilities(), kind, chunks, params)
            }

            fn raw_verify(
                &self,
                chunks: &[Vec<u8>],
                signature: &[u8],
                params: &OpParams,
            ) -> TokenResult<()> {
                perform_verify(self.object(), self.capabilities(), chunks, signature, params)
            }

            fn raw_wrap(&self, target: ObjectHandle, params: &OpParams) -> TokenResult<Vec<u8>> {
                perform_wrap(self.object(), self.capabilities(), target, params)
            }

            fn raw_unwrap(
                &self,
                wrapped: &[u8],
                params: &OpParams,
                template: &crate::attr::AttributeTemplate,
            ) -> TokenResult<ObjectHandle> {
                perform_unwrap(self.object(), self.capabilities(), wrapped, params, template)
            }
        }
    };
}

raw_operations!(SecretKey);
raw_operations!(PublicKey);
raw_operations!(PrivateKey);

/// Encryption capability.
pub trait Encrypt: RawOperations {
    /// Single-shot encryption: text and contiguous buffers are normalized
    /// into one chunk and the output chunks are concatenated.
    fn encrypt(&self, data: impl Into<CryptoInput>, params: &OpParams) -> TokenResult<Vec<u8>> {
        let chunks = data.into().into_chunks();
        Ok(self
            .raw_operation(OpKind::Encrypt, &chunks, params)?
            .concat())
    }

    /// Streaming encryption: one output chunk per input chunk.
    fn encrypt_chunks(
        &self,
        chunks: &[Vec<u8>],
        params: &OpParams,
    ) -> TokenResult<Vec<Vec<u8>>> {
        self.raw_operation(OpKind::Encrypt, chunks, params)
    }
}

/// Decryption capability.
pub trait Decrypt: RawOperations {
    fn decrypt(&self, data: impl Into<CryptoInput>, params: &OpParams) -> TokenResult<Vec<u8>> {
        let chunks = data.into().into_chunks();
        Ok(self
            .raw_operation(OpKind::Decrypt, &chunks, params)?
            .concat())
    }

    fn decrypt_chunks(
        &self,
        chunks: &[Vec<u8>],
        params: &OpParams,
    ) -> TokenResult<Vec<Vec<u8>>> {
        self.raw_operation(OpKind::Decrypt, chunks, params)
    }
}

/// Signing capability. Input may stream; the signature is always a single
/// buffer.
pub trait Sign: RawOperations {
    fn sign(&self, data: impl Into<CryptoInput>, params: &OpParams) -> TokenResult<Vec<u8>> {
        let chunks = data.into().into_chunks();
        Ok(self.raw_operation(OpKind::Sign, &chunks, params)?.concat())
    }
}

/// Signature verification capability.
pub trait Verify: RawOperations {
    /// Succeeds when the signature matches; a mismatch surfaces as
    /// [`crate::Status::SignatureInvalid`].
    fn verify(
        &self,
        data: impl Into<CryptoInput>,
        signature: &[u8],
        params: &OpParams,
    ) -> TokenResult<()> {
        let chunks = data.into().into_chunks();
        self.raw_verify(&chunks, signature, params)
    }
}

/// Key wrapping capability.
pub trait Wrap: RawOperations {
    fn wrap_key(&self, key: &SecretKey<'_>, params: &OpParams) -> TokenResult<Vec<u8>> {
        self.raw_wrap(key.handle(), params)
    }
}

/// Key unwrapping capability. Lifetime-bound: the unwrapped key belongs to
/// the same session as the unwrapping key.
pub trait Unwrap<'s>: RawOperations {
    fn unwrap_key(
        &self,
        wrapped: &[u8],
        key_type: KeyType,
        spec: &KeySpec,
        params: &OpParams,
    ) -> TokenResult<SecretKey<'s>>;
}

fn unwrap_into_secret_key<'s>(
    object: &Object<'s>,
    capabilities: MechanismFlags,
    wrapped: &[u8],
    key_type: KeyType,
    spec: &KeySpec,
    params: &OpParams,
) -> TokenResult<SecretKey<'s>> {
    let key_capabilities = match spec.capabilities {
        Some(capabilities) => capabilities,
        None => {
            default_key_capabilities(key_type).ok_or(TokenError::UnsupportedKeyType(key_type))?
        }
    };
    let template = secret_key_template(key_type, None, key_capabilities, spec);
    object.session().check_private_requires_login(&template)?;
    let handle = perform_unwrap(object, capabilities, wrapped, params, &template)?;
    Ok(SecretKey::new(
        Object::new(object.session(), handle, ObjectClass::SecretKey),
        key_capabilities,
    ))
}

impl Encrypt for SecretKey<'_> {}
impl Decrypt for SecretKey<'_> {}
impl Sign for SecretKey<'_> {}
impl Verify for SecretKey<'_> {}
impl Wrap for SecretKey<'_> {}

impl<'s> Unwrap<'s> for SecretKey<'s> {
    fn unwrap_key(
        &self,
        wrapped: &[u8],
        key_type: KeyType,
        spec: &KeySpec,
        params: &OpParams,
    ) -> TokenResult<SecretKey<'s>> {
        unwrap_into_secret_key(
            self.object(),
            self.capabilities(),
            wrapped,
            key_type,
            spec,
            params,
        )
    }
}

impl Encrypt for PublicKey<'_> {}
impl Verify for PublicKey<'_> {}
impl Wrap for PublicKey<'_> {}

impl Decrypt for PrivateKey<'_> {}
impl Sign for PrivateKey<'_> {}

impl<'s> Unwrap<'s> for PrivateKey<'s> {
    fn unwrap_key(
        &self,
        wrapped: &[u8],
        key_type: KeyType,
        spec: &KeySpec,
        params: &OpParams,
    ) -> TokenResult<SecretKey<'s>> {
        unwrap_into_secret_key(
            self.object(),
            self.capabilities(),
            wrapped,
            key_type,
            spec,
            params,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_input_encodes_utf8() {
        let chunks = CryptoInput::from("héllo").into_chunks();
        assert_eq!(chunks, vec!["héllo".as_bytes().to_vec()]);
    }

    #[test]
    fn contiguous_buffer_becomes_single_chunk() {
        let chunks = CryptoInput::from(vec![1u8, 2, 3]).into_chunks();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunk_sequence_passes_through() {
        let input = vec![vec![1u8], vec![2, 3]];
        let chunks = CryptoInput::from(input.clone()).into_chunks();
        assert_eq!(chunks, input);
    }

    #[test]
    fn op_kind_maps_to_required_flag() {
        assert_eq!(OpKind::Encrypt.required_flag(), MechanismFlags::ENCRYPT);
        assert_eq!(OpKind::Unwrap.required_flag(), MechanismFlags::UNWRAP);
    }
}
