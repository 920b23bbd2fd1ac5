//! Data operations through the capability traits, backed by the software
//! token: encryption round trips, streaming chunk behavior, signatures and
//! key wrapping.

use std::sync::Arc;

use keyfob_core::ops::{Decrypt, Encrypt, Sign, Unwrap, Verify, Wrap};
use keyfob_core::{
    enumerate_slots, Attribute, AttributeTemplate, AttributeValue, KeyPairSpec, KeySpec, KeyType,
    MechanismFlags, OpParams, Session, Status, TokenBinding, TokenError, UserType,
};
use keyfob_soft::SoftToken;

fn logged_in_session() -> Session {
    let binding: Arc<dyn TokenBinding> = Arc::new(SoftToken::new());
    let slot = enumerate_slots(binding).unwrap().remove(0);
    let session = slot.token().unwrap().open(true).unwrap();
    session.login(UserType::User, "1234").unwrap();
    session
}

#[test]
fn aes_encrypt_decrypt_round_trip() {
    let session = logged_in_session();
    let key = session
        .generate_key(KeyType::Aes, 256, &KeySpec::labelled("test"))
        .unwrap();
    assert_eq!(key.key_type().unwrap(), KeyType::Aes);
    assert!(key
        .capabilities()
        .contains(MechanismFlags::ENCRYPT | MechanismFlags::DECRYPT));

    let params = OpParams::default().with_param(*b"000102030405");
    let ciphertext = key.encrypt(b"hello world", &params).unwrap();
    assert_ne!(ciphertext, b"hello world");
    assert_eq!(key.decrypt(ciphertext, &params).unwrap(), b"hello world");
}

#[test]
fn text_input_encrypts_as_utf8() {
    let session = logged_in_session();
    let key = session
        .generate_key(KeyType::Aes, 256, &KeySpec::labelled("text"))
        .unwrap();
    let params = OpParams::default().with_param(*b"iv");

    let ciphertext = key.encrypt("grüße", &params).unwrap();
    assert_eq!(key.decrypt(ciphertext, &params).unwrap(), "grüße".as_bytes());
}

#[test]
fn streaming_preserves_chunk_boundaries() {
    let session = logged_in_session();
    let key = session
        .generate_key(KeyType::Aes, 256, &KeySpec::labelled("stream"))
        .unwrap();
    let params = OpParams::default().with_param(*b"stream-iv");

    let chunks = vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()];
    let encrypted = key.encrypt_chunks(&chunks, &params).unwrap();
    assert_eq!(encrypted.len(), chunks.len());

    let decrypted = key.decrypt_chunks(&encrypted, &params).unwrap();
    assert_eq!(decrypted, chunks);
}

#[test]
fn single_shot_equals_one_chunk_stream() {
    let session = logged_in_session();
    let key = session
        .generate_key(KeyType::Aes, 256, &KeySpec::labelled("equiv"))
        .unwrap();
    let params = OpParams::default().with_param(*b"fixed-iv");

    let buffer = b"one contiguous buffer".to_vec();
    let single = key.encrypt(buffer.clone(), &params).unwrap();
    let streamed = key.encrypt_chunks(&[buffer], &params).unwrap().concat();
    assert_eq!(single, streamed);
}

#[test]
fn tampered_ciphertext_is_rejected() {
    let session = logged_in_session();
    let key = session
        .generate_key(KeyType::Aes, 256, &KeySpec::labelled("tamper"))
        .unwrap();
    let params = OpParams::default().with_param(*b"iv");

    let mut ciphertext = key.encrypt(b"payload", &params).unwrap();
    ciphertext[0] ^= 1;
    let err = key.decrypt(ciphertext, &params).unwrap_err();
    assert!(matches!(
        err,
        TokenError::Operation(Status::EncryptedDataInvalid)
    ));
}

#[test]
fn hmac_sign_and_verify() {
    let session = logged_in_session();
    let key = session
        .generate_key(KeyType::Generic, 256, &KeySpec::labelled("mac"))
        .unwrap();
    assert!(key
        .capabilities()
        .contains(MechanismFlags::SIGN | MechanismFlags::VERIFY));

    let params = OpParams::default();
    let signature = key.sign(b"signed message", &params).unwrap();
    key.verify(b"signed message", &signature, &params).unwrap();

    let err = key
        .verify(b"another message", &signature, &params)
        .unwrap_err();
    assert!(matches!(
        err,
        TokenError::Operation(Status::SignatureInvalid)
    ));
}

#[test]
fn hmac_signature_covers_all_chunks() {
    let session = logged_in_session();
    let key = session
        .generate_key(KeyType::Generic, 256, &KeySpec::labelled("mac-stream"))
        .unwrap();
    let params = OpParams::default();

    let chunks = vec![b"part one ".to_vec(), b"part two".to_vec()];
    let streamed = key.sign(chunks, &params).unwrap();
    let single = key.sign(b"part one part two", &params).unwrap();
    assert_eq!(streamed, single);
}

#[test]
fn ecdsa_keypair_sign_and_verify() {
    let session = logged_in_session();
    let (public, private) = session
        .generate_keypair(KeyType::Ec, &KeyPairSpec::labelled("signer"))
        .unwrap();
    assert!(private.capabilities().contains(MechanismFlags::SIGN));
    assert!(public.capabilities().contains(MechanismFlags::VERIFY));

    let params = OpParams::default();
    let signature = private.sign(b"attested data", &params).unwrap();
    public.verify(b"attested data", &signature, &params).unwrap();

    let err = public
        .verify(b"forged data", &signature, &params)
        .unwrap_err();
    assert!(matches!(
        err,
        TokenError::Operation(Status::SignatureInvalid)
    ));
}

#[test]
fn wrap_and_unwrap_round_trip() {
    let session = logged_in_session();
    let wrapping = session
        .generate_key(KeyType::Aes, 256, &KeySpec::labelled("kek"))
        .unwrap();
    let extractable = KeySpec::labelled("payload-key").with_template(
        AttributeTemplate::new().with(Attribute::Extractable, AttributeValue::Bool(true)),
    );
    let target = session
        .generate_key(KeyType::Aes, 256, &extractable)
        .unwrap();

    let data_params = OpParams::default().with_param(*b"data-iv");
    let ciphertext = target.encrypt(b"wrapped payload", &data_params).unwrap();

    let wrap_params = OpParams::default().with_param(*b"wrap-iv");
    let wrapped = wrapping.wrap_key(&target, &wrap_params).unwrap();
    let unwrapped = wrapping
        .unwrap_key(
            &wrapped,
            KeyType::Aes,
            &KeySpec::labelled("recovered"),
            &wrap_params,
        )
        .unwrap();

    assert_eq!(
        unwrapped.decrypt(ciphertext, &data_params).unwrap(),
        b"wrapped payload"
    );
}

#[test]
fn unextractable_keys_cannot_be_wrapped() {
    let session = logged_in_session();
    let wrapping = session
        .generate_key(KeyType::Aes, 256, &KeySpec::labelled("kek"))
        .unwrap();
    // The default template marks keys unextractable.
    let target = session
        .generate_key(KeyType::Aes, 256, &KeySpec::labelled("locked"))
        .unwrap();

    let err = wrapping
        .wrap_key(&target, &OpParams::default())
        .unwrap_err();
    assert!(matches!(
        err,
        TokenError::Operation(Status::KeyUnextractable)
    ));
}

#[test]
fn token_enforces_usage_attributes() {
    let session = logged_in_session();
    // Capabilities claim decrypt support but the template disables the
    // usage attribute, so the token itself must refuse.
    let mut spec = KeySpec::labelled("mismatched");
    spec.capabilities = Some(MechanismFlags::ENCRYPT | MechanismFlags::DECRYPT);
    spec.template =
        AttributeTemplate::new().with(Attribute::Decrypt, AttributeValue::Bool(false));
    let key = session.generate_key(KeyType::Aes, 256, &spec).unwrap();

    let params = OpParams::default().with_param(*b"iv");
    let ciphertext = key.encrypt(b"data", &params).unwrap();
    let err = key.decrypt(ciphertext, &params).unwrap_err();
    assert!(matches!(
        err,
        TokenError::Operation(Status::KeyFunctionNotPermitted)
    ));
}
