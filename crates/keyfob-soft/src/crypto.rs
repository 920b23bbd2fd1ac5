//! Cryptographic primitives backing the software token.
//!
//! AES-256-GCM for encryption and key wrapping, HMAC-SHA-256 for secret-key
//! signatures, ECDSA over P-256 for key pairs.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use hmac::{Hmac, Mac};
use keyfob_core::{Status, TokenError, TokenResult};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Derive the nonce for chunk `index` of a streaming operation: the
/// mechanism parameter (zero-padded to 96 bits) with the chunk counter
/// folded into the tail, so every chunk in a stream gets a distinct nonce
/// while the derivation stays deterministic per (param, index).
pub(crate) fn chunk_nonce(param: &[u8], index: u32) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    let len = param.len().min(12);
    nonce[..len].copy_from_slice(&param[..len]);
    for (slot, byte) in nonce[8..].iter_mut().zip(index.to_be_bytes()) {
        *slot ^= byte;
    }
    nonce
}

pub(crate) fn gcm_encrypt_chunk(
    key: &[u8],
    nonce: &[u8; 12],
    chunk: &[u8],
) -> TokenResult<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|_| TokenError::Operation(Status::KeySizeRange))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), chunk)
        .map_err(|_| TokenError::Operation(Status::DeviceError))
}

pub(crate) fn gcm_decrypt_chunk(
    key: &[u8],
    nonce: &[u8; 12],
    chunk: &[u8],
) -> TokenResult<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|_| TokenError::Operation(Status::KeySizeRange))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), chunk)
        .map_err(|_| TokenError::Operation(Status::EncryptedDataInvalid))
}

pub(crate) fn hmac_sign(key: &[u8], chunks: &[Vec<u8>]) -> TokenResult<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|_| TokenError::Operation(Status::KeySizeRange))?;
    for chunk in chunks {
        mac.update(chunk);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

pub(crate) fn hmac_verify(key: &[u8], chunks: &[Vec<u8>], signature: &[u8]) -> TokenResult<()> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|_| TokenError::Operation(Status::KeySizeRange))?;
    for chunk in chunks {
        mac.update(chunk);
    }
    mac.verify_slice(signature)
        .map_err(|_| TokenError::Operation(Status::SignatureInvalid))
}

pub(crate) fn ecdsa_sign(scalar: &[u8], chunks: &[Vec<u8>]) -> TokenResult<Vec<u8>> {
    let key = SigningKey::from_slice(scalar)
        .map_err(|_| TokenError::Operation(Status::KeySizeRange))?;
    let message: Vec<u8> = chunks.concat();
    let signature: Signature = key.sign(&message);
    Ok(signature.to_vec())
}

pub(crate) fn ecdsa_verify(
    sec1_point: &[u8],
    chunks: &[Vec<u8>],
    signature: &[u8],
) -> TokenResult<()> {
    let key = VerifyingKey::from_sec1_bytes(sec1_point)
        .map_err(|_| TokenError::Operation(Status::DeviceError))?;
    let signature = Signature::from_slice(signature)
        .map_err(|_| TokenError::Operation(Status::SignatureInvalid))?;
    let message: Vec<u8> = chunks.concat();
    key.verify(&message, &signature)
        .map_err(|_| TokenError::Operation(Status::SignatureInvalid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_differ_per_chunk_index() {
        let param = [7u8; 12];
        assert_ne!(chunk_nonce(&param, 0), chunk_nonce(&param, 1));
        assert_eq!(chunk_nonce(&param, 3), chunk_nonce(&param, 3));
    }

    #[test]
    fn gcm_round_trip() {
        let key = [0x42u8; 32];
        let nonce = chunk_nonce(b"iv", 0);
        let ciphertext = gcm_encrypt_chunk(&key, &nonce, b"payload").unwrap();
        assert_ne!(ciphertext, b"payload");
        let plaintext = gcm_decrypt_chunk(&key, &nonce, &ciphertext).unwrap();
        assert_eq!(plaintext, b"payload");
    }

    #[test]
    fn gcm_rejects_tampered_ciphertext() {
        let key = [0x42u8; 32];
        let nonce = chunk_nonce(&[], 0);
        let mut ciphertext = gcm_encrypt_chunk(&key, &nonce, b"payload").unwrap();
        ciphertext[0] ^= 1;
        let err = gcm_decrypt_chunk(&key, &nonce, &ciphertext).unwrap_err();
        assert!(matches!(
            err,
            TokenError::Operation(Status::EncryptedDataInvalid)
        ));
    }

    #[test]
    fn hmac_sign_and_verify() {
        let key = [9u8; 32];
        let chunks = vec![b"part one ".to_vec(), b"part two".to_vec()];
        let signature = hmac_sign(&key, &chunks).unwrap();
        hmac_verify(&key, &chunks, &signature).unwrap();
        assert!(hmac_verify(&key, &chunks, &[0u8; 32]).is_err());
    }
}
