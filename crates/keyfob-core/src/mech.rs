//! Key types, mechanisms and the generation default tables.

use serde::{Deserialize, Serialize};

use crate::flags::MechanismFlags;

/// Key type discriminant (PKCS#11 `CKK_*` numeric values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum KeyType {
    Rsa = 0x0000,
    Ec = 0x0003,
    Generic = 0x0010,
    Des2 = 0x0014,
    Des3 = 0x0015,
    Aes = 0x001f,
}

impl KeyType {
    pub fn from_ulong(value: u64) -> Option<Self> {
        match value {
            0x0000 => Some(KeyType::Rsa),
            0x0003 => Some(KeyType::Ec),
            0x0010 => Some(KeyType::Generic),
            0x0014 => Some(KeyType::Des2),
            0x0015 => Some(KeyType::Des3),
            0x001f => Some(KeyType::Aes),
            _ => None,
        }
    }

    /// True for key types generated as a single secret key rather than a
    /// public/private pair.
    pub fn is_symmetric(self) -> bool {
        matches!(
            self,
            KeyType::Aes | KeyType::Des2 | KeyType::Des3 | KeyType::Generic
        )
    }
}

/// Mechanism identifier (PKCS#11 `CKM_*` numeric values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum Mechanism {
    RsaPkcsKeyPairGen = 0x0000,
    RsaPkcs = 0x0001,
    Des2KeyGen = 0x0130,
    Des3KeyGen = 0x0131,
    Des3CbcPad = 0x0136,
    Sha256Hmac = 0x0251,
    GenericSecretKeyGen = 0x0350,
    EcKeyPairGen = 0x1040,
    Ecdsa = 0x1041,
    AesKeyGen = 0x1080,
    AesCbcPad = 0x1085,
    AesGcm = 0x1087,
}

impl Mechanism {
    /// True for mechanisms that create key material rather than transform
    /// data.
    pub fn is_generation(self) -> bool {
        matches!(
            self,
            Mechanism::AesKeyGen
                | Mechanism::Des2KeyGen
                | Mechanism::Des3KeyGen
                | Mechanism::GenericSecretKeyGen
                | Mechanism::RsaPkcsKeyPairGen
                | Mechanism::EcKeyPairGen
        )
    }
}

/// Default generation mechanism per key type.
///
/// Used by `Session::generate_key`/`generate_keypair` when the caller does
/// not name a mechanism explicitly.
pub fn default_generate_mechanism(key_type: KeyType) -> Option<Mechanism> {
    match key_type {
        KeyType::Aes => Some(Mechanism::AesKeyGen),
        KeyType::Des2 => Some(Mechanism::Des2KeyGen),
        KeyType::Des3 => Some(Mechanism::Des3KeyGen),
        KeyType::Generic => Some(Mechanism::GenericSecretKeyGen),
        KeyType::Rsa => Some(Mechanism::RsaPkcsKeyPairGen),
        KeyType::Ec => Some(Mechanism::EcKeyPairGen),
    }
}

/// Default capability set for a generated secret key.
pub fn default_key_capabilities(key_type: KeyType) -> Option<MechanismFlags> {
    match key_type {
        KeyType::Aes | KeyType::Des2 | KeyType::Des3 => Some(
            MechanismFlags::ENCRYPT
                | MechanismFlags::DECRYPT
                | MechanismFlags::WRAP
                | MechanismFlags::UNWRAP,
        ),
        KeyType::Generic => Some(MechanismFlags::SIGN | MechanismFlags::VERIFY),
        KeyType::Rsa | KeyType::Ec => None,
    }
}

/// Default capability set for the public half of a generated key pair.
pub fn default_public_key_capabilities(key_type: KeyType) -> Option<MechanismFlags> {
    match key_type {
        KeyType::Rsa => {
            Some(MechanismFlags::ENCRYPT | MechanismFlags::VERIFY | MechanismFlags::WRAP)
        }
        KeyType::Ec => Some(MechanismFlags::VERIFY),
        _ => None,
    }
}

/// Default capability set for the private half of a generated key pair.
pub fn default_private_key_capabilities(key_type: KeyType) -> Option<MechanismFlags> {
    match key_type {
        KeyType::Rsa => {
            Some(MechanismFlags::DECRYPT | MechanismFlags::SIGN | MechanismFlags::UNWRAP)
        }
        KeyType::Ec => Some(MechanismFlags::SIGN | MechanismFlags::DERIVE),
        _ => None,
    }
}

/// Default mechanism for data operations (encrypt/decrypt/sign/verify/wrap)
/// when the caller supplies none. Resolution happens at call time against
/// the key's current `KeyType` attribute, per key type.
pub fn default_operation_mechanism(key_type: KeyType) -> Option<Mechanism> {
    match key_type {
        KeyType::Aes => Some(Mechanism::AesGcm),
        KeyType::Des3 => Some(Mechanism::Des3CbcPad),
        KeyType::Generic => Some(Mechanism::Sha256Hmac),
        KeyType::Rsa => Some(Mechanism::RsaPkcs),
        KeyType::Ec => Some(Mechanism::Ecdsa),
        KeyType::Des2 => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes_defaults() {
        assert_eq!(
            default_generate_mechanism(KeyType::Aes),
            Some(Mechanism::AesKeyGen)
        );
        assert_eq!(
            default_key_capabilities(KeyType::Aes),
            Some(
                MechanismFlags::ENCRYPT
                    | MechanismFlags::DECRYPT
                    | MechanismFlags::WRAP
                    | MechanismFlags::UNWRAP
            )
        );
        assert_eq!(
            default_operation_mechanism(KeyType::Aes),
            Some(Mechanism::AesGcm)
        );
    }

    #[test]
    fn des3_defaults() {
        assert_eq!(
            default_generate_mechanism(KeyType::Des3),
            Some(Mechanism::Des3KeyGen)
        );
        assert_eq!(
            default_key_capabilities(KeyType::Des3),
            Some(
                MechanismFlags::ENCRYPT
                    | MechanismFlags::DECRYPT
                    | MechanismFlags::WRAP
                    | MechanismFlags::UNWRAP
            )
        );
    }

    #[test]
    fn generic_secret_defaults_to_hmac() {
        assert_eq!(
            default_generate_mechanism(KeyType::Generic),
            Some(Mechanism::GenericSecretKeyGen)
        );
        assert_eq!(
            default_key_capabilities(KeyType::Generic),
            Some(MechanismFlags::SIGN | MechanismFlags::VERIFY)
        );
        assert_eq!(
            default_operation_mechanism(KeyType::Generic),
            Some(Mechanism::Sha256Hmac)
        );
    }

    #[test]
    fn asymmetric_defaults_differ_per_half() {
        assert_eq!(
            default_generate_mechanism(KeyType::Ec),
            Some(Mechanism::EcKeyPairGen)
        );
        assert_eq!(default_key_capabilities(KeyType::Ec), None);
        assert_eq!(
            default_public_key_capabilities(KeyType::Ec),
            Some(MechanismFlags::VERIFY)
        );
        assert_eq!(
            default_private_key_capabilities(KeyType::Ec),
            Some(MechanismFlags::SIGN | MechanismFlags::DERIVE)
        );
        assert_eq!(
            default_public_key_capabilities(KeyType::Rsa),
            Some(MechanismFlags::ENCRYPT | MechanismFlags::VERIFY | MechanismFlags::WRAP)
        );
        assert_eq!(
            default_private_key_capabilities(KeyType::Rsa),
            Some(MechanismFlags::DECRYPT | MechanismFlags::SIGN | MechanismFlags::UNWRAP)
        );
    }

    #[test]
    fn key_type_discriminant_round_trip() {
        for kt in [
            KeyType::Rsa,
            KeyType::Ec,
            KeyType::Generic,
            KeyType::Des2,
            KeyType::Des3,
            KeyType::Aes,
        ] {
            assert_eq!(KeyType::from_ulong(kt as u64), Some(kt));
        }
        assert_eq!(KeyType::from_ulong(0xdead), None);
    }
}
