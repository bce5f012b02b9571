//! X25519 key encapsulation and HKDF-SHA256 key derivation.
//!
//! One scalar multiplication and one HKDF per seal or open. The HKDF info
//! string binds the suite, namespace, ephemeral public key, and recipient
//! public key, so any disagreement between peers surfaces as a decryption
//! failure rather than silent key reuse. The ephemeral scalar, shared
//! secret, and derived material are all zeroized on drop.

use crate::errors::{HpkeError, Result};
use crate::utils::b64url_encode;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// KEM identifier on the envelope wire.
pub const KEM_NAME: &str = "X25519";

/// KDF identifier on the envelope wire and in the HKDF info string.
pub const KDF_NAME: &str = "HKDF-SHA256";

/// AEAD identifier on the envelope wire and in the HKDF info string.
pub const AEAD_NAME: &str = "CHACHA20-POLY1305";

/// Full suite identifier on the envelope wire.
pub const SUITE_NAME: &str = "X25519-HKDF-SHA256-CHACHA20POLY1305";

/// AEAD key and nonce derived for one envelope, zeroized on drop.
#[derive(Debug)]
pub struct DerivedKeys {
    /// 32-byte ChaCha20-Poly1305 key
    pub key: Zeroizing<[u8; 32]>,

    /// 12-byte IETF nonce
    pub nonce: Zeroizing<[u8; 12]>,
}

/// Seal-side encapsulation result.
#[derive(Debug)]
pub struct Encapsulated {
    /// Ephemeral public key to place in the envelope `enc` field
    pub enc: [u8; 32],

    /// Derived AEAD key and nonce
    pub keys: DerivedKeys,
}

/// Renders the HKDF info string for this suite.
///
/// The format is fixed; any deviation breaks interoperability:
/// `x402-hpke:v1|KDF=HKDF-SHA256|AEAD=CHACHA20-POLY1305|ns=<NS>|enc=<ENC>|pkR=<PKR>`
/// with `enc` and `pkR` base64url-encoded without padding.
pub fn hkdf_info(ns: &str, enc_b64: &str, pkr_b64: &str) -> String {
    format!(
        "x402-hpke:v1|KDF={}|AEAD={}|ns={}|enc={}|pkR={}",
        KDF_NAME, AEAD_NAME, ns, enc_b64, pkr_b64
    )
}

/// Encapsulates to a recipient public key, deriving the envelope AEAD key
/// and nonce.
///
/// A fresh ephemeral key is generated per call (or derived from `seed` for
/// known-answer tests) and discarded on return. All-zero recipient keys and
/// all-zero shared secrets are rejected as low-order results.
pub fn encapsulate(
    recipient_pk: &[u8; 32],
    ns: &str,
    seed: Option<&[u8; 32]>,
) -> Result<Encapsulated> {
    if recipient_pk == &[0u8; 32] {
        return Err(HpkeError::EcdhLowOrder);
    }

    let ephemeral = match seed {
        Some(seed) => StaticSecret::from(*seed),
        None => StaticSecret::random_from_rng(OsRng),
    };
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient_pk));
    if shared.as_bytes() == &[0u8; 32] {
        return Err(HpkeError::EcdhLowOrder);
    }

    let enc = *ephemeral_public.as_bytes();
    let enc_b64 = b64url_encode(enc);
    let pkr_b64 = b64url_encode(recipient_pk);
    let keys = derive(shared.as_bytes(), ns, &enc_b64, &pkr_b64)?;

    Ok(Encapsulated { enc, keys })
}

/// Open-side decapsulation: reconstructs `pkR` from the recipient private
/// scalar and derives the same AEAD key and nonce the sealer used.
pub fn decapsulate(enc: &[u8; 32], recipient_sk: &[u8; 32], ns: &str) -> Result<DerivedKeys> {
    if enc == &[0u8; 32] {
        return Err(HpkeError::EcdhLowOrder);
    }

    let secret = StaticSecret::from(*recipient_sk);
    let recipient_public = PublicKey::from(&secret);
    let shared = secret.diffie_hellman(&PublicKey::from(*enc));
    if shared.as_bytes() == &[0u8; 32] {
        return Err(HpkeError::EcdhLowOrder);
    }

    let enc_b64 = b64url_encode(enc);
    let pkr_b64 = b64url_encode(recipient_public.as_bytes());
    derive(shared.as_bytes(), ns, &enc_b64, &pkr_b64)
}

fn derive(ikm: &[u8], ns: &str, enc_b64: &str, pkr_b64: &str) -> Result<DerivedKeys> {
    // Extract with a 32-byte all-zero salt, expand with the bound info.
    let hkdf = Hkdf::<Sha256>::new(Some(&[0u8; 32]), ikm);
    let info = hkdf_info(ns, enc_b64, pkr_b64);

    let mut okm = Zeroizing::new([0u8; 44]);
    hkdf.expand(info.as_bytes(), okm.as_mut_slice())
        .map_err(|_| HpkeError::InvalidEnvelope("HKDF expansion failed".to_string()))?;

    let mut key = Zeroizing::new([0u8; 32]);
    let mut nonce = Zeroizing::new([0u8; 12]);
    key.copy_from_slice(&okm[..32]);
    nonce.copy_from_slice(&okm[32..]);

    Ok(DerivedKeys { key, nonce })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    fn recipient() -> ([u8; 32], [u8; 32]) {
        let pair = KeyPair::from_seed(&[9u8; 32], None);
        let pk = pair.public.public_key_bytes().unwrap();
        let sk = *pair.private.private_key_bytes().unwrap();
        (pk, sk)
    }

    #[test]
    fn test_seal_and_open_derive_the_same_keys() {
        let (pk, sk) = recipient();
        let sealed = encapsulate(&pk, "myapp", None).unwrap();
        let opened = decapsulate(&sealed.enc, &sk, "myapp").unwrap();

        assert_eq!(*sealed.keys.key, *opened.key);
        assert_eq!(*sealed.keys.nonce, *opened.nonce);
    }

    #[test]
    fn test_seeded_encapsulation_is_deterministic() {
        let (pk, _) = recipient();
        let seed = [7u8; 32];
        let a = encapsulate(&pk, "myapp", Some(&seed)).unwrap();
        let b = encapsulate(&pk, "myapp", Some(&seed)).unwrap();

        assert_eq!(a.enc, b.enc);
        assert_eq!(*a.keys.key, *b.keys.key);
        assert_eq!(*a.keys.nonce, *b.keys.nonce);

        let c = encapsulate(&pk, "myapp", None).unwrap();
        assert_ne!(a.enc, c.enc);
    }

    #[test]
    fn test_namespace_separates_derivations() {
        let (pk, _) = recipient();
        let seed = [7u8; 32];
        let a = encapsulate(&pk, "app-one", Some(&seed)).unwrap();
        let b = encapsulate(&pk, "app-two", Some(&seed)).unwrap();

        assert_eq!(a.enc, b.enc);
        assert_ne!(*a.keys.key, *b.keys.key);
    }

    #[test]
    fn test_all_zero_recipient_key_rejected() {
        let err = encapsulate(&[0u8; 32], "myapp", None).unwrap_err();
        assert_eq!(err.code(), "ECDH_LOW_ORDER");
    }

    #[test]
    fn test_all_zero_enc_rejected() {
        let (_, sk) = recipient();
        let err = decapsulate(&[0u8; 32], &sk, "myapp").unwrap_err();
        assert_eq!(err.code(), "ECDH_LOW_ORDER");
    }

    #[test]
    fn test_info_string_format() {
        let info = hkdf_info("myapp", "ENC", "PKR");
        assert_eq!(
            info,
            "x402-hpke:v1|KDF=HKDF-SHA256|AEAD=CHACHA20-POLY1305|ns=myapp|enc=ENC|pkR=PKR"
        );
    }

    #[test]
    fn test_key_and_nonce_sizes() {
        let (pk, _) = recipient();
        let sealed = encapsulate(&pk, "myapp", None).unwrap();
        assert_eq!(sealed.keys.key.len(), 32);
        assert_eq!(sealed.keys.nonce.len(), 12);
    }
}
