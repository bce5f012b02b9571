//! X25519 key material as OKP JSON Web Keys.
//!
//! Recipients publish the public half via a JWKS; the codec takes keys by
//! value and never retains them. Private scalars are decoded into zero-on-drop
//! buffers.

use crate::errors::{HpkeError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// An X25519 key in JWK form (RFC 7517 / RFC 8037).
///
/// Public keys carry only `x`; private keys additionally carry `d`. A `use`
/// member, when present, must be `"enc"`.
///
/// # Examples
///
/// ```
/// use x402_hpke::keys::KeyPair;
///
/// let pair = KeyPair::generate(Some("key-1"));
/// assert_eq!(pair.public.kty, "OKP");
/// assert_eq!(pair.public.crv, "X25519");
/// assert!(pair.public.d.is_none());
/// assert!(pair.private.d.is_some());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Jwk {
    /// Key type; always `"OKP"`
    pub kty: String,

    /// Curve; always `"X25519"`
    pub crv: String,

    /// Public key, base64url without padding (32 bytes)
    pub x: String,

    /// Private scalar, base64url without padding (32 bytes); private keys only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// Key identifier for JWKS selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended key use; must be `"enc"` when present
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
}

impl Jwk {
    /// Validates the JWK shape: OKP/X25519, a well-formed 32-byte `x`
    /// coordinate, and `use == "enc"` when a use is declared.
    pub fn validate(&self) -> Result<()> {
        if self.kty != "OKP" {
            return Err(HpkeError::JwksKeyInvalid(format!(
                "kty must be 'OKP', got '{}'",
                self.kty
            )));
        }
        if self.crv != "X25519" {
            return Err(HpkeError::JwksKeyInvalid(format!(
                "crv must be 'X25519', got '{}'",
                self.crv
            )));
        }
        decode_coordinate(&self.x, "x")?;
        if let Some(use_) = &self.use_ {
            if use_ != "enc" {
                let label = self.kid.clone().unwrap_or_else(|| self.x.clone());
                return Err(HpkeError::JwksKeyUseInvalid(label));
            }
        }
        Ok(())
    }

    /// Decodes the public key, rejecting the all-zero point.
    pub fn public_key_bytes(&self) -> Result<[u8; 32]> {
        self.validate()?;
        let bytes = decode_coordinate(&self.x, "x")?;
        if bytes == [0u8; 32] {
            return Err(HpkeError::EcdhLowOrder);
        }
        Ok(bytes)
    }

    /// Decodes the private scalar into a zero-on-drop buffer.
    pub fn private_key_bytes(&self) -> Result<Zeroizing<[u8; 32]>> {
        self.validate()?;
        let d = self
            .d
            .as_ref()
            .ok_or_else(|| HpkeError::JwksKeyInvalid("missing private member 'd'".to_string()))?;
        Ok(Zeroizing::new(decode_coordinate(d, "d")?))
    }

    /// Returns whether this JWK carries a private scalar.
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Returns the public half of this key, dropping the private scalar.
    pub fn to_public(&self) -> Jwk {
        Jwk {
            kty: self.kty.clone(),
            crv: self.crv.clone(),
            x: self.x.clone(),
            d: None,
            kid: self.kid.clone(),
            use_: self.use_.clone(),
        }
    }
}

fn decode_coordinate(value: &str, field: &str) -> Result<[u8; 32]> {
    let bytes = URL_SAFE_NO_PAD.decode(value.as_bytes()).map_err(|e| {
        HpkeError::JwksKeyInvalid(format!("'{}' is not base64url: {}", field, e))
    })?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        HpkeError::JwksKeyInvalid(format!("'{}' must be 32 bytes, got {}", field, bytes.len()))
    })
}

/// A recipient key pair in JWK form.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Publishable half (no `d`)
    pub public: Jwk,

    /// Private half held by the recipient
    pub private: Jwk,
}

impl KeyPair {
    /// Generates a fresh key pair from the operating system CSPRNG.
    pub fn generate(kid: Option<&str>) -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self::from_secret(secret, kid)
    }

    /// Derives a key pair deterministically from a 32-byte seed.
    ///
    /// Intended for known-answer tests and cross-implementation vectors;
    /// production keys come from [`KeyPair::generate`].
    pub fn from_seed(seed: &[u8; 32], kid: Option<&str>) -> Self {
        let secret = StaticSecret::from(*seed);
        Self::from_secret(secret, kid)
    }

    fn from_secret(secret: StaticSecret, kid: Option<&str>) -> Self {
        let public = PublicKey::from(&secret);
        let x = URL_SAFE_NO_PAD.encode(public.as_bytes());
        let d = URL_SAFE_NO_PAD.encode(secret.to_bytes());
        let kid = kid.map(|s| s.to_string());

        let public = Jwk {
            kty: "OKP".to_string(),
            crv: "X25519".to_string(),
            x: x.clone(),
            d: None,
            kid: kid.clone(),
            use_: Some("enc".to_string()),
        };
        let private = Jwk {
            d: Some(d),
            ..public.clone()
        };
        Self { public, private }
    }
}

/// Recomputes the public JWK from a private one by base-point
/// multiplication of its scalar.
///
/// Unlike [`Jwk::to_public`], which trusts the stored `x` coordinate, this
/// derives the coordinate from `d`, which is what the open path binds into
/// key derivation.
pub fn public_from_private(jwk: &Jwk) -> Result<Jwk> {
    let scalar = jwk.private_key_bytes()?;
    let public = PublicKey::from(&StaticSecret::from(*scalar));
    Ok(Jwk {
        kty: jwk.kty.clone(),
        crv: jwk.crv.clone(),
        x: URL_SAFE_NO_PAD.encode(public.as_bytes()),
        d: None,
        kid: jwk.kid.clone(),
        use_: jwk.use_.clone(),
    })
}

/// A JSON Web Key Set as served by a JWKS endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Jwks {
    /// The keys in the set
    pub keys: Vec<Jwk>,
}

/// Selects a key from a JWKS by its `kid`.
///
/// Returns `None` when no key in the set matches. An empty kid is rejected
/// rather than silently matching nothing.
///
/// # Examples
///
/// ```
/// use x402_hpke::keys::{select_jwk, Jwks, KeyPair};
///
/// let pair = KeyPair::generate(Some("key-1"));
/// let jwks = Jwks { keys: vec![pair.public.clone()] };
///
/// assert!(select_jwk(&jwks, "key-1").unwrap().is_some());
/// assert!(select_jwk(&jwks, "key-2").unwrap().is_none());
/// assert!(select_jwk(&jwks, "").is_err());
/// ```
pub fn select_jwk<'a>(jwks: &'a Jwks, kid: &str) -> Result<Option<&'a Jwk>> {
    if kid.is_empty() {
        return Err(HpkeError::JwksKidInvalid);
    }
    Ok(jwks
        .keys
        .iter()
        .find(|key| key.kid.as_deref() == Some(kid)))
}
