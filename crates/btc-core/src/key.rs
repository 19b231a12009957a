//! secp256k1 key material: a private scalar or a bare public point, with
//! memoized public encodings, WIF export and one-step chain-code derivation.

use std::fmt;
use std::sync::OnceLock;

use crypto_utils::hash::{hash160, sha256d};
use crypto_utils::random::secure_rng;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::bigint::U256;
use k256::elliptic_curve::group::Curve as _;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{FieldBytes, NonZeroScalar, ProjectivePoint, PublicKey, Scalar, SecretKey};
use zeroize::Zeroizing;

use crate::address::Address;
use crate::base58;
use crate::error::BtcError;
use crate::network::NetworkParams;

/// Length of a private scalar and of a chain code.
pub const SECRET_KEY_LEN: usize = 32;

/// Trailing WIF byte marking a key whose public point is used compressed.
const COMPRESSED_MARKER: u8 = 0x01;

#[derive(Clone)]
enum KeyMaterial {
    Private(SecretKey),
    Public(PublicKey),
}

/// A secp256k1 key pair, or a public key alone.
///
/// The encoded public key and its Hash160 are computed on first use and
/// cached until the compression flag changes.
#[derive(Clone)]
pub struct EcKey {
    material: KeyMaterial,
    public: OnceLock<PublicKey>,
    encoded: OnceLock<Vec<u8>>,
    hash: OnceLock<[u8; 20]>,
    compressed: bool,
}

impl EcKey {
    fn with_material(material: KeyMaterial, compressed: bool) -> Self {
        Self {
            material,
            public: OnceLock::new(),
            encoded: OnceLock::new(),
            hash: OnceLock::new(),
            compressed,
        }
    }

    /// Fresh key with a uniformly random scalar in `[1, n-1]`.
    pub fn generate(compressed: bool) -> Result<Self, BtcError> {
        let mut rng = secure_rng()?;
        let secret = SecretKey::random(&mut rng);
        Ok(Self::with_material(KeyMaterial::Private(secret), compressed))
    }

    /// Key from a 32-byte big-endian scalar.
    pub fn from_secret_bytes(bytes: &[u8], compressed: bool) -> Result<Self, BtcError> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(BtcError::InvalidKey(format!(
                "private key must be {SECRET_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| BtcError::InvalidKey("scalar is zero or not below the curve order".into()))?;
        Ok(Self::with_material(KeyMaterial::Private(secret), compressed))
    }

    /// Verify-only key from a SEC1 public key. The compression flag follows
    /// the encoding that was supplied.
    pub fn from_public_key(sec1: &[u8]) -> Result<Self, BtcError> {
        let public = PublicKey::from_sec1_bytes(sec1)
            .map_err(|e| BtcError::InvalidKey(format!("invalid public key: {e}")))?;
        let compressed = sec1.len() == 33;
        Ok(Self::with_material(KeyMaterial::Public(public), compressed))
    }

    /// Parse a WIF string: `prefix ++ scalar[32] ++ [0x01]`.
    pub fn from_exported_string(s: &str, network: impl Into<NetworkParams>) -> Result<Self, BtcError> {
        let params = network.into();
        let payload = Zeroizing::new(base58::decode_checked(s)?);

        let (&prefix, body) = payload
            .split_first()
            .ok_or_else(|| BtcError::Format("empty private key payload".into()))?;
        if prefix != params.private_key_prefix() {
            return Err(BtcError::UnsupportedVersion(prefix));
        }

        let compressed = match body.len() {
            SECRET_KEY_LEN => false,
            len if len == SECRET_KEY_LEN + 1 && body[SECRET_KEY_LEN] == COMPRESSED_MARKER => true,
            len => {
                return Err(BtcError::Format(format!(
                    "private key payload of {len} bytes is neither 32 nor 32 plus a compression flag"
                )))
            }
        };

        Self::from_secret_bytes(&body[..SECRET_KEY_LEN], compressed)
    }

    /// WIF export. Compressed keys carry the trailing 0x01 marker.
    pub fn to_exported_string(&self, network: impl Into<NetworkParams>) -> Result<String, BtcError> {
        let secret = self.secret()?;
        let mut payload = Zeroizing::new(Vec::with_capacity(2 + SECRET_KEY_LEN));
        payload.push(network.into().private_key_prefix());
        payload.extend_from_slice(&secret.to_bytes());
        if self.compressed {
            payload.push(COMPRESSED_MARKER);
        }
        Ok(base58::encode_checked(&payload))
    }

    pub fn has_private_key(&self) -> bool {
        matches!(self.material, KeyMaterial::Private(_))
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Switch between compressed and uncompressed public encodings. Cached
    /// encodings are dropped.
    pub fn set_compressed(&mut self, compressed: bool) {
        if self.compressed != compressed {
            self.compressed = compressed;
            self.encoded = OnceLock::new();
            self.hash = OnceLock::new();
        }
    }

    fn secret(&self) -> Result<&SecretKey, BtcError> {
        match &self.material {
            KeyMaterial::Private(secret) => Ok(secret),
            KeyMaterial::Public(_) => Err(BtcError::MissingPrivateKey),
        }
    }

    fn point(&self) -> &PublicKey {
        match &self.material {
            KeyMaterial::Private(secret) => self.public.get_or_init(|| secret.public_key()),
            KeyMaterial::Public(public) => public,
        }
    }

    /// SEC1 encoding of the public point, compressed or not per the flag.
    pub fn public_key(&self) -> &[u8] {
        self.encoded.get_or_init(|| {
            self.point()
                .to_encoded_point(self.compressed)
                .as_bytes()
                .to_vec()
        })
    }

    /// Whether `sec1` encodes this key's public point, in either form.
    pub fn matches_public_key(&self, sec1: &[u8]) -> bool {
        PublicKey::from_sec1_bytes(sec1).is_ok_and(|other| other == *self.point())
    }

    /// Hash160 of [`EcKey::public_key`].
    pub fn pubkey_hash(&self) -> &[u8; 20] {
        self.hash.get_or_init(|| hash160(self.public_key()))
    }

    /// Pubkey-hash address of this key.
    pub fn address(&self, network: impl Into<NetworkParams>) -> Address {
        Address::from_public_key(self.public_key(), network)
    }

    /// Hex of the 32-byte private scalar.
    pub fn to_hex(&self) -> Result<String, BtcError> {
        Ok(hex::encode(self.secret()?.to_bytes()))
    }

    /// DER-encoded, low-S ECDSA signature over a 32-byte digest. Nonces are
    /// deterministic (RFC 6979), so the same key and digest always give the
    /// same bytes.
    pub fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, BtcError> {
        let signing_key = SigningKey::from(self.secret()?.clone());
        let signature: Signature = signing_key
            .sign_prehash(digest)
            .map_err(|e| BtcError::Signing(e.to_string()))?;
        let signature = signature.normalize_s().unwrap_or(signature);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    /// Check a DER signature over `digest` against this key's public point.
    pub fn verify(&self, digest: &[u8; 32], der: &[u8]) -> bool {
        verify_signature(self.public_key(), digest, der)
    }

    /// One derivation step from a public key:
    /// `child = parent * (sha256d(parent) XOR chain_code)`.
    ///
    /// The child is encoded with the same compression as `parent_pubkey`.
    pub fn derive_child_public(parent_pubkey: &[u8], chain_code: &[u8]) -> Result<Vec<u8>, BtcError> {
        let parent = PublicKey::from_sec1_bytes(parent_pubkey)
            .map_err(|e| BtcError::InvalidKey(format!("invalid parent public key: {e}")))?;
        let tweak = derivation_tweak(parent_pubkey, chain_code)?;

        let point = ProjectivePoint::from(*parent.as_affine()) * tweak;
        let child = PublicKey::from_affine(point.to_affine())
            .map_err(|_| BtcError::DegenerateDerivation)?;
        Ok(child
            .to_encoded_point(parent_pubkey.len() == 33)
            .as_bytes()
            .to_vec())
    }

    /// The private counterpart of [`EcKey::derive_child_public`]:
    /// `child = parent_scalar * tweak mod n`, with the tweak taken over this
    /// key's encoded public key. A zero product is `DegenerateDerivation`.
    pub fn derive_child_private(&self, chain_code: &[u8]) -> Result<EcKey, BtcError> {
        let secret = self.secret()?;
        let tweak = derivation_tweak(self.public_key(), chain_code)?;

        let product = *secret.to_nonzero_scalar() * tweak;
        let child: Option<NonZeroScalar> = NonZeroScalar::new(product).into();
        let child = child.ok_or(BtcError::DegenerateDerivation)?;
        Ok(Self::with_material(
            KeyMaterial::Private(SecretKey::from(child)),
            self.compressed,
        ))
    }
}

impl fmt::Debug for EcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKey")
            .field("public_key", &hex::encode(self.public_key()))
            .field("has_private_key", &self.has_private_key())
            .field("compressed", &self.compressed)
            .finish()
    }
}

/// Verify a DER signature over `digest` with a SEC1 public key. Any parse
/// failure counts as "does not verify".
pub fn verify_signature(pubkey: &[u8], digest: &[u8; 32], der: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(pubkey) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(der) else {
        return false;
    };
    verifying_key.verify_prehash(digest, &signature).is_ok()
}

fn derivation_tweak(parent_pubkey: &[u8], chain_code: &[u8]) -> Result<Scalar, BtcError> {
    if chain_code.len() != SECRET_KEY_LEN {
        return Err(BtcError::InvalidArgument(format!(
            "chain code must be {SECRET_KEY_LEN} bytes, got {}",
            chain_code.len()
        )));
    }

    let mut tweak = Zeroizing::new(sha256d(parent_pubkey));
    for (t, c) in tweak.iter_mut().zip(chain_code) {
        *t ^= c;
    }
    let bytes = FieldBytes::from(*tweak);
    Ok(<Scalar as Reduce<U256>>::reduce_bytes(&bytes))
}
