//! ECDSA signing and verification, plus the canonical multi-signature matcher.

use crate::ecc::{ECCurve, ECPoint};
use crate::hash::sha256;
use crate::{CryptoError, CryptoResult};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey};

/// Signs `message` with a secp256r1 private key, returning the 64-byte
/// `r ∥ s` form. The message is hashed with SHA-256 first.
pub fn sign(message: &[u8], private_key: &[u8]) -> CryptoResult<Vec<u8>> {
    let signing_key = SigningKey::from_slice(private_key)
        .map_err(|_| CryptoError::InvalidKey("invalid private key scalar".into()))?;
    let digest = sha256(message);
    let signature: P256Signature = signing_key
        .sign_prehash(&digest)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    Ok(signature.normalize_s().unwrap_or(signature).to_vec())
}

/// Verifies a 64-byte `r ∥ s` signature over `message` for `public_key`.
/// Returns `false` for malformed signatures rather than erroring; the
/// verification pipeline treats both the same way.
pub fn verify(message: &[u8], signature: &[u8], public_key: &ECPoint) -> bool {
    if signature.len() != 64 {
        return false;
    }
    match public_key.curve() {
        ECCurve::Secp256r1 => {
            let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key.encoded()) else {
                return false;
            };
            let Ok(sig) = P256Signature::from_slice(signature) else {
                return false;
            };
            let digest = sha256(message);
            verifying_key.verify_prehash(&digest, &sig).is_ok()
        }
        ECCurve::Secp256k1 => {
            let Ok(pk) = secp256k1::PublicKey::from_slice(public_key.encoded()) else {
                return false;
            };
            let Ok(sig) = secp256k1::ecdsa::Signature::from_compact(signature) else {
                return false;
            };
            let digest = sha256(message);
            let Ok(msg) = secp256k1::Message::from_digest_slice(&digest) else {
                return false;
            };
            secp256k1::Secp256k1::verification_only()
                .verify_ecdsa(&msg, &sig, &pk)
                .is_ok()
        }
    }
}

/// Generates a fresh secp256r1 private key scalar from the OS RNG.
pub fn generate_private_key() -> [u8; 32] {
    let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
    signing_key.to_bytes().into()
}

/// Verifies `m`-of-`n` signatures against an ordered public-key list.
///
/// Signatures and keys are both consumed left to right: the key cursor
/// always advances, the signature cursor advances only on a match. The
/// check fails as soon as the remaining keys cannot cover the remaining
/// signatures. This makes signature order significant, which keeps
/// multi-signature verification deterministic and single-pass.
pub fn verify_multisig(
    message: &[u8],
    signatures: &[Vec<u8>],
    public_keys: &[ECPoint],
) -> bool {
    let m = signatures.len();
    let n = public_keys.len();
    if m == 0 || m > n {
        return false;
    }

    let mut sig_index = 0;
    let mut key_index = 0;
    while sig_index < m && key_index < n {
        if verify(message, &signatures[sig_index], &public_keys[key_index]) {
            sig_index += 1;
        }
        key_index += 1;
        if m - sig_index > n - key_index {
            return false;
        }
    }
    sig_index == m
}
