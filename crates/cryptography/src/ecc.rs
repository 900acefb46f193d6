//! Elliptic-curve points in compressed form.

use crate::{CryptoError, CryptoResult};
use neo_io::{BinaryWriter, IoError, IoResult, MemoryReader, Serializable};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The curves a point may live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ECCurve {
    /// NIST P-256, the default signing curve.
    #[default]
    Secp256r1,
    /// The Bitcoin/Ethereum curve.
    Secp256k1,
}

/// A validated elliptic-curve public key in compressed 33-byte form
/// (`02`/`03` sign byte followed by the X coordinate).
#[derive(Debug, Clone)]
pub struct ECPoint {
    encoded: [u8; 33],
    curve: ECCurve,
}

impl ECPoint {
    /// Decodes a compressed point on secp256r1.
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        Self::decode(data, ECCurve::Secp256r1)
    }

    /// Decodes a compressed point on the given curve, validating that it
    /// lies on the curve.
    pub fn decode(data: &[u8], curve: ECCurve) -> CryptoResult<Self> {
        if data.len() != 33 {
            return Err(CryptoError::InvalidKey(format!(
                "compressed point must be 33 bytes, got {}",
                data.len()
            )));
        }
        if data[0] != 0x02 && data[0] != 0x03 {
            return Err(CryptoError::InvalidKey(format!(
                "invalid compression prefix 0x{:02x}",
                data[0]
            )));
        }

        match curve {
            ECCurve::Secp256r1 => {
                p256::PublicKey::from_sec1_bytes(data)
                    .map_err(|_| CryptoError::InvalidKey("point not on secp256r1".into()))?;
            }
            ECCurve::Secp256k1 => {
                secp256k1::PublicKey::from_slice(data)
                    .map_err(|_| CryptoError::InvalidKey("point not on secp256k1".into()))?;
            }
        }

        let mut encoded = [0u8; 33];
        encoded.copy_from_slice(data);
        Ok(Self { encoded, curve })
    }

    /// Parses a hex-encoded compressed point on secp256r1.
    pub fn from_hex(input: &str) -> CryptoResult<Self> {
        let data = hex::decode(input.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Self::from_bytes(&data)
    }

    /// Derives the public key for a secp256r1 private key scalar.
    pub fn from_private_key(private_key: &[u8]) -> CryptoResult<Self> {
        let secret = p256::SecretKey::from_slice(private_key)
            .map_err(|_| CryptoError::InvalidKey("invalid private key scalar".into()))?;
        let point = secret.public_key().to_encoded_point(true);
        Self::from_bytes(point.as_bytes())
    }

    /// The compressed encoding.
    pub fn encoded(&self) -> &[u8; 33] {
        &self.encoded
    }

    /// The curve this point lives on.
    pub fn curve(&self) -> ECCurve {
        self.curve
    }

    /// Hex rendering of the compressed encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.encoded)
    }
}

impl PartialEq for ECPoint {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded && self.curve == other.curve
    }
}

impl Eq for ECPoint {}

impl Hash for ECPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl Ord for ECPoint {
    /// Points order by their compressed encoding, which sorts committee
    /// and validator lists canonically.
    fn cmp(&self, other: &Self) -> Ordering {
        self.encoded.cmp(&other.encoded)
    }
}

impl PartialOrd for ECPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ECPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ECPoint {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serializable for ECPoint {
    fn size(&self) -> usize {
        33
    }

    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(&self.encoded);
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let data = reader.read_bytes(33)?;
        Self::from_bytes(&data).map_err(|e| IoError::format("ECPoint", e.to_string()))
    }
}

impl serde::Serialize for ECPoint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for ECPoint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ECPoint::from_hex(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "02486fd15732395eb47d048b3936194ffdbb44c70d37e5ef2e2eecf2d46bfa2beb";

    #[test]
    fn test_round_trip() {
        let point = ECPoint::from_hex(KEY).unwrap();
        assert_eq!(point.to_hex(), KEY);
        assert_eq!(point.encoded().len(), 33);
    }

    #[test]
    fn test_rejects_bad_prefix() {
        let mut data = hex::decode(KEY).unwrap();
        data[0] = 0x05;
        assert!(ECPoint::from_bytes(&data).is_err());
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(ECPoint::from_bytes(&[0x02; 32]).is_err());
        assert!(ECPoint::from_bytes(&[0x02; 65]).is_err());
    }

    #[test]
    fn test_rejects_point_off_curve() {
        // A syntactically valid prefix with an X that has no square root on P-256.
        let mut data = [0xffu8; 33];
        data[0] = 0x02;
        assert!(ECPoint::from_bytes(&data).is_err());
    }

    #[test]
    fn test_ordering_by_encoding() {
        let a = ECPoint::from_hex(KEY).unwrap();
        let b = ECPoint::from_hex(
            "03b209fd4f53a7170ea4444e0cb0a6bb6a53c2bd016926989cf85f9b0fba17a70c",
        )
        .unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_serializable_round_trip() {
        let point = ECPoint::from_hex(KEY).unwrap();
        let bytes = point.to_array();
        assert_eq!(ECPoint::from_bytes(&bytes).unwrap(), point);
    }

    #[test]
    fn test_from_private_key() {
        let sk = [0x11u8; 32];
        let point = ECPoint::from_private_key(&sk).unwrap();
        assert!(point.encoded()[0] == 0x02 || point.encoded()[0] == 0x03);
    }
}
