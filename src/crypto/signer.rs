use secp256k1::ecdsa::RecoverableSignature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Raw secp256k1 private key size.
pub const PRIVATE_KEY_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("private key must be {PRIVATE_KEY_SIZE} hex-encoded bytes")]
    InvalidKeyLength,
    #[error("private key is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("private key is not a valid secp256k1 scalar")]
    InvalidScalar(#[from] secp256k1::Error),
}

/// Wraps a secp256k1 private key and produces EIP-191 personal-message
/// signatures in the 65-byte r‖s‖v wire format the reward service verifies.
pub struct WalletSigner {
    secret: SecretKey,
}

impl WalletSigner {
    /// Parse a hex private key, with or without a `0x` prefix.
    pub fn from_hex(raw: &str) -> Result<Self, SignerError> {
        let raw = raw.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw)?;
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(SignerError::InvalidKeyLength);
        }
        let secret = SecretKey::from_slice(&bytes)?;
        Ok(Self { secret })
    }

    /// Derive the checksummed EVM address for this key.
    pub fn address(&self) -> String {
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &self.secret);
        let uncompressed = public.serialize_uncompressed();
        // Address = last 20 bytes of keccak256 over the 64-byte public key
        // (uncompressed encoding minus the 0x04 tag).
        let digest = keccak256(&uncompressed[1..]);
        to_checksum_address(&digest[12..])
    }

    /// Sign a text message per EIP-191 ("personal_sign").
    ///
    /// Returns `0x`-prefixed hex of r‖s‖v with v ∈ {27, 28}.
    pub fn sign_message(&self, message: &str) -> String {
        let digest = personal_message_digest(message);
        let secp = Secp256k1::new();
        let signature =
            secp.sign_ecdsa_recoverable(&Message::from_digest(digest), &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&compact);
        bytes[64] = 27 + recovery_id.to_i32() as u8;
        format!("0x{}", hex::encode(bytes))
    }
}

/// A wallet in the fleet: the address derived once from the private key,
/// plus exclusive ownership of the signer behind it.
pub struct WalletIdentity {
    address: String,
    signer: WalletSigner,
}

impl WalletIdentity {
    pub fn from_private_key(raw: &str) -> Result<Self, SignerError> {
        let signer = WalletSigner::from_hex(raw)?;
        let address = signer.address();
        Ok(Self { address, signer })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn sign(&self, message: &str) -> String {
        self.signer.sign_message(message)
    }
}

fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// EIP-191 digest: keccak256("\x19Ethereum Signed Message:\n{len}{message}").
fn personal_message_digest(message: &str) -> [u8; 32] {
    let mut data = Vec::with_capacity(message.len() + 32);
    data.extend_from_slice(b"\x19Ethereum Signed Message:\n");
    data.extend_from_slice(message.len().to_string().as_bytes());
    data.extend_from_slice(message.as_bytes());
    keccak256(&data)
}

/// EIP-55 mixed-case checksum encoding of a 20-byte account id.
fn to_checksum_address(account: &[u8]) -> String {
    let lower = hex::encode(account);
    let digest = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (digest[i / 2] >> (4 * (1 - i % 2))) & 0xf;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::ecdsa::RecoveryId;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_address_for_known_key() {
        let signer = WalletSigner::from_hex(KEY_ONE).unwrap();
        assert_eq!(
            signer.address(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_checksum_vectors() {
        // Vectors from the EIP-55 specification.
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let raw = hex::decode(&expected[2..].to_lowercase()).unwrap();
            assert_eq!(to_checksum_address(&raw), *expected);
        }
    }

    #[test]
    fn test_key_parsing_rejects_garbage() {
        assert!(WalletSigner::from_hex("not hex").is_err());
        assert!(WalletSigner::from_hex("0xabcd").is_err());
        // The zero scalar is outside the valid key range.
        let zero = format!("0x{}", "00".repeat(32));
        assert!(WalletSigner::from_hex(&zero).is_err());
    }

    #[test]
    fn test_signature_shape_and_determinism() {
        let signer = WalletSigner::from_hex(KEY_ONE).unwrap();
        let message = "Node activation request for 0xabc at 1700000000000";
        let sig = signer.sign_message(message);

        assert!(sig.starts_with("0x"));
        assert_eq!(sig.len(), 132);
        let v = &sig[sig.len() - 2..];
        assert!(v == "1b" || v == "1c");
        // RFC 6979 nonces make signing deterministic.
        assert_eq!(sig, signer.sign_message(message));
    }

    #[test]
    fn test_signature_recovers_signing_key() {
        let signer = WalletSigner::from_hex(KEY_ONE).unwrap();
        let message = "I am claiming my daily node point for 0xabc at 1700000000000";
        let sig = signer.sign_message(message);

        let bytes = hex::decode(&sig[2..]).unwrap();
        let recovery_id = RecoveryId::from_i32(i32::from(bytes[64]) - 27).unwrap();
        let recoverable =
            RecoverableSignature::from_compact(&bytes[..64], recovery_id).unwrap();

        let secp = Secp256k1::new();
        let digest = personal_message_digest(message);
        let recovered = secp
            .recover_ecdsa(&Message::from_digest(digest), &recoverable)
            .unwrap();
        let expected = PublicKey::from_secret_key(&secp, &signer.secret);
        assert_eq!(recovered, expected);
    }
}
