//! Encryption of secure configuration values
//!
//! Secure values are stored only in encrypted form. [`SecretCipher`] is the
//! seam; [`Blake3Cipher`] is the built-in implementation: a Blake3 keyed XOF
//! keystream under a random nonce, authenticated with a keyed Blake3 tag.
//!
//! Encrypted text format: `b3:<nonce hex>:<tag hex>:<ciphertext hex>`.

use std::fmt::{self, Debug, Formatter};

const PREFIX: &str = "b3";
const STREAM_CONTEXT: &str = "pipecfg 2024 secure-value keystream";
const TAG_CONTEXT: &str = "pipecfg 2024 secure-value tag";

/// Encrypts and decrypts secure values
pub trait SecretCipher: Send + Sync + Debug {
    /// Encrypt a plain value
    ///
    /// # Errors
    /// Returns error if the cipher cannot produce ciphertext
    fn encrypt(&self, plain: &str) -> Result<String, CipherError>;

    /// Decrypt a value produced by [`SecretCipher::encrypt`]
    ///
    /// # Errors
    /// Returns error for malformed or tampered input
    fn decrypt(&self, encrypted: &str) -> Result<String, CipherError>;
}

/// Blake3-based authenticated stream cipher
#[derive(Clone)]
pub struct Blake3Cipher {
    stream_key: [u8; 32],
    tag_key: [u8; 32],
}

impl Blake3Cipher {
    /// Derive a cipher from a server secret
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            stream_key: blake3::derive_key(STREAM_CONTEXT, secret),
            tag_key: blake3::derive_key(TAG_CONTEXT, secret),
        }
    }

    fn keystream(&self, nonce: &[u8; 16], len: usize) -> Vec<u8> {
        let mut stream = vec![0u8; len];
        blake3::Hasher::new_keyed(&self.stream_key)
            .update(nonce)
            .finalize_xof()
            .fill(&mut stream);
        stream
    }

    fn tag(&self, nonce: &[u8; 16], ciphertext: &[u8]) -> blake3::Hash {
        blake3::Hasher::new_keyed(&self.tag_key)
            .update(nonce)
            .update(ciphertext)
            .finalize()
    }
}

impl Debug for Blake3Cipher {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blake3Cipher").finish_non_exhaustive()
    }
}

impl SecretCipher for Blake3Cipher {
    fn encrypt(&self, plain: &str) -> Result<String, CipherError> {
        let nonce: [u8; 16] = rand::random();
        let ciphertext: Vec<u8> = plain
            .as_bytes()
            .iter()
            .zip(self.keystream(&nonce, plain.len()))
            .map(|(p, k)| p ^ k)
            .collect();
        let tag = self.tag(&nonce, &ciphertext);
        Ok(format!(
            "{PREFIX}:{}:{}:{}",
            hex::encode(nonce),
            tag.to_hex(),
            hex::encode(&ciphertext)
        ))
    }

    fn decrypt(&self, encrypted: &str) -> Result<String, CipherError> {
        let mut parts = encrypted.split(':');
        let (Some(PREFIX), Some(nonce), Some(tag), Some(body), None) =
            (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CipherError::Malformed);
        };
        let nonce: [u8; 16] = hex::decode(nonce)?
            .try_into()
            .map_err(|_| CipherError::Malformed)?;
        let tag: [u8; 32] = hex::decode(tag)?
            .try_into()
            .map_err(|_| CipherError::Malformed)?;
        let ciphertext = hex::decode(body)?;
        // blake3::Hash equality is constant time
        if self.tag(&nonce, &ciphertext) != tag {
            return Err(CipherError::TagMismatch);
        }
        let plain: Vec<u8> = ciphertext
            .iter()
            .zip(self.keystream(&nonce, ciphertext.len()))
            .map(|(c, k)| c ^ k)
            .collect();
        String::from_utf8(plain).map_err(|_| CipherError::Malformed)
    }
}

/// Cipher errors
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// Not in `b3:nonce:tag:body` form
    #[error("encrypted value is malformed")]
    Malformed,

    /// Authentication failed (wrong key or tampered value)
    #[error("encrypted value failed authentication")]
    TagMismatch,

    /// Hex decoding error
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt() {
        let cipher = Blake3Cipher::from_secret(b"server-secret");
        let encrypted = cipher.encrypt("hunter2").unwrap();
        assert!(encrypted.starts_with("b3:"));
        assert!(!encrypted.contains("hunter2"));
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "hunter2");
    }

    #[test]
    fn nonce_makes_ciphertexts_differ() {
        let cipher = Blake3Cipher::from_secret(b"k");
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let encrypted = Blake3Cipher::from_secret(b"one").encrypt("v").unwrap();
        let result = Blake3Cipher::from_secret(b"two").decrypt(&encrypted);
        assert!(matches!(result, Err(CipherError::TagMismatch)));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let cipher = Blake3Cipher::from_secret(b"k");
        assert!(matches!(cipher.decrypt("plain"), Err(CipherError::Malformed)));
        assert!(matches!(cipher.decrypt("b3:zz:00:00"), Err(CipherError::Hex(_))));
    }

    #[test]
    fn debug_hides_keys() {
        let rendered = format!("{:?}", Blake3Cipher::from_secret(b"k"));
        assert_eq!(rendered, "Blake3Cipher { .. }");
    }
}
