//! Fernet payload cipher and PBKDF2 key derivation for the token vault.
//!
//! Fernet token layout: `0x80 || timestamp(8, BE) || iv(16) || ciphertext ||
//! hmac(32)`, base64-urlsafe encoded. The 32-byte key splits into a signing
//! half (HMAC-SHA-256) and an encryption half (AES-128-CBC).

use std::time::{SystemTime, UNIX_EPOCH};

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 0x80;
const HEADER_LEN: usize = 1 + 8 + 16;
const MAC_LEN: usize = 32;
const KDF_ITERATIONS: u32 = 39_000;

/// Symmetric encrypter with a key derived from the caller's credentials.
pub(crate) struct Fernet {
    signing_key: [u8; 16],
    encryption_key: [u8; 16],
}

impl Fernet {
    /// Derive a key from `principal`/`secret` via PBKDF2-HMAC-SHA256 with a
    /// per-file salt.
    pub(crate) fn derive(salt: &[u8], principal: &str, secret: &str) -> Self {
        let mut key = [0u8; 32];
        let password = format!("{principal}{secret}");
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut key);
        let mut signing_key = [0u8; 16];
        let mut encryption_key = [0u8; 16];
        signing_key.copy_from_slice(&key[..16]);
        encryption_key.copy_from_slice(&key[16..]);
        Self {
            signing_key,
            encryption_key,
        }
    }

    /// Encrypt `plaintext` into a Fernet token.
    pub(crate) fn encrypt(&self, plaintext: &[u8]) -> String {
        let mut iv = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut iv);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        self.encrypt_at(plaintext, timestamp, iv)
    }

    fn encrypt_at(&self, plaintext: &[u8], timestamp: u64, iv: [u8; 16]) -> String {
        let ciphertext = Aes128CbcEnc::new((&self.encryption_key).into(), (&iv).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len() + MAC_LEN);
        token.push(VERSION);
        token.extend_from_slice(&timestamp.to_be_bytes());
        token.extend_from_slice(&iv);
        token.extend_from_slice(&ciphertext);

        let mut mac = new_mac(&self.signing_key);
        mac.update(&token);
        token.extend_from_slice(&mac.finalize().into_bytes());

        URL_SAFE.encode(token)
    }

    /// Decrypt a Fernet token. Returns `None` for malformed tokens, MAC
    /// mismatches (wrong credentials) or bad padding.
    pub(crate) fn decrypt(&self, token: &str) -> Option<Vec<u8>> {
        let raw = URL_SAFE.decode(token).ok()?;
        if raw.len() < HEADER_LEN + MAC_LEN || raw[0] != VERSION {
            return None;
        }
        let (signed, tag) = raw.split_at(raw.len() - MAC_LEN);

        let mut mac = new_mac(&self.signing_key);
        mac.update(signed);
        mac.verify_slice(tag).ok()?;

        let iv: [u8; 16] = signed[9..HEADER_LEN].try_into().ok()?;
        let ciphertext = &signed[HEADER_LEN..];
        Aes128CbcDec::new((&self.encryption_key).into(), (&iv).into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .ok()
    }
}

// HMAC accepts keys of any length.
#[allow(clippy::expect_used)]
fn new_mac(key: &[u8; 16]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC key length")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let fernet = Fernet::derive(b"0123456789abcdef", "user", "pass");
        let token = fernet.encrypt(b"secret payload");
        assert_eq!(fernet.decrypt(&token).unwrap(), b"secret payload");
    }

    #[test]
    fn test_wrong_credentials_fail_to_decrypt() {
        let fernet = Fernet::derive(b"0123456789abcdef", "user", "pass");
        let other = Fernet::derive(b"0123456789abcdef", "user", "wrong");
        let token = fernet.encrypt(b"secret payload");
        assert!(other.decrypt(&token).is_none());
    }

    #[test]
    fn test_wrong_salt_fails_to_decrypt() {
        let fernet = Fernet::derive(b"0123456789abcdef", "user", "pass");
        let other = Fernet::derive(b"fedcba9876543210", "user", "pass");
        let token = fernet.encrypt(b"secret payload");
        assert!(other.decrypt(&token).is_none());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let fernet = Fernet::derive(b"0123456789abcdef", "user", "pass");
        let token = fernet.encrypt(b"secret payload");
        let mut raw = URL_SAFE.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(fernet.decrypt(&URL_SAFE.encode(raw)).is_none());
    }

    #[test]
    fn test_garbage_rejected() {
        let fernet = Fernet::derive(b"0123456789abcdef", "user", "pass");
        assert!(fernet.decrypt("not base64 !!").is_none());
        assert!(fernet.decrypt(&URL_SAFE.encode(b"short")).is_none());
    }

    #[test]
    fn test_deterministic_with_fixed_inputs() {
        let fernet = Fernet::derive(b"0123456789abcdef", "user", "pass");
        let a = fernet.encrypt_at(b"data", 1_700_000_000, [7u8; 16]);
        let b = fernet.encrypt_at(b"data", 1_700_000_000, [7u8; 16]);
        assert_eq!(a, b);
        assert_eq!(fernet.decrypt(&a).unwrap(), b"data");
    }
}
