//! Encrypted on-disk token vault.
//!
//! Tokens are stored one file per credential set under the user data
//! directory. The file name derives from SHA-256 digests of the principal
//! and secret so neither appears on disk; the token itself is Fernet-encrypted
//! with a key derived from the same credentials.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::fernet::Fernet;

const APP_DIR: &str = "firebolt";

#[derive(Serialize, Deserialize, Default)]
struct VaultFile {
    token: Option<String>,
    salt: Option<String>,
    expiration: Option<u64>,
}

/// File-backed storage for one credential set's token.
pub struct TokenVault {
    path: PathBuf,
    salt: String,
    fernet: Fernet,
}

impl TokenVault {
    /// Open (creating the data directory if needed) the vault for the given
    /// credentials.
    pub fn open(principal: &str, secret: &str) -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no user data directory")
            })?
            .join(APP_DIR);
        Self::open_in(&dir, principal, secret)
    }

    /// Open the vault rooted at an explicit directory.
    pub fn open_in(dir: &Path, principal: &str, secret: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name(principal, secret));
        // Reuse the stored salt so previously written tokens stay readable.
        let salt = read_vault_file(&path)
            .and_then(|f| f.salt)
            .unwrap_or_else(generate_salt);
        let raw_salt = STANDARD.decode(&salt).unwrap_or_default();
        let fernet = Fernet::derive(&raw_salt, principal, secret);
        Ok(Self { path, salt, fernet })
    }

    /// Load the stored token, if present, unexpired and decryptable.
    #[must_use]
    pub fn load(&self) -> Option<String> {
        let file = read_vault_file(&self.path)?;
        let token = file.token?;
        if let Some(expiration) = file.expiration {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs());
            if expiration <= now {
                return None;
            }
        }
        let decrypted = self.fernet.decrypt(&token)?;
        String::from_utf8(decrypted).ok()
    }

    /// Encrypt and persist a token together with its expiry timestamp.
    pub fn store(&self, token: &str, expires_at: SystemTime) -> Result<()> {
        let expiration = expires_at
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let file = VaultFile {
            token: Some(self.fernet.encrypt(token.as_bytes())),
            salt: Some(self.salt.clone()),
            expiration: Some(expiration),
        };
        let body = serde_json::to_vec(&file)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, body)?;
        Ok(())
    }
}

fn file_name(principal: &str, secret: &str) -> String {
    let principal_hash = hex_digest(principal);
    let secret_hash = hex_digest(secret);
    format!("{}{}.json", &principal_hash[..32], &secret_hash[..32])
}

fn hex_digest(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn generate_salt() -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    STANDARD.encode(salt)
}

fn read_vault_file(path: &Path) -> Option<VaultFile> {
    let body = fs::read(path).ok()?;
    serde_json::from_slice(&body).ok()
}
