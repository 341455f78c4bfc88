//-
// Copyright (c) 2026, The Sealpost Authors
//
// This file is part of Sealpost.
//
// Sealpost is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Sealpost is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Sealpost. If not, see <http://www.gnu.org/licenses/>.

//! Password-based encryption of individual text fields.
//!
//! The stored form of an encrypted field is
//!
//! ```text
//! base64("Salted__" || salt[8] || AES-256-CBC(key, iv, PKCS#7(utf8(text))))
//! ```
//!
//! where `key || iv = PBKDF2-HMAC-SHA256(passphrase, salt, 1000, 48)` and
//! `passphrase = "eliano-key-" || account_id || "-" || shared_secret`.
//!
//! This is what the webmail's encryption module reads and writes. There is
//! no version field and no MAC; changing any parameter here produces values
//! that still look valid but which the webmail silently fails to decrypt.
//!
//! Fields which do not carry the `Salted__` marker are legacy plaintext from
//! before encryption was introduced and are passed through as-is.

use std::fmt;

use log::error;
use openssl::hash::MessageDigest;
use openssl::symm::Cipher;
use rand::{rngs::OsRng, Rng};
use secstr::{SecBox, SecStr};

use super::AES_BLOCK;
use crate::account::model::AccountId;
use crate::support::{error::Error, log_prefix::LogPrefix};

const MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const DERIVED_LEN: usize = KEY_LEN + AES_BLOCK;
const PBKDF2_ITERATIONS: usize = 1000;
const PASSPHRASE_PREFIX: &str = "eliano-key-";

/// The result of trying to decrypt a stored field.
///
/// Only `Decrypted` means the value was actually encrypted. The other two
/// variants both carry the stored value unchanged; which one occurred tells
/// the caller whether the value was merely legacy plaintext or whether
/// something is wrong with it.
#[derive(Debug)]
pub enum Decryption {
    Decrypted(String),
    /// The value is not in the encrypted format at all.
    PassThrough(String),
    /// The value has the encrypted format but could not be decrypted.
    Failed { original: String, reason: Error },
}

impl Decryption {
    /// Collapse to the text to show, i.e., the plaintext if decryption
    /// succeeded and the original value otherwise.
    pub fn into_text(self) -> String {
        match self {
            Decryption::Decrypted(s) | Decryption::PassThrough(s) => s,
            Decryption::Failed { original, .. } => original,
        }
    }
}

/// Encrypts and decrypts fields on behalf of individual accounts.
///
/// Keys are always per-account: the passphrase mixes the account ID with the
/// shared secret, and a fresh salt is used for every value.
pub struct ContentCipher {
    secret: SecStr,
}

impl fmt::Debug for ContentCipher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ContentCipher").finish()
    }
}

impl ContentCipher {
    pub fn new(secret: &str) -> Self {
        ContentCipher {
            secret: SecStr::from(secret),
        }
    }

    /// Encrypt `plaintext` for `account`.
    ///
    /// If encryption fails, the error is logged and `plaintext` is returned
    /// unchanged so that the message can still be delivered.
    pub fn encrypt(
        &self,
        log_prefix: &LogPrefix,
        plaintext: &str,
        account: AccountId,
    ) -> String {
        match self.try_encrypt(plaintext, account) {
            Ok(encrypted) => encrypted,
            Err(e) => {
                error!(
                    "{} Encryption failed for account {}, storing content \
                     unencrypted: {}",
                    log_prefix, account, e
                );
                plaintext.to_owned()
            },
        }
    }

    /// Encrypt `plaintext` for `account`, returning any error that occurs.
    ///
    /// The empty string encrypts to itself.
    pub fn try_encrypt(
        &self,
        plaintext: &str,
        account: AccountId,
    ) -> Result<String, Error> {
        self.encrypt_with_salt(plaintext, account, OsRng.gen())
    }

    fn encrypt_with_salt(
        &self,
        plaintext: &str,
        account: AccountId,
        salt: [u8; SALT_LEN],
    ) -> Result<String, Error> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let key_iv = self.derive(account, &salt)?;
        let (key, iv) = key_iv.unsecure().split_at(KEY_LEN);
        let ciphertext = openssl::symm::encrypt(
            Cipher::aes_256_cbc(),
            key,
            Some(iv),
            plaintext.as_bytes(),
        )?;

        let mut assembled =
            Vec::with_capacity(MAGIC.len() + SALT_LEN + ciphertext.len());
        assembled.extend_from_slice(MAGIC);
        assembled.extend_from_slice(&salt);
        assembled.extend_from_slice(&ciphertext);
        Ok(base64::encode(&assembled))
    }

    /// Decrypt a stored field belonging to `account`.
    pub fn decrypt(&self, stored: &str, account: AccountId) -> Decryption {
        let raw = match base64::decode(stored) {
            Ok(raw) if raw.starts_with(MAGIC) => raw,
            _ => return Decryption::PassThrough(stored.to_owned()),
        };

        match self.decrypt_raw(&raw[MAGIC.len()..], account) {
            Ok(plaintext) => Decryption::Decrypted(plaintext),
            Err(reason) => Decryption::Failed {
                original: stored.to_owned(),
                reason,
            },
        }
    }

    /// Like `decrypt`, but collapses the result into the text to display,
    /// logging if the value looked encrypted but couldn't be decrypted.
    pub fn decrypt_or_original(
        &self,
        log_prefix: &LogPrefix,
        stored: &str,
        account: AccountId,
    ) -> String {
        let result = self.decrypt(stored, account);
        if let Decryption::Failed { ref reason, .. } = result {
            error!(
                "{} Decryption failed for account {}: {}",
                log_prefix, account, reason
            );
        }
        result.into_text()
    }

    fn decrypt_raw(
        &self,
        salted: &[u8],
        account: AccountId,
    ) -> Result<String, Error> {
        if salted.len() < SALT_LEN + AES_BLOCK
            || 0 != (salted.len() - SALT_LEN) % AES_BLOCK
        {
            return Err(Error::BadCiphertext);
        }

        let (salt, ciphertext) = salted.split_at(SALT_LEN);
        let key_iv = self.derive(account, salt)?;
        let (key, iv) = key_iv.unsecure().split_at(KEY_LEN);
        let plaintext = openssl::symm::decrypt(
            Cipher::aes_256_cbc(),
            key,
            Some(iv),
            ciphertext,
        )?;

        String::from_utf8(plaintext).map_err(|_| Error::BadPlaintext)
    }

    /// Derive the 48 bytes of key (first 32) and IV (last 16) for the given
    /// account and salt.
    fn derive(
        &self,
        account: AccountId,
        salt: &[u8],
    ) -> Result<SecBox<[u8; DERIVED_LEN]>, Error> {
        let passphrase = self.passphrase(account);
        let mut key_iv = SecBox::new(Box::new([0u8; DERIVED_LEN]));
        openssl::pkcs5::pbkdf2_hmac(
            passphrase.unsecure(),
            salt,
            PBKDF2_ITERATIONS,
            MessageDigest::sha256(),
            &mut key_iv.unsecure_mut()[..],
        )?;
        Ok(key_iv)
    }

    fn passphrase(&self, account: AccountId) -> SecStr {
        let prefix = format!("{}{}-", PASSPHRASE_PREFIX, account);
        let mut passphrase =
            Vec::with_capacity(prefix.len() + self.secret.unsecure().len());
        passphrase.extend_from_slice(prefix.as_bytes());
        passphrase.extend_from_slice(self.secret.unsecure());
        SecStr::new(passphrase)
    }
}
