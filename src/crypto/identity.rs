/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Identity & Keystore (spec §4.1). Generates both post-quantum key pairs,
//! derives the self-certifying identifier, and seals/unseals the secret
//! material at rest under a password with scrypt + a fast HMAC "keycheck"
//! gate in front of the AEAD decryption, so a wrong password is rejected
//! without ever handing an attacker an AEAD oracle.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use hmac::{Hmac, Mac};
use pqcrypto_traits::{
    kem::{PublicKey as _, SecretKey as _},
    sign::{PublicKey as _, SecretKey as _},
};
use rand::RngCore;
use scrypt::Params as ScryptParams;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use super::pq::{mldsa, mlkem};
use crate::{
    crypto::compute_identifier,
    error::{Error, Result},
};

const SCRYPT_LOG_N: u8 = 14; // N = 2^14
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const DERIVED_KEY_LEN: usize = 32;
const KEYCHECK_CONTEXT: &[u8] = b"keycheck";

/// In-memory identity: both key pairs, zeroized on drop, plus the derived
/// identifier. Secret key bytes live in `Zeroizing` buffers; the typed
/// pqcrypto secret-key objects used for a single sign/decapsulate call are
/// reconstructed on demand and dropped immediately afterwards, since the
/// `pqcrypto-*` types themselves do not implement `Zeroize`.
pub struct Identity {
    pub identifier: String,
    pub kem_pk: mlkem::PublicKey,
    pub sig_pk: mldsa::PublicKey,
    kem_sk_bytes: Zeroizing<Vec<u8>>,
    sig_sk_bytes: Zeroizing<Vec<u8>>,
}

impl Identity {
    /// Generates both post-quantum key pairs and derives the identifier.
    pub fn generate() -> Self {
        let (kem_pk, kem_sk) = mlkem::keypair();
        let (sig_pk, sig_sk) = mldsa::keypair();
        let identifier = compute_identifier(kem_pk.as_bytes(), sig_pk.as_bytes());
        Self {
            identifier,
            kem_pk,
            sig_pk,
            kem_sk_bytes: Zeroizing::new(kem_sk.as_bytes().to_vec()),
            sig_sk_bytes: Zeroizing::new(sig_sk.as_bytes().to_vec()),
        }
    }

    pub fn kem_secret_key(&self) -> Result<mlkem::SecretKey> {
        mlkem::sk_from_bytes(&self.kem_sk_bytes)
    }

    pub fn sig_secret_key(&self) -> Result<mldsa::SecretKey> {
        mldsa::sk_from_bytes(&self.sig_sk_bytes)
    }
}

/// On-disk form of the sealed keystore (spec §3 "Sealed key file").
#[derive(Serialize, Deserialize)]
struct SealedKeyFile {
    salt: String,
    nonce: String,
    kem_pk: String,
    sig_pk: String,
    enc_secrets: String,
    keycheck_hmac: String,
}

fn derive_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; DERIVED_KEY_LEN]>> {
    let params = ScryptParams::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, DERIVED_KEY_LEN)
        .map_err(|e| Error::Custom(format!("invalid scrypt params: {e}")))?;
    let mut out = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    scrypt::scrypt(password.as_bytes(), salt, &params, out.as_mut())
        .map_err(|e| Error::Custom(format!("scrypt failed: {e}")))?;
    Ok(out)
}

fn keycheck_hmac(derived_key: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(derived_key).expect("HMAC accepts any key size");
    mac.update(KEYCHECK_CONTEXT);
    mac.finalize().into_bytes().to_vec()
}

/// Creates a brand-new identity and seals it to `path` under `password`.
/// Identity is created once, at first unlock, and never mutated except by
/// key rotation (spec §3 lifecycle).
pub fn create(path: &Path, password: &str) -> Result<Identity> {
    let identity = Identity::generate();
    seal(&identity, path, password)?;
    Ok(identity)
}

/// Re-encrypts `identity` under `password` and atomically overwrites `path`
/// (write-temp, fsync, rename — spec §3/§4.1).
pub fn seal(identity: &Identity, path: &Path, password: &str) -> Result<()> {
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let derived = derive_key(password, &salt)?;
    let hmac = keycheck_hmac(derived.as_ref());

    let mut secrets = Vec::with_capacity(identity.kem_sk_bytes.len() + identity.sig_sk_bytes.len());
    secrets.extend_from_slice(&identity.kem_sk_bytes);
    secrets.extend_from_slice(&identity.sig_sk_bytes);
    let secrets = Zeroizing::new(secrets);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(derived.as_ref()));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let enc_secrets = cipher
        .encrypt(nonce, secrets.as_slice())
        .map_err(|_| Error::Custom("sealing failed".into()))?;

    let sealed = SealedKeyFile {
        salt: crate::util::b64_encode(&salt),
        nonce: crate::util::b64_encode(&nonce_bytes),
        kem_pk: crate::util::b64_encode(identity.kem_pk.as_bytes()),
        sig_pk: crate::util::b64_encode(identity.sig_pk.as_bytes()),
        enc_secrets: crate::util::b64_encode(&enc_secrets),
        keycheck_hmac: crate::util::b64_encode(&hmac),
    };

    let json = serde_json::to_vec_pretty(&sealed)?;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(&json)?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    Ok(())
}

/// Unlocks the keystore at `path` with `password`.
///
/// The HMAC "keycheck" is verified *before* attempting AEAD decryption: a
/// wrong password is rejected in the time it takes to run scrypt once and
/// compare two 32-byte MACs, never touching the AEAD tag (spec §4.1, S2).
pub fn unlock(path: &Path, password: &str) -> Result<Identity> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::CorruptKeystore(format!("cannot read keystore: {e}")))?;
    let sealed: SealedKeyFile = serde_json::from_slice(&bytes)
        .map_err(|e| Error::CorruptKeystore(format!("malformed keystore json: {e}")))?;

    let salt = crate::util::b64_decode(&sealed.salt)?;
    let nonce_bytes = crate::util::b64_decode(&sealed.nonce)?;
    let kem_pk_bytes = crate::util::b64_decode(&sealed.kem_pk)?;
    let sig_pk_bytes = crate::util::b64_decode(&sealed.sig_pk)?;
    let enc_secrets = crate::util::b64_decode(&sealed.enc_secrets)?;
    let stored_hmac = crate::util::b64_decode(&sealed.keycheck_hmac)?;

    let derived = derive_key(password, &salt)?;
    let computed_hmac = keycheck_hmac(derived.as_ref());

    if computed_hmac.ct_eq(&stored_hmac).unwrap_u8() != 1 {
        return Err(Error::WrongPassword);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(derived.as_ref()));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let secrets = cipher
        .decrypt(nonce, enc_secrets.as_slice())
        .map_err(|_| Error::CorruptKeystore("AEAD decryption failed".into()))?;
    let secrets = Zeroizing::new(secrets);

    if secrets.len() != mlkem::SECRET_KEY_BYTES + mldsa::SECRET_KEY_BYTES {
        return Err(Error::CorruptKeystore("unexpected secret key length".into()));
    }
    let (kem_sk_bytes, sig_sk_bytes) = secrets.split_at(mlkem::SECRET_KEY_BYTES);

    let kem_pk = mlkem::pk_from_bytes(&kem_pk_bytes)?;
    let sig_pk = mldsa::pk_from_bytes(&sig_pk_bytes)?;
    let identifier = compute_identifier(kem_pk.as_bytes(), sig_pk.as_bytes());

    Ok(Identity {
        identifier,
        kem_pk,
        sig_pk,
        kem_sk_bytes: Zeroizing::new(kem_sk_bytes.to_vec()),
        sig_sk_bytes: Zeroizing::new(sig_sk_bytes.to_vec()),
    })
}

pub fn default_keystore_path(data_dir: &Path) -> PathBuf {
    data_dir.join("user_keys.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_seal_and_unlock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_keys.json");

        let created = create(&path, "correct horse").unwrap();
        let unlocked = unlock(&path, "correct horse").unwrap();
        assert_eq!(created.identifier, unlocked.identifier);
        assert_eq!(created.kem_pk.as_bytes(), unlocked.kem_pk.as_bytes());
        assert_eq!(created.sig_pk.as_bytes(), unlocked.sig_pk.as_bytes());
    }

    #[test]
    fn wrong_password_is_rejected_before_aead() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_keys.json");
        create(&path, "a").unwrap();

        let start = std::time::Instant::now();
        let err = unlock(&path, "b").unwrap_err();
        assert!(start.elapsed() < std::time::Duration::from_millis(500));
        assert!(matches!(err, Error::WrongPassword));
    }

    #[test]
    fn identifier_matches_invariant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_keys.json");
        let identity = create(&path, "pw").unwrap();
        assert!(crate::crypto::verify_identifier_binding(
            &identity.identifier,
            identity.kem_pk.as_bytes(),
            identity.sig_pk.as_bytes(),
        ));
    }
}
