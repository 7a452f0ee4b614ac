/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Thin wrappers around the FIPS 203/204 post-quantum primitives, sized
//! exactly as spec §3 requires: ML-KEM-512 (kem_pk 800B / kem_sk 1632B /
//! ciphertext 768B) and ML-DSA-44 ("MLDSA2" in the spec's naming: sig_pk
//! 1312B / sig_sk 2560B / detached signature 2420B).

use pqcrypto_traits::{
    kem::{Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _},
    sign::{DetachedSignature as _, PublicKey as _, SecretKey as _},
};

use crate::error::{Error, Result};

pub mod mlkem {
    use super::*;
    pub use pqcrypto_mlkem::mlkem512::{
        Ciphertext, PublicKey, SecretKey, SharedSecret,
    };

    pub const PUBLIC_KEY_BYTES: usize = 800;
    pub const SECRET_KEY_BYTES: usize = 1632;
    pub const CIPHERTEXT_BYTES: usize = 768;

    pub fn keypair() -> (PublicKey, SecretKey) {
        pqcrypto_mlkem::mlkem512::keypair()
    }

    pub fn encapsulate(pk: &PublicKey) -> (SharedSecret, Ciphertext) {
        let (ss, ct) = pqcrypto_mlkem::mlkem512::encapsulate(pk);
        (ss, ct)
    }

    pub fn decapsulate(ct: &Ciphertext, sk: &SecretKey) -> SharedSecret {
        pqcrypto_mlkem::mlkem512::decapsulate(ct, sk)
    }

    pub fn pk_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
        PublicKey::from_bytes(bytes).map_err(|_| Error::Malformed("bad kem_pk".into()))
    }

    pub fn sk_from_bytes(bytes: &[u8]) -> Result<SecretKey> {
        SecretKey::from_bytes(bytes).map_err(|_| Error::Malformed("bad kem_sk".into()))
    }

    pub fn ct_from_bytes(bytes: &[u8]) -> Result<Ciphertext> {
        Ciphertext::from_bytes(bytes).map_err(|_| Error::Malformed("bad kem_ct".into()))
    }
}

pub mod mldsa {
    use super::*;
    pub use pqcrypto_mldsa::mldsa44::{
        DetachedSignature, PublicKey, SecretKey,
    };

    pub const PUBLIC_KEY_BYTES: usize = 1312;
    pub const SECRET_KEY_BYTES: usize = 2560;
    pub const SIGNATURE_BYTES: usize = 2420;

    pub fn keypair() -> (PublicKey, SecretKey) {
        pqcrypto_mldsa::mldsa44::keypair()
    }

    pub fn sign_detached(msg: &[u8], sk: &SecretKey) -> DetachedSignature {
        pqcrypto_mldsa::mldsa44::detached_sign(msg, sk)
    }

    pub fn verify_detached(sig: &DetachedSignature, msg: &[u8], pk: &PublicKey) -> bool {
        pqcrypto_mldsa::mldsa44::verify_detached_signature(sig, msg, pk).is_ok()
    }

    pub fn pk_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
        PublicKey::from_bytes(bytes).map_err(|_| Error::Malformed("bad sig_pk".into()))
    }

    pub fn sk_from_bytes(bytes: &[u8]) -> Result<SecretKey> {
        SecretKey::from_bytes(bytes).map_err(|_| Error::Malformed("bad sig_sk".into()))
    }

    pub fn sig_from_bytes(bytes: &[u8]) -> Result<DetachedSignature> {
        DetachedSignature::from_bytes(bytes).map_err(|_| Error::Malformed("bad signature".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqcrypto_traits::{kem::PublicKey as _, kem::SecretKey as _, kem::Ciphertext as _, sign::PublicKey as _, sign::SecretKey as _, sign::DetachedSignature as _};

    #[test]
    fn mlkem_sizes_match_spec() {
        let (pk, sk) = mlkem::keypair();
        assert_eq!(pk.as_bytes().len(), mlkem::PUBLIC_KEY_BYTES);
        assert_eq!(sk.as_bytes().len(), mlkem::SECRET_KEY_BYTES);
        let (_ss, ct) = mlkem::encapsulate(&pk);
        assert_eq!(ct.as_bytes().len(), mlkem::CIPHERTEXT_BYTES);
    }

    #[test]
    fn mldsa_sizes_match_spec() {
        let (pk, sk) = mldsa::keypair();
        assert_eq!(pk.as_bytes().len(), mldsa::PUBLIC_KEY_BYTES);
        assert_eq!(sk.as_bytes().len(), mldsa::SECRET_KEY_BYTES);
        let sig = mldsa::sign_detached(b"hello", &sk);
        assert_eq!(sig.as_bytes().len(), mldsa::SIGNATURE_BYTES);
        assert!(mldsa::verify_detached(&sig, b"hello", &pk));
        assert!(!mldsa::verify_detached(&sig, b"tampered", &pk));
    }

    #[test]
    fn mlkem_roundtrip() {
        let (pk, sk) = mlkem::keypair();
        let (ss1, ct) = mlkem::encapsulate(&pk);
        let ss2 = mlkem::decapsulate(&ct, &sk);
        assert_eq!(ss1.as_bytes(), ss2.as_bytes());
    }
}
