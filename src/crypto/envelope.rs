/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Encrypt/Decrypt — the cryptographic envelope (spec §4.2). Hybrid
//! post-quantum encryption: ML-KEM-512 establishes a shared secret, HKDF
//! stretches it into an AES-256-GCM key, and ML-DSA-44 signs the plaintext
//! inner payload rather than the ciphertext, so the signature doubles as a
//! stable, content-addressed message ID for the seen set (spec §4.2
//! rationale).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use darkfi_serial::{deserialize, serialize};
use hkdf::Hkdf;
use pqcrypto_traits::{
    kem::{Ciphertext as _, PublicKey as _, SharedSecret as _},
    sign::{DetachedSignature as _, PublicKey as _},
};
use rand::RngCore;
use sha2::Sha256;

use super::{
    identity::Identity,
    pq::{mldsa, mlkem},
    verify_identifier_binding,
};
use crate::{
    error::{Error, Result},
    model::{InnerPayload, WireMessage},
    util::now_unix,
};

const NONCE_LEN: usize = 12;

/// A recipient's public material — either a `Contact` or a freshly generated
/// `Identity`'s public half; callers pass whichever they have.
pub struct RecipientKeys<'a> {
    pub identifier: &'a str,
    pub kem_pk: &'a [u8],
}

fn derive_key(shared_secret: &[u8]) -> [u8; 32] {
    // Empty salt/info: faithful to the source wire format (spec §4.2, §9
    // open questions) even though a protocol label would be best practice.
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut okm = [0u8; 32];
    hk.expand(&[], &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

/// Result of a successful `Decrypt` (spec §4.2 step 6).
pub struct Decrypted {
    pub msg: Vec<u8>,
    pub sender_id: String,
    pub addr: String,
    pub ts: u64,
    pub kem_pk: Vec<u8>,
    pub sig_pk: Vec<u8>,
}

/// Builds a wire message encrypting `plaintext` from `sender` to `recipient`,
/// with a randomized TTL and retry budget at creation (spec §4.2 step 6).
pub fn encrypt(
    sender: &Identity,
    self_addr: &str,
    recipient: &RecipientKeys,
    plaintext: &[u8],
) -> Result<WireMessage> {
    let inner = InnerPayload {
        addr: self_addr.to_string(),
        msg: plaintext.to_vec(),
        sender_id: sender.identifier.clone(),
        ts: now_unix(),
        sig_pk: sender.sig_pk.as_bytes().to_vec(),
        kem_pk: sender.kem_pk.as_bytes().to_vec(),
    };
    let inner_bytes = serialize(&inner);

    let recipient_pk = mlkem::pk_from_bytes(recipient.kem_pk)?;
    let (shared_secret, kem_ct) = mlkem::encapsulate(&recipient_pk);
    let key = derive_key(shared_secret.as_bytes());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let msg_ct = cipher
        .encrypt(nonce, inner_bytes.as_slice())
        .map_err(|_| Error::Aead)?;

    let sig_sk = sender.sig_secret_key()?;
    let sig = mldsa::sign_detached(&inner_bytes, &sig_sk);

    let ttl = 8 + (rand::random::<u8>() % 5); // uniform{8..12}
    let max_retry = 3 + (rand::random::<u8>() % 5); // uniform{3..7}

    Ok(WireMessage {
        current_node_id: sender.identifier.clone(),
        recipient_id: recipient.identifier.to_string(),
        kem_ct: kem_ct.as_bytes().to_vec(),
        msg_ct,
        nonce: nonce_bytes.to_vec(),
        sig: sig.as_bytes().to_vec(),
        ttl,
        max_retry,
    })
}

/// Decrypts `outer`, which the caller has already confirmed is addressed to
/// `recipient` (`outer.recipient_id == recipient.identifier`). Every failure
/// mode here is meant to be caught and silently dropped by the routing
/// engine (spec §7 propagation policy) rather than surfaced to a peer.
pub fn decrypt(recipient: &Identity, outer: &WireMessage) -> Result<Decrypted> {
    let kem_sk = recipient.kem_secret_key()?;
    let kem_ct = mlkem::ct_from_bytes(&outer.kem_ct).map_err(|_| Error::Decap)?;
    let shared_secret = mlkem::decapsulate(&kem_ct, &kem_sk);
    let key = derive_key(shared_secret.as_bytes());

    if outer.nonce.len() != NONCE_LEN {
        return Err(Error::Malformed("nonce must be 12 bytes".into()));
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Nonce::from_slice(&outer.nonce);
    let inner_bytes = cipher
        .decrypt(nonce, outer.msg_ct.as_slice())
        .map_err(|_| Error::Aead)?;

    let inner: InnerPayload =
        deserialize(&inner_bytes).map_err(|e| Error::Malformed(format!("bad inner payload: {e}")))?;

    let sig_pk = mldsa::pk_from_bytes(&inner.sig_pk)?;
    let sig = mldsa::sig_from_bytes(&outer.sig)?;
    if !mldsa::verify_detached(&sig, &inner_bytes, &sig_pk) {
        return Err(Error::InvalidSignature);
    }

    if !verify_identifier_binding(&inner.sender_id, &inner.kem_pk, &inner.sig_pk) {
        return Err(Error::IdentifierMismatch);
    }

    Ok(Decrypted {
        msg: inner.msg,
        sender_id: inner.sender_id,
        addr: inner.addr,
        ts: inner.ts,
        kem_pk: inner.kem_pk,
        sig_pk: inner.sig_pk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::identity::Identity;

    fn recipient_keys(id: &Identity) -> RecipientKeys<'_> {
        RecipientKeys { identifier: &id.identifier, kem_pk: id.kem_pk.as_bytes() }
    }

    #[test]
    fn round_trip_preserves_message_and_sender() {
        let alice = Identity::generate();
        let bob = Identity::generate();

        let wire = encrypt(&alice, "alice.b32.i2p", &recipient_keys(&bob), b"hello bob").unwrap();
        assert!((8..=12).contains(&wire.ttl));
        assert!((3..=7).contains(&wire.max_retry));

        let decrypted = decrypt(&bob, &wire).unwrap();
        assert_eq!(decrypted.msg, b"hello bob");
        assert_eq!(decrypted.sender_id, alice.identifier);
        assert_eq!(decrypted.addr, "alice.b32.i2p");
    }

    #[test]
    fn tampered_ciphertext_fails_decrypt() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let mut wire = encrypt(&alice, "alice.b32.i2p", &recipient_keys(&bob), b"hi").unwrap();
        wire.msg_ct[0] ^= 0xff;
        assert!(decrypt(&bob, &wire).is_err());
    }

    #[test]
    fn tampered_signature_fails_decrypt() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let mut wire = encrypt(&alice, "alice.b32.i2p", &recipient_keys(&bob), b"hi").unwrap();
        wire.sig[0] ^= 0xff;
        assert!(decrypt(&bob, &wire).is_err());
    }

    #[test]
    fn tampered_nonce_fails_decrypt() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let mut wire = encrypt(&alice, "alice.b32.i2p", &recipient_keys(&bob), b"hi").unwrap();
        wire.nonce[0] ^= 0xff;
        assert!(decrypt(&bob, &wire).is_err());
    }

    #[test]
    fn wrong_recipient_cannot_decapsulate_correctly() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let eve = Identity::generate();
        let wire = encrypt(&alice, "alice.b32.i2p", &recipient_keys(&bob), b"hi").unwrap();
        assert!(decrypt(&eve, &wire).is_err());
    }
}
