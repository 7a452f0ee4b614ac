/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

pub mod envelope;
pub mod identity;
pub mod pq;

use sha2::{Digest, Sha256};

use crate::util::encoding::identifier_from_hash;

/// Computes the self-certifying identifier `base64url(SHA-256(kem_pk ‖
/// sig_pk))` (spec §3). Both the keystore and any inbound-message verifier
/// must agree on this exact construction.
pub fn compute_identifier(kem_pk: &[u8], sig_pk: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kem_pk);
    hasher.update(sig_pk);
    let digest: [u8; 32] = hasher.finalize().into();
    identifier_from_hash(&digest)
}

/// Verifies that `identifier` is exactly `compute_identifier(kem_pk, sig_pk)`.
/// Every party accepting a claimed `(identifier, kem_pk, sig_pk)` triple —
/// a new contact, an inbound inner payload, a DHT record — must call this
/// before trusting it (spec §3 invariant).
pub fn verify_identifier_binding(identifier: &str, kem_pk: &[u8], sig_pk: &[u8]) -> bool {
    compute_identifier(kem_pk, sig_pk) == identifier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_44_chars_and_deterministic() {
        let kem_pk = vec![1u8; pq::mlkem::PUBLIC_KEY_BYTES];
        let sig_pk = vec![2u8; pq::mldsa::PUBLIC_KEY_BYTES];
        let id1 = compute_identifier(&kem_pk, &sig_pk);
        let id2 = compute_identifier(&kem_pk, &sig_pk);
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 44);
        assert!(verify_identifier_binding(&id1, &kem_pk, &sig_pk));
        assert!(!verify_identifier_binding(&id1, &sig_pk, &kem_pk));
    }
}
