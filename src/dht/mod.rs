/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Kademlia DHT (spec §4.5): routing table maintenance, iterative lookup,
//! randomized-replica store, and record validation.

pub mod kademlia;
pub mod kbucket;
pub mod rpc;

pub use kademlia::{DhtTransport, Kademlia, KademliaPtr};

use darkfi_serial::serialize;
use sha2::{Digest, Sha256};

use crate::{
    crypto::{pq::mldsa, verify_identifier_binding},
    error::{Error, Result},
    model::DhtRecord,
    util::{now_unix, time::DHT_RECORD_TTL_SECS},
};

pub const MAX_RECORD_BYTES: usize = 10 * 1024;
pub const ALPHA: usize = 3;

/// Computes the DHT key for an identifier: `SHA-256(identifier)` (spec
/// §4.5 "Store").
pub fn record_key(identifier: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hasher.finalize().into()
}

/// Validates an ingested record against every rule in spec §4.5 "Record
/// validation on ingest".
pub fn validate_record(record: &DhtRecord) -> Result<()> {
    if serialize(record).len() > MAX_RECORD_BYTES {
        return Err(Error::Malformed("DHT record exceeds 10 kB".into()));
    }
    if !verify_identifier_binding(&record.identifier, &record.kem_pk, &record.sig_pk) {
        return Err(Error::IdentifierMismatch);
    }
    if now_unix().saturating_sub(record.ts) > DHT_RECORD_TTL_SECS {
        return Err(Error::StaleRecord);
    }
    let sig_pk = mldsa::pk_from_bytes(&record.sig_pk)?;
    let sig = mldsa::sig_from_bytes(&record.addr_signature)?;
    if !mldsa::verify_detached(&sig, record.signed_bytes(), &sig_pk) {
        return Err(Error::InvalidSignature);
    }
    Ok(())
}
