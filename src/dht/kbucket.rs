/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! XOR-metric routing table: 256 k-buckets (one per bit prefix), each
//! holding up to `K` contacts plus a bounded replacement cache for contacts
//! waiting to take over if the live entry goes stale (spec §3 "DHT routing
//! table", §4.5, §5 "guarded by a mutex").

use std::{cmp::Ordering, collections::VecDeque};

use async_std::sync::Mutex;
use sha2::{Digest, Sha256};

pub const K: usize = 20;
pub const ID_BITS: usize = 256;
const REPLACEMENT_CACHE_SIZE: usize = K;

pub type NodeId = [u8; 32];

pub fn node_id_from_identifier(identifier: &str) -> NodeId {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hasher.finalize().into()
}

pub fn xor_distance(a: &NodeId, b: &NodeId) -> NodeId {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// Index of the bucket a node with this distance from us belongs to: the
/// position of the highest set bit, counting from the most significant bit
/// of byte 0. A zero distance (self) has no valid bucket.
pub fn bucket_index(distance: &NodeId) -> Option<usize> {
    for (byte_idx, byte) in distance.iter().enumerate() {
        if *byte != 0 {
            let leading = byte.leading_zeros() as usize;
            return Some(byte_idx * 8 + leading);
        }
    }
    None
}

#[derive(Clone, Debug)]
pub struct Contact {
    pub node_id: NodeId,
    pub address: String,
    pub last_seen: u64,
}

#[derive(Default)]
struct Bucket {
    contacts: VecDeque<Contact>,
    replacement_cache: VecDeque<Contact>,
}

/// The full 256-bucket table, behind a single mutex per spec §5.
pub struct RoutingTable {
    self_id: NodeId,
    buckets: Mutex<Vec<Bucket>>,
}

impl RoutingTable {
    pub fn new(self_id: NodeId) -> Self {
        let mut buckets = Vec::with_capacity(ID_BITS);
        buckets.resize_with(ID_BITS, Bucket::default);
        Self { self_id, buckets: Mutex::new(buckets) }
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    /// Inserts or refreshes a contact. If its bucket is full and the
    /// contact is new, it is parked in the replacement cache instead of
    /// evicting a live entry (the liveness loop does actual eviction).
    pub async fn insert_or_refresh(&self, contact: Contact) {
        let Some(idx) = bucket_index(&xor_distance(&self.self_id, &contact.node_id)) else {
            return; // that's us
        };
        let mut buckets = self.buckets.lock().await;
        let bucket = &mut buckets[idx];

        if let Some(pos) = bucket.contacts.iter().position(|c| c.node_id == contact.node_id) {
            bucket.contacts.remove(pos);
            bucket.contacts.push_back(contact);
            return;
        }

        if bucket.contacts.len() < K {
            bucket.contacts.push_back(contact);
            return;
        }

        if let Some(pos) = bucket.replacement_cache.iter().position(|c| c.node_id == contact.node_id) {
            bucket.replacement_cache.remove(pos);
        }
        if bucket.replacement_cache.len() >= REPLACEMENT_CACHE_SIZE {
            bucket.replacement_cache.pop_front();
        }
        bucket.replacement_cache.push_back(contact);
    }

    /// Evicts `node_id` from its bucket (liveness-loop timeout), promoting
    /// the most recently seen replacement-cache entry if one exists.
    pub async fn evict(&self, node_id: &NodeId) {
        let Some(idx) = bucket_index(&xor_distance(&self.self_id, node_id)) else { return };
        let mut buckets = self.buckets.lock().await;
        let bucket = &mut buckets[idx];
        if let Some(pos) = bucket.contacts.iter().position(|c| &c.node_id == node_id) {
            bucket.contacts.remove(pos);
            if let Some(replacement) = bucket.replacement_cache.pop_back() {
                bucket.contacts.push_back(replacement);
            }
        }
    }

    /// The `n` contacts closest to `target` across the whole table.
    pub async fn closest(&self, target: &NodeId, n: usize) -> Vec<Contact> {
        let buckets = self.buckets.lock().await;
        let mut all: Vec<Contact> = buckets.iter().flat_map(|b| b.contacts.iter().cloned()).collect();
        all.sort_by(|a, b| {
            let da = xor_distance(target, &a.node_id);
            let db = xor_distance(target, &b.node_id);
            da.cmp(&db)
        });
        all.truncate(n);
        all
    }

    pub async fn all_contacts(&self) -> Vec<Contact> {
        let buckets = self.buckets.lock().await;
        buckets.iter().flat_map(|b| b.contacts.iter().cloned()).collect()
    }

    /// Buckets untouched for longer than `max_age_secs`, with a random
    /// target ID to look up falling in each one (spec §4.5 bucket refresh).
    pub async fn stale_buckets(&self, now: u64, max_age_secs: u64) -> Vec<usize> {
        let buckets = self.buckets.lock().await;
        let mut stale = Vec::new();
        for (idx, bucket) in buckets.iter().enumerate() {
            let newest = bucket.contacts.iter().map(|c| c.last_seen).max();
            match newest {
                Some(last_seen) if now.saturating_sub(last_seen) > max_age_secs => stale.push(idx),
                None => {}
                _ => {}
            }
        }
        stale
    }

    pub async fn contacts_unseen_since(&self, now: u64, max_age_secs: u64) -> Vec<Contact> {
        let buckets = self.buckets.lock().await;
        buckets
            .iter()
            .flat_map(|b| b.contacts.iter())
            .filter(|c| now.saturating_sub(c.last_seen) > max_age_secs)
            .cloned()
            .collect()
    }
}

/// Ordering helper so candidate shortlists can be merged and deduped by
/// distance to a target (used by the iterative lookup).
pub fn by_distance_to<'a>(target: &'a NodeId) -> impl Fn(&Contact, &Contact) -> Ordering + 'a {
    move |a, b| xor_distance(target, &a.node_id).cmp(&xor_distance(target, &b.node_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_index_is_bit_position_of_highest_set_bit() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[31] = 0b0000_0001;
        b[31] = 0b0000_0000;
        assert_eq!(bucket_index(&xor_distance(&a, &b)), Some(255));

        let mut c = [0u8; 32];
        c[0] = 0b1000_0000;
        assert_eq!(bucket_index(&xor_distance(&c, &[0u8; 32])), Some(0));
    }

    #[async_std::test]
    async fn closest_sorts_by_xor_distance() {
        let self_id = [0u8; 32];
        let table = RoutingTable::new(self_id);
        let mut far = [0u8; 32];
        far[0] = 0xff;
        let mut near = [0u8; 32];
        near[31] = 0x01;

        table.insert_or_refresh(Contact { node_id: far, address: "far".into(), last_seen: 0 }).await;
        table.insert_or_refresh(Contact { node_id: near, address: "near".into(), last_seen: 0 }).await;

        let closest = table.closest(&self_id, 2).await;
        assert_eq!(closest[0].address, "near");
        assert_eq!(closest[1].address, "far");
    }
}
