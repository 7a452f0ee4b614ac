/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Iterative lookup, randomized-replica store, and the four maintenance
//! loops (spec §4.5). Transport is abstracted behind `DhtTransport` so this
//! module stays free of HTTP/proxy concerns — `net::transport` provides the
//! real implementation, routed through the anonymous overlay.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use rand::seq::SliceRandom;

use super::{
    kbucket::{by_distance_to, Contact, NodeId, RoutingTable, K},
    record_key, validate_record, ALPHA,
};
use crate::{
    error::Result,
    model::DhtRecord,
    store::DhtStorePtr,
    util::{
        now_unix,
        time::{DHT_REPUBLISH_INTERVAL_SECS, DHT_VALUE_EXPIRE_SECS},
    },
};

pub type KademliaPtr = Arc<Kademlia>;

/// What a `find_node`/`find_value` round returned from one peer.
pub enum FindOutcome {
    Value(DhtRecord),
    Nodes(Vec<Contact>),
}

/// Network-facing half of the DHT, implemented by `net::transport`. Kept as
/// a trait so the lookup/store/maintenance logic here can be exercised
/// without a real HTTP stack.
#[async_trait]
pub trait DhtTransport: Send + Sync {
    async fn ping(&self, address: &str) -> Result<NodeId>;
    async fn store(&self, address: &str, node_id: &NodeId, key: &[u8], value: &DhtRecord) -> Result<bool>;
    async fn find(&self, address: &str, node_id: &NodeId, key: &[u8]) -> Result<FindOutcome>;
}

pub struct Kademlia {
    pub table: RoutingTable,
    store: DhtStorePtr,
    transport: Arc<dyn DhtTransport>,
}

impl Kademlia {
    pub fn new(self_id: NodeId, store: DhtStorePtr, transport: Arc<dyn DhtTransport>) -> KademliaPtr {
        Arc::new(Self { table: RoutingTable::new(self_id), store, transport })
    }

    /// Iterative lookup toward `target` (spec §4.5 "Lookup"). Returns the
    /// first validly signed record if `want_value`, otherwise the k closest
    /// live contacts found.
    pub async fn lookup(&self, target: &NodeId, want_value: bool) -> Result<(Option<DhtRecord>, Vec<Contact>)> {
        let mut shortlist = self.table.closest(target, K).await;
        let mut queried: HashSet<NodeId> = HashSet::new();
        let mut closest_known: Option<NodeId> = shortlist.first().map(|c| c.node_id);

        loop {
            let to_query: Vec<Contact> = shortlist
                .iter()
                .filter(|c| !queried.contains(&c.node_id))
                .take(ALPHA)
                .cloned()
                .collect();
            if to_query.is_empty() {
                break;
            }

            // Fire the whole round at once: spec §4.5 requires α parallel
            // RPCs per round, not a serial sweep (a serial sweep lets a
            // single slow or Sybil peer stall the entire lookup).
            let round = join_all(to_query.iter().map(|contact| {
                let key = record_key_for(target);
                async move {
                    let outcome = self.transport.find(&contact.address, &contact.node_id, &key).await;
                    (contact, outcome)
                }
            }))
            .await;

            let mut any_progress = false;
            for (contact, outcome) in round {
                queried.insert(contact.node_id);
                match outcome {
                    Ok(FindOutcome::Value(record)) if want_value => {
                        if validate_record(&record).is_ok() {
                            return Ok((Some(record), shortlist));
                        }
                        warn!(target: "dht::kademlia", "discarding invalid record from {}", contact.address);
                    }
                    Ok(FindOutcome::Value(_)) => {}
                    Ok(FindOutcome::Nodes(nodes)) => {
                        self.table
                            .insert_or_refresh(contact.clone())
                            .await;
                        for n in nodes {
                            if shortlist.iter().all(|c| c.node_id != n.node_id) {
                                shortlist.push(n);
                            }
                        }
                        shortlist.sort_by(by_distance_to(target));
                        shortlist.truncate(K);
                    }
                    Err(e) => {
                        debug!(target: "dht::kademlia", "find RPC to {} failed: {e}", contact.address);
                        continue;
                    }
                }
                any_progress = true;
            }

            let new_closest = shortlist.first().map(|c| c.node_id);
            if !any_progress || new_closest == closest_known && queried.len() >= shortlist.len() {
                break;
            }
            closest_known = new_closest;
        }

        Ok((None, shortlist))
    }

    /// Stores `record` onto a randomized replica set (spec §4.5 "Store").
    /// Succeeds if at least ⌈k/2⌉ nodes accept it.
    pub async fn store(&self, record: &DhtRecord, originator: bool) -> Result<bool> {
        validate_record(record)?;
        self.store.put_value(record, originator).await?;

        let key = record_key(&record.identifier);
        let target_count = K + (rand::random::<usize>() % 6); // uniform{k..k+5}
        let candidate_pool = 2 * target_count;
        let mut candidates = self.table.closest(&key, candidate_pool).await;
        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(target_count);

        // Replicas are stored to in parallel too: a Sybil cluster that can
        // only answer one store RPC at a time shouldn't be able to delay
        // replication to the honest remainder of the replica set.
        let results = join_all(candidates.iter().map(|contact| {
            let key = &key;
            async move { self.transport.store(&contact.address, &contact.node_id, key, record).await }
        }))
        .await;

        let mut accepted = 0usize;
        for (contact, result) in candidates.iter().zip(results) {
            match result {
                Ok(true) => accepted += 1,
                Ok(false) => {}
                Err(e) => debug!(target: "dht::kademlia", "store RPC to {} failed: {e}", contact.address),
            }
        }
        Ok(accepted >= K.div_ceil(2))
    }

    /// Bucket refresh: for each bucket untouched for an hour, look up a
    /// random ID in its range (spec §4.5).
    pub async fn refresh_stale_buckets(&self, max_age_secs: u64) -> Result<()> {
        let stale = self.table.stale_buckets(now_unix(), max_age_secs).await;
        for bucket_idx in stale {
            let target = random_id_in_bucket(&self.table.self_id(), bucket_idx);
            let _ = self.lookup(&target, false).await;
        }
        Ok(())
    }

    /// Replication: re-store every locally held value to a freshly sampled
    /// replica set (spec §4.5, hourly).
    pub async fn replicate_all(&self) -> Result<()> {
        for record in self.store.all_values().await? {
            let originator = self.store.originated_values().await?.iter().any(|r| r.identifier == record.identifier);
            if let Err(e) = self.store(&record, originator).await {
                warn!(target: "dht::kademlia", "replication of {} failed: {e}", record.identifier);
            }
        }
        Ok(())
    }

    /// Expiration: delete entries older than 24h, republishing the ones we
    /// originated instead of dropping them (spec §4.5, 6-hourly).
    pub async fn expire_and_republish(&self) -> Result<()> {
        let to_republish = self.store.expire_values(DHT_VALUE_EXPIRE_SECS).await?;
        for mut record in to_republish {
            record.ts = now_unix();
            if let Err(e) = self.store(&record, true).await {
                warn!(target: "dht::kademlia", "republish of {} failed: {e}", record.identifier);
            }
        }
        Ok(())
    }

    /// Liveness: ping contacts unseen for 15 minutes, evicting on timeout
    /// (spec §4.5, 5-minutely).
    pub async fn check_liveness(&self, max_idle_secs: u64) -> Result<()> {
        let stale = self.table.contacts_unseen_since(now_unix(), max_idle_secs).await;
        for contact in stale {
            match self.transport.ping(&contact.address).await {
                Ok(_) => {
                    self.table
                        .insert_or_refresh(Contact { last_seen: now_unix(), ..contact })
                        .await;
                }
                Err(_) => self.table.evict(&contact.node_id).await,
            }
        }
        Ok(())
    }

    /// Whether `DHT_REPUBLISH_INTERVAL_SECS` has elapsed is left to the
    /// caller's scheduling loop; exposed here only as a shared constant.
    pub fn republish_interval_secs() -> u64 {
        DHT_REPUBLISH_INTERVAL_SECS
    }
}

fn record_key_for(target: &NodeId) -> Vec<u8> {
    target.to_vec()
}

fn random_id_in_bucket(self_id: &NodeId, bucket_idx: usize) -> NodeId {
    let mut id = *self_id;
    let byte = bucket_idx / 8;
    let bit = 7 - (bucket_idx % 8);
    id[byte] ^= 1 << bit;
    // Randomize the bits below the flipped one so we don't always probe the
    // exact same ID within the bucket's range.
    for b in (byte + 1)..32 {
        id[b] = rand::random();
    }
    id
}
