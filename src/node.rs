/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! The explicit `Node` value (spec §9 "Global mutable state"): replaces the
//! source's single long-lived messenger object. Every handler and
//! background task is handed an `Arc<Node>` instead of reaching into module
//! statics.

use std::sync::Arc;

use async_std::sync::RwLock;

use crate::{
    crypto::identity::Identity,
    dht::KademliaPtr,
    net::overlay::OverlayInfo,
    store::{ContactStorePtr, DhtStorePtr, ForwardQueuePtr, InboxStorePtr, SeenSetPtr},
};

pub type NodePtr = Arc<Node>;

pub struct Node {
    /// Single-writer (the user, via seal/rotate); readers hold a read lock
    /// for the duration of an encrypt/decrypt (spec §5 "Keystore").
    pub identity: RwLock<Identity>,
    pub overlay: RwLock<OverlayInfo>,
    pub contacts: ContactStorePtr,
    pub inbox: InboxStorePtr,
    pub forward_queue: ForwardQueuePtr,
    pub seen_set: SeenSetPtr,
    pub dht: KademliaPtr,
    pub dht_store: DhtStorePtr,
}

impl Node {
    pub fn new(
        identity: Identity,
        overlay: OverlayInfo,
        contacts: ContactStorePtr,
        inbox: InboxStorePtr,
        forward_queue: ForwardQueuePtr,
        seen_set: SeenSetPtr,
        dht: KademliaPtr,
        dht_store: DhtStorePtr,
    ) -> NodePtr {
        Arc::new(Self {
            identity: RwLock::new(identity),
            overlay: RwLock::new(overlay),
            contacts,
            inbox,
            forward_queue,
            seen_set,
            dht,
            dht_store,
        })
    }

    pub async fn identifier(&self) -> String {
        self.identity.read().await.identifier.clone()
    }

    pub async fn self_addr(&self) -> String {
        self.overlay.read().await.local_address.clone()
    }
}
