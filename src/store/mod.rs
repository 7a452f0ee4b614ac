/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Persistent stores (spec §3, §6): two embedded SQLite databases — one
//! holding contacts/inbox/forward-queue/seen-set, the other the DHT routing
//! table and value store — following the teacher's `WalletDb` pattern
//! (`bin/drk/src/walletdb.rs`) of a single connection behind an async mutex.

pub mod contacts;
pub mod db;
pub mod dht_store;
pub mod forward_queue;
pub mod inbox;
pub mod seen_set;

use std::{path::Path, sync::Arc};

use crate::error::Result;

pub use contacts::{ContactStore, ContactStorePtr};
pub use db::Database;
pub use dht_store::{DhtStore, DhtStorePtr};
pub use forward_queue::{ForwardQueue, ForwardQueuePtr};
pub use inbox::{InboxStore, InboxStorePtr};
pub use seen_set::{SeenSet, SeenSetPtr};

/// Everything backed by the "messages" database (spec §6): contacts,
/// inbox, forward queue, seen set.
pub struct MessageStores {
    pub contacts: ContactStorePtr,
    pub inbox: InboxStorePtr,
    pub forward_queue: ForwardQueuePtr,
    pub seen_set: SeenSetPtr,
}

impl MessageStores {
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Arc::new(Database::open(path)?);
        Ok(Self {
            contacts: ContactStore::new(db.clone()).await?,
            inbox: InboxStore::new(db.clone()).await?,
            forward_queue: ForwardQueue::new(db.clone()).await?,
            seen_set: SeenSet::new(db).await?,
        })
    }

    /// In-memory variant for tests: same schema, no file on disk.
    pub async fn open_in_memory_for_test() -> Self {
        let db = Arc::new(Database::open_in_memory().expect("open in-memory message db"));
        Self {
            contacts: ContactStore::new(db.clone()).await.expect("init contacts table"),
            inbox: InboxStore::new(db.clone()).await.expect("init inbox table"),
            forward_queue: ForwardQueue::new(db.clone()).await.expect("init forward_queue table"),
            seen_set: SeenSet::new(db).await.expect("init seen_set table"),
        }
    }
}

/// Everything backed by the "DHT" database (spec §6).
pub struct DhtStores {
    pub dht: DhtStorePtr,
}

impl DhtStores {
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Arc::new(Database::open(path)?);
        Ok(Self { dht: DhtStore::new(db).await? })
    }

    /// In-memory variant for tests: same schema, no file on disk.
    pub async fn open_in_memory_for_test() -> Self {
        let db = Arc::new(Database::open_in_memory().expect("open in-memory dht db"));
        Self { dht: DhtStore::new(db).await.expect("init dht tables") }
    }
}
