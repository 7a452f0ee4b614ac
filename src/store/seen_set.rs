/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Persistent duplicate-suppression set, keyed by the exact byte sequence of
//! a message's signature (spec §3 "Seen set", §4.3). Entries older than 24h
//! are swept by a background task; see `DHT_RECORD_TTL_SECS`-style constant
//! in `util::time`.

use std::sync::Arc;

use super::db::Database;
use crate::{
    error::Result,
    util::time::{is_older_than, now_unix, SEEN_SET_TTL_SECS},
};

pub type SeenSetPtr = Arc<SeenSet>;

pub struct SeenSet {
    db: Arc<Database>,
}

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS seen_set (
    sig BLOB PRIMARY KEY,
    seen_at INTEGER NOT NULL
);";

impl SeenSet {
    pub async fn new(db: Arc<Database>) -> Result<SeenSetPtr> {
        db.exec_batch_sql(CREATE_TABLE).await?;
        Ok(Arc::new(Self { db }))
    }

    /// Returns `true` and leaves the set unchanged if `sig` was already
    /// present; otherwise inserts it and returns `false`. This atomically
    /// implements the `seen(sig)? -> mark_seen` pair from the spec's state
    /// machine so callers can't race between the check and the insert.
    pub async fn check_and_mark(&self, sig: &[u8]) -> Result<bool> {
        let conn = self.db.conn.lock().await;
        let now = now_unix() as i64;
        let inserted = conn.execute(
            "INSERT INTO seen_set (sig, seen_at) VALUES (?1, ?2) ON CONFLICT(sig) DO NOTHING",
            (sig, now),
        )?;
        Ok(inserted == 0)
    }

    /// Removes entries older than 24h (spec §3, §4.3 background sweep).
    pub async fn expire_old(&self) -> Result<u64> {
        let conn = self.db.conn.lock().await;
        let cutoff = now_unix().saturating_sub(SEEN_SET_TTL_SECS) as i64;
        let deleted = conn.execute("DELETE FROM seen_set WHERE seen_at < ?1", [cutoff])?;
        Ok(deleted as u64)
    }

    #[cfg(test)]
    pub async fn is_expired(&self, sig: &[u8]) -> Result<bool> {
        let conn = self.db.conn.lock().await;
        let seen_at: Option<i64> = conn
            .query_row("SELECT seen_at FROM seen_set WHERE sig = ?1", [sig], |r| r.get(0))
            .optional()?;
        Ok(match seen_at {
            Some(ts) => is_older_than(ts as u64, SEEN_SET_TTL_SECS),
            None => true,
        })
    }
}

#[cfg(test)]
use rusqlite::OptionalExtension;

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn duplicate_signature_is_rejected_once_marked() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let seen = SeenSet::new(db).await.unwrap();
        let sig = b"some-signature-bytes".to_vec();

        assert!(!seen.check_and_mark(&sig).await.unwrap());
        assert!(seen.check_and_mark(&sig).await.unwrap());
    }
}
