/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Delivered-message inbox. Writes for a given recipient are totally
//! ordered by receive time, which a single-writer SQLite connection gives
//! us for free (spec §5 ordering guarantees).

use std::sync::Arc;

use super::db::Database;
use crate::{error::Result, model::InboxEntry, util::now_unix};

pub type InboxStorePtr = Arc<InboxStore>;

pub struct InboxStore {
    db: Arc<Database>,
}

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS inbox (
    rowid INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id TEXT NOT NULL,
    addr TEXT NOT NULL,
    msg BLOB NOT NULL,
    ts INTEGER NOT NULL,
    received_at INTEGER NOT NULL
);";

impl InboxStore {
    pub async fn new(db: Arc<Database>) -> Result<InboxStorePtr> {
        db.exec_batch_sql(CREATE_TABLE).await?;
        Ok(Arc::new(Self { db }))
    }

    pub async fn deliver(&self, sender_id: &str, addr: &str, msg: &[u8], ts: u64) -> Result<()> {
        self.db
            .exec_sql(
                "INSERT INTO inbox (sender_id, addr, msg, ts, received_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                &[&sender_id, &addr, &msg, &(ts as i64), &(now_unix() as i64)],
            )
            .await
    }

    pub async fn all(&self) -> Result<Vec<InboxEntry>> {
        let conn = self.db.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT sender_id, addr, msg, ts, received_at FROM inbox ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(InboxEntry {
                sender_id: row.get(0)?,
                addr: row.get(1)?,
                msg: row.get(2)?,
                ts: row.get::<_, i64>(3)? as u64,
                received_at: row.get::<_, i64>(4)? as u64,
            })
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    pub async fn count(&self) -> Result<u64> {
        let conn = self.db.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM inbox", [], |r| r.get(0))?;
        Ok(count as u64)
    }
}
