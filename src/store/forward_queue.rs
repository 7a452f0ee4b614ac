/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Per-recipient backlog of wire messages awaiting pickup (spec §3 "Forward
//! queue"), drained atomically by `/get_messages/{id}` (spec §4.4, §6).

use std::sync::Arc;

use super::db::Database;
use crate::{error::Result, model::WireMessage};

pub type ForwardQueuePtr = Arc<ForwardQueue>;

pub struct ForwardQueue {
    db: Arc<Database>,
}

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS forward_queue (
    rowid INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_id TEXT NOT NULL,
    wire_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS forward_queue_recipient_idx ON forward_queue (recipient_id);";

impl ForwardQueue {
    pub async fn new(db: Arc<Database>) -> Result<ForwardQueuePtr> {
        db.exec_batch_sql(CREATE_TABLE).await?;
        Ok(Arc::new(Self { db }))
    }

    pub async fn push(&self, recipient_id: &str, message: &WireMessage) -> Result<()> {
        let wire_json = serde_json::to_string(message)?;
        self.db
            .exec_sql(
                "INSERT INTO forward_queue (recipient_id, wire_json) VALUES (?1, ?2)",
                &[&recipient_id, &wire_json],
            )
            .await
    }

    /// Atomically reads and removes all queued messages for `recipient_id`
    /// (spec §6 "`/get_messages/{identifier}` ... removes them from the
    /// forward queue atomically").
    pub async fn drain(&self, recipient_id: &str) -> Result<Vec<WireMessage>> {
        let mut conn = self.db.conn.lock().await;
        let tx = conn.transaction()?;
        let messages = {
            let mut stmt = tx.prepare(
                "SELECT rowid, wire_json FROM forward_queue WHERE recipient_id = ?1 ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map([recipient_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        tx.execute(
            "DELETE FROM forward_queue WHERE recipient_id = ?1",
            [recipient_id],
        )?;
        tx.commit()?;

        messages
            .into_iter()
            .map(|(_, json)| serde_json::from_str(&json).map_err(Into::into))
            .collect()
    }
}
