/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Persisted DHT value records (spec §3 "DHT value record") and routing
//! table contact rows, kept in the second embedded database (spec §6
//! "Files — embedded databases"). The in-memory k-bucket structure
//! (`dht::kbucket`) is the hot path; this store is what survives a restart.

use std::sync::Arc;

use rusqlite::OptionalExtension;

use super::db::Database;
use crate::{error::Result, model::DhtRecord, util::now_unix};

pub type DhtStorePtr = Arc<DhtStore>;

pub struct DhtStore {
    db: Arc<Database>,
}

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS dht_values (
    identifier TEXT PRIMARY KEY,
    kem_pk BLOB NOT NULL,
    sig_pk BLOB NOT NULL,
    addr TEXT NOT NULL,
    ts INTEGER NOT NULL,
    addr_signature BLOB NOT NULL,
    originator INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS dht_contacts (
    node_id TEXT PRIMARY KEY,
    address TEXT NOT NULL,
    last_seen INTEGER NOT NULL
);";

impl DhtStore {
    pub async fn new(db: Arc<Database>) -> Result<DhtStorePtr> {
        db.exec_batch_sql(CREATE_TABLES).await?;
        Ok(Arc::new(Self { db }))
    }

    pub async fn put_value(&self, record: &DhtRecord, originator: bool) -> Result<()> {
        self.db
            .exec_sql(
                "INSERT INTO dht_values (identifier, kem_pk, sig_pk, addr, ts, addr_signature, originator)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(identifier) DO UPDATE SET
                    kem_pk=excluded.kem_pk, sig_pk=excluded.sig_pk, addr=excluded.addr,
                    ts=excluded.ts, addr_signature=excluded.addr_signature,
                    originator = originator OR excluded.originator",
                &[
                    &record.identifier,
                    &record.kem_pk,
                    &record.sig_pk,
                    &record.addr,
                    &(record.ts as i64),
                    &record.addr_signature,
                    &(originator as i64),
                ],
            )
            .await
    }

    pub async fn get_value(&self, identifier: &str) -> Result<Option<DhtRecord>> {
        let conn = self.db.conn.lock().await;
        conn.query_row(
            "SELECT identifier, kem_pk, sig_pk, addr, ts, addr_signature FROM dht_values WHERE identifier = ?1",
            [identifier],
            |row| {
                Ok(DhtRecord {
                    identifier: row.get(0)?,
                    kem_pk: row.get(1)?,
                    sig_pk: row.get(2)?,
                    addr: row.get(3)?,
                    ts: row.get::<_, i64>(4)? as u64,
                    addr_signature: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub async fn all_values(&self) -> Result<Vec<DhtRecord>> {
        let conn = self.db.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT identifier, kem_pk, sig_pk, addr, ts, addr_signature FROM dht_values",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DhtRecord {
                identifier: row.get(0)?,
                kem_pk: row.get(1)?,
                sig_pk: row.get(2)?,
                addr: row.get(3)?,
                ts: row.get::<_, i64>(4)? as u64,
                addr_signature: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    pub async fn originated_values(&self) -> Result<Vec<DhtRecord>> {
        let conn = self.db.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT identifier, kem_pk, sig_pk, addr, ts, addr_signature FROM dht_values WHERE originator = 1",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DhtRecord {
                identifier: row.get(0)?,
                kem_pk: row.get(1)?,
                sig_pk: row.get(2)?,
                addr: row.get(3)?,
                ts: row.get::<_, i64>(4)? as u64,
                addr_signature: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    /// Deletes values older than 24h (spec §3 lifecycle), returning the
    /// originator-owned ones so the caller can republish them instead.
    pub async fn expire_values(&self, max_age_secs: u64) -> Result<Vec<DhtRecord>> {
        let cutoff = now_unix().saturating_sub(max_age_secs) as i64;
        let conn = self.db.conn.lock().await;
        let to_republish = {
            let mut stmt = conn.prepare(
                "SELECT identifier, kem_pk, sig_pk, addr, ts, addr_signature FROM dht_values
                 WHERE ts < ?1 AND originator = 1",
            )?;
            let rows = stmt.query_map([cutoff], |row| {
                Ok(DhtRecord {
                    identifier: row.get(0)?,
                    kem_pk: row.get(1)?,
                    sig_pk: row.get(2)?,
                    addr: row.get(3)?,
                    ts: row.get::<_, i64>(4)? as u64,
                    addr_signature: row.get(5)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        conn.execute(
            "DELETE FROM dht_values WHERE ts < ?1 AND originator = 0",
            [cutoff],
        )?;
        Ok(to_republish)
    }

    pub async fn upsert_contact(&self, node_id: &str, address: &str, last_seen: u64) -> Result<()> {
        self.db
            .exec_sql(
                "INSERT INTO dht_contacts (node_id, address, last_seen) VALUES (?1, ?2, ?3)
                 ON CONFLICT(node_id) DO UPDATE SET address=excluded.address, last_seen=excluded.last_seen",
                &[&node_id, &address, &(last_seen as i64)],
            )
            .await
    }

    pub async fn all_contacts(&self) -> Result<Vec<(String, String, u64)>> {
        let conn = self.db.conn.lock().await;
        let mut stmt = conn.prepare("SELECT node_id, address, last_seen FROM dht_contacts")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)? as u64))
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }
}
