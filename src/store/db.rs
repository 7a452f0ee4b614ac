/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Thin async-aware wrapper around a `rusqlite::Connection`, in the style of
//! the teacher's `WalletDb` (`bin/drk/src/walletdb.rs`): a single connection
//! behind an async mutex, with `exec_sql`/`exec_batch_sql` helpers so callers
//! never touch the connection directly.

use std::path::Path;

use log::debug;
use rusqlite::{types::ToSql, Connection};
use smol::lock::Mutex;

use crate::error::Result;

pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!(target: "store::db", "opened database at {}", path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub async fn exec_batch_sql(&self, query: &str) -> Result<()> {
        self.conn.lock().await.execute_batch(query)?;
        Ok(())
    }

    pub async fn exec_sql(&self, query: &str, params: &[&dyn ToSql]) -> Result<()> {
        self.conn.lock().await.execute(query, params)?;
        Ok(())
    }

}
