/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Contact table (spec §3 "Contact"). `identifier` is the primary key;
//! inserting a contact whose identifier doesn't bind to its keys is an
//! invariant violation and is rejected before it reaches SQL.

use std::sync::Arc;

use rusqlite::OptionalExtension;

use super::db::Database;
use crate::{
    crypto::verify_identifier_binding,
    error::{Error, Result},
    model::Contact,
};

pub type ContactStorePtr = Arc<ContactStore>;

pub struct ContactStore {
    db: Arc<Database>,
}

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS contacts (
    identifier TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    anonymous_address TEXT NOT NULL,
    kem_pk BLOB NOT NULL,
    sig_pk BLOB NOT NULL
);";

impl ContactStore {
    pub async fn new(db: Arc<Database>) -> Result<ContactStorePtr> {
        db.exec_batch_sql(CREATE_TABLE).await?;
        Ok(Arc::new(Self { db }))
    }

    /// Inserts or replaces a contact. Rejects the identifier-binding
    /// invariant violation described in spec §3 before touching the table.
    pub async fn upsert(&self, contact: &Contact) -> Result<()> {
        if !verify_identifier_binding(&contact.identifier, &contact.kem_pk, &contact.sig_pk) {
            return Err(Error::IdentifierMismatch);
        }
        self.db
            .exec_sql(
                "INSERT INTO contacts (identifier, display_name, anonymous_address, kem_pk, sig_pk)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(identifier) DO UPDATE SET
                    display_name=excluded.display_name,
                    anonymous_address=excluded.anonymous_address,
                    kem_pk=excluded.kem_pk,
                    sig_pk=excluded.sig_pk",
                &[
                    &contact.identifier,
                    &contact.display_name,
                    &contact.anonymous_address,
                    &contact.kem_pk,
                    &contact.sig_pk,
                ],
            )
            .await
    }

    /// Auto-adds a sender observed on a validly-decrypted inbound message,
    /// without overwriting an existing display name (spec §4.3 "for-me"
    /// branch).
    pub async fn auto_add(
        &self,
        identifier: &str,
        anonymous_address: &str,
        kem_pk: &[u8],
        sig_pk: &[u8],
    ) -> Result<()> {
        if !verify_identifier_binding(identifier, kem_pk, sig_pk) {
            return Err(Error::IdentifierMismatch);
        }
        self.db
            .exec_sql(
                "INSERT INTO contacts (identifier, display_name, anonymous_address, kem_pk, sig_pk)
                 VALUES (?1, ?1, ?2, ?3, ?4)
                 ON CONFLICT(identifier) DO UPDATE SET anonymous_address=excluded.anonymous_address",
                &[&identifier, &anonymous_address, &kem_pk, &sig_pk],
            )
            .await
    }

    pub async fn get(&self, identifier: &str) -> Result<Option<Contact>> {
        let conn = self.db.conn.lock().await;
        conn.query_row(
            "SELECT identifier, display_name, anonymous_address, kem_pk, sig_pk
             FROM contacts WHERE identifier = ?1",
            [identifier],
            |row| {
                Ok(Contact {
                    identifier: row.get(0)?,
                    display_name: row.get(1)?,
                    anonymous_address: row.get(2)?,
                    kem_pk: row.get(3)?,
                    sig_pk: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    pub async fn contains(&self, identifier: &str) -> Result<bool> {
        Ok(self.get(identifier).await?.is_some())
    }

    /// All contacts except the ones in `exclude` — the routing engine's
    /// "eligible" set (spec §4.3).
    pub async fn all_except(&self, exclude: &[&str]) -> Result<Vec<Contact>> {
        let conn = self.db.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT identifier, display_name, anonymous_address, kem_pk, sig_pk FROM contacts",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Contact {
                identifier: row.get(0)?,
                display_name: row.get(1)?,
                anonymous_address: row.get(2)?,
                kem_pk: row.get(3)?,
                sig_pk: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            let contact = row?;
            if !exclude.contains(&contact.identifier.as_str()) {
                out.push(contact);
            }
        }
        Ok(out)
    }
}
