/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Wire-level and stored data types (spec §3). `InnerPayload` uses
//! `darkfi_serial`'s canonical encoding — the exact byte order that gets
//! signed and must agree between every implementation — while the outer
//! `WireMessage` and the DHT/JSON types ride on serde, since they cross the
//! REST boundary as JSON (spec §6).

use darkfi_serial::{SerialDecodable, SerialEncodable};
use serde::{Deserialize, Serialize};

/// The signed, AEAD-encrypted content of a message (spec §3, §4.2). Field
/// order here *is* the wire contract for signing; do not reorder.
#[derive(Clone, Debug, PartialEq, Eq, SerialEncodable, SerialDecodable)]
pub struct InnerPayload {
    pub addr: String,
    pub msg: Vec<u8>,
    pub sender_id: String,
    pub ts: u64,
    pub sig_pk: Vec<u8>,
    pub kem_pk: Vec<u8>,
}

/// Outer envelope carried by `/send` (spec §3, §6). JSON field names match
/// the wire contract exactly — they are *not* the internal Rust names used
/// elsewhere in this crate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "current_node_identifier")]
    pub current_node_id: String,
    #[serde(rename = "recipient_identifier")]
    pub recipient_id: String,
    #[serde(rename = "shared_secret_ciphertext", with = "crate::util::b64_field")]
    pub kem_ct: Vec<u8>,
    #[serde(rename = "message_ciphertext", with = "crate::util::b64_field")]
    pub msg_ct: Vec<u8>,
    #[serde(with = "crate::util::b64_field")]
    pub nonce: Vec<u8>,
    #[serde(rename = "signature", with = "crate::util::b64_field")]
    pub sig: Vec<u8>,
    pub ttl: u8,
    #[serde(rename = "max_recursive_contact")]
    pub max_retry: u8,
}

/// A known peer (spec §3 "Contact"). `identifier` is the primary key and
/// must equal `SHA-256(kem_pk ‖ sig_pk)` — enforced by stores before insert.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    pub identifier: String,
    pub display_name: String,
    pub anonymous_address: String,
    pub kem_pk: Vec<u8>,
    pub sig_pk: Vec<u8>,
}

/// A delivered, decrypted message as stored in the local inbox.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InboxEntry {
    pub sender_id: String,
    pub addr: String,
    pub msg: Vec<u8>,
    pub ts: u64,
    pub received_at: u64,
}

/// A signed DHT directory entry (spec §3 "DHT value record").
#[derive(Clone, Debug, Serialize, Deserialize, SerialEncodable, SerialDecodable)]
pub struct DhtRecord {
    pub identifier: String,
    pub kem_pk: Vec<u8>,
    pub sig_pk: Vec<u8>,
    pub addr: String,
    pub ts: u64,
    pub addr_signature: Vec<u8>,
}

impl DhtRecord {
    /// Bytes covered by `addr_signature` — just `addr`, per spec §3.
    pub fn signed_bytes(&self) -> &[u8] {
        self.addr.as_bytes()
    }
}
