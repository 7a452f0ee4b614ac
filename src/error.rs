/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The surface error taxonomy from the cryptographic, routing, transport and
/// DHT subsystems. Cryptographic failures on inbound wire messages are never
/// allowed to leak through a distinguishable HTTP status; callers at the
/// transport boundary must catch these and respond 200 regardless (see
/// `routing::engine`).
#[derive(Error, Debug)]
pub enum Error {
    #[error("wrong password")]
    WrongPassword,

    #[error("keystore is corrupt: {0}")]
    CorruptKeystore(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("identifier does not match hash of public keys")]
    IdentifierMismatch,

    #[error("ML-KEM decapsulation failed")]
    Decap,

    #[error("AEAD decryption failed")]
    Aead,

    #[error("unknown contact: {0}")]
    UnknownContact(String),

    #[error("destination unreachable: {0}")]
    Unreachable(String),

    #[error("operation timed out")]
    Timeout,

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("stale DHT record")]
    StaleRecord,

    #[error("value not found in DHT")]
    DhtNotFound,

    #[error("sqlite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("{0}")]
    Custom(String),
}

impl From<surf::Error> for Error {
    fn from(e: surf::Error) -> Self {
        Error::Http(e.to_string())
    }
}
