/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

use base64::{engine::general_purpose::STANDARD, engine::general_purpose::URL_SAFE, Engine};

use crate::error::{Error, Result};

/// Standard, padded base64 — used for the byte fields on the wire message
/// (spec §6: "All byte fields are base64 (standard alphabet, padded)").
pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn b64_decode(s: &str) -> Result<Vec<u8>> {
    STANDARD.decode(s).map_err(|e| Error::Malformed(format!("invalid base64: {e}")))
}

/// URL-safe, padded base64 of a 32-byte hash — the identifier format
/// (spec §3, §6): 44 characters, case-sensitive.
pub fn identifier_from_hash(hash: &[u8; 32]) -> String {
    URL_SAFE.encode(hash)
}
