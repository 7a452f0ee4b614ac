/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Contract with the anonymous-overlay collaborator (spec §1, §6): the core
//! neither starts nor supervises the overlay process, it only reads two
//! values the overlay manager publishes — the node's own `.b32.i2p`
//! destination and the local outbound HTTP proxy endpoint — at startup and
//! whenever the overlay rotates.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_PROXY_ENDPOINT: &str = "127.0.0.1:4444";

/// Snapshot of what the overlay manager has told us.
#[derive(Clone, Debug, Deserialize)]
pub struct OverlayInfo {
    /// This node's inbound destination, e.g. `"abc123....b32.i2p"`.
    pub local_address: String,
    /// `host:port` of the overlay's local outbound HTTP proxy.
    pub proxy_endpoint: String,
}

impl OverlayInfo {
    /// Reads the overlay manager's published info file (a small JSON
    /// document `{"local_address": "...", "proxy_endpoint": "..."}`) the
    /// collaborator writes under the node's data directory. The core never
    /// writes this file, only reads it.
    pub fn read(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("overlay_info.json");
        let bytes = std::fs::read(&path).map_err(|e| {
            Error::Custom(format!(
                "could not read overlay info at {}: {e} (is the anonymous-overlay collaborator running?)",
                path.display()
            ))
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Custom(format!("malformed overlay info: {e}")))
    }

    /// Developer-mode fallback when no overlay collaborator is present
    /// (spec §1 non-goals: "plaintext fallback ... only as a developer-mode
    /// knob").
    pub fn dev_mode(local_address: String) -> Self {
        Self { local_address, proxy_endpoint: DEFAULT_PROXY_ENDPOINT.to_string() }
    }
}
