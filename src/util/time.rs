/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as Unix seconds. All timestamps on the wire (inner payload
/// `ts`, DHT record `ts`, seen-set entries) are Unix seconds, UTC.
pub fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs()
}

pub const SEEN_SET_TTL_SECS: u64 = 24 * 60 * 60;
pub const DHT_RECORD_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DHT_VALUE_EXPIRE_SECS: u64 = 24 * 60 * 60;
pub const DHT_REPUBLISH_INTERVAL_SECS: u64 = 60 * 60;

/// `true` if a timestamp `ts` (Unix seconds) is older than `max_age_secs`
/// relative to now.
pub fn is_older_than(ts: u64, max_age_secs: u64) -> bool {
    now_unix().saturating_sub(ts) > max_age_secs
}
