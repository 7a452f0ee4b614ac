/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

pub mod encoding;
pub mod time;

pub use encoding::{b64_decode, b64_encode};
pub use time::now_unix;

/// `serde(with = ...)` helper: (de)serializes a `Vec<u8>` field as standard
/// padded base64, matching spec §6 ("all byte fields are base64, standard
/// alphabet, padded").
pub mod b64_field {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::b64_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        super::b64_decode(&s).map_err(serde::de::Error::custom)
    }
}
