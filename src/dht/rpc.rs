/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Wire shapes for the DHT RPC surface (spec §4.5, §6): `ping` rides on
//! `GET /id`, `store` on `POST /set`, and `find_node`/`find_value` both ride
//! on `POST /find_value` (the spec's external interface only exposes one
//! lookup endpoint; a node with no matching value answers with its k
//! closest contacts instead, which is also the `find_node` contract).

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootstrapRequest {
    pub node_id: String,
    pub ip: String,
    pub port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootstrapResponse {
    pub ok: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetRequest {
    pub node_id: String,
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindValueRequest {
    pub node_id: String,
    pub key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub address: String,
}

/// Either branch of `find_value`'s response (spec §6): a hex value, or a
/// list of closer nodes to continue the iterative lookup against.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindValueResponse {
    Value { value: String },
    Nodes { nodes: Vec<NodeInfo> },
}
