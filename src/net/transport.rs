/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Plain REST/JSON transport (spec §4.4, §6): a `tide` server bound to a
//! loopback port and advertised only through the anonymous overlay, and a
//! `surf`-based client that sends every outbound request through the
//! overlay's local HTTP proxy. Grounded on the teacher's
//! `bin/darkfi-mmproxy` (`tide::with_state` + `app.at(path)`, `surf::get`/
//! `surf::Client::new()`), which is the one place in the teacher repo that
//! speaks plain REST instead of its own JSON-RPC convention.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use serde_json::json;
use tide::{Request, Response, StatusCode};

use crate::{
    dht::{
        kbucket::{Contact as DhtContact, NodeId},
        rpc::{
            BootstrapRequest, BootstrapResponse, FindValueRequest, FindValueResponse, IdResponse,
            NodeInfo, SetRequest, SetResponse,
        },
        validate_record, DhtTransport,
    },
    error::{Error, Result},
    model::{DhtRecord, WireMessage},
    node::NodePtr,
    routing,
};

/// Overall per-call deadline (spec §4.4, §5). `surf`'s `curl-client` backend
/// doesn't expose separate connect/read sub-deadlines through its public
/// API, so the 10s connect / 30s read budgets from the spec are folded into
/// this single 60s ceiling rather than tracked independently.
const OVERALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Routes every outbound request through the anonymous overlay's proxy.
/// `curl-client` (spec §6, `libcurl`-backed) honors the `http_proxy`/
/// `https_proxy` environment variables, so pointing those at the overlay's
/// local proxy endpoint once at startup is sufficient for every subsequent
/// `surf::get`/`surf::Client` call in this process to tunnel through it.
pub fn install_proxy(proxy_endpoint: &str) {
    let url = format!("http://{proxy_endpoint}");
    std::env::set_var("http_proxy", &url);
    std::env::set_var("https_proxy", &url);
}

async fn post_json<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
    base_addr: &str,
    path: &str,
    body: &Req,
) -> Result<Resp> {
    let url = format!("http://{base_addr}{path}");
    debug!(target: "net::transport", "--> POST {url}");

    let client = surf::Client::new().with(surf::middleware::Redirect::default());
    let fut = client
        .post(&url)
        .content_type(surf::http::mime::JSON)
        .body_json(body)
        .map_err(|e| Error::Http(e.to_string()))?
        .send();

    let mut resp = async_std::future::timeout(OVERALL_TIMEOUT, fut)
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| Error::Unreachable(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(Error::Http(format!("{} returned {}", url, resp.status())));
    }
    resp.body_json().await.map_err(|e| Error::Malformed(e.to_string()))
}

async fn get_json<Resp: serde::de::DeserializeOwned>(base_addr: &str, path: &str) -> Result<Resp> {
    let url = format!("http://{base_addr}{path}");
    debug!(target: "net::transport", "--> GET {url}");

    let fut = surf::get(&url).send();
    let mut resp = async_std::future::timeout(OVERALL_TIMEOUT, fut)
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| Error::Unreachable(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(Error::Http(format!("{} returned {}", url, resp.status())));
    }
    resp.body_json().await.map_err(|e| Error::Malformed(e.to_string()))
}

/// Client-side `/send` call (spec §6): what the routing engine's fanout
/// uses to forward a wire message to a contact.
pub async fn send_wire(address: &str, wire: &WireMessage) -> Result<()> {
    let _: serde_json::Value = post_json(address, "/send", wire).await?;
    Ok(())
}

pub async fn get_messages(address: &str, identifier: &str) -> Result<Vec<WireMessage>> {
    #[derive(serde::Deserialize)]
    struct Resp {
        messages: Vec<WireMessage>,
    }
    let resp: Resp = post_json(address, &format!("/get_messages/{identifier}"), &json!({})).await?;
    Ok(resp.messages)
}

pub async fn get_id(address: &str) -> Result<String> {
    let resp: IdResponse = get_json(address, "/id").await?;
    Ok(resp.id)
}

/// HTTP implementation of `DhtTransport` (spec §4.5 RPC surface riding on
/// §6's endpoints).
pub struct HttpDhtTransport;

#[async_trait]
impl DhtTransport for HttpDhtTransport {
    async fn ping(&self, address: &str) -> Result<NodeId> {
        let id_hex = get_id(address).await?;
        let bytes = hex::decode(&id_hex).map_err(|e| Error::Malformed(e.to_string()))?;
        bytes.try_into().map_err(|_| Error::Malformed("node id must be 32 bytes".into()))
    }

    async fn store(&self, address: &str, node_id: &NodeId, key: &[u8], value: &DhtRecord) -> Result<bool> {
        let req = SetRequest {
            node_id: hex::encode(node_id),
            key: hex::encode(key),
            value: hex::encode(serde_json::to_vec(value)?),
        };
        let resp: SetResponse = post_json(address, "/set", &req).await?;
        Ok(resp.ok)
    }

    async fn find(
        &self,
        address: &str,
        node_id: &NodeId,
        key: &[u8],
    ) -> Result<crate::dht::kademlia::FindOutcome> {
        let req = FindValueRequest { node_id: hex::encode(node_id), key: hex::encode(key) };
        let resp: FindValueResponse = post_json(address, "/find_value", &req).await?;
        match resp {
            FindValueResponse::Value { value } => {
                let bytes = hex::decode(&value).map_err(|e| Error::Malformed(e.to_string()))?;
                let record: DhtRecord = serde_json::from_slice(&bytes)?;
                Ok(crate::dht::kademlia::FindOutcome::Value(record))
            }
            FindValueResponse::Nodes { nodes } => {
                let contacts = nodes
                    .into_iter()
                    .filter_map(|n| {
                        let bytes = hex::decode(&n.node_id).ok()?;
                        let node_id: NodeId = bytes.try_into().ok()?;
                        Some(DhtContact { node_id, address: n.address, last_seen: crate::util::now_unix() })
                    })
                    .collect();
                Ok(crate::dht::kademlia::FindOutcome::Nodes(contacts))
            }
        }
    }
}

// --- Server ---------------------------------------------------------------

fn json_response(status: StatusCode, value: impl serde::Serialize) -> tide::Result<Response> {
    let body = tide::Body::from_json(&value)?;
    Ok(Response::builder(status).body(body).build())
}

fn json_ok() -> tide::Result<Response> {
    json_response(StatusCode::Ok, json!({"status": "OK"}))
}

fn bad_request(msg: impl std::fmt::Display) -> tide::Result<Response> {
    json_response(StatusCode::BadRequest, json!({"status": "ERROR", "error": msg.to_string()}))
}

async fn handle_send(mut req: Request<NodePtr>) -> tide::Result<Response> {
    let wire: WireMessage = match req.body_json().await {
        Ok(w) => w,
        Err(e) => return bad_request(e),
    };
    let node = req.state().clone();
    // The response is returned immediately; fanout is scheduled but not
    // awaited (spec §4.3, §4.4: "the inbound HTTP response is returned
    // after fanout is scheduled, not awaited").
    if let Err(e) = routing::handle_inbound(&node, wire).await {
        error!(target: "net::transport", "handle_inbound failed: {e}");
        // Internal errors still answer 200: the HTTP status must never leak
        // whether a message was cryptographically valid (spec §7).
    }
    json_ok()
}

async fn handle_get_messages(req: Request<NodePtr>) -> tide::Result<Response> {
    let identifier = req.param("identifier")?.to_string();
    let node = req.state().clone();
    let messages = node.forward_queue.drain(&identifier).await.map_err(|e| {
        tide::Error::from_str(StatusCode::InternalServerError, e.to_string())
    })?;
    json_response(StatusCode::Ok, json!({"messages": messages}))
}

async fn handle_id(req: Request<NodePtr>) -> tide::Result<Response> {
    let node = req.state().clone();
    let id = node.dht.table.self_id();
    json_response(StatusCode::Ok, IdResponse { id: hex::encode(id) })
}

async fn handle_bootstrap(mut req: Request<NodePtr>) -> tide::Result<Response> {
    let body: BootstrapRequest = match req.body_json().await {
        Ok(b) => b,
        Err(e) => return bad_request(e),
    };
    let node = req.state().clone();
    let Ok(node_id_bytes) = hex::decode(&body.node_id) else {
        return bad_request("invalid node_id");
    };
    let Ok(node_id): std::result::Result<NodeId, _> = node_id_bytes.try_into() else {
        return bad_request("node_id must be 32 bytes");
    };
    let address = format!("{}:{}", body.ip, body.port);
    node.dht
        .table
        .insert_or_refresh(DhtContact { node_id, address, last_seen: crate::util::now_unix() })
        .await;
    json_response(StatusCode::Ok, BootstrapResponse { ok: true })
}

async fn handle_set(mut req: Request<NodePtr>) -> tide::Result<Response> {
    let body: SetRequest = match req.body_json().await {
        Ok(b) => b,
        Err(e) => return bad_request(e),
    };
    let node = req.state().clone();

    let Ok(value_bytes) = hex::decode(&body.value) else {
        return json_response(StatusCode::Ok, SetResponse { ok: false, error: Some("invalid hex value".into()) });
    };
    let record: DhtRecord = match serde_json::from_slice(&value_bytes) {
        Ok(r) => r,
        Err(e) => return json_response(StatusCode::Ok, SetResponse { ok: false, error: Some(e.to_string()) }),
    };

    match validate_record(&record) {
        Ok(()) => {
            let _ = node.dht_store.put_value(&record, false).await;
            json_response(StatusCode::Ok, SetResponse { ok: true, error: None })
        }
        Err(e) => {
            debug!(target: "net::transport", "rejecting invalid DHT record: {e}");
            json_response(StatusCode::Ok, SetResponse { ok: false, error: Some(e.to_string()) })
        }
    }
}

async fn handle_find_value(mut req: Request<NodePtr>) -> tide::Result<Response> {
    let body: FindValueRequest = match req.body_json().await {
        Ok(b) => b,
        Err(e) => return bad_request(e),
    };
    let node = req.state().clone();

    let Ok(key_bytes) = hex::decode(&body.key) else {
        return bad_request("invalid hex key");
    };

    if key_bytes.len() == 32 {
        let key_array: NodeId = key_bytes.clone().try_into().unwrap_or([0u8; 32]);
        for record in node.dht_store.all_values().await.unwrap_or_default() {
            if crate::dht::record_key(&record.identifier) == key_array {
                let value_hex = hex::encode(serde_json::to_vec(&record)?);
                return json_response(StatusCode::Ok, FindValueResponse::Value { value: value_hex });
            }
        }
    }

    let target: NodeId = key_bytes.try_into().unwrap_or([0u8; 32]);
    let closest = node.dht.table.closest(&target, crate::dht::kbucket::K).await;
    let nodes = closest
        .into_iter()
        .map(|c| NodeInfo { node_id: hex::encode(c.node_id), address: c.address })
        .collect::<Vec<_>>();
    json_response(StatusCode::Ok, FindValueResponse::Nodes { nodes })
}

/// Builds the tide server. Binding happens over plain loopback HTTP; the
/// bound address is never advertised directly — only the overlay's
/// `.b32.i2p` destination is (spec §4.4).
pub fn build_server(node: NodePtr) -> tide::Server<NodePtr> {
    let mut app = tide::with_state(node);
    app.at("/send").post(handle_send);
    app.at("/get_messages/:identifier").post(handle_get_messages);
    app.at("/id").get(handle_id);
    app.at("/bootstrap").post(handle_bootstrap);
    app.at("/set").post(handle_set);
    app.at("/find_value").post(handle_find_value);
    app
}

pub async fn serve(node: NodePtr, bind_addr: &str) -> Result<()> {
    let app = build_server(node);
    app.listen(bind_addr).await.map_err(|e| Error::Custom(format!("server error: {e}")))?;
    Ok(())
}
