/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Routing engine (spec §4.3): the state machine every inbound wire message
//! passes through — duplicate suppression, for-me delivery, store-and-
//! forward queuing, and randomized-fanout propagation.

use log::{debug, warn};
use rand::seq::SliceRandom;

use crate::{
    crypto::envelope,
    error::Result,
    model::WireMessage,
    net::transport,
    node::NodePtr,
};

/// Uniform integer in `0..=2`, used for both TTL and retry-budget decrements
/// (spec §4.3 "metadata-protection rationale").
fn random_decrement() -> u8 {
    rand::random::<u8>() % 3
}

/// `⌈0.3·e⌉..=min(e,10)` (spec §4.3, testable property 7).
fn fanout_bounds(eligible: usize) -> (usize, usize) {
    let low = ((eligible as f64) * 0.3).ceil() as usize;
    let low = low.max(1);
    let high = eligible.min(10);
    (low.min(high), high)
}

/// Handles one inbound wire message end to end. Never returns an error for
/// cryptographic or validation failures on the message itself — those are
/// logged and dropped per spec §7 so a caller (and thus a network observer)
/// can't distinguish "wrong key" from "bad signature" from "not for me".
/// Only store/database failures propagate, since those indicate the local
/// node is unhealthy rather than that the peer misbehaved.
pub async fn handle_inbound(node: &NodePtr, mut wire: WireMessage) -> Result<()> {
    if node.seen_set.check_and_mark(&wire.sig).await? {
        debug!(target: "routing", "duplicate signature, dropping");
        return Ok(());
    }

    let self_id = node.identifier().await;

    if wire.recipient_id == self_id {
        deliver_to_self(node, &wire).await;
        return Ok(());
    }

    let prev_node_id = wire.current_node_id.clone();

    if node.contacts.contains(&wire.recipient_id).await? {
        node.forward_queue.push(&wire.recipient_id, &wire).await?;
        wire.max_retry = wire.max_retry.saturating_sub(random_decrement());
    }

    wire.current_node_id = self_id.clone();
    wire.ttl = wire.ttl.saturating_sub(random_decrement());

    if wire.ttl == 0 || wire.max_retry == 0 {
        debug!(target: "routing", "ttl or retry budget exhausted, not forwarding");
        return Ok(());
    }

    let eligible = node
        .contacts
        .all_except(&[prev_node_id.as_str(), self_id.as_str()])
        .await?;
    if eligible.is_empty() {
        return Ok(());
    }

    let (low, high) = fanout_bounds(eligible.len());
    let n = low + (rand::random::<usize>() % (high - low + 1));

    let mut chosen = eligible;
    chosen.shuffle(&mut rand::thread_rng());
    chosen.truncate(n);

    // Inbound handler does not await these: fanout is fire-and-forget, and
    // `mark_seen` above already happened-before this point (spec §5
    // ordering guarantee).
    for contact in chosen {
        let wire = wire.clone();
        async_std::task::spawn(async move {
            if let Err(e) = transport::send_wire(&contact.anonymous_address, &wire).await {
                debug!(target: "routing", "forward to {} failed: {e}", contact.anonymous_address);
            }
        });
    }

    Ok(())
}

async fn deliver_to_self(node: &NodePtr, wire: &WireMessage) {
    let identity = node.identity.read().await;
    let decrypted = match envelope::decrypt(&identity, wire) {
        Ok(d) => d,
        Err(e) => {
            debug!(target: "routing", "inbound message failed to decrypt/verify: {e}");
            return;
        }
    };
    drop(identity);

    if let Err(e) = node
        .inbox
        .deliver(&decrypted.sender_id, &decrypted.addr, &decrypted.msg, decrypted.ts)
        .await
    {
        warn!(target: "routing", "failed to store delivered message: {e}");
        return;
    }

    if let Err(e) = node
        .contacts
        .auto_add(&decrypted.sender_id, &decrypted.addr, &decrypted.kem_pk, &decrypted.sig_pk)
        .await
    {
        warn!(target: "routing", "failed to auto-add sender as contact: {e}");
    }
}

/// Background sweep expiring seen-set entries older than 24h (spec §4.3).
pub async fn sweep_seen_set(node: &NodePtr) -> Result<u64> {
    node.seen_set.expire_old().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_bounds_match_spec_formula() {
        assert_eq!(fanout_bounds(1), (1, 1));
        assert_eq!(fanout_bounds(3), (1, 3));
        assert_eq!(fanout_bounds(10), (3, 10));
        assert_eq!(fanout_bounds(30), (9, 10));
    }
}
