/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Interactive text menu (spec §6 "CLI surface collaborator"). Out of the
//! core library's scope; grounded on the teacher's
//! `example/dchat/src/main.rs` `Dchat::menu()` loop — a plain
//! `stdin().read_line` dispatch over one-letter commands.

use std::io::stdin;

use zerotrace::{
    crypto::{envelope, identity::Identity},
    error::Error,
    model::DhtRecord,
    net::transport,
    Node, NodePtr,
};

pub async fn run(node: NodePtr) {
    let stdin = stdin();
    let mut line = String::new();

    loop {
        println!(
            "\nzerotrace — {}\n  s: send    i: inbox    c: contacts    a: add contact\n  p: publish to dht    d: discover    q: quit",
            node.identifier().await
        );

        line.clear();
        if stdin.read_line(&mut line).is_err() {
            continue;
        }
        let cmd = line.trim().to_string();

        match cmd.as_str() {
            "q" => return,
            "s" => send(&node).await,
            "i" => inbox(&node).await,
            "c" => contacts(&node).await,
            "a" => add_contact(&node).await,
            "p" => publish(&node).await,
            "d" => discover(&node).await,
            _ => {}
        }
    }
}

fn prompt(label: &str) -> String {
    println!("{label}");
    let mut buf = String::new();
    let _ = stdin().read_line(&mut buf);
    buf.trim().to_string()
}

async fn send(node: &NodePtr) {
    let recipient_id = prompt("recipient identifier:");
    let msg = prompt("message:");

    let Ok(Some(contact)) = node.contacts.get(&recipient_id).await else {
        println!("unknown contact; add them first with 'a'");
        return;
    };

    let identity = node.identity.read().await;
    let self_addr = node.self_addr().await;
    let recipient = envelope::RecipientKeys { identifier: &contact.identifier, kem_pk: &contact.kem_pk };
    let wire = match envelope::encrypt(&identity, &self_addr, &recipient, msg.as_bytes()) {
        Ok(w) => w,
        Err(e) => {
            println!("failed to encrypt: {e}");
            return;
        }
    };
    drop(identity);

    match transport::send_wire(&contact.anonymous_address, &wire).await {
        Ok(()) => println!("sent directly to {}", contact.display_name),
        Err(Error::Unreachable(_) | Error::Timeout) => {
            println!("{} is unreachable; message queued for retry by the network", contact.display_name)
        }
        Err(e) => println!("send failed: {e}"),
    }
}

async fn inbox(node: &NodePtr) {
    match node.inbox.all().await {
        Ok(entries) if entries.is_empty() => println!("inbox is empty"),
        Ok(entries) => {
            for entry in entries {
                let text = String::from_utf8_lossy(&entry.msg);
                println!("[{}] {}: {}", entry.ts, entry.sender_id, text);
            }
        }
        Err(e) => println!("failed to read inbox: {e}"),
    }
}

async fn contacts(node: &NodePtr) {
    match node.contacts.all_except(&[]).await {
        Ok(contacts) if contacts.is_empty() => println!("no contacts yet"),
        Ok(contacts) => {
            for c in contacts {
                println!("{}  {}", c.identifier, c.display_name);
            }
        }
        Err(e) => println!("failed to read contacts: {e}"),
    }
}

async fn add_contact(node: &NodePtr) {
    let identifier = prompt("identifier:");
    let display_name = prompt("display name:");
    let anonymous_address = prompt("anonymous address (.b32.i2p):");
    let kem_pk = prompt("kem public key (base64):");
    let sig_pk = prompt("sig public key (base64):");

    let (Ok(kem_pk), Ok(sig_pk)) = (zerotrace::util::b64_decode(&kem_pk), zerotrace::util::b64_decode(&sig_pk)) else {
        println!("invalid base64 key material");
        return;
    };

    let contact = zerotrace::model::Contact { identifier, display_name, anonymous_address, kem_pk, sig_pk };
    match node.contacts.upsert(&contact).await {
        Ok(()) => println!("contact added"),
        Err(e) => println!("failed to add contact: {e}"),
    }
}

async fn publish(node: &NodePtr) {
    let identity = node.identity.read().await;
    let self_addr = node.self_addr().await;
    let sig_sk = match identity.sig_secret_key() {
        Ok(sk) => sk,
        Err(e) => {
            println!("failed to load signing key: {e}");
            return;
        }
    };
    let record = sign_own_record(&identity, &self_addr, &sig_sk);
    drop(identity);

    match node.dht.store(&record, true).await {
        Ok(true) => println!("published to the dht"),
        Ok(false) => println!("publish did not reach enough replicas"),
        Err(e) => println!("publish failed: {e}"),
    }
}

fn sign_own_record(
    identity: &Identity,
    self_addr: &str,
    sig_sk: &zerotrace::crypto::pq::mldsa::SecretKey,
) -> DhtRecord {
    use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _};
    let sig = zerotrace::crypto::pq::mldsa::sign_detached(self_addr.as_bytes(), sig_sk);
    DhtRecord {
        identifier: identity.identifier.clone(),
        kem_pk: identity.kem_pk.as_bytes().to_vec(),
        sig_pk: identity.sig_pk.as_bytes().to_vec(),
        addr: self_addr.to_string(),
        ts: zerotrace::util::now_unix(),
        addr_signature: sig.as_bytes().to_vec(),
    }
}

async fn discover(node: &NodePtr) {
    let target_id = prompt("identifier to discover:");
    let target = zerotrace::dht::kbucket::node_id_from_identifier(&target_id);

    match node.dht.lookup(&target, true).await {
        Ok((Some(record), _)) => {
            println!("found: addr={} ts={}", record.addr, record.ts);
            let contact = zerotrace::model::Contact {
                identifier: record.identifier.clone(),
                display_name: record.identifier.clone(),
                anonymous_address: record.addr.clone(),
                kem_pk: record.kem_pk.clone(),
                sig_pk: record.sig_pk.clone(),
            };
            let _ = node.contacts.upsert(&contact).await;
        }
        Ok((None, _)) => println!("no record found"),
        Err(e) => println!("lookup failed: {e}"),
    }
}
