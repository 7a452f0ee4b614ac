//! Multi-node end-to-end scenarios (spec §8 S3-S6), grounded on the
//! teacher's own network integration test style
//! (`bin/dhtd/dhtd/src/tests.rs`'s `dht_remote_get_insert`): real nodes on
//! ephemeral loopback ports, driven by a fixed-size `smol::Executor` pool
//! under `easy_parallel::Parallel`, no mocked transport.

use std::{sync::Arc, time::Duration};

use async_std::task;
use smol::Executor;

use pqcrypto_traits::{kem::PublicKey as _, sign::PublicKey as _};
use zerotrace::{
    crypto::{envelope, identity::Identity},
    dht::{kademlia::Kademlia, kbucket::node_id_from_identifier},
    model::{Contact, DhtRecord},
    net::{overlay::OverlayInfo, transport},
    store::{DhtStores, MessageStores},
    Node, NodePtr,
};

fn kem_pk_bytes(identity: &Identity) -> Vec<u8> {
    identity.kem_pk.as_bytes().to_vec()
}

fn sig_pk_bytes(identity: &Identity) -> Vec<u8> {
    identity.sig_pk.as_bytes().to_vec()
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn spawn_test_node(ex: &Arc<Executor<'static>>) -> (NodePtr, Identity) {
    let identity = Identity::generate();
    let addr = format!("127.0.0.1:{}", free_port());
    let overlay = OverlayInfo::dev_mode(addr.clone());

    let messages = MessageStores::open_in_memory_for_test().await;
    let dht_stores = DhtStores::open_in_memory_for_test().await;

    let self_id = node_id_from_identifier(&identity.identifier);
    let transport_impl = Arc::new(transport::HttpDhtTransport);
    let kademlia = Kademlia::new(self_id, dht_stores.dht.clone(), transport_impl);

    let identity_clone = clone_identity_for_test(&identity);
    let node = Node::new(
        identity_clone,
        overlay,
        messages.contacts,
        messages.inbox,
        messages.forward_queue,
        messages.seen_set,
        kademlia,
        dht_stores.dht,
    );

    let server_node = node.clone();
    let server_ex = ex.clone();
    server_ex
        .spawn(async move {
            let _ = transport::serve(server_node, &addr).await;
        })
        .detach();

    (node, identity)
}

/// Test-only: `Identity` does not implement `Clone` (its secret bytes are
/// zeroized on drop, so a clone would double the live-secret surface for no
/// reason in production code). For setting up two handles to the same
/// identity in-process, tests instead regenerate the public-key-derived
/// fields and share the secret bytes via a throwaway re-seal/unlock round
/// trip, which is the only public path that reconstructs an `Identity`.
fn clone_identity_for_test(identity: &Identity) -> Identity {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k.json");
    zerotrace::crypto::identity::seal(identity, &path, "test").unwrap();
    zerotrace::crypto::identity::unlock(&path, "test").unwrap()
}

fn contact_of(identity: &Identity, addr: &str) -> Contact {
    Contact {
        identifier: identity.identifier.clone(),
        display_name: identity.identifier.clone(),
        anonymous_address: addr.to_string(),
        kem_pk: kem_pk_bytes(identity),
        sig_pk: sig_pk_bytes(identity),
    }
}

fn run_on_pool<F, Fut>(body: F)
where
    F: FnOnce(Arc<Executor<'static>>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()>,
{
    let ex = Arc::new(Executor::new());
    let (signal, shutdown) = smol::channel::unbounded::<()>();
    let ex2 = ex.clone();

    easy_parallel::Parallel::new()
        .each(0..4, |_| smol::future::block_on(ex2.run(shutdown.recv())))
        .finish(|| {
            smol::future::block_on(async move {
                body(ex.clone()).await;
                drop(signal);
            })
        });
}

#[test]
fn s3_two_hop_forward_is_idempotent() {
    run_on_pool(|ex| async move {
        let (node_a, identity_a) = spawn_test_node(&ex).await;
        let (node_b, identity_b) = spawn_test_node(&ex).await;
        let (node_c, identity_c) = spawn_test_node(&ex).await;
        task::sleep(Duration::from_millis(50)).await;

        let addr_a = node_a.self_addr().await;
        let addr_b = node_b.self_addr().await;
        let addr_c = node_c.self_addr().await;

        // A knows B; B knows A and C; C knows B. A does not know C.
        node_a.contacts.upsert(&contact_of(&identity_b, &addr_b)).await.unwrap();
        node_b.contacts.upsert(&contact_of(&identity_a, &addr_a)).await.unwrap();
        node_b.contacts.upsert(&contact_of(&identity_c, &addr_c)).await.unwrap();
        node_c.contacts.upsert(&contact_of(&identity_b, &addr_b)).await.unwrap();

        let identity_a_read = node_a.identity.read().await;
        let kem_pk_c = kem_pk_bytes(&identity_c);
        let recipient = envelope::RecipientKeys { identifier: &identity_c.identifier, kem_pk: &kem_pk_c };
        let wire = envelope::encrypt(&identity_a_read, &addr_a, &recipient, b"hello c").unwrap();
        drop(identity_a_read);

        // A sends to its only known contact, B.
        transport::send_wire(&addr_b, &wire).await.unwrap();
        task::sleep(Duration::from_millis(300)).await;

        let inbox = node_c.inbox.all().await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sender_id, identity_a.identifier);
        assert_eq!(String::from_utf8_lossy(&inbox[0].msg), "hello c");

        // A's identical resend leaves C's inbox at one message.
        transport::send_wire(&addr_b, &wire).await.unwrap();
        task::sleep(Duration::from_millis(300)).await;
        let inbox = node_c.inbox.all().await.unwrap();
        assert_eq!(inbox.len(), 1, "duplicate signature must not be delivered twice");
    });
}

#[test]
fn s4_ttl_exhausted_message_is_not_forwarded_but_is_queued() {
    run_on_pool(|ex| async move {
        let (node_b, identity_b) = spawn_test_node(&ex).await;
        let (node_c, identity_c) = spawn_test_node(&ex).await;
        task::sleep(Duration::from_millis(50)).await;

        let addr_b = node_b.self_addr().await;
        let addr_c = node_c.self_addr().await;
        node_b.contacts.upsert(&contact_of(&identity_c, &addr_c)).await.unwrap();

        let identity_dummy = Identity::generate();
        let kem_pk_c = kem_pk_bytes(&identity_c);
        let recipient = envelope::RecipientKeys { identifier: &identity_c.identifier, kem_pk: &kem_pk_c };
        let mut wire = envelope::encrypt(&identity_dummy, "nowhere.b32.i2p", &recipient, b"stuck").unwrap();
        // Force the already-exhausted state a ttl=1 arrival with a
        // worst-case decrement of 2 would produce (spec S4): deterministic
        // here since the decrement itself is randomized.
        wire.ttl = 0;

        zerotrace::routing::handle_inbound(&node_b, wire).await.unwrap();
        task::sleep(Duration::from_millis(200)).await;

        let c_inbox = node_c.inbox.all().await.unwrap();
        assert!(c_inbox.is_empty(), "exhausted ttl must not fan out to c");

        let queued = node_b.forward_queue.drain(&identity_c.identifier).await.unwrap();
        assert_eq!(queued.len(), 1, "the known-contact forward-queue push happens regardless of ttl");
    });
}

#[test]
fn s5_dht_publish_and_discover() {
    run_on_pool(|ex| async move {
        const NET_SIZE: usize = 6;
        let mut nodes = Vec::new();
        let mut identities = Vec::new();
        for _ in 0..NET_SIZE {
            let (node, identity) = spawn_test_node(&ex).await;
            nodes.push(node);
            identities.push(identity);
        }
        task::sleep(Duration::from_millis(50)).await;

        // Fully bootstrap: every node knows every other node's dht contact.
        for i in 0..NET_SIZE {
            for j in 0..NET_SIZE {
                if i == j {
                    continue;
                }
                let addr_j = nodes[j].self_addr().await;
                let node_id_j = node_id_from_identifier(&identities[j].identifier);
                nodes[i]
                    .dht
                    .table
                    .insert_or_refresh(zerotrace::dht::kbucket::Contact {
                        node_id: node_id_j,
                        address: addr_j,
                        last_seen: zerotrace::util::now_unix(),
                    })
                    .await;
            }
        }

        let alice = &nodes[0];
        let alice_identity = &identities[0];
        let alice_addr = alice.self_addr().await;
        let record = sign_record(alice_identity, &alice_addr);
        assert!(alice.dht.store(&record, true).await.unwrap());

        let bob = &nodes[NET_SIZE - 1];
        let target = node_id_from_identifier(&alice_identity.identifier);
        let (found, _) = bob.dht.lookup(&target, true).await.unwrap();
        let found = found.expect("bob must discover alice's record");
        assert_eq!(found.addr, alice_addr);
        assert_eq!(found.identifier, alice_identity.identifier);
    });
}

#[test]
fn s6_poisoned_record_is_discarded_in_favor_of_the_valid_one() {
    run_on_pool(|ex| async move {
        let (honest, honest_identity) = spawn_test_node(&ex).await;
        let (malicious, _malicious_identity) = spawn_test_node(&ex).await;
        let (bob, _bob_identity) = spawn_test_node(&ex).await;
        task::sleep(Duration::from_millis(50)).await;

        let honest_addr = honest.self_addr().await;
        let malicious_addr = malicious.self_addr().await;
        let honest_node_id = node_id_from_identifier(&honest_identity.identifier);

        let valid_record = sign_record(&honest_identity, &honest_addr);
        honest.dht_store.put_value(&valid_record, true).await.unwrap();

        let mut poisoned = valid_record.clone();
        poisoned.addr = "attacker-controlled.b32.i2p".to_string();
        // addr_signature is left over from the real record, so it no
        // longer verifies against the tampered addr.
        malicious.dht_store.put_value(&poisoned, false).await.unwrap();

        bob.dht
            .table
            .insert_or_refresh(zerotrace::dht::kbucket::Contact {
                node_id: node_id_from_identifier("malicious"),
                address: malicious_addr,
                last_seen: zerotrace::util::now_unix(),
            })
            .await;
        bob.dht
            .table
            .insert_or_refresh(zerotrace::dht::kbucket::Contact {
                node_id: honest_node_id,
                address: honest_addr.clone(),
                last_seen: zerotrace::util::now_unix(),
            })
            .await;

        let target = node_id_from_identifier(&honest_identity.identifier);
        let (found, _) = bob.dht.lookup(&target, true).await.unwrap();
        let found = found.expect("bob must still find the honest record");
        assert_eq!(found.addr, honest_addr);
    });
}

fn sign_record(identity: &Identity, addr: &str) -> DhtRecord {
    use pqcrypto_traits::sign::DetachedSignature as _;
    let sig_sk = identity.sig_secret_key().unwrap();
    let sig = zerotrace::crypto::pq::mldsa::sign_detached(addr.as_bytes(), &sig_sk);
    DhtRecord {
        identifier: identity.identifier.clone(),
        kem_pk: kem_pk_bytes(identity),
        sig_pk: sig_pk_bytes(identity),
        addr: addr.to_string(),
        ts: zerotrace::util::now_unix(),
        addr_signature: sig.as_bytes().to_vec(),
    }
}
