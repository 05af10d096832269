//! Two-party key negotiation and the message cipher.

use std::time::Duration;

use pv_session::{Session, SessionError};
use pv_store::{ChatRecord, MemoryStore, RemoteStore};

struct Pair {
    store: MemoryStore,
    alice: Session<MemoryStore>,
    bob: Session<MemoryStore>,
    alice_uid: String,
    bob_uid: String,
    bob_public_key: String,
}

/// Alice and Bob signed up on a shared store, with `chat1` created.
async fn pair_with_chat() -> Pair {
    let store = MemoryStore::new();
    let alice = Session::new(store.clone());
    alice
        .signup("alice@example.com", "pw-a", "alice", None)
        .await
        .unwrap();
    let bob = Session::new(store.clone());
    bob.signup("bob@example.com", "pw-b", "bob", None)
        .await
        .unwrap();

    let alice_uid = alice.profile().await.unwrap().uid;
    let bob_uid = bob.profile().await.unwrap().uid;
    let bob_public_key = store.get_account(&bob_uid).await.unwrap().kem_public_key;

    store
        .create_chat(ChatRecord {
            id: "chat1".into(),
            users: [alice_uid.clone(), bob_uid.clone()],
            pending_key_encap: None,
        })
        .await
        .unwrap();

    Pair {
        store,
        alice,
        bob,
        alice_uid,
        bob_uid,
        bob_public_key,
    }
}

#[tokio::test]
async fn both_sides_derive_the_same_chat_key() {
    let p = pair_with_chat().await;

    let ciphertext = p
        .alice
        .encap_and_save_key("chat1", &p.bob_uid, &p.bob_public_key)
        .await
        .unwrap();

    // Initiation published the pending payload, addressed to Bob.
    let pending = p
        .store
        .get_chat("chat1")
        .await
        .unwrap()
        .pending_key_encap
        .unwrap();
    assert_eq!(pending.recipient_id, p.bob_uid);
    assert_eq!(pending.ciphertext, ciphertext);

    p.bob.decap_and_save_key("chat1", &ciphertext).await.unwrap();

    // Bit-identical secrets on both sides.
    let alice_key = p.alice.get_chat_key("chat1").await.unwrap();
    let bob_key = p.bob.get_chat_key("chat1").await.unwrap();
    assert_eq!(alice_key.as_bytes(), bob_key.as_bytes());

    // Consumption cleared the payload.
    assert!(p
        .store
        .get_chat("chat1")
        .await
        .unwrap()
        .pending_key_encap
        .is_none());

    // "hello" crosses the boundary through independently derived keys.
    let blob = p.alice.encrypt_message("chat1", "hello").await.unwrap();
    assert_eq!(p.bob.decrypt_message("chat1", &blob).await, "hello");
}

#[tokio::test]
async fn repeated_decapsulation_is_a_no_op() {
    let p = pair_with_chat().await;
    let ciphertext = p
        .alice
        .encap_and_save_key("chat1", &p.bob_uid, &p.bob_public_key)
        .await
        .unwrap();

    p.bob.decap_and_save_key("chat1", &ciphertext).await.unwrap();
    let first = p.bob.get_chat_key("chat1").await.unwrap();

    // Payload is already cleared; a repeat call must change nothing and
    // raise nothing — even with a garbage ciphertext.
    p.bob.decap_and_save_key("chat1", &ciphertext).await.unwrap();
    p.bob.decap_and_save_key("chat1", "garbage").await.unwrap();
    let second = p.bob.get_chat_key("chat1").await.unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[tokio::test]
async fn negotiated_secrets_survive_logout_and_login() {
    let p = pair_with_chat().await;
    let ciphertext = p
        .alice
        .encap_and_save_key("chat1", &p.bob_uid, &p.bob_public_key)
        .await
        .unwrap();
    p.bob.decap_and_save_key("chat1", &ciphertext).await.unwrap();
    let before = p.bob.get_chat_key("chat1").await.unwrap();

    p.bob.logout().await;
    assert!(p.bob.get_chat_key("chat1").await.is_none());
    p.bob.login("bob@example.com", "pw-b").await.unwrap();

    let after = p.bob.get_chat_key("chat1").await.unwrap();
    assert_eq!(before.as_bytes(), after.as_bytes());
}

#[tokio::test]
async fn watcher_consumes_the_pending_payload() {
    let p = pair_with_chat().await;

    p.bob.watch_chat("chat1").await.unwrap();
    // Re-watching the same chat registers nothing new.
    p.bob.watch_chat("chat1").await.unwrap();

    p.alice
        .encap_and_save_key("chat1", &p.bob_uid, &p.bob_public_key)
        .await
        .unwrap();

    // The watcher decapsulates asynchronously; poll until the key lands.
    let mut bob_key = None;
    for _ in 0..200 {
        if let Some(key) = p.bob.get_chat_key("chat1").await {
            bob_key = Some(key);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let bob_key = bob_key.expect("watcher should have consumed the payload");

    let alice_key = p.alice.get_chat_key("chat1").await.unwrap();
    assert_eq!(alice_key.as_bytes(), bob_key.as_bytes());
    assert!(p
        .store
        .get_chat("chat1")
        .await
        .unwrap()
        .pending_key_encap
        .is_none());

    p.bob.unwatch_chat("chat1");
}

#[tokio::test]
async fn watcher_ignores_payloads_addressed_to_the_peer() {
    let p = pair_with_chat().await;
    let alice_public_key = p
        .store
        .get_account(&p.alice_uid)
        .await
        .unwrap()
        .kem_public_key;

    // Alice watches while Bob initiates: the payload is addressed to
    // Alice, so Bob's own watcher must leave it alone.
    p.bob.watch_chat("chat1").await.unwrap();
    p.bob
        .encap_and_save_key("chat1", &p.alice_uid, &alice_public_key)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(p
        .store
        .get_chat("chat1")
        .await
        .unwrap()
        .pending_key_encap
        .is_some());
    p.bob.logout().await;
}

#[tokio::test]
async fn watch_requires_an_unlocked_vault() {
    let p = pair_with_chat().await;
    p.bob.logout().await;
    assert!(matches!(
        p.bob.watch_chat("chat1").await.unwrap_err(),
        SessionError::VaultLocked
    ));
}

#[tokio::test]
async fn corrupted_message_degrades_to_placeholder() {
    let p = pair_with_chat().await;
    let ciphertext = p
        .alice
        .encap_and_save_key("chat1", &p.bob_uid, &p.bob_public_key)
        .await
        .unwrap();
    p.bob.decap_and_save_key("chat1", &ciphertext).await.unwrap();

    // Tampered and malformed blobs degrade per message, never abort.
    assert_eq!(
        p.bob.decrypt_message("chat1", "AAAA:AAAA").await,
        pv_session::DECRYPTION_FAILED_PLACEHOLDER
    );
    assert_eq!(
        p.bob.decrypt_message("chat1", "not-a-blob").await,
        pv_session::DECRYPTION_FAILED_PLACEHOLDER
    );

    // A healthy message still decrypts alongside the bad ones.
    let blob = p.alice.encrypt_message("chat1", "still works").await.unwrap();
    assert_eq!(p.bob.decrypt_message("chat1", &blob).await, "still works");
}
