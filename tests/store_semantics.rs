//! Integration tests for the credential store
//!
//! These verify the single-live-credential invariant, atomic replacement,
//! and the consistency of diagnostic snapshots under concurrent writers.

use pretty_assertions::assert_eq;
use std::sync::Arc;

use keyrotor::{Credential, CredentialStore, ResourceKey};

fn key(s: &str) -> ResourceKey {
    ResourceKey::new(s).unwrap()
}

#[test]
fn replacing_a_credential_keeps_one_entry_per_key() {
    // GIVEN: a store with a credential for TestDB
    let store = CredentialStore::new();
    store.put(Credential::new(key("TestDB"), "fredAstaire", "myPwd"));

    // WHEN: a second credential is installed for the same key
    store.put(Credential::new(key("TestDB"), "NewUser", "newPwd"));

    // THEN: exactly one entry remains, holding the newer principal
    assert_eq!(store.len(), 1);
    let live = store.get(&key("TestDB")).unwrap();
    assert_eq!(live.principal(), "NewUser");
    assert_eq!(live.secret().expose(), "newPwd");
}

#[test]
fn distinct_keys_accumulate_distinct_entries() {
    // GIVEN: credentials for two different resources
    let store = CredentialStore::new();
    store.put(Credential::new(key("TestDB"), "fredAstaire", "myPwd"));
    store.put(Credential::new(key("NewDB"), "gingerRogers", "otherPwd"));

    // THEN: the store holds exactly two entries
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&key("TestDB")).unwrap().principal(), "fredAstaire");
    assert_eq!(store.get(&key("NewDB")).unwrap().principal(), "gingerRogers");
}

#[test]
fn sequential_puts_leave_the_last_writer_live() {
    // GIVEN: N sequential installs for the same key
    let store = CredentialStore::new();
    let k = key("TestDB");
    for n in 0..10 {
        store.put(Credential::new(k.clone(), format!("user-{n}"), format!("pwd-{n}")));
    }

    // THEN: the Nth install is the one observed
    let live = store.get(&k).unwrap();
    assert_eq!(live.principal(), "user-9");
    assert_eq!(store.len(), 1);
}

#[test]
fn removed_key_reads_absent_until_reinstalled() {
    let store = CredentialStore::new();
    let k = key("TestDB");
    store.put(Credential::new(k.clone(), "fredAstaire", "myPwd"));

    store.remove(&k);
    assert!(store.get(&k).is_none());

    store.put(Credential::new(k.clone(), "NewUser", "newPwd"));
    assert_eq!(store.get(&k).unwrap().principal(), "NewUser");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_installs_for_different_keys_do_not_interfere() {
    // GIVEN: many writers installing under different keys concurrently
    let store = Arc::new(CredentialStore::new());

    let mut tasks = Vec::new();
    for n in 0..32 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            let k = ResourceKey::new(format!("db-{n}")).unwrap();
            for round in 0..50 {
                store.put(Credential::new(
                    k.clone(),
                    format!("user-{n}-{round}"),
                    format!("pwd-{n}-{round}"),
                ));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // THEN: every key holds exactly its own final credential
    assert_eq!(store.len(), 32);
    for n in 0..32 {
        let k = ResourceKey::new(format!("db-{n}")).unwrap();
        let live = store.get(&k).unwrap();
        assert_eq!(live.principal(), format!("user-{n}-49"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_torn_credential() {
    // GIVEN: one writer replacing a key in a tight loop
    let store = Arc::new(CredentialStore::new());
    let k = key("TestDB");
    store.put(Credential::new(k.clone(), "user-0", "pwd-0"));

    let writer = {
        let store = Arc::clone(&store);
        let k = k.clone();
        tokio::spawn(async move {
            for n in 1..500u32 {
                store.put(Credential::new(k.clone(), format!("user-{n}"), format!("pwd-{n}")));
            }
        })
    };

    // WHEN: readers race the writer
    // THEN: every read sees a matching principal/secret pair from some
    // fully-applied install
    let reader = {
        let store = Arc::clone(&store);
        let k = k.clone();
        tokio::spawn(async move {
            for _ in 0..500 {
                let live = store.get(&k).expect("never absent");
                let n = live
                    .principal()
                    .strip_prefix("user-")
                    .expect("well-formed principal");
                assert_eq!(live.secret().expose(), format!("pwd-{n}"));
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
}

#[test]
fn snapshot_views_every_key_exactly_once() {
    let store = CredentialStore::new();
    store.put(Credential::new(key("TestDB"), "fredAstaire", "myPwd"));
    store.put(Credential::new(key("NewDB"), "gingerRogers", "otherPwd"));
    store.put(Credential::new(key("TestDB"), "NewUser", "newPwd"));

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 2);

    let mut keys: Vec<&str> = snapshot.iter().map(|i| i.resource_key.as_str()).collect();
    keys.dedup();
    assert_eq!(keys, vec!["NewDB", "TestDB"]);

    let test_db = snapshot
        .iter()
        .find(|i| i.resource_key.as_str() == "TestDB")
        .unwrap();
    assert_eq!(test_db.principal, "NewUser");
}
