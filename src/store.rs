//! Thread-safe keyed table of live credentials
//!
//! [`CredentialStore`] holds at most one live [`Credential`] per resource key.
//! It is the only mutable shared state in the crate: the rotation loops write
//! through it, the executor reads from it (and writes through it when it
//! adopts a fresh credential), and the two never observe a torn value.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::{Credential, CredentialInfo, ResourceKey};

/// Keyed table holding at most one live credential per resource key
///
/// Installing a credential for an existing key atomically replaces the prior
/// entry; it never creates a duplicate. Readers see either "no credential
/// yet" or the most recently fully-installed value — lookups hand out
/// `Arc<Credential>`, so a superseded credential stays usable by in-flight
/// operations after a replacement lands.
///
/// The internal lock is held only for the duration of the in-memory table
/// update, never across authority or operation calls.
///
/// # Examples
///
/// ```
/// use keyrotor::{Credential, CredentialStore, ResourceKey};
///
/// let store = CredentialStore::new();
/// let key = ResourceKey::new("TestDB")?;
///
/// store.put(Credential::new(key.clone(), "fredAstaire", "myPwd"));
/// let live = store.get(&key).expect("just installed");
/// assert_eq!(live.principal(), "fredAstaire");
/// # Ok::<(), keyrotor::ValidationError>(())
/// ```
#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: RwLock<HashMap<ResourceKey, Arc<Credential>>>,
}

impl CredentialStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `credential` as the live value for its resource key
    ///
    /// Atomic add-or-replace: concurrent installs for the same key are
    /// serialized by the store (last writer under the store's own ordering
    /// wins); installs for different keys never corrupt each other. Returns
    /// the credential that was evicted, if any.
    pub fn put(&self, credential: Credential) -> Option<Arc<Credential>> {
        let key = credential.resource_key().clone();
        let evicted = self
            .entries
            .write()
            .insert(key.clone(), Arc::new(credential));

        match &evicted {
            Some(old) => debug!(
                resource_key = %key,
                superseded_principal = %old.principal(),
                "Replaced live credential"
            ),
            None => debug!(resource_key = %key, "Installed first credential"),
        }
        evicted
    }

    /// Returns the current live credential for `key`, if one is installed
    pub fn get(&self, key: &ResourceKey) -> Option<Arc<Credential>> {
        self.entries.read().get(key).cloned()
    }

    /// Clears the entry for `key`; subsequent [`get`](Self::get) returns
    /// `None` until a new [`put`](Self::put)
    pub fn remove(&self, key: &ResourceKey) -> Option<Arc<Credential>> {
        let removed = self.entries.write().remove(key);
        if removed.is_some() {
            debug!(resource_key = %key, "Removed credential");
        }
        removed
    }

    /// Consistent point-in-time view of every live credential, sorted by
    /// resource key; secrets are never included
    pub fn snapshot(&self) -> Vec<CredentialInfo> {
        let mut infos: Vec<CredentialInfo> = self
            .entries
            .read()
            .values()
            .map(|credential| credential.info())
            .collect();
        infos.sort_by(|a, b| a.resource_key.cmp(&b.resource_key));
        infos
    }

    /// Number of keys with a live credential
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no credential is installed for any key
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ResourceKey {
        ResourceKey::new(s).unwrap()
    }

    #[test]
    fn get_on_empty_store_is_none() {
        let store = CredentialStore::new();
        assert!(store.get(&key("TestDB")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn put_replaces_same_key() {
        let store = CredentialStore::new();
        let k = key("TestDB");

        assert!(
            store
                .put(Credential::new(k.clone(), "fredAstaire", "myPwd"))
                .is_none()
        );
        let evicted = store
            .put(Credential::new(k.clone(), "NewUser", "newPwd"))
            .expect("first credential evicted");

        assert_eq!(evicted.principal(), "fredAstaire");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&k).unwrap().principal(), "NewUser");
    }

    #[test]
    fn distinct_keys_get_distinct_entries() {
        let store = CredentialStore::new();
        store.put(Credential::new(key("TestDB"), "fredAstaire", "myPwd"));
        store.put(Credential::new(key("NewDB"), "gingerRogers", "otherPwd"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&key("TestDB")).unwrap().principal(), "fredAstaire");
        assert_eq!(store.get(&key("NewDB")).unwrap().principal(), "gingerRogers");
    }

    #[test]
    fn remove_clears_entry() {
        let store = CredentialStore::new();
        let k = key("TestDB");
        store.put(Credential::new(k.clone(), "fredAstaire", "myPwd"));

        let removed = store.remove(&k).expect("entry existed");
        assert_eq!(removed.principal(), "fredAstaire");
        assert!(store.get(&k).is_none());

        // Removing again is a no-op
        assert!(store.remove(&k).is_none());
    }

    #[test]
    fn superseded_credential_stays_usable() {
        let store = CredentialStore::new();
        let k = key("TestDB");
        store.put(Credential::new(k.clone(), "fredAstaire", "myPwd"));

        // An "in-flight operation" holds the original
        let in_flight = store.get(&k).unwrap();
        store.put(Credential::new(k.clone(), "NewUser", "newPwd"));

        assert_eq!(in_flight.principal(), "fredAstaire");
        assert_eq!(in_flight.secret().expose(), "myPwd");
        assert_eq!(store.get(&k).unwrap().principal(), "NewUser");
    }

    #[test]
    fn snapshot_is_sorted_and_secret_free() {
        let store = CredentialStore::new();
        store.put(Credential::new(key("b-db"), "userB", "pwdB"));
        store.put(Credential::new(key("a-db"), "userA", "pwdA"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].resource_key.as_str(), "a-db");
        assert_eq!(snapshot[1].resource_key.as_str(), "b-db");

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("pwdA"));
        assert!(!json.contains("pwdB"));
    }
}
