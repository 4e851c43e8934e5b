//! Shared sets of peer addresses

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Set of remote peer addresses shared between the registry and its workers
///
/// Cloning shares the underlying set.
#[derive(Debug, Clone, Default)]
pub struct PeerSet {
    peers: Arc<Mutex<HashSet<String>>>,
}

impl PeerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address, returning whether it was absent
    pub async fn insert(&self, peer: &str) -> bool {
        self.peers.lock().await.insert(peer.to_string())
    }

    /// Remove an address, returning whether it was present
    pub async fn remove(&self, peer: &str) -> bool {
        self.peers.lock().await.remove(peer)
    }

    /// Check membership
    pub async fn contains(&self, peer: &str) -> bool {
        self.peers.lock().await.contains(peer)
    }

    /// Number of addresses
    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    /// Whether the set is empty
    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }

    /// Copy of the current addresses, sorted
    pub async fn snapshot(&self) -> Vec<String> {
        let mut peers: Vec<_> = self.peers.lock().await.iter().cloned().collect();
        peers.sort();
        peers
    }

    /// Apply `f` to the set as one atomic unit
    pub(crate) async fn update<R>(&self, f: impl FnOnce(&mut HashSet<String>) -> R) -> R {
        let mut peers = self.peers.lock().await;
        f(&mut peers)
    }

    #[cfg(test)]
    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, HashSet<String>> {
        self.peers.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_remove() {
        let peers = PeerSet::new();
        assert!(peers.insert("a:1").await);
        assert!(!peers.insert("a:1").await);
        assert!(peers.contains("a:1").await);
        assert_eq!(peers.len().await, 1);

        assert!(peers.remove("a:1").await);
        assert!(peers.is_empty().await);
    }

    #[tokio::test]
    async fn test_clone_shares_set() {
        let peers = PeerSet::new();
        peers.clone().insert("b:2").await;
        peers.insert("a:1").await;

        assert_eq!(peers.snapshot().await, vec!["a:1", "b:2"]);
    }
}
