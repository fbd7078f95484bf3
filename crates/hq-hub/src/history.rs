//! # History Store
//!
//! Bounded, thread-safe buffer of recorded transactions. Queries never hold
//! the lock while they run: they take a [`HistoryStore::snapshot`] of shared
//! pointers and release it.

use hq_core::Transaction;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct HistoryStore {
    entries: RwLock<VecDeque<Arc<Transaction>>>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append transactions in arrival order, evicting the oldest when full.
    pub async fn record_all(&self, transactions: Vec<Transaction>) -> usize {
        let count = transactions.len();
        let mut entries = self.entries.write().await;
        for tx in transactions {
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(Arc::new(tx));
        }
        count
    }

    /// The current history, oldest first.
    pub async fn snapshot(&self) -> Vec<Arc<Transaction>> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drop everything; returns how many transactions were removed.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(path: &str) -> Transaction {
        Transaction::from_raw(
            &format!("http://store.test{}", path),
            "GET / HTTP/1.1\r\n\r\n",
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_is_oldest_first() {
        let store = HistoryStore::new(10);
        store.record_all(vec![tx("/a")]).await;
        store.record_all(vec![tx("/b")]).await;
        let paths: Vec<String> = store.snapshot().await.iter().map(|t| t.path.clone()).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
    }

    #[tokio::test]
    async fn test_oldest_evicted_at_capacity() {
        let store = HistoryStore::new(2);
        store.record_all(vec![tx("/a"), tx("/b"), tx("/c")]).await;
        assert_eq!(store.len().await, 2);
        assert_eq!(store.snapshot().await[0].path, "/b");
    }

    #[tokio::test]
    async fn test_clear_reports_removed() {
        let store = HistoryStore::new(5);
        store.record_all(vec![tx("/a"), tx("/b")]).await;
        assert_eq!(store.clear().await, 2);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_snapshot_survives_later_writes() {
        let store = HistoryStore::new(5);
        store.record_all(vec![tx("/a")]).await;
        let snapshot = store.snapshot().await;
        store.clear().await;
        assert_eq!(snapshot.len(), 1);
    }
}
