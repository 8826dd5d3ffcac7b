//! Per-user lock table (§5, §9): a lazily-populated map from user-id to a
//! dedicated `tokio::sync::Mutex`, held for the process's lifetime. Mirrors
//! the teacher's single `Arc<Mutex<HashMap<...>>>` field on `AppState`,
//! generalized from one shared map to one lock per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct UserLockTable {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquires the per-user lock; the returned guard releases it on drop.
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.lock_for(user_id);
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_user_serializes() {
        let table = Arc::new(UserLockTable::new());
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let t1 = {
            let table = table.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let _g = table.acquire("alice").await;
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                order.lock().await.push(1);
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let t2 = {
            let table = table.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let _g = table.acquire("alice").await;
                order.lock().await.push(2);
            })
        };

        t1.await.unwrap();
        t2.await.unwrap();
        assert_eq!(*order.lock().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn different_users_run_in_parallel() {
        let table = UserLockTable::new();
        let g1 = table.acquire("alice").await;
        let g2 = table.acquire("bob").await;
        drop(g1);
        drop(g2);
    }
}
