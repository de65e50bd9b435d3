use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use rst_common::with_tokio::tokio::sync::{Mutex, OwnedMutexGuard};

type Locks = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

/// `ThreadLocks` serializes inbound processing per thread id
///
/// Messages of different threads still run concurrently. An entry lives only while some
/// task holds or waits for it.
#[derive(Clone, Default)]
pub struct ThreadLocks {
    locks: Locks,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, thread_id: String) -> ThreadGuard {
        let lock = match self.locks.lock() {
            Ok(mut locks) => locks.entry(thread_id.to_owned()).or_default().clone(),
            Err(poisoned) => poisoned
                .into_inner()
                .entry(thread_id.to_owned())
                .or_default()
                .clone(),
        };

        let guard = lock.lock_owned().await;
        ThreadGuard {
            thread_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

pub struct ThreadGuard {
    thread_id: String,
    locks: Locks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        // the map keeps one reference, anything above means another task is waiting
        if let Ok(mut locks) = self.locks.lock() {
            let idle = locks
                .get(&self.thread_id)
                .map(|lock| Arc::strong_count(lock) == 1)
                .unwrap_or(false);

            if idle {
                locks.remove(&self.thread_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use rst_common::with_tokio::tokio;

    #[tokio::test]
    async fn test_same_thread_waits() {
        let locks = ThreadLocks::new();
        let guard = locks.acquire("thread-1".to_string()).await;

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("thread-1".to_string()).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        let joined = tokio::time::timeout(Duration::from_secs(1), waiting).await;
        assert!(!joined.is_err());
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_other_thread_proceeds() {
        let locks = ThreadLocks::new();
        let _guard = locks.acquire("thread-1".to_string()).await;

        let other = tokio::time::timeout(
            Duration::from_millis(200),
            locks.acquire("thread-2".to_string()),
        )
        .await;
        assert!(!other.is_err());

        drop(other);
        assert_eq!(locks.len(), 1);
    }
}
