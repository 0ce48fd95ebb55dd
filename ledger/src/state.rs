use anyhow::Result;
use funnel_types::{Key, Status, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// Key-value capability the ledger runs against.
///
/// Every mutation of a single key goes through [`Store::update`], which must
/// not interleave with any other writer of the same key.
pub trait Store: Send + Sync {
    fn get(&self, key: &Key) -> impl Future<Output = Result<Option<Value>>> + Send;
    fn set(&self, key: Key, value: Value) -> impl Future<Output = Result<()>> + Send;

    /// Removes the entry, returning whether one existed.
    fn delete(&self, key: &Key) -> impl Future<Output = Result<bool>> + Send;

    /// Atomic read-modify-write of one key.
    ///
    /// `f` receives the current value and returns the change to commit (or
    /// `None` to leave the entry untouched) plus a result for the caller.
    /// Backends that detect conflicts optimistically may call `f` again with
    /// the fresher value; only the committed run's result is returned.
    fn update<F, T>(&self, key: Key, f: F) -> impl Future<Output = Result<T>> + Send
    where
        F: FnMut(Option<Value>) -> (Option<Status>, T) + Send,
        T: Send;
}

type Slot = Arc<AsyncMutex<Option<Value>>>;

/// In-process store with one async mutex per key.
///
/// A slot is allocated on the first write to a key and is never reclaimed:
/// dropping one while another task still holds its handle would let that
/// task's write land in an orphaned slot.
#[derive(Default)]
pub struct Memory {
    slots: Mutex<HashMap<Key, Slot>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<Key, Slot>> {
        match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => {
                tracing::warn!("memory store lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    fn existing(&self, key: &Key) -> Option<Slot> {
        self.slots().get(key).cloned()
    }

    fn slot(&self, key: &Key) -> Slot {
        self.slots().entry(key.clone()).or_default().clone()
    }
}

impl Store for Memory {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        let Some(slot) = self.existing(key) else {
            return Ok(None);
        };
        let value = slot.lock().await.clone();
        Ok(value)
    }

    async fn set(&self, key: Key, value: Value) -> Result<()> {
        let slot = self.slot(&key);
        *slot.lock().await = Some(value);
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<bool> {
        let Some(slot) = self.existing(key) else {
            return Ok(false);
        };
        let existed = slot.lock().await.take().is_some();
        Ok(existed)
    }

    async fn update<F, T>(&self, key: Key, mut f: F) -> Result<T>
    where
        F: FnMut(Option<Value>) -> (Option<Status>, T) + Send,
        T: Send,
    {
        let slot = match self.existing(&key) {
            Some(slot) => slot,
            None => {
                let (status, result) = f(None);
                let Some(Status::Update(value)) = status else {
                    return Ok(result);
                };
                // Only a write to an absent key allocates a slot. If another
                // task inserted one meanwhile, rerun `f` against it.
                let mut slots = self.slots();
                match slots.get(&key) {
                    Some(slot) => slot.clone(),
                    None => {
                        slots.insert(key, Arc::new(AsyncMutex::new(Some(value))));
                        return Ok(result);
                    }
                }
            }
        };
        let mut entry = slot.lock().await;
        let (status, result) = f(entry.clone());
        match status {
            Some(Status::Update(value)) => *entry = Some(value),
            Some(Status::Delete) => *entry = None,
            None => {}
        }
        Ok(result)
    }
}
