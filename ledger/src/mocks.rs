use crate::state::{Memory, Store};
use anyhow::{anyhow, Result};
use funnel_types::{Key, PlayerId, Status, UserRecord, Value};

/// Store whose every call fails, for exercising backend-error paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unavailable;

impl Store for Unavailable {
    async fn get(&self, _key: &Key) -> Result<Option<Value>> {
        Err(anyhow!("store unavailable"))
    }

    async fn set(&self, _key: Key, _value: Value) -> Result<()> {
        Err(anyhow!("store unavailable"))
    }

    async fn delete(&self, _key: &Key) -> Result<bool> {
        Err(anyhow!("store unavailable"))
    }

    async fn update<F, T>(&self, _key: Key, _f: F) -> Result<T>
    where
        F: FnMut(Option<Value>) -> (Option<Status>, T) + Send,
        T: Send,
    {
        Err(anyhow!("store unavailable"))
    }
}

/// Creates a memory store pre-seeded with the given records.
pub async fn seeded_memory(records: &[(&str, UserRecord)]) -> Memory {
    let store = Memory::new();
    for (id, record) in records {
        let id = PlayerId::parse(id).expect("valid player id");
        store
            .set(Key::User(id), Value::User(record.clone()))
            .await
            .expect("memory store never fails");
    }
    store
}
