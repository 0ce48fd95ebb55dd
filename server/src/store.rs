use anyhow::{bail, Context, Result};
use funnel_ledger::{Memory, Store};
use funnel_types::{Key, Status, Value};
use redis::{
    aio::{ConnectionManager, MultiplexedConnection},
    AsyncCommands,
};
use tokio::sync::{Mutex, Semaphore};

/// Attempts before an optimistic transaction gives up on a contended key.
const MAX_TRANSACTION_ATTEMPTS: usize = 16;

/// Upper bound on connections held for `WATCH` transactions.
const TRANSACTION_CONNECTIONS: usize = 8;

/// Player records in Redis, one JSON string per key.
///
/// Plain reads and writes share one [`ConnectionManager`]. `WATCH` state is
/// per connection, so each [`Store::update`] borrows a dedicated connection
/// from a pool of at most [`TRANSACTION_CONNECTIONS`]; further updates wait
/// for a permit instead of opening more sockets.
pub struct RedisStore {
    client: redis::Client,
    connection: Mutex<Option<ConnectionManager>>,
    transaction_permits: Semaphore,
    idle_transactions: Mutex<Vec<MultiplexedConnection>>,
    prefix: String,
}

impl RedisStore {
    pub fn new(url: &str, prefix: String) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            transaction_permits: Semaphore::new(TRANSACTION_CONNECTIONS),
            idle_transactions: Mutex::new(Vec::new()),
            prefix,
        })
    }

    fn key(&self, key: &Key) -> String {
        format!("{}{}", self.prefix, key.storage_key())
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_connection_manager()
            .await
            .context("connect to redis")?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        *self.connection.lock().await = None;
    }

    /// Drops the cached connection when a command fails so the next call reconnects.
    async fn checked<T>(&self, result: redis::RedisResult<T>, op: &str, key: &str) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(key, "redis {op} failed: {err}");
                self.reset().await;
                Err(err).with_context(|| format!("redis {op} {key}"))
            }
        }
    }

    /// One optimistic `WATCH`/`MULTI`/`EXEC` read-modify-write on `conn`.
    async fn transact<F, T>(
        &self,
        conn: &mut MultiplexedConnection,
        key: &Key,
        full_key: &str,
        f: &mut F,
    ) -> Result<T>
    where
        F: FnMut(Option<Value>) -> (Option<Status>, T) + Send,
        T: Send,
    {
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let _: () = redis::cmd("WATCH")
                .arg(full_key)
                .query_async(&mut *conn)
                .await
                .with_context(|| format!("redis WATCH {full_key}"))?;
            let raw: Option<String> = conn
                .get(full_key)
                .await
                .with_context(|| format!("redis GET {full_key}"))?;
            let current = raw
                .map(|raw| Value::decode(key, &raw))
                .transpose()
                .with_context(|| format!("decode {full_key}"))?;

            let (status, result) = f(current);
            let Some(status) = status else {
                let _: () = redis::cmd("UNWATCH")
                    .query_async(&mut *conn)
                    .await
                    .with_context(|| format!("redis UNWATCH {full_key}"))?;
                return Ok(result);
            };

            let mut pipe = redis::pipe();
            pipe.atomic();
            match status {
                Status::Update(value) => {
                    let encoded = value.encode().context("encode value")?;
                    pipe.set(full_key, encoded).ignore();
                }
                Status::Delete => {
                    pipe.del(full_key).ignore();
                }
            }
            let committed: Option<()> = pipe
                .query_async(&mut *conn)
                .await
                .with_context(|| format!("redis EXEC {full_key}"))?;
            if committed.is_some() {
                return Ok(result);
            }
            tracing::debug!(key = %full_key, attempt, "transaction conflicted; retrying");
        }
        bail!("transaction on {full_key} conflicted {MAX_TRANSACTION_ATTEMPTS} times")
    }
}

impl Store for RedisStore {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        let full_key = self.key(key);
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<Option<String>> = conn.get(&full_key).await;
        let raw = self.checked(result, "GET", &full_key).await?;
        raw.map(|raw| Value::decode(key, &raw))
            .transpose()
            .with_context(|| format!("decode {full_key}"))
    }

    async fn set(&self, key: Key, value: Value) -> Result<()> {
        let full_key = self.key(&key);
        let encoded = value.encode().context("encode value")?;
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> = conn.set(&full_key, encoded).await;
        self.checked(result, "SET", &full_key).await
    }

    async fn delete(&self, key: &Key) -> Result<bool> {
        let full_key = self.key(key);
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<u64> = conn.del(&full_key).await;
        let removed = self.checked(result, "DEL", &full_key).await?;
        Ok(removed > 0)
    }

    async fn update<F, T>(&self, key: Key, mut f: F) -> Result<T>
    where
        F: FnMut(Option<Value>) -> (Option<Status>, T) + Send,
        T: Send,
    {
        let full_key = self.key(&key);
        let _permit = self
            .transaction_permits
            .acquire()
            .await
            .context("transaction pool closed")?;
        let idle = self.idle_transactions.lock().await.pop();
        let mut conn = match idle {
            Some(conn) => conn,
            None => self
                .client
                .get_multiplexed_async_connection()
                .await
                .context("connect to redis")?,
        };

        let result = self.transact(&mut conn, &key, &full_key, &mut f).await;
        // A connection that failed mid-transaction may still hold a WATCH.
        if result.is_ok() {
            self.idle_transactions.lock().await.push(conn);
        }
        result
    }
}

/// Store selected at startup.
pub enum Backend {
    Memory(Memory),
    Redis(RedisStore),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Redis(_) => "redis",
        }
    }
}

impl Store for Backend {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        match self {
            Backend::Memory(store) => store.get(key).await,
            Backend::Redis(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: Key, value: Value) -> Result<()> {
        match self {
            Backend::Memory(store) => store.set(key, value).await,
            Backend::Redis(store) => store.set(key, value).await,
        }
    }

    async fn delete(&self, key: &Key) -> Result<bool> {
        match self {
            Backend::Memory(store) => store.delete(key).await,
            Backend::Redis(store) => store.delete(key).await,
        }
    }

    async fn update<F, T>(&self, key: Key, f: F) -> Result<T>
    where
        F: FnMut(Option<Value>) -> (Option<Status>, T) + Send,
        T: Send,
    {
        match self {
            Backend::Memory(store) => store.update(key, f).await,
            Backend::Redis(store) => store.update(key, f).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_types::{PlayerId, UserRecord};
    use std::sync::Arc;
    use uuid::Uuid;

    /// Store under a throwaway prefix on the server named by `REDIS_URL`.
    fn live_store() -> Option<(String, RedisStore)> {
        let url = std::env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())?;
        let prefix = format!("funnel-test:{}:", Uuid::new_v4());
        let store = RedisStore::new(&url, prefix).unwrap();
        Some((url, store))
    }

    fn credits(store_value: Option<Value>) -> u32 {
        store_value
            .and_then(Value::into_user)
            .map(|record| record.predictions_left)
            .unwrap_or(0)
    }

    #[test]
    fn test_prefixed_keys() {
        let store = RedisStore::new("redis://127.0.0.1:6379", "funnel:".to_string()).unwrap();
        let key = Key::User(PlayerId::parse("p42").unwrap());
        assert_eq!(store.key(&key), "funnel:user:p42");
        assert_eq!(store.key(&Key::PromoCode), "funnel:app_config:promo_code");
    }

    #[tokio::test]
    async fn test_memory_backend_delegates() {
        let backend = Backend::Memory(Memory::new());
        assert_eq!(backend.name(), "memory");
        let key = Key::User(PlayerId::parse("p42").unwrap());
        let record = UserRecord {
            registered: true,
            total_deposit: 12.0,
            predictions_left: 15,
        };
        backend
            .set(key.clone(), Value::User(record.clone()))
            .await
            .unwrap();
        let spent = backend
            .update(key.clone(), |current| {
                let mut record = current.and_then(Value::into_user).unwrap();
                record.predictions_left -= 1;
                let left = record.predictions_left;
                (Some(Status::Update(Value::User(record))), left)
            })
            .await
            .unwrap();
        assert_eq!(spent, 14);
        assert!(backend.delete(&key).await.unwrap());
        assert_eq!(backend.get(&key).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires a Redis server in REDIS_URL"]
    async fn test_redis_concurrent_updates_are_not_lost() {
        let Some((_, store)) = live_store() else {
            return;
        };
        let store = Arc::new(store);
        let key = Key::User(PlayerId::parse("racer").unwrap());
        store
            .set(key.clone(), Value::User(UserRecord::default()))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(key, |current| {
                        let mut record = current.and_then(Value::into_user).unwrap_or_default();
                        record.predictions_left += 1;
                        (Some(Status::Update(Value::User(record))), ())
                    })
                    .await
            }));
        }
        let mut committed = 0u32;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                committed += 1;
            }
        }

        // Updates that gave up after repeated conflicts wrote nothing.
        assert!(committed > 0);
        assert_eq!(credits(store.get(&key).await.unwrap()), committed);
        assert!(store.idle_transactions.lock().await.len() <= TRANSACTION_CONNECTIONS);

        let ghost = Key::User(PlayerId::parse("ghost").unwrap());
        let absent = store
            .update(ghost.clone(), |current| (None, current.is_none()))
            .await
            .unwrap();
        assert!(absent);
        assert_eq!(store.get(&ghost).await.unwrap(), None);

        assert!(store.delete(&key).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ignore = "requires a Redis server in REDIS_URL"]
    async fn test_redis_conflicting_write_reruns_update() {
        let Some((url, store)) = live_store() else {
            return;
        };
        let key = Key::User(PlayerId::parse("contended").unwrap());
        let full_key = store.key(&key);
        store
            .set(key.clone(), Value::User(UserRecord::default()))
            .await
            .unwrap();

        // A write from another connection between WATCH and EXEC aborts the
        // first commit; the update must rerun against the fresher value.
        let mut other = redis::Client::open(url).unwrap().get_connection().unwrap();
        let mut calls = 0;
        let seen = store
            .update(key.clone(), |current| {
                calls += 1;
                if calls == 1 {
                    let _: () = redis::Commands::set(
                        &mut other,
                        &full_key,
                        r#"{"registered":true,"deposit":50.0,"predictionsLeft":7}"#,
                    )
                    .unwrap();
                }
                let mut record = current.and_then(Value::into_user).unwrap_or_default();
                let seen = record.predictions_left;
                record.predictions_left += 1;
                (Some(Status::Update(Value::User(record))), seen)
            })
            .await
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(seen, 7);
        assert_eq!(credits(store.get(&key).await.unwrap()), 8);
        assert!(store.delete(&key).await.unwrap());
    }
}
