use crate::domain_port::StoreError;
use crate::logger::*;
use redis::aio::ConnectionManager;
use redis::{Cmd, FromRedisValue, Pipeline, RedisError};
use std::future::Future;
use std::time::Duration;

fn is_transient(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_timeout() || e.is_connection_refusal()
}

fn to_store_error(e: RedisError) -> StoreError {
    if is_transient(&e) {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Store(e.to_string())
    }
}

/// Runs `attempt`, and runs it once more when the first failure is transient.
async fn retry_once<T, F, Fut>(op: &str, mut attempt: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RedisError>>,
{
    match attempt().await {
        Ok(v) => Ok(v),
        Err(e) if is_transient(&e) => {
            warn!(op, error = %e, "redis call failed, retrying once");
            attempt().await.map_err(to_store_error)
        }
        Err(e) => Err(to_store_error(e)),
    }
}

/// Seconds for `SET EX`/`EXPIRE`, which reject zero.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// A shared Redis connection that namespaces keys and retries a command once
/// after a connection-level failure. The connection manager reconnects in the
/// background, so the retry runs against a fresh socket.
#[derive(Clone)]
pub struct RetryingRedis {
    conn: ConnectionManager,
    prefix: String,
}

impl RetryingRedis {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RetryingRedis {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(to_store_error)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(to_store_error)?;
        Ok(Self::new(conn, prefix))
    }

    pub fn key(&self, parts: &[&str]) -> String {
        let mut key = self.prefix.clone();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    pub async fn query<T: FromRedisValue + Send>(&self, op: &str, cmd: &Cmd) -> Result<T, StoreError> {
        retry_once(op, || {
            let mut conn = self.conn.clone();
            async move { cmd.query_async::<T>(&mut conn).await }
        })
        .await
    }

    pub async fn exec(&self, op: &str, pipe: &Pipeline) -> Result<(), StoreError> {
        retry_once(op, || {
            let mut conn = self.conn.clone();
            async move { pipe.query_async::<()>(&mut conn).await }
        })
        .await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let pong: String = self.query("ping", &redis::cmd("PING")).await?;
        debug!(pong, "redis reachable");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dropped() -> RedisError {
        std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer").into()
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let calls = AtomicUsize::new(0);
        let got = retry_once("get", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { Err(dropped()) } else { Ok(42) } }
        })
        .await;

        assert_eq!(got.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_transient_failure_is_unavailable() {
        let calls = AtomicUsize::new(0);
        let got: Result<(), _> = retry_once("set", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(dropped()) }
        })
        .await;

        assert!(matches!(got, Err(StoreError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let got: Result<(), _> = retry_once("get", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RedisError::from((redis::ErrorKind::TypeError, "bad type"))) }
        })
        .await;

        assert!(matches!(got, Err(StoreError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
