//! Streaming query results.
//!
//! A [`Cursor`] owns the producer feeding it. Closing the cursor (explicitly
//! or by dropping it) stops the producer and runs the registered close hooks
//! exactly once.

use std::fmt;
use std::future::Future;

use aggkit_core::{Record, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::StoreError;

const CURSOR_BUFFER: usize = 64;

type CloseHook = Box<dyn FnOnce() + Send + 'static>;

/// Values produced by an aggregation query.
pub type ResultSet = Cursor<Value>;
/// Records produced by a plain query.
pub type RecordSet = Cursor<Record>;

pub struct Cursor<T> {
    query_id: Uuid,
    results: mpsc::Receiver<Result<T, StoreError>>,
    producer: Option<JoinHandle<()>>,
    on_close: Vec<CloseHook>,
    closed: bool,
}

impl<T: Send + 'static> Cursor<T> {
    /// Spawn `produce` to feed a new cursor.
    pub(crate) fn spawn<F, Fut>(produce: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Result<T, StoreError>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CURSOR_BUFFER);
        let producer = tokio::spawn(produce(tx));
        Self {
            query_id: Uuid::new_v4(),
            results: rx,
            producer: Some(producer),
            on_close: Vec::new(),
            closed: false,
        }
    }
}

impl<T> Cursor<T> {
    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Register `hook` to run when the cursor closes.
    pub fn on_close(&mut self, hook: impl FnOnce() + Send + 'static) {
        if self.closed {
            hook();
        } else {
            self.on_close.push(Box::new(hook));
        }
    }

    /// Next result, or `None` once the stream is exhausted or closed.
    pub async fn next(&mut self) -> Option<Result<T, StoreError>> {
        if self.closed {
            return None;
        }
        self.results.recv().await
    }

    /// Drain the remaining results, stopping at the first error.
    pub async fn try_collect(&mut self) -> Result<Vec<T>, StoreError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.results.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        for hook in self.on_close.drain(..) {
            hook();
        }
        tracing::debug!(query_id = %self.query_id, "cursor closed");
    }
}

impl<T> Drop for Cursor<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("query_id", &self.query_id)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(cursor: &mut Cursor<i64>) -> Arc<AtomicUsize> {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        cursor.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        closes
    }

    #[tokio::test]
    async fn yields_then_ends() {
        let mut cursor = Cursor::spawn(|tx| async move {
            for i in 0..3 {
                let _ = tx.send(Ok(i)).await;
            }
        });
        assert_eq!(cursor.try_collect().await.unwrap(), vec![0, 1, 2]);
        assert!(cursor.next().await.is_none());
    }

    #[tokio::test]
    async fn close_runs_hooks_once() {
        let mut cursor = Cursor::spawn(|_tx| async {});
        let closes = counting(&mut cursor);
        cursor.close();
        cursor.close();
        drop(cursor);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_closes() {
        let mut cursor = Cursor::spawn(|tx| async move {
            let _ = tx.send(Ok(1)).await;
        });
        let closes = counting(&mut cursor);
        drop(cursor);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_cursor_stops_yielding() {
        let mut cursor = Cursor::spawn(|tx| async move {
            let mut i = 0;
            while tx.send(Ok(i)).await.is_ok() {
                i += 1;
            }
        });
        assert!(cursor.next().await.is_some());
        cursor.close();
        assert!(cursor.is_closed());
        assert!(cursor.next().await.is_none());
    }

    #[tokio::test]
    async fn hook_added_after_close_runs_immediately() {
        let mut cursor = Cursor::spawn(|_tx| async {});
        cursor.close();
        let closes = counting(&mut cursor);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
