//! Cancellable pull streams used for LLM tokens and synthesized audio.
//!
//! A producer task writes into a channel that holds at most one item. The
//! consumer pulls with [`CancellableStream::next`]. Once [`cancel`] has been
//! called nothing more is handed out, even if an item is already buffered,
//! and the producer task is aborted.
//!
//! [`cancel`]: CancellableStream::cancel

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Items in flight between producer and consumer
pub const STREAM_BUFFER: usize = 1;

/// Consumer half of a cancellable producer/consumer pair
pub struct CancellableStream<T> {
    rx: mpsc::Receiver<T>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Producer half handed to the spawned task
pub struct StreamSink<T> {
    tx: mpsc::Sender<T>,
    token: CancellationToken,
}

impl<T: Send + 'static> CancellableStream<T> {
    /// Spawn `producer` on the runtime and return the consumer side.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(StreamSink<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let token = CancellationToken::new();
        let sink = StreamSink {
            tx,
            token: token.clone(),
        };
        let task = tokio::spawn(producer(sink));

        Self {
            rx,
            token,
            task: Some(task),
        }
    }

    /// Stream that yields `items` in order and then ends.
    pub fn from_items(items: Vec<T>) -> Self {
        Self::spawn(move |sink| async move {
            for item in items {
                if !sink.send(item).await {
                    return;
                }
            }
        })
    }
}

impl<T> CancellableStream<T> {
    /// Next item, or `None` when the producer finished or the stream was cancelled.
    pub async fn next(&mut self) -> Option<T> {
        if self.token.is_cancelled() {
            return None;
        }

        let item = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            item = self.rx.recv() => item,
        };

        // cancel() may have raced with recv()
        if self.token.is_cancelled() {
            return None;
        }
        item
    }

    /// Stop the producer. Takes effect before the next call to [`next`](Self::next).
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<T> Drop for CancellableStream<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> StreamSink<T> {
    /// Hand one item to the consumer, waiting for buffer space.
    ///
    /// Returns false once the consumer cancelled or went away; the producer
    /// should stop at that point.
    pub async fn send(&self, item: T) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            res = self.tx.send(item) => res.is_ok(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves when the consumer cancels.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
