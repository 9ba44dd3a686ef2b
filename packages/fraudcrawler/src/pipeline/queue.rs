//! Bounded work queues with sentinel shutdown and a drain barrier.
//!
//! A [`WorkQueue`] is a multi-consumer channel: every worker of a stage
//! holds a clone and the first idle worker takes the next message. Each
//! message put on the queue (items and sentinels alike) bumps an
//! unfinished counter; consumers call [`WorkQueue::task_done`] once per
//! message taken. [`WorkQueue::join`] resolves when the counter is back at
//! zero, which is the barrier the orchestrator waits on before advancing
//! to the next stage.

use futures::Stream;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

use crate::error::{PipelineError, Result};
use crate::pipeline::stats::RunStats;
use crate::types::product::ProductItem;

/// A queued message: a payload or the end-of-input marker.
#[derive(Debug)]
pub enum Message<T> {
    Item(T),
    Sentinel,
}

/// Multi-consumer bounded queue with task accounting.
pub struct WorkQueue<T> {
    name: &'static str,
    sender: mpsc::Sender<Message<T>>,
    receiver: Arc<Mutex<mpsc::Receiver<Message<T>>>>,
    unfinished: Arc<watch::Sender<usize>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
            receiver: Arc::clone(&self.receiver),
            unfinished: Arc::clone(&self.unfinished),
        }
    }
}

impl<T: Send> WorkQueue<T> {
    /// Create a queue holding at most `capacity` messages.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (unfinished, _) = watch::channel(0usize);
        Self {
            name,
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            unfinished: Arc::new(unfinished),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue a payload, waiting while the queue is full.
    pub async fn put(&self, item: T) -> Result<()> {
        self.send(Message::Item(item)).await
    }

    /// Enqueue one end-of-input marker.
    pub async fn put_sentinel(&self) -> Result<()> {
        self.send(Message::Sentinel).await
    }

    async fn send(&self, message: Message<T>) -> Result<()> {
        // Count before sending so a fast consumer can never drive the counter below zero.
        self.unfinished.send_modify(|n| *n += 1);
        if self.sender.send(message).await.is_err() {
            self.unfinished.send_modify(|n| *n = n.saturating_sub(1));
            return Err(PipelineError::QueueClosed { queue: self.name });
        }
        Ok(())
    }

    /// Take the next message. `None` only if every sender is gone.
    pub async fn get(&self) -> Option<Message<T>> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    /// Take the next payload for a stage worker.
    ///
    /// On the sentinel this confirms it and returns `None`: the worker must
    /// then exit. Every payload returned still needs its own `task_done`.
    pub async fn next_item(&self) -> Option<T> {
        match self.get().await? {
            Message::Item(item) => Some(item),
            Message::Sentinel => {
                self.task_done();
                None
            }
        }
    }

    /// Confirm that a message obtained from [`get`](Self::get) is fully processed.
    pub fn task_done(&self) {
        self.unfinished.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Messages put but not yet confirmed.
    pub fn unfinished(&self) -> usize {
        *self.unfinished.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Wait until every message ever put has been confirmed.
    pub async fn join(&self) {
        let mut counter = self.unfinished.subscribe();
        if counter.wait_for(|n| *n == 0).await.is_err() {
            tracing::error!(queue = self.name, "Queue counter dropped while joining");
        }
    }
}

/// The final-stage item stream handed to a [`ResultCollector`](crate::ResultCollector).
///
/// Yields items until the end-of-stream sentinel, then returns `None` forever.
pub struct ProductStream {
    queue: WorkQueue<ProductItem>,
    stats: Arc<RunStats>,
    finished: bool,
}

impl ProductStream {
    pub(crate) fn new(queue: WorkQueue<ProductItem>, stats: Arc<RunStats>) -> Self {
        Self {
            queue,
            stats,
            finished: false,
        }
    }

    /// Next item, or `None` once the end-of-stream sentinel was received.
    pub async fn next(&mut self) -> Option<ProductItem> {
        if self.finished {
            return None;
        }
        match self.queue.get().await {
            Some(Message::Item(product)) => {
                self.queue.task_done();
                self.stats.record_collected(&product);
                Some(product)
            }
            Some(Message::Sentinel) => {
                self.queue.task_done();
                self.finished = true;
                None
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Drain the stream into a vector.
    pub async fn collect_all(mut self) -> Vec<ProductItem> {
        let mut products = Vec::new();
        while let Some(product) = self.next().await {
            products.push(product);
        }
        products
    }

    /// Adapt into a `futures::Stream`.
    pub fn into_stream(self) -> impl Stream<Item = ProductItem> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|product| (product, stream))
        })
    }
}
