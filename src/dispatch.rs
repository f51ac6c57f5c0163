//! Completion dispatch.
//!
//! Stream messages, stall reports and download progress are produced on worker
//! tasks. They reach the caller through a [`CompletionSink`], which decides on
//! which execution context the callbacks run. Jobs posted to one sink are run in
//! the order they were posted.
//!
//! # Types
//!
//! - **InlineSink**: runs each job immediately on the producing task (default)
//! - **ChannelSink** / **OwnerQueue**: forwards jobs to a queue drained by the
//!   owner, e.g. a UI loop or a dedicated task
//!
//! # Examples
//!
//! ```
//! use apiclient_http::dispatch::{channel_sink, CompletionSink};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let (sink, mut queue) = channel_sink();
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! let c = counter.clone();
//! sink.post(Box::new(move || {
//!     c.fetch_add(1, Ordering::SeqCst);
//! }));
//!
//! // Nothing runs until the owner drains its queue.
//! assert_eq!(counter.load(Ordering::SeqCst), 0);
//! assert_eq!(queue.run_pending(), 1);
//! assert_eq!(counter.load(Ordering::SeqCst), 1);
//! ```

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A callback marshalled onto the caller's execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Marshals callbacks onto a designated execution context.
pub trait CompletionSink: Send + Sync {
    /// Schedule `job`. Jobs from one producer must run in posting order.
    fn post(&self, job: Job);
}

/// Runs every job immediately on the posting task.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSink;

impl CompletionSink for InlineSink {
    fn post(&self, job: Job) {
        job();
    }
}

/// Sending half of an owner-drained queue.
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Job>,
}

impl CompletionSink for ChannelSink {
    fn post(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::debug!("completion queue closed; dropping callback");
        }
    }
}

/// Receiving half of an owner-drained queue.
///
/// Jobs are executed by whoever holds the queue, on that holder's context.
/// The queue also implements [`Stream`], yielding jobs for the owner to run.
pub struct OwnerQueue {
    receiver: mpsc::UnboundedReceiver<Job>,
}

impl OwnerQueue {
    /// Run every job that is already queued. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it.
    ///
    /// Returns `false` once every sink has been dropped and the queue is empty.
    pub async fn run_next(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until every sink has been dropped.
    pub async fn run_until_closed(&mut self) {
        while self.run_next().await {}
    }
}

impl Stream for OwnerQueue {
    type Item = Job;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Create a connected sink and owner queue.
pub fn channel_sink() -> (ChannelSink, OwnerQueue) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ChannelSink { sender }, OwnerQueue { receiver })
}
