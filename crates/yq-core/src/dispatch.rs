//! Task queue between spawned network/timer work and the page loop.
//!
//! Handlers never mutate their state from a spawned task. Network calls and
//! timers run on the tokio runtime and post a [`Task`] back to the page,
//! which applies it on its next tick.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use yq_client::{ClientError, Transport};
use yq_types::{RecommendResponse, RequestVariant, SearchResponse, Story, Tags};

/// Completion posted back to the page loop.
#[derive(Debug)]
pub(crate) enum Task {
    RecommendDone {
        index: usize,
        tags: Tags,
        result: Result<RecommendResponse, ClientError>,
    },
    SearchDone {
        index: usize,
        tags: Tags,
        result: Result<SearchResponse, ClientError>,
    },
    SearchRetry {
        index: usize,
        tags: Tags,
    },
    SessionId {
        index: usize,
        result: Result<String, ClientError>,
    },
    ScrollReady {
        index: usize,
    },
    RiverReady {
        index: usize,
    },
    StoryFetched {
        index: usize,
        story: Story,
        result: Result<String, ClientError>,
    },
    IdentityRetry {
        retries: u32,
    },
    /// Fire-and-forget work finished.
    Detached,
}

/// Handle handlers use to reach the transport and the page queue.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    tx: UnboundedSender<Task>,
    sent_first: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sent_first", &self.sent_first.load(Ordering::SeqCst))
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub(crate) fn new(transport: Arc<dyn Transport>, tx: UnboundedSender<Task>) -> Self {
        Self {
            transport,
            tx,
            sent_first: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Full variant for the first recommend request of the page, lite afterwards.
    pub(crate) fn next_variant(&self) -> RequestVariant {
        if self.sent_first.swap(true, Ordering::SeqCst) {
            RequestVariant::Lite
        } else {
            RequestVariant::Full
        }
    }

    /// Run `work` on the runtime and post its task to the page.
    pub(crate) fn spawn<F>(&self, work: F)
    where
        F: Future<Output = Task> + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let task = work.await;
            let _ = tx.send(task);
        });
    }

    /// Post `task` after `delay`.
    pub(crate) fn schedule(&self, delay: Duration, task: Task) {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            task
        });
    }

    /// Run work whose result the page does not need.
    pub(crate) fn detach<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            work.await;
            Task::Detached
        });
    }

    /// Called by the page for every task it receives.
    pub(crate) fn complete(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Spawned work whose task has not been applied yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
