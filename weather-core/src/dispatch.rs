//! One background task per user action, with superseded results discarded.
//!
//! Each [`ActionKind`] has at most one live task. Launching a new action of
//! a kind aborts the previous task and bumps the generation; updates that
//! still arrive for an old generation are dropped by [`Dispatcher::next_update`].

use std::{collections::HashMap, future::Future};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Current,
    Forecast,
    Alerts,
    Search,
    Status,
}

#[derive(Debug)]
pub struct Update<T> {
    pub kind: ActionKind,
    pub generation: u64,
    pub payload: T,
}

#[derive(Debug)]
pub struct Dispatcher<T> {
    tx: mpsc::UnboundedSender<Update<T>>,
    rx: mpsc::UnboundedReceiver<Update<T>>,
    running: HashMap<ActionKind, (u64, JoinHandle<()>)>,
    next_generation: u64,
}

impl<T: Send + 'static> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Dispatcher<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            running: HashMap::new(),
            next_generation: 1,
        }
    }

    /// Spawn `work` as the current action of `kind`, aborting any earlier one.
    /// Must be called from within a tokio runtime.
    pub fn launch<F>(&mut self, kind: ActionKind, work: F) -> u64
    where
        F: Future<Output = T> + Send + 'static,
    {
        let generation = self.next_generation;
        self.next_generation += 1;

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let payload = work.await;
            // The receiver lives as long as the dispatcher.
            let _ = tx.send(Update {
                kind,
                generation,
                payload,
            });
        });

        if let Some((old, previous)) = self.running.insert(kind, (generation, handle)) {
            if !previous.is_finished() {
                debug!(?kind, superseded = old, generation, "aborting superseded action");
            }
            previous.abort();
        }

        generation
    }

    /// Whether `update` belongs to the latest launch of its kind.
    pub fn is_current(&self, update: &Update<T>) -> bool {
        self.running
            .get(&update.kind)
            .is_some_and(|(generation, _)| *generation == update.generation)
    }

    /// Next update from a non-superseded action.
    pub async fn next_update(&mut self) -> Option<Update<T>> {
        loop {
            let update = self.rx.recv().await?;
            if self.is_current(&update) {
                return Some(update);
            }
            debug!(kind = ?update.kind, generation = update.generation, "discarding stale result");
        }
    }

    /// Actions whose task has not finished yet.
    pub fn in_flight(&self) -> usize {
        self.running.values().filter(|(_, handle)| !handle.is_finished()).count()
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.running.drain() {
            handle.abort();
        }
    }
}

impl<T> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        for (_, handle) in self.running.values() {
            handle.abort();
        }
    }
}
