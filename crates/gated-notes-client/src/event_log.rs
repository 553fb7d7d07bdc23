//! Event-log transport seam.
//!
//! Subscriptions are explicit objects: a [`Subscription`] is a lazy
//! [`Stream`] of matching events that stops for good once cancelled or
//! dropped. Events may arrive in any order and more than once, so consumers
//! should merge them into an [`EventSet`](crate::EventSet).

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::Stream;
use gated_notes::{Event, TAG_GATE};
use tokio::sync::mpsc;

use crate::error::WorkflowError;

/// Which events a fetch or subscription wants. Empty lists match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub ids: Vec<String>,
    pub kinds: Vec<u32>,
    pub authors: Vec<String>,
    /// Values of the `g` tag.
    pub gates: Vec<String>,
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn kind(mut self, kind: u32) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn author(mut self, pubkey: impl Into<String>) -> Self {
        self.authors.push(pubkey.into());
        self
    }

    pub fn gate(mut self, gated_note_id: impl Into<String>) -> Self {
        self.gates.push(gated_note_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        (self.ids.is_empty() || self.ids.contains(&event.id))
            && (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && (self.authors.is_empty() || self.authors.contains(&event.pubkey))
            && (self.gates.is_empty()
                || event
                    .tag_value(TAG_GATE)
                    .is_some_and(|g| self.gates.iter().any(|want| want == g)))
    }
}

/// Publish/subscribe access to the event log.
///
/// Signature checks belong to the implementation; events handed out here
/// are treated as verified.
pub trait EventLog: Send + Sync {
    fn publish(&self, event: &Event) -> impl Future<Output = Result<(), WorkflowError>> + Send;

    /// Stored events matching `filter`, newest first.
    fn fetch(&self, filter: &Filter)
        -> impl Future<Output = Result<Vec<Event>, WorkflowError>> + Send;

    /// Stored matches followed by live ones. Call again with the same filter
    /// to restart from the beginning.
    fn subscribe(&self, filter: Filter) -> Subscription;
}

type Canceller = Box<dyn FnOnce() + Send>;

/// Handle on a live subscription.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Event>,
    cancel: Option<Canceller>,
}

impl Subscription {
    /// `cancel` runs once, on [`Subscription::cancel`] or drop, and must
    /// detach the sender from its source.
    pub fn new(rx: mpsc::UnboundedReceiver<Event>, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            rx,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Next event, or `None` once cancelled or the source is gone.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Stop delivery. Events queued but not yet taken are discarded.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

struct Subscriber {
    id: u64,
    filter: Filter,
    tx: mpsc::UnboundedSender<Event>,
}

#[derive(Default)]
struct LogState {
    events: Vec<Event>,
    seen: HashSet<String>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

/// In-process event log for tests and local runs.
///
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct MemoryEventLog {
    state: Arc<Mutex<LogState>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Store `event` and fan it out. Returns false for an id already stored.
    pub fn insert(&self, event: Event) -> bool {
        let mut state = self.lock();
        if !state.seen.insert(event.id.clone()) {
            return false;
        }
        state
            .subscribers
            .retain(|sub| !sub.filter.matches(&event) || sub.tx.send(event.clone()).is_ok());
        state.events.push(event);
        true
    }

    fn matching(state: &LogState, filter: &Filter) -> Vec<Event> {
        let mut found: Vec<Event> = state
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            found.truncate(limit);
        }
        found
    }
}

impl EventLog for MemoryEventLog {
    async fn publish(&self, event: &Event) -> Result<(), WorkflowError> {
        if !event.is_well_formed() {
            return Err(WorkflowError::EventLog(format!(
                "refusing malformed event {}",
                event.id
            )));
        }
        if self.insert(event.clone()) {
            tracing::debug!(event_id = %event.id, kind = event.kind, "published event");
        }
        Ok(())
    }

    async fn fetch(&self, filter: &Filter) -> Result<Vec<Event>, WorkflowError> {
        Ok(Self::matching(&self.lock(), filter))
    }

    fn subscribe(&self, filter: Filter) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.lock();
            for event in Self::matching(&state, &filter).into_iter().rev() {
                let _ = tx.send(event);
            }
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.push(Subscriber { id, filter, tx });
            id
        };

        let log = self.clone();
        Subscription::new(rx, move || {
            log.lock().subscribers.retain(|sub| sub.id != id);
        })
    }
}
