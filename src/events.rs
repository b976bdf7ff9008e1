//! In-process event bus connecting the session, the local repository
//! watcher, and the pull request workflow.
//!
//! The bus is an ordinary value: it is created by the composition root,
//! shared through `Arc`, and torn down with [`EventBus::clear`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::trace;

use crate::bitbucket::credentials::ConnectionState;

/// Notifications published on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The session logged in or out.
    ConnectionChanged(ConnectionState),
    /// The user switched to another local repository.
    ActiveRepositoryChanged {
        /// Working directory of the new repository, if any.
        workdir: Option<PathBuf>,
    },
}

impl Event {
    /// Kind used for subscription filtering.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ConnectionChanged(_) => EventKind::ConnectionChanged,
            Self::ActiveRepositoryChanged { .. } => EventKind::ActiveRepositoryChanged,
        }
    }
}

/// Event kinds a subscriber can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::ConnectionChanged`].
    ConnectionChanged,
    /// [`Event::ActiveRepositoryChanged`].
    ActiveRepositoryChanged,
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: HashMap<SubscriptionId, (EventKind, Handler)>,
}

impl Subscribers {
    fn reserve_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}

fn lock(subscribers: &Mutex<Subscribers>) -> MutexGuard<'_, Subscribers> {
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Synchronous publish/subscribe bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        lock(&self.subscribers)
    }

    /// Delivers `event` to every handler subscribed to its kind.
    ///
    /// Handlers run outside the lock, so they may subscribe or publish.
    pub fn publish(&self, event: &Event) {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .lock()
            .handlers
            .values()
            .filter(|(subscribed, _)| *subscribed == kind)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        trace!(?kind, subscribers = handlers.len(), "publishing event");
        for handler in handlers {
            handler(event);
        }
    }

    /// Registers a handler for one event kind.
    #[must_use = "the id is needed to unsubscribe"]
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut subscribers = self.lock();
        let id = subscribers.reserve_id();
        subscribers.handlers.insert(id, (kind, Arc::new(handler)));
        id
    }

    /// Forwards events of one kind into an unbounded channel.
    ///
    /// The subscription removes itself on the first event published after
    /// the receiver is dropped.
    #[must_use]
    pub fn subscribe_channel(&self, kind: EventKind) -> (SubscriptionId, UnboundedReceiver<Event>) {
        let (sender, receiver) = unbounded_channel();
        let registry: Weak<Mutex<Subscribers>> = Arc::downgrade(&self.subscribers);
        let mut subscribers = self.lock();
        let id = subscribers.reserve_id();
        let handler: Handler = Arc::new(move |event: &Event| {
            if sender.send(event.clone()).is_ok() {
                return;
            }
            trace!(?id, "event receiver dropped; unsubscribing");
            if let Some(live) = registry.upgrade() {
                lock(&live).handlers.remove(&id);
            }
        });
        subscribers.handlers.insert(id, (kind, handler));
        (id, receiver)
    }

    /// Removes a subscription. Returns false when it was already gone.
    #[must_use = "false means the subscription was already removed"]
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().handlers.remove(&id).is_some()
    }

    /// Removes every subscription.
    pub fn clear(&self) {
        self.lock().handlers.clear();
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().handlers.len()
    }
}
