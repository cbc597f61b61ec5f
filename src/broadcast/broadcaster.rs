//! Fan-out point between the watch feed and its consumers.
//!
//! Each subscriber owns a private bounded queue; delivery is a non-blocking
//! send, and a full queue drops the event for that subscriber only. The
//! four subscriber classes (all / add-only / update-only / delete-only)
//! keep independent lists and locks, so a slow consumer in one class
//! cannot starve another class.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

use crate::metrics::DROPPED_EVENTS_METRIC;
use crate::metrics::WATCH_EVENTS_METRIC;
use crate::Application;
use crate::ApplicationWatchEvent;
use crate::WatchEventType;

pub type EventFilter = Box<dyn Fn(&ApplicationWatchEvent) -> bool + Send + Sync>;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Arc<ApplicationWatchEvent>>,
    filters: Vec<EventFilter>,
}

impl Subscriber {
    fn matches(&self, event: &ApplicationWatchEvent) -> bool {
        self.filters.iter().all(|filter| filter(event))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriberClass {
    All,
    OnAdd,
    OnUpdate,
    OnDelete,
}

impl SubscriberClass {
    fn as_label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::OnAdd => "on_add",
            Self::OnUpdate => "on_update",
            Self::OnDelete => "on_delete",
        }
    }
}

/// Deregisters the subscription on drop. Safe to drop while delivery is in
/// flight; events already copied into the delivery pass may still arrive.
pub struct Subscription {
    lists: Weak<SubscriberLists>,
    class: SubscriberClass,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(lists) = self.lists.upgrade() {
            lists.list(self.class).lock().retain(|s| s.id != self.id);
        }
    }
}

#[derive(Default)]
struct SubscriberLists {
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    on_add_subscribers: Mutex<Vec<Arc<Subscriber>>>,
    on_update_subscribers: Mutex<Vec<Arc<Subscriber>>>,
    on_delete_subscribers: Mutex<Vec<Arc<Subscriber>>>,
}

impl SubscriberLists {
    fn list(&self, class: SubscriberClass) -> &Mutex<Vec<Arc<Subscriber>>> {
        match class {
            SubscriberClass::All => &self.subscribers,
            SubscriberClass::OnAdd => &self.on_add_subscribers,
            SubscriberClass::OnUpdate => &self.on_update_subscribers,
            SubscriberClass::OnDelete => &self.on_delete_subscribers,
        }
    }
}

#[derive(Default)]
pub struct Broadcaster {
    next_id: AtomicU64,
    lists: Arc<SubscriberLists>,
}

impl Broadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Forward every watch event to the provided queue. Events are dropped
    /// when the queue is full, so size the buffer accordingly.
    pub fn subscribe(
        &self,
        tx: mpsc::Sender<Arc<ApplicationWatchEvent>>,
        filters: Vec<EventFilter>,
    ) -> Subscription {
        self.register(SubscriberClass::All, tx, filters)
    }

    pub fn subscribe_on_add(
        &self,
        tx: mpsc::Sender<Arc<ApplicationWatchEvent>>,
        filters: Vec<EventFilter>,
    ) -> Subscription {
        self.register(SubscriberClass::OnAdd, tx, filters)
    }

    pub fn subscribe_on_update(
        &self,
        tx: mpsc::Sender<Arc<ApplicationWatchEvent>>,
        filters: Vec<EventFilter>,
    ) -> Subscription {
        self.register(SubscriberClass::OnUpdate, tx, filters)
    }

    pub fn subscribe_on_delete(
        &self,
        tx: mpsc::Sender<Arc<ApplicationWatchEvent>>,
        filters: Vec<EventFilter>,
    ) -> Subscription {
        self.register(SubscriberClass::OnDelete, tx, filters)
    }

    /// Ingestion hook for the watch layer.
    pub fn on_add(&self, application: Application) {
        WATCH_EVENTS_METRIC
            .with_label_values(&[WatchEventType::Added.as_wire()])
            .inc();
        let event = Arc::new(ApplicationWatchEvent::new(WatchEventType::Added, application));
        self.notify(SubscriberClass::All, &event);
        self.notify(SubscriberClass::OnAdd, &event);
    }

    /// Ingestion hook for the watch layer. Only the new snapshot is
    /// delivered; the previous one carries no information this pipeline
    /// uses.
    pub fn on_update(&self, _old: Option<Application>, new: Application) {
        WATCH_EVENTS_METRIC
            .with_label_values(&[WatchEventType::Modified.as_wire()])
            .inc();
        let event = Arc::new(ApplicationWatchEvent::new(WatchEventType::Modified, new));
        self.notify(SubscriberClass::All, &event);
        self.notify(SubscriberClass::OnUpdate, &event);
    }

    /// Ingestion hook for the watch layer.
    pub fn on_delete(&self, application: Application) {
        WATCH_EVENTS_METRIC
            .with_label_values(&[WatchEventType::Deleted.as_wire()])
            .inc();
        let event = Arc::new(ApplicationWatchEvent::new(
            WatchEventType::Deleted,
            application,
        ));
        self.notify(SubscriberClass::All, &event);
        self.notify(SubscriberClass::OnDelete, &event);
    }

    /// Bookmarks carry no state change; only all-events subscribers see
    /// them (and drop them downstream).
    pub fn on_bookmark(&self) {
        WATCH_EVENTS_METRIC
            .with_label_values(&[WatchEventType::Bookmark.as_wire()])
            .inc();
        let event = Arc::new(ApplicationWatchEvent::new(
            WatchEventType::Bookmark,
            Application::default(),
        ));
        self.notify(SubscriberClass::All, &event);
    }

    fn register(
        &self,
        class: SubscriberClass,
        tx: mpsc::Sender<Arc<ApplicationWatchEvent>>,
        filters: Vec<EventFilter>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber { id, tx, filters });
        self.lists.list(class).lock().push(subscriber);
        Subscription {
            lists: Arc::downgrade(&self.lists),
            class,
            id,
        }
    }

    // Copy the list under the lock, then send outside it; a slow or full
    // subscriber must not hold up registration or the other sends.
    fn notify(&self, class: SubscriberClass, event: &Arc<ApplicationWatchEvent>) {
        let subscribers: Vec<Arc<Subscriber>> = self.lists.list(class).lock().clone();

        for subscriber in subscribers {
            if !subscriber.matches(event) {
                continue;
            }
            if subscriber.tx.try_send(event.clone()).is_err() {
                // drop event if cannot send right away
                DROPPED_EVENTS_METRIC
                    .with_label_values(&[class.as_label()])
                    .inc();
                warn!(
                    application = %event.application.key(),
                    class = class.as_label(),
                    "unable to send event notification"
                );
            }
        }
    }
}
