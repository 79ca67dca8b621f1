//! In-process stand-in for the text fields a binding is attached to.
//!
//! The host owns field values, a FIFO task queue and the listener table.
//! Everything runs on whichever thread calls [`Host::run_until_idle`]; listeners
//! run to completion one after another, and a task queued with
//! [`Host::defer`] runs only after every task that was already queued.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(usize);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HostError {
    #[error("unknown field {0}")]
    UnknownField(FieldId),
    #[error("field {0} cannot be both source and sink")]
    SameField(FieldId),
}

/// Notification emitted by a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEventKind {
    CompositionStart,
    /// In-progress buffer of the IME.
    CompositionUpdate { data: String },
    /// Segment finalized. `data` is the text the IME inserted.
    CompositionEnd { data: String },
    /// Value changed by the user (not by [`Host::set_value`]).
    Input { value: String },
    KeyUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEvent {
    pub target: FieldId,
    pub kind: FieldEventKind,
}

impl FieldEvent {
    pub fn new(target: FieldId, kind: FieldEventKind) -> Self {
        Self { target, kind }
    }
}

pub type Listener = Arc<dyn Fn(&Host, &FieldEvent) + Send + Sync>;

type DeferredTask = Box<dyn FnOnce(&Host) + Send>;

enum Task {
    Dispatch(FieldEvent),
    Deferred(DeferredTask),
}

struct ListenerEntry {
    id: u64,
    target: FieldId,
    active: Arc<AtomicBool>,
    callback: Listener,
}

struct HostInner {
    fields: Mutex<HashMap<FieldId, String>>,
    next_field: AtomicUsize,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_subscription: AtomicU64,
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl HostInner {
    /// Moves matching entries out of the table. Callers drop them after the
    /// lock is released: a listener may own a `Subscription`, whose drop locks
    /// the table again.
    fn take_listeners(&self, pred: impl Fn(&ListenerEntry) -> bool) -> Vec<ListenerEntry> {
        let mut listeners = self.listeners.lock();
        let (taken, kept): (Vec<_>, Vec<_>) = listeners.drain(..).partition(|l| pred(l));
        *listeners = kept;
        taken
    }
}

#[derive(Clone)]
pub struct Host {
    inner: Arc<HostInner>,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            inner: Arc::new(HostInner {
                fields: Mutex::new(HashMap::new()),
                next_field: AtomicUsize::new(0),
                listeners: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                tx,
                rx,
            }),
        }
    }

    /// Ids are never reused, so a removed field's id stays unknown.
    pub fn add_field(&self, initial: impl Into<String>) -> FieldId {
        let id = FieldId(self.inner.next_field.fetch_add(1, Ordering::Relaxed));
        self.inner.fields.lock().insert(id, initial.into());
        id
    }

    /// Drops the field and detaches every listener still attached to it.
    /// Returns the last value.
    pub fn remove_field(&self, id: FieldId) -> Result<String, HostError> {
        let value = self
            .inner
            .fields
            .lock()
            .remove(&id)
            .ok_or(HostError::UnknownField(id))?;

        let detached = self.inner.take_listeners(|l| l.target == id);
        for entry in &detached {
            entry.active.store(false, Ordering::Release);
        }
        trace!("Field {} removed, {} listener(s) detached", id, detached.len());
        // Listener closures are dropped here, after the table lock is gone.
        drop(detached);
        Ok(value)
    }

    pub fn has_field(&self, id: FieldId) -> bool {
        self.inner.fields.lock().contains_key(&id)
    }

    pub fn field_count(&self) -> usize {
        self.inner.fields.lock().len()
    }

    pub fn value(&self, id: FieldId) -> Result<String, HostError> {
        self.inner
            .fields
            .lock()
            .get(&id)
            .cloned()
            .ok_or(HostError::UnknownField(id))
    }

    /// Programmatic write. No event is emitted.
    pub fn set_value(&self, id: FieldId, value: impl Into<String>) -> Result<(), HostError> {
        let mut fields = self.inner.fields.lock();
        let slot = fields.get_mut(&id).ok_or(HostError::UnknownField(id))?;
        *slot = value.into();
        Ok(())
    }

    /// User edit: writes the value and queues the matching `Input` event.
    pub fn edit(&self, id: FieldId, value: impl Into<String>) -> Result<(), HostError> {
        let value = value.into();
        self.set_value(id, value.clone())?;
        self.post(FieldEvent::new(id, FieldEventKind::Input { value }));
        Ok(())
    }

    pub fn post(&self, event: FieldEvent) {
        // The host keeps its own receiver, so the channel cannot disconnect.
        let _ = self.inner.tx.send(Task::Dispatch(event));
    }

    /// Queues `task` behind everything already queued, including events posted
    /// by listeners of the event being dispatched right now.
    pub fn defer(&self, task: impl FnOnce(&Host) + Send + 'static) {
        let _ = self.inner.tx.send(Task::Deferred(Box::new(task)));
    }

    pub fn subscribe(
        &self,
        target: FieldId,
        listener: impl Fn(&Host, &FieldEvent) + Send + Sync + 'static,
    ) -> Result<Subscription, HostError> {
        if !self.has_field(target) {
            return Err(HostError::UnknownField(target));
        }

        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner.listeners.lock().push(ListenerEntry {
            id,
            target,
            active: active.clone(),
            callback: Arc::new(listener),
        });
        trace!("Subscription {} attached to field {}", id, target);

        Ok(Subscription {
            id,
            active,
            host: Arc::downgrade(&self.inner),
        })
    }

    pub fn listener_count(&self, target: FieldId) -> usize {
        self.inner
            .listeners
            .lock()
            .iter()
            .filter(|l| l.target == target)
            .count()
    }

    /// Number of queued tasks.
    pub fn queued(&self) -> usize {
        self.inner.rx.len()
    }

    /// Runs one queued task. Returns false when the queue was empty.
    pub fn run_once(&self) -> bool {
        match self.inner.rx.try_recv() {
            Ok(Task::Dispatch(event)) => {
                self.dispatch(&event);
                true
            }
            Ok(Task::Deferred(task)) => {
                task(self);
                true
            }
            Err(_) => false,
        }
    }

    /// Drains the queue, including tasks queued while draining.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_once() {
            ran += 1;
        }
        ran
    }

    fn dispatch(&self, event: &FieldEvent) {
        // Snapshot so listeners can subscribe, release or post without
        // deadlocking on the table.
        let targets: Vec<(Arc<AtomicBool>, Listener)> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|l| l.target == event.target)
            .map(|l| (l.active.clone(), l.callback.clone()))
            .collect();

        if targets.is_empty() {
            trace!("No listener for {:?} on field {}", event.kind, event.target);
            return;
        }

        for (active, callback) in targets {
            // Released by an earlier listener of this same event
            if !active.load(Ordering::Acquire) {
                continue;
            }
            callback(self, event);
        }
    }
}

/// Scoped listener registration. Dropping it detaches the listener.
#[must_use = "dropping a Subscription detaches its listener immediately"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    host: Weak<HostInner>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn release(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        match self.host.upgrade() {
            Some(inner) => {
                let removed = inner.take_listeners(|l| l.id == self.id);
                trace!("Subscription {} released", self.id);
                drop(removed);
            }
            None => warn!("Subscription {} outlived its host", self.id),
        }
    }
}
