use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{FormResult, read_lock, write_lock};

static SUBSCRIPTION_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    pub fn next() -> Self {
        Self(SUBSCRIPTION_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

/// A state snapshot managed by [`StateManager`]. `changed_properties`
/// compares two snapshots property by property with value equality, so
/// subscribers can ask which slice of the snapshot actually moved.
pub trait ManagedState: Clone + Send + Sync + 'static {
    fn changed_properties(&self, previous: &Self) -> Vec<&'static str>;
}

type StateCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscriber<T> {
    id: SubscriptionId,
    callback: StateCallback<T>,
}

struct Snapshot<T> {
    current: T,
    changed: BTreeSet<&'static str>,
}

struct ManagerInner<T> {
    snapshot: RwLock<Snapshot<T>>,
    subscribers: RwLock<Vec<Subscriber<T>>>,
}

/// One immutable value plus a synchronous subscription channel. Every
/// `set_state` installs a new snapshot and notifies all current
/// subscribers once, in registration order, before returning. There is
/// no buffering and no batching.
#[derive(Clone)]
pub struct StateManager<T>
where
    T: ManagedState,
{
    inner: Arc<ManagerInner<T>>,
}

impl<T> StateManager<T>
where
    T: ManagedState,
{
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                snapshot: RwLock::new(Snapshot {
                    current: initial,
                    changed: BTreeSet::new(),
                }),
                subscribers: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn state(&self) -> FormResult<T> {
        Ok(read_lock(&self.inner.snapshot, "reading state snapshot")?
            .current
            .clone())
    }

    pub fn did_property_change(&self, property: &'static str) -> FormResult<bool> {
        Ok(read_lock(&self.inner.snapshot, "reading changed properties")?
            .changed
            .contains(property))
    }

    pub fn set_state(&self, next: T) -> FormResult<()> {
        let emitted = {
            let mut snapshot = write_lock(&self.inner.snapshot, "installing state snapshot")?;
            snapshot.changed = next
                .changed_properties(&snapshot.current)
                .into_iter()
                .collect();
            snapshot.current = next.clone();
            next
        };
        self.emit(&emitted)
    }

    /// Subscribing does not invoke the callback with the current state;
    /// read `.state()` for that. The returned handle stays registered
    /// until `unsubscribe` is called, dropping it changes nothing.
    pub fn subscribe_to_state(
        &self,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> FormResult<StateSubscription> {
        let id = SubscriptionId::next();
        {
            let mut subscribers =
                write_lock(&self.inner.subscribers, "registering state subscriber")?;
            subscribers.push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
        }
        let weak = Arc::downgrade(&self.inner);
        Ok(StateSubscription {
            id,
            detach: Box::new(move |id| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if let Ok(mut subscribers) = inner.subscribers.write() {
                    subscribers.retain(|subscriber| subscriber.id != id);
                }
            }),
        })
    }

    // Callbacks run with no lock held, so a subscriber may mutate other
    // parts of the graph or unsubscribe anything, itself included.
    // Liveness is re-checked per callback against the live list.
    fn emit(&self, state: &T) -> FormResult<()> {
        let pending = {
            let subscribers = read_lock(&self.inner.subscribers, "snapshotting subscribers")?;
            subscribers
                .iter()
                .map(|subscriber| (subscriber.id, subscriber.callback.clone()))
                .collect::<Vec<_>>()
        };
        for (id, callback) in pending {
            let live = {
                read_lock(&self.inner.subscribers, "checking subscriber liveness")?
                    .iter()
                    .any(|subscriber| subscriber.id == id)
            };
            if live {
                callback(state);
            }
        }
        Ok(())
    }
}

pub struct StateSubscription {
    id: SubscriptionId,
    detach: Box<dyn FnOnce(SubscriptionId) + Send + Sync>,
}

impl StateSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(self) {
        let Self { id, detach } = self;
        detach(id);
    }
}
