use std::sync::{Arc, RwLock, Weak};

use crate::error::{FormResult, write_lock};
use crate::state::{ManagedState, StateManager, StateSubscription};
use crate::value::{FieldKey, FieldValue};

use super::source::{SharedSource, SourceSnapshot, StateSource};

impl ManagedState for FieldValue {
    fn changed_properties(&self, previous: &Self) -> Vec<&'static str> {
        if self != previous {
            vec!["value"]
        } else {
            Vec::new()
        }
    }
}

type DeriveFn = Arc<dyn Fn(&[SourceSnapshot]) -> FieldValue + Send + Sync>;

#[derive(Clone)]
pub struct DerivedValueTemplate {
    pub(crate) key: FieldKey,
    pub(crate) sources: Vec<FieldKey>,
    pub(crate) derive: DeriveFn,
}

impl DerivedValueTemplate {
    pub fn new(
        key: &'static str,
        sources: impl IntoIterator<Item = &'static str>,
        derive: impl Fn(&[SourceSnapshot]) -> FieldValue + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: FieldKey::new(key),
            sources: sources.into_iter().map(FieldKey::new).collect(),
            derive: Arc::new(derive),
        }
    }

    pub fn key(&self) -> FieldKey {
        self.key
    }
}

struct DerivedCore {
    key: FieldKey,
    sources: Vec<SharedSource>,
    derive: DeriveFn,
    manager: StateManager<FieldValue>,
}

fn derive_value(sources: &[SharedSource], derive: &DeriveFn) -> FormResult<FieldValue> {
    let mut snapshots = Vec::with_capacity(sources.len());
    for source in sources {
        snapshots.push(source.source_snapshot()?);
    }
    Ok(derive(&snapshots))
}

impl DerivedCore {
    fn recompute(&self) -> FormResult<()> {
        let next = derive_value(&self.sources, &self.derive)?;
        self.manager.set_state(next)
    }
}

/// A plain value computed over several sources for the UI's benefit.
/// Carries no validity and never touches the form value pipeline.
#[derive(Clone)]
pub struct DerivedValue {
    core: Arc<DerivedCore>,
    _subscriptions: Arc<RwLock<Vec<StateSubscription>>>,
}

impl DerivedValue {
    pub(crate) fn connect(
        template: &DerivedValueTemplate,
        sources: Vec<SharedSource>,
    ) -> FormResult<Self> {
        let initial = derive_value(&sources, &template.derive)?;
        let core = Arc::new(DerivedCore {
            key: template.key,
            sources,
            derive: template.derive.clone(),
            manager: StateManager::new(initial),
        });

        let subscriptions = Arc::new(RwLock::new(Vec::new()));
        for source in &core.sources {
            let weak: Weak<DerivedCore> = Arc::downgrade(&core);
            let subscription = source.observe(Arc::new(move |_snapshot: &SourceSnapshot| {
                let Some(core) = weak.upgrade() else {
                    return;
                };
                drop(core.recompute());
            }))?;
            write_lock(&subscriptions, "registering derived value subscription")?
                .push(subscription);
        }
        Ok(Self {
            core,
            _subscriptions: subscriptions,
        })
    }

    pub fn key(&self) -> FieldKey {
        self.core.key
    }

    pub fn value(&self) -> FormResult<FieldValue> {
        self.core.manager.state()
    }

    pub fn subscribe_to_state(
        &self,
        callback: impl Fn(&FieldValue) + Send + Sync + 'static,
    ) -> FormResult<StateSubscription> {
        self.core.manager.subscribe_to_state(callback)
    }
}
