use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use tracing::trace;

use crate::error::FormResult;
use crate::state::{ManagedState, StateManager, StateSubscription};
use crate::validators::Validity;
use crate::value::{FieldKey, FieldValue};

use super::source::{SharedSource, SourceSnapshot, StateSource};

#[derive(Clone, Debug, PartialEq)]
pub struct AdapterState {
    pub value: FieldValue,
    pub validity: Validity,
    pub exclude: bool,
}

impl ManagedState for AdapterState {
    fn changed_properties(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.value != previous.value {
            changed.push("value");
        }
        if self.validity != previous.validity {
            changed.push("validity");
        }
        if self.exclude != previous.exclude {
            changed.push("exclude");
        }
        changed
    }
}

pub enum AdaptOutput {
    Value(FieldValue),
    Excludable { value: FieldValue, exclude: bool },
}

type AdaptFn = Arc<dyn Fn(&SourceSnapshot) -> AdaptOutput + Send + Sync>;

#[derive(Clone)]
pub struct AdapterTemplate {
    pub(crate) key: FieldKey,
    pub(crate) source: FieldKey,
    pub(crate) adapt: AdaptFn,
}

impl AdapterTemplate {
    /// A plain adapter republishes the adapted value under its own name;
    /// exclusion mirrors the source, validity always does.
    pub fn new(
        key: &'static str,
        source: &'static str,
        adapt: impl Fn(&SourceSnapshot) -> FieldValue + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: FieldKey::new(key),
            source: FieldKey::new(source),
            adapt: Arc::new(move |snapshot| AdaptOutput::Value(adapt(snapshot))),
        }
    }

    /// An excludable adapter decides its own exclusion per recompute.
    pub fn excludable(
        key: &'static str,
        source: &'static str,
        adapt: impl Fn(&SourceSnapshot) -> (FieldValue, bool) + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: FieldKey::new(key),
            source: FieldKey::new(source),
            adapt: Arc::new(move |snapshot| {
                let (value, exclude) = adapt(snapshot);
                AdaptOutput::Excludable { value, exclude }
            }),
        }
    }

    pub fn key(&self) -> FieldKey {
        self.key
    }

    pub fn source(&self) -> FieldKey {
        self.source
    }

    pub(crate) fn default_for(source: FieldKey, trim: bool) -> Self {
        Self {
            key: source,
            source,
            adapt: Arc::new(move |snapshot| {
                let value = if trim {
                    snapshot.value.trimmed()
                } else {
                    snapshot.value.clone()
                };
                AdaptOutput::Value(value)
            }),
        }
    }
}

struct AdapterCore {
    key: FieldKey,
    source: SharedSource,
    adapt: AdaptFn,
    manager: StateManager<AdapterState>,
}

fn adapt_state(adapt: &AdaptFn, snapshot: &SourceSnapshot) -> AdapterState {
    match adapt(snapshot) {
        AdaptOutput::Value(value) => AdapterState {
            value,
            validity: snapshot.validity,
            exclude: snapshot.exclude,
        },
        AdaptOutput::Excludable { value, exclude } => AdapterState {
            value,
            validity: snapshot.validity,
            exclude,
        },
    }
}

impl AdapterCore {
    fn recompute(&self, snapshot: &SourceSnapshot) -> FormResult<()> {
        let next = adapt_state(&self.adapt, snapshot);
        trace!(adapter = %self.key, validity = ?next.validity, exclude = next.exclude, "adapter recomputed");
        self.manager.set_state(next)
    }
}

/// Translates one source's state into the value the form output carries
/// under this adapter's name. Validity is never altered, only mirrored.
#[derive(Clone)]
pub struct Adapter {
    core: Arc<AdapterCore>,
    _subscription: Arc<StateSubscription>,
}

impl Adapter {
    pub(crate) fn connect(template: &AdapterTemplate, source: SharedSource) -> FormResult<Self> {
        let initial = adapt_state(&template.adapt, &source.source_snapshot()?);
        let core = Arc::new(AdapterCore {
            key: template.key,
            source,
            adapt: template.adapt.clone(),
            manager: StateManager::new(initial),
        });

        let weak: Weak<AdapterCore> = Arc::downgrade(&core);
        let subscription = core.source.observe(Arc::new(move |snapshot: &SourceSnapshot| {
            let Some(core) = weak.upgrade() else {
                return;
            };
            drop(core.recompute(snapshot));
        }))?;
        Ok(Self {
            core,
            _subscription: Arc::new(subscription),
        })
    }

    pub fn key(&self) -> FieldKey {
        self.core.key
    }

    pub fn source_key(&self) -> FieldKey {
        self.core.source.source_key()
    }

    pub fn state(&self) -> FormResult<AdapterState> {
        self.core.manager.state()
    }

    pub fn did_property_change(&self, property: &'static str) -> FormResult<bool> {
        self.core.manager.did_property_change(property)
    }

    pub fn subscribe_to_state(
        &self,
        callback: impl Fn(&AdapterState) + Send + Sync + 'static,
    ) -> FormResult<StateSubscription> {
        self.core.manager.subscribe_to_state(callback)
    }
}

/// Which non-transient fields get their stored text trimmed by their
/// default adapter. `None` trims nothing, `All` every text field,
/// the list forms allow or deny by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AutoTrim {
    #[default]
    None,
    All,
    Include(BTreeSet<FieldKey>),
    Exclude(BTreeSet<FieldKey>),
}

impl AutoTrim {
    pub fn include(keys: impl IntoIterator<Item = &'static str>) -> Self {
        AutoTrim::Include(keys.into_iter().map(FieldKey::new).collect())
    }

    pub fn exclude(keys: impl IntoIterator<Item = &'static str>) -> Self {
        AutoTrim::Exclude(keys.into_iter().map(FieldKey::new).collect())
    }

    pub(crate) fn applies_to(&self, key: FieldKey) -> bool {
        match self {
            AutoTrim::None => false,
            AutoTrim::All => true,
            AutoTrim::Include(keys) => keys.contains(&key),
            AutoTrim::Exclude(keys) => !keys.contains(&key),
        }
    }
}
