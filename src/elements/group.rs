use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

use tracing::trace;

use crate::error::{FormResult, write_lock};
use crate::state::{ManagedState, StateManager, StateSubscription};
use crate::validators::{Message, Validity, ValiditySource, ValidatorSuite};
use crate::value::{FieldKey, FieldValue};

use super::source::{SharedSource, SourceObserver, SourceSnapshot, StateSource};

#[derive(Clone, Debug, PartialEq)]
pub struct GroupState {
    pub value: BTreeMap<FieldKey, FieldValue>,
    pub validity: Validity,
    pub validity_source: ValiditySource,
    pub messages: Vec<Message>,
}

impl ManagedState for GroupState {
    fn changed_properties(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.value != previous.value {
            changed.push("value");
        }
        if self.validity != previous.validity {
            changed.push("validity");
        }
        if self.validity_source != previous.validity_source {
            changed.push("validity_source");
        }
        if self.messages != previous.messages {
            changed.push("messages");
        }
        changed
    }
}

#[derive(Clone)]
pub struct GroupTemplate {
    pub(crate) key: FieldKey,
    pub(crate) members: Vec<FieldKey>,
    pub(crate) validators: ValidatorSuite,
}

impl GroupTemplate {
    pub fn new(key: &'static str, members: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            key: FieldKey::new(key),
            members: members.into_iter().map(FieldKey::new).collect(),
            validators: ValidatorSuite::new(),
        }
    }

    pub fn key(&self) -> FieldKey {
        self.key
    }

    /// Cross-member validators run against the composite map value, and
    /// only once every non-excluded member is itself Valid.
    pub fn validator(mut self, validator: crate::validators::Validator) -> Self {
        self.validators = self.validators.with(validator);
        self
    }
}

struct GroupCore {
    key: FieldKey,
    members: Vec<SharedSource>,
    validators: ValidatorSuite,
    manager: StateManager<GroupState>,
}

// Always from scratch: member exclusion and validity are re-read on
// every pass, never diffed against the previous composite.
fn derive_group_state(
    members: &[SharedSource],
    validators: &ValidatorSuite,
) -> FormResult<GroupState> {
    let mut value = BTreeMap::new();
    let mut validity = Validity::Valid;
    for member in members {
        let snapshot = member.source_snapshot()?;
        if snapshot.exclude {
            continue;
        }
        validity = validity.merge(snapshot.validity);
        value.insert(snapshot.key, snapshot.value);
    }
    if validity == Validity::Valid {
        let outcome = validators.run(&FieldValue::Map(value.clone()));
        return Ok(GroupState {
            value,
            validity: outcome.validity,
            validity_source: ValiditySource::Validation,
            messages: outcome.messages,
        });
    }
    Ok(GroupState {
        value,
        validity,
        validity_source: ValiditySource::Reduction,
        messages: Vec::new(),
    })
}

impl GroupCore {
    fn recompute(&self) -> FormResult<()> {
        let next = derive_group_state(&self.members, &self.validators)?;
        trace!(group = %self.key, validity = ?next.validity, source = ?next.validity_source, "group recomputed");
        self.manager.set_state(next)
    }
}

/// Composes a fixed member set into one composite value and one
/// aggregate validity, layering its own validators on top once every
/// member is individually valid.
#[derive(Clone)]
pub struct Group {
    core: Arc<GroupCore>,
    _subscriptions: Arc<RwLock<Vec<StateSubscription>>>,
}

impl Group {
    pub(crate) fn connect(template: &GroupTemplate, members: Vec<SharedSource>) -> FormResult<Self> {
        let initial = derive_group_state(&members, &template.validators)?;
        let core = Arc::new(GroupCore {
            key: template.key,
            members,
            validators: template.validators.clone(),
            manager: StateManager::new(initial),
        });

        let subscriptions = Arc::new(RwLock::new(Vec::new()));
        for member in &core.members {
            let weak: Weak<GroupCore> = Arc::downgrade(&core);
            let subscription = member.observe(Arc::new(move |_snapshot: &SourceSnapshot| {
                let Some(core) = weak.upgrade() else {
                    return;
                };
                drop(core.recompute());
            }))?;
            write_lock(&subscriptions, "registering group member subscription")?
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

    pub fn state(&self) -> FormResult<GroupState> {
        self.core.manager.state()
    }

    pub fn did_property_change(&self, property: &'static str) -> FormResult<bool> {
        self.core.manager.did_property_change(property)
    }

    pub fn subscribe_to_state(
        &self,
        callback: impl Fn(&GroupState) + Send + Sync + 'static,
    ) -> FormResult<StateSubscription> {
        self.core.manager.subscribe_to_state(callback)
    }
}

impl StateSource for Group {
    fn source_key(&self) -> FieldKey {
        self.core.key
    }

    fn source_snapshot(&self) -> FormResult<SourceSnapshot> {
        let state = self.core.manager.state()?;
        Ok(SourceSnapshot {
            key: self.core.key,
            value: FieldValue::Map(state.value),
            validity: state.validity,
            exclude: false,
        })
    }

    fn observe(&self, observer: SourceObserver) -> FormResult<StateSubscription> {
        let key = self.core.key;
        self.core.manager.subscribe_to_state(move |state| {
            observer(&SourceSnapshot {
                key,
                value: FieldValue::Map(state.value.clone()),
                validity: state.validity,
                exclude: false,
            })
        })
    }
}
