use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::elements::{Adapter, AdapterState, Field, FieldState, Group, GroupState};
use crate::error::{FormResult, read_lock, write_lock};
use crate::state::{ManagedState, StateManager, StateSubscription};
use crate::validators::Validity;
use crate::value::{FieldKey, FieldValue};

/// The keyed map of included adapter values. An excluded adapter is
/// absent from the map, never present with a placeholder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueReducer {
    entries: BTreeMap<FieldKey, FieldValue>,
}

impl ValueReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_member_update(&mut self, key: FieldKey, state: &AdapterState) {
        if state.exclude {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, state.value.clone());
        }
    }

    pub fn value(&self) -> BTreeMap<FieldKey, FieldValue> {
        self.entries.clone()
    }
}

/// Tracks one validity per named member, O(1) per update; the aggregate
/// is reduced from the map on read with Invalid > Pending > Valid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidityReducer {
    entries: BTreeMap<FieldKey, Validity>,
}

impl ValidityReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_member_update(&mut self, key: FieldKey, validity: Validity, exclude: bool) {
        if exclude {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, validity);
        }
    }

    pub fn validity(&self) -> Validity {
        Validity::reduce(self.entries.values().copied())
    }
}

/// Three independent partitions: adapters feed value and validity,
/// transient fields validity only, groups validity only. Keeping them
/// separate avoids name collisions between the partitions and lets each
/// recompute on its own update stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormValidityReducer {
    adapters: ValidityReducer,
    transient_fields: ValidityReducer,
    groups: ValidityReducer,
}

impl FormValidityReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_adapter_update(&mut self, key: FieldKey, state: &AdapterState) {
        self.adapters
            .process_member_update(key, state.validity, state.exclude);
    }

    pub fn process_transient_field_update(&mut self, key: FieldKey, state: &FieldState) {
        self.transient_fields
            .process_member_update(key, state.validity, state.exclude);
    }

    pub fn process_group_update(&mut self, key: FieldKey, state: &GroupState) {
        self.groups.process_member_update(key, state.validity, false);
    }

    pub fn validity(&self) -> Validity {
        self.adapters
            .validity()
            .merge(self.transient_fields.validity())
            .merge(self.groups.validity())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormReducerState {
    pub value: BTreeMap<FieldKey, FieldValue>,
    pub validity: Validity,
}

impl ManagedState for FormReducerState {
    fn changed_properties(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.value != previous.value {
            changed.push("value");
        }
        if self.validity != previous.validity {
            changed.push("validity");
        }
        changed
    }
}

struct FormReducerCore {
    value_reducer: RwLock<ValueReducer>,
    validity_reducer: RwLock<FormValidityReducer>,
    manager: StateManager<FormReducerState>,
}

impl FormReducerCore {
    fn publish(&self) -> FormResult<()> {
        let value = read_lock(&self.value_reducer, "reading reduced form value")?.value();
        let validity =
            read_lock(&self.validity_reducer, "reading reduced form validity")?.validity();
        trace!(?validity, entries = value.len(), "form reduction published");
        self.manager.set_state(FormReducerState { value, validity })
    }
}

/// Subscribes once to every adapter, transient field, and group, and
/// publishes one consolidated `{value, validity}` snapshot per upstream
/// emission. Upstream emissions never coalesce.
#[derive(Clone)]
pub struct FormReducer {
    core: Arc<FormReducerCore>,
    _subscriptions: Arc<RwLock<Vec<StateSubscription>>>,
}

impl FormReducer {
    pub(crate) fn connect(
        adapters: &[Adapter],
        transient_fields: &[Field],
        groups: &[Group],
    ) -> FormResult<Self> {
        let mut value_reducer = ValueReducer::new();
        let mut validity_reducer = FormValidityReducer::new();
        for adapter in adapters {
            let state = adapter.state()?;
            value_reducer.process_member_update(adapter.key(), &state);
            validity_reducer.process_adapter_update(adapter.key(), &state);
        }
        for field in transient_fields {
            validity_reducer.process_transient_field_update(field.key(), &field.state()?);
        }
        for group in groups {
            validity_reducer.process_group_update(group.key(), &group.state()?);
        }

        let initial = FormReducerState {
            value: value_reducer.value(),
            validity: validity_reducer.validity(),
        };
        let core = Arc::new(FormReducerCore {
            value_reducer: RwLock::new(value_reducer),
            validity_reducer: RwLock::new(validity_reducer),
            manager: StateManager::new(initial),
        });

        let subscriptions = Arc::new(RwLock::new(Vec::new()));
        for adapter in adapters {
            let key = adapter.key();
            let core = core.clone();
            let subscription = adapter.subscribe_to_state(move |state: &AdapterState| {
                let updated = core
                    .value_reducer
                    .write()
                    .map(|mut reducer| reducer.process_member_update(key, state))
                    .is_ok()
                    && core
                        .validity_reducer
                        .write()
                        .map(|mut reducer| reducer.process_adapter_update(key, state))
                        .is_ok();
                if updated {
                    drop(core.publish());
                }
            })?;
            write_lock(&subscriptions, "registering adapter subscription")?.push(subscription);
        }
        for field in transient_fields {
            let key = field.key();
            let core = core.clone();
            let subscription = field.subscribe_to_state(move |state: &FieldState| {
                let updated = core
                    .validity_reducer
                    .write()
                    .map(|mut reducer| reducer.process_transient_field_update(key, state))
                    .is_ok();
                if updated {
                    drop(core.publish());
                }
            })?;
            write_lock(&subscriptions, "registering transient field subscription")?
                .push(subscription);
        }
        for group in groups {
            let key = group.key();
            let core = core.clone();
            let subscription = group.subscribe_to_state(move |state: &GroupState| {
                let updated = core
                    .validity_reducer
                    .write()
                    .map(|mut reducer| reducer.process_group_update(key, state))
                    .is_ok();
                if updated {
                    drop(core.publish());
                }
            })?;
            write_lock(&subscriptions, "registering group subscription")?.push(subscription);
        }

        Ok(Self {
            core,
            _subscriptions: subscriptions,
        })
    }

    pub fn state(&self) -> FormResult<FormReducerState> {
        self.core.manager.state()
    }

    pub fn did_property_change(&self, property: &'static str) -> FormResult<bool> {
        self.core.manager.did_property_change(property)
    }

    pub fn subscribe_to_state(
        &self,
        callback: impl Fn(&FormReducerState) + Send + Sync + 'static,
    ) -> FormResult<StateSubscription> {
        self.core.manager.subscribe_to_state(callback)
    }
}
