mod template;


pub use template::{FormElementTemplate, FormTemplate};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::elements::{
    Adapter, AdapterTemplate, DerivedValue, Field, Group, SharedSource, SourceObserver,
    SourceSnapshot, StateSource,
};
use crate::error::{FormError, FormResult};
use crate::reducers::FormReducer;
use crate::state::{ManagedState, StateManager, StateSubscription};
use crate::validators::{Message, Validity};
use crate::value::{FieldKey, FieldValue};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormState {
    pub value: BTreeMap<FieldKey, FieldValue>,
    pub validity: Validity,
    pub messages: Vec<Message>,
    pub confirmation_attempted: bool,
}

impl ManagedState for FormState {
    fn changed_properties(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.value != previous.value {
            changed.push("value");
        }
        if self.validity != previous.validity {
            changed.push("validity");
        }
        if self.messages != previous.messages {
            changed.push("messages");
        }
        if self.confirmation_attempted != previous.confirmation_attempted {
            changed.push("confirmation_attempted");
        }
        changed
    }
}

#[derive(Clone)]
pub enum FormElement {
    Field(Field),
    SubForm(Form),
}

impl FormElement {
    pub fn key(&self) -> FieldKey {
        match self {
            FormElement::Field(field) => field.key(),
            FormElement::SubForm(form) => form.name(),
        }
    }

    fn is_transient(&self) -> bool {
        match self {
            FormElement::Field(field) => field.is_transient(),
            FormElement::SubForm(_) => false,
        }
    }

    fn reset(&self) -> FormResult<()> {
        match self {
            FormElement::Field(field) => field.reset(),
            FormElement::SubForm(form) => form.reset(),
        }
    }

    fn mark_submitted(&self) -> FormResult<()> {
        match self {
            FormElement::Field(field) => field.set_submitted(),
            FormElement::SubForm(form) => form.mark_submitted(),
        }
    }

    fn as_source(&self) -> SharedSource {
        match self {
            FormElement::Field(field) => Arc::new(field.clone()),
            FormElement::SubForm(form) => Arc::new(form.clone()),
        }
    }
}

#[derive(Clone, Default)]
struct FormMessages {
    valid: Option<String>,
    invalid: Option<String>,
    pending: Option<String>,
}

impl FormMessages {
    fn for_validity(&self, validity: Validity) -> Vec<Message> {
        let text = match validity {
            Validity::Valid => self.valid.as_ref(),
            Validity::Invalid => self.invalid.as_ref(),
            Validity::Pending => self.pending.as_ref(),
        };
        text.map(|text| Message::new(text.clone(), validity))
            .into_iter()
            .collect()
    }
}

struct FormCore {
    name: FieldKey,
    form_id: FormId,
    template_id: Option<&'static str>,
    elements: BTreeMap<FieldKey, FormElement>,
    groups: BTreeMap<FieldKey, Group>,
    adapters: BTreeMap<FieldKey, Adapter>,
    derived_values: BTreeMap<FieldKey, DerivedValue>,
    reducer: FormReducer,
    manager: StateManager<FormState>,
    _control_edges: Vec<StateSubscription>,
    _reducer_subscription: StateSubscription,
}

/// The root entity: owns every constituent, exposes the consolidated
/// `{value, validity}` snapshot, and carries the confirm/reset
/// semantics. Instances come out of `FormTemplate::build`.
#[derive(Clone)]
pub struct Form {
    core: Arc<FormCore>,
}

impl Form {
    pub(crate) fn from_template(template: FormTemplate) -> FormResult<Self> {
        check_names(&template)?;

        // Elements first; groups, control edges, adapters, and derived
        // values resolve against them in declaration order.
        let mut elements = BTreeMap::new();
        let mut control_wiring = Vec::new();
        for element_template in &template.elements {
            let element = match element_template {
                FormElementTemplate::Field(field_template) => {
                    if let Some((controller, control)) = &field_template.controlled_by {
                        control_wiring.push((field_template.key(), *controller, control.clone()));
                    }
                    FormElement::Field(Field::from_template(field_template))
                }
                FormElementTemplate::SubForm(subform_template) => {
                    FormElement::SubForm(Form::from_template(subform_template.clone())?)
                }
            };
            elements.insert(element.key(), element);
        }

        let mut sources: BTreeMap<FieldKey, SharedSource> = elements
            .iter()
            .map(|(key, element)| (*key, element.as_source()))
            .collect();

        let mut groups = BTreeMap::new();
        for group_template in &template.groups {
            let mut members = Vec::new();
            for member_key in &group_template.members {
                let source = sources.get(member_key).ok_or(FormError::UnknownMember {
                    group: group_template.key(),
                    member: *member_key,
                })?;
                members.push(source.clone());
            }
            let group = Group::connect(group_template, members)?;
            sources.insert(group.key(), Arc::new(group.clone()));
            groups.insert(group.key(), group);
        }

        // Controller-to-controlled edges are wired, and applied once,
        // before anything downstream reads the controlled fields.
        let mut control_edges = Vec::new();
        for (field_key, controller_key, control) in control_wiring {
            let controller = sources
                .get(&controller_key)
                .ok_or(FormError::UnknownController {
                    field: field_key,
                    controller: controller_key,
                })?;
            let Some(FormElement::Field(field)) = elements.get(&field_key) else {
                continue;
            };
            if let Some(value) = control(&controller.source_snapshot()?) {
                field.set_controlled_value(value)?;
            }
            let observer: SourceObserver = {
                let field = field.clone();
                let control = control.clone();
                Arc::new(move |snapshot: &SourceSnapshot| {
                    if let Some(value) = control(snapshot) {
                        drop(field.set_controlled_value(value));
                    }
                })
            };
            control_edges.push(controller.observe(observer)?);
        }

        let mut adapters = BTreeMap::new();
        for adapter_template in &template.adapters {
            let source = sources
                .get(&adapter_template.source())
                .ok_or(FormError::UnknownSource {
                    consumer: adapter_template.key(),
                    source: adapter_template.source(),
                })?;
            adapters.insert(
                adapter_template.key(),
                Adapter::connect(adapter_template, source.clone())?,
            );
        }
        for (key, element) in &elements {
            if element.is_transient() || adapters.contains_key(key) {
                continue;
            }
            let Some(source) = sources.get(key) else {
                continue;
            };
            let default_template =
                AdapterTemplate::default_for(*key, template.auto_trim.applies_to(*key));
            adapters.insert(*key, Adapter::connect(&default_template, source.clone())?);
        }

        let mut derived_values = BTreeMap::new();
        for derived_template in &template.derived_values {
            let mut derived_sources = Vec::new();
            for source_key in &derived_template.sources {
                let source = sources.get(source_key).ok_or(FormError::UnknownSource {
                    consumer: derived_template.key(),
                    source: *source_key,
                })?;
                derived_sources.push(source.clone());
            }
            derived_values.insert(
                derived_template.key(),
                DerivedValue::connect(derived_template, derived_sources)?,
            );
        }

        let adapter_list: Vec<Adapter> = adapters.values().cloned().collect();
        let transient_fields: Vec<Field> = elements
            .values()
            .filter_map(|element| match element {
                FormElement::Field(field) if field.is_transient() => Some(field.clone()),
                _ => None,
            })
            .collect();
        let group_list: Vec<Group> = groups.values().cloned().collect();
        let reducer = FormReducer::connect(&adapter_list, &transient_fields, &group_list)?;

        let messages = FormMessages {
            valid: template.valid_message.clone(),
            invalid: template.invalid_message.clone(),
            pending: template.pending_message.clone(),
        };
        let reduced = reducer.state()?;
        let manager = StateManager::new(FormState {
            value: reduced.value,
            validity: reduced.validity,
            messages: messages.for_validity(reduced.validity),
            confirmation_attempted: false,
        });
        let reducer_subscription = {
            let manager = manager.clone();
            reducer.subscribe_to_state(move |reduced| {
                let Ok(mut next) = manager.state() else {
                    return;
                };
                next.value = reduced.value.clone();
                next.validity = reduced.validity;
                next.messages = messages.for_validity(reduced.validity);
                drop(manager.set_state(next));
            })?
        };

        debug!(form = %template.name, elements = elements.len(), "form instantiated");
        Ok(Self {
            core: Arc::new(FormCore {
                name: template.name,
                form_id: FormId::next(),
                template_id: template.template_id,
                elements,
                groups,
                adapters,
                derived_values,
                reducer,
                manager,
                _control_edges: control_edges,
                _reducer_subscription: reducer_subscription,
            }),
        })
    }

    pub fn name(&self) -> FieldKey {
        self.core.name
    }

    pub fn form_id(&self) -> FormId {
        self.core.form_id
    }

    pub fn template_id(&self) -> Option<&'static str> {
        self.core.template_id
    }

    pub fn state(&self) -> FormResult<FormState> {
        self.core.manager.state()
    }

    pub fn did_property_change(&self, property: &'static str) -> FormResult<bool> {
        self.core.manager.did_property_change(property)
    }

    pub fn subscribe_to_state(
        &self,
        callback: impl Fn(&FormState) + Send + Sync + 'static,
    ) -> FormResult<StateSubscription> {
        self.core.manager.subscribe_to_state(callback)
    }

    pub fn field(&self, key: &'static str) -> Option<Field> {
        match self.core.elements.get(&FieldKey::new(key)) {
            Some(FormElement::Field(field)) => Some(field.clone()),
            _ => None,
        }
    }

    pub fn subform(&self, key: &'static str) -> Option<Form> {
        match self.core.elements.get(&FieldKey::new(key)) {
            Some(FormElement::SubForm(form)) => Some(form.clone()),
            _ => None,
        }
    }

    pub fn group(&self, key: &'static str) -> Option<Group> {
        self.core.groups.get(&FieldKey::new(key)).cloned()
    }

    pub fn adapter(&self, key: &'static str) -> Option<Adapter> {
        self.core.adapters.get(&FieldKey::new(key)).cloned()
    }

    pub fn derived_value(&self, key: &'static str) -> Option<DerivedValue> {
        self.core.derived_values.get(&FieldKey::new(key)).cloned()
    }

    pub fn reducer(&self) -> &FormReducer {
        &self.core.reducer
    }

    /// Marks the confirmation attempt, forces message visibility on
    /// every field, then routes to exactly one callback: `on_success`
    /// with the current value if the form is Valid, `on_failure` with
    /// the current state otherwise. Pending is not confirmable.
    pub fn confirm<S, F>(&self, on_success: S, on_failure: F) -> FormResult<()>
    where
        S: FnOnce(&BTreeMap<FieldKey, FieldValue>),
        F: FnOnce(&FormState),
    {
        debug!(form = %self.core.name, "confirm attempted");
        {
            let mut state = self.core.manager.state()?;
            state.confirmation_attempted = true;
            self.core.manager.set_state(state)?;
        }
        self.mark_submitted()?;
        let state = self.core.manager.state()?;
        if state.validity.is_valid() {
            on_success(&state.value);
        } else {
            on_failure(&state);
        }
        Ok(())
    }

    /// Restores every constituent to its construction state. Each
    /// member reset is an independent emission; group and reducer
    /// state re-derive after every one of them.
    pub fn reset(&self) -> FormResult<()> {
        debug!(form = %self.core.name, "reset");
        for element in self.core.elements.values() {
            element.reset()?;
        }
        let mut state = self.core.manager.state()?;
        state.confirmation_attempted = false;
        self.core.manager.set_state(state)
    }

    pub(crate) fn mark_submitted(&self) -> FormResult<()> {
        for element in self.core.elements.values() {
            element.mark_submitted()?;
        }
        Ok(())
    }
}

impl StateSource for Form {
    fn source_key(&self) -> FieldKey {
        self.core.name
    }

    fn source_snapshot(&self) -> FormResult<SourceSnapshot> {
        let state = self.core.manager.state()?;
        Ok(SourceSnapshot {
            key: self.core.name,
            value: FieldValue::Map(state.value),
            validity: state.validity,
            exclude: false,
        })
    }

    fn observe(&self, observer: SourceObserver) -> FormResult<StateSubscription> {
        let key = self.core.name;
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

// Every declared name is checked before anything is instantiated. An
// adapter may claim a declared element or group name only when it
// adapts that same name, which suppresses the default adapter.
fn check_names(template: &FormTemplate) -> FormResult<()> {
    let mut seen: BTreeSet<FieldKey> = BTreeSet::new();
    for element in &template.elements {
        if !seen.insert(element.key()) {
            return Err(FormError::DuplicateName(element.key()));
        }
    }
    for group in &template.groups {
        if !seen.insert(group.key()) {
            return Err(FormError::DuplicateName(group.key()));
        }
    }
    let mut adapter_seen: BTreeSet<FieldKey> = BTreeSet::new();
    for adapter in &template.adapters {
        if !adapter_seen.insert(adapter.key()) {
            return Err(FormError::DuplicateName(adapter.key()));
        }
        if seen.contains(&adapter.key()) && adapter.source() != adapter.key() {
            return Err(FormError::AdapterCollision {
                adapter: adapter.key(),
                source: adapter.source(),
            });
        }
    }
    let mut derived_seen: BTreeSet<FieldKey> = BTreeSet::new();
    for derived in &template.derived_values {
        if !derived_seen.insert(derived.key()) {
            return Err(FormError::DuplicateName(derived.key()));
        }
    }
    Ok(())
}
