use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_timer::Delay;
use tracing::trace;

use crate::error::{FormError, FormResult};
use crate::state::{ManagedState, StateManager, StateSubscription};
use crate::validators::{AsyncValidator, Message, Validity, ValidatorSuite};
use crate::value::{FieldKey, FieldValue};

use super::source::{SourceObserver, SourceSnapshot, StateSource};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub struct FieldState {
    pub value: FieldValue,
    pub validity: Validity,
    pub messages: Vec<Message>,
    pub focused: bool,
    pub visited: bool,
    pub modified: bool,
    pub submitted: bool,
    pub exclude: bool,
}

impl ManagedState for FieldState {
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
        if self.focused != previous.focused {
            changed.push("focused");
        }
        if self.visited != previous.visited {
            changed.push("visited");
        }
        if self.modified != previous.modified {
            changed.push("modified");
        }
        if self.submitted != previous.submitted {
            changed.push("submitted");
        }
        if self.exclude != previous.exclude {
            changed.push("exclude");
        }
        changed
    }
}

pub(crate) type ControlFn = Arc<dyn Fn(&SourceSnapshot) -> Option<FieldValue> + Send + Sync>;

#[derive(Clone)]
pub struct FieldTemplate {
    pub(crate) key: FieldKey,
    pub(crate) default_value: FieldValue,
    pub(crate) validators: ValidatorSuite,
    pub(crate) async_validators: Vec<AsyncValidator>,
    pub(crate) transient: bool,
    pub(crate) excludable: bool,
    pub(crate) excluded_by_default: bool,
    pub(crate) controlled_by: Option<(FieldKey, ControlFn)>,
}

impl FieldTemplate {
    pub fn new(key: &'static str, default_value: impl Into<FieldValue>) -> Self {
        Self {
            key: FieldKey::new(key),
            default_value: default_value.into(),
            validators: ValidatorSuite::new(),
            async_validators: Vec::new(),
            transient: false,
            excludable: false,
            excluded_by_default: false,
            controlled_by: None,
        }
    }

    pub fn key(&self) -> FieldKey {
        self.key
    }

    pub fn validator(mut self, validator: crate::validators::Validator) -> Self {
        self.validators = self.validators.with(validator);
        self
    }

    pub fn async_validator(mut self, validator: AsyncValidator) -> Self {
        self.async_validators.push(validator);
        self
    }

    /// Transient fields contribute to form validity but never to the
    /// form value.
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn excludable(mut self) -> Self {
        self.excludable = true;
        self
    }

    pub fn excluded_by_default(mut self) -> Self {
        self.excludable = true;
        self.excluded_by_default = true;
        self
    }

    /// Routes the controller's emissions into this field. `control`
    /// returning `None` leaves the current state untouched.
    pub fn controlled_by(
        mut self,
        controller: &'static str,
        control: impl Fn(&SourceSnapshot) -> Option<FieldValue> + Send + Sync + 'static,
    ) -> Self {
        self.controlled_by = Some((FieldKey::new(controller), Arc::new(control)));
        self
    }
}

struct FieldShape {
    key: FieldKey,
    default_value: FieldValue,
    validators: ValidatorSuite,
    async_validators: Vec<AsyncValidator>,
    transient: bool,
    excludable: bool,
    excluded_by_default: bool,
}

/// The leaf stateful entity: one user-editable value, its validity and
/// messages, and the interaction flags. Every mutator installs exactly
/// one new snapshot and emits it synchronously before returning.
#[derive(Clone)]
pub struct Field {
    shape: Arc<FieldShape>,
    manager: StateManager<FieldState>,
    ticket: Arc<AtomicU64>,
}

impl Field {
    pub(crate) fn from_template(template: &FieldTemplate) -> Self {
        let shape = Arc::new(FieldShape {
            key: template.key,
            default_value: template.default_value.clone(),
            validators: template.validators.clone(),
            async_validators: template.async_validators.clone(),
            transient: template.transient,
            excludable: template.excludable,
            excluded_by_default: template.excluded_by_default,
        });
        let initial = Self::default_state(&shape);
        Self {
            shape,
            manager: StateManager::new(initial),
            ticket: Arc::new(AtomicU64::new(0)),
        }
    }

    fn default_state(shape: &FieldShape) -> FieldState {
        let (validity, messages) = Self::validated(shape, &shape.default_value);
        FieldState {
            value: shape.default_value.clone(),
            validity,
            messages,
            focused: false,
            visited: false,
            modified: false,
            submitted: false,
            exclude: shape.excluded_by_default,
        }
    }

    // Sync suite first. A Valid sync pass with async validators present
    // is Pending until resolution; interim messages come from the async
    // validators' pending slots.
    fn validated(shape: &FieldShape, value: &FieldValue) -> (Validity, Vec<Message>) {
        let outcome = shape.validators.run(value);
        if outcome.validity == Validity::Valid && !shape.async_validators.is_empty() {
            let mut messages = outcome.messages;
            for validator in &shape.async_validators {
                if let Some(message) = validator.interim_message() {
                    messages.push(message);
                }
            }
            (Validity::Pending, messages)
        } else {
            (outcome.validity, outcome.messages)
        }
    }

    pub fn key(&self) -> FieldKey {
        self.shape.key
    }

    pub fn is_transient(&self) -> bool {
        self.shape.transient
    }

    pub fn is_excludable(&self) -> bool {
        self.shape.excludable
    }

    pub fn state(&self) -> FormResult<FieldState> {
        self.manager.state()
    }

    pub fn did_property_change(&self, property: &'static str) -> FormResult<bool> {
        self.manager.did_property_change(property)
    }

    pub fn subscribe_to_state(
        &self,
        callback: impl Fn(&FieldState) + Send + Sync + 'static,
    ) -> FormResult<StateSubscription> {
        self.manager.subscribe_to_state(callback)
    }

    pub fn set_value(&self, value: impl Into<FieldValue>) -> FormResult<()> {
        let value = value.into();
        self.bump_ticket();
        let (validity, messages) = Self::validated(&self.shape, &value);
        let mut next = self.manager.state()?;
        next.value = value;
        next.validity = validity;
        next.messages = messages;
        next.modified = true;
        trace!(field = %self.shape.key, ?validity, "value set");
        self.manager.set_state(next)
    }

    // Controller-driven writes revalidate like `set_value` but leave
    // `modified` alone: the user did not type anything.
    pub(crate) fn set_controlled_value(&self, value: FieldValue) -> FormResult<()> {
        self.bump_ticket();
        let (validity, messages) = Self::validated(&self.shape, &value);
        let mut next = self.manager.state()?;
        next.value = value;
        next.validity = validity;
        next.messages = messages;
        trace!(field = %self.shape.key, ?validity, "controlled value applied");
        self.manager.set_state(next)
    }

    pub fn focus(&self) -> FormResult<()> {
        let mut next = self.manager.state()?;
        next.focused = true;
        self.manager.set_state(next)
    }

    /// Marks the field visited, but only once a focus has happened;
    /// a visit with no prior focus still emits with `visited` false.
    pub fn visit(&self) -> FormResult<()> {
        let mut next = self.manager.state()?;
        next.visited = next.visited || next.focused;
        self.manager.set_state(next)
    }

    pub fn set_submitted(&self) -> FormResult<()> {
        let mut next = self.manager.state()?;
        next.submitted = true;
        self.manager.set_state(next)
    }

    pub fn set_exclude(&self, exclude: bool) -> FormResult<()> {
        if !self.shape.excludable {
            return Err(FormError::NotExcludable(self.shape.key));
        }
        let mut next = self.manager.state()?;
        next.exclude = exclude;
        trace!(field = %self.shape.key, exclude, "exclusion toggled");
        self.manager.set_state(next)
    }

    /// Restores the construction-time snapshot: default value,
    /// revalidated, all interaction flags cleared, default exclusion.
    /// In-flight async validations are orphaned by the ticket bump.
    pub fn reset(&self) -> FormResult<()> {
        self.bump_ticket();
        trace!(field = %self.shape.key, "reset");
        self.manager.set_state(Self::default_state(&self.shape))
    }

    pub fn current_ticket(&self) -> ValidationTicket {
        ValidationTicket(self.ticket.load(Ordering::SeqCst))
    }

    fn bump_ticket(&self) -> ValidationTicket {
        ValidationTicket(self.ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_current_ticket(&self, ticket: ValidationTicket) -> bool {
        self.current_ticket() == ticket
    }

    /// Runs the registered async validators against the current value
    /// and applies the outcome through the normal state channel. A
    /// resolution whose ticket was superseded by a newer `set_value` or
    /// `reset` is discarded without emitting.
    pub async fn resolve_async_validation(&self) -> FormResult<()> {
        if self.shape.async_validators.is_empty() {
            return Ok(());
        }
        let ticket = self.current_ticket();
        let value = self.manager.state()?.value;
        let sync_outcome = self.shape.validators.run(&value);
        let mut validity = sync_outcome.validity;
        let mut messages = sync_outcome.messages;
        for validator in &self.shape.async_validators {
            if !validator.debounce().is_zero() {
                Delay::new(validator.debounce()).await;
                if !self.is_current_ticket(ticket) {
                    return Ok(());
                }
            }
            let (outcome, message) = validator.run(value.clone()).await;
            validity = validity.merge(outcome);
            if let Some(message) = message {
                messages.push(message);
            }
        }
        if !self.is_current_ticket(ticket) {
            trace!(field = %self.shape.key, "stale async validation discarded");
            return Ok(());
        }
        let mut next = self.manager.state()?;
        next.validity = validity;
        next.messages = messages;
        self.manager.set_state(next)
    }
}

impl StateSource for Field {
    fn source_key(&self) -> FieldKey {
        self.shape.key
    }

    fn source_snapshot(&self) -> FormResult<SourceSnapshot> {
        let state = self.manager.state()?;
        Ok(SourceSnapshot {
            key: self.shape.key,
            value: state.value,
            validity: state.validity,
            exclude: state.exclude,
        })
    }

    fn observe(&self, observer: SourceObserver) -> FormResult<StateSubscription> {
        let key = self.shape.key;
        self.manager.subscribe_to_state(move |state| {
            observer(&SourceSnapshot {
                key,
                value: state.value.clone(),
                validity: state.validity,
                exclude: state.exclude,
            })
        })
    }
}
