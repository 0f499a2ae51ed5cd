use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::value::FieldValue;

use super::verdict::{Message, Validity};

type PredicateFn = Arc<dyn Fn(&FieldValue) -> Validity + Send + Sync>;

/// One pure predicate plus the user-facing message for each outcome it
/// can produce. A validator with no message for its outcome still
/// affects the aggregate validity.
#[derive(Clone)]
pub struct Validator {
    predicate: PredicateFn,
    valid_message: Option<String>,
    invalid_message: Option<String>,
    pending_message: Option<String>,
    trim_before_validation: bool,
}

impl Validator {
    pub fn new(predicate: impl Fn(&FieldValue) -> Validity + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            valid_message: None,
            invalid_message: None,
            pending_message: None,
            trim_before_validation: false,
        }
    }

    pub fn predicate(predicate: impl Fn(&FieldValue) -> bool + Send + Sync + 'static) -> Self {
        Self::new(move |value| {
            if predicate(value) {
                Validity::Valid
            } else {
                Validity::Invalid
            }
        })
    }

    pub fn required(invalid_message: impl Into<String>) -> Self {
        Self::predicate(|value| !value.is_blank()).invalid_message(invalid_message)
    }

    pub fn min_length(min: usize, invalid_message: impl Into<String>) -> Self {
        Self::predicate(move |value| match value.as_text() {
            Some(text) => text.chars().count() >= min,
            None => true,
        })
        .invalid_message(invalid_message)
        .trim_before_validation()
    }

    pub fn max_length(max: usize, invalid_message: impl Into<String>) -> Self {
        Self::predicate(move |value| match value.as_text() {
            Some(text) => text.chars().count() <= max,
            None => true,
        })
        .invalid_message(invalid_message)
        .trim_before_validation()
    }

    pub fn valid_message(mut self, message: impl Into<String>) -> Self {
        self.valid_message = Some(message.into());
        self
    }

    pub fn invalid_message(mut self, message: impl Into<String>) -> Self {
        self.invalid_message = Some(message.into());
        self
    }

    pub fn pending_message(mut self, message: impl Into<String>) -> Self {
        self.pending_message = Some(message.into());
        self
    }

    /// Validate against `value.trimmed()`. The stored value is never
    /// altered; trimming the stored value is the auto-trim adapter's
    /// job, configured at the form level.
    pub fn trim_before_validation(mut self) -> Self {
        self.trim_before_validation = true;
        self
    }

    pub(crate) fn run(&self, value: &FieldValue) -> (Validity, Option<Message>) {
        let validity = if self.trim_before_validation {
            (self.predicate)(&value.trimmed())
        } else {
            (self.predicate)(value)
        };
        let text = match validity {
            Validity::Valid => self.valid_message.as_ref(),
            Validity::Invalid => self.invalid_message.as_ref(),
            Validity::Pending => self.pending_message.as_ref(),
        };
        (validity, text.map(|text| Message::new(text.clone(), validity)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorOutcome {
    pub validity: Validity,
    pub messages: Vec<Message>,
}

/// Runs every validator against one value and reduces the results:
/// Invalid if any validator is Invalid, else Pending if any is Pending,
/// else Valid. Messages preserve declaration order.
#[derive(Clone, Default)]
pub struct ValidatorSuite {
    validators: Vec<Validator>,
}

impl ValidatorSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn run(&self, value: &FieldValue) -> ValidatorOutcome {
        let mut validity = Validity::Valid;
        let mut messages = Vec::new();
        for validator in &self.validators {
            let (outcome, message) = validator.run(value);
            validity = validity.merge(outcome);
            if let Some(message) = message {
                messages.push(message);
            }
        }
        ValidatorOutcome { validity, messages }
    }
}

impl FromIterator<Validator> for ValidatorSuite {
    fn from_iter<I: IntoIterator<Item = Validator>>(iter: I) -> Self {
        Self {
            validators: iter.into_iter().collect(),
        }
    }
}

pub type BoxedValidityFuture = Pin<Box<dyn Future<Output = Validity> + Send + 'static>>;

type AsyncPredicateFn = Arc<dyn Fn(FieldValue) -> BoxedValidityFuture + Send + Sync>;

/// An asynchronous validator. The field holding one reports Pending
/// from the moment a value is set until `resolve_async_validation`
/// applies the resolution, and a resolution for a superseded value is
/// discarded by ticket comparison.
#[derive(Clone)]
pub struct AsyncValidator {
    predicate: AsyncPredicateFn,
    valid_message: Option<String>,
    invalid_message: Option<String>,
    pending_message: Option<String>,
    debounce: Duration,
}

impl AsyncValidator {
    pub fn new(predicate: impl Fn(FieldValue) -> BoxedValidityFuture + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            valid_message: None,
            invalid_message: None,
            pending_message: None,
            debounce: Duration::ZERO,
        }
    }

    pub fn valid_message(mut self, message: impl Into<String>) -> Self {
        self.valid_message = Some(message.into());
        self
    }

    pub fn invalid_message(mut self, message: impl Into<String>) -> Self {
        self.invalid_message = Some(message.into());
        self
    }

    pub fn pending_message(mut self, message: impl Into<String>) -> Self {
        self.pending_message = Some(message.into());
        self
    }

    pub fn debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce = Duration::from_millis(debounce_ms);
        self
    }

    pub(crate) fn debounce(&self) -> Duration {
        self.debounce
    }

    pub(crate) fn interim_message(&self) -> Option<Message> {
        self.pending_message
            .as_ref()
            .map(|text| Message::new(text.clone(), Validity::Pending))
    }

    pub(crate) async fn run(&self, value: FieldValue) -> (Validity, Option<Message>) {
        let validity = (self.predicate)(value).await;
        let text = match validity {
            Validity::Valid => self.valid_message.as_ref(),
            Validity::Invalid => self.invalid_message.as_ref(),
            Validity::Pending => self.pending_message.as_ref(),
        };
        (validity, text.map(|text| Message::new(text.clone(), validity)))
    }
}
