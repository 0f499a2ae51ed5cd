pub mod elements;
pub mod error;
pub mod form;
pub mod reducers;
pub mod state;
pub mod validators;
pub mod value;

pub use elements::{
    AdaptOutput, Adapter, AdapterState, AdapterTemplate, AutoTrim, DerivedValue,
    DerivedValueTemplate, Field, FieldState, FieldTemplate, Group, GroupState, GroupTemplate,
    SourceSnapshot, ValidationTicket,
};
pub use error::{FormError, FormResult};
pub use form::{Form, FormElement, FormElementTemplate, FormId, FormState, FormTemplate};
pub use reducers::{
    FormReducer, FormReducerState, FormValidityReducer, ValidityReducer, ValueReducer,
};
pub use state::{ManagedState, StateManager, StateSubscription, SubscriptionId};
pub use validators::{
    AsyncValidator, BoxedValidityFuture, Message, Validator, ValidatorOutcome, ValidatorSuite,
    Validity, ValiditySource,
};
pub use value::{FieldKey, FieldValue};
