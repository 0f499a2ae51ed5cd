use std::sync::Arc;

use crate::error::FormResult;
use crate::state::StateSubscription;
use crate::validators::Validity;
use crate::value::{FieldKey, FieldValue};

/// The slice of an upstream entity's state a dependent may read:
/// adapters, groups, derived values, and controlled fields all consume
/// their sources through this shape.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceSnapshot {
    pub key: FieldKey,
    pub value: FieldValue,
    pub validity: Validity,
    pub exclude: bool,
}

pub(crate) type SourceObserver = Arc<dyn Fn(&SourceSnapshot) + Send + Sync>;

/// Fields, groups, and forms all act as sources. Dependents subscribe
/// before exposing their own state, so upstream always notifies before
/// downstream recomputes.
pub(crate) trait StateSource: Send + Sync {
    fn source_key(&self) -> FieldKey;
    fn source_snapshot(&self) -> FormResult<SourceSnapshot>;
    fn observe(&self, observer: SourceObserver) -> FormResult<StateSubscription>;
}

pub(crate) type SharedSource = Arc<dyn StateSource>;
