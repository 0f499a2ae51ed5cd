use std::fmt::{Display, Formatter};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::value::FieldKey;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
    DuplicateName(FieldKey),
    UnknownMember { group: FieldKey, member: FieldKey },
    UnknownSource { consumer: FieldKey, source: FieldKey },
    UnknownController { field: FieldKey, controller: FieldKey },
    AdapterCollision { adapter: FieldKey, source: FieldKey },
    NotExcludable(FieldKey),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "state lock poisoned while {context}")
            }
            FormError::DuplicateName(key) => {
                write!(f, "name {key} is declared more than once in this form")
            }
            FormError::UnknownMember { group, member } => {
                write!(f, "group {group} references member {member}, which this form does not declare")
            }
            FormError::UnknownSource { consumer, source } => {
                write!(f, "{consumer} references source {source}, which this form does not declare")
            }
            FormError::UnknownController { field, controller } => {
                write!(f, "field {field} is controlled by {controller}, which this form does not declare")
            }
            FormError::AdapterCollision { adapter, source } => {
                write!(f, "adapter {adapter} claims a declared name but adapts {source}")
            }
            FormError::NotExcludable(key) => {
                write!(f, "field {key} was not declared excludable")
            }
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
