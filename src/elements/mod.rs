mod adapter;
mod derived;
mod field;
mod group;
mod source;

#[cfg(test)]
mod tests;

pub use adapter::{AdaptOutput, Adapter, AdapterState, AdapterTemplate, AutoTrim};
pub use derived::{DerivedValue, DerivedValueTemplate};
pub use field::{Field, FieldState, FieldTemplate, ValidationTicket};
pub use group::{Group, GroupState, GroupTemplate};
pub use source::SourceSnapshot;

pub(crate) use source::{SharedSource, SourceObserver, StateSource};
