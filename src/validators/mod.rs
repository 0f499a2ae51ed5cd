mod suite;
mod verdict;


pub use suite::{
    AsyncValidator, BoxedValidityFuture, Validator, ValidatorOutcome, ValidatorSuite,
};
pub use verdict::{Message, Validity, ValiditySource};
