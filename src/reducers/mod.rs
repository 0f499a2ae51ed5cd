mod form;


pub use form::{
    FormReducer, FormReducerState, FormValidityReducer, ValidityReducer, ValueReducer,
};
