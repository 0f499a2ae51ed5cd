mod manager;


pub use manager::{ManagedState, StateManager, StateSubscription, SubscriptionId};
