//! Sends one logical HTTP request, retrying transient failures with
//! exponential backoff.

#[path = "dispatch/policy.rs"]
mod policy;

#[path = "dispatch/dispatcher.rs"]
mod dispatcher;

pub use dispatcher::{Dispatcher, RawResponse};
pub use policy::RetryPolicy;
