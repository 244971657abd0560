//! Job dispatch engine.
//!
//! [`dispatcher`] layers the claim/complete/fail/sweep state machine on the
//! job store and announces every transition on the event bus. [`wait`]
//! turns an asynchronously processed job into a synchronous result for the
//! chat completion endpoint.

pub mod dispatcher;
pub mod wait;
