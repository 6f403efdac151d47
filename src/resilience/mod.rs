//! Failure isolation around model calls
//!
//! `CircuitBreaker` is a generic gate for any async operation;
//! `ResilientInvoker` applies it to ordered backend fallback.

pub mod breaker;
pub mod invoker;

pub use breaker::{BreakerError, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use invoker::ResilientInvoker;
