//! Model backends and the pool that holds them
//!
//! Provides the message types, the `CompletionBackend` seam with its
//! OpenAI-compatible implementation, and the ordered `BackendPool`.

pub mod client;
pub mod message;
pub mod pool;

pub use client::{BackendError, CompletionBackend, OpenAiBackend};
pub use message::{ChatMessage, Role};
pub use pool::{BackendPool, BackendSlot, PooledBackend};
