//! The persistence/transport contract the approval engine polls against.
//!
//! Implementations must keep `get` idempotent — it is called from a poll loop
//! and must return the same terminal status however many times it is asked —
//! and must surface every transport failure as [`crate::HandrailError`] so
//! the engine can decide retry vs. abort.

pub mod cloud;
pub mod cloud_blocking;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{
    Escalation, FunctionCall, FunctionCallStatus, HumanContact, HumanContactStatus,
};

pub use cloud::{CloudBackend, CloudConnection};
pub use cloud_blocking::{BlockingCloudBackend, BlockingCloudConnection};

/// Store operations for one request family, generic over the request type and
/// its status type.
///
/// `add` persists a *new* request and returns the server-echoed copy; it must
/// not be used to update an existing one. `respond` belongs to the responder
/// side and is never exercised by the polling engine itself.
#[async_trait]
pub trait AgentStore<T: Send + 'static, S: Send + 'static>: Send + Sync {
    async fn add(&self, item: T) -> Result<T>;
    async fn get(&self, call_id: &str) -> Result<T>;
    async fn respond(&self, call_id: &str, status: S) -> Result<T>;
    /// Notify additional recipients about a still-pending request.
    async fn escalate_email(&self, call_id: &str, escalation: Escalation) -> Result<T>;
}

/// A backend bundles one store per request family.
pub trait AgentBackend: Send + Sync {
    fn functions(&self) -> &dyn AgentStore<FunctionCall, FunctionCallStatus>;
    fn contacts(&self) -> &dyn AgentStore<HumanContact, HumanContactStatus>;
}

/// Blocking mirror of [`AgentStore`], for the thread-blocking engine.
pub trait BlockingAgentStore<T, S>: Send + Sync {
    fn add(&self, item: T) -> Result<T>;
    fn get(&self, call_id: &str) -> Result<T>;
    fn respond(&self, call_id: &str, status: S) -> Result<T>;
    fn escalate_email(&self, call_id: &str, escalation: Escalation) -> Result<T>;
}

/// Blocking mirror of [`AgentBackend`].
pub trait BlockingAgentBackend: Send + Sync {
    fn functions(&self) -> &dyn BlockingAgentStore<FunctionCall, FunctionCallStatus>;
    fn contacts(&self) -> &dyn BlockingAgentStore<HumanContact, HumanContactStatus>;
}
