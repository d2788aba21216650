//! In-memory backend used by the integration tests. Supports scripting a
//! status that gets applied after a fixed number of polls, so tests can
//! exercise the pending -> resolved transition without a real human.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use handrail::models::{
    Escalation, FunctionCall, FunctionCallStatus, HumanContact, HumanContactStatus,
};
use handrail::{
    AgentBackend, AgentStore, BlockingAgentBackend, BlockingAgentStore, HandrailError, Result,
};

pub trait Keyed: Clone + Send + 'static {
    type Status: Clone + Send + 'static;
    fn key(&self) -> &str;
    fn set_status(&mut self, status: Self::Status);
}

impl Keyed for FunctionCall {
    type Status = FunctionCallStatus;
    fn key(&self) -> &str {
        &self.call_id
    }
    fn set_status(&mut self, status: FunctionCallStatus) {
        self.status = Some(status);
    }
}

impl Keyed for HumanContact {
    type Status = HumanContactStatus;
    fn key(&self) -> &str {
        &self.call_id
    }
    fn set_status(&mut self, status: HumanContactStatus) {
        self.status = Some(status);
    }
}

pub struct MemoryStore<T: Keyed> {
    items: Mutex<HashMap<String, T>>,
    gets: AtomicUsize,
    // apply this status to every stored item once `gets` reaches the count
    script: Mutex<Option<(usize, T::Status)>>,
    escalations: Mutex<Vec<(String, Escalation)>>,
}

impl<T: Keyed> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            gets: AtomicUsize::new(0),
            script: Mutex::new(None),
            escalations: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Keyed> MemoryStore<T> {
    /// Resolve every request with `status` once `after_gets` polls have
    /// happened.
    pub fn respond_after(&self, after_gets: usize, status: T::Status) {
        *self.script.lock().unwrap() = Some((after_gets, status));
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn stored(&self, call_id: &str) -> Option<T> {
        self.items.lock().unwrap().get(call_id).cloned()
    }

    pub fn only_item(&self) -> T {
        let items = self.items.lock().unwrap();
        assert_eq!(items.len(), 1, "expected exactly one stored request");
        items.values().next().unwrap().clone()
    }

    pub fn escalations(&self) -> Vec<(String, Escalation)> {
        self.escalations.lock().unwrap().clone()
    }

    fn do_add(&self, item: T) -> Result<T> {
        self.items
            .lock()
            .unwrap()
            .insert(item.key().to_string(), item.clone());
        Ok(item)
    }

    fn do_get(&self, call_id: &str) -> Result<T> {
        let count = self.gets.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, status)) = self.script.lock().unwrap().clone() {
            if count >= after {
                for item in self.items.lock().unwrap().values_mut() {
                    item.set_status(status.clone());
                }
            }
        }
        self.items
            .lock()
            .unwrap()
            .get(call_id)
            .cloned()
            .ok_or_else(|| HandrailError::NotFound(call_id.to_string()))
    }

    fn do_respond(&self, call_id: &str, status: T::Status) -> Result<T> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(call_id)
            .ok_or_else(|| HandrailError::NotFound(call_id.to_string()))?;
        item.set_status(status);
        Ok(item.clone())
    }

    fn do_escalate(&self, call_id: &str, escalation: Escalation) -> Result<T> {
        let item = self
            .items
            .lock()
            .unwrap()
            .get(call_id)
            .cloned()
            .ok_or_else(|| HandrailError::NotFound(call_id.to_string()))?;
        self.escalations
            .lock()
            .unwrap()
            .push((call_id.to_string(), escalation));
        Ok(item)
    }
}

#[async_trait]
impl<T: Keyed> AgentStore<T, T::Status> for MemoryStore<T> {
    async fn add(&self, item: T) -> Result<T> {
        self.do_add(item)
    }

    async fn get(&self, call_id: &str) -> Result<T> {
        self.do_get(call_id)
    }

    async fn respond(&self, call_id: &str, status: T::Status) -> Result<T> {
        self.do_respond(call_id, status)
    }

    async fn escalate_email(&self, call_id: &str, escalation: Escalation) -> Result<T> {
        self.do_escalate(call_id, escalation)
    }
}

impl<T: Keyed> BlockingAgentStore<T, T::Status> for MemoryStore<T> {
    fn add(&self, item: T) -> Result<T> {
        self.do_add(item)
    }

    fn get(&self, call_id: &str) -> Result<T> {
        self.do_get(call_id)
    }

    fn respond(&self, call_id: &str, status: T::Status) -> Result<T> {
        self.do_respond(call_id, status)
    }

    fn escalate_email(&self, call_id: &str, escalation: Escalation) -> Result<T> {
        self.do_escalate(call_id, escalation)
    }
}

/// Serves both engine flavors; tests keep a second `Arc` to script and
/// inspect it.
#[derive(Default)]
pub struct MemoryBackend {
    pub functions: MemoryStore<FunctionCall>,
    pub contacts: MemoryStore<HumanContact>,
}

impl MemoryBackend {
    pub fn shared() -> Arc<Self> {
        init_tracing();
        Arc::new(Self::default())
    }
}

/// Echo the posted request back, the way the real backend acknowledges a
/// newly created call.
pub struct EchoJson;

impl wiremock::Respond for EchoJson {
    fn respond(&self, request: &wiremock::Request) -> wiremock::ResponseTemplate {
        wiremock::ResponseTemplate::new(200).set_body_raw(request.body.clone(), "application/json")
    }
}

/// Serve `pending` until `after` polls have happened, then serve `resolved`.
pub struct ResolveAfter {
    hits: AtomicUsize,
    after: usize,
    pending: serde_json::Value,
    resolved: serde_json::Value,
}

impl ResolveAfter {
    pub fn new(after: usize, pending: serde_json::Value, resolved: serde_json::Value) -> Self {
        Self {
            hits: AtomicUsize::new(0),
            after,
            pending,
            resolved,
        }
    }
}

impl wiremock::Respond for ResolveAfter {
    fn respond(&self, _request: &wiremock::Request) -> wiremock::ResponseTemplate {
        let hit = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
        if hit >= self.after {
            wiremock::ResponseTemplate::new(200).set_body_json(&self.resolved)
        } else {
            wiremock::ResponseTemplate::new(200).set_body_json(&self.pending)
        }
    }
}

/// Route engine logs through the test harness; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl AgentBackend for MemoryBackend {
    fn functions(&self) -> &dyn AgentStore<FunctionCall, FunctionCallStatus> {
        &self.functions
    }

    fn contacts(&self) -> &dyn AgentStore<HumanContact, HumanContactStatus> {
        &self.contacts
    }
}

impl BlockingAgentBackend for MemoryBackend {
    fn functions(&self) -> &dyn BlockingAgentStore<FunctionCall, FunctionCallStatus> {
        &self.functions
    }

    fn contacts(&self) -> &dyn BlockingAgentStore<HumanContact, HumanContactStatus> {
        &self.contacts
    }
}
