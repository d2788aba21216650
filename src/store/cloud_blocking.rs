//! HTTP adapter for the cloud approval backend (blocking variant).
//!
//! Behaviorally identical to [`crate::store::cloud`]; the only difference is
//! that network calls block the calling thread. Do not use from inside an
//! async runtime — that is what [`crate::store::cloud::CloudConnection`] is
//! for.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config;
use crate::errors::{HandrailError, Result};
use crate::models::{
    Escalation, FunctionCall, FunctionCallStatus, HumanContact, HumanContactStatus,
};
use crate::store::{BlockingAgentBackend, BlockingAgentStore};

/// Blocking connection to the cloud store. Same resolution precedence as the
/// async variant: explicit argument > environment > default.
pub struct BlockingCloudConnection {
    client: reqwest::blocking::Client,
    api_key: String,
    api_base_url: String,
}

impl BlockingCloudConnection {
    pub fn new(api_key: Option<String>, api_base_url: Option<String>) -> Result<Self> {
        config::bootstrap_env();

        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(config::api_key_from_env)
            .ok_or(HandrailError::MissingApiKey)?;

        let api_base_url = api_base_url
            .filter(|u| !u.trim().is_empty())
            .or_else(config::api_base_from_env)
            .unwrap_or_else(|| config::DEFAULT_API_BASE.to_string());
        let api_base_url = api_base_url.trim_end_matches('/').to_string();
        Url::parse(&api_base_url).map_err(|e| {
            HandrailError::Config(format!("invalid API base url {api_base_url:?}: {e}"))
        })?;

        let client = reqwest::blocking::Client::builder()
            .timeout(config::http_timeout())
            .build()?;

        Ok(Self {
            client,
            api_key,
            api_base_url,
        })
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub(crate) fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.api_base_url, path);
        self.execute(self.client.get(&url), "GET", path)
    }

    pub(crate) fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.api_base_url, path);
        self.execute(self.client.post(&url).json(body), "POST", path)
    }

    fn execute<T: DeserializeOwned>(
        &self,
        req: reqwest::blocking::RequestBuilder,
        method: &str,
        path: &str,
    ) -> Result<T> {
        let resp = req.bearer_auth(&self.api_key).send()?;
        let status = resp.status();
        let body = resp.text()?;
        tracing::debug!(method, path, status = status.as_u16(), "backend response");

        if status == StatusCode::NOT_FOUND {
            return Err(HandrailError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(HandrailError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Blocking cloud store for approval requests.
pub struct BlockingCloudFunctionStore {
    connection: Arc<BlockingCloudConnection>,
}

impl BlockingAgentStore<FunctionCall, FunctionCallStatus> for BlockingCloudFunctionStore {
    fn add(&self, item: FunctionCall) -> Result<FunctionCall> {
        self.connection.post_json("/function_calls", &item)
    }

    fn get(&self, call_id: &str) -> Result<FunctionCall> {
        self.connection
            .get_json(&format!("/function_calls/{call_id}"))
    }

    fn respond(&self, call_id: &str, status: FunctionCallStatus) -> Result<FunctionCall> {
        self.connection
            .post_json(&format!("/agent/function_calls/{call_id}/respond"), &status)
    }

    fn escalate_email(&self, call_id: &str, escalation: Escalation) -> Result<FunctionCall> {
        self.connection.post_json(
            &format!("/agent/function_calls/{call_id}/escalate_email"),
            &escalation,
        )
    }
}

/// Blocking cloud store for human-contact requests.
pub struct BlockingCloudContactStore {
    connection: Arc<BlockingCloudConnection>,
}

impl BlockingAgentStore<HumanContact, HumanContactStatus> for BlockingCloudContactStore {
    fn add(&self, item: HumanContact) -> Result<HumanContact> {
        self.connection.post_json("/contact_requests", &item)
    }

    fn get(&self, call_id: &str) -> Result<HumanContact> {
        self.connection
            .get_json(&format!("/contact_requests/{call_id}"))
    }

    fn respond(&self, call_id: &str, status: HumanContactStatus) -> Result<HumanContact> {
        self.connection
            .post_json(&format!("/agent/human_contacts/{call_id}/respond"), &status)
    }

    fn escalate_email(&self, call_id: &str, escalation: Escalation) -> Result<HumanContact> {
        self.connection.post_json(
            &format!("/agent/human_contacts/{call_id}/escalate_email"),
            &escalation,
        )
    }
}

/// The blocking cloud backend.
pub struct BlockingCloudBackend {
    functions: BlockingCloudFunctionStore,
    contacts: BlockingCloudContactStore,
}

impl BlockingCloudBackend {
    pub fn new(connection: BlockingCloudConnection) -> Self {
        let connection = Arc::new(connection);
        Self {
            functions: BlockingCloudFunctionStore {
                connection: Arc::clone(&connection),
            },
            contacts: BlockingCloudContactStore { connection },
        }
    }
}

impl BlockingAgentBackend for BlockingCloudBackend {
    fn functions(&self) -> &dyn BlockingAgentStore<FunctionCall, FunctionCallStatus> {
        &self.functions
    }

    fn contacts(&self) -> &dyn BlockingAgentStore<HumanContact, HumanContactStatus> {
        &self.contacts
    }
}
