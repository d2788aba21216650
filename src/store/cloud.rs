//! HTTP adapter for the cloud approval backend (async variant).
//!
//! Owns authentication, base-URL resolution, and error translation. Every
//! non-2xx response becomes [`HandrailError::Api`] carrying the response body
//! for diagnostics.

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
use crate::store::{AgentBackend, AgentStore};

/// Connection to the cloud store. Credential and base-URL precedence:
/// explicit constructor argument > environment variable > hardcoded default.
/// Construction fails fast when no API key is resolvable.
pub struct CloudConnection {
    client: reqwest::Client,
    api_key: String,
    api_base_url: String,
}

impl CloudConnection {
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

        let client = reqwest::Client::builder()
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

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.api_base_url, path);
        self.execute(self.client.get(&url), "GET", path).await
    }

    pub(crate) async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.api_base_url, path);
        self.execute(self.client.post(&url).json(body), "POST", path)
            .await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        method: &str,
        path: &str,
    ) -> Result<T> {
        let resp = req.bearer_auth(&self.api_key).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
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

/// Cloud store for approval requests.
pub struct CloudFunctionStore {
    connection: Arc<CloudConnection>,
}

#[async_trait::async_trait]
impl AgentStore<FunctionCall, FunctionCallStatus> for CloudFunctionStore {
    async fn add(&self, item: FunctionCall) -> Result<FunctionCall> {
        self.connection.post_json("/function_calls", &item).await
    }

    async fn get(&self, call_id: &str) -> Result<FunctionCall> {
        self.connection
            .get_json(&format!("/function_calls/{call_id}"))
            .await
    }

    async fn respond(&self, call_id: &str, status: FunctionCallStatus) -> Result<FunctionCall> {
        self.connection
            .post_json(&format!("/agent/function_calls/{call_id}/respond"), &status)
            .await
    }

    async fn escalate_email(&self, call_id: &str, escalation: Escalation) -> Result<FunctionCall> {
        self.connection
            .post_json(
                &format!("/agent/function_calls/{call_id}/escalate_email"),
                &escalation,
            )
            .await
    }
}

/// Cloud store for human-contact requests.
pub struct CloudContactStore {
    connection: Arc<CloudConnection>,
}

#[async_trait::async_trait]
impl AgentStore<HumanContact, HumanContactStatus> for CloudContactStore {
    async fn add(&self, item: HumanContact) -> Result<HumanContact> {
        self.connection.post_json("/contact_requests", &item).await
    }

    async fn get(&self, call_id: &str) -> Result<HumanContact> {
        self.connection
            .get_json(&format!("/contact_requests/{call_id}"))
            .await
    }

    async fn respond(&self, call_id: &str, status: HumanContactStatus) -> Result<HumanContact> {
        self.connection
            .post_json(&format!("/agent/human_contacts/{call_id}/respond"), &status)
            .await
    }

    async fn escalate_email(&self, call_id: &str, escalation: Escalation) -> Result<HumanContact> {
        self.connection
            .post_json(
                &format!("/agent/human_contacts/{call_id}/escalate_email"),
                &escalation,
            )
            .await
    }
}

/// The cloud backend: one connection shared by both stores.
pub struct CloudBackend {
    functions: CloudFunctionStore,
    contacts: CloudContactStore,
}

impl CloudBackend {
    pub fn new(connection: CloudConnection) -> Self {
        let connection = Arc::new(connection);
        Self {
            functions: CloudFunctionStore {
                connection: Arc::clone(&connection),
            },
            contacts: CloudContactStore { connection },
        }
    }
}

impl AgentBackend for CloudBackend {
    fn functions(&self) -> &dyn AgentStore<FunctionCall, FunctionCallStatus> {
        &self.functions
    }

    fn contacts(&self) -> &dyn AgentStore<HumanContact, HumanContactStatus> {
        &self.contacts
    }
}
