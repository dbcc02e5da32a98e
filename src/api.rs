//! Memory and health endpoints.

use crate::capability::CapabilityContract;
use crate::{Client, Error, RequestOptions, Response, Result};
use http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Body of `GET /health`.
///
/// Only the fields the client interprets are typed; everything else the
/// server reports is kept in `extra`. Typed fields are read leniently: a
/// `null` or malformed value falls back to the field's default instead of
/// failing the whole response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall liveness flag.
    #[serde(default, deserialize_with = "lenient")]
    pub ok: bool,
    /// Memory-store backend name, e.g. `embedded` or `postgres`.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub memory_store_backend: Option<String>,
    /// Recall-side capability flags.
    #[serde(default, deserialize_with = "lenient")]
    pub memory_store_recall_capabilities: BTreeMap<String, Value>,
    /// Write-side capability flags.
    #[serde(default, deserialize_with = "lenient")]
    pub memory_store_write_capabilities: BTreeMap<String, Value>,
    /// Optional feature flags.
    #[serde(default, deserialize_with = "lenient")]
    pub memory_store_feature_capabilities: BTreeMap<String, Value>,
    /// Declared capability contracts.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub memory_store_capability_contract: Option<CapabilityContract>,
    /// Every other field of the body.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthResponse {
    /// Looks a capability up in the feature, write and recall maps, in that
    /// order. `None` means no map reports it as a boolean.
    pub fn capability_enabled(&self, capability: &str) -> Option<bool> {
        [
            &self.memory_store_feature_capabilities,
            &self.memory_store_write_capabilities,
            &self.memory_store_recall_capabilities,
        ]
        .into_iter()
        .find_map(|map| map.get(capability).and_then(Value::as_bool))
    }
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Rejects identifiers that are empty after trimming.
pub(crate) fn required_id<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{} is required", name)));
    }
    Ok(trimmed)
}

macro_rules! post_endpoints {
    ($($(#[$doc:meta])* $name:ident => [$($segment:literal),+];)+) => {
        $(
            $(#[$doc])*
            pub async fn $name<P>(&self, input: &P, options: RequestOptions) -> Result<Response<Value>>
            where
                P: Serialize + ?Sized,
            {
                self.execute(Method::POST, &[$($segment),+], Some(input), options).await
            }
        )+
    };
}

pub(crate) use post_endpoints;

impl Client {
    post_endpoints! {
        /// `POST /v1/memory/write`
        write => ["v1", "memory", "write"];
        /// `POST /v1/memory/recall`
        recall => ["v1", "memory", "recall"];
        /// `POST /v1/memory/recall_text`
        recall_text => ["v1", "memory", "recall_text"];
        /// `POST /v1/memory/find`
        find => ["v1", "memory", "find"];
        /// `POST /v1/memory/sessions`
        create_session => ["v1", "memory", "sessions"];
        /// `POST /v1/memory/events`
        write_event => ["v1", "memory", "events"];
        /// `POST /v1/memory/packs/export`
        pack_export => ["v1", "memory", "packs", "export"];
        /// `POST /v1/memory/packs/import`
        pack_import => ["v1", "memory", "packs", "import"];
        /// `POST /v1/memory/rules/evaluate`
        rules_evaluate => ["v1", "memory", "rules", "evaluate"];
        /// `POST /v1/memory/tools/select`
        tools_select => ["v1", "memory", "tools", "select"];
        /// `POST /v1/memory/tools/decision`
        tools_decision => ["v1", "memory", "tools", "decision"];
        /// `POST /v1/memory/tools/feedback`
        tools_feedback => ["v1", "memory", "tools", "feedback"];
    }

    /// `GET /v1/memory/sessions/{session_id}/events`
    ///
    /// `query` is encoded as the query string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] without sending anything if
    /// `session_id` is blank.
    pub async fn list_session_events<Q>(
        &self,
        session_id: &str,
        query: Option<&Q>,
        options: RequestOptions,
    ) -> Result<Response<Value>>
    where
        Q: Serialize + ?Sized,
    {
        let session_id = required_id("session_id", session_id)?;
        self.execute(
            Method::GET,
            &["v1", "memory", "sessions", session_id, "events"],
            query,
            options,
        )
        .await
    }

    /// `GET /health`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use aionis_client::{capability, Client, RequestOptions};
    ///
    /// # async fn example() -> Result<(), aionis_client::Error> {
    /// let client = Client::builder().base_url("http://localhost:3001")?.build()?;
    /// let health = client.health(RequestOptions::default()).await?;
    ///
    /// if health.capability_enabled(capability::PACKS_EXPORT) == Some(false) {
    ///     println!("pack export is disabled on {:?}", health.memory_store_backend);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn health(&self, options: RequestOptions) -> Result<Response<HealthResponse>> {
        self.execute(Method::GET, &["health"], None::<&Value>, options)
            .await?
            .decode()
    }

    /// The capability contract advertised by `GET /health`.
    ///
    /// An absent or malformed contract yields an empty map rather than an
    /// error.
    pub async fn capability_contract(
        &self,
        options: RequestOptions,
    ) -> Result<Response<CapabilityContract>> {
        let response = self
            .execute(Method::GET, &["health"], None::<&Value>, options)
            .await?;
        Ok(response.map(|data| {
            data.get("memory_store_capability_contract")
                .cloned()
                .and_then(|contract| serde_json::from_value(contract).ok())
                .unwrap_or_default()
        }))
    }
}
