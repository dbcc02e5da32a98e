//! Capability negotiation.
//!
//! The service signals an unsupported or degraded optional feature with an
//! ordinary error response whose `code` is
//! [`BACKEND_CAPABILITY_UNSUPPORTED`] and whose `details` names the
//! capability. Nothing in the request core special-cases these errors;
//! callers probe for the shape with [`parse_backend_capability_error_details`]
//! (or [`ApiError::capability_details`]) and branch on the result.
//!
//! The parsers are pure: they return a normalized copy and never modify the
//! error they were given.

use crate::error::{ApiError, Error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Error code for an optional capability the backend does not support.
pub const BACKEND_CAPABILITY_UNSUPPORTED: &str = "backend_capability_unsupported";

/// Error code for a strict shadow dual-write that could not be mirrored.
pub const SHADOW_DUAL_WRITE_STRICT_FAILURE: &str = "shadow_dual_write_strict_failure";

/// Graph-backed session storage.
pub const SESSIONS_GRAPH: &str = "sessions_graph";
/// Memory pack export.
pub const PACKS_EXPORT: &str = "packs_export";
/// Memory pack import.
pub const PACKS_IMPORT: &str = "packs_import";
/// Embedding payloads in debug recall output.
pub const DEBUG_EMBEDDINGS: &str = "debug_embeddings";
/// Mirroring writes into the v2 shadow store.
pub const SHADOW_MIRROR_V2: &str = "shadow_mirror_v2";

/// How the service behaves when a capability is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// The call fails with a capability error.
    HardFail,
    /// The call succeeds in a degraded mode.
    SoftDegrade,
}

impl FailureMode {
    /// Parses the wire name; unknown names yield `None`.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "hard_fail" => Some(FailureMode::HardFail),
            "soft_degrade" => Some(FailureMode::SoftDegrade),
            _ => None,
        }
    }

    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureMode::HardFail => "hard_fail",
            FailureMode::SoftDegrade => "soft_degrade",
        }
    }
}

/// Declared contract for one optional capability, as advertised by `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityContractSpec {
    /// What happens when the capability is unavailable.
    pub failure_mode: FailureMode,
    /// Named fallbacks the service may take.
    #[serde(default)]
    pub degraded_modes: Vec<String>,
}

/// The capability-contract section of a health response, kept verbatim.
///
/// Entries are stored as raw JSON so that contracts using failure modes this
/// client does not know about are still visible; [`spec`](Self::spec) gives
/// the typed view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityContract(pub BTreeMap<String, Value>);

impl CapabilityContract {
    /// Returns `true` if the service declares a contract for `capability`.
    pub fn contains(&self, capability: &str) -> bool {
        self.0.contains_key(capability)
    }

    /// Typed contract for `capability`, if declared and well-formed.
    pub fn spec(&self, capability: &str) -> Option<CapabilityContractSpec> {
        serde_json::from_value(self.0.get(capability)?.clone()).ok()
    }

    /// Names of every declared capability.
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns `true` when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Normalized `details` of a [`BACKEND_CAPABILITY_UNSUPPORTED`] error.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityErrorDetails {
    /// The capability that was unavailable. Never empty.
    pub capability: String,
    /// Backend that reported it, e.g. `embedded` or `postgres`.
    pub backend: Option<String>,
    /// Declared failure mode, when it is one this client understands.
    pub failure_mode: Option<FailureMode>,
    /// Fallback the service took, if any.
    pub degraded_mode: Option<String>,
    /// Whether a fallback was applied.
    pub fallback_applied: Option<bool>,
    /// Every other key of the original `details` object.
    pub extra: Map<String, Value>,
}

/// Degraded modes of the shadow mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowDegradedMode {
    /// The backend has no v2 shadow store.
    CapabilityUnsupported,
    /// Mirroring was attempted and failed.
    MirrorFailed,
}

impl ShadowDegradedMode {
    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "capability_unsupported" => Some(ShadowDegradedMode::CapabilityUnsupported),
            "mirror_failed" => Some(ShadowDegradedMode::MirrorFailed),
            _ => None,
        }
    }
}

/// Normalized `details` of a [`SHADOW_DUAL_WRITE_STRICT_FAILURE`] error.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowDualWriteFailureDetails {
    /// The generic capability fields. `capability` is always
    /// [`SHADOW_MIRROR_V2`]; `extra` excludes the fields below.
    pub base: CapabilityErrorDetails,
    /// Which degraded mode applied, when recognized.
    pub degraded_mode: Option<ShadowDegradedMode>,
    /// Whether strict dual-write was requested.
    pub strict: Option<bool>,
    /// Whether the write reached the mirror.
    pub mirrored: Option<bool>,
    /// Mirror error text.
    pub error: Option<String>,
}

/// Normalizes a raw `details` value.
///
/// Returns `None` unless `details` is an object with a non-empty string
/// `capability`. Typed fields with the wrong JSON type are dropped.
pub fn parse_capability_details(details: &Value) -> Option<CapabilityErrorDetails> {
    let obj = details.as_object()?;
    let capability = obj
        .get("capability")?
        .as_str()
        .filter(|c| !c.trim().is_empty())?
        .to_string();

    let extra = obj
        .iter()
        .filter(|(k, _)| {
            !matches!(
                k.as_str(),
                "capability" | "backend" | "failure_mode" | "degraded_mode" | "fallback_applied"
            )
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Some(CapabilityErrorDetails {
        capability,
        backend: obj.get("backend").and_then(Value::as_str).map(str::to_string),
        failure_mode: obj
            .get("failure_mode")
            .and_then(Value::as_str)
            .and_then(FailureMode::from_wire),
        degraded_mode: obj
            .get("degraded_mode")
            .and_then(Value::as_str)
            .map(str::to_string),
        fallback_applied: obj.get("fallback_applied").and_then(Value::as_bool),
        extra,
    })
}

/// Recognizes a capability-negotiation error.
///
/// Returns the normalized details iff `err.code` is
/// [`BACKEND_CAPABILITY_UNSUPPORTED`] and its `details` name a capability.
/// A `None` means "this error is not a capability signal", not a failure.
///
/// # Examples
///
/// ```
/// use aionis_client::capability::{parse_backend_capability_error_details, FailureMode};
/// use aionis_client::ApiError;
/// use http::StatusCode;
/// use serde_json::json;
///
/// let err = ApiError::new(StatusCode::BAD_REQUEST, "backend_capability_unsupported", "x", "r")
///     .with_details(json!({ "capability": "packs_export", "failure_mode": "hard_fail" }));
///
/// let details = parse_backend_capability_error_details(&err).unwrap();
/// assert_eq!(details.capability, "packs_export");
/// assert_eq!(details.failure_mode, Some(FailureMode::HardFail));
/// ```
pub fn parse_backend_capability_error_details(err: &ApiError) -> Option<CapabilityErrorDetails> {
    if err.code != BACKEND_CAPABILITY_UNSUPPORTED {
        return None;
    }
    parse_capability_details(err.details.as_ref()?)
}

/// Recognizes a strict shadow dual-write failure.
///
/// Matches iff `err.code` is [`SHADOW_DUAL_WRITE_STRICT_FAILURE`] and
/// `details.capability` is [`SHADOW_MIRROR_V2`].
pub fn parse_shadow_dual_write_failure_details(
    err: &ApiError,
) -> Option<ShadowDualWriteFailureDetails> {
    if err.code != SHADOW_DUAL_WRITE_STRICT_FAILURE {
        return None;
    }
    let mut base = parse_capability_details(err.details.as_ref()?)?;
    if base.capability != SHADOW_MIRROR_V2 {
        return None;
    }

    let strict = base.extra.remove("strict").and_then(|v| v.as_bool());
    let mirrored = base.extra.remove("mirrored").and_then(|v| v.as_bool());
    let error = base
        .extra
        .remove("error")
        .and_then(|v| v.as_str().map(str::to_string));
    let degraded_mode = base
        .degraded_mode
        .as_deref()
        .and_then(ShadowDegradedMode::from_wire);

    Some(ShadowDualWriteFailureDetails {
        base,
        degraded_mode,
        strict,
        mirrored,
        error,
    })
}

/// Returns `true` if `err` is an API error carrying a capability-negotiation
/// signal.
pub fn is_backend_capability_unsupported(err: &Error) -> bool {
    err.as_api()
        .and_then(parse_backend_capability_error_details)
        .is_some()
}

impl ApiError {
    /// See [`parse_backend_capability_error_details`].
    pub fn capability_details(&self) -> Option<CapabilityErrorDetails> {
        parse_backend_capability_error_details(self)
    }

    /// See [`parse_shadow_dual_write_failure_details`].
    pub fn shadow_dual_write_details(&self) -> Option<ShadowDualWriteFailureDetails> {
        parse_shadow_dual_write_failure_details(self)
    }
}
