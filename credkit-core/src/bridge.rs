//! JSON request/response dispatcher for plugin-style transports.
//!
//! Hosts that marshal calls as `(method, json)` pairs (JavaScript bridges,
//! message channels) hand them to [`CredentialBridge::handle`] and receive a
//! JSON [`Response`] envelope back:
//!
//! ```json
//! { "success": true, "result": ["alice"] }
//! { "success": false, "error": { "code": "noData", "message": "..." } }
//! ```

use std::str::FromStr;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use strum::EnumString;

use crate::error::{CredentialError, CredentialResult, ErrorCode};
use crate::policy::{SecurityLevel, SecurityStrategyName};
use crate::store::CredentialStore;
use crate::types::{Credential, CredentialOptions};

/// Outcome of a bridge call.
///
/// `Success(None)` is a void success and omits `result` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response<T> {
    /// The call succeeded.
    Success(Option<T>),
    /// The call failed.
    Failure(CredentialError),
}

impl<T> Response<T> {
    /// Wraps a value-returning result.
    pub fn value(result: CredentialResult<T>) -> Self {
        match result {
            Ok(value) => Self::Success(Some(value)),
            Err(error) => Self::Failure(error),
        }
    }

    /// Whether the call succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl Response<()> {
    /// Wraps a void result.
    pub fn void(result: CredentialResult<()>) -> Self {
        match result {
            Ok(()) => Self::Success(None),
            Err(error) => Self::Failure(error),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: ErrorCode,
    message: &'a str,
}

impl<T: Serialize> Serialize for Response<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(result) => {
                let mut state = serializer.serialize_struct("Response", 2)?;
                state.serialize_field("success", &true)?;
                match result {
                    Some(value) => state.serialize_field("result", value)?,
                    None => state.skip_field("result")?,
                }
                state.end()
            }
            Self::Failure(error) => {
                let message = error.to_string();
                let mut state = serializer.serialize_struct("Response", 2)?;
                state.serialize_field("success", &false)?;
                state.serialize_field(
                    "error",
                    &ErrorBody {
                        code: error.code(),
                        message: &message,
                    },
                )?;
                state.end()
            }
        }
    }
}

/// Methods understood by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum BridgeMethod {
    /// `{service, credential, options?}` -> void
    SetCredential,
    /// `{service, username}` -> `{username, password}`
    GetCredential,
    /// `{service}` -> `string[]`
    GetUsernames,
    /// `{service, username}` -> void
    RemoveCredential,
    /// `{service}` -> void
    RemoveCredentials,
    /// `{}` -> `[{name, level, biometrics}]`
    AvailableSecurityStrategies,
    /// `{}` -> level rank
    MaximumSecurityLevel,
    /// `{}` -> `{face, fingerprint, iris}`
    SupportedBiometricSensors,
    /// `{service}` -> `{restored, pruned}`
    Reconcile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    service: Option<String>,
    username: Option<String>,
    credential: Option<CredentialPayload>,
    options: Option<OptionsPayload>,
}

#[derive(Debug, Deserialize)]
struct CredentialPayload {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsPayload {
    security_level: Option<LevelPayload>,
    strategy: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LevelPayload {
    Rank(u8),
    Name(String),
}

impl LevelPayload {
    fn resolve(&self) -> CredentialResult<SecurityLevel> {
        match self {
            Self::Rank(rank) => SecurityLevel::from_rank(*rank).ok_or_else(|| {
                CredentialError::params(
                    "options.securityLevel",
                    format!("unrecognized level rank {rank}"),
                )
            }),
            Self::Name(name) => SecurityLevel::parse(name),
        }
    }
}

fn field(value: Option<String>, name: &str) -> CredentialResult<String> {
    value.ok_or_else(|| CredentialError::params(name, "is required"))
}

impl Request {
    fn parse(payload: &str) -> CredentialResult<Self> {
        if payload.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(payload)
            .map_err(|e| CredentialError::params("payload", format!("malformed request: {e}")))
    }

    fn service(&mut self) -> CredentialResult<String> {
        field(self.service.take(), "service")
    }

    fn username(&mut self) -> CredentialResult<String> {
        field(self.username.take(), "username")
    }

    fn credential(&mut self) -> CredentialResult<Credential> {
        let payload = self
            .credential
            .take()
            .ok_or_else(|| CredentialError::params("credential", "is required"))?;
        Ok(Credential {
            username: field(payload.username, "credential.username")?,
            password: field(payload.password, "credential.password")?,
        })
    }

    fn options(&mut self) -> CredentialResult<Option<CredentialOptions>> {
        let Some(options) = self.options.take() else {
            return Ok(None);
        };
        Ok(Some(CredentialOptions {
            security_level: options
                .security_level
                .as_ref()
                .map(LevelPayload::resolve)
                .transpose()?,
            strategy: options
                .strategy
                .as_deref()
                .map(SecurityStrategyName::parse)
                .transpose()?,
        }))
    }
}

/// Dispatches JSON-encoded calls to a [`CredentialStore`].
#[derive(Debug, uniffi::Object)]
pub struct CredentialBridge {
    store: Arc<CredentialStore>,
}

impl CredentialBridge {
    /// Executes `method` with a JSON `payload` and returns the envelope.
    ///
    /// Unknown methods and malformed payloads produce a `params` failure
    /// without touching the vault.
    #[must_use]
    pub fn dispatch(&self, method: &str, payload: &str) -> serde_json::Value {
        let Ok(parsed) = BridgeMethod::from_str(method) else {
            return encode(&Response::<()>::Failure(CredentialError::params(
                "method",
                format!("unknown method '{method}'"),
            )));
        };
        let request = match Request::parse(payload) {
            Ok(request) => request,
            Err(error) => return encode(&Response::<()>::Failure(error)),
        };
        log::debug!("bridge call {parsed:?}");
        self.call(parsed, request)
    }

    fn call(&self, method: BridgeMethod, mut request: Request) -> serde_json::Value {
        let store = self.store.as_ref();
        match method {
            BridgeMethod::SetCredential => {
                encode(&Response::void(set_credential(store, &mut request)))
            }
            BridgeMethod::GetCredential => {
                encode(&Response::value(get_credential(store, &mut request)))
            }
            BridgeMethod::GetUsernames => encode(&Response::value(
                request.service().and_then(|service| store.list(&service)),
            )),
            BridgeMethod::RemoveCredential => {
                encode(&Response::void(remove_credential(store, &mut request)))
            }
            BridgeMethod::RemoveCredentials => encode(&Response::void(
                request
                    .service()
                    .and_then(|service| store.remove_all(&service)),
            )),
            BridgeMethod::AvailableSecurityStrategies => {
                encode(&Response::value(Ok(store.available_security_strategies())))
            }
            BridgeMethod::MaximumSecurityLevel => {
                encode(&Response::value(Ok(store.maximum_security_level())))
            }
            BridgeMethod::SupportedBiometricSensors => {
                encode(&Response::value(Ok(store.supported_biometric_sensors())))
            }
            BridgeMethod::Reconcile => encode(&Response::value(
                request.service().and_then(|service| store.reconcile(&service)),
            )),
        }
    }
}

fn set_credential(store: &CredentialStore, request: &mut Request) -> CredentialResult<()> {
    let service = request.service()?;
    let credential = request.credential()?;
    let options = request.options()?;
    store.set(&service, &credential, options.as_ref())
}

fn get_credential(store: &CredentialStore, request: &mut Request) -> CredentialResult<Credential> {
    let service = request.service()?;
    let username = request.username()?;
    store.get(&service, &username)
}

fn remove_credential(store: &CredentialStore, request: &mut Request) -> CredentialResult<()> {
    let service = request.service()?;
    let username = request.username()?;
    store.remove(&service, &username)
}

fn encode<T: Serialize>(response: &Response<T>) -> serde_json::Value {
    serde_json::to_value(response).unwrap_or_else(|e| {
        serde_json::json!({
            "success": false,
            "error": { "code": ErrorCode::Unknown, "message": e.to_string() },
        })
    })
}

#[uniffi::export]
impl CredentialBridge {
    /// Creates a bridge over `store`.
    #[uniffi::constructor]
    pub const fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    /// Executes `method` with a JSON `payload` and returns the JSON envelope.
    #[allow(clippy::needless_pass_by_value)]
    pub fn handle(&self, method: String, payload: String) -> String {
        self.dispatch(&method, &payload).to_string()
    }
}
