//! Session worker wire protocol
//!
//! Every message in either direction is one JSON object on its own line:
//!
//! ```text
//! → {"type":"SAVE","payload":{"version":"9f2c…","data":{…}}}
//! ← {"type":"SAVE_CALLBACK","payload":{"version":"9f2c…","data":{…}}}
//! ← {"type":"SAVE_SUCCESS","payload":{"version":"9f2c…","data":{"id":"abc"}}}
//! ← {"type":"STATE","payload":{…session state…}}
//! ```
//!
//! Correlated requests carry a `version` token; fire-and-forget messages
//! (`SEND_CODE`, `SET_*`) do not.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use snack_core::events::{DeviceLog, PresenceEvent, RuntimeError, SessionEvent};
use snack_core::prelude::*;
use snack_core::{RemoteError, SessionFiles, SessionState};

// ─────────────────────────────────────────────────────────
// Message Types
// ─────────────────────────────────────────────────────────

pub const INIT: &str = "INIT";
pub const START: &str = "START";
pub const SAVE: &str = "SAVE";
pub const UPLOAD_ASSET: &str = "UPLOAD_ASSET";
pub const SYNC_DEPENDENCIES: &str = "SYNC_DEPENDENCIES";
pub const SEND_CODE: &str = "SEND_CODE";

pub const READY: &str = "READY";
pub const STATE: &str = "STATE";
pub const PRESENCE: &str = "PRESENCE";
pub const ERROR: &str = "ERROR";
pub const LOG: &str = "LOG";
pub const CHANNEL: &str = "CHANNEL";

const SUCCESS_SUFFIX: &str = "_SUCCESS";
const ERROR_SUFFIX: &str = "_ERROR";
const CALLBACK_SUFFIX: &str = "_CALLBACK";

/// Session properties settable with a fire-and-forget `SET_*` message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    SdkVersion,
    User,
    Name,
    Description,
    DeviceId,
}

impl Property {
    pub fn message_type(&self) -> &'static str {
        match self {
            Property::SdkVersion => "SET_SDK_VERSION",
            Property::User => "SET_USER",
            Property::Name => "SET_NAME",
            Property::Description => "SET_DESCRIPTION",
            Property::DeviceId => "SET_DEVICE_ID",
        }
    }
}

// ─────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub data: Value,
}

/// A message written to the worker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: OutboundPayload,
}

impl OutboundMessage {
    /// A correlated request
    pub fn request(message_type: impl Into<String>, version: String, data: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload: OutboundPayload {
                version: Some(version),
                data,
            },
        }
    }

    /// A fire-and-forget message
    pub fn notify(message_type: impl Into<String>, data: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload: OutboundPayload {
                version: None,
                data,
            },
        }
    }

    pub fn set_property(property: Property, value: Value) -> Self {
        Self::notify(property.message_type(), value)
    }

    pub fn version(&self) -> Option<&str> {
        self.payload.version.as_deref()
    }

    /// Serialise to a single line, without the trailing newline.
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `SEND_CODE` payload for a file map.
pub fn send_code_payload(files: &SessionFiles) -> Value {
    json!({ "files": files })
}

/// `UPLOAD_ASSET` payload. The bytes travel base64 encoded.
pub fn upload_asset_payload(name: &str, bytes: &[u8]) -> Value {
    json!({
        "name": name,
        "encoding": "base64",
        "contents": BASE64.encode(bytes),
    })
}

/// Uri from an `UPLOAD_ASSET_SUCCESS`: either the string or `{ "uri": .. }`.
pub fn parse_upload_result(data: &Value) -> Result<String> {
    data.as_str()
        .or_else(|| data.get("uri").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| Error::protocol("UPLOAD_ASSET response without a uri"))
}

// ─────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    payload: Value,
}

/// How a correlated request was settled
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(RemoteError),
}

impl Outcome {
    pub fn into_result(self) -> Result<Value> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(remote) => Err(Error::Remote(remote)),
        }
    }
}

/// A parsed message from the worker
#[derive(Debug)]
pub enum InboundMessage {
    /// The worker is listening; sent once
    Ready,
    /// Settles the request identified by `version`
    Response {
        request_type: String,
        version: String,
        outcome: Outcome,
    },
    /// Progress for the request identified by `version`
    Callback {
        request_type: String,
        version: String,
        data: Value,
    },
    /// Unsolicited push
    Push(SessionEvent),
    /// Well-formed but not part of the vocabulary
    Unknown(String),
}

/// Parse one line from the worker.
///
/// Returns an error only for lines that are not a `{type, payload}` object
/// or whose push payload does not match its type.
pub fn parse_inbound(line: &str) -> Result<InboundMessage> {
    let raw: RawMessage = serde_json::from_str(line)?;
    let message_type = raw.message_type.as_str();

    if message_type == READY {
        return Ok(InboundMessage::Ready);
    }

    if let Some(message) = parse_correlated(message_type, &raw.payload) {
        return Ok(message);
    }

    let event = match message_type {
        STATE => SessionEvent::State(Box::new(serde_json::from_value::<SessionState>(
            raw.payload,
        )?)),
        PRESENCE => SessionEvent::Presence(serde_json::from_value::<PresenceEvent>(raw.payload)?),
        ERROR => SessionEvent::Error(parse_runtime_errors(raw.payload)?),
        LOG => SessionEvent::Log(serde_json::from_value::<DeviceLog>(raw.payload)?),
        CHANNEL => SessionEvent::Channel(parse_channel(&raw.payload)?),
        _ => return Ok(InboundMessage::Unknown(raw.message_type)),
    };

    Ok(InboundMessage::Push(event))
}

fn parse_correlated(message_type: &str, payload: &Value) -> Option<InboundMessage> {
    let version = payload.get("version")?.as_str()?.to_string();
    let data = payload.get("data").cloned().unwrap_or(Value::Null);

    if let Some(request_type) = message_type.strip_suffix(SUCCESS_SUFFIX) {
        return Some(InboundMessage::Response {
            request_type: request_type.to_string(),
            version,
            outcome: Outcome::Success(data),
        });
    }
    if let Some(request_type) = message_type.strip_suffix(ERROR_SUFFIX) {
        return Some(InboundMessage::Response {
            request_type: request_type.to_string(),
            version,
            outcome: Outcome::Failure(RemoteError::from_payload(&data)),
        });
    }
    if let Some(request_type) = message_type.strip_suffix(CALLBACK_SUFFIX) {
        return Some(InboundMessage::Callback {
            request_type: request_type.to_string(),
            version,
            data,
        });
    }
    None
}

/// `ERROR` carries either a bare list or `{ "errors": [...] }`.
fn parse_runtime_errors(payload: Value) -> Result<Vec<RuntimeError>> {
    let list = match payload {
        Value::Object(mut map) => map.remove("errors").unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    Ok(serde_json::from_value(list)?)
}

/// `CHANNEL` carries either the id itself or `{ "channel": id }`.
fn parse_channel(payload: &Value) -> Result<String> {
    payload
        .as_str()
        .or_else(|| payload.get("channel").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| Error::protocol("CHANNEL push without a channel id"))
}
