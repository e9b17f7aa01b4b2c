use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GatewayError;

pub const WELCOME_MESSAGE: &str = "Welcome to Edge Runtime File Server";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Copy,
    Write,
    Read,
    Remove,
    #[default]
    #[serde(other)]
    None,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Copy => "copy",
            Action::Write => "write",
            Action::Read => "read",
            Action::Remove => "remove",
            Action::None => "none",
        }
    }
}

/// Whether a `write` carries its payload inline or points at a local file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Data,
    #[default]
    #[serde(other)]
    Local,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileActionRequest {
    pub action: Action,
    pub file: String,
    pub destination: Option<String>,
    pub source: SourceMode,
}

impl FileActionRequest {
    /// Decodes a raw body. Anything that is not a well-formed request object
    /// falls back to the default no-op request instead of failing. Arrays are
    /// refused up front since serde would otherwise read them positionally.
    pub fn decode(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// The destination, treating an empty string the same as a missing one.
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref().filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "status")]
    pub http_status: u16,
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    String,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBody {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub file: String,
}

impl DataBody {
    /// Text when the bytes are valid UTF-8, base64 blob otherwise.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => DataBody {
                kind: ContentKind::String,
                file: text,
            },
            Err(e) => DataBody {
                kind: ContentKind::Blob,
                file: STANDARD.encode(e.into_bytes()),
            },
        }
    }
}

/// The envelope returned for every request outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileActionResponse {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl FileActionResponse {
    pub fn ok() -> Self {
        FileActionResponse {
            status: true,
            error: None,
            data: None,
            meta: None,
        }
    }

    pub fn with_data(data: DataBody) -> Self {
        FileActionResponse {
            data: Some(data),
            ..Self::ok()
        }
    }

    pub fn welcome() -> Self {
        let mut meta = Map::new();
        meta.insert("message".to_string(), Value::from(WELCOME_MESSAGE));
        FileActionResponse {
            meta: Some(meta),
            ..Self::ok()
        }
    }

    pub fn failure(err: &GatewayError) -> Self {
        FileActionResponse {
            status: false,
            error: Some(ErrorBody::from(err)),
            data: None,
            meta: None,
        }
    }

    /// Same as [`failure`](Self::failure) with the logical status overridden.
    pub fn failure_with_status(err: &GatewayError, http_status: u16) -> Self {
        FileActionResponse {
            status: false,
            error: Some(ErrorBody {
                http_status,
                ..ErrorBody::from(err)
            }),
            data: None,
            meta: None,
        }
    }
}
