//! Response payloads and resolved resources.
//!
//! A data endpoint answers either with the data itself or with a `link` to
//! where the data lives. [`ResourcePayload`] captures that distinction once,
//! at parse time; [`Resource`] is what a fetch finally hands back.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use url::Url;

use crate::Result;
use crate::error::{Error, InvalidInputError, ResolutionError};

/// Key marking an indirect payload.
pub const LINK_KEY: &str = "link";

/// A parsed data-endpoint response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    /// The mapping itself is the answer.
    Direct(Map<String, Value>),
    /// The real content lives at this URL.
    Indirect(Url),
}

impl ResourcePayload {
    /// Parse a 2xx response body.
    ///
    /// The body must be a non-empty JSON object. It is indirect iff it has a
    /// `link` key; any other keys next to it are ignored.
    pub fn parse(url: &Url, body: &[u8]) -> std::result::Result<Self, ResolutionError> {
        let mut map = match decode(url, body)? {
            Value::Object(map) => map,
            other => {
                return Err(ResolutionError::MalformedBody {
                    url: url.to_string(),
                    reason: format!("expected a JSON object, got {}", kind(&other)),
                });
            }
        };

        match map.remove(LINK_KEY) {
            None => Ok(Self::Direct(map)),
            Some(Value::String(link)) => match Url::parse(&link) {
                Ok(target) => Ok(Self::Indirect(target)),
                Err(e) => Err(ResolutionError::InvalidLink {
                    link,
                    reason: e.to_string(),
                }),
            },
            Some(other) => Err(ResolutionError::InvalidLink {
                link: other.to_string(),
                reason: "link is not a string".to_string(),
            }),
        }
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self, Self::Indirect(_))
    }
}

/// Check the body downloaded from a link target.
///
/// It must be non-empty JSON, but unlike a data-endpoint answer it may be
/// any JSON value, and a `link` key inside it carries no meaning.
pub fn check_linked_body(url: &Url, body: &[u8]) -> std::result::Result<(), ResolutionError> {
    decode(url, body).map(|_| ())
}

fn decode(url: &Url, body: &[u8]) -> std::result::Result<Value, ResolutionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ResolutionError::EmptyBody {
            url: url.to_string(),
        });
    }

    serde_json::from_slice(body).map_err(|e| ResolutionError::MalformedBody {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A fully resolved resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    /// Returned directly by the data endpoint.
    Direct(Map<String, Value>),
    /// Downloaded from the link the data endpoint pointed at.
    Linked { link: Url, body: Vec<u8> },
}

impl Resource {
    /// Returns the link target, if this resource came through one.
    pub fn link(&self) -> Option<&Url> {
        match self {
            Self::Direct(_) => None,
            Self::Linked { link, .. } => Some(link),
        }
    }

    /// Decode the resource as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let decoded = match self {
            Self::Direct(map) => serde_json::from_value(Value::Object(map.clone())),
            Self::Linked { body, .. } => serde_json::from_slice(body),
        };
        decoded.map_err(|e| {
            Error::InvalidInput(InvalidInputError::Other {
                message: format!("resource is not the expected JSON: {}", e),
            })
        })
    }

    /// Decode the resource as an untyped JSON value.
    pub fn value(&self) -> Result<Value> {
        self.json()
    }

    /// Returns the raw bytes of the resource.
    ///
    /// Linked resources are returned byte for byte; direct ones are
    /// re-serialized as compact JSON.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Direct(map) => Value::Object(map.clone()).to_string().into_bytes(),
            Self::Linked { body, .. } => body.clone(),
        }
    }
}
