//! Result codec - the serialization boundary between executor and client
//!
//! A host outcome crosses the boundary as a JSON adjacently-tagged union:
//!
//! ```json
//! {"outcome": "value",   "payload": <any json>}
//! {"outcome": "failure", "payload": {"kind": "not_found", "message": "..."}}
//! {"outcome": "empty"}
//! ```
//!
//! The discriminator decides how the client treats a settlement. Failures are
//! never inferred from the payload's shape, and `empty` lives in the tag rather
//! than in payload space, so no text value can be mistaken for "no value".
//! Text escaping is left to the JSON serializer, which round-trips quotes,
//! backticks, `${` and control characters byte-exactly.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ProtocolError, RemoteError, Result};
use crate::types::Encoding;

/// Host-side result of one operation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "payload", rename_all = "lowercase")]
pub enum Outcome {
    /// The operation produced a value
    Value(serde_json::Value),
    /// The operation failed
    Failure(RemoteError),
    /// The operation completed without a value
    Empty,
}

impl Outcome {
    /// Wrap any serializable value
    pub fn value<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Outcome::Value(serde_json::to_value(value)?))
    }

    /// Collapse an executor result into an outcome, tagging errors as failures
    pub fn from_result(result: Result<Outcome>) -> Self {
        match result {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Failure(RemoteError::from(&e)),
        }
    }

    /// Whether this outcome is a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Convert into what a waiting caller receives
    ///
    /// `Empty` becomes `Ok(None)`, a failure becomes [`Error::Execution`].
    pub fn into_result(self) -> Result<Option<serde_json::Value>> {
        match self {
            Outcome::Value(value) => Ok(Some(value)),
            Outcome::Empty => Ok(None),
            Outcome::Failure(remote) => Err(Error::Execution(remote)),
        }
    }
}

/// Serialize an outcome for transport to the client
pub fn encode(outcome: &Outcome) -> Result<String> {
    Ok(serde_json::to_string(outcome)?)
}

/// Strictly decode a settlement payload
///
/// Anything that is not one of the three tagged shapes is a protocol error; the
/// raw text is never passed through as a value.
pub fn decode(payload: &str) -> std::result::Result<Outcome, ProtocolError> {
    serde_json::from_str(payload).map_err(|e| ProtocolError::MalformedSettlement(e.to_string()))
}

/// Encode file bytes for transport
///
/// `Utf8` requires the bytes to be valid UTF-8 and carries them unchanged;
/// `Base64` accepts anything.
pub fn encode_content(bytes: &[u8], encoding: Encoding) -> Result<String> {
    match encoding {
        Encoding::Utf8 => Ok(String::from_utf8(bytes.to_vec())?),
        Encoding::Base64 => Ok(STANDARD.encode(bytes)),
    }
}

/// Decode transported file content back into bytes
pub fn decode_content(text: &str, encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        Encoding::Base64 => Ok(STANDARD.decode(text)?),
    }
}
