use core::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use toad_cloud_msg::ContentFormat;

/// Errors encounterable (de)serializing RPC & settings bodies
#[derive(Debug)]
pub enum Error {
  /// JSON was malformed or did not match the expected shape
  Json(serde_json::Error),
  /// CBOR was malformed or did not match the expected shape
  Cbor(serde_cbor::Error),
  /// The body is in a format we can't read
  UnsupportedFormat(ContentFormat),
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      | Error::Json(e) => write!(f, "json: {}", e),
      | Error::Cbor(e) => write!(f, "cbor: {}", e),
      | Error::UnsupportedFormat(cf) => write!(f, "unsupported content format {:?}", cf),
    }
  }
}

impl std::error::Error for Error {}

/// Deserialize a body of the given Content-Format
///
/// ```
/// use serde_json::{json, Value};
/// use toad_cloud::payload;
/// use toad_cloud_msg::ContentFormat;
///
/// let v: Value = payload::decode(ContentFormat::Json, br#"{"id": "1"}"#).unwrap();
/// assert_eq!(v, json!({"id": "1"}));
/// ```
pub fn decode<T: DeserializeOwned>(format: ContentFormat, bytes: &[u8]) -> Result<T, Error> {
  match format {
    | ContentFormat::Json => serde_json::from_slice(bytes).map_err(Error::Json),
    | ContentFormat::Cbor => serde_cbor::from_slice(bytes).map_err(Error::Cbor),
    | other => Err(Error::UnsupportedFormat(other)),
  }
}

/// Serialize a body in the given Content-Format
pub fn encode<T: Serialize>(format: ContentFormat, value: &T) -> Result<Vec<u8>, Error> {
  match format {
    | ContentFormat::Json => serde_json::to_vec(value).map_err(Error::Json),
    | ContentFormat::Cbor => serde_cbor::to_vec(value).map_err(Error::Cbor),
    | other => Err(Error::UnsupportedFormat(other)),
  }
}
