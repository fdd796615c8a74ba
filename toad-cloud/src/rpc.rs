//! Remote procedure calls invoked by the cloud.
//!
//! The cloud publishes calls on the `.rpc` resource as
//! `{"id": <string>, "method": <string>, "params": [..]}`; the device
//! answers on `.rpc/status` with `{"id", "statusCode", "detail"?}`.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tinyvec::ArrayVec;

/// Resource the cloud publishes calls on
pub const PATH: &str = ".rpc";

/// Resource call results are reported to
pub const STATUS_PATH: &str = ".rpc/status";

/// RPC status codes, numbered like gRPC's
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Status {
  Ok = 0,
  Canceled = 1,
  Unknown = 2,
  InvalidArgument = 3,
  DeadlineExceeded = 4,
  NotFound = 5,
  AlreadyExists = 6,
  PermissionDenied = 7,
  ResourceExhausted = 8,
  FailedPrecondition = 9,
  Aborted = 10,
  OutOfRange = 11,
  Unimplemented = 12,
  Internal = 13,
  Unavailable = 14,
  DataLoss = 15,
  Unauthenticated = 16,
}

/// Errors encounterable using the [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
  /// A method with this name is already registered
  Duplicate,
  /// The registry is at capacity
  Full,
  /// No method with this name is registered
  NotFound,
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Error::Duplicate => write!(f, "method already registered"),
      | Error::Full => write!(f, "rpc registry is full"),
      | Error::NotFound => write!(f, "method not registered"),
    }
  }
}

impl std::error::Error for Error {}

/// Handler for an RPC method.
///
/// Receives the call's params and a map to write detail into; whatever is
/// in the map when the handler returns is reported as the call's `detail`.
pub type Handler = Arc<dyn Fn(&[Value], &mut Map<String, Value>) -> Status + Send + Sync>;

#[derive(Clone, Default)]
struct Method {
  name: String,
  handler: Option<Handler>,
}

/// Fixed-capacity table of RPC methods
///
/// ```
/// use serde_json::json;
/// use toad_cloud::rpc::{Error, Registry, Status};
///
/// let rpc = Registry::<2>::default();
/// rpc.register("multiply", |params, detail| match params {
///      | [a, b] => match (a.as_f64(), b.as_f64()) {
///        | (Some(a), Some(b)) => {
///          detail.insert("value".into(), json!(a * b));
///          Status::Ok
///        },
///        | _ => Status::InvalidArgument,
///      },
///      | _ => Status::InvalidArgument,
///    })
///    .unwrap();
///
/// let (status, detail) = rpc.invoke("multiply", &[json!(3), json!(4)]).unwrap();
/// assert_eq!(status, Status::Ok);
/// assert_eq!(detail["value"], json!(12.0));
///
/// assert_eq!(rpc.invoke("divide", &[]).unwrap_err(), Error::NotFound);
/// ```
pub struct Registry<const N: usize> {
  methods: Mutex<ArrayVec<[Method; N]>>,
}

impl<const N: usize> Default for Registry<N> {
  fn default() -> Self {
    Self { methods: Mutex::new(ArrayVec::new()) }
  }
}

impl<const N: usize> core::fmt::Debug for Registry<N> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let methods = self.methods.lock().unwrap_or_else(PoisonError::into_inner);
    f.debug_struct("Registry")
     .field("capacity", &N)
     .field("methods", &methods.iter().map(|m| m.name.as_str()).collect::<Vec<_>>())
     .finish()
  }
}

impl<const N: usize> Registry<N> {
  /// Register a method.
  ///
  /// Fails with [`Error::Duplicate`] if `name` is taken and
  /// [`Error::Full`] if `N` methods are registered.
  pub fn register<F>(&self, name: impl ToString, f: F) -> Result<(), Error>
    where F: Fn(&[Value], &mut Map<String, Value>) -> Status + Send + Sync + 'static
  {
    let name = name.to_string();
    let mut methods = self.methods.lock().unwrap_or_else(PoisonError::into_inner);

    if methods.iter().any(|m| m.name == name) {
      return Err(Error::Duplicate);
    }

    if methods.len() >= N {
      return Err(Error::Full);
    }

    log::debug!("rpc: registered {} ({}/{})", name, methods.len() + 1, N);
    methods.push(Method { name,
                          handler: Some(Arc::new(f)) });
    Ok(())
  }

  /// Remove a method, yielding whether it was registered
  pub fn unregister(&self, name: &str) -> bool {
    let mut methods = self.methods.lock().unwrap_or_else(PoisonError::into_inner);
    match methods.iter().position(|m| m.name == name) {
      | Some(ix) => {
        methods.remove(ix);
        true
      },
      | None => false,
    }
  }

  /// Number of registered methods
  pub fn len(&self) -> usize {
    self.methods
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .len()
  }

  /// Are there no registered methods?
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Invoke a method.
  ///
  /// The handler runs with the registry's lock released, so handlers
  /// may (un)register methods.
  pub fn invoke(&self, name: &str, params: &[Value]) -> Result<(Status, Map<String, Value>), Error> {
    let handler = self.methods
                      .lock()
                      .unwrap_or_else(PoisonError::into_inner)
                      .iter()
                      .find(|m| m.name == name)
                      .and_then(|m| m.handler.clone())
                      .ok_or(Error::NotFound)?;

    let mut detail = Map::new();
    let status = handler(params, &mut detail);
    Ok((status, detail))
  }

  /// Handle one call from the cloud, yielding the result to report.
  ///
  /// Unknown methods are answered with [`Status::Unimplemented`].
  pub(crate) fn handle(&self, call: &Call) -> CallResult {
    match self.invoke(&call.method, &call.params) {
      | Ok((status, detail)) => {
        log::debug!("rpc: {}({} params) -> {:?}", call.method, call.params.len(), status);
        CallResult { id: call.id.clone(),
                     status_code: status as u8,
                     detail: if detail.is_empty() { None } else { Some(detail) } }
      },
      | Err(_) => {
        log::warn!("rpc: {} is not registered", call.method);
        CallResult { id: call.id.clone(),
                     status_code: Status::Unimplemented as u8,
                     detail: None }
      },
    }
  }
}

/// A call published by the cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
  /// Call id, echoed in the result
  pub id: String,
  /// Method name
  pub method: String,
  /// Positional params
  #[serde(default)]
  pub params: Vec<Value>,
}

/// Result of a call, reported to [`STATUS_PATH`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
  /// Id of the call this answers
  pub id: String,
  /// [`Status`] as a number
  #[serde(rename = "statusCode")]
  pub status_code: u8,
  /// Detail written by the handler
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub detail: Option<Map<String, Value>>,
}
