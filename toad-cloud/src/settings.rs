//! Remote settings pushed from the cloud.
//!
//! The cloud publishes the device's settings on the `.c` resource as
//! `{"version": <i64>, "settings": {<key>: <value>, ..}}`. Each entry is pushed
//! through the registered callback, and entries it did not accept are reported
//! back on `.c/status`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Resource the cloud publishes settings on
pub const PATH: &str = ".c";

/// Resource setting errors are reported to
pub const STATUS_PATH: &str = ".c/status";

/// Longest setting key the cloud will ever send; longer keys are rejected
/// with [`Status::KeyNotValid`] without reaching the callback.
pub const MAX_KEY_LEN: usize = 15;

/// A setting value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  /// Boolean
  Bool(bool),
  /// Integer
  Int(i64),
  /// Floating-point
  Float(f64),
  /// String
  String(String),
}

/// Outcome of applying one setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Status {
  /// Setting applied
  Success = 0,
  /// This device does not know the key
  KeyNotRecognized = 1,
  /// The key is malformed (e.g. too long)
  KeyNotValid = 2,
  /// The value has the wrong type
  ValueFormatNotValid = 3,
  /// The value is outside the accepted range
  ValueOutsideRange = 4,
  /// The string value is too long
  ValueStringTooLong = 5,
  /// Anything else
  GeneralError = 6,
}

/// A push arrived before any callback was registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uninitialized;

impl core::fmt::Display for Uninitialized {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "no settings callback registered")
  }
}

impl std::error::Error for Uninitialized {}

type Callback = Arc<dyn Fn(&str, &Value) -> Status + Send + Sync>;

/// Single-callback channel for settings pushed from the cloud
///
/// ```
/// use toad_cloud::settings::{Channel, Status, Uninitialized, Value};
///
/// let channel = Channel::default();
/// assert_eq!(channel.on_push("LOOP_DELAY_S", &Value::Int(10)), Err(Uninitialized));
///
/// channel.register(|key, value| match (key, value) {
///          | ("LOOP_DELAY_S", Value::Int(s)) if (1..=60).contains(s) => Status::Success,
///          | ("LOOP_DELAY_S", Value::Int(_)) => Status::ValueOutsideRange,
///          | ("LOOP_DELAY_S", _) => Status::ValueFormatNotValid,
///          | _ => Status::KeyNotRecognized,
///        });
///
/// assert_eq!(channel.on_push("LOOP_DELAY_S", &Value::Int(10)), Ok(Status::Success));
/// assert_eq!(channel.on_push("LOOP_DELAY_S", &Value::Int(0)), Ok(Status::ValueOutsideRange));
/// ```
#[derive(Default)]
pub struct Channel {
  callback: Mutex<Option<Callback>>,
}

impl core::fmt::Debug for Channel {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Channel")
     .field("initialized", &self.is_initialized())
     .finish()
  }
}

impl Channel {
  /// Register the settings callback, replacing any previous one
  pub fn register<F>(&self, f: F)
    where F: Fn(&str, &Value) -> Status + Send + Sync + 'static
  {
    let mut cb = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
    if cb.is_some() {
      log::debug!("settings: replacing callback");
    }
    *cb = Some(Arc::new(f));
  }

  /// Has a callback been registered?
  pub fn is_initialized(&self) -> bool {
    self.callback
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
  }

  /// Push one setting through the callback.
  ///
  /// The callback runs with the channel's lock released.
  pub fn on_push(&self, key: &str, value: &Value) -> Result<Status, Uninitialized> {
    let cb = self.callback
                 .lock()
                 .unwrap_or_else(PoisonError::into_inner)
                 .clone()
                 .ok_or(Uninitialized)?;

    if key.len() > MAX_KEY_LEN {
      log::warn!("settings: key {:?} longer than {} bytes", key, MAX_KEY_LEN);
      return Ok(Status::KeyNotValid);
    }

    Ok(cb(key, value))
  }

  /// Apply every entry of a settings document,
  /// yielding the report to send back (if anything failed).
  pub(crate) fn apply(&self, doc: &Document) -> Result<Option<Report>, Uninitialized> {
    let mut errors = Vec::new();

    for (key, value) in doc.settings.iter() {
      let status = self.on_push(key, value)?;
      log::trace!("settings: {} = {:?} -> {:?}", key, value, status);

      if status != Status::Success {
        errors.push(ReportEntry { setting_key: key.clone(),
                                  error_code: status as u8 });
      }
    }

    if errors.is_empty() {
      Ok(None)
    } else {
      Ok(Some(Report { version: doc.version,
                       errors }))
    }
  }
}

/// Body of a settings notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  /// Version of this set of settings
  pub version: i64,
  /// Key / value pairs
  #[serde(default)]
  pub settings: BTreeMap<String, Value>,
}

/// Body reported to [`STATUS_PATH`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
  /// Version of the settings this reports on
  pub version: i64,
  /// Settings that were not applied
  pub errors: Vec<ReportEntry>,
}

/// One rejected setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
  /// Key of the setting
  pub setting_key: String,
  /// [`Status`] as a number
  pub error_code: u8,
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[test]
  fn push_before_register_is_uninitialized() {
    let channel = Channel::default();
    assert!(!channel.is_initialized());
    assert_eq!(channel.on_push("A", &Value::Bool(true)), Err(Uninitialized));
  }

  #[test]
  fn register_replaces() {
    let channel = Channel::default();
    channel.register(|_, _| Status::GeneralError);
    channel.register(|_, _| Status::Success);

    assert!(channel.is_initialized());
    assert_eq!(channel.on_push("A", &Value::Bool(true)), Ok(Status::Success));
  }

  #[test]
  fn long_keys_never_reach_callback() {
    let calls = Arc::new(AtomicUsize::new(0));
    let channel = Channel::default();
    channel.register({
                       let calls = calls.clone();
                       move |_, _| {
                         calls.fetch_add(1, Ordering::SeqCst);
                         Status::Success
                       }
                     });

    assert_eq!(channel.on_push("A_KEY_THAT_IS_TOO_LONG", &Value::Int(1)),
               Ok(Status::KeyNotValid));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(channel.on_push("EXACTLY_15_CHRS", &Value::Int(1)),
               Ok(Status::Success));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn callback_may_reenter_channel() {
    let channel = Arc::new(Channel::default());
    let inner = channel.clone();
    channel.register(move |_, _| {
             assert!(inner.is_initialized());
             Status::Success
           });

    assert_eq!(channel.on_push("A", &Value::Int(1)), Ok(Status::Success));
  }

  #[test]
  fn document_values_are_typed() {
    let doc: Document = serde_json::from_str(
      r#"{"version": 3, "settings": {"B": true, "I": -4, "F": 1.5, "S": "hi"}}"#,
    ).unwrap();

    assert_eq!(doc.version, 3);
    assert_eq!(doc.settings["B"], Value::Bool(true));
    assert_eq!(doc.settings["I"], Value::Int(-4));
    assert_eq!(doc.settings["F"], Value::Float(1.5));
    assert_eq!(doc.settings["S"], Value::String("hi".into()));
  }

  #[test]
  fn apply_reports_failures() {
    let channel = Channel::default();
    channel.register(|key, _| match key {
             | "GOOD" => Status::Success,
             | _ => Status::KeyNotRecognized,
           });

    let mut settings = BTreeMap::new();
    settings.insert("GOOD".to_string(), Value::Int(1));
    settings.insert("BAD".to_string(), Value::Int(1));
    let doc = Document { version: 7, settings };

    let report = channel.apply(&doc).unwrap().unwrap();
    assert_eq!(report,
               Report { version: 7,
                        errors: vec![ReportEntry { setting_key: "BAD".into(),
                                                   error_code: 1 }] });

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json,
               serde_json::json!({"version": 7, "errors": [{"setting_key": "BAD", "error_code": 1}]}));
  }

  #[test]
  fn apply_all_success_reports_nothing() {
    let channel = Channel::default();
    channel.register(|_, _| Status::Success);

    let doc = Document { version: 1,
                         settings: BTreeMap::new() };
    assert_eq!(channel.apply(&doc), Ok(None));
  }
}
