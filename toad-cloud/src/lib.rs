//! `toad-cloud` connects a device to a CoAP cloud service over UDP or DTLS.
//!
//! One [`Client`](client::Client) owns one transport session and
//! multiplexes many concurrent requests over it:
//! - requests are correlated with responses by their [`Token`](toad_cloud_msg::Token)
//! - confirmable requests are retransmitted until acknowledged
//! - every request completes exactly once: with its response, a timeout,
//!   or the reason it was abandoned (cancel, disconnect)
//! - long-lived observations deliver every notification to one callback
//!
//! On top of plain requests the client speaks two cloud conventions:
//! - **RPC**: the cloud publishes calls on an observed resource, the device
//!   dispatches them to registered methods ([`rpc`]) and reports each result
//! - **Settings**: the cloud publishes versioned key / value documents,
//!   the device applies them through one callback ([`settings`]) and
//!   reports the keys it rejected
//!
//! ## Threads
//! Any number of threads may issue requests. Exactly one thread
//! should drive the receive side with [`Client::run`](client::Client::run)
//! (or [`tick`](client::Client::tick) & [`wait`](client::Client::wait)).
//! Completion callbacks run on that thread and must not block for long.
//!
//! ## Platforms
//! The client is generic over [`PlatformTypes`](platform::PlatformTypes):
//! a clock and a way to open a transport session. [`std`] provides
//! UDP, and DTLS (feature `dtls`) over OpenSSL.

#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
// -
// style
#![allow(clippy::unused_unit)]
// -
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]

macro_rules! code {
  (rfc7252($section:literal) $name:ident = $c:literal * $d:literal) => {
    #[doc = concat!("See [RFC7252 Section ", $section, "](https://datatracker.ietf.org/doc/html/rfc7252#section-", $section, ")")]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: toad_cloud_msg::Code = toad_cloud_msg::Code::new($c, $d);
  };
  (rfc7252($section:literal) $name:ident = $newtype:tt($c:literal * $d:literal)) => {
    #[doc = concat!("See [RFC7252 Section ", $section, "](https://datatracker.ietf.org/doc/html/rfc7252#section-", $section, ")")]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: $newtype = $newtype(toad_cloud_msg::Code::new($c, $d));
  };
}

pub(crate) use code;


pub(crate) mod logging;

/// Connection to the cloud
pub mod client;

/// Runtime config
pub mod config;

/// Errors & when they happened
pub mod error;

/// Transport sessions
pub mod net;

/// JSON & CBOR bodies
pub mod payload;

/// Platform abstraction
pub mod platform;

/// Requests awaiting responses
pub mod queue;

/// requests
pub mod req;

/// responses
pub mod resp;

/// customizable retrying of fallible operations
pub mod retry;

/// Methods the cloud may call on this device
pub mod rpc;

/// Receive pipeline
pub mod rx;

/// Settings pushed by the cloud
pub mod settings;

/// `std` platform
pub mod std;

/// Time
pub mod time;
