use core::fmt::Debug;

use crate::net::Connect;
use crate::time::Clock;

/// Bundles the types a [`Client`](crate::client::Client) is generic over
///
/// ```
/// use toad_cloud::client::Client;
/// use toad_cloud::config::Config;
/// use toad_cloud::net::Tls;
/// use toad_cloud::std::{Clock, PlatformTypes as Std, Udp};
///
/// let client = Client::<Std>::new(Config::default(),
///                                 Clock::new(),
///                                 Udp::new("127.0.0.1:5683"),
///                                 Tls::default());
/// assert!(!client.is_connected());
/// ```
pub trait PlatformTypes: Sized + 'static + Debug {
  /// What should we use to keep track of time?
  type Clock: Clock + Send + Sync;

  /// What should we use to open transport sessions?
  type Connect: Connect;
}

/// The socket type produced by a platform's connector
pub type Socket<P> = <<P as PlatformTypes>::Connect as Connect>::Socket;
