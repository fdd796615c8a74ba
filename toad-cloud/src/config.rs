use embedded_time::duration::Milliseconds;

use crate::retry::{Attempts, Strategy};
use crate::time::{Millis, Timeout};

/// Maximum number of RPC methods that can be registered at once
pub const MAX_RPC_METHODS: usize = 8;

/// Capacity of the receive buffer, in bytes.
///
/// A datagram that fills the buffer entirely is treated as truncated.
pub const RX_BUFFER_SIZE: usize = 1280;

/// Configuration options related to retransmitting outbound CON requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Con {
  /// Retry strategy for CON requests that
  /// have not yet been ACKed.
  ///
  /// Defaults to an exponential retry strategy:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use toad_cloud::config::Con;
  /// use toad_cloud::retry::Strategy;
  ///
  /// assert_eq!(Con::default().unacked_retry_strategy,
  ///            Strategy::Exponential { init_min: Milliseconds(2_000),
  ///                                    init_max: Milliseconds(3_000) });
  /// ```
  pub unacked_retry_strategy: Strategy,
  /// Number of times we are allowed to send a CON request
  /// (including the first time) before giving up on an ACK.
  ///
  /// Defaults to 4 attempts.
  /// ```
  /// use toad_cloud::config::Con;
  /// use toad_cloud::retry::Attempts;
  ///
  /// assert_eq!(Con::default().max_attempts, Attempts(4));
  /// ```
  pub max_attempts: Attempts,
}

impl Default for Con {
  fn default() -> Self {
    Con { unacked_retry_strategy: Strategy::Exponential { init_min: Milliseconds(2_000),
                                                          init_max: Milliseconds(3_000) },
          max_attempts: Attempts(4) }
  }
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Config {
  /// How long a request may wait for its response before
  /// it is failed with [`What::Timeout`](crate::error::What::Timeout).
  ///
  /// Individual requests may override this with [`Req::timeout`](crate::req::Req::timeout).
  ///
  /// Defaults to 10 seconds.
  /// ```
  /// use toad_cloud::config::Config;
  /// use toad_cloud::time::Timeout;
  ///
  /// assert_eq!(Config::default().request_timeout, Timeout::Millis(10_000));
  /// ```
  pub request_timeout: Timeout,

  /// See [`Con`]
  pub con: Con,

  /// Seed used to generate message [`Token`](toad_cloud_msg::Token)s,
  /// customizable to allow for your application to generate tokens
  /// less guessably.
  ///
  /// _e.g. a fleet of devices would ideally each use a distinct seed,
  /// like a hash of the device id._
  ///
  /// ```
  /// use toad_cloud::config::Config;
  ///
  /// assert_eq!(Config::default().token_seed, 0);
  /// ```
  // token_seed
  // ||
  // xx xxxxxxxx xxxxxxxx
  //    |      | |      |
  //    timestamp counter
  pub token_seed: u16,

  /// Longest the receive thread will park between polls of the socket
  /// when no deadline is sooner.
  ///
  /// Defaults to 50 milliseconds.
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use toad_cloud::config::Config;
  ///
  /// assert_eq!(Config::default().rx_poll_interval, Milliseconds(50u64));
  /// ```
  pub rx_poll_interval: Millis,

  /// Maximum number of requests that may be pending at once.
  ///
  /// Defaults to `None` (unbounded).
  /// ```
  /// use toad_cloud::config::Config;
  ///
  /// assert_eq!(Config::default().max_pending, None);
  /// ```
  pub max_pending: Option<usize>,
}

impl Default for Config {
  fn default() -> Self {
    Config { request_timeout: Timeout::Millis(10_000),
             con: Con::default(),
             token_seed: 0,
             rx_poll_interval: Milliseconds(50),
             max_pending: None }
  }
}

impl Config {
  /// Longest a CON request can go unacknowledged before
  /// every retransmission has been spent.
  ///
  /// ```
  /// use toad_cloud::config::Config;
  ///
  /// // 3s initial (upper bound), doubled until 4 attempts are spent
  /// assert_eq!(Config::default().max_transmit_wait_millis(), 24_000);
  /// ```
  pub fn max_transmit_wait_millis(&self) -> u64 {
    self.con
        .unacked_retry_strategy
        .max_time(self.con.max_attempts)
        .0
  }
}
