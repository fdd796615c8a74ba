use core::fmt;

use toad_cloud_msg::{MessageParseError, MessageToBytesError, Token};

/// The context that an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
  /// We were opening the transport session
  Connecting,
  /// We were sending a request with this token
  Sending(Token),
  /// We were polling for a message when the error occurred
  Polling,
  /// We were expiring & retransmitting pending requests
  Sweeping,
  /// No particular context
  None,
}

impl When {
  /// Construct a specific error from the context the error occurred in
  pub fn what(self, what: What) -> Error {
    Error { when: self, what }
  }
}

/// An error encounterable from within the client
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
  /// What happened?
  pub what: What,
  /// What were we doing when it happened?
  pub when: When,
}

impl Error {
  /// Is this error [`What::Decode`]?
  pub fn message_parse_error(&self) -> Option<&MessageParseError> {
    match self.what {
      | What::Decode(ref e) => Some(e),
      | _ => None,
    }
  }

  /// Does this error mean the connection is gone?
  ///
  /// ```
  /// use toad_cloud::error::{What, When};
  ///
  /// assert!(When::Polling.what(What::Transport("reset by peer".into())).is_fatal());
  /// assert!(!When::Polling.what(What::BufferOverflow { capacity: 1280 }).is_fatal());
  /// ```
  pub fn is_fatal(&self) -> bool {
    matches!(self.what, What::Transport(_) | What::Disconnected)
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.when {
      | When::Connecting => write!(f, "while connecting: {}", self.what),
      | When::Sending(token) => write!(f, "while sending {:?}: {}", token, self.what),
      | When::Polling => write!(f, "while polling: {}", self.what),
      | When::Sweeping => write!(f, "while sweeping: {}", self.what),
      | When::None => write!(f, "{}", self.what),
    }
  }
}

impl std::error::Error for Error {}

/// A contextless error with some additional debug data attached.
#[derive(Debug, Clone, PartialEq)]
pub enum What {
  /// Some socket operation failed; the connection is no longer usable.
  ///
  /// Contains the transport error rendered with `{:?}`
  Transport(String),
  /// Parsing an inbound message failed
  Decode(MessageParseError),
  /// Serializing an outbound message failed
  Encode(MessageToBytesError),
  /// An inbound datagram did not fit in the receive buffer
  BufferOverflow {
    /// Size of the receive buffer
    capacity: usize,
  },
  /// No response arrived before the request's deadline
  Timeout,
  /// The client disconnected while the request was pending
  Disconnected,
  /// The request was issued while the client was not connected
  NotConnected,
  /// The pending-request bound was reached
  QueueFull,
  /// The request was canceled by the application
  Canceled,
  /// The server rejected the message with a Reset
  Reset,
  /// The clock failed to provide timing.
  ///
  /// See [`embedded_time::clock::Error`]
  Clock,
}

impl fmt::Display for What {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      | What::Transport(e) => write!(f, "transport error: {}", e),
      | What::Decode(e) => write!(f, "malformed message: {}", e),
      | What::Encode(e) => write!(f, "could not encode message: {}", e),
      | What::BufferOverflow { capacity } => {
        write!(f, "datagram exceeded {} byte receive buffer", capacity)
      },
      | What::Timeout => write!(f, "timed out"),
      | What::Disconnected => write!(f, "disconnected"),
      | What::NotConnected => write!(f, "not connected"),
      | What::QueueFull => write!(f, "too many pending requests"),
      | What::Canceled => write!(f, "canceled"),
      | What::Reset => write!(f, "reset by server"),
      | What::Clock => write!(f, "clock error"),
    }
  }
}

impl What {
  /// Render a transport error into [`What::Transport`]
  pub fn transport<E: fmt::Debug>(e: E) -> Self {
    What::Transport(format!("{:?}", e))
  }
}

impl From<MessageParseError> for What {
  fn from(e: MessageParseError) -> Self {
    What::Decode(e)
  }
}

impl From<MessageToBytesError> for What {
  fn from(e: MessageToBytesError) -> Self {
    What::Encode(e)
  }
}

impl From<embedded_time::clock::Error> for What {
  fn from(_: embedded_time::clock::Error) -> Self {
    What::Clock
  }
}
