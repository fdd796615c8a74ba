use toad_cloud_msg::{Message, TryFromBytes};

use crate::config::RX_BUFFER_SIZE;
use crate::error::What;
use crate::net::Socket;

/// Stage of the current receive cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  /// Waiting for a datagram
  Idle,
  /// Pulling a datagram from the socket
  Reading,
  /// Parsing the datagram
  Decoding,
  /// Handing the message to whoever awaits it
  Dispatching,
}

/// Receive buffer & the state of the receive cycle using it.
///
/// Reused across cycles; `Idle → Reading → Decoding → Dispatching → Idle`.
/// Any failure aborts the cycle and returns to `Idle`.
#[derive(Debug)]
pub struct Rx {
  buf: Box<[u8]>,
  received: usize,
  state: State,
}

impl Default for Rx {
  fn default() -> Self {
    Self::new()
  }
}

impl Rx {
  /// Create an idle pipeline with an empty buffer of [`RX_BUFFER_SIZE`] bytes
  pub fn new() -> Self {
    Self { buf: vec![0u8; RX_BUFFER_SIZE].into_boxed_slice(),
           received: 0,
           state: State::Idle }
  }

  /// Stage of the current cycle
  pub fn state(&self) -> State {
    self.state
  }

  /// Number of bytes in the buffer from the current cycle
  pub fn received(&self) -> usize {
    self.received
  }

  fn reset(&mut self) {
    self.received = 0;
    self.state = State::Idle;
  }

  /// Read & decode one datagram.
  ///
  /// `WouldBlock` when nothing is waiting. On success the pipeline is left
  /// `Dispatching` until [`Rx::finish`].
  pub fn poll<S: Socket>(&mut self, sock: &S) -> nb::Result<Message, What> {
    self.reset();
    self.state = State::Reading;

    let n = match sock.recv(&mut self.buf[self.received..]) {
      | Ok(n) => n,
      | Err(nb::Error::WouldBlock) => {
        self.reset();
        return Err(nb::Error::WouldBlock);
      },
      | Err(nb::Error::Other(e)) => {
        self.reset();
        return Err(nb::Error::Other(What::transport(e)));
      },
    };

    // a datagram that fills the buffer may have been truncated
    if self.received + n >= self.buf.len() {
      log::warn!("rx: datagram of at least {} bytes dropped", self.buf.len());
      self.reset();
      return Err(nb::Error::Other(What::BufferOverflow { capacity: self.buf.len() }));
    }

    self.received += n;
    self.state = State::Decoding;

    match Message::try_from_bytes(&self.buf[..self.received]) {
      | Ok(msg) => {
        self.state = State::Dispatching;
        Ok(msg)
      },
      | Err(e) => {
        log::warn!("rx: dropping malformed {} byte datagram: {}", self.received, e);
        self.reset();
        Err(nb::Error::Other(What::Decode(e)))
      },
    }
  }

  /// End the current cycle
  pub fn finish(&mut self) {
    self.reset();
  }
}

#[cfg(test)]
mod tests {
  use toad_cloud_msg::{Code, Id, MessageParseError, Token, Type};

  use super::*;
  use crate::test::SockMock;

  #[test]
  fn idle_when_nothing_waiting() {
    let sock = SockMock::new();
    let mut rx = Rx::new();
    assert_eq!(rx.poll(&sock).unwrap_err(), nb::Error::WouldBlock);
    assert_eq!(rx.state(), State::Idle);
  }

  #[test]
  fn decodes_then_dispatches() {
    let sock = SockMock::new();
    let msg = Message::new(Type::Ack, Code::new(2, 5), Id(1), Token::opaque(&[1]));
    sock.push_msg(msg.clone());

    let mut rx = Rx::new();
    assert_eq!(rx.poll(&sock).unwrap(), msg);
    assert_eq!(rx.state(), State::Dispatching);
    assert!(rx.received() > 0);

    rx.finish();
    assert_eq!(rx.state(), State::Idle);
    assert_eq!(rx.received(), 0);
  }

  #[test]
  fn oversized_datagram_overflows() {
    let sock = SockMock::new();
    sock.push_bytes(vec![0x40; RX_BUFFER_SIZE + 10]);

    let mut rx = Rx::new();
    assert_eq!(rx.poll(&sock).unwrap_err(),
               nb::Error::Other(What::BufferOverflow { capacity: RX_BUFFER_SIZE }));
    assert_eq!(rx.state(), State::Idle);
    assert_eq!(rx.received(), 0);
  }

  #[test]
  fn malformed_is_recoverable() {
    let sock = SockMock::new();
    sock.push_bytes(vec![0x40, 0x01]);
    let ok = Message::new(Type::Non, Code::new(2, 5), Id(2), Token::default());
    sock.push_msg(ok.clone());

    let mut rx = Rx::new();
    assert_eq!(rx.poll(&sock).unwrap_err(),
               nb::Error::Other(What::Decode(MessageParseError::UnexpectedEndOfStream)));
    assert_eq!(rx.state(), State::Idle);

    assert_eq!(rx.poll(&sock).unwrap(), ok);
  }

  #[test]
  fn transport_error() {
    let sock = SockMock::new();
    sock.fail_recv.store(true, std::sync::atomic::Ordering::SeqCst);

    let mut rx = Rx::new();
    assert_eq!(rx.poll(&sock).unwrap_err(),
               nb::Error::Other(What::Transport("\"recv failed\"".into())));
  }
}
