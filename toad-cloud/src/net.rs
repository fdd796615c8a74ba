use core::fmt;

/// Transport protocol a [`Connect`]or speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Proto {
  /// Plain CoAP over UDP
  Udp,
  /// CoAP over DTLS
  Dtls,
}

/// Reference to a credential held in a credential store
/// (a PSK identity & key, or a CA certificate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecTag(pub u32);

/// TLS configuration of a transport session; the credentials
/// to present, by [`SecTag`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tls {
  /// Credential tags, in the order they should be offered
  pub sec_tags: Vec<SecTag>,
}

impl Tls {
  /// Create a TLS configuration from a list of credential tags
  pub fn new(sec_tags: impl IntoIterator<Item = SecTag>) -> Self {
    Self { sec_tags: sec_tags.into_iter().collect() }
  }

  /// Number of credential tags
  pub fn count(&self) -> usize {
    self.sec_tags.len()
  }
}

/// One connected datagram endpoint.
///
/// All operations are non-blocking; implementors should yield
/// [`nb::Error::WouldBlock`] rather than block the calling thread.
///
/// The receive thread reads while application threads write, so sockets
/// are shared (`&self`) between threads.
pub trait Socket: Send + Sync + 'static {
  /// The error yielded by socket operations
  type Error: fmt::Debug;

  /// Send one datagram to the connected peer
  fn send(&self, msg: &[u8]) -> nb::Result<(), Self::Error>;

  /// Pull one buffered datagram from the socket into `buffer`,
  /// yielding the number of bytes written.
  ///
  /// It is expected that (like [`std::net::UdpSocket`]) if the datagram is larger
  /// than the buffer, the excess bytes are dropped and not considered an error condition.
  fn recv(&self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error>;

  /// Tear down the session (e.g. send a DTLS close_notify).
  ///
  /// Errors closing are not actionable; implementors should log and swallow them.
  fn close(&self) {}
}

/// Something that can open a [`Socket`] to the cloud
pub trait Connect: Send + Sync + 'static {
  /// The socket yielded by a successful [`Connect::open`]
  type Socket: Socket;

  /// The error yielded when opening fails
  type Error: fmt::Debug;

  /// Open a session, presenting the credentials referenced by `tls`
  fn open(&self, tls: &Tls) -> Result<Self::Socket, Self::Error>;

  /// Which protocol sessions opened by this connector speak
  fn proto(&self) -> Proto;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tls_counts_tags() {
    let tls = Tls::new([SecTag(1), SecTag(515765868)]);
    assert_eq!(tls.count(), 2);
    assert_eq!(Tls::default().count(), 0);
  }
}
