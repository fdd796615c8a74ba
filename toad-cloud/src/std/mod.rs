use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use embedded_time::rate::Fraction;

use crate::net::{Connect, Proto, Socket, Tls};

/// DTLS sessions on top of `openssl`
#[cfg(feature = "dtls")]
#[cfg_attr(any(docsrs, feature = "docs"), doc(cfg(feature = "dtls")))]
pub mod secure;

/// implementor of [`crate::platform::PlatformTypes`] for
/// platforms that support `std`, speaking plain CoAP over UDP.
#[derive(Clone, Copy, Debug)]
pub struct PlatformTypes;

impl crate::platform::PlatformTypes for PlatformTypes {
  type Clock = Clock;
  type Connect = Udp;
}

/// Implement [`embedded_time::Clock`] using [`std::time`] primitives
#[derive(Debug, Clone, Copy)]
pub struct Clock(std::time::Instant);

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock {
  /// Create a new clock
  pub fn new() -> Self {
    Self(std::time::Instant::now())
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  // microseconds
  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

  fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
    let now = std::time::Instant::now();
    let elapsed = now.duration_since(self.0);
    Ok(embedded_time::Instant::new(elapsed.as_micros() as u64))
  }
}

pub(crate) fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}

/// Resolve `host` and bind a non-blocking UDP socket `connect`ed to it
pub(crate) fn connected_udp(host: &str) -> io::Result<UdpSocket> {
  let remote = host.to_socket_addrs()?
                   .next()
                   .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} did not resolve", host)))?;

  let local: SocketAddr = match remote {
    | SocketAddr::V4(_) => ([0u8, 0, 0, 0], 0).into(),
    | SocketAddr::V6(_) => ([0u16, 0, 0, 0, 0, 0, 0, 0], 0).into(),
  };

  let sock = UdpSocket::bind(local)?;
  sock.connect(remote)?;
  sock.set_nonblocking(true)?;

  log::debug!("udp {} -> {}", sock.local_addr()?, remote);
  Ok(sock)
}

/// Plain-UDP [`Connect`]or
///
/// ```no_run
/// use toad_cloud::net::{Connect, Tls};
/// use toad_cloud::std::Udp;
///
/// let sock = Udp::new("coap.example.com:5683").open(&Tls::default()).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Udp {
  host: String,
}

impl Udp {
  /// Create a connector for `host` (`"hostname:port"` or a socket address)
  pub fn new(host: impl ToString) -> Self {
    Self { host: host.to_string() }
  }

  /// The host this connector opens sessions to
  pub fn host(&self) -> &str {
    &self.host
  }
}

impl Connect for Udp {
  type Socket = UdpSocket;
  type Error = io::Error;

  fn open(&self, tls: &Tls) -> io::Result<UdpSocket> {
    if tls.count() > 0 {
      log::warn!("plain udp ignores {} credential tag(s)", tls.count());
    }

    connected_udp(&self.host)
  }

  fn proto(&self) -> Proto {
    Proto::Udp
  }
}

impl Socket for UdpSocket {
  type Error = io::Error;

  fn send(&self, msg: &[u8]) -> nb::Result<(), Self::Error> {
    UdpSocket::send(self, msg).map(|_| ()).map_err(io_to_nb)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
    UdpSocket::recv(self, buffer).map_err(io_to_nb)
  }
}
