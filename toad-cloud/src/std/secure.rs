use std::collections::HashMap;
use std::io;
use std::net::UdpSocket;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use openssl::error::ErrorStack;
use openssl::ssl::{self,
                   ErrorCode,
                   HandshakeError,
                   SslConnector,
                   SslMethod,
                   SslOptions,
                   SslStream,
                   SslVerifyMode};
use openssl::x509::X509;

use super::connected_udp;
use crate::net::{Connect, Proto, SecTag, Socket, Tls};

/// Cipher suites offered when a pre-shared key is presented
pub const PSK_CIPHERS: &str = "PSK-AES128-GCM-SHA256:PSK-AES128-CBC-SHA256";

/// Default DTLS record MTU
pub const DEFAULT_MTU: u32 = 1280;

/// Longest a DTLS handshake may take before [`Dtls::open`] gives up
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// implementor of [`crate::platform::PlatformTypes`] for
/// platforms that support `std`, speaking CoAP over DTLS.
#[derive(Clone, Copy, Debug)]
pub struct PlatformTypes;

impl crate::platform::PlatformTypes for PlatformTypes {
  type Clock = super::Clock;
  type Connect = Dtls<Credentials>;
}

/// A credential a [`SecTag`] can refer to
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
  /// Pre-shared key & the identity to present it under
  Psk {
    /// PSK identity
    identity: String,
    /// Raw key bytes
    key: Vec<u8>,
  },
  /// PEM-encoded CA certificate used to verify the server
  CaCert(Vec<u8>),
}

impl core::fmt::Debug for Credential {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Credential::Psk { identity, .. } => f.debug_struct("Psk")
                                             .field("identity", identity)
                                             .field("key", &"<redacted>")
                                             .finish(),
      | Credential::CaCert(pem) => f.debug_tuple("CaCert").field(&pem.len()).finish(),
    }
  }
}

/// Resolves [`SecTag`]s to [`Credential`]s
pub trait CredentialStore: Send + Sync + 'static {
  /// Look up the credential stored under `tag`
  fn get(&self, tag: SecTag) -> Option<Credential>;
}

/// In-memory [`CredentialStore`]
#[derive(Debug, Clone, Default)]
pub struct Credentials(HashMap<SecTag, Credential>);

impl Credentials {
  /// Create an empty store
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a credential, replacing whatever `tag` referred to
  pub fn insert(&mut self, tag: SecTag, cred: Credential) -> &mut Self {
    self.0.insert(tag, cred);
    self
  }
}

impl CredentialStore for Credentials {
  fn get(&self, tag: SecTag) -> Option<Credential> {
    self.0.get(&tag).cloned()
  }
}

/// Errors encounterable opening a DTLS session
#[derive(Debug)]
pub enum Error {
  /// The underlying UDP socket failed
  Io(io::Error),
  /// openssl rejected the configuration
  Ssl(ErrorStack),
  /// The handshake failed or took longer than [`HANDSHAKE_TIMEOUT`]
  Handshake(String),
  /// A tag in the [`Tls`] config refers to nothing in the store
  MissingCredential(SecTag),
  /// The [`Tls`] config did not contain a usable credential
  NoCredentials,
}

impl From<io::Error> for Error {
  fn from(e: io::Error) -> Self {
    Error::Io(e)
  }
}

impl From<ErrorStack> for Error {
  fn from(e: ErrorStack) -> Self {
    Error::Ssl(e)
  }
}

/// A connected UDP socket exposed to openssl as a byte stream;
/// every `write` is one datagram.
#[derive(Debug)]
pub struct UdpStream(UdpSocket);

impl io::Write for UdpStream {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.send(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl io::Read for UdpStream {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.recv(buf)
  }
}

/// DTLS [`Connect`]or
///
/// ```no_run
/// use toad_cloud::net::{Connect, SecTag, Tls};
/// use toad_cloud::std::secure::{Credential, Credentials, Dtls};
///
/// let mut creds = Credentials::new();
/// creds.insert(SecTag(1),
///              Credential::Psk { identity: "device-id@project".into(),
///                                key: b"supersecret".to_vec() });
///
/// let dtls = Dtls::new("coap.example.com:5684", creds);
/// let sock = dtls.open(&Tls::new([SecTag(1)])).unwrap();
/// ```
#[derive(Debug)]
pub struct Dtls<S> {
  host: String,
  store: S,
  mtu: u32,
}

impl<S: CredentialStore> Dtls<S> {
  /// Create a connector for `host` (`"hostname:port"`), resolving credentials through `store`
  pub fn new(host: impl ToString, store: S) -> Self {
    Self { host: host.to_string(),
           store,
           mtu: DEFAULT_MTU }
  }

  /// Set the DTLS record MTU
  pub fn with_mtu(mut self, mtu: u32) -> Self {
    self.mtu = mtu;
    self
  }

  fn domain(&self) -> &str {
    self.host
        .rsplit_once(':')
        .map(|(domain, _port)| domain)
        .unwrap_or(&self.host)
  }

  fn connector(&self, tls: &Tls) -> Result<(SslConnector, bool), Error> {
    let creds = tls.sec_tags
                   .iter()
                   .map(|tag| self.store.get(*tag).ok_or(Error::MissingCredential(*tag)))
                   .collect::<Result<Vec<_>, _>>()?;

    let mut builder = SslConnector::builder(SslMethod::dtls())?;
    let opts = builder.options();
    builder.set_options(opts | SslOptions::NO_QUERY_MTU);

    let psk = creds.iter().find_map(|c| match c {
                            | Credential::Psk { identity, key } => Some((identity.clone(), key.clone())),
                            | _ => None,
                          });
    let cas = creds.iter()
                   .filter_map(|c| match c {
                     | Credential::CaCert(pem) => Some(pem),
                     | _ => None,
                   })
                   .map(|pem| X509::from_pem(pem))
                   .collect::<Result<Vec<_>, _>>()?;

    if psk.is_none() && cas.is_empty() {
      return Err(Error::NoCredentials);
    }

    if let Some((identity, key)) = psk {
      log::debug!("dtls: offering psk identity {}", identity);
      builder.set_cipher_list(PSK_CIPHERS)?;
      builder.set_psk_client_callback(move |_, _hint, identity_out, psk_out| {
               // identity is a NUL-terminated C string
               let id = identity.as_bytes();
               if id.len() + 1 > identity_out.len() || key.len() > psk_out.len() {
                 return Err(ErrorStack::get());
               }

               identity_out[..id.len()].copy_from_slice(id);
               identity_out[id.len()] = 0;
               psk_out[..key.len()].copy_from_slice(&key);
               Ok(key.len())
             });
    }

    let verify = !cas.is_empty();
    for ca in cas {
      builder.cert_store_mut().add_cert(ca)?;
    }

    builder.set_verify(if verify {
                         SslVerifyMode::PEER
                       } else {
                         SslVerifyMode::NONE
                       });

    Ok((builder.build(), verify))
  }

  fn handshake(&self, tls: &Tls) -> Result<SslStream<UdpStream>, Error> {
    let (connector, verify) = self.connector(tls)?;
    let sock = connected_udp(&self.host)?;

    let mut cfg = connector.configure()?;
    cfg.set_verify_hostname(verify);
    cfg.set_mtu(self.mtu)?;

    let started = Instant::now();
    let mut attempt = cfg.connect(self.domain(), UdpStream(sock));

    loop {
      match attempt {
        | Ok(stream) => break Ok(stream),
        | Err(HandshakeError::WouldBlock(mid)) => {
          if started.elapsed() > HANDSHAKE_TIMEOUT {
            break Err(Error::Handshake("timed out".into()));
          }

          std::thread::sleep(Duration::from_millis(10));
          attempt = mid.handshake();
        },
        | Err(HandshakeError::SetupFailure(e)) => break Err(Error::Ssl(e)),
        | Err(HandshakeError::Failure(mid)) => break Err(Error::Handshake(format!("{:?}", mid.error()))),
      }
    }
  }
}

impl<S: CredentialStore> Connect for Dtls<S> {
  type Socket = DtlsSocket;
  type Error = Error;

  fn open(&self, tls: &Tls) -> Result<DtlsSocket, Error> {
    let stream = self.handshake(tls)?;
    log::debug!("dtls: session established with {}", self.host);
    Ok(DtlsSocket(Mutex::new(stream)))
  }

  fn proto(&self) -> Proto {
    Proto::Dtls
  }
}

/// An established DTLS session
#[derive(Debug)]
pub struct DtlsSocket(Mutex<SslStream<UdpStream>>);

fn ssl_to_nb(e: ssl::Error) -> nb::Error<ssl::Error> {
  let would_block = e.code() == ErrorCode::WANT_READ
                    || e.code() == ErrorCode::WANT_WRITE
                    || e.io_error()
                        .map(|io| io.kind() == io::ErrorKind::WouldBlock)
                        .unwrap_or(false);

  if would_block {
    nb::Error::WouldBlock
  } else {
    nb::Error::Other(e)
  }
}

impl Socket for DtlsSocket {
  type Error = ssl::Error;

  fn send(&self, msg: &[u8]) -> nb::Result<(), Self::Error> {
    let mut stream = self.0.lock().unwrap_or_else(PoisonError::into_inner);
    stream.ssl_write(msg).map(|_| ()).map_err(ssl_to_nb)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
    let mut stream = self.0.lock().unwrap_or_else(PoisonError::into_inner);
    stream.ssl_read(buffer).map_err(ssl_to_nb)
  }

  fn close(&self) {
    let mut stream = self.0.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = stream.shutdown() {
      log::debug!("dtls: close_notify failed: {:?}", e);
    }
  }
}
