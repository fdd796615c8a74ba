use super::OptNumber;

macro_rules! opt {
  (rfc7252($section:literal) $name:ident = $n:literal) => {
    #[doc = concat!("See [RFC7252 section ", $section, "](https://datatracker.ietf.org/doc/html/rfc7252#section-", $section, ")")]
    pub const $name: OptNumber = OptNumber($n);
  };
  (rfc7641($section:literal) $name:ident = $n:literal) => {
    #[doc = concat!("See [RFC7641 section ", $section, "](https://datatracker.ietf.org/doc/html/rfc7641#section-", $section, ")")]
    pub const $name: OptNumber = OptNumber($n);
  };
}

opt!(rfc7252("5.10.1") URI_HOST = 3);
opt!(rfc7641("2") OBSERVE = 6);
opt!(rfc7252("5.10.1") URI_PORT = 7);
opt!(rfc7252("5.10.1") URI_PATH = 11);
opt!(rfc7252("5.10.3") CONTENT_FORMAT = 12);
opt!(rfc7252("5.10.5") MAX_AGE = 14);
opt!(rfc7252("5.10.1") URI_QUERY = 15);
opt!(rfc7252("5.10.4") ACCEPT = 17);
opt!(rfc7252("5.10.9") SIZE1 = 60);

/// Content-Format
///
/// Only the formats a cloud client negotiates are named;
/// anything else round-trips through [`ContentFormat::Other`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContentFormat {
  /// `text/plain; charset=utf-8`
  Text,
  /// `application/octet-stream`
  OctetStream,
  /// `application/json`
  Json,
  /// `application/cbor`
  Cbor,
  /// Another content format
  Other(u16),
}

impl ContentFormat {
  /// Convert this content format to the CoAP byte value
  pub fn bytes(&self) -> [u8; 2] {
    u16::from(self).to_be_bytes()
  }
}

impl<'a> From<&'a ContentFormat> for u16 {
  fn from(f: &'a ContentFormat) -> Self {
    use ContentFormat::*;
    match *f {
      | Text => 0,
      | OctetStream => 42,
      | Json => 50,
      | Cbor => 60,
      | Other(n) => n,
    }
  }
}

impl From<ContentFormat> for u16 {
  fn from(f: ContentFormat) -> Self {
    u16::from(&f)
  }
}

impl From<u16> for ContentFormat {
  fn from(n: u16) -> Self {
    use ContentFormat::*;
    match n {
      | 0 => Text,
      | 42 => OctetStream,
      | 50 => Json,
      | 60 => Cbor,
      | n => Other(n),
    }
  }
}

/// When included in a GET request, the Observe Option extends the GET
/// method so it does not only retrieve a current representation of the
/// target resource, but also requests the server to add or remove an
/// entry in the list of observers of the resource depending on the
/// option value.
#[derive(Hash, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Action {
  /// Tells the resource owner we would like to observe updates to
  /// the resource we've issued a GET request for.
  Register,
  /// Tells the resource owner we would no longer like to observe updates to
  /// the resource we've issued a GET request for.
  Deregister,
}

impl From<Action> for u32 {
  fn from(a: Action) -> Self {
    match a {
      | Action::Register => 0,
      | Action::Deregister => 1,
    }
  }
}
