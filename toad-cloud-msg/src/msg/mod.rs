use crate::from_bytes::TryConsumeBytes;
use crate::{Cursor, TryFromBytes};

mod code;
mod id;
mod parse_error;
mod token;
mod ty;
mod ver;

/// Message options
pub mod opt;

pub use code::*;
pub use id::*;
#[doc(inline)]
pub use opt::known::{Action, ContentFormat};
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

/// Message payload; the bytes following the payload marker
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Payload(pub Vec<u8>);

impl Payload {
  /// Get a utf8 string version of the bytes in the payload
  pub fn as_str(&self) -> Option<&str> {
    core::str::from_utf8(&self.0).ok()
  }
}

/// Struct representing the first byte of a message.
///
/// ```text
/// CoAP version
/// |
/// |  Message type (request, response, empty)
/// |  |
/// |  |  Length of token, in bytes. (4-bit integer)
/// |  |  |
/// vv vv vvvv
/// 01 00 0000
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl TryFrom<u8> for Byte1 {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    let ver = b >> 6; // bits 0 & 1
    let ty = b >> 4 & 0b11; // bits 2 & 3
    let tkl = b & 0b1111u8; // last 4 bits

    Ok(Byte1 { ver: Version(ver),
               ty: Type::try_from(ty)?,
               tkl })
  }
}

impl From<Byte1> for u8 {
  fn from(b: Byte1) -> u8 {
    let ver = b.ver.0 << 6;
    let ty = u8::from(b.ty) << 4;
    let tkl = b.tkl;

    ver | ty | tkl
  }
}

/// # `Message` struct
/// Low-level representation of a message that has been parsed from the raw binary format.
///
/// Note that `Message` is generic over the message's *role* only through its [`Code`]:
/// requests, responses and empty messages (ACK, RST, ping) share one struct.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |Ver| T |  TKL  |      Code     |          Message ID           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   Token (if any, TKL bytes) ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   Options (if any) ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |1 1 1 1 1 1 1 1|    Payload (if any) ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// See [RFC7252 - Message Details](https://datatracker.ietf.org/doc/html/rfc7252#section-3) for context
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Message {
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Token`] for details
  pub token: Token,
  /// see [`Code`] for details
  pub code: Code,
  /// Options, kept sorted by [`OptNumber`]
  pub opts: Vec<Opt>,
  /// see [`Payload`]
  pub payload: Payload,
}

impl Message {
  /// Create a new message with no options and an empty payload
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Self { id,
           ty,
           ver: Version::default(),
           token,
           code,
           opts: Vec::new(),
           payload: Payload::default() }
  }

  /// Create an empty ACK acknowledging this message
  ///
  /// ```
  /// use toad_cloud_msg::*;
  ///
  /// let req = Message::new(Type::Con, Code::new(0, 1), Id(12), Token::opaque(&[1]));
  /// let ack = req.ack();
  /// assert_eq!(ack.ty, Type::Ack);
  /// assert_eq!(ack.id, Id(12));
  /// assert!(ack.is_empty());
  /// ```
  pub fn ack(&self) -> Self {
    Self::new(Type::Ack, Code::EMPTY, self.id, Token::default())
  }

  /// Create an empty RST rejecting this message
  pub fn reset(&self) -> Self {
    Self::new(Type::Reset, Code::EMPTY, self.id, Token::default())
  }

  /// Is this an empty message (code 0.00)?
  pub fn is_empty(&self) -> bool {
    self.code == Code::EMPTY
  }

  /// Get the first value of an option
  pub fn get(&self, number: OptNumber) -> Option<&OptValue> {
    self.opts
        .iter()
        .find(|o| o.number == number)
        .map(|o| &o.value)
  }

  /// Get all values of a repeatable option, in order
  pub fn get_all(&self, number: OptNumber) -> impl Iterator<Item = &OptValue> {
    self.opts
        .iter()
        .filter(move |o| o.number == number)
        .map(|o| &o.value)
  }

  /// Add an option value, after any existing values of the same number
  pub fn add(&mut self, number: OptNumber, value: OptValue) {
    let ix = self.opts
                 .iter()
                 .position(|o| o.number > number)
                 .unwrap_or(self.opts.len());
    self.opts.insert(ix, Opt { number, value });
  }

  /// Replace all values of an option with a single value
  pub fn set(&mut self, number: OptNumber, value: OptValue) {
    self.remove(number);
    self.add(number, value);
  }

  /// Remove all values of an option, yielding whether any existed
  pub fn remove(&mut self, number: OptNumber) -> bool {
    let before = self.opts.len();
    self.opts.retain(|o| o.number != number);
    before != self.opts.len()
  }

  /// Replace the Uri-Path options with the `/`-separated segments of `path`
  ///
  /// ```
  /// use toad_cloud_msg::*;
  ///
  /// let mut msg = Message::new(Type::Con, Code::new(0, 1), Id(1), Token::default());
  /// msg.set_path("/.rpc/status");
  /// assert_eq!(msg.get_all(known::URI_PATH).count(), 2);
  /// assert_eq!(msg.path().as_deref(), Some(".rpc/status"));
  /// ```
  pub fn set_path(&mut self, path: &str) {
    self.remove(opt::known::URI_PATH);
    path.split('/')
        .filter(|s| !s.is_empty())
        .for_each(|seg| self.add(opt::known::URI_PATH, OptValue(seg.as_bytes().to_vec())));
  }

  /// The Uri-Path segments joined by `/`, if there are any and they are utf8
  pub fn path(&self) -> Option<String> {
    let segs = self.get_all(opt::known::URI_PATH)
                   .map(|v| v.as_str().ok())
                   .collect::<Option<Vec<_>>>()?;

    if segs.is_empty() {
      None
    } else {
      Some(segs.join("/"))
    }
  }

  /// Set the Content-Format option
  pub fn set_content_format(&mut self, format: ContentFormat) {
    self.set(opt::known::CONTENT_FORMAT, OptValue::uint(u16::from(format) as u32));
  }

  /// Get the Content-Format option
  pub fn content_format(&self) -> Option<ContentFormat> {
    self.uint_opt(opt::known::CONTENT_FORMAT)
        .map(|n| ContentFormat::from(n as u16))
  }

  /// Set the Accept option
  pub fn set_accept(&mut self, format: ContentFormat) {
    self.set(opt::known::ACCEPT, OptValue::uint(u16::from(format) as u32));
  }

  /// Get the Accept option
  pub fn accept(&self) -> Option<ContentFormat> {
    self.uint_opt(opt::known::ACCEPT)
        .map(|n| ContentFormat::from(n as u16))
  }

  /// Set the Observe option
  pub fn set_observe(&mut self, n: u32) {
    self.set(opt::known::OBSERVE, OptValue::uint(n));
  }

  /// Get the Observe option (register / deregister on requests, sequence number on notifications)
  pub fn observe(&self) -> Option<u32> {
    self.uint_opt(opt::known::OBSERVE)
  }

  fn uint_opt(&self, number: OptNumber) -> Option<u32> {
    self.get(number).and_then(OptValue::as_uint)
  }
}

impl<Bytes: AsRef<[u8]>> TryFromBytes<Bytes> for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: Bytes) -> Result<Self, Self::Error> {
    let mut bytes = Cursor::new(bytes);

    let Byte1 { tkl, ty, ver } = bytes.next().ok_or_else(MessageParseError::eof)?.try_into()?;

    if ver != Version(1) {
      return Err(Self::Error::UnsupportedVersion(ver.0));
    }

    if tkl > 8 {
      return Err(Self::Error::InvalidTokenLength(tkl));
    }

    let code: Code = bytes.next().ok_or_else(MessageParseError::eof)?.into();
    let id: Id = Id::try_consume_bytes(&mut bytes)?;

    let token = bytes.take_exact(tkl as usize)
                     .and_then(Token::from_slice)
                     .ok_or_else(MessageParseError::eof)?;

    let opts = Vec::<Opt>::try_consume_bytes(&mut bytes).map_err(Self::Error::OptParseError)?;

    let payload = match bytes.next() {
      | None => Payload::default(),
      | Some(_marker) if bytes.is_exhausted() => return Err(Self::Error::EmptyPayload),
      | Some(_marker) => Payload(bytes.take_until_end().to_vec()),
    };

    Ok(Message { id,
                 ty,
                 ver,
                 code,
                 token,
                 opts,
                 payload })
  }
}
