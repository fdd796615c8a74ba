use core::fmt;

use tinyvec::ArrayVec;

/// # Message Token
///
/// 0 to 8 opaque bytes chosen by the sender of a request and echoed
/// by the responder, used to correlate a response (or an Observe
/// notification) with the request that caused it.
///
/// See [RFC7252 - Token](https://datatracker.ietf.org/doc/html/rfc7252#section-5.3.1) for context
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  /// Take an arbitrary-length sequence of bytes and turn it into an opaque message token
  ///
  /// Currently uses the BLAKE2 hashing algorithm, but this may change in the future.
  ///
  /// ```
  /// use toad_cloud_msg::Token;
  ///
  /// let my_token = Token::opaque(&[0, 1, 2]);
  /// assert_eq!(my_token.as_bytes().len(), 8);
  /// ```
  pub fn opaque(data: &[u8]) -> Token {
    use blake2::digest::consts::U8;
    use blake2::{Blake2b, Digest};

    let mut digest = Blake2b::<U8>::new();
    digest.update(data);
    Token(Into::<[u8; 8]>::into(digest.finalize()).into())
  }

  /// Copy up to 8 bytes into a token, yielding `None` if `bytes` is longer than 8
  pub fn from_slice(bytes: &[u8]) -> Option<Token> {
    if bytes.len() > 8 {
      None
    } else {
      Some(Token(bytes.iter().copied().collect()))
    }
  }

  /// The raw token bytes
  pub fn as_bytes(&self) -> &[u8] {
    self.0.as_slice()
  }

  /// Is this the zero-length token?
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Debug for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Token(")?;
    self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))?;
    write!(f, ")")
  }
}
