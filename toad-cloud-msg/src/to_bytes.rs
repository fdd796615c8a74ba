use core::fmt;

use tinyvec::ArrayVec;

use crate::*;

/// Trait allowing fallible conversion into bytes
pub trait TryIntoBytes {
  /// Error yielded when the conversion fails
  type Error;

  /// Try to convert into a collection of bytes
  ///
  /// ```
  /// use toad_cloud_msg::{Code, Id, Message, Payload, Token, TryIntoBytes, Type};
  ///
  /// let mut msg = Message::new(Type::Non, Code::new(2, 5), Id(0), Token::default());
  /// msg.payload = Payload(b"hi".to_vec());
  ///
  /// let bytes = msg.try_into_bytes().unwrap();
  /// assert_eq!(bytes, vec![0b_01_01_0000, 0x45, 0, 0, 0xFF, b'h', b'i']);
  /// ```
  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error>;
}

/// Errors encounterable serializing to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageToBytesError {
  /// An option's number was lower than the one before it,
  /// or further from it than a delta can express
  OptionNumberOutOfOrder {
    /// The offending option number
    number: u32,
  },
  /// An option value was longer than a length field can express
  OptionValueTooLong {
    /// The option number
    number: u32,
    /// Length of the value
    len: usize,
  },
}

impl fmt::Display for MessageToBytesError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      | Self::OptionNumberOutOfOrder { number } => {
        write!(f, "option {} cannot be expressed as a delta", number)
      },
      | Self::OptionValueTooLong { number, len } => {
        write!(f, "option {} value of {} bytes is too long", number, len)
      },
    }
  }
}

impl std::error::Error for MessageToBytesError {}

impl Message {
  /// Number of bytes this message will occupy when serialized
  pub fn get_size(&self) -> usize {
    let header_size = 4;
    let token_size = self.token.0.len();
    let payload_size = match self.payload.0.len() {
      | 0 => 0,
      | n => n + 1,
    };

    let (opts_size, _) = self.opts.iter().fold((0, OptNumber(0)), |(size, prev), o| {
                                             (size + o.get_size(prev), o.number)
                                           });

    header_size + token_size + opts_size + payload_size
  }
}

impl TryIntoBytes for Message {
  type Error = MessageToBytesError;

  fn try_into_bytes(mut self) -> Result<Vec<u8>, Self::Error> {
    // stable, so repeated options keep their relative order
    self.opts.sort_by_key(|o| o.number);

    let mut bytes = Vec::with_capacity(self.get_size());

    let byte1: u8 = Byte1 { tkl: self.token.0.len() as u8,
                            ver: self.ver,
                            ty: self.ty }.into();
    let code: u8 = self.code.into();
    let id: [u8; 2] = self.id.into();

    bytes.push(byte1);
    bytes.push(code);
    bytes.extend(id);
    bytes.extend(self.token.0);

    let mut prev = OptNumber(0);
    for opt in self.opts.iter() {
      opt.extend_bytes(prev, &mut bytes)?;
      prev = opt.number;
    }

    if !self.payload.0.is_empty() {
      bytes.push(0b11111111);
      bytes.extend(self.payload.0);
    }

    Ok(bytes)
  }
}

pub(crate) fn opt_len_or_delta(val: u16) -> (u8, Option<ArrayVec<[u8; 2]>>) {
  match val {
    | n if n >= 269 => {
      let mut bytes = ArrayVec::new();
      bytes.extend((n - 269).to_be_bytes());
      (14, Some(bytes))
    },
    | n if n >= 13 => {
      let mut bytes = ArrayVec::new();
      bytes.push((n as u8) - 13);
      (13, Some(bytes))
    },
    | n => (n as u8, None),
  }
}
