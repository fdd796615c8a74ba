use crate::from_bytes::TryConsumeBytes;
use crate::Cursor;

/// Option parsing errors
pub mod parse_error;
pub use parse_error::*;

/// Option numbers & values this crate knows about
pub mod known;

pub(crate) fn parse_opt_len_or_delta<A: AsRef<[u8]>>(head: u8,
                                                     bytes: &mut Cursor<A>,
                                                     reserved_err: OptParseError)
                                                     -> Result<u16, OptParseError> {
  match head {
    | 13 => {
      let n = bytes.next().ok_or_else(OptParseError::eof)?;
      Ok((n as u16) + 13)
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => u16::from_be_bytes([a, b]).checked_add(269)
                                                   .ok_or(OptParseError::OptionNumberOverflow),
      | _ => Err(OptParseError::eof()),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(head as u16),
  }
}

/// # Option Number
/// Identifies which Option is being set (e.g. Content-Format has a Number of 12).
///
/// On the wire options carry the delta from the previous option's number;
/// [`Opt`] stores the absolute number and the delta is computed when
/// serializing.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u32);

/// # Option Value
/// Raw bytes of an option value. Interpreting them (string, uint, opaque)
/// depends on the [`OptNumber`].
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptValue(pub Vec<u8>);

impl OptValue {
  /// Encode an unsigned integer as the shortest big-endian sequence
  /// of bytes that represents it (zero is the empty value)
  ///
  /// ```
  /// use toad_cloud_msg::OptValue;
  ///
  /// assert_eq!(OptValue::uint(0).0, Vec::<u8>::new());
  /// assert_eq!(OptValue::uint(60).0, vec![60]);
  /// assert_eq!(OptValue::uint(0x0102).0, vec![1, 2]);
  /// ```
  pub fn uint(n: u32) -> Self {
    Self(n.to_be_bytes().into_iter().skip_while(|b| *b == 0).collect())
  }

  /// Interpret this value as an unsigned integer,
  /// yielding `None` if it is longer than 4 bytes.
  pub fn as_uint(&self) -> Option<u32> {
    if self.0.len() > 4 {
      None
    } else {
      Some(self.0.iter().fold(0u32, |n, b| (n << 8) | (*b as u32)))
    }
  }

  /// Interpret this value as a utf8 string
  pub fn as_str(&self) -> Result<&str, core::str::Utf8Error> {
    core::str::from_utf8(&self.0)
  }
}

/// # `Opt` struct
/// Low-level representation of a CoAP Option; an [`OptNumber`] and [`OptValue`].
///
/// Options in a [`Message`](crate::Message) are kept sorted by number so that
/// serializing them as deltas never yields a negative delta.
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Opt {
  /// See [`OptNumber`]
  pub number: OptNumber,
  /// See [`OptValue`]
  pub value: OptValue,
}

impl Opt {
  /// Number of bytes this option will occupy when serialized
  pub fn get_size(&self, prev: OptNumber) -> usize {
    let ext_size = |n: usize| match n {
      | n if n >= 269 => 2,
      | n if n >= 13 => 1,
      | _ => 0,
    };

    let header_size = 1;
    let delta = self.number.0.saturating_sub(prev.0) as usize;

    header_size + ext_size(delta) + ext_size(self.value.0.len()) + self.value.0.len()
  }

  /// Given a collection to [`Extend`], the previous option's number and an Opt,
  /// add that Opt's bytes to the collection.
  pub fn extend_bytes(&self,
                      prev: OptNumber,
                      bytes: &mut impl Extend<u8>)
                      -> Result<(), crate::MessageToBytesError> {
    let delta = self.number
                    .0
                    .checked_sub(prev.0)
                    .and_then(|d| u16::try_from(d).ok())
                    .ok_or(crate::MessageToBytesError::OptionNumberOutOfOrder { number: self.number.0 })?;
    let len = u16::try_from(self.value.0.len()).ok()
                                               .ok_or(crate::MessageToBytesError::OptionValueTooLong { number: self.number.0,
                                                                                                      len: self.value.0.len() })?;

    let (del, del_bytes) = crate::to_bytes::opt_len_or_delta(delta);
    let (len, len_bytes) = crate::to_bytes::opt_len_or_delta(len);
    let del = del << 4;

    let header = del | len;

    bytes.extend(Some(header));

    if let Some(bs) = del_bytes {
      bytes.extend(bs);
    }

    if let Some(bs) = len_bytes {
      bytes.extend(bs);
    }

    bytes.extend(self.value.0.iter().copied());
    Ok(())
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Vec<Opt> {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let mut opts = Vec::new();
    let mut number = OptNumber(0);

    loop {
      match consume_opt(bytes, number) {
        | Ok(opt) => {
          number = opt.number;
          opts.push(opt);
        },
        | Err(OptParseError::OptionsExhausted) => break Ok(opts),
        | Err(e) => break Err(e),
      }
    }
  }
}

fn consume_opt<Bytes: AsRef<[u8]>>(bytes: &mut Cursor<Bytes>,
                                   prev: OptNumber)
                                   -> Result<Opt, OptParseError> {
  // the payload marker is left on the cursor for the message parser to see
  let byte1 = match bytes.peek_exact(1) {
    | None | Some(&[0b11111111]) => return Err(OptParseError::OptionsExhausted),
    | Some(_) => bytes.next().ok_or_else(OptParseError::eof)?,
  };

  // NOTE: Delta **MUST** be consumed before Value, the extended delta bytes precede the extended length bytes
  let delta = parse_opt_len_or_delta(byte1 >> 4,
                                     bytes,
                                     OptParseError::OptionDeltaReservedValue(15))?;

  let len = parse_opt_len_or_delta(byte1 & 0b00001111,
                                   bytes,
                                   OptParseError::ValueLengthReservedValue(15))?
            as usize;

  let value = bytes.take_exact(len)
                   .ok_or_else(OptParseError::eof)?
                   .to_vec();

  let number = prev.0
                   .checked_add(delta as u32)
                   .ok_or(OptParseError::OptionNumberOverflow)?;

  Ok(Opt { number: OptNumber(number),
           value: OptValue(value) })
}
