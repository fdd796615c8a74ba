//! Low-level representation of the CoAP messages exchanged between
//! a device and its cloud.
//!
//! The most notable item in `toad_cloud_msg` is [`Message`];
//! a CoAP message very close to the actual byte layout, with
//! helpers for the handful of options a cloud client cares about
//! (Uri-Path, Content-Format, Accept, Observe).
//!
//! Messages convert to and from bytes through [`TryFromBytes`] and [`TryIntoBytes`]:
//!
//! ```
//! use toad_cloud_msg::*;
//!
//! let mut msg = Message::new(Type::Con, Code::new(0, 1), Id(1), Token::opaque(&[1, 2, 3]));
//! msg.set_path(".d/temperature");
//! msg.set_content_format(ContentFormat::Json);
//! msg.payload = Payload(b"22.5".to_vec());
//!
//! let bytes = msg.clone().try_into_bytes().unwrap();
//! assert_eq!(Message::try_from_bytes(&bytes).unwrap(), msg);
//! ```

#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
#![deny(missing_docs)]

/// Byte buffer cursor
pub mod cursor;

#[doc(hidden)]
pub mod from_bytes;

/// Message structs
pub mod msg;

#[doc(hidden)]
pub mod to_bytes;

#[doc(inline)]
pub use cursor::Cursor;
#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use msg::*;
#[doc(inline)]
pub use to_bytes::{MessageToBytesError, TryIntoBytes};

#[cfg(test)]
pub(crate) fn test_msg() -> (Message, Vec<u8>) {
  //                                 version  token len  code (2.05 Content)
  //                                 |        |          /
  //                                 |  type  |         /  message ID
  //                                 |  |     |        |   |
  //                                 vv vv vvvv vvvvvvvv vvvvvvvvvvvvvvvv
  let header: [u8; 4] = 0b_01_00_0001_01000101_0000000000000001u32.to_be_bytes();
  let token: [u8; 1] = [254u8];
  // Content-Format (12) = application/json (50)
  let options: [u8; 2] = [0b_1100_0001u8, 50];
  let payload: [&[u8]; 2] = [&[0b1111_1111_u8], b"hello, world!"];
  let bytes = [header.as_ref(),
               token.as_ref(),
               options.as_ref(),
               payload.concat().as_ref()].concat();

  let msg = Message { id: Id(1),
                      ty: Type::Con,
                      ver: Version(1),
                      token: Token(tinyvec::array_vec!([u8; 8] => 254)),
                      opts: vec![Opt { number: known::CONTENT_FORMAT,
                                       value: OptValue(vec![50]) }],
                      code: Code { class: 2,
                                   detail: 5 },
                      payload: Payload(b"hello, world!".to_vec()) };
  (msg, bytes)
}
