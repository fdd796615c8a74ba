use toad_cloud_msg::{Code, ContentFormat, Message, Token};

/// Response codes
pub mod code;

/// A response from the cloud (or, for observations, one notification)
///
/// ```
/// use toad_cloud::resp::{code, Resp};
/// use toad_cloud_msg::*;
///
/// let mut msg = Message::new(Type::Ack, code::CONTENT, Id(1), Token::opaque(&[1]));
/// msg.set_content_format(ContentFormat::Json);
/// msg.payload = Payload(b"{}".to_vec());
///
/// let resp = Resp::from(msg);
/// assert!(resp.code().is_success());
/// assert_eq!(resp.payload_str(), Some("{}"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Resp(Message);

impl Resp {
  /// Response code
  pub fn code(&self) -> Code {
    self.0.code
  }

  /// Token of the request this responds to
  pub fn token(&self) -> Token {
    self.0.token
  }

  /// Payload bytes
  pub fn payload(&self) -> &[u8] {
    &self.0.payload.0
  }

  /// Payload as a utf8 string
  pub fn payload_str(&self) -> Option<&str> {
    self.0.payload.as_str()
  }

  /// Content-Format of the payload, if the server specified one
  pub fn content_format(&self) -> Option<ContentFormat> {
    self.0.content_format()
  }

  /// Observe sequence number, when this is a notification
  pub fn observe(&self) -> Option<u32> {
    self.0.observe()
  }

  /// Borrow the underlying message
  pub fn msg(&self) -> &Message {
    &self.0
  }
}

impl From<Message> for Resp {
  fn from(msg: Message) -> Self {
    Self(msg)
  }
}

impl From<Resp> for Message {
  fn from(resp: Resp) -> Self {
    resp.0
  }
}

impl AsRef<Message> for Resp {
  fn as_ref(&self) -> &Message {
    &self.0
  }
}
