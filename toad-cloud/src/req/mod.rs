use toad_cloud_msg::{Code, ContentFormat, Id, Message, Payload, Token, Type};

use crate::time::Timeout;

/// Request methods
pub mod method;

#[doc(inline)]
pub use method::Method;

/// A CoAP request to the cloud
///
/// Message id & token are assigned by the client when the request is sent.
///
/// ```
/// use toad_cloud::req::Req;
/// use toad_cloud::time::Timeout;
/// use toad_cloud_msg::ContentFormat;
///
/// let req = Req::post(".d/temperature").content_format(ContentFormat::Json)
///                                      .payload(br#"{"value": 22.5}"#.to_vec())
///                                      .timeout(Timeout::Millis(2_000));
///
/// assert_eq!(req.msg().path().as_deref(), Some(".d/temperature"));
/// assert_eq!(req.msg().content_format(), Some(ContentFormat::Json));
/// assert_eq!(req.get_timeout(), Some(Timeout::Millis(2_000)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Req {
  msg: Message,
  timeout: Option<Timeout>,
}

impl Req {
  /// Create a confirmable request
  pub fn new(method: Method, path: impl AsRef<str>) -> Self {
    let mut msg = Message::new(Type::Con, method.0, Id(0), Token::default());
    msg.set_path(path.as_ref());

    Self { msg, timeout: None }
  }

  /// Creates a GET request
  pub fn get(path: impl AsRef<str>) -> Self {
    Self::new(Method::GET, path)
  }

  /// Creates a POST request
  pub fn post(path: impl AsRef<str>) -> Self {
    Self::new(Method::POST, path)
  }

  /// Creates a PUT request
  pub fn put(path: impl AsRef<str>) -> Self {
    Self::new(Method::PUT, path)
  }

  /// Creates a DELETE request
  pub fn delete(path: impl AsRef<str>) -> Self {
    Self::new(Method::DELETE, path)
  }

  /// Set the payload of the request
  pub fn payload(mut self, bytes: impl Into<Vec<u8>>) -> Self {
    self.msg.payload = Payload(bytes.into());
    self
  }

  /// Set the Content-Format of the payload
  pub fn content_format(mut self, format: ContentFormat) -> Self {
    self.msg.set_content_format(format);
    self
  }

  /// Ask the server to respond with a particular Content-Format
  pub fn accept(mut self, format: ContentFormat) -> Self {
    self.msg.set_accept(format);
    self
  }

  /// Override [`Config::request_timeout`](crate::config::Config::request_timeout) for this request
  pub fn timeout(mut self, timeout: Timeout) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// Send as a confirmable message; retransmitted until ACKed (the default)
  pub fn con(mut self) -> Self {
    self.msg.ty = Type::Con;
    self
  }

  /// Send as a non-confirmable message
  pub fn non(mut self) -> Self {
    self.msg.ty = Type::Non;
    self
  }

  /// Register as an observer of the resource (Observe: 0)
  pub fn observe(mut self) -> Self {
    self.msg.set_observe(u32::from(toad_cloud_msg::Action::Register));
    self
  }

  /// The request method
  pub fn method(&self) -> Method {
    Method(self.msg.code)
  }

  /// The per-request timeout, if one was set
  pub fn get_timeout(&self) -> Option<Timeout> {
    self.timeout
  }

  /// Borrow the underlying message
  pub fn msg(&self) -> &Message {
    &self.msg
  }

  /// Is this request confirmable?
  pub fn is_con(&self) -> bool {
    self.msg.ty == Type::Con
  }

  pub(crate) fn into_msg(self, id: Id, token: Token) -> Message {
    let mut msg = self.msg;
    msg.id = id;
    msg.token = token;
    msg
  }
}

impl From<Req> for Message {
  fn from(req: Req) -> Self {
    req.msg
  }
}

/// Requests with an empty code (`0.00`); CoAP ping
pub(crate) fn empty_con() -> Message {
  Message::new(Type::Con, Code::EMPTY, Id(0), Token::default())
}
