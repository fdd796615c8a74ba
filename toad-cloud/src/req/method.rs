use toad_cloud_msg::Code;

/// Request method
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Method(pub(crate) Code);

impl Method {
  crate::code!(rfc7252("5.8.1") GET = Method(0*01));
  crate::code!(rfc7252("5.8.2") POST = Method(0*02));
  crate::code!(rfc7252("5.8.3") PUT = Method(0*03));
  crate::code!(rfc7252("5.8.4") DELETE = Method(0*04));

  /// The request code this method is sent as
  pub fn code(&self) -> Code {
    self.0
  }
}

impl core::fmt::Display for Method {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match *self {
      | Method::GET => write!(f, "GET"),
      | Method::POST => write!(f, "POST"),
      | Method::PUT => write!(f, "PUT"),
      | Method::DELETE => write!(f, "DELETE"),
      | Method(c) => write!(f, "{}", c),
    }
  }
}
