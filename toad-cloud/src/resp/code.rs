pub use toad_cloud_msg::Code;

use crate::code;

// 2.xx
code!(rfc7252("5.9.1.4") CHANGED = 2*04);
code!(rfc7252("5.9.1.5") CONTENT = 2*05);

// 4.xx
code!(rfc7252("5.9.2.1") BAD_REQUEST = 4*00);
code!(rfc7252("5.9.2.5") NOT_FOUND   = 4*04);
