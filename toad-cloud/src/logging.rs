use toad_cloud_msg::{CodeKind, Message};

pub(crate) fn msg_summary(msg: &Message) -> String {
  let kind = match msg.code.kind() {
    | CodeKind::Request => "Req",
    | CodeKind::Response => "Resp",
    | CodeKind::Empty => "Empty",
  };

  format!("{} {:?} {} {:?} {:?} with {} byte payload",
          kind,
          msg.ty,
          msg.code,
          msg.id,
          msg.token,
          msg.payload.0.len())
}
