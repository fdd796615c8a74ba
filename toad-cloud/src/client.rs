use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use toad_cloud_msg::{CodeKind, ContentFormat, Id, Message, Token, TryIntoBytes, Type};

use crate::config::{Config, MAX_RPC_METHODS};
use crate::error::{Error, What, When};
use crate::net::{Connect, Proto, Socket as _, Tls};
use crate::platform::{PlatformTypes, Socket};
use crate::queue::{Completion, Handle, Observer, OnNotify, Pending, Queue, Sweep};
use crate::req::{self, Req};
use crate::resp::{code, Resp};
use crate::retry::RetryTimer;
use crate::rx::Rx;
use crate::time::{now_millis, Timeout};
use crate::{logging, payload, rpc, settings};

/// Connection state of a [`Client`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  /// No transport session
  Disconnected,
  /// Opening a transport session
  Connecting,
  /// Transport session open
  Connected,
}

struct Conn<P: PlatformTypes> {
  state: State,
  socket: Option<Arc<Socket<P>>>,
}

#[derive(Debug, Default)]
struct Signal {
  woken: bool,
  next: Option<u64>,
}

#[derive(Debug)]
struct Ids {
  rand: rand_chacha::ChaCha8Rng,
  next_id: Id,
  tokens: u64,
}

type Callback = Box<dyn Fn() + Send + Sync>;

/// Device-side connection to the cloud.
///
/// One transport session multiplexes many concurrent requests. Application
/// threads issue requests through `&Client` (it is `Sync`; share it with an
/// `Arc`), while one receive thread drives [`Client::run`] (or
/// [`Client::tick`] & [`Client::wait`]).
///
/// ```
/// use std::sync::Arc;
///
/// use toad_cloud::client::Client;
/// use toad_cloud::config::Config;
/// use toad_cloud::net::Tls;
/// use toad_cloud::req::Req;
/// use toad_cloud::std::{Clock, PlatformTypes as Std, Udp};
///
/// # let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
/// # let addr = server.local_addr().unwrap();
/// let client = Arc::new(Client::<Std>::new(Config::default(),
///                                          Clock::new(),
///                                          Udp::new(addr),
///                                          Tls::default()));
/// client.connect().unwrap();
///
/// let rx_thread = {
///   let client = client.clone();
///   std::thread::spawn(move || client.run())
/// };
///
/// client.send(Req::post(".s/temperature").payload(b"22.5".to_vec()),
///             |resp| println!("{:?}", resp))
///       .unwrap();
///
/// client.disconnect();
/// rx_thread.join().unwrap().unwrap();
/// ```
pub struct Client<P: PlatformTypes> {
  config: Config,
  clock: P::Clock,
  connector: P::Connect,
  tls: Tls,
  conn: Mutex<Conn<P>>,
  rx: Mutex<Rx>,
  queue: Queue,
  rpc: rpc::Registry<MAX_RPC_METHODS>,
  settings: settings::Channel,
  on_connect: Option<Callback>,
  on_wakeup: Option<Callback>,
  signal: Mutex<Signal>,
  wake: Condvar,
  ids: Mutex<Ids>,
}

impl<P: PlatformTypes> core::fmt::Debug for Client<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Client")
     .field("state", &self.state())
     .field("proto", &self.proto())
     .field("tls", &self.tls)
     .field("pending", &self.queue.len())
     .field("rpc", &self.rpc)
     .field("settings", &self.settings)
     .finish()
  }
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Awaiting {
  Once,
  Observe(OnNotify),
  Rpc,
  Settings,
}

impl<P: PlatformTypes> Client<P> {
  /// Create a disconnected client
  pub fn new(config: Config, clock: P::Clock, connector: P::Connect, tls: Tls) -> Self {
    let seed = now_millis(&clock).unwrap_or(0) ^ ((config.token_seed as u64) << 48);
    let mut rand = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    let next_id = Id(rand.gen());

    Self { queue: Queue::new(config.max_pending),
           config,
           clock,
           connector,
           tls,
           conn: Mutex::new(Conn { state: State::Disconnected,
                                   socket: None }),
           rx: Mutex::new(Rx::new()),
           rpc: Default::default(),
           settings: Default::default(),
           on_connect: None,
           on_wakeup: None,
           signal: Mutex::new(Signal::default()),
           wake: Condvar::new(),
           ids: Mutex::new(Ids { rand,
                                 next_id,
                                 tokens: 0 }) }
  }

  /// Invoke `f` (outside every lock) each time a connection is established
  pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.on_connect = Some(Box::new(f));
    self
  }

  /// Invoke `f` each time [`Client::wakeup`] is called
  pub fn on_wakeup(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.on_wakeup = Some(Box::new(f));
    self
  }

  /// Runtime configuration
  pub fn config(&self) -> Config {
    self.config
  }

  /// See [`State`]
  pub fn state(&self) -> State {
    lock(&self.conn).state
  }

  /// Is a transport session open?
  pub fn is_connected(&self) -> bool {
    self.state() == State::Connected
  }

  /// Protocol spoken by the transport
  pub fn proto(&self) -> Proto {
    self.connector.proto()
  }

  /// Credentials presented when connecting
  pub fn tls(&self) -> &Tls {
    &self.tls
  }

  /// The RPC methods the cloud may invoke
  pub fn rpc(&self) -> &rpc::Registry<MAX_RPC_METHODS> {
    &self.rpc
  }

  /// The channel settings pushed by the cloud are delivered to
  pub fn settings(&self) -> &settings::Channel {
    &self.settings
  }

  /// Requests awaiting a response
  pub fn queue(&self) -> &Queue {
    &self.queue
  }

  fn socket(&self) -> Option<Arc<Socket<P>>> {
    lock(&self.conn).socket.clone()
  }

  /// Open a transport session.
  ///
  /// A no-op when already connected. On success the `on_connect` callback
  /// is invoked with no lock held.
  pub fn connect(&self) -> Result<(), Error> {
    {
      let mut conn = lock(&self.conn);
      if conn.state == State::Connected {
        return Ok(());
      }

      conn.state = State::Connecting;
      log::debug!("connecting ({:?}, {} credential tag(s))", self.proto(), self.tls.count());

      match self.connector.open(&self.tls) {
        | Ok(sock) => {
          conn.socket = Some(Arc::new(sock));
          conn.state = State::Connected;
          self.queue.set_connected(true);
        },
        | Err(e) => {
          conn.state = State::Disconnected;
          log::error!("connect failed: {:?}", e);
          return Err(When::Connecting.what(What::transport(e)));
        },
      }
    }

    log::info!("connected");

    if let Some(f) = self.on_connect.as_ref() {
      f();
    }

    self.signal();
    Ok(())
  }

  /// Close the transport session and fail every pending request
  /// with [`What::Disconnected`].
  pub fn disconnect(&self) {
    let (sock, drained) = {
      let mut conn = lock(&self.conn);
      conn.state = State::Disconnected;
      (conn.socket.take(), self.queue.close())
    };

    if let Some(sock) = sock {
      sock.close();
      log::info!("disconnected");
    }

    if !drained.is_empty() {
      log::debug!("failed {} pending request(s)", drained.len());
    }

    drained.into_iter()
           .for_each(|p| p.complete(Err(When::None.what(What::Disconnected))));

    self.signal();
  }

  fn signal(&self) {
    lock(&self.signal).woken = true;
    self.wake.notify_all();
  }

  /// Interrupt the receive thread's [`Client::wait`] and invoke
  /// the `on_wakeup` callback. Safe from any thread in any state.
  pub fn wakeup(&self) {
    self.signal();
    if let Some(f) = self.on_wakeup.as_ref() {
      f();
    }
  }

  fn next_id(&self) -> Id {
    let mut ids = lock(&self.ids);
    let id = ids.next_id;
    ids.next_id = id.next();
    id
  }

  fn next_token(&self, now: u64) -> Token {
    let mut ids = lock(&self.ids);
    ids.tokens += 1;
    let salt: u32 = ids.rand.gen();

    let bytes = [self.config.token_seed.to_be_bytes().as_ref(),
                 now.to_be_bytes().as_ref(),
                 ids.tokens.to_be_bytes().as_ref(),
                 salt.to_be_bytes().as_ref()].concat();

    Token::opaque(&bytes)
  }

  fn now(&self, when: When) -> Result<u64, Error> {
    now_millis(&self.clock).map_err(|e| when.what(e.into()))
  }

  fn submit(&self,
            msg: Message,
            timeout: Timeout,
            completion: Completion,
            ping: bool)
            -> Result<Handle, Error> {
    let now = self.now(When::None)?;
    let token = if ping {
      Token::default()
    } else {
      self.next_token(now)
    };
    let id = self.next_id();
    let mut msg = msg;
    msg.id = id;
    msg.token = token;

    let when = When::Sending(token);
    let bytes = msg.clone()
                   .try_into_bytes()
                   .map_err(|e| when.what(e.into()))?;

    let retry = match msg.ty {
      | Type::Con => Some(RetryTimer::new(now,
                                          self.config.con.unacked_retry_strategy,
                                          self.config.con.max_attempts)),
      | _ => None,
    };

    let pending = Pending { token,
                            id,
                            completion,
                            deadline: timeout.deadline_from(now),
                            retry,
                            bytes: bytes.clone(),
                            ping };

    let handle = self.queue
                     .enqueue(pending)
                     .map_err(|(what, _)| when.what(what))?;

    let sock = match self.socket() {
      | Some(sock) => sock,
      | None => {
        return match self.queue.remove(handle) {
          | Some(_) => Err(when.what(What::NotConnected)),
          // already failed by the disconnect that took the socket
          | None => Ok(handle),
        };
      },
    };

    log::trace!("-> {}", logging::msg_summary(&msg));
    match sock.send(&bytes) {
      | Ok(()) => (),
      | Err(nb::Error::WouldBlock) => {
        log::warn!("{:?} not sent, socket busy", token);
      },
      | Err(nb::Error::Other(e)) => {
        let err = when.what(What::transport(e));
        log::error!("{}", err);

        // taken back uncompleted, the caller gets the error instead;
        // if a concurrent disconnect got to it first, `f` already has its outcome
        let taken = self.queue.remove(handle);
        self.disconnect();
        return match taken {
          | Some(_) => Err(err),
          | None => Ok(handle),
        };
      },
    }

    // the receive thread may need to wake sooner for this deadline
    self.signal();
    Ok(handle)
  }

  fn timeout_for(&self, req: &Req) -> Timeout {
    req.get_timeout().unwrap_or(self.config.request_timeout)
  }

  /// Send a request; `f` is invoked exactly once with its outcome,
  /// on the receive thread (or the thread that canceled / disconnected).
  ///
  /// Errors that prevent the request from being sent are returned
  /// here and `f` is never invoked. When a concurrent disconnect fails
  /// the request first, that outcome goes to `f` and this yields `Ok`.
  pub fn send<F>(&self, req: Req, f: F) -> Result<Handle, Error>
    where F: FnOnce(Result<Resp, Error>) + Send + 'static
  {
    let timeout = self.timeout_for(&req);
    self.submit(req.into(), timeout, Completion::Once(Box::new(f)), false)
  }

  /// Send a request and block the calling thread until its outcome is known.
  ///
  /// The wait is bounded by the request's timeout, even when no receive
  /// thread is running.
  pub fn send_blocking(&self, req: Req) -> Result<Resp, Error> {
    let timeout = self.timeout_for(&req);
    let (tx, rx) = mpsc::channel();
    let handle = self.send(req, move |r| {
                       tx.send(r).ok();
                     })?;

    let outcome = match timeout {
      | Timeout::Never => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
      | Timeout::Millis(ms) => {
        let grace = self.config.rx_poll_interval.0;
        rx.recv_timeout(Duration::from_millis(ms.saturating_add(grace)))
      },
    };

    match outcome {
      | Ok(r) => r,
      | Err(RecvTimeoutError::Timeout) => match self.queue.remove(handle) {
        | Some(_) => Err(When::None.what(What::Timeout)),
        // detached by someone else, whose completion is on its way
        | None => rx.recv()
                    .unwrap_or_else(|_| Err(When::None.what(What::Timeout))),
      },
      | Err(RecvTimeoutError::Disconnected) => Err(When::None.what(What::Disconnected)),
    }
  }

  /// Observe a resource; `f` is invoked once per notification, and a final
  /// time with an `Err` when the observation ends (cancel, disconnect).
  ///
  /// The request's timeout applies until the first notification arrives.
  pub fn observe<F>(&self, req: Req, f: F) -> Result<Handle, Error>
    where F: FnMut(Result<Resp, Error>) + Send + 'static
  {
    let timeout = self.timeout_for(&req);
    let f: OnNotify = Arc::new(Observer::new(f));
    self.submit(req.observe().into(), timeout, Completion::Observe(f), false)
  }

  /// Begin receiving RPC calls on the resource [`rpc::PATH`].
  pub fn observe_rpc(&self) -> Result<Handle, Error> {
    let req = Req::get(rpc::PATH).observe().accept(ContentFormat::Cbor);
    let timeout = self.timeout_for(&req);
    self.submit(req.into(), timeout, Completion::Rpc, false)
  }

  /// Begin receiving settings on the resource [`settings::PATH`].
  pub fn observe_settings(&self) -> Result<Handle, Error> {
    let req = Req::get(settings::PATH).observe()
                                      .accept(ContentFormat::Cbor);
    let timeout = self.timeout_for(&req);
    self.submit(req.into(), timeout, Completion::Settings, false)
  }

  /// Send a CoAP ping (an empty CON); `f` is invoked with `Ok` when the
  /// server answers with a Reset.
  pub fn ping<F>(&self, f: F) -> Result<Handle, Error>
    where F: FnOnce(Result<Resp, Error>) + Send + 'static
  {
    self.submit(req::empty_con(),
                self.config.request_timeout,
                Completion::Once(Box::new(f)),
                true)
  }

  /// Fail a pending request with [`What::Canceled`],
  /// yielding whether it was still pending.
  pub fn cancel(&self, handle: Handle) -> bool {
    match self.queue.remove(handle) {
      | Some(p) => {
        log::debug!("{:?} canceled", p.token());
        let token = p.token();
        p.complete(Err(When::Sending(token).what(What::Canceled)));
        true
      },
      | None => false,
    }
  }

  fn send_now(&self, sock: &Socket<P>, msg: Message) -> Result<(), Error> {
    log::trace!("-> {}", logging::msg_summary(&msg));
    let bytes = msg.try_into_bytes()
                   .map_err(|e| When::Polling.what(e.into()))?;

    match sock.send(&bytes) {
      | Ok(()) => Ok(()),
      | Err(nb::Error::WouldBlock) => {
        log::warn!("socket busy, dropped outbound message");
        Ok(())
      },
      | Err(nb::Error::Other(e)) => Err(When::Polling.what(What::transport(e))),
    }
  }

  fn sweep(&self, now: u64) -> Result<(), Error> {
    let Sweep { expired,
                retransmit,
                next, } = self.queue.sweep(now);

    lock(&self.signal).next = next;

    expired.into_iter().for_each(|p| {
                         log::debug!("{:?} timed out", p.token());
                         p.complete(Err(When::Sweeping.what(What::Timeout)))
                       });

    if let Some(sock) = self.socket() {
      for (token, bytes) in retransmit {
        log::trace!("-> retransmitting {:?}", token);
        match sock.send(&bytes) {
          | Ok(()) | Err(nb::Error::WouldBlock) => (),
          | Err(nb::Error::Other(e)) => return Err(When::Sweeping.what(What::transport(e))),
        }
      }
    }

    Ok(())
  }

  /// Run one receive pass: expire & retransmit pending requests,
  /// then handle every datagram waiting on the socket.
  ///
  /// Yields the number of messages handled. Malformed and oversized
  /// datagrams are dropped. A transport failure disconnects the client
  /// (failing every pending request) and is returned.
  pub fn tick(&self) -> Result<usize, Error> {
    let now = self.now(When::Sweeping)?;
    self.sweep(now).map_err(|e| self.fatal(e))?;

    let sock = match self.socket() {
      | Some(sock) => sock,
      | None => return Ok(0),
    };

    let mut handled = 0;
    loop {
      let polled = lock(&self.rx).poll(sock.as_ref());

      match polled {
        | Ok(msg) => {
          log::trace!("<- {}", logging::msg_summary(&msg));
          let dispatched = self.dispatch(sock.as_ref(), msg);
          lock(&self.rx).finish();
          dispatched.map_err(|e| self.fatal(e))?;
          handled += 1;
        },
        | Err(nb::Error::WouldBlock) => break Ok(handled),
        | Err(nb::Error::Other(what @ What::Transport(_))) => {
          break Err(self.fatal(When::Polling.what(what)))
        },
        | Err(nb::Error::Other(what)) => {
          log::warn!("{}", When::Polling.what(what));
        },
      }
    }
  }

  fn fatal(&self, e: Error) -> Error {
    log::error!("{}", e);
    self.disconnect();
    e
  }

  /// Park the calling thread until [`Client::wakeup`] is called, the next
  /// deadline arrives, or [`Config::rx_poll_interval`] elapses.
  pub fn wait(&self) {
    let now = now_millis(&self.clock).unwrap_or(0);
    let poll = self.config.rx_poll_interval.0;

    let mut sig = lock(&self.signal);
    let millis = sig.next
                    .map(|at| at.saturating_sub(now).min(poll))
                    .unwrap_or(poll);

    if !sig.woken && millis > 0 {
      sig = self.wake
                .wait_timeout(sig, Duration::from_millis(millis))
                .map(|(sig, _)| sig)
                .unwrap_or_else(|e| e.into_inner().0);
    }

    sig.woken = false;
  }

  /// Drive the receive side until the client disconnects.
  ///
  /// Returns `Ok` after [`Client::disconnect`], and the error
  /// when the transport fails.
  pub fn run(&self) -> Result<(), Error> {
    while self.is_connected() {
      self.tick()?;
      self.wait();
    }

    Ok(())
  }

  fn dispatch(&self, sock: &Socket<P>, msg: Message) -> Result<(), Error> {
    match (msg.ty, msg.code.kind()) {
      | (Type::Ack, CodeKind::Empty) => {
        if !self.queue.acked(msg.id) {
          log::trace!("ACK {:?} matches nothing", msg.id);
        }
        Ok(())
      },
      | (Type::Reset, _) => {
        match self.queue
                  .find_by_id(msg.id)
                  .and_then(|h| self.queue.remove(h))
        {
          | Some(p) if p.ping => p.complete(Ok(Resp::from(msg))),
          | Some(p) => {
            let token = p.token();
            p.complete(Err(When::Sending(token).what(What::Reset)))
          },
          | None => log::trace!("RST {:?} matches nothing", msg.id),
        }
        Ok(())
      },
      // ping from the server
      | (Type::Con, CodeKind::Empty) => self.send_now(sock, msg.reset()),
      | (_, CodeKind::Empty) => Ok(()),
      | (_, CodeKind::Request) => self.handle_request(sock, msg),
      | (_, CodeKind::Response) => self.handle_response(sock, msg),
    }
  }

  fn handle_response(&self, sock: &Socket<P>, msg: Message) -> Result<(), Error> {
    let handle = match self.queue.find_by_token(msg.token) {
      | Some(h) => h,
      | None if msg.ty == Type::Con => {
        log::debug!("rejecting response for unknown {:?}", msg.token);
        return self.send_now(sock, msg.reset());
      },
      | None => {
        log::trace!("discarding response for unknown {:?}", msg.token);
        return Ok(());
      },
    };

    match msg.ty {
      | Type::Con => self.send_now(sock, msg.ack())?,
      | Type::Ack => {
        self.queue.acked(msg.id);
      },
      | _ => (),
    }

    let awaiting = self.queue.peek(handle, |p| match &p.completion {
                               | Completion::Once(_) => Awaiting::Once,
                               | Completion::Observe(f) => Awaiting::Observe(f.clone()),
                               | Completion::Rpc => Awaiting::Rpc,
                               | Completion::Settings => Awaiting::Settings,
                             });

    // a notification must carry Observe & succeed, otherwise the observation is over
    let ends = !msg.code.is_success() || msg.observe().is_none();

    match awaiting {
      | None => Ok(()),
      | Some(Awaiting::Once) => {
        if let Some(p) = self.queue.remove(handle) {
          p.complete(Ok(Resp::from(msg)));
        }
        Ok(())
      },
      | Some(_) if ends => {
        log::debug!("observation {:?} ended with {}", msg.token, msg.code);
        if let Some(p) = self.queue.remove(handle) {
          p.complete(Ok(Resp::from(msg)));
        }
        Ok(())
      },
      | Some(Awaiting::Observe(f)) => {
        self.queue.observed(handle);
        f.notify(Ok(Resp::from(msg)));
        Ok(())
      },
      | Some(Awaiting::Rpc) => {
        self.queue.observed(handle);
        self.on_rpc(&msg);
        Ok(())
      },
      | Some(Awaiting::Settings) => {
        self.queue.observed(handle);
        self.on_settings(&msg);
        Ok(())
      },
    }
  }

  fn handle_request(&self, sock: &Socket<P>, msg: Message) -> Result<(), Error> {
    let path = msg.path();
    let code = match path.as_deref() {
      | Some(rpc::PATH) if self.on_rpc(&msg) => code::CHANGED,
      | Some(settings::PATH) if self.on_settings(&msg) => code::CHANGED,
      | Some(rpc::PATH) | Some(settings::PATH) => code::BAD_REQUEST,
      | _ => {
        log::debug!("no resource at {:?}", path);
        code::NOT_FOUND
      },
    };

    let reply = match msg.ty {
      | Type::Con => Message::new(Type::Ack, code, msg.id, msg.token),
      | _ => Message::new(Type::Non, code, self.next_id(), msg.token),
    };

    self.send_now(sock, reply)
  }

  fn body<T: serde::de::DeserializeOwned>(&self, msg: &Message) -> Option<T> {
    if msg.payload.0.is_empty() {
      return None;
    }

    let format = msg.content_format().unwrap_or(ContentFormat::Cbor);
    payload::decode(format, &msg.payload.0).map_err(|e| log::warn!("{:?} body: {}", msg.token, e))
                                           .ok()
  }

  fn report<T: serde::Serialize>(&self, path: &str, body: &T) {
    let format = ContentFormat::Cbor;
    let bytes = match payload::encode(format, body) {
      | Ok(bytes) => bytes,
      | Err(e) => {
        log::error!("encoding report for {}: {}", path, e);
        return;
      },
    };

    let path_ = path.to_string();
    let sent = self.send(Req::post(path).content_format(format).payload(bytes),
                         move |r| match r {
                           | Ok(resp) => log::trace!("{} -> {}", path_, resp.code()),
                           | Err(e) => log::warn!("{} -> {}", path_, e),
                         });

    if let Err(e) = sent {
      log::warn!("reporting to {}: {}", path, e);
    }
  }

  /// Handle a call published on the RPC resource, yielding whether it was readable
  fn on_rpc(&self, msg: &Message) -> bool {
    match self.body::<rpc::Call>(msg) {
      | Some(call) => {
        let result = self.rpc.handle(&call);
        self.report(rpc::STATUS_PATH, &result);
        true
      },
      | None => false,
    }
  }

  /// Handle settings published on the settings resource,
  /// yielding whether they were readable & reached a callback
  fn on_settings(&self, msg: &Message) -> bool {
    let doc = match self.body::<settings::Document>(msg) {
      | Some(doc) => doc,
      | None => return false,
    };

    match self.settings.apply(&doc) {
      | Ok(Some(report)) => {
        self.report(settings::STATUS_PATH, &report);
        true
      },
      | Ok(None) => {
        log::trace!("settings version {} applied", doc.version);
        true
      },
      | Err(e) => {
        log::warn!("settings version {} dropped: {}", doc.version, e);
        false
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use serde_json::json;
  use toad_cloud_msg::{Code, Payload};

  use super::*;
  use crate::net::SecTag;
  use crate::test::{init_logger, ClockMock, ConnectMock, Platform};

  type Outcomes = Arc<Mutex<Vec<Result<Resp, Error>>>>;

  fn client() -> (Client<Platform>, ClockMock, ConnectMock) {
    init_logger();
    let clock = ClockMock::new();
    let connect = ConnectMock::new();
    let client = Client::<Platform>::new(Config::default(),
                                         clock.clone(),
                                         connect.clone(),
                                         Tls::new([SecTag(1)]));
    (client, clock, connect)
  }

  fn connected() -> (Client<Platform>, ClockMock, ConnectMock) {
    let (client, clock, connect) = client();
    client.connect().unwrap();
    (client, clock, connect)
  }

  fn recorder() -> (Outcomes, impl FnOnce(Result<Resp, Error>) + Send + 'static) {
    let outcomes = Outcomes::default();
    let out = outcomes.clone();
    (outcomes, move |r| out.lock().unwrap().push(r))
  }

  fn response(to: &Message, ty: Type, code: Code, payload: &[u8]) -> Message {
    let id = match ty {
      | Type::Ack => to.id,
      | _ => Id(to.id.0.wrapping_add(1000)),
    };
    let mut msg = Message::new(ty, code, id, to.token);
    msg.payload = Payload(payload.to_vec());
    msg
  }

  #[test]
  fn lifecycle() {
    let (client, _, connect) = client();
    assert_eq!(client.state(), State::Disconnected);
    assert_eq!(client.proto(), Proto::Dtls);
    assert_eq!(client.tls().count(), 1);

    client.connect().unwrap();
    assert!(client.is_connected());
    assert!(client.queue().is_connected());

    // no-op
    client.connect().unwrap();
    assert_eq!(connect.opens.load(Ordering::SeqCst), 1);

    client.disconnect();
    assert_eq!(client.state(), State::Disconnected);
    assert!(!client.queue().is_connected());
    assert!(connect.sock.closed.load(Ordering::SeqCst));
  }

  #[test]
  fn connect_failure() {
    let (client, _, connect) = client();
    connect.fail.store(true, Ordering::SeqCst);

    let err = client.connect().unwrap_err();
    assert_eq!(err.when, When::Connecting);
    assert!(matches!(err.what, What::Transport(_)));
    assert_eq!(client.state(), State::Disconnected);
  }

  #[test]
  fn on_connect_runs_without_locks() {
    let (client, _, connect) = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let client = Arc::new(client.on_connect({
                                  let calls = calls.clone();
                                  move || {
                                    calls.fetch_add(1, Ordering::SeqCst);
                                  }
                                }));

    client.connect().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(connect.opens.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn send_before_connect() {
    let (client, _, _) = client();
    let (outcomes, f) = recorder();

    let err = client.send(Req::get("x"), f).unwrap_err();
    assert_eq!(err.what, What::NotConnected);
    assert!(outcomes.lock().unwrap().is_empty());
  }

  #[test]
  fn issues_request_from_on_connect() {
    init_logger();
    let clock = ClockMock::new();
    let connect = ConnectMock::new();
    let slot: Arc<Mutex<Option<Arc<Client<Platform>>>>> = Default::default();

    let client = Arc::new({
                   let slot = slot.clone();
                   Client::<Platform>::new(Config::default(),
                                           clock,
                                           connect.clone(),
                                           Tls::default()).on_connect(move || {
                                                            let c = slot.lock().unwrap().clone();
                                                            if let Some(c) = c {
                                                              assert!(c.is_connected());
                                                              c.send(Req::get("hello"), |_| ()).unwrap();
                                                            }
                                                          })
                 });
    *slot.lock().unwrap() = Some(client.clone());

    client.connect().unwrap();
    assert_eq!(connect.sock.take_sent().len(), 1);
    assert_eq!(client.queue().len(), 1);

    *slot.lock().unwrap() = None;
  }

  #[test]
  fn two_tokens() {
    let (client, _, connect) = connected();
    let (a_out, a) = recorder();
    let (b_out, b) = recorder();

    client.send(Req::get("a"), a).unwrap();
    client.send(Req::get("b"), b).unwrap();

    let sent = connect.sock.take_sent();
    assert_eq!(sent.len(), 2);
    assert_ne!(sent[0].token, sent[1].token);

    connect.sock
           .push_msg(response(&sent[1], Type::Ack, code::CONTENT, b"b"));
    assert_eq!(client.tick().unwrap(), 1);

    assert!(a_out.lock().unwrap().is_empty());
    let b_out = b_out.lock().unwrap();
    assert_eq!(b_out.len(), 1);
    assert_eq!(b_out[0].as_ref().unwrap().payload(), b"b");
    assert_eq!(client.queue().len(), 1);
    assert!(client.queue().find_by_token(sent[0].token).is_some());
  }

  #[test]
  fn times_out_after_two_seconds() {
    let (client, clock, _) = connected();
    let (outcomes, f) = recorder();

    client.send(Req::get("slow").timeout(Timeout::Millis(2_000)), f)
          .unwrap();

    clock.set_millis(1_999);
    client.tick().unwrap();
    assert!(outcomes.lock().unwrap().is_empty());

    clock.set_millis(2_000);
    client.tick().unwrap();
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].as_ref().unwrap_err().what, What::Timeout);
    assert!(client.queue().is_empty());
  }

  #[test]
  fn late_response_after_timeout_is_discarded() {
    let (client, clock, connect) = connected();
    let (outcomes, f) = recorder();

    client.send(Req::get("slow").non().timeout(Timeout::Millis(10)), f)
          .unwrap();
    let sent = connect.sock.take_sent();

    clock.set_millis(10);
    client.tick().unwrap();

    connect.sock
           .push_msg(response(&sent[0], Type::Non, code::CONTENT, b""));
    client.tick().unwrap();

    assert_eq!(outcomes.lock().unwrap().len(), 1);
    assert!(connect.sock.take_sent().is_empty());
  }

  #[test]
  fn disconnect_fails_each_pending_once() {
    let (client, _, _) = connected();
    let n = Arc::new(AtomicUsize::new(0));

    (0..3).for_each(|i| {
            let n = n.clone();
            client.send(Req::get(format!("r/{}", i)), move |r| {
                    assert_eq!(r.unwrap_err().what, What::Disconnected);
                    n.fetch_add(1, Ordering::SeqCst);
                  })
                  .unwrap();
          });

    client.disconnect();
    assert!(client.queue().is_empty());
    assert_eq!(n.load(Ordering::SeqCst), 3);

    client.disconnect();
    assert_eq!(n.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn send_failure_disconnects_without_completing() {
    let (client, _, connect) = connected();
    let (outcomes, f) = recorder();
    connect.sock.fail_send.store(true, Ordering::SeqCst);

    let err = client.send(Req::get("x"), f).unwrap_err();
    assert!(matches!(err.what, What::Transport(_)));
    assert!(matches!(err.when, When::Sending(_)));
    assert!(outcomes.lock().unwrap().is_empty());
    assert!(!client.is_connected());
    assert!(client.queue().is_empty());
  }

  #[test]
  fn recv_failure_is_returned_once() {
    let (client, _, connect) = connected();
    let (outcomes, f) = recorder();
    client.send(Req::get("x"), f).unwrap();

    connect.sock.fail_recv.store(true, Ordering::SeqCst);
    let err = client.tick().unwrap_err();
    assert_eq!(err.when, When::Polling);
    assert!(err.is_fatal());
    assert!(!client.is_connected());
    assert_eq!(outcomes.lock().unwrap()[0].as_ref().unwrap_err().what,
               What::Disconnected);

    assert_eq!(client.tick().unwrap(), 0);
    assert_eq!(client.run(), Ok(()));
  }

  #[test]
  fn malformed_datagram_keeps_connection() {
    let (client, _, connect) = connected();
    connect.sock.push_bytes(vec![0x40]);
    connect.sock.push_bytes(vec![0x40; crate::config::RX_BUFFER_SIZE]);

    assert_eq!(client.tick().unwrap(), 0);
    assert!(client.is_connected());
  }

  #[test]
  fn con_response_is_acked() {
    let (client, _, connect) = connected();
    let (outcomes, f) = recorder();
    client.send(Req::get("x"), f).unwrap();
    let req = connect.sock.take_sent().remove(0);

    // separate response: empty ACK first, then a CON response
    connect.sock
           .push_msg(Message::new(Type::Ack, Code::EMPTY, req.id, Token::default()));
    let resp = response(&req, Type::Con, code::CONTENT, b"hi");
    connect.sock.push_msg(resp.clone());

    assert_eq!(client.tick().unwrap(), 2);
    assert_eq!(outcomes.lock().unwrap()[0].as_ref().unwrap().payload_str(),
               Some("hi"));

    let sent = connect.sock.take_sent();
    assert_eq!(sent, vec![resp.ack()]);
  }

  #[test]
  fn unknown_con_is_reset() {
    let (client, _, connect) = connected();
    let stray = Message::new(Type::Con, code::CONTENT, Id(77), Token::opaque(b"stray"));
    connect.sock.push_msg(stray.clone());

    client.tick().unwrap();
    assert_eq!(connect.sock.take_sent(), vec![stray.reset()]);
  }

  #[test]
  fn unacked_con_is_retransmitted() {
    let (client, clock, connect) = connected();
    client.send(Req::get("x").timeout(Timeout::Never), |_| ())
          .unwrap();
    let first = connect.sock.take_sent().remove(0);

    clock.set_millis(3_000);
    client.tick().unwrap();
    assert_eq!(connect.sock.take_sent(), vec![first.clone()]);

    connect.sock
           .push_msg(Message::new(Type::Ack, Code::EMPTY, first.id, Token::default()));
    client.tick().unwrap();

    clock.set_millis(60_000);
    client.tick().unwrap();
    assert!(connect.sock.take_sent().is_empty());
    assert_eq!(client.queue().len(), 1);
  }

  #[test]
  fn never_acked_con_fails() {
    let (client, clock, _) = connected();
    let (outcomes, f) = recorder();
    client.send(Req::get("x").timeout(Timeout::Never), f).unwrap();

    // 4 attempts, exponential from at most 3s: done by 24s
    (1..=30u64).for_each(|s| {
                 clock.set_millis(s * 1_000);
                 client.tick().unwrap();
               });

    assert_eq!(outcomes.lock().unwrap()[0].as_ref().unwrap_err().what,
               What::Timeout);
  }

  #[test]
  fn reset_fails_request() {
    let (client, _, connect) = connected();
    let (outcomes, f) = recorder();
    client.send(Req::get("x"), f).unwrap();
    let req = connect.sock.take_sent().remove(0);

    connect.sock.push_msg(req.reset());
    client.tick().unwrap();
    assert_eq!(outcomes.lock().unwrap()[0].as_ref().unwrap_err().what,
               What::Reset);
  }

  #[test]
  fn ping_completes_on_reset() {
    let (client, _, connect) = connected();
    let (outcomes, f) = recorder();
    client.ping(f).unwrap();

    let ping = connect.sock.take_sent().remove(0);
    assert!(ping.is_empty());
    assert_eq!(ping.ty, Type::Con);
    assert!(ping.token.is_empty());

    connect.sock.push_msg(ping.reset());
    client.tick().unwrap();
    assert!(outcomes.lock().unwrap()[0].is_ok());
  }

  #[test]
  fn cancel() {
    let (client, _, connect) = connected();
    let (outcomes, f) = recorder();
    let h = client.send(Req::get("x"), f).unwrap();
    let req = connect.sock.take_sent().remove(0);

    assert!(client.cancel(h));
    assert!(!client.cancel(h));

    connect.sock
           .push_msg(response(&req, Type::Ack, code::CONTENT, b""));
    client.tick().unwrap();

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].as_ref().unwrap_err().what, What::Canceled);
  }

  #[test]
  fn observe_notifies_until_canceled() {
    let (client, clock, connect) = connected();
    let outcomes = Outcomes::default();
    let h = client.observe(Req::get("temp").timeout(Timeout::Millis(1_000)), {
                    let out = outcomes.clone();
                    move |r| out.lock().unwrap().push(r)
                  })
                  .unwrap();

    let req = connect.sock.take_sent().remove(0);
    assert_eq!(req.observe(), Some(0));

    let mut first = response(&req, Type::Ack, code::CONTENT, b"1");
    first.set_observe(1);
    let mut second = response(&req, Type::Non, code::CONTENT, b"2");
    second.set_observe(2);
    connect.sock.push_msg(first);
    connect.sock.push_msg(second);
    assert_eq!(client.tick().unwrap(), 2);

    // the timeout no longer applies once notifications flow
    clock.set_millis(5_000);
    client.tick().unwrap();
    assert_eq!(client.queue().len(), 1);

    assert!(client.cancel(h));
    let outcomes = outcomes.lock().unwrap();
    let payloads = outcomes.iter()
                           .filter_map(|r| r.as_ref().ok())
                           .map(|r| r.payload().to_vec())
                           .collect::<Vec<_>>();
    assert_eq!(payloads, vec![b"1".to_vec(), b"2".to_vec()]);
    assert_eq!(outcomes.last().unwrap().as_ref().unwrap_err().what,
               What::Canceled);
  }

  #[test]
  fn observation_rejected() {
    let (client, _, connect) = connected();
    let outcomes = Outcomes::default();
    client.observe(Req::get("nope"), {
            let out = outcomes.clone();
            move |r| out.lock().unwrap().push(r)
          })
          .unwrap();

    let req = connect.sock.take_sent().remove(0);
    connect.sock
           .push_msg(response(&req, Type::Ack, code::NOT_FOUND, b""));
    client.tick().unwrap();

    assert_eq!(outcomes.lock().unwrap()[0].as_ref().unwrap().code(),
               code::NOT_FOUND);
    assert!(client.queue().is_empty());
  }

  #[test]
  fn rpc_over_observation() {
    let (client, _, connect) = connected();
    client.rpc()
          .register("add", |params, detail| {
            let sum: i64 = params.iter().filter_map(|p| p.as_i64()).sum();
            detail.insert("sum".into(), json!(sum));
            rpc::Status::Ok
          })
          .unwrap();

    client.observe_rpc().unwrap();
    let req = connect.sock.take_sent().remove(0);
    assert_eq!(req.path().as_deref(), Some(".rpc"));
    assert_eq!(req.accept(), Some(ContentFormat::Cbor));

    let call = json!({"id": "c1", "method": "add", "params": [1, 2, 3]});
    let mut notif = response(&req, Type::Con, code::CONTENT, &serde_cbor::to_vec(&call).unwrap());
    notif.set_observe(5);
    notif.set_content_format(ContentFormat::Cbor);
    connect.sock.push_msg(notif.clone());

    client.tick().unwrap();
    let sent = connect.sock.take_sent();
    assert_eq!(sent[0], notif.ack());

    let status = &sent[1];
    assert_eq!(status.path().as_deref(), Some(".rpc/status"));
    let body: serde_json::Value = serde_cbor::from_slice(&status.payload.0).unwrap();
    assert_eq!(body, json!({"id": "c1", "statusCode": 0, "detail": {"sum": 6}}));
    assert_eq!(client.queue().len(), 2);
  }

  #[test]
  fn settings_over_observation() {
    let (client, _, connect) = connected();
    client.settings().register(|key, value| match (key, value) {
                       | ("LOOP_DELAY_S", settings::Value::Int(_)) => settings::Status::Success,
                       | _ => settings::Status::KeyNotRecognized,
                     });

    client.observe_settings().unwrap();
    let req = connect.sock.take_sent().remove(0);

    let doc = json!({"version": 2, "settings": {"LOOP_DELAY_S": 5, "COLOR": "red"}});
    let mut notif = response(&req, Type::Non, code::CONTENT, doc.to_string().as_bytes());
    notif.set_observe(1);
    notif.set_content_format(ContentFormat::Json);
    connect.sock.push_msg(notif);

    client.tick().unwrap();
    let sent = connect.sock.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].path().as_deref(), Some(".c/status"));
    let body: serde_json::Value = serde_cbor::from_slice(&sent[0].payload.0).unwrap();
    assert_eq!(body,
               json!({"version": 2, "errors": [{"setting_key": "COLOR", "error_code": 1}]}));
  }

  #[test]
  fn inbound_requests() {
    let (client, _, connect) = connected();
    client.rpc().register("reboot", |_, _| rpc::Status::Ok).unwrap();

    let mut call = Message::new(Type::Con, Code::new(0, 2), Id(5), Token::opaque(b"srv"));
    call.set_path(".rpc");
    call.set_content_format(ContentFormat::Json);
    call.payload = Payload(br#"{"id": "9", "method": "reboot"}"#.to_vec());

    let mut other = Message::new(Type::Con, Code::new(0, 1), Id(6), Token::opaque(b"srv2"));
    other.set_path("nothing/here");

    connect.sock.push_msg(call.clone());
    connect.sock.push_msg(other.clone());
    client.tick().unwrap();

    let sent = connect.sock.take_sent();
    let reply_to = |m: &Message| sent.iter().find(|s| s.ty == Type::Ack && s.id == m.id).unwrap().code;
    assert_eq!(reply_to(&call), code::CHANGED);
    assert_eq!(reply_to(&other), code::NOT_FOUND);
    assert!(sent.iter().any(|s| s.path().as_deref() == Some(".rpc/status")));
  }

  #[test]
  fn send_blocking_round_trip() {
    let (client, _, connect) = connected();
    let client = Arc::new(client);

    let responder = {
      let client = client.clone();
      let sock = connect.sock.clone();
      std::thread::spawn(move || loop {
        let sent = sock.take_sent();
        if let Some(req) = sent.first() {
          sock.push_msg(response(req, Type::Ack, code::CONTENT, b"pong"));
          client.tick().unwrap();
          break;
        }
        std::thread::sleep(Duration::from_millis(1));
      })
    };

    let resp = client.send_blocking(Req::get("ping")).unwrap();
    responder.join().unwrap();
    assert_eq!(resp.payload_str(), Some("pong"));
  }

  #[test]
  fn send_blocking_is_bounded_without_rx_thread() {
    let (client, _, _) = connected();
    let err = client.send_blocking(Req::get("x").timeout(Timeout::Millis(10)))
                    .unwrap_err();
    assert_eq!(err.what, What::Timeout);
    assert!(client.queue().is_empty());
  }

  #[test]
  fn wakeup_interrupts_wait() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (client, _, _) = connected();
    let client = Arc::new(client.on_wakeup({
                                 let calls = calls.clone();
                                 move || {
                                   calls.fetch_add(1, Ordering::SeqCst);
                                 }
                               }));

    client.wait();
    client.wakeup();
    let started = std::time::Instant::now();
    client.wait();
    assert!(started.elapsed() < Duration::from_millis(40));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn run_returns_after_disconnect() {
    let (client, _, _) = connected();
    let client = Arc::new(client);
    let rx = {
      let client = client.clone();
      std::thread::spawn(move || client.run())
    };

    std::thread::sleep(Duration::from_millis(20));
    client.disconnect();
    assert_eq!(rx.join().unwrap(), Ok(()));
  }

  type Shared = Arc<Mutex<Option<Arc<Client<Platform>>>>>;

  #[test]
  fn observer_may_cancel_itself() {
    let (client, _, connect) = connected();
    let client = Arc::new(client);
    let me: Arc<Mutex<Option<(Arc<Client<Platform>>, Handle)>>> = Default::default();
    let got = Arc::new(Mutex::new(Vec::new()));

    let h = client.observe(Req::get("temp"), {
                    let me = me.clone();
                    let got = got.clone();
                    move |r| {
                      got.lock().unwrap().push(r.is_ok());
                      let entry = me.lock().unwrap().clone();
                      if let (true, Some((c, h))) = (r.is_ok(), entry) {
                        assert!(c.cancel(h));
                      }
                    }
                  })
                  .unwrap();
    *me.lock().unwrap() = Some((client.clone(), h));

    let req = connect.sock.take_sent().remove(0);
    let mut notif = response(&req, Type::Non, code::CONTENT, b"1");
    notif.set_observe(1);
    connect.sock.push_msg(notif);

    let (tx, rx) = mpsc::channel();
    let rx_thread = {
      let client = client.clone();
      std::thread::spawn(move || tx.send(client.tick()).unwrap())
    };

    let ticked = rx.recv_timeout(Duration::from_secs(3));
    assert!(matches!(ticked, Ok(Ok(1))));
    rx_thread.join().unwrap();

    assert_eq!(*got.lock().unwrap(), vec![true, false]);
    assert!(client.queue().is_empty());
    *me.lock().unwrap() = None;
  }

  #[test]
  fn connect_during_disconnect_stays_usable() {
    let (client, _, connect) = connected();
    let client = Arc::new(client);
    let shared: Shared = Default::default();
    *shared.lock().unwrap() = Some(client.clone());

    connect.sock.on_close.set({
                           let shared = shared.clone();
                           move || {
                             let c = shared.lock().unwrap().clone();
                             if let Some(c) = c {
                               c.connect().unwrap();
                             }
                           }
                         });

    let (before, f) = recorder();
    client.send(Req::get("before"), f).unwrap();
    client.disconnect();
    connect.sock.on_close.clear();
    *shared.lock().unwrap() = None;

    assert_eq!(before.lock().unwrap()[0].as_ref().unwrap_err().what,
               What::Disconnected);
    assert_eq!(client.state(), State::Connected);
    assert!(client.queue().is_connected());
    assert!(client.send(Req::get("after"), |_| ()).is_ok());
    assert_eq!(client.queue().len(), 1);
  }

  #[test]
  fn send_failure_racing_disconnect_completes_once() {
    let (client, _, connect) = connected();
    let client = Arc::new(client);
    let shared: Shared = Default::default();
    *shared.lock().unwrap() = Some(client.clone());

    connect.sock.fail_send.store(true, Ordering::SeqCst);
    connect.sock.on_send.set({
                          let shared = shared.clone();
                          move || {
                            let c = shared.lock().unwrap().clone();
                            if let Some(c) = c {
                              c.disconnect();
                            }
                          }
                        });

    let (outcomes, f) = recorder();
    let sent = client.send(Req::get("x"), f);
    connect.sock.on_send.clear();
    *shared.lock().unwrap() = None;

    assert!(sent.is_ok());
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].as_ref().unwrap_err().what, What::Disconnected);
    assert!(!client.is_connected());
  }

  #[test]
  fn send_blocking_with_longest_timeout() {
    let (client, _, connect) = connected();
    let client = Arc::new(client);

    let responder = {
      let client = client.clone();
      let sock = connect.sock.clone();
      std::thread::spawn(move || loop {
        let sent = sock.take_sent();
        if let Some(req) = sent.first() {
          sock.push_msg(response(req, Type::Ack, code::CONTENT, b"ok"));
          client.tick().unwrap();
          break;
        }
        std::thread::sleep(Duration::from_millis(1));
      })
    };

    let resp = client.send_blocking(Req::get("x").timeout(Timeout::Millis(u64::MAX)))
                     .unwrap();
    responder.join().unwrap();
    assert_eq!(resp.payload_str(), Some("ok"));
  }

  #[test]
  fn settings_request_without_callback_is_rejected() {
    let (client, _, connect) = connected();
    assert!(!client.settings().is_initialized());

    let mut push = Message::new(Type::Con, Code::new(0, 2), Id(9), Token::opaque(b"srv"));
    push.set_path(".c");
    push.set_content_format(ContentFormat::Json);
    push.payload = Payload(br#"{"version": 1, "settings": {"LOOP_DELAY_S": 5}}"#.to_vec());
    connect.sock.push_msg(push);

    client.tick().unwrap();
    let sent = connect.sock.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ty, Type::Ack);
    assert_eq!(sent[0].code, code::BAD_REQUEST);
  }

  #[test]
  fn response_without_token_does_not_complete_ping() {
    let (client, _, connect) = connected();
    let (outcomes, f) = recorder();
    client.ping(f).unwrap();
    let ping = connect.sock.take_sent().remove(0);

    connect.sock.push_msg(Message::new(Type::Non,
                                       code::CONTENT,
                                       Id(ping.id.0.wrapping_add(1)),
                                       Token::default()));
    client.tick().unwrap();
    assert!(outcomes.lock().unwrap().is_empty());
    assert_eq!(client.queue().len(), 1);

    connect.sock.push_msg(ping.reset());
    client.tick().unwrap();
    assert!(outcomes.lock().unwrap()[0].is_ok());
  }
}
