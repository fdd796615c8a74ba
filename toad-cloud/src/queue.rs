use std::sync::{Arc, Mutex, PoisonError};

use toad_cloud_msg::{Id, Token};

use crate::error::{Error, What, When};
use crate::resp::Resp;
use crate::retry::{RetryTimer, YouShould};

/// Invoked once with the outcome of a request
pub type OnComplete = Box<dyn FnOnce(Result<Resp, Error>) + Send>;

type NotifyFn = Box<dyn FnMut(Result<Resp, Error>) + Send>;

struct ObserverState {
  f: Option<NotifyFn>,
  finished: bool,
  last: Option<Result<Resp, Error>>,
}

/// Callback of an observation, invoked once per notification and
/// a final time with the outcome that ended the observation.
///
/// The callback is never invoked with a lock held, so it may cancel its
/// own observation (or disconnect the client). Nothing is delivered after
/// the final outcome.
pub struct Observer {
  state: Mutex<ObserverState>,
}

impl core::fmt::Debug for Observer {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let st = self.lock();
    f.debug_struct("Observer")
     .field("finished", &st.finished)
     .field("busy", &st.f.is_none())
     .finish()
  }
}

impl Observer {
  pub(crate) fn new(f: impl FnMut(Result<Resp, Error>) + Send + 'static) -> Self {
    Self { state: Mutex::new(ObserverState { f: Some(Box::new(f)),
                                             finished: false,
                                             last: None }) }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, ObserverState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Has the final outcome been delivered (or queued for delivery)?
  pub fn is_finished(&self) -> bool {
    self.lock().finished
  }

  /// Deliver one notification, unless the observation already ended
  pub(crate) fn notify(&self, notification: Result<Resp, Error>) {
    let mut f = {
      let mut st = self.lock();
      if st.finished {
        return;
      }

      match st.f.take() {
        | Some(f) => f,
        | None => return,
      }
    };

    f(notification);

    // the observation may have ended while `f` ran
    let last = {
      let mut st = self.lock();
      match st.last.take() {
        | Some(last) => last,
        | None => {
          st.f = Some(f);
          return;
        },
      }
    };

    f(last);
  }

  /// Deliver the final outcome; later notifications are dropped
  pub(crate) fn finish(&self, outcome: Result<Resp, Error>) {
    let mut st = self.lock();
    if st.finished {
      return;
    }

    st.finished = true;
    match st.f.take() {
      | Some(mut f) => {
        drop(st);
        f(outcome);
      },
      // `notify` holds the callback and delivers this when it returns
      | None => st.last = Some(outcome),
    }
  }
}

/// Shared handle to an [`Observer`]
pub type OnNotify = Arc<Observer>;

/// Where the outcome of a pending request goes
pub(crate) enum Completion {
  /// An ordinary request
  Once(OnComplete),
  /// A long-lived observation
  Observe(OnNotify),
  /// The client's observation of the RPC resource
  Rpc,
  /// The client's observation of the settings resource
  Settings,
}

impl core::fmt::Debug for Completion {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Completion::Once(_) => write!(f, "Once"),
      | Completion::Observe(_) => write!(f, "Observe"),
      | Completion::Rpc => write!(f, "Rpc"),
      | Completion::Settings => write!(f, "Settings"),
    }
  }
}

/// A request awaiting its response.
///
/// The completion handler is only reachable through an owned `Pending`,
/// which only [`Queue::remove`], [`Queue::sweep`], [`Queue::drain_all`] and `Queue::close` hand out;
/// [`Pending::complete`] consumes it.
#[derive(Debug)]
pub struct Pending {
  pub(crate) token: Token,
  pub(crate) id: Id,
  pub(crate) completion: Completion,
  pub(crate) deadline: Option<u64>,
  pub(crate) retry: Option<RetryTimer>,
  pub(crate) bytes: Vec<u8>,
  pub(crate) ping: bool,
}

impl Pending {
  /// Token correlating this request with its response
  pub fn token(&self) -> Token {
    self.token
  }

  /// Message id correlating this request with its ACK / RST
  pub fn id(&self) -> Id {
    self.id
  }

  /// Is this a long-lived observation?
  pub fn is_observation(&self) -> bool {
    !matches!(self.completion, Completion::Once(_))
  }

  /// Deliver the outcome of this request.
  pub fn complete(self, result: Result<Resp, Error>) {
    match self.completion {
      | Completion::Once(f) => f(result),
      | Completion::Observe(f) => f.finish(result),
      | Completion::Rpc | Completion::Settings => match result {
        | Ok(_) => log::debug!("observation {:?} ended", self.token),
        | Err(e) => log::warn!("observation {:?} ended: {}", self.token, e),
      },
    }
  }
}

/// Reference to a request in a [`Queue`].
///
/// Handles are generation-checked; a handle to a request that was
/// removed never refers to a request enqueued into the same slot later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
  ix: usize,
  gen: u32,
}

#[derive(Debug, Default)]
struct Slot {
  gen: u32,
  pending: Option<Pending>,
}

#[derive(Debug, Default)]
struct Slots {
  slots: Vec<Slot>,
  free: Vec<usize>,
  len: usize,
  connected: bool,
}

impl Slots {
  fn detach(&mut self, ix: usize) -> Option<Pending> {
    let slot = self.slots.get_mut(ix)?;
    let pending = slot.pending.take()?;
    slot.gen = slot.gen.wrapping_add(1);
    self.free.push(ix);
    self.len -= 1;
    Some(pending)
  }

  fn detach_all(&mut self) -> Vec<Pending> {
    let ixs = self.handles().map(|(h, _)| h.ix).collect::<Vec<_>>();
    ixs.into_iter().filter_map(|ix| self.detach(ix)).collect()
  }

  fn handles(&self) -> impl Iterator<Item = (Handle, &Pending)> {
    self.slots.iter().enumerate().filter_map(|(ix, slot)| {
                                   slot.pending
                                       .as_ref()
                                       .map(|p| (Handle { ix, gen: slot.gen }, p))
                                 })
  }

  fn find(&self, f: impl Fn(&Pending) -> bool) -> Option<Handle> {
    self.handles().find(|(_, p)| f(p)).map(|(h, _)| h)
  }
}

/// Outcome of a [`Queue::sweep`]
#[derive(Debug, Default)]
pub(crate) struct Sweep {
  /// Requests past their deadline (or out of retransmissions), detached
  pub(crate) expired: Vec<Pending>,
  /// Encoded requests due for retransmission
  pub(crate) retransmit: Vec<(Token, Vec<u8>)>,
  /// Earliest deadline or retransmission among the requests still pending
  pub(crate) next: Option<u64>,
}

/// In-flight requests awaiting a response or timeout
#[derive(Debug, Default)]
pub struct Queue {
  inner: Mutex<Slots>,
  bound: Option<usize>,
}

impl Queue {
  /// Create a queue, optionally bounding the number of pending requests
  pub fn new(bound: Option<usize>) -> Self {
    Self { inner: Mutex::new(Slots::default()),
           bound }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Insert a request.
  ///
  /// Fails with [`What::NotConnected`] while disconnected and [`What::QueueFull`]
  /// when the bound is reached; the request is handed back uncompleted.
  pub(crate) fn enqueue(&self, pending: Pending) -> Result<Handle, (What, Pending)> {
    let mut q = self.lock();

    if !q.connected {
      return Err((What::NotConnected, pending));
    }

    if self.bound.map(|b| q.len >= b).unwrap_or(false) {
      return Err((What::QueueFull, pending));
    }

    q.len += 1;
    let handle = match q.free.pop() {
      | Some(ix) => {
        let slot = &mut q.slots[ix];
        slot.pending = Some(pending);
        Handle { ix, gen: slot.gen }
      },
      | None => {
        q.slots.push(Slot { gen: 0,
                            pending: Some(pending) });
        Handle { ix: q.slots.len() - 1,
                 gen: 0 }
      },
    };

    Ok(handle)
  }

  /// Detach a request. Idempotent; a handle that no longer
  /// refers to a pending request yields `None`.
  pub fn remove(&self, handle: Handle) -> Option<Pending> {
    let mut q = self.lock();
    match q.slots.get(handle.ix) {
      | Some(slot) if slot.gen == handle.gen => q.detach(handle.ix),
      | _ => None,
    }
  }

  /// Find the request awaiting a response with this token
  ///
  /// Pings carry no token and await no response, so they never match.
  pub fn find_by_token(&self, token: Token) -> Option<Handle> {
    self.lock().find(|p| !p.ping && p.token == token)
  }

  /// Find the request sent with this message id
  pub fn find_by_id(&self, id: Id) -> Option<Handle> {
    self.lock().find(|p| p.id == id)
  }

  /// Stop retransmitting the request sent with this message id,
  /// yielding whether one was found.
  pub(crate) fn acked(&self, id: Id) -> bool {
    let mut q = self.lock();
    match q.slots
           .iter_mut()
           .filter_map(|s| s.pending.as_mut())
           .find(|p| p.id == id)
    {
      | Some(p) => {
        p.retry = None;
        true
      },
      | None => false,
    }
  }

  /// Look at a pending request without detaching it
  pub(crate) fn peek<R>(&self, handle: Handle, f: impl FnOnce(&Pending) -> R) -> Option<R> {
    let q = self.lock();
    q.slots
     .get(handle.ix)
     .filter(|s| s.gen == handle.gen)
     .and_then(|s| s.pending.as_ref())
     .map(f)
  }

  /// An observation received a notification; its deadline no longer applies
  pub(crate) fn observed(&self, handle: Handle) {
    let mut q = self.lock();
    if let Some(p) = q.slots
                      .get_mut(handle.ix)
                      .filter(|s| s.gen == handle.gen)
                      .and_then(|s| s.pending.as_mut())
    {
      p.deadline = None;
    }
  }

  /// Detach expired requests & collect due retransmissions
  pub(crate) fn sweep(&self, now: u64) -> Sweep {
    let mut q = self.lock();
    let mut sweep = Sweep::default();
    let mut expired = Vec::new();

    for (ix, slot) in q.slots.iter_mut().enumerate() {
      let p = match slot.pending.as_mut() {
        | Some(p) => p,
        | None => continue,
      };

      if p.deadline.map(|d| now >= d).unwrap_or(false) {
        expired.push(ix);
        continue;
      }

      if let Some(retry) = p.retry.as_mut() {
        match retry.what_should_i_do(now) {
          | Ok(YouShould::Retry) => {
            log::trace!("{:?} due for retransmission (attempt {})",
                        p.token,
                        retry.attempts().0);
            sweep.retransmit.push((p.token, p.bytes.clone()))
          },
          | Ok(YouShould::Cry) => {
            log::warn!("{:?} never acknowledged", p.token);
            expired.push(ix);
            continue;
          },
          | Err(_) => (),
        }
      }

      // a CON keeps its retry timer after the final attempt so the next sweep gives up on it
      let retry_at = p.retry
                      .as_ref()
                      .map(|r| r.next_attempt_at().unwrap_or(now));

      sweep.next = [sweep.next, p.deadline, retry_at].into_iter()
                                                       .flatten()
                                                       .min();
    }

    sweep.expired = expired.into_iter().filter_map(|ix| q.detach(ix)).collect();
    sweep
  }

  /// Detach every pending request, then complete each with `reason`
  /// outside the lock. Yields the number of requests drained.
  pub fn drain_all(&self, reason: What) -> usize {
    let drained = {
      let mut q = self.lock();
      q.detach_all()
    };

    let n = drained.len();
    drained.into_iter()
           .for_each(|p| p.complete(Err(When::None.what(reason.clone()))));
    n
  }

  /// Lower the connected flag & detach every pending request in one step,
  /// leaving the caller to complete them outside the lock.
  pub(crate) fn close(&self) -> Vec<Pending> {
    let mut q = self.lock();
    q.connected = false;
    q.detach_all()
  }

  /// Raise or lower the connected flag
  pub(crate) fn set_connected(&self, connected: bool) {
    self.lock().connected = connected;
  }

  /// Is the connected flag raised?
  pub fn is_connected(&self) -> bool {
    self.lock().connected
  }

  /// Number of pending requests
  pub fn len(&self) -> usize {
    self.lock().len
  }

  /// Are there no pending requests?
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
