use embedded_time::duration::Milliseconds;

/// A duration, in milliseconds
pub type Millis = Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Timeout configuration allowing for "never time out" as an option
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub enum Timeout {
  /// Timeout after some number of milliseconds has elapsed
  Millis(u64),
  /// Never time out
  Never,
}

impl Timeout {
  /// The deadline for something that started at `start` (millis since the clock's epoch)
  ///
  /// ```
  /// use toad_cloud::time::Timeout;
  ///
  /// assert_eq!(Timeout::Millis(2_000).deadline_from(500), Some(2_500));
  /// assert_eq!(Timeout::Never.deadline_from(500), None);
  /// ```
  pub fn deadline_from(&self, start: u64) -> Option<u64> {
    match self {
      | Timeout::Millis(ms) => Some(start.saturating_add(*ms)),
      | Timeout::Never => None,
    }
  }
}

impl From<Millis> for Timeout {
  fn from(Milliseconds(ms): Millis) -> Self {
    Timeout::Millis(ms)
  }
}

/// Milliseconds elapsed since the clock's epoch
pub fn now_millis<C: Clock>(clock: &C) -> Result<u64, embedded_time::clock::Error> {
  let now = clock.try_now()?;
  Millis::try_from(now.duration_since_epoch()).map(|Milliseconds(ms)| ms)
                                              .map_err(|_| embedded_time::clock::Error::Unspecified)
}
