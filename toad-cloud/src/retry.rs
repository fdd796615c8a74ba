use core::ops::RangeInclusive;

use embedded_time::duration::Milliseconds;
use rand::{Rng, SeedableRng};

/// A non-blocking timer that allows a fixed-delay or exponential-backoff retry,
/// that lives alongside some operation to retry.
///
/// Timestamps are milliseconds since the client clock's epoch
/// (see [`crate::time::now_millis`]).
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use toad_cloud::retry;
///
/// let strategy = retry::Strategy::Delay { min: Milliseconds(1_000),
///                                         max: Milliseconds(1_000) };
/// let mut retry = retry::RetryTimer::new(0, strategy, retry::Attempts(2));
///
/// assert_eq!(retry.next_attempt_at(), Some(1_000));
/// assert_eq!(retry.what_should_i_do(500), Err(nb::Error::WouldBlock));
/// assert_eq!(retry.what_should_i_do(1_000), Ok(retry::YouShould::Retry));
/// assert_eq!(retry.what_should_i_do(1_000), Ok(retry::YouShould::Cry));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer {
  start: u64,
  init: Milliseconds<u64>,
  strategy: Strategy,
  attempts: Attempts,
  max_attempts: Attempts,
}

/// A number of attempts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attempts(pub u16);

/// Result of [`RetryTimer::what_should_i_do`].
///
/// This tells you if a retry should be attempted or not.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Attempts have been exhausted and the work that is
  /// being retried should be considered poisoned.
  Cry,
  /// A retry should be performed
  Retry,
}

impl RetryTimer {
  /// Create a new retrier, where the first attempt happened at `start`
  pub fn new(start: u64, strategy: Strategy, max_attempts: Attempts) -> Self {
    Self { start,
           strategy,
           init: if strategy.has_jitter() {
             let mut rand = rand_chacha::ChaCha8Rng::seed_from_u64(start);
             Milliseconds(rand.gen_range(strategy.range()))
           } else {
             Milliseconds(*strategy.range().start())
           },
           max_attempts,
           attempts: Attempts(1) }
  }

  /// When the thing we keep trying fails, invoke this to
  /// tell the retrytimer "it failed again! what do I do??"
  ///
  /// Returns `nb::Error::WouldBlock` when we have not yet
  /// waited the appropriate amount of time to retry.
  pub fn what_should_i_do(&mut self, now: u64) -> nb::Result<YouShould, core::convert::Infallible> {
    if self.attempts >= self.max_attempts {
      Ok(YouShould::Cry)
    } else {
      let ready = self.is_ready(Milliseconds(now.saturating_sub(self.start)), self.attempts.0);
      if ready {
        self.attempts.0 += 1;
        Ok(YouShould::Retry)
      } else {
        Err(nb::Error::WouldBlock)
      }
    }
  }

  /// The instant at which [`RetryTimer::what_should_i_do`] will next
  /// say something other than `WouldBlock`.
  ///
  /// `None` once attempts are exhausted.
  pub fn next_attempt_at(&self) -> Option<u64> {
    if self.attempts >= self.max_attempts {
      return None;
    }

    let wait = match self.strategy {
      | Strategy::Delay { .. } => self.init.0 * self.attempts.0 as u64,
      | Strategy::Exponential { .. } => Strategy::total_delay_exp(self.init, self.attempts.0),
    };

    Some(self.start.saturating_add(wait))
  }

  /// Number of attempts made so far (including the first)
  pub fn attempts(&self) -> Attempts {
    self.attempts
  }

  /// Check if the strategy says an appropriate time has passed
  pub fn is_ready(&self, Milliseconds(time_passed): Milliseconds<u64>, attempts: u16) -> bool {
    if attempts == 0 {
      return true;
    }

    match self.strategy {
      | Strategy::Delay { .. } => time_passed >= (self.init.0 * attempts as u64),
      | Strategy::Exponential { .. } => {
        time_passed >= Strategy::total_delay_exp(self.init, attempts)
      },
    }
  }
}

/// Strategy to employ when retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  ///
  /// After each failed attempt, double the delay before retrying again.
  Exponential {
    /// Minimum (inclusive) delay for second attempt
    init_min: Milliseconds<u64>,
    /// Maximum (inclusive) delay for second attempt
    init_max: Milliseconds<u64>,
  },
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  Delay {
    /// Minimum (inclusive) delay for attempts
    min: Milliseconds<u64>,
    /// Maximum (inclusive) delay for attempts
    max: Milliseconds<u64>,
  },
}

impl Strategy {
  /// Are min & max delays the same? if so, we should probably skip the random number generation.
  pub fn has_jitter(&self) -> bool {
    let rng = self.range();
    rng.start() != rng.end()
  }

  /// Get the min & max durations as an inclusive range
  pub fn range(&self) -> RangeInclusive<u64> {
    match self {
      | &Self::Delay { min: Milliseconds(min),
                       max: Milliseconds(max), } => (min..=max),

      | &Self::Exponential { init_min: Milliseconds(min),
                             init_max: Milliseconds(max), } => (min..=max),
    }
  }

  /// Get the amount of time this strategy will take if all attempts fail
  pub fn max_time(&self, max_attempts: Attempts) -> Milliseconds<u64> {
    Milliseconds(match self {
                   | Self::Exponential { init_max, .. } => {
                     Self::total_delay_exp(*init_max, max_attempts.0)
                   },
                   | Self::Delay { max: Milliseconds(max),
                                   .. } => max * max_attempts.0 as u64,
                 })
  }

  /// Given the initial delay and number of attempts that have been performed,
  /// yields the delay until the next retry should be attempted.
  const fn total_delay_exp(Milliseconds(init): Milliseconds<u64>, attempt: u16) -> u64 {
    // | attempt | total delay      |
    // | 1       | init             |
    // | 2       | init * 2         |
    // | 3       | init * 4         |
    // | ...     | ...              |
    // | n       | init * 2^n       |
    init * 2u64.pow(attempt.saturating_sub(1) as u32)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn delay_retrier() {
    let mut retry = RetryTimer::new(0,
                                    Strategy::Delay { min: Milliseconds(1000),
                                                      max: Milliseconds(1000) },
                                    Attempts(5));

    // attempt 1 happens before asking what_should_i_do

    assert_eq!(retry.what_should_i_do(999).unwrap_err(), nb::Error::WouldBlock);
    assert_eq!(retry.what_should_i_do(1000).unwrap(), YouShould::Retry);
    // Fails again (attempt 2)

    assert_eq!(retry.what_should_i_do(1999).unwrap_err(), nb::Error::WouldBlock);
    assert_eq!(retry.what_should_i_do(2000).unwrap(), YouShould::Retry);
    // Fails again (attempt 3)

    assert_eq!(retry.what_should_i_do(10_000).unwrap(), YouShould::Retry);
    // Fails again (attempt 4)

    // the timer tracks total time waited, not time since the last attempt,
    // so a long stall lets the remaining attempts through at once
    assert_eq!(retry.what_should_i_do(10_000).unwrap(), YouShould::Retry);
    // Fails again (attempt 5)

    assert_eq!(retry.what_should_i_do(10_000).unwrap(), YouShould::Cry);
  }

  #[test]
  fn exponential_retrier() {
    let mut retry = RetryTimer::new(0,
                                    Strategy::Exponential { init_min: Milliseconds(1000),
                                                            init_max: Milliseconds(1000) },
                                    Attempts(6));

    // attempt 1 happens before asking what_should_i_do

    assert_eq!(retry.what_should_i_do(999).unwrap_err(), nb::Error::WouldBlock);
    assert_eq!(retry.what_should_i_do(1000).unwrap(), YouShould::Retry);
    assert_eq!(retry.what_should_i_do(1999).unwrap_err(), nb::Error::WouldBlock);
    assert_eq!(retry.what_should_i_do(2000).unwrap(), YouShould::Retry);
    assert_eq!(retry.what_should_i_do(3999).unwrap_err(), nb::Error::WouldBlock);
    assert_eq!(retry.what_should_i_do(4000).unwrap(), YouShould::Retry);
    assert_eq!(retry.what_should_i_do(8_000).unwrap(), YouShould::Retry);
    assert_eq!(retry.what_should_i_do(16_000).unwrap(), YouShould::Retry);
    assert_eq!(retry.what_should_i_do(16_000).unwrap(), YouShould::Cry);
  }

  #[test]
  fn next_attempt_tracks_attempts() {
    let mut retry = RetryTimer::new(100,
                                    Strategy::Exponential { init_min: Milliseconds(1000),
                                                            init_max: Milliseconds(1000) },
                                    Attempts(3));

    assert_eq!(retry.next_attempt_at(), Some(1_100));
    retry.what_should_i_do(1_100).unwrap();
    assert_eq!(retry.next_attempt_at(), Some(2_100));
    retry.what_should_i_do(2_100).unwrap();
    assert_eq!(retry.attempts(), Attempts(3));
    assert_eq!(retry.next_attempt_at(), None);
  }

  #[test]
  fn jitter_stays_in_range() {
    let strategy = Strategy::Exponential { init_min: Milliseconds(2_000),
                                           init_max: Milliseconds(3_000) };

    (0..32u64).for_each(|start| {
                let retry = RetryTimer::new(start, strategy, Attempts(4));
                let first = retry.next_attempt_at().unwrap() - start;
                assert!((2_000..=3_000).contains(&first));
              });
  }

  #[test]
  fn exp_calculation() {
    let init = Milliseconds(100);
    assert_eq!(Strategy::total_delay_exp(init, 1), 100);
    assert_eq!(Strategy::total_delay_exp(init, 2), 200);
    assert_eq!(Strategy::total_delay_exp(init, 3), 400);
  }
}
