/// A cursor over a byte buffer (e.g. `Vec<u8>`, `&[u8]`)
///
/// Every read advances the cursor; reads that ask for more bytes
/// than remain either yield `None` (`*_exact`) or whatever is left.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor<T> {
  t: T,
  cursor: usize,
  len: usize,
}

impl<T: AsRef<[u8]>> Cursor<T> {
  /// Create a new cursor positioned at the start of `t`
  pub fn new(t: T) -> Cursor<T> {
    let len = t.as_ref().len();
    Cursor { t, cursor: 0, len }
  }

  /// Unwrap the cursor, discarding its position
  pub fn into_inner(self) -> T {
    self.t
  }

  fn peek_(len: usize, cursor: usize, t: &T, n: usize) -> Option<&[u8]> {
    if n > len - cursor {
      None
    } else {
      Some(&t.as_ref()[cursor..cursor + n])
    }
  }

  /// Take the next byte
  pub fn next(&mut self) -> Option<u8> {
    self.take_exact(1).map(|a| a[0])
  }

  /// Take `n` bytes, or everything remaining if there are fewer than `n`
  pub fn take(&mut self, n: usize) -> &[u8] {
    let n = n.min(self.remaining());
    let start = self.cursor;
    self.cursor += n;
    &self.t.as_ref()[start..start + n]
  }

  /// Take exactly `n` bytes, yielding `None` and leaving the
  /// cursor untouched if there are fewer than `n` remaining
  pub fn take_exact(&mut self, n: usize) -> Option<&[u8]> {
    Self::peek_(self.len, self.cursor, &self.t, n).map(|a| {
                                                    self.cursor += n;
                                                    a
                                                  })
  }

  /// Look at the next `n` bytes without advancing
  pub fn peek_exact(&self, n: usize) -> Option<&[u8]> {
    Self::peek_(self.len, self.cursor, &self.t, n)
  }

  /// Take every remaining byte
  pub fn take_until_end(&mut self) -> &[u8] {
    let start = self.cursor;
    self.cursor = self.len;
    &self.t.as_ref()[start..]
  }

  /// Number of bytes not yet consumed
  pub fn remaining(&self) -> usize {
    self.len - self.cursor
  }

  /// Have all bytes been consumed?
  pub fn is_exhausted(&self) -> bool {
    self.cursor >= self.len
  }

  /// Number of bytes consumed so far
  pub fn position(&self) -> usize {
    self.cursor
  }
}
