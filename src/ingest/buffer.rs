//! Fixed-capacity byte window used by the frame scanner.
//!
//! Markers can straddle two `read()` calls, so the scanner keeps a small
//! window of recent bytes rather than looking at each chunk in isolation.
//! All shrinking is explicit: [`RollingBuffer::keep_tail`] and
//! [`RollingBuffer::drop_front`] are the only ways bytes leave the window.

/// Byte window with capacity `N`.
pub struct RollingBuffer<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> Default for RollingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RollingBuffer<N> {
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    /// Append one byte.  Returns `false` (byte not stored) when full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len == N {
            return false;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        true
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Position of the first occurrence of `needle`.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.len {
            return None;
        }
        self.as_slice()
            .windows(needle.len())
            .position(|w| w == needle)
    }

    /// Keep only the last `n` bytes, shifted to the front.
    pub fn keep_tail(&mut self, n: usize) {
        if n >= self.len {
            return;
        }
        let start = self.len - n;
        self.buf.copy_within(start..self.len, 0);
        self.len = n;
    }

    /// Discard the first `n` bytes, shifting the rest to the front.
    pub fn drop_front(&mut self, n: usize) {
        if n >= self.len {
            self.len = 0;
            return;
        }
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }
}
