//! Lock-guarded transfer buffers shared between the worker and callers.

use parking_lot::Mutex;
use regex::bytes::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Byte buffer with a lock-free "has data" fast path.
///
/// The flag only flips while the data lock is held, so an unlocked load is a
/// hint: a stale true costs one lock round trip, a stale false is resolved by
/// the next call.
#[derive(Debug, Default)]
pub(crate) struct TransferBuffer {
    data: Mutex<Vec<u8>>,
    has_data: AtomicBool,
}

impl TransferBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_data(&self) -> bool {
        self.has_data.load(Ordering::Relaxed)
    }

    /// Append under the lock, waiting as long as it takes.
    pub fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut data = self.data.lock();
        data.extend_from_slice(bytes);
        self.has_data.store(true, Ordering::Relaxed);
    }

    /// Append if the lock can be taken within `wait`.
    ///
    /// False means the caller keeps the bytes and tries again later; nothing
    /// is ever dropped, only delayed.
    pub fn try_append_for(&self, bytes: &[u8], wait: Duration) -> bool {
        if bytes.is_empty() {
            return true;
        }
        let Some(mut data) = self.data.try_lock_for(wait) else {
            return false;
        };
        data.extend_from_slice(bytes);
        self.has_data.store(true, Ordering::Relaxed);
        true
    }

    /// Remove and return the entire buffer.
    ///
    /// Destructive; the empty case returns without taking the lock.
    pub fn take(&self) -> Vec<u8> {
        if !self.has_data() {
            return Vec::new();
        }
        let mut data = self.data.lock();
        self.has_data.store(false, Ordering::Relaxed);
        std::mem::take(&mut *data)
    }

    /// Cut the first match of `pattern` out of the buffer.
    ///
    /// The buffer keeps only the suffix after the match; bytes before the
    /// match are consumed with it. `None` leaves the buffer untouched.
    pub fn extract_first(&self, pattern: &Regex) -> Option<Vec<u8>> {
        if !self.has_data() {
            return None;
        }
        let mut data = self.data.lock();
        let found = Self::cut_first(&mut data, pattern);
        if data.is_empty() {
            self.has_data.store(false, Ordering::Relaxed);
        }
        found
    }

    /// Cut every match out in one locked pass.
    ///
    /// Data appended while the scan holds the lock is delivered by a later
    /// call, not this one.
    pub fn extract_all(&self, pattern: &Regex) -> Vec<Vec<u8>> {
        if !self.has_data() {
            return Vec::new();
        }
        let mut data = self.data.lock();
        let mut found = Vec::new();
        while let Some(matched) = Self::cut_first(&mut data, pattern) {
            found.push(matched);
        }
        if data.is_empty() {
            self.has_data.store(false, Ordering::Relaxed);
        }
        found
    }

    fn cut_first(data: &mut Vec<u8>, pattern: &Regex) -> Option<Vec<u8>> {
        let m = pattern.find(data)?;
        // A zero-width match would make no progress.
        if m.end() == 0 {
            return None;
        }
        let matched = data[m.start()..m.end()].to_vec();
        data.drain(..m.end());
        Some(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_is_destructive() {
        let buffer = TransferBuffer::new();
        buffer.append(b"payload");

        assert!(buffer.has_data());
        assert_eq!(buffer.take(), b"payload");
        assert!(!buffer.has_data());
        assert_eq!(buffer.take(), b"");
    }

    #[test]
    fn test_append_accumulates_in_order() {
        let buffer = TransferBuffer::new();
        buffer.append(b"one");
        buffer.append(b"two");
        assert_eq!(buffer.take(), b"onetwo");
    }

    #[test]
    fn test_empty_append_does_not_raise_the_flag() {
        let buffer = TransferBuffer::new();
        buffer.append(b"");
        assert!(!buffer.has_data());
        assert!(buffer.try_append_for(b"", Duration::from_millis(1)));
        assert!(!buffer.has_data());
    }

    #[test]
    fn test_try_append_gives_up_while_the_lock_is_held() {
        let buffer = TransferBuffer::new();
        let guard = buffer.data.lock();
        assert!(!buffer.try_append_for(b"late", Duration::from_millis(5)));
        drop(guard);
        assert!(buffer.try_append_for(b"late", Duration::from_millis(5)));
        assert_eq!(buffer.take(), b"late");
    }

    #[test]
    fn test_extract_first_consumes_through_the_match() {
        let buffer = TransferBuffer::new();
        buffer.append(b"noise<msg:1>tail");
        let pattern = Regex::new(r"<msg:\d+>").unwrap();

        let matched = buffer.extract_first(&pattern).unwrap();
        assert_eq!(matched, b"<msg:1>");
        // The prefix before the match went with it; only the suffix remains.
        assert_eq!(buffer.take(), b"tail");
    }

    #[test]
    fn test_extract_first_without_match_leaves_buffer_untouched() {
        let buffer = TransferBuffer::new();
        buffer.append(b"incomplete<msg");
        let pattern = Regex::new(r"<msg:\d+>").unwrap();

        assert_eq!(buffer.extract_first(&pattern), None);
        assert!(buffer.has_data());
        assert_eq!(buffer.take(), b"incomplete<msg");
    }

    #[test]
    fn test_extract_first_consumes_one_match_per_call() {
        let buffer = TransferBuffer::new();
        buffer.append(b"<a><b>");
        let pattern = Regex::new(r"<[ab]>").unwrap();

        assert_eq!(buffer.extract_first(&pattern).unwrap(), b"<a>");
        assert_eq!(buffer.extract_first(&pattern).unwrap(), b"<b>");
        assert_eq!(buffer.extract_first(&pattern), None);
        assert!(!buffer.has_data());
    }

    #[test]
    fn test_extract_all_collects_every_match_and_clears_the_flag() {
        let buffer = TransferBuffer::new();
        buffer.append(b"x<1>y<2>z<3>");
        let pattern = Regex::new(r"<\d>").unwrap();

        let matches = buffer.extract_all(&pattern);
        assert_eq!(matches, vec![b"<1>".to_vec(), b"<2>".to_vec(), b"<3>".to_vec()]);
        assert!(!buffer.has_data());
        assert_eq!(buffer.take(), b"");
    }

    #[test]
    fn test_extract_all_keeps_the_unmatched_suffix() {
        let buffer = TransferBuffer::new();
        buffer.append(b"<1>partial<");
        let pattern = Regex::new(r"<\d>").unwrap();

        let matches = buffer.extract_all(&pattern);
        assert_eq!(matches, vec![b"<1>".to_vec()]);
        assert!(buffer.has_data());
        assert_eq!(buffer.take(), b"partial<");
    }

    #[test]
    fn test_zero_width_matches_terminate() {
        let buffer = TransferBuffer::new();
        buffer.append(b"bbbb");
        // Matches the empty string at position zero.
        let pattern = Regex::new(r"a*").unwrap();

        assert_eq!(buffer.extract_first(&pattern), None);
        assert!(buffer.extract_all(&pattern).is_empty());
        assert_eq!(buffer.take(), b"bbbb");
    }
}
