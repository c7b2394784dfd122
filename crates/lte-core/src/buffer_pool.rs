use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

/// Default storage size of a pooled buffer, enough for the largest uplink transport block we build
pub const DEFAULT_BUFFER_CAPACITY: usize = 12756;

#[derive(Debug, PartialEq, Eq)]
pub struct BufferFull {
    pub capacity: usize,
    pub requested: usize,
}

/// Owned byte buffer with a fixed capacity and a logical length.
/// Storage of pooled buffers returns to the pool on drop.
pub struct ByteBuffer {
    data: Vec<u8>,
    len: usize,
    home: Option<Sender<Vec<u8>>>,
}

impl ByteBuffer {
    /// Unpooled buffer, mostly used by tests and tools
    pub fn new(capacity: usize) -> Self {
        ByteBuffer { data: vec![0; capacity], len: 0, home: None }
    }

    /// Unpooled buffer holding exactly `data`
    pub fn from_slice(data: &[u8]) -> Self {
        ByteBuffer { data: data.to_vec(), len: data.len(), home: None }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append bytes after the current logical end
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), BufferFull> {
        let new_len = self.len + bytes.len();
        if new_len > self.capacity() {
            return Err(BufferFull { capacity: self.capacity(), requested: new_len });
        }
        self.data[self.len..new_len].copy_from_slice(bytes);
        self.len = new_len;
        Ok(())
    }

    /// Drop the first `n` bytes, shifting the remainder to the front
    pub fn consume_front(&mut self, n: usize) {
        let n = n.min(self.len);
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }
}

impl Drop for ByteBuffer {
    fn drop(&mut self) {
        if let Some(home) = self.home.take() {
            // The free list is sized for every buffer of the pool, so this never blocks
            let _ = home.try_send(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteBuffer {{ len: {}, cap: {} }}", self.len, self.capacity())
    }
}

/// Fixed set of byte buffers shared by all layers of the stack.
/// Safe to allocate from and release to from any thread.
pub struct BufferPool {
    free_tx: Sender<Vec<u8>>,
    free_rx: Receiver<Vec<u8>>,
    nof_buffers: usize,
    capacity: usize,
    alloc_timeout: Duration,
}

impl BufferPool {
    pub fn new(nof_buffers: usize, capacity: usize, alloc_timeout: Duration) -> Arc<Self> {
        let (free_tx, free_rx) = bounded(nof_buffers);
        for _ in 0..nof_buffers {
            // Fresh channel with exactly nof_buffers slots
            let _ = free_tx.try_send(vec![0; capacity]);
        }
        Arc::new(BufferPool { free_tx, free_rx, nof_buffers, capacity, alloc_timeout })
    }

    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }

    pub fn nof_available(&self) -> usize {
        self.free_rx.len()
    }

    pub fn nof_in_use(&self) -> usize {
        self.nof_buffers - self.free_rx.len()
    }

    fn wrap(&self, mut data: Vec<u8>) -> ByteBuffer {
        if data.len() != self.capacity {
            data.resize(self.capacity, 0);
        }
        ByteBuffer { data, len: 0, home: Some(self.free_tx.clone()) }
    }

    /// Allocate without waiting. Used on the TTI-critical path.
    pub fn try_allocate(&self) -> Option<ByteBuffer> {
        match self.free_rx.try_recv() {
            Ok(data) => Some(self.wrap(data)),
            Err(_) => {
                tracing::warn!("buffer pool exhausted ({} buffers in use)", self.nof_buffers);
                None
            }
        }
    }

    /// Allocate, waiting at most the configured allocation timeout for a buffer to be released
    pub fn allocate(&self) -> Option<ByteBuffer> {
        match self.free_rx.recv_timeout(self.alloc_timeout) {
            Ok(data) => Some(self.wrap(data)),
            Err(_) => {
                tracing::warn!(
                    "buffer pool exhausted after waiting {:?} ({} buffers in use)",
                    self.alloc_timeout,
                    self.nof_buffers
                );
                None
            }
        }
    }

    /// Allocate without waiting and fill with `bytes`
    pub fn try_allocate_from(&self, bytes: &[u8]) -> Option<ByteBuffer> {
        let mut buf = self.try_allocate()?;
        match buf.append(bytes) {
            Ok(()) => Some(buf),
            Err(e) => {
                tracing::warn!("{} bytes do not fit pooled buffer of {} bytes", e.requested, e.capacity);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_release() {
        let pool = BufferPool::new(2, 16, Duration::from_millis(1));
        let a = pool.try_allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_eq!(pool.nof_in_use(), 2);
        assert!(pool.try_allocate().is_none());
        assert!(pool.allocate().is_none());
        drop(a);
        assert_eq!(pool.nof_available(), 1);
        drop(b);
        assert_eq!(pool.nof_available(), 2);
    }

    #[test]
    fn test_length_bounds() {
        let pool = BufferPool::new(1, 4, Duration::from_millis(1));
        let mut buf = pool.try_allocate_from(&[1, 2, 3]).unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
        assert_eq!(buf.append(&[4, 5]), Err(BufferFull { capacity: 4, requested: 5 }));
        buf.consume_front(1);
        assert_eq!(buf.as_slice(), &[2, 3]);
        drop(buf);
        // Reused storage starts out empty
        let buf = pool.try_allocate().unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);
    }

    #[test]
    fn test_cross_thread_release() {
        let pool = BufferPool::new(1, 8, Duration::from_millis(200));
        let buf = pool.try_allocate().unwrap();
        let handle = std::thread::spawn(move || drop(buf));
        let again = pool.allocate();
        handle.join().unwrap();
        assert!(again.is_some());
    }
}
