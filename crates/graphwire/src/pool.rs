// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide cache of reusable typed buffers.
//!
//! Streams are created and torn down per connection; without a cache each
//! one reallocates the full set of per-kind buffers. The pool keeps a small
//! freelist per primitive kind behind its own mutex and is shared between
//! stream instances by `Arc`. A buffer is only returned to the pool by the
//! stream that owns it, after its last flush, so the pool never hands out
//! storage still referenced by in-flight data.

use parking_lot::Mutex;

/// Freelist length cap per kind.
const MAX_POOLED: usize = 16;

/// Generate a take/give pair per kind
macro_rules! impl_pool_kind {
    ($take:ident, $give:ident, $field:ident, $type:ty) => {
        /// Takes a cleared buffer with at least the requested capacity.
        pub fn $take(&self, capacity: usize) -> Vec<$type> {
            let mut list = self.$field.lock();
            while let Some(mut buf) = list.pop() {
                if buf.capacity() >= capacity {
                    buf.clear();
                    return buf;
                }
                // Undersized leftover from a stream with a smaller config.
            }
            Vec::with_capacity(capacity)
        }

        /// Returns a buffer to the freelist, dropping it if the list is full.
        pub fn $give(&self, buf: Vec<$type>) {
            let mut list = self.$field.lock();
            if list.len() < MAX_POOLED {
                list.push(buf);
            }
        }
    };
}

/// Per-kind buffer freelists. One mutex per kind keeps contention between
/// independent streams off each other's kinds.
#[derive(Default)]
pub struct BufferPool {
    u8s: Mutex<Vec<Vec<u8>>>,
    u16s: Mutex<Vec<Vec<u16>>>,
    i16s: Mutex<Vec<Vec<i16>>>,
    i32s: Mutex<Vec<Vec<i32>>>,
    i64s: Mutex<Vec<Vec<i64>>>,
    f32s: Mutex<Vec<Vec<f32>>>,
    f64s: Mutex<Vec<Vec<f64>>>,
}

impl BufferPool {
    /// Empty pool.
    pub fn new() -> Self {
        BufferPool::default()
    }

    impl_pool_kind!(take_u8, give_u8, u8s, u8);
    impl_pool_kind!(take_u16, give_u16, u16s, u16);
    impl_pool_kind!(take_i16, give_i16, i16s, i16);
    impl_pool_kind!(take_i32, give_i32, i32s, i32);
    impl_pool_kind!(take_i64, give_i64, i64s, i64);
    impl_pool_kind!(take_f32, give_f32, f32s, f32);
    impl_pool_kind!(take_f64, give_f64, f64s, f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_take_reuses_returned_buffer() {
        let pool = BufferPool::new();
        let mut buf = pool.take_i32(128);
        buf.push(7);
        let ptr = buf.as_ptr();
        pool.give_i32(buf);

        let again = pool.take_i32(64);
        assert_eq!(again.as_ptr(), ptr, "expected the pooled buffer back");
        assert!(again.is_empty(), "pooled buffer must come back cleared");
    }

    #[test]
    fn test_undersized_buffers_are_not_reissued() {
        let pool = BufferPool::new();
        pool.give_f64(Vec::with_capacity(4));
        let buf = pool.take_f64(512);
        assert!(buf.capacity() >= 512);
    }

    #[test]
    fn test_shared_across_threads() {
        let pool = Arc::new(BufferPool::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = pool.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let buf = pool.take_u8(1024);
                    pool.give_u8(buf);
                }
            }));
        }
        for h in handles {
            h.join().expect("worker panicked");
        }
    }
}
