// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The buffered primitive codec.
//!
//! Values of each primitive kind accumulate in their own fixed-capacity
//! buffer. When any buffer would overflow, every buffer is flushed as one
//! "bunch": a header of one u16 count per kind, then each non-empty buffer
//! contiguously in fixed kind order, then the payloads of any large arrays
//! queued during the bunch, in push order. The header slot of the bool kind
//! carries the queued-array count; scalar bools ride the u8 buffer, so the
//! slot is free.
//!
//! The reader mirrors the cycle: it pulls a header, bulk-reads the announced
//! buffers, and serves individual reads from them until a kind runs dry,
//! which transparently triggers the next receive. Writing values one at a
//! time or as a bulk array decodes identically regardless of where flush
//! boundaries fall; only the framing differs.
//!
//! Arrays whose encoded size reaches the configured small-array bound skip
//! the per-element path and transfer as one contiguous block.

mod reader;
mod writer;

pub use reader::BunchReader;
pub use writer::BunchWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelAccumulator, ChannelDissipator, MemChannel};
    use crate::config::StreamConfig;
    use crate::wire::{PrimKind, HEADER_SLOTS};

    fn writer(cfg: &StreamConfig) -> (BunchWriter, MemChannel) {
        let chan = MemChannel::new();
        let acc = ChannelAccumulator::new(chan.clone());
        (BunchWriter::new(Box::new(acc), cfg.clone()), chan)
    }

    fn reader(cfg: &StreamConfig, bytes: Vec<u8>) -> BunchReader {
        let dis = ChannelDissipator::new(std::io::Cursor::new(bytes));
        BunchReader::new(Box::new(dis), cfg.clone())
    }

    #[test]
    fn test_scalar_interleaving_roundtrip() {
        let cfg = StreamConfig::default();
        let (mut w, chan) = writer(&cfg);
        w.write_bool(true).expect("write");
        w.write_i32(-5).expect("write");
        w.write_f64(2.5).expect("write");
        w.write_i32(19).expect("write");
        w.write_u16(700).expect("write");
        w.flush().expect("flush");

        let mut r = reader(&cfg, chan.take());
        assert!(r.read_bool().expect("read"));
        assert_eq!(r.read_i32().expect("read"), -5);
        assert_eq!(r.read_f64().expect("read"), 2.5);
        assert_eq!(r.read_i32().expect("read"), 19);
        assert_eq!(r.read_u16().expect("read"), 700);
    }

    #[test]
    fn test_bunch_boundary_scenario_three_ints_capacity_two() {
        // Capacity 2 for i32 forces [1, 2] into the first bunch and [3]
        // into a second one; decoding is oblivious to the boundary.
        let cfg = StreamConfig {
            buffer_bytes: HEADER_SLOTS * 2 + 2 * 4,
            ..StreamConfig::default()
        };
        assert_eq!(cfg.typed_capacity(PrimKind::I32), 2);

        let (mut w, chan) = writer(&cfg);
        for v in [1i32, 2, 3] {
            w.write_i32(v).expect("write");
        }
        w.flush().expect("flush");
        assert_eq!(w.bunches_flushed(), 2, "expected exactly two bunches");
        let bytes = chan.take();

        // First bunch header announces two ints, second announces one.
        let slot = PrimKind::I32.slot() * 2;
        let first = u16::from_le_bytes([bytes[slot], bytes[slot + 1]]);
        assert_eq!(first, 2);
        let second_base = HEADER_SLOTS * 2 + 2 * 4;
        let second =
            u16::from_le_bytes([bytes[second_base + slot], bytes[second_base + slot + 1]]);
        assert_eq!(second, 1);

        let mut r = reader(&cfg, bytes);
        let mut back = [0i32; 3];
        for slot in &mut back {
            *slot = r.read_i32().expect("read");
        }
        assert_eq!(back, [1, 2, 3]);
    }

    #[test]
    fn test_large_array_bypasses_buffers() {
        let cfg = StreamConfig::default();
        let data: Vec<f64> = (0..1000).map(|i| i as f64 * 0.5).collect();
        assert!(data.len() >= cfg.small_array_limit(PrimKind::F64));

        let (mut w, chan) = writer(&cfg);
        w.write_i32(11).expect("write scalar");
        w.write_f64_slice(&data).expect("write bulk");
        w.write_i32(22).expect("write scalar");
        w.flush().expect("flush");

        let mut r = reader(&cfg, chan.take());
        assert_eq!(r.read_i32().expect("read"), 11);
        let mut back = vec![0f64; data.len()];
        r.read_f64_slice(&mut back).expect("read bulk");
        assert_eq!(back, data);
        assert_eq!(r.read_i32().expect("read"), 22);
    }

    #[test]
    fn test_small_array_funnels_through_elements() {
        let cfg = StreamConfig::default();
        let data = [5i16, -6, 7];
        let (mut w, chan) = writer(&cfg);
        w.write_i16_slice(&data).expect("write");
        w.flush().expect("flush");
        let bytes = chan.take();

        // One bunch, no deferred arrays announced.
        let bool_slot = PrimKind::Bool.slot() * 2;
        assert_eq!(
            u16::from_le_bytes([bytes[bool_slot], bytes[bool_slot + 1]]),
            0
        );

        let mut r = reader(&cfg, bytes);
        // Element-by-element reads see the slice values.
        for want in data {
            assert_eq!(r.read_i16().expect("read"), want);
        }
    }

    #[test]
    fn test_bulk_write_element_read_equivalence() {
        // Batch boundary transparency: bulk-written data read one value at a
        // time matches, and vice versa, with a buffer smaller than the data.
        let cfg = StreamConfig::with_buffer_bytes(64);
        let data: Vec<i32> = (0..200).map(|i| i * 7 - 300).collect();

        let (mut w, chan) = writer(&cfg);
        for &v in &data {
            w.write_i32(v).expect("write element");
        }
        w.flush().expect("flush");
        let mut r = reader(&cfg, chan.take());
        let mut bulk = vec![0i32; data.len()];
        r.read_i32_slice(&mut bulk).expect("read bulk");
        assert_eq!(bulk, data);
    }

    #[test]
    fn test_utf_roundtrip_including_null() {
        let cfg = StreamConfig::default();
        let (mut w, chan) = writer(&cfg);
        w.write_utf(Some("grüß gott ✓")).expect("write utf");
        w.write_utf(None).expect("write null utf");
        w.write_utf(Some("")).expect("write empty utf");
        w.flush().expect("flush");

        let mut r = reader(&cfg, chan.take());
        assert_eq!(
            r.read_utf().expect("read utf").as_deref(),
            Some("grüß gott ✓")
        );
        assert_eq!(r.read_utf().expect("read utf"), None);
        assert_eq!(r.read_utf().expect("read utf").as_deref(), Some(""));
    }

    #[test]
    fn test_available_reflects_buffered_data() {
        let cfg = StreamConfig::default();
        let (mut w, chan) = writer(&cfg);
        w.write_i64(1).expect("write");
        w.write_i64(2).expect("write");
        w.flush().expect("flush");

        let mut r = reader(&cfg, chan.take());
        assert_eq!(r.read_i64().expect("read"), 1);
        assert!(r.available() >= 8, "one i64 should still be buffered");
    }

    #[test]
    fn test_char_and_unsigned_shims() {
        let cfg = StreamConfig::default();
        let (mut w, chan) = writer(&cfg);
        w.write_char('λ').expect("write char");
        w.write_u32(u32::MAX).expect("write u32");
        w.write_u64(u64::MAX - 1).expect("write u64");
        w.write_i8(-100).expect("write i8");
        w.flush().expect("flush");

        let mut r = reader(&cfg, chan.take());
        assert_eq!(r.read_char().expect("read char"), 'λ');
        assert_eq!(r.read_u32().expect("read u32"), u32::MAX);
        assert_eq!(r.read_u64().expect("read u64"), u64::MAX - 1);
        assert_eq!(r.read_i8().expect("read i8"), -100);
    }

    #[test]
    fn test_pooled_buffers_are_reused_across_streams() {
        use crate::pool::BufferPool;
        use std::sync::Arc;

        let pool = Arc::new(BufferPool::new());
        let cfg = StreamConfig::default();

        let chan = MemChannel::new();
        let acc = ChannelAccumulator::new(chan.clone());
        let mut w = BunchWriter::with_pool(Box::new(acc), cfg.clone(), pool.clone());
        w.write_i32(77).expect("write");
        w.close().expect("close returns buffers");

        // A second stream drawing from the same pool decodes cleanly; the
        // recycled buffers carry no stale data.
        let chan2 = MemChannel::new();
        let acc2 = ChannelAccumulator::new(chan2.clone());
        let mut w2 = BunchWriter::with_pool(Box::new(acc2), cfg.clone(), pool);
        w2.write_i32(88).expect("write");
        w2.flush().expect("flush");

        let mut r = reader(&cfg, chan.take());
        assert_eq!(r.read_i32().expect("read"), 77);
        let mut r2 = reader(&cfg, chan2.take());
        assert_eq!(r2.read_i32().expect("read"), 88);
    }

    #[test]
    fn test_invalid_char_is_corruption() {
        let cfg = StreamConfig::default();
        let (mut w, chan) = writer(&cfg);
        w.write_i32(0xD800i32).expect("write surrogate scalar");
        w.flush().expect("flush");

        let mut r = reader(&cfg, chan.take());
        let err = r.read_char().unwrap_err();
        assert!(
            matches!(err, crate::error::Error::StreamCorrupted { .. }),
            "got {err}"
        );
    }
}
