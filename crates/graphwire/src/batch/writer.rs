// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write half of the bunch codec.

use std::sync::Arc;

use crate::channel::Accumulator;
use crate::config::StreamConfig;
use crate::error::Result;
use crate::pool::BufferPool;
use crate::wire::{PrimKind, HEADER_SLOTS};

/// A large array captured for bulk transfer after the typed buffers.
enum Deferred {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Generate the scalar write + slice write pair for one kind
macro_rules! impl_write_kind {
    ($scalar:ident, $slice:ident, $type:ty, $buf:ident, $kind:expr, $deferred:path) => {
        /// Buffers one value, flushing the bunch first if the kind's buffer
        /// is full.
        pub fn $scalar(&mut self, v: $type) -> Result<()> {
            if self.$buf.len() == self.caps[$kind.slot()] {
                self.flush_bunch()?;
            }
            self.$buf.push(v);
            Ok(())
        }

        /// Writes a slice: small ones element-by-element through the typed
        /// buffer, large ones as one bulk transfer queued for this bunch.
        pub fn $slice(&mut self, v: &[$type]) -> Result<()> {
            if v.len() < self.cfg.small_array_limit($kind) {
                for &x in v {
                    self.$scalar(x)?;
                }
            } else {
                if self.deferred.len() == self.queue_cap {
                    self.flush_bunch()?;
                }
                self.deferred.push($deferred(v.to_vec()));
            }
            Ok(())
        }
    };
}

/// Batches primitive values by kind and frames them into bunches on an
/// [`Accumulator`]. This is the full codec for data-mode streams and the
/// substrate the graph layer writes through.
pub struct BunchWriter {
    out: Box<dyn Accumulator>,
    cfg: StreamConfig,
    caps: [usize; HEADER_SLOTS],
    queue_cap: usize,
    pool: Option<Arc<BufferPool>>,
    u8_buf: Vec<u8>,
    u16_buf: Vec<u16>,
    i16_buf: Vec<i16>,
    i32_buf: Vec<i32>,
    i64_buf: Vec<i64>,
    f32_buf: Vec<f32>,
    f64_buf: Vec<f64>,
    deferred: Vec<Deferred>,
    bunches: u64,
}

impl BunchWriter {
    /// Writer with freshly allocated buffers.
    pub fn new(out: Box<dyn Accumulator>, cfg: StreamConfig) -> Self {
        Self::build(out, cfg, None)
    }

    /// Writer drawing its buffers from a shared pool; they are returned on
    /// `close`.
    pub fn with_pool(out: Box<dyn Accumulator>, cfg: StreamConfig, pool: Arc<BufferPool>) -> Self {
        Self::build(out, cfg, Some(pool))
    }

    fn build(out: Box<dyn Accumulator>, cfg: StreamConfig, pool: Option<Arc<BufferPool>>) -> Self {
        // Header counts are u16; clamp so a huge byte budget cannot
        // overflow a slot.
        let mut caps = [0usize; HEADER_SLOTS];
        for kind in PrimKind::ALL {
            caps[kind.slot()] = cfg.typed_capacity(kind).min(u16::MAX as usize);
        }
        let queue_cap = cfg.array_queue_len.clamp(1, u16::MAX as usize);
        let (u8_buf, u16_buf, i16_buf, i32_buf, i64_buf, f32_buf, f64_buf) = match &pool {
            Some(p) => (
                p.take_u8(caps[PrimKind::U8.slot()]),
                p.take_u16(caps[PrimKind::U16.slot()]),
                p.take_i16(caps[PrimKind::I16.slot()]),
                p.take_i32(caps[PrimKind::I32.slot()]),
                p.take_i64(caps[PrimKind::I64.slot()]),
                p.take_f32(caps[PrimKind::F32.slot()]),
                p.take_f64(caps[PrimKind::F64.slot()]),
            ),
            None => (
                Vec::with_capacity(caps[PrimKind::U8.slot()]),
                Vec::with_capacity(caps[PrimKind::U16.slot()]),
                Vec::with_capacity(caps[PrimKind::I16.slot()]),
                Vec::with_capacity(caps[PrimKind::I32.slot()]),
                Vec::with_capacity(caps[PrimKind::I64.slot()]),
                Vec::with_capacity(caps[PrimKind::F32.slot()]),
                Vec::with_capacity(caps[PrimKind::F64.slot()]),
            ),
        };
        BunchWriter {
            out,
            cfg,
            caps,
            queue_cap,
            pool,
            u8_buf,
            u16_buf,
            i16_buf,
            i32_buf,
            i64_buf,
            f32_buf,
            f64_buf,
            deferred: Vec::new(),
            bunches: 0,
        }
    }

    /// Buffers one bool as a byte; bools share the u8 buffer.
    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(u8::from(v))
    }

    /// Writes a bool slice, encoding elements as single bytes.
    pub fn write_bool_slice(&mut self, v: &[bool]) -> Result<()> {
        if v.len() < self.cfg.small_array_limit(PrimKind::Bool) {
            for &x in v {
                self.write_bool(x)?;
            }
        } else {
            if self.deferred.len() == self.queue_cap {
                self.flush_bunch()?;
            }
            self.deferred.push(Deferred::Bool(v.to_vec()));
        }
        Ok(())
    }

    impl_write_kind!(write_u8, write_u8_slice, u8, u8_buf, PrimKind::U8, Deferred::U8);
    impl_write_kind!(write_u16, write_u16_slice, u16, u16_buf, PrimKind::U16, Deferred::U16);
    impl_write_kind!(write_i16, write_i16_slice, i16, i16_buf, PrimKind::I16, Deferred::I16);
    impl_write_kind!(write_i32, write_i32_slice, i32, i32_buf, PrimKind::I32, Deferred::I32);
    impl_write_kind!(write_i64, write_i64_slice, i64, i64_buf, PrimKind::I64, Deferred::I64);
    impl_write_kind!(write_f32, write_f32_slice, f32, f32_buf, PrimKind::F32, Deferred::F32);
    impl_write_kind!(write_f64, write_f64_slice, f64, f64_buf, PrimKind::F64, Deferred::F64);

    /// Signed 8-bit scalar, bit-cast onto the u8 buffer.
    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.write_u8(v as u8)
    }

    /// Unsigned 32-bit scalar, bit-cast onto the i32 buffer.
    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_i32(v as i32)
    }

    /// Unsigned 64-bit scalar, bit-cast onto the i64 buffer.
    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_i64(v as i64)
    }

    /// Char scalar, carried as its code point on the i32 buffer.
    pub fn write_char(&mut self, v: char) -> Result<()> {
        self.write_i32(v as u32 as i32)
    }

    /// Length-prefixed UTF-8 string; `None` is the length -1.
    pub fn write_utf(&mut self, v: Option<&str>) -> Result<()> {
        match v {
            None => self.write_i32(-1),
            Some(s) => {
                let bytes = s.as_bytes();
                self.write_i32(bytes.len() as i32)?;
                self.write_u8_slice(bytes)
            }
        }
    }

    /// Writes the current bunch: header, non-empty typed buffers in kind
    /// order, then deferred array payloads in push order.
    fn flush_bunch(&mut self) -> Result<()> {
        let mut header = [0u16; HEADER_SLOTS];
        header[PrimKind::Bool.slot()] = self.deferred.len() as u16;
        header[PrimKind::U8.slot()] = self.u8_buf.len() as u16;
        header[PrimKind::U16.slot()] = self.u16_buf.len() as u16;
        header[PrimKind::I16.slot()] = self.i16_buf.len() as u16;
        header[PrimKind::I32.slot()] = self.i32_buf.len() as u16;
        header[PrimKind::I64.slot()] = self.i64_buf.len() as u16;
        header[PrimKind::F32.slot()] = self.f32_buf.len() as u16;
        header[PrimKind::F64.slot()] = self.f64_buf.len() as u16;

        log::debug!(
            "[BUNCH] flush arrays={} u8={} u16={} i16={} i32={} i64={} f32={} f64={}",
            self.deferred.len(),
            self.u8_buf.len(),
            self.u16_buf.len(),
            self.i16_buf.len(),
            self.i32_buf.len(),
            self.i64_buf.len(),
            self.f32_buf.len(),
            self.f64_buf.len(),
        );

        self.out.write_u16_array(&header)?;
        if !self.u8_buf.is_empty() {
            self.out.write_u8_array(&self.u8_buf)?;
            self.u8_buf.clear();
        }
        if !self.u16_buf.is_empty() {
            self.out.write_u16_array(&self.u16_buf)?;
            self.u16_buf.clear();
        }
        if !self.i16_buf.is_empty() {
            self.out.write_i16_array(&self.i16_buf)?;
            self.i16_buf.clear();
        }
        if !self.i32_buf.is_empty() {
            self.out.write_i32_array(&self.i32_buf)?;
            self.i32_buf.clear();
        }
        if !self.i64_buf.is_empty() {
            self.out.write_i64_array(&self.i64_buf)?;
            self.i64_buf.clear();
        }
        if !self.f32_buf.is_empty() {
            self.out.write_f32_array(&self.f32_buf)?;
            self.f32_buf.clear();
        }
        if !self.f64_buf.is_empty() {
            self.out.write_f64_array(&self.f64_buf)?;
            self.f64_buf.clear();
        }
        for d in self.deferred.drain(..) {
            match d {
                Deferred::Bool(v) => self.out.write_bool_array(&v)?,
                Deferred::U8(v) => self.out.write_u8_array(&v)?,
                Deferred::U16(v) => self.out.write_u16_array(&v)?,
                Deferred::I16(v) => self.out.write_i16_array(&v)?,
                Deferred::I32(v) => self.out.write_i32_array(&v)?,
                Deferred::I64(v) => self.out.write_i64_array(&v)?,
                Deferred::F32(v) => self.out.write_f32_array(&v)?,
                Deferred::F64(v) => self.out.write_f64_array(&v)?,
            }
        }
        self.bunches += 1;
        Ok(())
    }

    /// Flushes the pending bunch and pushes everything to the channel.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_bunch()?;
        self.out.flush()
    }

    /// Flushes, returns pooled buffers, and closes the channel.
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        if let Some(pool) = self.pool.take() {
            pool.give_u8(std::mem::take(&mut self.u8_buf));
            pool.give_u16(std::mem::take(&mut self.u16_buf));
            pool.give_i16(std::mem::take(&mut self.i16_buf));
            pool.give_i32(std::mem::take(&mut self.i32_buf));
            pool.give_i64(std::mem::take(&mut self.i64_buf));
            pool.give_f32(std::mem::take(&mut self.f32_buf));
            pool.give_f64(std::mem::take(&mut self.f64_buf));
        }
        self.out.close()
    }

    /// Logical bytes accepted by the channel so far.
    pub fn bytes_written(&self) -> u64 {
        self.out.bytes_written()
    }

    /// Restarts the channel's byte counter.
    pub fn reset_bytes_written(&mut self) {
        self.out.reset_bytes_written();
    }

    /// Bunches flushed since construction.
    pub fn bunches_flushed(&self) -> u64 {
        self.bunches
    }

    /// Stream tunables this writer was built with.
    pub fn config(&self) -> &StreamConfig {
        &self.cfg
    }
}
