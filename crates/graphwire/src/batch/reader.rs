// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read half of the bunch codec.

use crate::channel::Dissipator;
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::wire::{PrimKind, HEADER_SLOTS};

/// Generate the scalar read + slice read pair for one kind
macro_rules! impl_read_kind {
    ($scalar:ident, $slice:ident, $bulk:ident, $type:ty, $buf:ident, $pos:ident, $kind:expr) => {
        /// Serves one value from the kind's buffer, receiving the next
        /// bunch transparently when it runs dry.
        pub fn $scalar(&mut self) -> Result<$type> {
            while self.$pos == self.$buf.len() {
                self.receive()?;
            }
            let v = self.$buf[self.$pos];
            self.$pos += 1;
            Ok(v)
        }

        /// Reads a slice: small ones element-by-element, large ones as one
        /// bulk transfer from this bunch's deferred-array section.
        pub fn $slice(&mut self, dst: &mut [$type]) -> Result<()> {
            if dst.len() >= self.cfg.small_array_limit($kind) {
                while self.arrays_taken == self.arrays_pending {
                    self.receive()?;
                }
                self.arrays_taken += 1;
                self.inp.$bulk(dst)?;
            } else {
                for slot in dst.iter_mut() {
                    *slot = self.$scalar()?;
                }
            }
            Ok(())
        }
    };
}

/// Unbatches primitive values framed by [`super::BunchWriter`].
pub struct BunchReader {
    inp: Box<dyn Dissipator>,
    cfg: StreamConfig,
    u8_buf: Vec<u8>,
    u16_buf: Vec<u16>,
    i16_buf: Vec<i16>,
    i32_buf: Vec<i32>,
    i64_buf: Vec<i64>,
    f32_buf: Vec<f32>,
    f64_buf: Vec<f64>,
    u8_pos: usize,
    u16_pos: usize,
    i16_pos: usize,
    i32_pos: usize,
    i64_pos: usize,
    f32_pos: usize,
    f64_pos: usize,
    arrays_pending: u16,
    arrays_taken: u16,
}

impl BunchReader {
    /// Reader over a dissipator. Both sides must share the same
    /// [`StreamConfig`] or the small-array routing will not line up.
    pub fn new(inp: Box<dyn Dissipator>, cfg: StreamConfig) -> Self {
        BunchReader {
            inp,
            cfg,
            u8_buf: Vec::new(),
            u16_buf: Vec::new(),
            i16_buf: Vec::new(),
            i32_buf: Vec::new(),
            i64_buf: Vec::new(),
            f32_buf: Vec::new(),
            f64_buf: Vec::new(),
            u8_pos: 0,
            u16_pos: 0,
            i16_pos: 0,
            i32_pos: 0,
            i64_pos: 0,
            f32_pos: 0,
            f64_pos: 0,
            arrays_pending: 0,
            arrays_taken: 0,
        }
    }

    /// Bools decode from the u8 buffer; any nonzero byte is true.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a bool slice written by `write_bool_slice`.
    pub fn read_bool_slice(&mut self, dst: &mut [bool]) -> Result<()> {
        if dst.len() >= self.cfg.small_array_limit(PrimKind::Bool) {
            while self.arrays_taken == self.arrays_pending {
                self.receive()?;
            }
            self.arrays_taken += 1;
            self.inp.read_bool_array(dst)?;
        } else {
            for slot in dst.iter_mut() {
                *slot = self.read_bool()?;
            }
        }
        Ok(())
    }

    impl_read_kind!(read_u8, read_u8_slice, read_u8_array, u8, u8_buf, u8_pos, PrimKind::U8);
    impl_read_kind!(read_u16, read_u16_slice, read_u16_array, u16, u16_buf, u16_pos, PrimKind::U16);
    impl_read_kind!(read_i16, read_i16_slice, read_i16_array, i16, i16_buf, i16_pos, PrimKind::I16);
    impl_read_kind!(read_i32, read_i32_slice, read_i32_array, i32, i32_buf, i32_pos, PrimKind::I32);
    impl_read_kind!(read_i64, read_i64_slice, read_i64_array, i64, i64_buf, i64_pos, PrimKind::I64);
    impl_read_kind!(read_f32, read_f32_slice, read_f32_array, f32, f32_buf, f32_pos, PrimKind::F32);
    impl_read_kind!(read_f64, read_f64_slice, read_f64_array, f64, f64_buf, f64_pos, PrimKind::F64);

    /// Signed 8-bit scalar from the u8 buffer.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Unsigned 32-bit scalar from the i32 buffer.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_i32()? as u32)
    }

    /// Unsigned 64-bit scalar from the i64 buffer.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.read_i64()? as u64)
    }

    /// Char scalar; a code point that is not a Unicode scalar value means
    /// the stream is corrupt.
    pub fn read_char(&mut self) -> Result<char> {
        let code = self.read_u32()?;
        char::from_u32(code)
            .ok_or_else(|| Error::corrupt(format!("invalid char code point {code:#x}")))
    }

    /// Length-prefixed UTF-8 string; length -1 decodes to `None`.
    pub fn read_utf(&mut self) -> Result<Option<String>> {
        let len = self.read_i32()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(Error::corrupt(format!("negative string length {len}")));
        }
        let mut bytes = vec![0u8; len as usize];
        self.read_u8_slice(&mut bytes)?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| Error::corrupt(format!("invalid utf-8 in string: {e}")))
    }

    /// Pulls the next bunch: header, then every announced typed buffer.
    ///
    /// Deferred array payloads are not consumed here; they are pulled by the
    /// matching slice reads, in the order they were written.
    fn receive(&mut self) -> Result<()> {
        if self.unconsumed() > 0 {
            return Err(Error::corrupt(
                "receive with unconsumed batched data; read/write sequences diverged",
            ));
        }

        let mut header = [0u16; HEADER_SLOTS];
        self.inp.read_u16_array(&mut header)?;

        log::debug!(
            "[BUNCH] receive arrays={} u8={} u16={} i16={} i32={} i64={} f32={} f64={}",
            header[PrimKind::Bool.slot()],
            header[PrimKind::U8.slot()],
            header[PrimKind::U16.slot()],
            header[PrimKind::I16.slot()],
            header[PrimKind::I32.slot()],
            header[PrimKind::I64.slot()],
            header[PrimKind::F32.slot()],
            header[PrimKind::F64.slot()],
        );

        self.arrays_pending = header[PrimKind::Bool.slot()];
        self.arrays_taken = 0;

        self.u8_pos = 0;
        self.u16_pos = 0;
        self.i16_pos = 0;
        self.i32_pos = 0;
        self.i64_pos = 0;
        self.f32_pos = 0;
        self.f64_pos = 0;

        self.u8_buf.resize(header[PrimKind::U8.slot()] as usize, 0);
        self.u16_buf.resize(header[PrimKind::U16.slot()] as usize, 0);
        self.i16_buf.resize(header[PrimKind::I16.slot()] as usize, 0);
        self.i32_buf.resize(header[PrimKind::I32.slot()] as usize, 0);
        self.i64_buf.resize(header[PrimKind::I64.slot()] as usize, 0);
        self.f32_buf.resize(header[PrimKind::F32.slot()] as usize, 0.0);
        self.f64_buf.resize(header[PrimKind::F64.slot()] as usize, 0.0);

        if !self.u8_buf.is_empty() {
            self.inp.read_u8_array(&mut self.u8_buf)?;
        }
        if !self.u16_buf.is_empty() {
            self.inp.read_u16_array(&mut self.u16_buf)?;
        }
        if !self.i16_buf.is_empty() {
            self.inp.read_i16_array(&mut self.i16_buf)?;
        }
        if !self.i32_buf.is_empty() {
            self.inp.read_i32_array(&mut self.i32_buf)?;
        }
        if !self.i64_buf.is_empty() {
            self.inp.read_i64_array(&mut self.i64_buf)?;
        }
        if !self.f32_buf.is_empty() {
            self.inp.read_f32_array(&mut self.f32_buf)?;
        }
        if !self.f64_buf.is_empty() {
            self.inp.read_f64_array(&mut self.f64_buf)?;
        }
        Ok(())
    }

    /// Typed values buffered but not yet served, plus pending bulk arrays.
    fn unconsumed(&self) -> usize {
        (self.u8_buf.len() - self.u8_pos)
            + (self.u16_buf.len() - self.u16_pos)
            + (self.i16_buf.len() - self.i16_pos)
            + (self.i32_buf.len() - self.i32_pos)
            + (self.i64_buf.len() - self.i64_pos)
            + (self.f32_buf.len() - self.f32_pos)
            + (self.f64_buf.len() - self.f64_pos)
            + (self.arrays_pending - self.arrays_taken) as usize
    }

    /// Bytes available without blocking: staged channel bytes plus decoded
    /// values still sitting in the typed buffers.
    pub fn available(&self) -> usize {
        self.inp.available()
            + (self.u8_buf.len() - self.u8_pos) * PrimKind::U8.width()
            + (self.u16_buf.len() - self.u16_pos) * PrimKind::U16.width()
            + (self.i16_buf.len() - self.i16_pos) * PrimKind::I16.width()
            + (self.i32_buf.len() - self.i32_pos) * PrimKind::I32.width()
            + (self.i64_buf.len() - self.i64_pos) * PrimKind::I64.width()
            + (self.f32_buf.len() - self.f32_pos) * PrimKind::F32.width()
            + (self.f64_buf.len() - self.f64_pos) * PrimKind::F64.width()
    }

    /// Releases the channel.
    pub fn close(&mut self) -> Result<()> {
        self.inp.close()
    }

    /// Logical bytes served by the channel so far.
    pub fn bytes_read(&self) -> u64 {
        self.inp.bytes_read()
    }

    /// Restarts the channel's byte counter.
    pub fn reset_bytes_read(&mut self) {
        self.inp.reset_bytes_read();
    }

    /// Stream tunables this reader was built with.
    pub fn config(&self) -> &StreamConfig {
        &self.cfg
    }
}
