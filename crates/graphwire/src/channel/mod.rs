// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The byte-channel boundary the codec is built on.
//!
//! An [`Accumulator`] is something typed values can be pushed into; a
//! [`Dissipator`] is something typed values can be pulled from. The codec
//! requires nothing else of the transport: an ordered, reliable byte channel
//! behind each trait is enough. Encoding is little-endian canonical on both
//! sides; byte-order conversion is `to_le_bytes`/`from_le_bytes` and carries
//! no serialization semantics.
//!
//! Contracts:
//! - data handed to an accumulator is not durable until `flush` returns;
//! - dissipator reads may block until enough bytes exist upstream;
//! - both sides account logical bytes so callers can meter traffic.

mod mem;
mod reader;
mod writer;

pub use mem::MemChannel;
pub use reader::ChannelDissipator;
pub use writer::ChannelAccumulator;

use crate::error::Result;

/// Write side of the byte channel. Object-safe; the batch layer holds it as
/// a trait object.
pub trait Accumulator {
    fn write_bool(&mut self, v: bool) -> Result<()>;
    fn write_u8(&mut self, v: u8) -> Result<()>;
    fn write_u16(&mut self, v: u16) -> Result<()>;
    fn write_i16(&mut self, v: i16) -> Result<()>;
    fn write_i32(&mut self, v: i32) -> Result<()>;
    fn write_i64(&mut self, v: i64) -> Result<()>;
    fn write_f32(&mut self, v: f32) -> Result<()>;
    fn write_f64(&mut self, v: f64) -> Result<()>;

    fn write_bool_array(&mut self, v: &[bool]) -> Result<()>;
    fn write_u8_array(&mut self, v: &[u8]) -> Result<()>;
    fn write_u16_array(&mut self, v: &[u16]) -> Result<()>;
    fn write_i16_array(&mut self, v: &[i16]) -> Result<()>;
    fn write_i32_array(&mut self, v: &[i32]) -> Result<()>;
    fn write_i64_array(&mut self, v: &[i64]) -> Result<()>;
    fn write_f32_array(&mut self, v: &[f32]) -> Result<()>;
    fn write_f64_array(&mut self, v: &[f64]) -> Result<()>;

    /// Push everything staged so far down to the underlying channel.
    fn flush(&mut self) -> Result<()>;

    /// Flush and release the channel.
    fn close(&mut self) -> Result<()>;

    /// Logical bytes accepted since construction or the last counter reset.
    fn bytes_written(&self) -> u64;

    /// Restart the byte counter.
    fn reset_bytes_written(&mut self);
}

/// Read side of the byte channel. Mirror of [`Accumulator`].
pub trait Dissipator {
    fn read_bool(&mut self) -> Result<bool>;
    fn read_u8(&mut self) -> Result<u8>;
    fn read_u16(&mut self) -> Result<u16>;
    fn read_i16(&mut self) -> Result<i16>;
    fn read_i32(&mut self) -> Result<i32>;
    fn read_i64(&mut self) -> Result<i64>;
    fn read_f32(&mut self) -> Result<f32>;
    fn read_f64(&mut self) -> Result<f64>;

    fn read_bool_array(&mut self, v: &mut [bool]) -> Result<()>;
    fn read_u8_array(&mut self, v: &mut [u8]) -> Result<()>;
    fn read_u16_array(&mut self, v: &mut [u16]) -> Result<()>;
    fn read_i16_array(&mut self, v: &mut [i16]) -> Result<()>;
    fn read_i32_array(&mut self, v: &mut [i32]) -> Result<()>;
    fn read_i64_array(&mut self, v: &mut [i64]) -> Result<()>;
    fn read_f32_array(&mut self, v: &mut [f32]) -> Result<()>;
    fn read_f64_array(&mut self, v: &mut [f64]) -> Result<()>;

    /// Bytes available without blocking on the upstream channel.
    fn available(&self) -> usize;

    /// Release the channel.
    fn close(&mut self) -> Result<()>;

    /// Logical bytes served since construction or the last counter reset.
    fn bytes_read(&self) -> u64;

    /// Restart the byte counter.
    fn reset_bytes_read(&mut self);
}
