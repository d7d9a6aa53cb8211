// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pluggable serialization modes behind one stream surface.
//!
//! Three interchangeable backends, selected by name at construction:
//!
//! | mode    | carries                                | state             |
//! |---------|----------------------------------------|-------------------|
//! | `graph` | objects, strings, primitives, arrays   | handles + types   |
//! | `data`  | primitives and arrays only             | typed buffers     |
//! | `byte`  | raw bytes and byte arrays only         | none              |
//!
//! A call outside the selected mode's vocabulary fails with
//! [`Error::Unsupported`] and leaves the stream state untouched. Mode is a
//! construction-time choice, never a per-call option.

use std::rc::Rc;
use std::sync::Arc;

use crate::batch::{BunchReader, BunchWriter};
use crate::channel::{Accumulator, Dissipator};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::graph::{GraphReader, GraphWriter, NodeRef, Replacer};
use crate::plan::TypeDirectory;

/// Serialization backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Full graph-aware serialization (handles, types, cycles).
    Graph,
    /// Primitives and arrays only; no object traffic, no tables.
    Data,
    /// Raw byte pass-through, the escape hatch.
    Byte,
}

impl Mode {
    /// Wire-up name of this mode.
    pub fn name(self) -> &'static str {
        match self {
            Mode::Graph => "graph",
            Mode::Data => "data",
            Mode::Byte => "byte",
        }
    }

    /// Mode for a configuration name.
    pub fn from_name(name: &str) -> Option<Mode> {
        match name {
            "graph" => Some(Mode::Graph),
            "data" => Some(Mode::Data),
            "byte" => Some(Mode::Byte),
            _ => None,
        }
    }
}

/// Raw byte pass-through writer. Bytes go straight to the accumulator
/// with no bunch framing at all.
pub struct ByteWriter {
    out: Box<dyn Accumulator>,
}

impl ByteWriter {
    pub fn new(out: Box<dyn Accumulator>) -> Self {
        ByteWriter { out }
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.out.write_u8(v)
    }

    pub fn write_u8_slice(&mut self, v: &[u8]) -> Result<()> {
        self.out.write_u8_array(v)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }

    pub fn close(&mut self) -> Result<()> {
        self.out.close()
    }

    pub fn bytes_written(&self) -> u64 {
        self.out.bytes_written()
    }
}

/// Raw byte pass-through reader.
pub struct ByteReader {
    inp: Box<dyn Dissipator>,
}

impl ByteReader {
    pub fn new(inp: Box<dyn Dissipator>) -> Self {
        ByteReader { inp }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.inp.read_u8()
    }

    pub fn read_u8_slice(&mut self, dst: &mut [u8]) -> Result<()> {
        self.inp.read_u8_array(dst)
    }

    pub fn available(&self) -> usize {
        self.inp.available()
    }

    pub fn close(&mut self) -> Result<()> {
        self.inp.close()
    }

    pub fn bytes_read(&self) -> u64 {
        self.inp.bytes_read()
    }
}

/// Generate mode-dispatched scalar writes (graph + data, not byte)
macro_rules! impl_stream_write {
    ($($name:ident($type:ty)),* $(,)?) => {
        $(
            pub fn $name(&mut self, v: $type) -> Result<()> {
                match self {
                    StreamWriter::Graph(w) => w.$name(v),
                    StreamWriter::Data(w) => w.$name(v),
                    StreamWriter::Byte(_) => Err(Error::Unsupported {
                        mode: "byte",
                        operation: stringify!($name),
                    }),
                }
            }
        )*
    };
}

/// Generate mode-dispatched array writes. Graph mode frames the array with
/// a type id and length; data mode sends the bare elements and the caller
/// owns the length, per the dissipator contract.
macro_rules! impl_stream_write_array {
    ($($name:ident / $graph:ident / $slice:ident ($type:ty)),* $(,)?) => {
        $(
            pub fn $name(&mut self, v: &[$type]) -> Result<()> {
                match self {
                    StreamWriter::Graph(w) => w.$graph(v),
                    StreamWriter::Data(w) => w.$slice(v),
                    StreamWriter::Byte(_) => Err(Error::Unsupported {
                        mode: "byte",
                        operation: stringify!($name),
                    }),
                }
            }
        )*
    };
}

/// A writer in one of the three modes.
pub enum StreamWriter {
    Graph(GraphWriter),
    Data(BunchWriter),
    Byte(ByteWriter),
}

impl StreamWriter {
    /// Writer for an explicit mode.
    pub fn for_mode(mode: Mode, out: Box<dyn Accumulator>, cfg: StreamConfig) -> Self {
        match mode {
            Mode::Graph => StreamWriter::Graph(GraphWriter::new(out, cfg)),
            Mode::Data => StreamWriter::Data(BunchWriter::new(out, cfg)),
            Mode::Byte => StreamWriter::Byte(ByteWriter::new(out)),
        }
    }

    /// Writer for a mode name, as carried in connection setup.
    pub fn by_name(name: &str, out: Box<dyn Accumulator>, cfg: StreamConfig) -> Result<Self> {
        let mode = Mode::from_name(name)
            .ok_or_else(|| Error::Config(format!("unknown serialization mode {name:?}")))?;
        Ok(Self::for_mode(mode, out, cfg))
    }

    /// Mode this writer was built in.
    pub fn mode(&self) -> Mode {
        match self {
            StreamWriter::Graph(_) => Mode::Graph,
            StreamWriter::Data(_) => Mode::Data,
            StreamWriter::Byte(_) => Mode::Byte,
        }
    }

    /// Bytes are the one vocabulary all three modes share.
    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        match self {
            StreamWriter::Graph(w) => w.write_u8(v),
            StreamWriter::Data(w) => w.write_u8(v),
            StreamWriter::Byte(w) => w.write_u8(v),
        }
    }

    impl_stream_write!(
        write_bool(bool),
        write_i8(i8),
        write_u16(u16),
        write_i16(i16),
        write_i32(i32),
        write_u32(u32),
        write_i64(i64),
        write_u64(u64),
        write_f32(f32),
        write_f64(f64),
        write_char(char),
    );

    /// Inline UTF-8 string (graph and data modes).
    pub fn write_utf(&mut self, v: Option<&str>) -> Result<()> {
        match self {
            StreamWriter::Graph(w) => w.write_utf(v),
            StreamWriter::Data(w) => w.write_utf(v),
            StreamWriter::Byte(_) => Err(Error::Unsupported {
                mode: "byte",
                operation: "write_utf",
            }),
        }
    }

    /// Byte arrays pass through in every mode; framing differs per mode.
    pub fn write_u8_array(&mut self, v: &[u8]) -> Result<()> {
        match self {
            StreamWriter::Graph(w) => w.write_u8_array(v),
            StreamWriter::Data(w) => w.write_u8_slice(v),
            StreamWriter::Byte(w) => w.write_u8_slice(v),
        }
    }

    impl_stream_write_array!(
        write_bool_array / write_bool_array / write_bool_slice(bool),
        write_u16_array / write_u16_array / write_u16_slice(u16),
        write_i16_array / write_i16_array / write_i16_slice(i16),
        write_i32_array / write_i32_array / write_i32_slice(i32),
        write_i64_array / write_i64_array / write_i64_slice(i64),
        write_f32_array / write_f32_array / write_f32_slice(f32),
        write_f64_array / write_f64_array / write_f64_slice(f64),
    );

    /// Object graph write; graph mode only.
    pub fn write_node(&mut self, node: Option<&NodeRef>) -> Result<()> {
        match self {
            StreamWriter::Graph(w) => w.write_node(node),
            other => Err(Error::Unsupported {
                mode: other.mode().name(),
                operation: "write_node",
            }),
        }
    }

    /// Identity-shared string write; graph mode only.
    pub fn write_shared_str(&mut self, s: Option<&Rc<str>>) -> Result<()> {
        match self {
            StreamWriter::Graph(w) => w.write_shared_str(s),
            other => Err(Error::Unsupported {
                mode: other.mode().name(),
                operation: "write_shared_str",
            }),
        }
    }

    /// Stream-level replacement hook; graph mode only.
    pub fn set_replacer(&mut self, replacer: Box<dyn Replacer>) -> Result<()> {
        match self {
            StreamWriter::Graph(w) => {
                w.set_replacer(replacer);
                Ok(())
            }
            other => Err(Error::Unsupported {
                mode: other.mode().name(),
                operation: "set_replacer",
            }),
        }
    }

    /// Epoch reset. A no-op in the stateless modes.
    pub fn reset(&mut self) {
        if let StreamWriter::Graph(w) = self {
            w.reset();
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            StreamWriter::Graph(w) => w.flush(),
            StreamWriter::Data(w) => w.flush(),
            StreamWriter::Byte(w) => w.flush(),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            StreamWriter::Graph(w) => w.close(),
            StreamWriter::Data(w) => w.close(),
            StreamWriter::Byte(w) => w.close(),
        }
    }

    pub fn bytes_written(&self) -> u64 {
        match self {
            StreamWriter::Graph(w) => w.bytes_written(),
            StreamWriter::Data(w) => w.bytes_written(),
            StreamWriter::Byte(w) => w.bytes_written(),
        }
    }
}

/// Generate mode-dispatched scalar reads (graph + data, not byte)
macro_rules! impl_stream_read {
    ($($name:ident -> $type:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self) -> Result<$type> {
                match self {
                    StreamReader::Graph(r) => r.$name(),
                    StreamReader::Data(r) => r.$name(),
                    StreamReader::Byte(_) => Err(Error::Unsupported {
                        mode: "byte",
                        operation: stringify!($name),
                    }),
                }
            }
        )*
    };
}

/// Generate mode-dispatched array reads
macro_rules! impl_stream_read_array {
    ($($name:ident / $graph:ident / $slice:ident ($type:ty)),* $(,)?) => {
        $(
            pub fn $name(&mut self, dst: &mut [$type]) -> Result<()> {
                match self {
                    StreamReader::Graph(r) => r.$graph(dst),
                    StreamReader::Data(r) => r.$slice(dst),
                    StreamReader::Byte(_) => Err(Error::Unsupported {
                        mode: "byte",
                        operation: stringify!($name),
                    }),
                }
            }
        )*
    };
}

/// A reader in one of the three modes.
pub enum StreamReader {
    Graph(GraphReader),
    Data(BunchReader),
    Byte(ByteReader),
}

impl StreamReader {
    /// Reader for an explicit mode. The directory is consulted by graph
    /// mode only.
    pub fn for_mode(
        mode: Mode,
        inp: Box<dyn Dissipator>,
        cfg: StreamConfig,
        directory: Arc<TypeDirectory>,
    ) -> Self {
        match mode {
            Mode::Graph => StreamReader::Graph(GraphReader::new(inp, cfg, directory)),
            Mode::Data => StreamReader::Data(BunchReader::new(inp, cfg)),
            Mode::Byte => StreamReader::Byte(ByteReader::new(inp)),
        }
    }

    /// Reader for a mode name.
    pub fn by_name(
        name: &str,
        inp: Box<dyn Dissipator>,
        cfg: StreamConfig,
        directory: Arc<TypeDirectory>,
    ) -> Result<Self> {
        let mode = Mode::from_name(name)
            .ok_or_else(|| Error::Config(format!("unknown serialization mode {name:?}")))?;
        Ok(Self::for_mode(mode, inp, cfg, directory))
    }

    /// Mode this reader was built in.
    pub fn mode(&self) -> Mode {
        match self {
            StreamReader::Graph(_) => Mode::Graph,
            StreamReader::Data(_) => Mode::Data,
            StreamReader::Byte(_) => Mode::Byte,
        }
    }

    /// Bytes are the one vocabulary all three modes share.
    pub fn read_u8(&mut self) -> Result<u8> {
        match self {
            StreamReader::Graph(r) => r.read_u8(),
            StreamReader::Data(r) => r.read_u8(),
            StreamReader::Byte(r) => r.read_u8(),
        }
    }

    impl_stream_read!(
        read_bool -> bool,
        read_i8 -> i8,
        read_u16 -> u16,
        read_i16 -> i16,
        read_i32 -> i32,
        read_u32 -> u32,
        read_i64 -> i64,
        read_u64 -> u64,
        read_f32 -> f32,
        read_f64 -> f64,
        read_char -> char,
    );

    /// Inline UTF-8 string (graph and data modes).
    pub fn read_utf(&mut self) -> Result<Option<String>> {
        match self {
            StreamReader::Graph(r) => r.read_utf(),
            StreamReader::Data(r) => r.read_utf(),
            StreamReader::Byte(_) => Err(Error::Unsupported {
                mode: "byte",
                operation: "read_utf",
            }),
        }
    }

    /// Byte arrays pass through in every mode.
    pub fn read_u8_array(&mut self, dst: &mut [u8]) -> Result<()> {
        match self {
            StreamReader::Graph(r) => r.read_u8_array(dst),
            StreamReader::Data(r) => r.read_u8_slice(dst),
            StreamReader::Byte(r) => r.read_u8_slice(dst),
        }
    }

    impl_stream_read_array!(
        read_bool_array / read_bool_array / read_bool_slice(bool),
        read_u16_array / read_u16_array / read_u16_slice(u16),
        read_i16_array / read_i16_array / read_i16_slice(i16),
        read_i32_array / read_i32_array / read_i32_slice(i32),
        read_i64_array / read_i64_array / read_i64_slice(i64),
        read_f32_array / read_f32_array / read_f32_slice(f32),
        read_f64_array / read_f64_array / read_f64_slice(f64),
    );

    /// Object graph read; graph mode only.
    pub fn read_node(&mut self) -> Result<Option<NodeRef>> {
        match self {
            StreamReader::Graph(r) => r.read_node(),
            other => Err(Error::Unsupported {
                mode: other.mode().name(),
                operation: "read_node",
            }),
        }
    }

    /// Identity-shared string read; graph mode only.
    pub fn read_shared_str(&mut self) -> Result<Option<Rc<str>>> {
        match self {
            StreamReader::Graph(r) => r.read_shared_str(),
            other => Err(Error::Unsupported {
                mode: other.mode().name(),
                operation: "read_shared_str",
            }),
        }
    }

    pub fn available(&self) -> usize {
        match self {
            StreamReader::Graph(r) => r.available(),
            StreamReader::Data(r) => r.available(),
            StreamReader::Byte(r) => r.available(),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            StreamReader::Graph(r) => r.close(),
            StreamReader::Data(r) => r.close(),
            StreamReader::Byte(r) => r.close(),
        }
    }

    pub fn bytes_read(&self) -> u64 {
        match self {
            StreamReader::Graph(r) => r.bytes_read(),
            StreamReader::Data(r) => r.bytes_read(),
            StreamReader::Byte(r) => r.bytes_read(),
        }
    }
}
