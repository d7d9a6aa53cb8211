// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer half of the graph stream.

use std::rc::Rc;
use std::sync::Arc;

use super::{node_ref_id, str_ref_id, NodeRef, Replacer};
use crate::batch::BunchWriter;
use crate::channel::Accumulator;
use crate::config::StreamConfig;
use crate::error::Result;
use crate::plan::{FieldPlan, STR_PLAN};
use crate::pool::BufferPool;
use crate::table::{ChainMap, ProbeMap, RefId};
use crate::wire::{PrimKind, FIRST_HANDLE, FIRST_TYPE_ID, NUL_HANDLE, RESET_HANDLE, TYPE_BIT};

/// Initial handle table size; object counts per epoch are usually in the
/// hundreds, so start larger than the type table.
const HANDLE_TABLE_SIZE: usize = 2048;

/// Pinned owners of everything the handle table refers to. Addresses are
/// only valid identity keys while their allocation lives, so the writer
/// keeps each shared value alive until the next reset.
#[allow(dead_code)]
enum Retained {
    Node(NodeRef),
    Str(Rc<str>),
}

/// Generate scalar delegations to the bunch writer
macro_rules! impl_delegate_scalar {
    ($($name:ident($type:ty)),* $(,)?) => {
        $(
            pub fn $name(&mut self, v: $type) -> Result<()> {
                self.data.$name(v)
            }
        )*
    };
}

/// Generate the inline-vector + root-array pair for one kind
macro_rules! impl_write_arrays {
    ($vec:ident, $array:ident, $slice:ident, $type:ty, $kind:expr) => {
        /// Length-prefixed inline array, used for array-valued fields.
        /// Value semantics: no handle, no type header.
        pub fn $vec(&mut self, v: &[$type]) -> Result<()> {
            self.data.write_i32(v.len() as i32)?;
            self.data.$slice(v)
        }

        /// Root-level array transfer: pre-seeded type id, length, then the
        /// elements. Mirrors the slice path of the wire protocol: no
        /// cycle detection is attempted for slices.
        pub fn $array(&mut self, v: &[$type]) -> Result<()> {
            self.write_handle_slot($kind.wire_id() | TYPE_BIT)?;
            self.data.write_i32(v.len() as i32)?;
            self.data.$slice(v)
        }
    };
}

/// Serializes object graphs, strings, and arrays onto an accumulator,
/// transmitting each distinct allocation and each type name exactly once
/// per epoch.
pub struct GraphWriter {
    data: BunchWriter,
    handles: ChainMap,
    types: ProbeMap,
    retained: Vec<Retained>,
    next_handle: u32,
    next_type: u32,
    reset_pending: bool,
    last_plan: RefId,
    last_type_wire: u32,
    replacer: Option<Box<dyn Replacer>>,
}

impl GraphWriter {
    /// Graph writer over an accumulator.
    pub fn new(out: Box<dyn Accumulator>, cfg: StreamConfig) -> Self {
        Self::from_bunch(BunchWriter::new(out, cfg))
    }

    /// Graph writer drawing typed buffers from a shared pool.
    pub fn with_pool(out: Box<dyn Accumulator>, cfg: StreamConfig, pool: Arc<BufferPool>) -> Self {
        Self::from_bunch(BunchWriter::with_pool(out, cfg, pool))
    }

    fn from_bunch(data: BunchWriter) -> Self {
        GraphWriter {
            data,
            handles: ChainMap::with_size(HANDLE_TABLE_SIZE),
            types: ProbeMap::new(),
            retained: Vec::new(),
            next_handle: FIRST_HANDLE,
            next_type: FIRST_TYPE_ID,
            reset_pending: false,
            last_plan: 0,
            last_type_wire: 0,
            replacer: None,
        }
    }

    /// Installs a stream-level replacement hook.
    pub fn set_replacer(&mut self, replacer: Box<dyn Replacer>) {
        self.replacer = Some(replacer);
    }

    /// Removes the stream-level replacement hook.
    pub fn clear_replacer(&mut self) {
        self.replacer = None;
    }

    impl_delegate_scalar!(
        write_bool(bool),
        write_u8(u8),
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

    /// Inline UTF-8 string, used for string-valued fields. Value
    /// semantics: no handle.
    pub fn write_utf(&mut self, v: Option<&str>) -> Result<()> {
        self.data.write_utf(v)
    }

    /// Length-prefixed inline bool array (field path).
    pub fn write_bool_vec(&mut self, v: &[bool]) -> Result<()> {
        self.data.write_i32(v.len() as i32)?;
        self.data.write_bool_slice(v)
    }

    /// Root-level bool array with type id and length.
    pub fn write_bool_array(&mut self, v: &[bool]) -> Result<()> {
        self.write_handle_slot(PrimKind::Bool.wire_id() | TYPE_BIT)?;
        self.data.write_i32(v.len() as i32)?;
        self.data.write_bool_slice(v)
    }

    impl_write_arrays!(write_u8_vec, write_u8_array, write_u8_slice, u8, PrimKind::U8);
    impl_write_arrays!(write_u16_vec, write_u16_array, write_u16_slice, u16, PrimKind::U16);
    impl_write_arrays!(write_i16_vec, write_i16_array, write_i16_slice, i16, PrimKind::I16);
    impl_write_arrays!(write_i32_vec, write_i32_array, write_i32_slice, i32, PrimKind::I32);
    impl_write_arrays!(write_i64_vec, write_i64_array, write_i64_slice, i64, PrimKind::I64);
    impl_write_arrays!(write_f32_vec, write_f32_array, write_f32_slice, f32, PrimKind::F32);
    impl_write_arrays!(write_f64_vec, write_f64_array, write_f64_slice, f64, PrimKind::F64);

    /// Length-prefixed inline array of node references (field path).
    pub fn write_node_slice(&mut self, v: &[Option<NodeRef>]) -> Result<()> {
        self.data.write_i32(v.len() as i32)?;
        for item in v {
            self.write_node(item.as_ref())?;
        }
        Ok(())
    }

    /// Writes a handle slot, preceded by the reset sentinel when a reset
    /// is pending. The reader only accepts the sentinel where it expects a
    /// handle, which is why the emission is deferred to this point.
    fn write_handle_slot(&mut self, v: u32) -> Result<()> {
        if self.reset_pending {
            self.data.write_i32(RESET_HANDLE as i32)?;
            self.reset_pending = false;
            log::debug!("[WRITER] emitted reset sentinel");
        }
        self.data.write_i32(v as i32)
    }

    /// Writes a type id for `plan`, announcing the name the first time.
    fn write_type(&mut self, plan: &'static FieldPlan) -> Result<()> {
        let key = plan.ref_id();
        // One-entry memo: consecutive objects are usually the same type.
        let known = if key == self.last_plan {
            self.last_type_wire
        } else {
            let found = self.types.find(key);
            self.last_plan = key;
            self.last_type_wire = found;
            found
        };
        if known != 0 {
            return self.write_handle_slot(known);
        }
        let wire = self.next_type | TYPE_BIT;
        self.next_type += 1;
        self.types.put(key, wire);
        self.last_type_wire = wire;
        log::debug!(
            "[WRITER] new type {:#x} name={}",
            wire,
            plan.type_name
        );
        self.write_handle_slot(wire)?;
        self.data.write_utf(Some(plan.type_name))
    }

    /// Writes an object graph rooted at `node`.
    ///
    /// The handle is claimed *before* the body recurses into fields, so a
    /// node reachable from itself serializes as one payload plus
    /// back-references instead of recursing forever.
    pub fn write_node(&mut self, node: Option<&NodeRef>) -> Result<()> {
        let Some(node) = node else {
            return self.write_handle_slot(NUL_HANDLE);
        };
        let mut node = node.clone();
        if let Some(replacer) = self.replacer.as_mut() {
            node = replacer.replace(node);
        }
        // Per-type write replacement, consulted once; the substitute's own
        // hook does not chain.
        let replacement = node.borrow().write_replacement();
        if let Some(substitute) = replacement {
            node = substitute;
        }

        let key = node_ref_id(&node);
        let handle = self.handles.lazy_put(key, self.next_handle);
        if handle != self.next_handle {
            log::debug!("[WRITER] back-reference handle {handle}");
            return self.write_handle_slot(handle);
        }
        self.next_handle += 1;
        self.retained.push(Retained::Node(node.clone()));

        let plan = node.borrow().plan();
        log::debug!(
            "[WRITER] new object handle {handle} type {}",
            plan.type_name
        );
        self.write_type(plan)?;
        let body = node.borrow();
        body.write_body(self)
    }

    /// Writes an identity-shared string: full payload on first sight, a
    /// back-reference afterwards.
    pub fn write_shared_str(&mut self, s: Option<&Rc<str>>) -> Result<()> {
        let Some(s) = s else {
            return self.write_handle_slot(NUL_HANDLE);
        };
        let key = str_ref_id(s);
        let handle = self.handles.lazy_put(key, self.next_handle);
        if handle != self.next_handle {
            log::debug!("[WRITER] back-reference handle {handle} (str)");
            return self.write_handle_slot(handle);
        }
        self.next_handle += 1;
        self.retained.push(Retained::Str(s.clone()));
        self.write_type(&STR_PLAN)?;
        self.data.write_utf(Some(&**s))
    }

    /// Forgets every object seen so far and restarts handle numbering.
    ///
    /// The sentinel is emitted just before the next handle-slot write, so
    /// the reader sees it exactly where it expects a handle and resets in
    /// lock-step. Type tables survive on both sides; only object identity
    /// is epoch-scoped.
    pub fn reset(&mut self) {
        if self.next_handle > FIRST_HANDLE {
            log::debug!("[WRITER] reset at next_handle={}", self.next_handle);
            self.handles.clear();
            self.retained.clear();
            self.next_handle = FIRST_HANDLE;
            self.reset_pending = true;
        }
    }

    /// Flushes buffered data down to the channel.
    pub fn flush(&mut self) -> Result<()> {
        self.data.flush()
    }

    /// Flushes, drops the tables, and closes the channel.
    pub fn close(&mut self) -> Result<()> {
        self.handles.clear();
        self.types.clear();
        self.retained.clear();
        self.replacer = None;
        self.data.close()
    }

    /// Logical bytes accepted by the channel so far.
    pub fn bytes_written(&self) -> u64 {
        self.data.bytes_written()
    }

    /// Restarts the channel's byte counter.
    pub fn reset_bytes_written(&mut self) {
        self.data.reset_bytes_written();
    }

    /// Objects and shared strings assigned a handle in this epoch.
    pub fn handles_assigned(&self) -> usize {
        self.handles.len()
    }

    /// Named types negotiated since the stream opened.
    pub fn types_negotiated(&self) -> usize {
        self.types.len()
    }

    /// Bunches flushed since the stream opened.
    pub fn bunches_flushed(&self) -> u64 {
        self.data.bunches_flushed()
    }
}
