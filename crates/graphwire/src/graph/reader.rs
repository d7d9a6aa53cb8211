// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader half of the graph stream.

use std::rc::Rc;
use std::sync::Arc;

use super::{NodeRef, SharedValue};
use crate::batch::BunchReader;
use crate::channel::Dissipator;
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::plan::{FieldPlan, Registration, TypeDirectory};
use crate::wire::{PrimKind, FIRST_HANDLE, FIRST_TYPE_ID, NUL_HANDLE, RESET_HANDLE, TYPE_BIT, TYPE_MASK};

/// Resolved decode strategy for one negotiated type id.
#[derive(Clone)]
enum TypeSlot {
    Struct {
        plan: &'static FieldPlan,
        vacant: fn() -> NodeRef,
        resolve: Option<fn(NodeRef) -> NodeRef>,
    },
    Str,
}

/// Generate scalar delegations to the bunch reader
macro_rules! impl_delegate_scalar {
    ($($name:ident -> $type:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self) -> Result<$type> {
                self.data.$name()
            }
        )*
    };
}

/// Generate the inline-vector + root-array pair for one kind
macro_rules! impl_read_arrays {
    ($vec:ident, $array:ident, $slice:ident, $type:ty, $zero:expr, $kind:expr) => {
        /// Length-prefixed inline array, mirror of the field write path.
        pub fn $vec(&mut self) -> Result<Vec<$type>> {
            let len = self.read_inline_len()?;
            let mut v = vec![$zero; len];
            self.data.$slice(&mut v)?;
            Ok(v)
        }

        /// Root-level array transfer into a caller slice of known length.
        /// The declared kind and length must agree with the header just
        /// read or the call fails without touching the slice.
        pub fn $array(&mut self, dst: &mut [$type]) -> Result<()> {
            self.expect_array_header($kind, dst.len())?;
            self.data.$slice(dst)
        }
    };
}

/// Reconstructs object graphs written by [`super::GraphWriter`].
pub struct GraphReader {
    data: BunchReader,
    directory: Arc<TypeDirectory>,
    objects: Vec<SharedValue>,
    types: Vec<TypeSlot>,
}

impl GraphReader {
    /// Graph reader over a dissipator, resolving type names against
    /// `directory`.
    pub fn new(inp: Box<dyn Dissipator>, cfg: StreamConfig, directory: Arc<TypeDirectory>) -> Self {
        GraphReader {
            data: BunchReader::new(inp, cfg),
            directory,
            objects: Vec::new(),
            types: Vec::new(),
        }
    }

    impl_delegate_scalar!(
        read_bool -> bool,
        read_u8 -> u8,
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

    /// Inline UTF-8 string field; `None` when the writer passed null.
    pub fn read_utf(&mut self) -> Result<Option<String>> {
        self.data.read_utf()
    }

    /// Inline string field that must not be null (a `String` field).
    pub fn read_string(&mut self) -> Result<String> {
        self.data
            .read_utf()?
            .ok_or_else(|| Error::corrupt("unexpected null string field"))
    }

    fn read_inline_len(&mut self) -> Result<usize> {
        let len = self.data.read_i32()?;
        if len < 0 {
            return Err(Error::corrupt(format!("negative array length {len}")));
        }
        Ok(len as usize)
    }

    /// Length-prefixed inline bool array.
    pub fn read_bool_vec(&mut self) -> Result<Vec<bool>> {
        let len = self.read_inline_len()?;
        let mut v = vec![false; len];
        self.data.read_bool_slice(&mut v)?;
        Ok(v)
    }

    /// Root-level bool array into a caller slice of known length.
    pub fn read_bool_array(&mut self, dst: &mut [bool]) -> Result<()> {
        self.expect_array_header(PrimKind::Bool, dst.len())?;
        self.data.read_bool_slice(dst)
    }

    impl_read_arrays!(read_u8_vec, read_u8_array, read_u8_slice, u8, 0, PrimKind::U8);
    impl_read_arrays!(read_u16_vec, read_u16_array, read_u16_slice, u16, 0, PrimKind::U16);
    impl_read_arrays!(read_i16_vec, read_i16_array, read_i16_slice, i16, 0, PrimKind::I16);
    impl_read_arrays!(read_i32_vec, read_i32_array, read_i32_slice, i32, 0, PrimKind::I32);
    impl_read_arrays!(read_i64_vec, read_i64_array, read_i64_slice, i64, 0, PrimKind::I64);
    impl_read_arrays!(read_f32_vec, read_f32_array, read_f32_slice, f32, 0.0, PrimKind::F32);
    impl_read_arrays!(read_f64_vec, read_f64_array, read_f64_slice, f64, 0.0, PrimKind::F64);

    /// Length-prefixed inline array of node references.
    pub fn read_node_vec(&mut self) -> Result<Vec<Option<NodeRef>>> {
        let len = self.read_inline_len()?;
        let mut v = Vec::with_capacity(len);
        for _ in 0..len {
            v.push(self.read_node()?);
        }
        Ok(v)
    }

    /// Reads a handle slot, absorbing reset sentinels. The sentinel drops
    /// every object binding but leaves the negotiated types in place,
    /// matching the writer's reset.
    fn read_handle_slot(&mut self) -> Result<u32> {
        loop {
            let v = self.data.read_i32()? as u32;
            if v == RESET_HANDLE {
                log::debug!("[READER] reset sentinel; dropping {} handles", self.objects.len());
                self.objects.clear();
                continue;
            }
            return Ok(v);
        }
    }

    /// Registers a freshly allocated shared value, returning its handle.
    /// Must happen before the value's fields are populated so that cycles
    /// resolve to the instance under construction.
    fn register(&mut self, value: SharedValue) -> u32 {
        self.objects.push(value);
        FIRST_HANDLE + self.objects.len() as u32 - 1
    }

    fn lookup(&self, handle: u32) -> Result<&SharedValue> {
        if handle < FIRST_HANDLE {
            return Err(Error::corrupt(format!("control value {handle} where a handle was expected")));
        }
        self.objects
            .get((handle - FIRST_HANDLE) as usize)
            .ok_or_else(|| Error::corrupt(format!("back-reference to unassigned handle {handle}")))
    }

    /// Resolves a type id, consuming the announced name when the id is
    /// fresh. A gap in the id sequence means the writer and reader have
    /// diverged and the stream is unusable.
    fn resolve_type(&mut self, tid: u32) -> Result<TypeSlot> {
        if tid < FIRST_TYPE_ID {
            return Err(Error::corrupt(format!("primitive array id {tid} in object position")));
        }
        let next = FIRST_TYPE_ID + self.types.len() as u32;
        if tid < next {
            return Ok(self.types[(tid - FIRST_TYPE_ID) as usize].clone());
        }
        if tid != next {
            return Err(Error::corrupt(format!(
                "type id {tid} announced out of order (expected {next})"
            )));
        }
        let name = self
            .data
            .read_utf()?
            .ok_or_else(|| Error::corrupt("null type name"))?;
        let slot = match self.directory.lookup(&name) {
            None => return Err(Error::UnknownType(name)),
            Some(Registration::Str) => TypeSlot::Str,
            Some(Registration::Struct {
                plan,
                vacant,
                resolve,
            }) => TypeSlot::Struct {
                plan,
                vacant,
                resolve,
            },
        };
        log::debug!("[READER] new type {tid:#x} name={name}");
        self.types.push(slot.clone());
        Ok(slot)
    }

    /// Reads an object graph: null, a back-reference, or a new payload.
    pub fn read_node(&mut self) -> Result<Option<NodeRef>> {
        let wire = self.read_handle_slot()?;
        if wire == NUL_HANDLE {
            return Ok(None);
        }
        if wire & TYPE_BIT == 0 {
            return match self.lookup(wire)? {
                SharedValue::Node(n) => Ok(Some(n.clone())),
                SharedValue::Str(_) => Err(Error::corrupt(format!(
                    "handle {wire} is a string, not an object"
                ))),
            };
        }
        let tid = wire & TYPE_MASK;
        match self.resolve_type(tid)? {
            TypeSlot::Str => Err(Error::corrupt("string payload in object position")),
            TypeSlot::Struct {
                plan,
                vacant,
                resolve,
            } => {
                let node = vacant();
                let handle = self.register(SharedValue::Node(node.clone()));
                log::debug!("[READER] new object handle {handle} type {}", plan.type_name);
                node.borrow_mut().read_body(self)?;
                if let Some(resolve) = resolve {
                    let resolved = resolve(node);
                    // Later back-references must see the substituted value.
                    self.objects[(handle - FIRST_HANDLE) as usize] =
                        SharedValue::Node(resolved.clone());
                    return Ok(Some(resolved));
                }
                Ok(Some(node))
            }
        }
    }

    /// Reads an identity-shared string.
    pub fn read_shared_str(&mut self) -> Result<Option<Rc<str>>> {
        let wire = self.read_handle_slot()?;
        if wire == NUL_HANDLE {
            return Ok(None);
        }
        if wire & TYPE_BIT == 0 {
            return match self.lookup(wire)? {
                SharedValue::Str(s) => Ok(Some(s.clone())),
                SharedValue::Node(_) => Err(Error::corrupt(format!(
                    "handle {wire} is an object, not a string"
                ))),
            };
        }
        match self.resolve_type(wire & TYPE_MASK)? {
            TypeSlot::Str => {
                let s = self
                    .data
                    .read_utf()?
                    .ok_or_else(|| Error::corrupt("null shared string payload"))?;
                let shared: Rc<str> = Rc::from(s);
                self.register(SharedValue::Str(shared.clone()));
                Ok(Some(shared))
            }
            TypeSlot::Struct { plan, .. } => Err(Error::corrupt(format!(
                "object payload of type {} in string position",
                plan.type_name
            ))),
        }
    }

    /// Validates a root array header against the caller's expectation.
    fn expect_array_header(&mut self, kind: PrimKind, len: usize) -> Result<()> {
        let wire = self.read_handle_slot()?;
        if wire & TYPE_BIT == 0 {
            return Err(Error::corrupt(format!(
                "array header expected, found handle {wire}"
            )));
        }
        let tid = wire & TYPE_MASK;
        if tid != kind.wire_id() {
            let found = PrimKind::from_wire_id(tid)
                .map(PrimKind::name)
                .unwrap_or("non-primitive");
            return Err(Error::mismatch(format!(
                "declared {} array, header says {}",
                kind.name(),
                found
            )));
        }
        let wire_len = self.data.read_i32()?;
        if wire_len as usize != len || wire_len < 0 {
            return Err(Error::mismatch(format!(
                "declared {} elements, header says {}",
                len, wire_len
            )));
        }
        Ok(())
    }

    /// Drops every object binding without touching negotiated types. Only
    /// sound when the application knows no earlier back-reference can
    /// still arrive.
    pub fn clear(&mut self) {
        log::debug!("[READER] explicit clear of {} handles", self.objects.len());
        self.objects.clear();
    }

    /// Bytes available without blocking, including decoded-but-unread
    /// typed data.
    pub fn available(&self) -> usize {
        self.data.available()
    }

    /// Drops the tables and releases the channel.
    pub fn close(&mut self) -> Result<()> {
        self.objects.clear();
        self.types.clear();
        self.data.close()
    }

    /// Logical bytes served by the channel so far.
    pub fn bytes_read(&self) -> u64 {
        self.data.bytes_read()
    }

    /// Restarts the channel's byte counter.
    pub fn reset_bytes_read(&mut self) {
        self.data.reset_bytes_read();
    }

    /// Objects and shared strings currently bound to handles.
    pub fn handles_bound(&self) -> usize {
        self.objects.len()
    }

    /// Named types resolved since the stream opened.
    pub fn types_resolved(&self) -> usize {
        self.types.len()
    }
}
