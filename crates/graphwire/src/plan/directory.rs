// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name-to-type registry consulted by readers.
//!
//! There is no global registration: applications own a directory, register
//! the types a stream may carry, and share it into readers by `Arc`. The
//! map is concurrent so independent streams can register and resolve from
//! multiple threads; registration is idempotent, so two streams racing to
//! register the same type is harmless.

use std::cell::RefCell;
use std::rc::Rc;

use dashmap::DashMap;

use super::{FieldPlan, STR_PLAN};
use crate::graph::{Described, NodeRef, Portable};

/// How a reader materializes a value of one registered type. The closed set
/// of decode strategies is fixed here, per type, at registration; nothing
/// is decided per call.
#[derive(Clone)]
pub enum Registration {
    /// A derived struct: blank construction, field population, and an
    /// optional post-read substitution.
    Struct {
        plan: &'static FieldPlan,
        vacant: fn() -> NodeRef,
        resolve: Option<fn(NodeRef) -> NodeRef>,
    },
    /// The built-in identity-shared string type.
    Str,
}

impl Registration {
    /// Plan backing this registration.
    pub fn plan(&self) -> &'static FieldPlan {
        match self {
            Registration::Struct { plan, .. } => plan,
            Registration::Str => &STR_PLAN,
        }
    }
}

fn make_vacant<T: Described + Portable + 'static>() -> NodeRef {
    Rc::new(RefCell::new(T::vacant()))
}

/// Thread-safe registry mapping negotiated type names to registrations.
pub struct TypeDirectory {
    entries: DashMap<&'static str, Registration>,
}

impl TypeDirectory {
    /// Directory with the built-in string type pre-registered.
    pub fn new() -> Self {
        let entries = DashMap::new();
        entries.insert(STR_PLAN.type_name, Registration::Str);
        TypeDirectory { entries }
    }

    /// Registers `T` under its plan's type name. Idempotent.
    pub fn register<T: Described + Portable + 'static>(&self) {
        let plan = T::plan_static();
        log::debug!("[TYPES] register {}", plan.type_name);
        self.entries.insert(
            plan.type_name,
            Registration::Struct {
                plan,
                vacant: make_vacant::<T>,
                resolve: T::resolve_hook(),
            },
        );
    }

    /// Registration for a negotiated name, if any.
    pub fn lookup(&self, name: &str) -> Option<Registration> {
        self.entries.get(name).map(|e| e.clone())
    }

    /// True when `name` resolves.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered types, the built-in string type included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: the built-in string type is always present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TypeDirectory {
    fn default() -> Self {
        TypeDirectory::new()
    }
}
