// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # graphwire - object-graph serialization for grid middleware
//!
//! Converts live object graphs and primitive data into a compact binary
//! wire format and reconstructs them on the receiving side. Built as the
//! serialization engine of an RPC/grid middleware stack: the layers above
//! hand it roots via `write_node`-style calls and nothing else.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use graphwire::{
//!     node, ChannelAccumulator, GraphWriter, Portable, Result, StreamConfig, TypeDirectory,
//! };
//!
//! #[derive(Portable)]
//! struct Sample {
//!     value: f64,
//!     label: String,
//! }
//!
//! fn main() -> Result<()> {
//!     let directory = Arc::new(TypeDirectory::new());
//!     directory.register::<Sample>();
//!
//!     let sink = ChannelAccumulator::new(Vec::new());
//!     let mut writer = GraphWriter::new(Box::new(sink), StreamConfig::default());
//!     let root = node(Sample { value: 42.0, label: "probe".into() });
//!     writer.write_node(Some(&root))?;
//!     writer.flush()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                     Stream Pair (by mode)                    |
//! |        graph (handles + types) | data | byte pass-through    |
//! +--------------------------------------------------------------+
//! |   Handle Table  |  Type Table  |  Field Plans (+ derive)     |
//! +--------------------------------------------------------------+
//! |        Bunch Codec (per-kind typed buffers, bulk arrays)     |
//! +--------------------------------------------------------------+
//! |      Accumulator / Dissipator over an ordered byte channel   |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`GraphWriter`] / [`GraphReader`] | Full graph-aware stream pair |
//! | [`StreamWriter`] / [`StreamReader`] | Mode-selected stream surface |
//! | [`TypeDirectory`] | Name-to-type registry shared into readers |
//! | [`NodeRef`] | Shared, serializable graph node |
//! | [`StreamConfig`] | Buffer budgets and array thresholds |
//!
//! ## Modules Overview
//!
//! - [`stream`] - mode selection (start here)
//! - [`graph`] - object-graph writer/reader and the [`Portable`] trait
//! - [`batch`] - the buffered primitive codec
//! - [`channel`] - the byte-channel boundary
//! - [`plan`] - per-type descriptors and the registry
//! - [`table`] - identity-keyed handle/type maps
//! - [`pool`] - shared buffer cache

// Allow the derive macro to work inside this crate's tests
extern crate self as graphwire;

/// The buffered primitive codec (bunch framing).
pub mod batch;
/// Byte-channel traits and buffered std::io adapters.
pub mod channel;
/// Stream tunables.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Object-graph serialization (handles, types, cycles).
pub mod graph;
/// Per-type serialization descriptors and the type registry.
pub mod plan;
/// Shared cache of reusable typed buffers.
pub mod pool;
/// Mode-selected stream surface (graph / data / byte).
pub mod stream;
/// Identity-keyed integer maps.
pub mod table;
/// Wire-level constants.
pub mod wire;

pub use batch::{BunchReader, BunchWriter};
pub use channel::{Accumulator, ChannelAccumulator, ChannelDissipator, Dissipator, MemChannel};
pub use config::StreamConfig;
pub use error::{Error, Result};
pub use graph::{cast, cast_mut, node, Described, GraphReader, GraphWriter, NodeRef, Portable, Replacer};
pub use plan::{FieldKind, FieldPlan, FieldSpec, TypeDirectory};
pub use pool::BufferPool;
pub use stream::{Mode, StreamReader, StreamWriter};
pub use wire::PrimKind;

// The derive macro; expands against the paths re-exported above.
pub use graphwire_codegen::Portable;
