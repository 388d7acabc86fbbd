// Copyright 2019-2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

/*!
 * A sparse linear algebra engine in the GraphBLAS style: matrices and
 * vectors over a dynamically-typed element registry, combined through
 * user-supplied unary/binary/select operators rather than a fixed set of
 * numeric kinds.
 *
 * Three pieces make up the engine:
 *
 *   1. Blocked storage with a per-block decoration cache ([`storage`],
 *      [`decoration`], [`formats`]): every matrix/vector block keeps at
 *      most one representation per format (dictionary-of-keys, coordinate
 *      list, dense, compressed-row/column, and their accelerator mirrors),
 *      converting lazily and caching the result until the next write.
 *
 *   2. An expression graph and scheduler ([`expression`]): operations are
 *      built up as a DAG of nodes with explicit dependency edges, then
 *      submitted to a worker pool that dispatches nodes as their
 *      predecessors finish, aborting the whole graph on the first error.
 *
 *   3. An algorithm registry and kernel builder ([`algorithms`],
 *      [`kernel_builder`], [`accelerator`]): each operation kind has an
 *      ordered list of candidate algorithms, the first of which to accept
 *      the operands' runtime types and formats wins; accelerator-backed
 *      candidates compose their device kernel source from a deterministic,
 *      hash-cached builder.
 *
 * Element types, and the unary/binary/select operators over them, are
 * runtime handles ([`types::Type`], [`ops::OpUnary`], [`ops::OpBinary`],
 * [`ops::OpSelect`]) rather than Rust generics — the dynamic-dispatch
 * tradeoff this crate makes in exchange for treating every algorithm as a
 * single, format-polymorphic implementation instead of a monomorphized one
 * per element type.
 */

mod accelerator;
mod algorithms;
mod config;
mod conversions;
mod decoration;
mod descriptor;
mod error;
mod expression;
mod formats;
mod kernel_builder;
mod library;
mod matrix;
mod ops;
mod scalar;
mod shared;
mod storage;
mod types;
mod vector;

pub use accelerator::AcceleratorBackend;
pub use config::Config;
pub use descriptor::Descriptor;
pub use error::{Error, Message, MessageCallback, Result, Severity};
pub use expression::{Expression, NodeId, NodeResult, State, Submission};
pub use kernel_builder::KernelBuilder;
pub use library::Library;
pub use matrix::Matrix;
pub use ops::{builtin as ops_builtin, BinOpFlags, OpBinary, OpSelect, OpUnary};
pub use scalar::{Array, Scalar};
pub use shared::Shared;
pub use types::{Type, Value, BOOL, BYTE, FLOAT, INT, TYPE_REGISTRY, UINT, UNIT};
pub use vector::Vector;
