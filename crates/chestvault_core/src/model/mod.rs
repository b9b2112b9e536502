//! Domain model for loaded containers.
//!
//! # Responsibility
//! - Define the in-memory container shape handed to load continuations.
//! - Define the key parts (owner name, group) that identify a container.
//!
//! # Invariants
//! - A container never holds a slot outside `[0, rows * 9)`.
//! - A container always has at least one row.

pub mod container;
pub mod group;
