//! Container domain model.
//!
//! # Responsibility
//! - Hold one owner's decoded item collection for one group.
//! - Enforce the slot-range clamp on every insertion.
//!
//! # Invariants
//! - `rows >= 1`; capacity is `rows * SLOTS_PER_ROW`.
//! - `slots` keys are always `< capacity`; out-of-range inserts are dropped.
//! - `freshly_created` is true only for containers synthesized without
//!   backing data.

use crate::tag::Compound;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Number of slots in one row-group.
pub const SLOTS_PER_ROW: usize = 9;
/// Largest row count whose capacity still fits in `usize`.
pub const MAX_ROWS: usize = usize::MAX / SLOTS_PER_ROW;

/// Container shared between the cache and every continuation of one load.
pub type SharedContainer = Arc<Container>;

/// Item type reference as stored in the tag stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
    /// Legacy numeric id (`Short` tag).
    Numeric(i16),
    /// Namespaced id (`String` tag).
    Named(String),
}

/// One stack of items occupying a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStack {
    pub id: ItemId,
    /// Quantity in the stack.
    pub count: i8,
    pub damage: i16,
    /// Opaque extra item data, kept untouched.
    pub metadata: Option<Compound>,
}

impl ItemStack {
    pub fn new(id: ItemId, count: i8) -> Self {
        Self {
            id,
            count,
            damage: 0,
            metadata: None,
        }
    }
}

/// Decoded or freshly created item container for one (owner, group) key.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    rows: usize,
    owner_name: String,
    name_case_correct: bool,
    freshly_created: bool,
    slots: BTreeMap<usize, ItemStack>,
}

impl Container {
    /// Creates an empty container; `rows` is clamped to `1..=MAX_ROWS`.
    pub fn new(owner_name: impl Into<String>, name_case_correct: bool, rows: usize) -> Self {
        Self {
            rows: rows.clamp(1, MAX_ROWS),
            owner_name: owner_name.into(),
            name_case_correct,
            freshly_created: false,
            slots: BTreeMap::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Total slot count (`rows * 9`).
    pub fn capacity(&self) -> usize {
        self.rows * SLOTS_PER_ROW
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub fn is_name_case_correct(&self) -> bool {
        self.name_case_correct
    }

    pub fn is_freshly_created(&self) -> bool {
        self.freshly_created
    }

    pub fn set_freshly_created(&mut self, freshly_created: bool) {
        self.freshly_created = freshly_created;
    }

    /// Installs `stack` at `slot` when the slot is inside capacity.
    ///
    /// Returns `false` and drops the stack otherwise.
    pub fn insert_item(&mut self, slot: usize, stack: ItemStack) -> bool {
        if slot >= self.capacity() {
            return false;
        }
        self.slots.insert(slot, stack);
        true
    }

    pub fn item(&self, slot: usize) -> Option<&ItemStack> {
        self.slots.get(&slot)
    }

    /// Occupied slots in ascending slot order.
    pub fn items(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots.iter().map(|(slot, stack)| (*slot, stack))
    }

    pub fn occupied_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
