//! Tag tree to `Container` decoding.
//!
//! # Responsibility
//! - Resolve the row count (stored `Rows`, else inferred from slots).
//! - Resolve owner name and case-correctness.
//! - Install item entries, dropping positions outside capacity.
//!
//! # Invariants
//! - Resolution order for rows: stored value, then inference, bounded to
//!   `1..=MAX_ROWS`.
//! - Resolution order for names: public key, stored case-correct name,
//!   identity source, requested name as given.

use super::item_stack::parse_entry;
use crate::identity::IdentitySource;
use crate::model::container::{Container, MAX_ROWS, SLOTS_PER_ROW};
use crate::tag::{parse, MalformedFormatError, NamedTag, TagKind, TagResult, TagValue};
use log::debug;
use std::sync::Arc;

/// Items list tag name used by database-stored containers.
pub const DEFAULT_ITEMS_TAG: &str = "Inventory";
/// Reserved key of the shared container every owner can open.
pub const DEFAULT_PUBLIC_KEY_NAME: &str = "--publicchest";

pub(crate) const ROWS_TAG: &str = "Rows";
pub(crate) const OWNER_NAME_TAG: &str = "OwnerName";
pub(crate) const CASE_CORRECT_TAG: &str = "NameCaseCorrect";

/// Smallest row count that holds slot `max_slot`, or one row when empty.
pub fn infer_rows(max_slot: Option<usize>) -> usize {
    max_slot.map_or(1, |slot| slot / SLOTS_PER_ROW + 1)
}

/// Decodes containers and builds empty ones with consistent name rules.
#[derive(Clone)]
pub struct ContainerDecoder {
    identity: Arc<dyn IdentitySource>,
    public_key_name: String,
    items_tag: String,
}

impl ContainerDecoder {
    pub fn new(identity: Arc<dyn IdentitySource>) -> Self {
        Self {
            identity,
            public_key_name: DEFAULT_PUBLIC_KEY_NAME.to_string(),
            items_tag: DEFAULT_ITEMS_TAG.to_string(),
        }
    }

    pub fn with_public_key_name(mut self, name: impl Into<String>) -> Self {
        self.public_key_name = name.into();
        self
    }

    pub fn with_items_tag(mut self, name: impl Into<String>) -> Self {
        self.items_tag = name.into();
        self
    }

    pub fn items_tag(&self) -> &str {
        &self.items_tag
    }

    pub fn public_key_name(&self) -> &str {
        &self.public_key_name
    }

    pub fn is_public_key(&self, owner_name: &str) -> bool {
        owner_name == self.public_key_name
    }

    /// Resolves the canonical owner name without stored data.
    ///
    /// Returns `(name, case_correct)`.
    pub fn resolve_owner(&self, requested_name: &str) -> (String, bool) {
        if self.is_public_key(requested_name) {
            return (requested_name.to_string(), true);
        }
        match self.identity.resolve_canonical_name(requested_name) {
            Some(canonical) => (canonical, true),
            None => (requested_name.to_string(), false),
        }
    }

    /// Parses `bytes` and decodes the result.
    pub fn decode_bytes(&self, bytes: &[u8], requested_name: &str) -> TagResult<Container> {
        let tree = parse(bytes)?;
        self.decode(&tree, requested_name)
    }

    /// Decodes a parsed tag tree for `requested_name`.
    ///
    /// # Errors
    /// - `MissingTag` when the items list is absent.
    /// - `UnexpectedType` when the items list or `Rows` has the wrong type.
    /// - `InvalidEntry` when an item entry lacks its slot or id.
    pub fn decode(&self, tree: &NamedTag, requested_name: &str) -> TagResult<Container> {
        let items_value = tree
            .find_by_name(&self.items_tag)
            .ok_or_else(|| MalformedFormatError::MissingTag(self.items_tag.clone()))?;
        let items = items_value
            .as_list()
            .ok_or_else(|| MalformedFormatError::UnexpectedType {
                name: self.items_tag.clone(),
                expected: TagKind::List,
                found: items_value.kind(),
            })?;
        if !items.is_empty() && items.element_kind() != TagKind::Compound {
            return Err(MalformedFormatError::UnexpectedType {
                name: self.items_tag.clone(),
                expected: TagKind::Compound,
                found: items.element_kind(),
            });
        }

        let entries = items
            .iter()
            .enumerate()
            .map(|(index, value)| parse_entry(index, value))
            .collect::<TagResult<Vec<_>>>()?;

        let rows = match tree.find_by_name(ROWS_TAG) {
            Some(value) => stored_rows(value)?,
            None => {
                let max_slot = entries
                    .iter()
                    .filter_map(|(slot, _)| usize::try_from(*slot).ok())
                    .max();
                infer_rows(max_slot)
            }
        };

        let (owner_name, case_correct) = self.resolve_stored_owner(tree, requested_name);
        let mut container = Container::new(owner_name, case_correct, rows);

        let mut dropped = 0usize;
        for (slot, stack) in entries {
            let installed = usize::try_from(slot)
                .map(|slot| container.insert_item(slot, stack))
                .unwrap_or(false);
            if !installed {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(
                "event=container_decode module=codec status=truncated rows={} dropped={}",
                container.rows(),
                dropped
            );
        }

        Ok(container)
    }

    /// Creates an empty container for `requested_name` with `rows` rows.
    pub fn empty_container(&self, requested_name: &str, rows: usize) -> Container {
        let (owner_name, case_correct) = self.resolve_owner(requested_name);
        let mut container = Container::new(owner_name, case_correct, rows);
        container.set_freshly_created(true);
        container
    }

    fn resolve_stored_owner(&self, tree: &NamedTag, requested_name: &str) -> (String, bool) {
        if self.is_public_key(requested_name) {
            return (requested_name.to_string(), true);
        }
        let stored_name = tree.find_by_name(OWNER_NAME_TAG).and_then(TagValue::as_str);
        let stored_flag = tree
            .find_by_name(CASE_CORRECT_TAG)
            .and_then(TagValue::as_i64);
        if let (Some(name), Some(1)) = (stored_name, stored_flag) {
            return (name.to_string(), true);
        }
        self.resolve_owner(requested_name)
    }
}

fn stored_rows(value: &TagValue) -> TagResult<usize> {
    let rows = match value {
        // Stored as a signed byte on the wire but meant as 0..=255.
        TagValue::Byte(raw) => usize::from(*raw as u8),
        other => match other.as_i64() {
            Some(raw) if raw <= 0 => 0,
            Some(raw) => usize::try_from(raw).unwrap_or(MAX_ROWS),
            None => {
                return Err(MalformedFormatError::UnexpectedType {
                    name: ROWS_TAG.to_string(),
                    expected: TagKind::Byte,
                    found: other.kind(),
                })
            }
        },
    };
    Ok(rows.clamp(1, MAX_ROWS))
}
