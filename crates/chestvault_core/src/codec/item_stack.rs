//! Item entry layout inside the items list.

use crate::model::container::{ItemId, ItemStack};
use crate::tag::{Compound, MalformedFormatError, TagResult, TagValue};

pub(crate) const SLOT_TAG: &str = "Slot";
const ID_TAG: &str = "id";
const COUNT_TAG: &str = "Count";
const DAMAGE_TAG: &str = "Damage";
const METADATA_TAG: &str = "tag";

/// Parses one list entry into its raw slot position and item stack.
///
/// The slot is returned unclamped; range checks belong to the container.
pub(crate) fn parse_entry(index: usize, value: &TagValue) -> TagResult<(i64, ItemStack)> {
    let entry = value.as_compound().ok_or_else(|| invalid(index, "entry is not a compound"))?;

    let slot = entry
        .get(SLOT_TAG)
        .and_then(TagValue::as_i64)
        .ok_or_else(|| invalid(index, "missing integral `Slot`"))?;

    let id = match entry.get(ID_TAG) {
        Some(TagValue::String(name)) => ItemId::Named(name.clone()),
        Some(other) => {
            let numeric = other
                .as_i64()
                .and_then(|raw| i16::try_from(raw).ok())
                .ok_or_else(|| invalid(index, "`id` is neither a string nor a short"))?;
            ItemId::Numeric(numeric)
        }
        None => return Err(invalid(index, "missing `id`")),
    };

    let count = match entry.get(COUNT_TAG) {
        Some(value) => value
            .as_i64()
            .and_then(|raw| i8::try_from(raw).ok())
            .ok_or_else(|| invalid(index, "`Count` is not a byte"))?,
        None => 1,
    };

    let damage = match entry.get(DAMAGE_TAG) {
        Some(value) => value
            .as_i64()
            .and_then(|raw| i16::try_from(raw).ok())
            .ok_or_else(|| invalid(index, "`Damage` is not a short"))?,
        None => 0,
    };

    let metadata = entry.get(METADATA_TAG).and_then(TagValue::as_compound).cloned();

    Ok((
        slot,
        ItemStack {
            id,
            count,
            damage,
            metadata,
        },
    ))
}

/// Encodes one stack at `slot` using the narrowest slot width that fits.
pub(crate) fn encode_entry(slot: usize, stack: &ItemStack) -> Compound {
    let slot_value = if let Ok(narrow) = i8::try_from(slot) {
        TagValue::Byte(narrow)
    } else if let Ok(wide) = i32::try_from(slot) {
        TagValue::Int(wide)
    } else {
        TagValue::Long(i64::try_from(slot).unwrap_or(i64::MAX))
    };
    let id_value = match &stack.id {
        ItemId::Numeric(id) => TagValue::Short(*id),
        ItemId::Named(name) => TagValue::String(name.clone()),
    };

    let mut entry = Compound::new()
        .with(ID_TAG, id_value)
        .with(COUNT_TAG, TagValue::Byte(stack.count))
        .with(DAMAGE_TAG, TagValue::Short(stack.damage))
        .with(SLOT_TAG, slot_value);
    if let Some(metadata) = &stack.metadata {
        entry.insert(METADATA_TAG, TagValue::Compound(metadata.clone()));
    }
    entry
}

fn invalid(index: usize, reason: &str) -> MalformedFormatError {
    MalformedFormatError::InvalidEntry {
        index,
        reason: reason.to_string(),
    }
}
