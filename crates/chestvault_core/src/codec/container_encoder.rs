//! `Container` to tag tree encoding.

use super::container_decoder::{CASE_CORRECT_TAG, OWNER_NAME_TAG, ROWS_TAG};
use super::item_stack::encode_entry;
use crate::model::container::Container;
use crate::tag::{Compound, NamedTag, TagList, TagValue};

/// Encodes `container` with its items under `items_tag`.
///
/// The freshly-created flag is runtime state and is not written. `Rows` is a
/// byte (read back as unsigned) up to 255 rows and a wider integer beyond.
pub fn encode_container(container: &Container, items_tag: &str) -> NamedTag {
    let items = TagList::of_compounds(
        container
            .items()
            .map(|(slot, stack)| encode_entry(slot, stack)),
    );

    NamedTag::new(
        "",
        Compound::new()
            .with(items_tag, TagValue::List(items))
            .with(ROWS_TAG, rows_value(container.rows()))
            .with(
                OWNER_NAME_TAG,
                TagValue::String(container.owner_name().to_string()),
            )
            .with(
                CASE_CORRECT_TAG,
                TagValue::Byte(i8::from(container.is_name_case_correct())),
            ),
    )
}

fn rows_value(rows: usize) -> TagValue {
    if let Ok(narrow) = u8::try_from(rows) {
        return TagValue::Byte(narrow as i8);
    }
    match i32::try_from(rows) {
        Ok(wide) => TagValue::Int(wide),
        Err(_) => TagValue::Long(i64::try_from(rows).unwrap_or(i64::MAX)),
    }
}
