//! Tag stream writer.

use super::{Compound, MalformedFormatError, NamedTag, TagKind, TagList, TagResult, TagValue};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// Serializes a root tag to the uncompressed wire layout.
pub fn to_bytes(tag: &NamedTag) -> TagResult<Vec<u8>> {
    let mut out = Vec::new();
    out.push(TagKind::Compound.id());
    write_string(&mut out, &tag.name)?;
    write_compound(&mut out, &tag.root)?;
    Ok(out)
}

/// Serializes a root tag and gzip-compresses it, matching on-disk files.
pub fn to_gzip_bytes(tag: &NamedTag) -> TagResult<Vec<u8>> {
    let plain = to_bytes(tag)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&plain)
        .map_err(MalformedFormatError::Compression)?;
    encoder.finish().map_err(MalformedFormatError::Compression)
}

fn write_string(out: &mut Vec<u8>, value: &str) -> TagResult<()> {
    let len = u16::try_from(value.len()).map_err(|_| MalformedFormatError::StringTooLong {
        length: value.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    // Saturates at i32::MAX.
    let len = i32::try_from(len).unwrap_or(i32::MAX);
    out.extend_from_slice(&len.to_be_bytes());
}

fn write_compound(out: &mut Vec<u8>, compound: &Compound) -> TagResult<()> {
    for (name, value) in compound.iter() {
        out.push(value.kind().id());
        write_string(out, name)?;
        write_payload(out, value)?;
    }
    out.push(TagKind::End.id());
    Ok(())
}

fn write_list(out: &mut Vec<u8>, list: &TagList) -> TagResult<()> {
    out.push(list.element_kind().id());
    write_length(out, list.len());
    for item in list.iter() {
        write_payload(out, item)?;
    }
    Ok(())
}

fn write_payload(out: &mut Vec<u8>, value: &TagValue) -> TagResult<()> {
    match value {
        TagValue::Byte(v) => out.extend_from_slice(&v.to_be_bytes()),
        TagValue::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
        TagValue::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
        TagValue::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
        TagValue::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
        TagValue::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
        TagValue::ByteArray(bytes) => {
            write_length(out, bytes.len());
            out.extend_from_slice(bytes);
        }
        TagValue::String(text) => write_string(out, text)?,
        TagValue::List(list) => write_list(out, list)?,
        TagValue::Compound(compound) => write_compound(out, compound)?,
        TagValue::IntArray(values) => {
            write_length(out, values.len());
            for v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        TagValue::LongArray(values) => {
            write_length(out, values.len());
            for v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{to_bytes, to_gzip_bytes};
    use crate::tag::{parse, Compound, MalformedFormatError, NamedTag, TagList, TagValue};

    fn sample_tree() -> NamedTag {
        let item = Compound::new()
            .with("id", TagValue::Short(264))
            .with("Count", TagValue::Byte(3))
            .with("Slot", TagValue::Byte(4));
        NamedTag::new(
            "",
            Compound::new()
                .with("Inventory", TagValue::List(TagList::of_compounds([item])))
                .with("Rows", TagValue::Byte(2))
                .with("OwnerName", TagValue::String("Notch".to_string()))
                .with("Blob", TagValue::ByteArray(vec![1, 2, 3]))
                .with("Ints", TagValue::IntArray(vec![-1, 7]))
                .with("Longs", TagValue::LongArray(vec![i64::MIN]))
                .with("Ratio", TagValue::Double(0.5)),
        )
    }

    #[test]
    fn plain_bytes_parse_back_to_same_tree() {
        let tree = sample_tree();
        let bytes = to_bytes(&tree).expect("encode");
        assert_eq!(parse(&bytes).expect("decode"), tree);
    }

    #[test]
    fn gzip_bytes_are_detected_by_parser() {
        let tree = sample_tree();
        let bytes = to_gzip_bytes(&tree).expect("encode");
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(parse(&bytes).expect("decode"), tree);
    }

    #[test]
    fn empty_list_is_written_with_end_kind() {
        let tree = NamedTag::new(
            "",
            Compound::new().with("Inventory", TagValue::List(TagList::empty())),
        );
        let bytes = to_bytes(&tree).expect("encode");
        // root(1) + name len(2) + child kind(1) + "Inventory" len(2) + 9 bytes, then list header.
        assert_eq!(bytes[15], 0);
        assert_eq!(parse(&bytes).expect("decode"), tree);
    }

    #[test]
    fn oversized_string_is_rejected() {
        let tree = NamedTag::new(
            "",
            Compound::new().with("Name", TagValue::String("x".repeat(70_000))),
        );
        let err = to_bytes(&tree).expect_err("oversized string must fail");
        assert!(matches!(
            err,
            MalformedFormatError::StringTooLong { length: 70_000 }
        ));
    }
}
