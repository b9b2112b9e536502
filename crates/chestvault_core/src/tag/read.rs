//! Tag stream parser.
//!
//! # Invariants
//! - Offsets reported in errors are relative to the decompressed stream.
//! - Nesting depth is bounded so hostile input cannot exhaust the stack.
//! - Gzip input never inflates past [`MAX_INFLATED_BYTES`].

use super::{Compound, MalformedFormatError, NamedTag, TagKind, TagList, TagResult, TagValue};
use flate2::read::GzDecoder;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const MAX_DEPTH: usize = 512;

/// Upper bound on the inflated size of a gzip-compressed record.
pub const MAX_INFLATED_BYTES: usize = 16 * 1024 * 1024;

/// Parses one root tag from `bytes`.
///
/// Gzip-compressed input is detected by its magic header and inflated first.
/// Bytes after the root compound are ignored.
///
/// # Errors
/// - `InflatedTooLarge` when gzip input expands past [`MAX_INFLATED_BYTES`].
pub fn parse(bytes: &[u8]) -> TagResult<NamedTag> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let inflated = inflate(bytes, MAX_INFLATED_BYTES)?;
        return parse_plain(&inflated);
    }
    parse_plain(bytes)
}

fn inflate(bytes: &[u8], limit: usize) -> TagResult<Vec<u8>> {
    let mut inflated = Vec::new();
    GzDecoder::new(bytes)
        .take(limit as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(MalformedFormatError::Compression)?;
    if inflated.len() > limit {
        return Err(MalformedFormatError::InflatedTooLarge { limit });
    }
    Ok(inflated)
}

fn parse_plain(bytes: &[u8]) -> TagResult<NamedTag> {
    let mut reader = TagReader::new(bytes);
    let kind = reader.read_kind()?;
    if kind != TagKind::Compound {
        return Err(MalformedFormatError::RootNotCompound(kind));
    }
    let name = reader.read_string()?;
    let root = reader.read_compound(0)?;
    Ok(NamedTag { name, root })
}

struct TagReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TagReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> TagResult<&'a [u8]> {
        let remaining = self.buf.len() - self.pos;
        if remaining < len {
            return Err(MalformedFormatError::UnexpectedEof {
                offset: self.pos,
                needed: len - remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> TagResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> TagResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    fn read_i8(&mut self) -> TagResult<i8> {
        Ok(i8::from_be_bytes(self.take_array()?))
    }

    fn read_i16(&mut self) -> TagResult<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    fn read_u16(&mut self) -> TagResult<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    fn read_i32(&mut self) -> TagResult<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    fn read_i64(&mut self) -> TagResult<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    fn read_kind(&mut self) -> TagResult<TagKind> {
        let offset = self.pos;
        let type_id = self.read_u8()?;
        TagKind::from_id(type_id)
            .ok_or(MalformedFormatError::UnknownTagType { offset, type_id })
    }

    fn read_length(&mut self) -> TagResult<usize> {
        let offset = self.pos;
        let length = self.read_i32()?;
        usize::try_from(length).map_err(|_| MalformedFormatError::NegativeLength { offset, length })
    }

    fn read_string(&mut self) -> TagResult<String> {
        let len = usize::from(self.read_u16()?);
        let offset = self.pos;
        let raw = self.take(len)?;
        decode_java_utf8(raw).ok_or(MalformedFormatError::InvalidString { offset })
    }

    fn read_compound(&mut self, depth: usize) -> TagResult<Compound> {
        if depth >= MAX_DEPTH {
            return Err(MalformedFormatError::NestingTooDeep { offset: self.pos });
        }
        let mut compound = Compound::new();
        loop {
            let kind = self.read_kind()?;
            if kind == TagKind::End {
                return Ok(compound);
            }
            let name = self.read_string()?;
            let value = self.read_payload(kind, depth + 1)?;
            compound.insert(name, value);
        }
    }

    fn read_list(&mut self, depth: usize) -> TagResult<TagList> {
        if depth >= MAX_DEPTH {
            return Err(MalformedFormatError::NestingTooDeep { offset: self.pos });
        }
        let element_kind = self.read_kind()?;
        let len = self.read_length()?;
        if element_kind == TagKind::End {
            // End elements carry no payload, whatever the declared length.
            return Ok(TagList::empty());
        }
        let mut items = Vec::with_capacity(len.min(self.buf.len() - self.pos));
        for _ in 0..len {
            items.push(self.read_payload(element_kind, depth + 1)?);
        }
        Ok(TagList {
            element_kind,
            items,
        })
    }

    fn read_payload(&mut self, kind: TagKind, depth: usize) -> TagResult<TagValue> {
        let value = match kind {
            TagKind::End => {
                return Err(MalformedFormatError::UnknownTagType {
                    offset: self.pos,
                    type_id: 0,
                })
            }
            TagKind::Byte => TagValue::Byte(self.read_i8()?),
            TagKind::Short => TagValue::Short(self.read_i16()?),
            TagKind::Int => TagValue::Int(self.read_i32()?),
            TagKind::Long => TagValue::Long(self.read_i64()?),
            TagKind::Float => TagValue::Float(f32::from_be_bytes(self.take_array()?)),
            TagKind::Double => TagValue::Double(f64::from_be_bytes(self.take_array()?)),
            TagKind::ByteArray => {
                let len = self.read_length()?;
                TagValue::ByteArray(self.take(len)?.to_vec())
            }
            TagKind::String => TagValue::String(self.read_string()?),
            TagKind::List => TagValue::List(self.read_list(depth)?),
            TagKind::Compound => TagValue::Compound(self.read_compound(depth)?),
            TagKind::IntArray => {
                let len = self.read_length()?;
                let mut values = Vec::with_capacity(len.min(self.buf.len() / 4));
                for _ in 0..len {
                    values.push(self.read_i32()?);
                }
                TagValue::IntArray(values)
            }
            TagKind::LongArray => {
                let len = self.read_length()?;
                let mut values = Vec::with_capacity(len.min(self.buf.len() / 8));
                for _ in 0..len {
                    values.push(self.read_i64()?);
                }
                TagValue::LongArray(values)
            }
        };
        Ok(value)
    }
}

/// Decodes the JVM "modified UTF-8" encoding used by the format.
///
/// Standard UTF-8 is accepted as-is. The two-byte NUL form `C0 80` is mapped
/// back to `\0`, and supplementary characters written as two three-byte
/// surrogates are recombined.
fn decode_java_utf8(raw: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(raw) {
        return Some(text.to_string());
    }
    let mut normalized = Vec::with_capacity(raw.len());
    let mut index = 0;
    while index < raw.len() {
        if raw[index] == 0xC0 && raw.get(index + 1) == Some(&0x80) {
            normalized.push(0);
            index += 2;
        } else if let Some(ch) = surrogate_pair(&raw[index..]) {
            let mut buf = [0u8; 4];
            normalized.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            index += 6;
        } else {
            normalized.push(raw[index]);
            index += 1;
        }
    }
    String::from_utf8(normalized).ok()
}

/// Reads a high/low surrogate pair encoded as `ED Ax xx ED Bx xx`.
fn surrogate_pair(bytes: &[u8]) -> Option<char> {
    let [0xED, h1 @ 0xA0..=0xAF, h2 @ 0x80..=0xBF, 0xED, l1 @ 0xB0..=0xBF, l2 @ 0x80..=0xBF, ..] =
        bytes
    else {
        return None;
    };
    let high = (u32::from(*h1 & 0x0F) << 6) | u32::from(*h2 & 0x3F);
    let low = (u32::from(*l1 & 0x0F) << 6) | u32::from(*l2 & 0x3F);
    char::from_u32(0x10000 + (high << 10) + low)
}

#[cfg(test)]
mod tests {
    use super::{decode_java_utf8, inflate, parse};
    use crate::tag::{to_gzip_bytes, Compound, MalformedFormatError, NamedTag, TagKind, TagValue};

    fn root_with_byte(name: &str, value: i8) -> Vec<u8> {
        let mut bytes = vec![10, 0, 0];
        bytes.push(1);
        bytes.extend_from_slice(&(name.len() as u16).to_be_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(value as u8);
        bytes.push(0);
        bytes
    }

    #[test]
    fn parses_minimal_root_compound() {
        let tree = parse(&root_with_byte("Rows", 3)).expect("valid stream");
        assert_eq!(tree.name, "");
        assert_eq!(tree.find_by_name("Rows"), Some(&TagValue::Byte(3)));
    }

    #[test]
    fn truncated_stream_is_malformed() {
        let mut bytes = root_with_byte("Rows", 3);
        bytes.truncate(bytes.len() - 2);
        let err = parse(&bytes).expect_err("truncated stream must fail");
        assert!(matches!(err, MalformedFormatError::UnexpectedEof { .. }));
    }

    #[test]
    fn unknown_type_id_is_malformed() {
        let bytes = vec![10, 0, 0, 42, 0, 0];
        let err = parse(&bytes).expect_err("unknown type must fail");
        assert!(matches!(
            err,
            MalformedFormatError::UnknownTagType { type_id: 42, offset: 3 }
        ));
    }

    #[test]
    fn non_compound_root_is_rejected() {
        let bytes = vec![1, 0, 0, 5];
        let err = parse(&bytes).expect_err("byte root must fail");
        assert!(matches!(
            err,
            MalformedFormatError::RootNotCompound(TagKind::Byte)
        ));
    }

    #[test]
    fn negative_array_length_is_rejected() {
        let mut bytes = vec![10, 0, 0, 7, 0, 1, b'a'];
        bytes.extend_from_slice(&(-1i32).to_be_bytes());
        let err = parse(&bytes).expect_err("negative length must fail");
        assert!(matches!(
            err,
            MalformedFormatError::NegativeLength { length: -1, .. }
        ));
    }

    #[test]
    fn empty_input_is_eof() {
        let err = parse(&[]).expect_err("empty input must fail");
        assert!(matches!(err, MalformedFormatError::UnexpectedEof { offset: 0, .. }));
    }

    #[test]
    fn modified_utf8_nul_is_decoded() {
        assert_eq!(decode_java_utf8(b"a\xC0\x80b").as_deref(), Some("a\0b"));
        assert!(decode_java_utf8(b"\xFF").is_none());
    }

    #[test]
    fn surrogate_pairs_are_recombined() {
        let raw = b"\xED\xA0\xBD\xED\xB8\x80";
        assert_eq!(decode_java_utf8(raw).as_deref(), Some("\u{1F600}"));
        assert_eq!(
            decode_java_utf8(b"a\xC0\x80\xED\xA0\xBD\xED\xB8\x80b").as_deref(),
            Some("a\0\u{1F600}b")
        );
        // A lone high surrogate is still rejected.
        assert!(decode_java_utf8(b"\xED\xA0\xBD").is_none());
    }

    #[test]
    fn owner_name_with_supplementary_character_parses() {
        let name = b"OwnerName";
        let value = b"A\xED\xA0\xBD\xED\xB8\x80";
        let mut bytes = vec![10, 0, 0, 8];
        bytes.extend_from_slice(&(name.len() as u16).to_be_bytes());
        bytes.extend_from_slice(name);
        bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        bytes.extend_from_slice(value);
        bytes.push(0);

        let tree = parse(&bytes).expect("surrogate pair is valid");
        assert_eq!(
            tree.find_by_name("OwnerName"),
            Some(&TagValue::String("A\u{1F600}".to_string()))
        );
    }

    #[test]
    fn inflation_stops_at_the_limit() {
        let tree = NamedTag::new(
            "",
            Compound::new().with("Blob", TagValue::ByteArray(vec![0; 4096])),
        );
        let gz = to_gzip_bytes(&tree).expect("encode");

        let err = inflate(&gz, 1024).expect_err("over limit");
        assert!(matches!(err, MalformedFormatError::InflatedTooLarge { limit: 1024 }));

        let inflated = inflate(&gz, 8192).expect("under limit");
        assert!(inflated.len() > 4096);
        assert!(parse(&gz).is_ok());
    }
}
