//! Binary tag tree format used by persisted containers.
//!
//! # Responsibility
//! - Model the named, typed, nested tag tree (NBT family layout).
//! - Parse raw (optionally gzip-compressed) bytes into a tree.
//! - Write trees back to bytes for fixtures and round trips.
//!
//! # Invariants
//! - Child names inside one compound are unique lookup keys.
//! - Every list carries exactly one element kind.
//! - Parsing is pure: no I/O beyond the provided byte slice.

use indexmap::IndexMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod read;
mod write;

pub use read::{parse, MAX_INFLATED_BYTES};
pub use write::{to_bytes, to_gzip_bytes};

pub type TagResult<T> = Result<T, MalformedFormatError>;

/// Type id of one tag payload, as written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    End,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    ByteArray,
    String,
    List,
    Compound,
    IntArray,
    LongArray,
}

impl TagKind {
    /// Maps a wire type id to a tag kind.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::End),
            1 => Some(Self::Byte),
            2 => Some(Self::Short),
            3 => Some(Self::Int),
            4 => Some(Self::Long),
            5 => Some(Self::Float),
            6 => Some(Self::Double),
            7 => Some(Self::ByteArray),
            8 => Some(Self::String),
            9 => Some(Self::List),
            10 => Some(Self::Compound),
            11 => Some(Self::IntArray),
            12 => Some(Self::LongArray),
            _ => None,
        }
    }

    /// Wire type id for this kind.
    pub fn id(self) -> u8 {
        match self {
            Self::End => 0,
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int => 3,
            Self::Long => 4,
            Self::Float => 5,
            Self::Double => 6,
            Self::ByteArray => 7,
            Self::String => 8,
            Self::List => 9,
            Self::Compound => 10,
            Self::IntArray => 11,
            Self::LongArray => 12,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::End => "end",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::ByteArray => "byte_array",
            Self::String => "string",
            Self::List => "list",
            Self::Compound => "compound",
            Self::IntArray => "int_array",
            Self::LongArray => "long_array",
        }
    }
}

/// Payload of one tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(TagList),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl TagValue {
    pub fn kind(&self) -> TagKind {
        match self {
            Self::Byte(_) => TagKind::Byte,
            Self::Short(_) => TagKind::Short,
            Self::Int(_) => TagKind::Int,
            Self::Long(_) => TagKind::Long,
            Self::Float(_) => TagKind::Float,
            Self::Double(_) => TagKind::Double,
            Self::ByteArray(_) => TagKind::ByteArray,
            Self::String(_) => TagKind::String,
            Self::List(_) => TagKind::List,
            Self::Compound(_) => TagKind::Compound,
            Self::IntArray(_) => TagKind::IntArray,
            Self::LongArray(_) => TagKind::LongArray,
        }
    }

    /// Widens any integral scalar to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(value) => Some(i64::from(*value)),
            Self::Short(value) => Some(i64::from(*value)),
            Self::Int(value) => Some(i64::from(*value)),
            Self::Long(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Self::Compound(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&TagList> {
        match self {
            Self::List(value) => Some(value),
            _ => None,
        }
    }
}

/// Homogeneous list payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TagList {
    element_kind: TagKind,
    items: Vec<TagValue>,
}

impl TagList {
    /// Empty list; written with element kind `End` like the reference format.
    pub fn empty() -> Self {
        Self {
            element_kind: TagKind::End,
            items: Vec::new(),
        }
    }

    /// Builds a list from values that must all share `element_kind`.
    ///
    /// Returns `None` when any value has a different kind.
    pub fn new(element_kind: TagKind, items: Vec<TagValue>) -> Option<Self> {
        if items.iter().any(|item| item.kind() != element_kind) {
            return None;
        }
        Some(Self {
            element_kind,
            items,
        })
    }

    /// Builds a list of compounds.
    pub fn of_compounds(items: impl IntoIterator<Item = Compound>) -> Self {
        let items: Vec<TagValue> = items.into_iter().map(TagValue::Compound).collect();
        if items.is_empty() {
            return Self::empty();
        }
        Self {
            element_kind: TagKind::Compound,
            items,
        }
    }

    pub fn element_kind(&self) -> TagKind {
        self.element_kind
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagValue> {
        self.items.iter()
    }
}

/// Compound payload: an insertion-ordered map of uniquely named children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    entries: IndexMap<String, TagValue>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one child; a replaced child keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: TagValue) -> Option<TagValue> {
        self.entries.insert(name.into(), value)
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: TagValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Direct-child lookup by name.
    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

/// Root of a parsed stream: one named compound.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTag {
    pub name: String,
    pub root: Compound,
}

impl NamedTag {
    pub fn new(name: impl Into<String>, root: Compound) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Looks up a direct child of the root compound.
    pub fn find_by_name(&self, name: &str) -> Option<&TagValue> {
        self.root.get(name)
    }
}

/// The byte stream or tag tree is structurally invalid.
#[derive(Debug)]
pub enum MalformedFormatError {
    UnexpectedEof {
        offset: usize,
        needed: usize,
    },
    UnknownTagType {
        offset: usize,
        type_id: u8,
    },
    NegativeLength {
        offset: usize,
        length: i32,
    },
    InvalidString {
        offset: usize,
    },
    NestingTooDeep {
        offset: usize,
    },
    RootNotCompound(TagKind),
    Compression(std::io::Error),
    InflatedTooLarge {
        limit: usize,
    },
    StringTooLong {
        length: usize,
    },
    MissingTag(String),
    UnexpectedType {
        name: String,
        expected: TagKind,
        found: TagKind,
    },
    InvalidEntry {
        index: usize,
        reason: String,
    },
}

impl Display for MalformedFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedEof { offset, needed } => write!(
                f,
                "tag stream ended at offset {offset} while {needed} more bytes were needed"
            ),
            Self::UnknownTagType { offset, type_id } => {
                write!(f, "unknown tag type id {type_id} at offset {offset}")
            }
            Self::NegativeLength { offset, length } => {
                write!(f, "negative length {length} at offset {offset}")
            }
            Self::InvalidString { offset } => {
                write!(f, "string at offset {offset} is not valid UTF-8")
            }
            Self::NestingTooDeep { offset } => {
                write!(f, "tag nesting too deep at offset {offset}")
            }
            Self::RootNotCompound(kind) => {
                write!(f, "root tag must be a compound, found {}", kind.as_str())
            }
            Self::Compression(err) => write!(f, "gzip tag stream error: {err}"),
            Self::InflatedTooLarge { limit } => {
                write!(f, "gzip tag stream inflates past {limit} bytes")
            }
            Self::StringTooLong { length } => {
                write!(f, "string of {length} bytes exceeds the 65535 byte limit")
            }
            Self::MissingTag(name) => write!(f, "required tag `{name}` is missing"),
            Self::UnexpectedType {
                name,
                expected,
                found,
            } => write!(
                f,
                "tag `{name}` has type {}, expected {}",
                found.as_str(),
                expected.as_str()
            ),
            Self::InvalidEntry { index, reason } => {
                write!(f, "item entry #{index} is invalid: {reason}")
            }
        }
    }
}

impl Error for MalformedFormatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Compression(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Compound, NamedTag, TagKind, TagList, TagValue};

    #[test]
    fn tag_kind_ids_roundtrip() {
        for id in 0..=12u8 {
            let kind = TagKind::from_id(id).expect("known id");
            assert_eq!(kind.id(), id);
        }
        assert!(TagKind::from_id(13).is_none());
    }

    #[test]
    fn compound_insert_replaces_in_place() {
        let mut compound = Compound::new()
            .with("a", TagValue::Byte(1))
            .with("b", TagValue::Byte(2));
        let previous = compound.insert("a", TagValue::Byte(3));

        assert_eq!(previous, Some(TagValue::Byte(1)));
        let names: Vec<&str> = compound.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(compound.get("a"), Some(&TagValue::Byte(3)));
    }

    #[test]
    fn list_rejects_mixed_kinds() {
        let mixed = TagList::new(
            TagKind::Byte,
            vec![TagValue::Byte(1), TagValue::Short(2)],
        );
        assert!(mixed.is_none());
    }

    #[test]
    fn find_by_name_is_direct_child_only() {
        let nested = Compound::new().with("Rows", TagValue::Byte(3));
        let tree = NamedTag::new(
            "",
            Compound::new().with("Nested", TagValue::Compound(nested)),
        );

        assert!(tree.find_by_name("Nested").is_some());
        assert!(tree.find_by_name("Rows").is_none());
    }

    #[test]
    fn as_i64_widens_integral_kinds_only() {
        assert_eq!(TagValue::Byte(-2).as_i64(), Some(-2));
        assert_eq!(TagValue::Short(300).as_i64(), Some(300));
        assert_eq!(TagValue::Long(1 << 40).as_i64(), Some(1 << 40));
        assert_eq!(TagValue::Float(1.0).as_i64(), None);
    }
}
