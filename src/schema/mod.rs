//! Reflective SSZ schema: type descriptors, object paths, and the
//! generalized-index arithmetic that maps one onto the other.
//!
//! A schema is built once from constructors describing the root aggregate
//! (field names, kinds, length annotations) and cached for the lifetime of
//! the process; path resolution is pure arithmetic over it.

use crate::constant::next_power_of_two;
use crate::error::SchemaError;
use crate::types::Gindex;
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// Reserved path name selecting the length mix-in of a list.
pub const LEN_SEGMENT: &str = "__len__";

/// An SSZ type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum SszType {
    Basic(Basic),
    Container(Container),
    Enumerable(Enumerable),
}

/// A numeric or bool type identified by its packed byte width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Basic {
    pub size: u64,
}

/// An ordered mapping from field name to child type with stable field
/// positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub fields: FxHashMap<String, SszType>,
    pub field_index: FxHashMap<String, u64>,
}

/// A vector (fixed `length`) or list (non-zero `max_length`) of a single
/// element type.
#[derive(Debug, Clone, PartialEq)]
pub struct Enumerable {
    pub element: Box<SszType>,
    /// Fixed length for vectors; zero for lists.
    pub length: u64,
    /// Capacity for lists; zero for vectors.
    pub max_length: u64,
}

impl Enumerable {
    pub fn is_list(&self) -> bool {
        self.max_length > 0
    }

    /// Vector length, or list capacity when the length is open.
    pub fn length(&self) -> u64 {
        if self.length == 0 {
            self.max_length
        } else {
            self.length
        }
    }

    pub fn is_byte_vector(&self) -> bool {
        self.element.size() == 1 && self.length > 0
    }
}

impl SszType {
    pub fn basic(size: u64) -> Self {
        SszType::Basic(Basic { size })
    }

    pub fn uint64() -> Self {
        Self::basic(8)
    }

    pub fn boolean() -> Self {
        Self::basic(1)
    }

    pub fn vector(element: SszType, length: u64) -> Self {
        SszType::Enumerable(Enumerable {
            element: Box::new(element),
            length,
            max_length: 0,
        })
    }

    pub fn list(element: SszType, max_length: u64) -> Self {
        SszType::Enumerable(Enumerable {
            element: Box::new(element),
            length: 0,
            max_length,
        })
    }

    pub fn byte_vector(length: u64) -> Self {
        Self::vector(Self::basic(1), length)
    }

    /// Fields in declared order; positions follow declaration order.
    pub fn container(fields: Vec<(&str, SszType)>) -> Self {
        let mut map = FxHashMap::default();
        let mut index = FxHashMap::default();
        for (i, (name, typ)) in fields.into_iter().enumerate() {
            map.insert(name.to_string(), typ);
            index.insert(name.to_string(), i as u64);
        }
        SszType::Container(Container {
            fields: map,
            field_index: index,
        })
    }

    /// Byte width when packed into a parent: basic types their own width,
    /// composites one chunk.
    pub fn size(&self) -> u64 {
        match self {
            SszType::Basic(b) => b.size,
            _ => 32,
        }
    }

    /// Number of leaf chunks the type occupies before padding.
    pub fn chunks(&self) -> u64 {
        match self {
            SszType::Basic(_) => 1,
            SszType::Container(c) => c.fields.len() as u64,
            SszType::Enumerable(e) => (e.length() * e.element.size()).div_ceil(32),
        }
    }

    /// Byte length a reader fetches for a leaf of this type: the basic
    /// width, a byte vector's full length, otherwise one chunk.
    pub fn leaf_size(&self) -> u64 {
        match self {
            SszType::Basic(b) => b.size,
            SszType::Enumerable(e) if e.is_byte_vector() => e.length,
            _ => 32,
        }
    }
}

/// One step of an object path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Container field name.
    Name(String),
    /// Enumerable element index.
    Index(u64),
    /// The length mix-in of a list.
    Length,
}

/// A finite ordered sequence of path segments addressing a field,
/// sub-object, or list element of the root aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPath(Vec<Segment>);

impl ObjectPath {
    /// Path of field names; [`LEN_SEGMENT`] maps to [`Segment::Length`].
    pub fn named(names: &[&str]) -> Self {
        let mut path = ObjectPath::default();
        for name in names {
            path = path.append_name(name);
        }
        path
    }

    pub fn append_name(mut self, name: &str) -> Self {
        if name == LEN_SEGMENT {
            self.0.push(Segment::Length);
        } else {
            self.0.push(Segment::Name(name.to_string()));
        }
        self
    }

    pub fn append_index(mut self, index: u64) -> Self {
        self.0.push(Segment::Index(index));
        self
    }

    pub fn append_length(mut self) -> Self {
        self.0.push(Segment::Length);
        self
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.0.iter()
    }
}

/// A resolved tree position: the type at the end of the path, its gindex,
/// and the byte offset within the leading chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode<'a> {
    pub typ: Cow<'a, SszType>,
    pub gindex: Gindex,
    pub offset: u8,
}

/// Resolve a path against a root type, starting from gindex 1.
///
/// Containers step down by `next_power_of_two(chunks)` and across by field
/// position. Enumerables step down by the same factor (doubled for lists,
/// to skip past the length sibling) and across by the element's chunk
/// offset, recording the byte offset within that chunk. `__len__` steps to
/// the right child of a list anchor and resolves as an 8-byte basic leaf.
pub fn get_tree_node<'a>(
    root: &'a SszType,
    path: &ObjectPath,
) -> Result<SchemaNode<'a>, SchemaError> {
    let mut typ: &'a SszType = root;
    let mut synthetic_len = false;
    let mut gindex: Gindex = 1;
    let mut offset: u8 = 0;

    for seg in path.segments() {
        if synthetic_len {
            return Err(SchemaError::PathOverrun);
        }
        match (seg, typ) {
            (Segment::Length, SszType::Enumerable(e)) if e.is_list() => {
                gindex = 2 * gindex + 1;
                offset = 0;
                synthetic_len = true;
            }
            (Segment::Length, _) => return Err(SchemaError::NotAList),
            (_, SszType::Basic(_)) => return Err(SchemaError::PathOverrun),
            (Segment::Name(name), SszType::Container(c)) => {
                let pos = c
                    .field_index
                    .get(name)
                    .copied()
                    .ok_or_else(|| SchemaError::FieldNotFound(name.clone()))?;
                gindex = gindex * next_power_of_two(typ.chunks()) + pos;
                offset = 0;
                typ = &c.fields[name.as_str()];
            }
            (Segment::Name(name), SszType::Enumerable(_)) => {
                return Err(SchemaError::ExpectedIndex(name.clone()));
            }
            (Segment::Index(i), SszType::Container(_)) => {
                return Err(SchemaError::FieldNotFound(i.to_string()));
            }
            (Segment::Index(i), SszType::Enumerable(e)) => {
                let start = i * e.element.size();
                let chunk_offset = start / 32;
                let stride = if e.is_list() { 2 } else { 1 };
                gindex = gindex * stride * next_power_of_two(typ.chunks()) + chunk_offset;
                offset = (start % 32) as u8;
                typ = &e.element;
            }
        }
    }

    Ok(SchemaNode {
        typ: if synthetic_len {
            Cow::Owned(SszType::basic(8))
        } else {
            Cow::Borrowed(typ)
        },
        gindex,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> SszType {
        SszType::container(vec![
            ("root_a", SszType::byte_vector(32)),
            ("counter", SszType::uint64()),
            (
                "inner",
                SszType::container(vec![
                    ("first", SszType::byte_vector(4)),
                    ("second", SszType::byte_vector(4)),
                    ("epoch", SszType::uint64()),
                ]),
            ),
            ("roots", SszType::list(SszType::byte_vector(32), 8192)),
            ("values", SszType::list(SszType::uint64(), 1 << 40)),
            ("words", SszType::vector(SszType::uint64(), 8)),
        ])
    }

    #[test]
    fn test_container_field_gindices() {
        let schema = sample_schema();

        // Six fields pad to eight leaf positions under the root.
        let node = get_tree_node(&schema, &ObjectPath::named(&["root_a"])).unwrap();
        assert_eq!(node.gindex, 8);
        assert_eq!(node.typ.leaf_size(), 32);

        let node = get_tree_node(&schema, &ObjectPath::named(&["counter"])).unwrap();
        assert_eq!(node.gindex, 9);
        assert_eq!(node.typ.leaf_size(), 8);

        let node = get_tree_node(&schema, &ObjectPath::named(&["inner", "epoch"])).unwrap();
        assert_eq!(node.gindex, 10 * 4 + 2);
        assert_eq!(node.offset, 0);
    }

    #[test]
    fn test_list_len_and_elements() {
        let schema = sample_schema();

        let node = get_tree_node(&schema, &ObjectPath::named(&["roots", LEN_SEGMENT])).unwrap();
        assert_eq!(node.gindex, 2 * 11 + 1);
        assert_eq!(node.typ.leaf_size(), 8);

        // Element chunks sit under the doubled anchor, one per 32-byte root.
        let node =
            get_tree_node(&schema, &ObjectPath::named(&["roots"]).append_index(3)).unwrap();
        assert_eq!(node.gindex, 11 * 2 * 8192 + 3);
        assert_eq!(node.offset, 0);
    }

    #[test]
    fn test_packed_list_offsets() {
        let schema = sample_schema();

        // Four u64s share a chunk: index 5 lands in chunk 1 at byte 8.
        let node =
            get_tree_node(&schema, &ObjectPath::named(&["values"]).append_index(5)).unwrap();
        assert_eq!(node.gindex, 12 * 2 * (1u64 << 38) + 1);
        assert_eq!(node.offset, 8);
        assert_eq!(node.typ.leaf_size(), 8);
    }

    #[test]
    fn test_vector_has_no_length_sibling() {
        let schema = sample_schema();

        // Eight u64s occupy two chunks; no factor of two on the descent.
        let node =
            get_tree_node(&schema, &ObjectPath::named(&["words"]).append_index(4)).unwrap();
        assert_eq!(node.gindex, 13 * 2 + 1);
        assert_eq!(node.offset, 0);

        assert_eq!(
            get_tree_node(&schema, &ObjectPath::named(&["words", LEN_SEGMENT])),
            Err(SchemaError::NotAList)
        );
    }

    #[test]
    fn test_path_errors() {
        let schema = sample_schema();

        assert_eq!(
            get_tree_node(&schema, &ObjectPath::named(&["missing"])),
            Err(SchemaError::FieldNotFound("missing".to_string()))
        );
        assert_eq!(
            get_tree_node(&schema, &ObjectPath::named(&["counter", "deeper"])),
            Err(SchemaError::PathOverrun)
        );
        assert_eq!(
            get_tree_node(&schema, &ObjectPath::named(&["counter", LEN_SEGMENT])),
            Err(SchemaError::NotAList)
        );
        assert_eq!(
            get_tree_node(&schema, &ObjectPath::named(&["roots"]).append_name("x")),
            Err(SchemaError::ExpectedIndex("x".to_string()))
        );
        assert_eq!(
            get_tree_node(
                &schema,
                &ObjectPath::named(&["roots", LEN_SEGMENT]).append_index(0)
            ),
            Err(SchemaError::PathOverrun)
        );
    }

    #[test]
    fn test_chunks_and_sizes() {
        let schema = sample_schema();
        assert_eq!(schema.chunks(), 6);
        assert_eq!(schema.size(), 32);

        let pubkey = SszType::byte_vector(48);
        assert_eq!(pubkey.chunks(), 2);
        assert_eq!(pubkey.leaf_size(), 48);

        let values = SszType::list(SszType::uint64(), 1 << 40);
        assert_eq!(values.chunks(), 1 << 38);
    }
}
