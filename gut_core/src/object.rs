//! Object framing and the typed object model.
//!
//! Every object is stored as the zlib-compressed form of:
//!
//! ```text
//! <type> SP <decimal payload length> NUL <payload>
//! ```
//!
//! where `<type>` is one of `blob`, `tree`, `commit` or `tag`. The address of
//! the object is the SHA-1 of exactly these bytes (before compression).

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::kvlm::{Commit, Tag};
use crate::tree::Tree;
use serde::Serialize;
use std::fmt;

/// Object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// A blob (file content).
    Blob,
    /// A tree (directory listing).
    Tree,
    /// A commit (tree snapshot plus history and authorship).
    Commit,
    /// An annotated tag.
    Tag,
}

impl ObjectType {
    /// Get the header tag of this object type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
        }
    }

    /// Parse a header tag.
    pub fn from_tag(tag: &[u8]) -> Result<Self> {
        match tag {
            b"blob" => Ok(ObjectType::Blob),
            b"tree" => Ok(ObjectType::Tree),
            b"commit" => Ok(ObjectType::Commit),
            b"tag" => Ok(ObjectType::Tag),
            _ => Err(Error::unknown_object_type(
                String::from_utf8_lossy(tag).into_owned(),
            )),
        }
    }
}

impl std::str::FromStr for ObjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s.as_bytes())
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame a payload with its type tag and length.
pub fn encode_header(object_type: ObjectType, payload: &[u8]) -> Vec<u8> {
    let len = payload.len().to_string();
    let tag = object_type.as_str();

    let mut buf = Vec::with_capacity(tag.len() + 1 + len.len() + 1 + payload.len());
    buf.extend_from_slice(tag.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(len.as_bytes());
    buf.push(0);
    buf.extend_from_slice(payload);
    buf
}

/// Split a decompressed object into its type and payload.
///
/// The declared length must match the bytes after the NUL exactly.
pub fn decode_header(data: &[u8]) -> Result<(ObjectType, &[u8])> {
    let space = data
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::malformed("header has no type separator"))?;

    let object_type = ObjectType::from_tag(&data[..space])?;

    let nul = data[space + 1..]
        .iter()
        .position(|&b| b == 0)
        .map(|offset| space + 1 + offset)
        .ok_or_else(|| Error::malformed("header has no length terminator"))?;

    let declared = parse_length(&data[space + 1..nul])?;
    let payload = &data[nul + 1..];

    if declared != payload.len() {
        return Err(Error::malformed(format!(
            "Payload length mismatch: header declares {}, found {}",
            declared,
            payload.len()
        )));
    }

    Ok((object_type, payload))
}

fn parse_length(digits: &[u8]) -> Result<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(Error::malformed(format!(
            "Invalid length field: {:?}",
            String::from_utf8_lossy(digits)
        )));
    }

    // Digits only, so the only failure left is overflow.
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::malformed("Length field overflows"))
}

/// A blob: opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    /// Wrap raw bytes.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// The payload is the data itself.
    pub fn serialize(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Any payload is a valid blob.
    pub fn parse(payload: &[u8]) -> Self {
        Self::new(payload)
    }
}

/// A stored object of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// The type tag written in this object's header.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Blob(_) => ObjectType::Blob,
            Object::Tree(_) => ObjectType::Tree,
            Object::Commit(_) => ObjectType::Commit,
            Object::Tag(_) => ObjectType::Tag,
        }
    }

    /// Serialize the payload (without header).
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Object::Blob(blob) => blob.serialize(),
            Object::Tree(tree) => tree.serialize(),
            Object::Commit(commit) => commit.serialize(),
            Object::Tag(tag) => tag.serialize(),
        }
    }

    /// Parse a payload of the given type.
    pub fn parse(object_type: ObjectType, payload: &[u8]) -> Result<Self> {
        Ok(match object_type {
            ObjectType::Blob => Object::Blob(Blob::parse(payload)),
            ObjectType::Tree => Object::Tree(Tree::parse(payload)?),
            ObjectType::Commit => Object::Commit(Commit::parse(payload)?),
            ObjectType::Tag => Object::Tag(Tag::parse(payload)?),
        })
    }

    /// The canonical encoded bytes: header plus payload.
    pub fn encode(&self) -> Vec<u8> {
        encode_header(self.object_type(), &self.serialize())
    }

    /// Decode header-framed bytes back into an object.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (object_type, payload) = decode_header(data)?;
        Self::parse(object_type, payload)
    }

    /// The content address of this object.
    pub fn hash(&self) -> Hash {
        Hash::hash_bytes(&self.encode())
    }

    /// The blob, if this is one.
    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Object::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    /// The tree, if this is one.
    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Object::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// The commit, if this is one.
    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Object::Commit(commit) => Some(commit),
            _ => None,
        }
    }

    /// The tag, if this is one.
    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Object::Tag(tag) => Some(tag),
            _ => None,
        }
    }
}

impl From<Blob> for Object {
    fn from(blob: Blob) -> Self {
        Object::Blob(blob)
    }
}

impl From<Tree> for Object {
    fn from(tree: Tree) -> Self {
        Object::Tree(tree)
    }
}

impl From<Commit> for Object {
    fn from(commit: Commit) -> Self {
        Object::Commit(commit)
    }
}

impl From<Tag> for Object {
    fn from(tag: Tag) -> Self {
        Object::Tag(tag)
    }
}
