//! Commit and tag payloads.
//!
//! Both are a block of `key SP value` header lines, a blank line, and a free
//! text message:
//!
//! ```text
//! tree 9c1e0f...
//! parent 3b18e5...
//! author A U Thor <author@example.com> 1700000000 +0000
//! committer A U Thor <author@example.com> 1700000000 +0000
//!
//! message body, kept verbatim (blank lines included)
//! ```
//!
//! A header value may span several lines; continuation lines start with a
//! single space. Keys may repeat (`parent`), and keep their first-seen order.
//!
//! Values and the message are raw bytes. An `encoding` header may declare a
//! legacy charset for the message, so nothing past the key is assumed UTF-8.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectType;
use indexmap::IndexMap;

/// Ordered header lines plus a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Kvlm {
    headers: IndexMap<String, Vec<Vec<u8>>>,
    message: Vec<u8>,
}

impl Kvlm {
    /// Create an empty header block with an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `key`. Repeated keys keep every value in order.
    ///
    /// Keys must be non-empty and contain neither a space nor a newline;
    /// anything else would not read back as the same key.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Result<()> {
        let key = key.into();
        validate_key(&key)?;
        self.append(key, value.into());
        Ok(())
    }

    fn append(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.headers
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    /// All values of `key`, in the order they were added.
    pub fn get_all(&self, key: &str) -> &[Vec<u8>] {
        self.headers.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first value of `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.get_all(key).first().map(Vec::as_slice)
    }

    /// Header keys in order of first appearance.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.headers.keys().map(String::as_str)
    }

    /// Everything after the blank separator line.
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Replace the message.
    pub fn set_message(&mut self, message: impl Into<Vec<u8>>) {
        self.message = message.into();
    }

    /// Serialize headers, the blank separator line, then the message.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();

        for (key, values) in &self.headers {
            for value in values {
                out.extend_from_slice(key.as_bytes());
                out.push(b' ');
                for &byte in value {
                    out.push(byte);
                    if byte == b'\n' {
                        out.push(b' ');
                    }
                }
                out.push(b'\n');
            }
        }

        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// Parse a payload. Everything after the first blank line is the message.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut kvlm = Kvlm::new();
        let mut rest = data;

        loop {
            if let Some(message) = rest.strip_prefix(b"\n") {
                kvlm.message = message.to_vec();
                return Ok(kvlm);
            }

            let (line, tail) = split_line(rest)
                .ok_or_else(|| Error::malformed("missing blank line before message"))?;

            let space = line.iter().position(|&b| b == b' ').ok_or_else(|| {
                Error::malformed(format!(
                    "header line has no key: {:?}",
                    String::from_utf8_lossy(line)
                ))
            })?;
            if space == 0 {
                return Err(Error::malformed("header line starts with a space"));
            }
            let key = std::str::from_utf8(&line[..space])
                .map_err(|e| Error::malformed(format!("header key is not UTF-8: {}", e)))?;

            let mut value = line[space + 1..].to_vec();
            rest = tail;
            while let Some(continued) = rest.strip_prefix(b" ") {
                let (line, tail) = split_line(continued)
                    .ok_or_else(|| Error::malformed("unterminated continuation line"))?;
                value.push(b'\n');
                value.extend_from_slice(line);
                rest = tail;
            }

            kvlm.append(key, value);
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_header("header key cannot be empty"));
    }
    if key.contains([' ', '\n']) {
        return Err(Error::invalid_header(format!(
            "header key cannot contain a space or newline: {:?}",
            key
        )));
    }
    Ok(())
}

/// Split off one `\n`-terminated line, dropping the terminator.
fn split_line(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = data.iter().position(|&b| b == b'\n')?;
    Some((&data[..end], &data[end + 1..]))
}

/// Read a header value holding a hex address.
fn parse_hash(value: &[u8]) -> Result<Hash> {
    let hex = std::str::from_utf8(value)
        .map_err(|_| Error::invalid_hash("address header is not ASCII"))?;
    Hash::from_hex(hex)
}

/// A commit object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Commit {
    kvlm: Kvlm,
}

impl Commit {
    /// Start building a commit of the given tree.
    pub fn builder(tree: Hash) -> CommitBuilder {
        CommitBuilder::new(tree)
    }

    /// Wrap an already-populated header block.
    pub fn from_kvlm(kvlm: Kvlm) -> Self {
        Self { kvlm }
    }

    /// The underlying header block.
    pub fn kvlm(&self) -> &Kvlm {
        &self.kvlm
    }

    /// The tree this commit snapshots.
    pub fn tree(&self) -> Result<Hash> {
        let value = self
            .kvlm
            .get("tree")
            .ok_or_else(|| Error::malformed("commit has no tree"))?;
        parse_hash(value)
    }

    /// Parent commits, in header order.
    pub fn parents(&self) -> Result<Vec<Hash>> {
        self.kvlm
            .get_all("parent")
            .iter()
            .map(|p| parse_hash(p))
            .collect()
    }

    /// Raw author line: `Name <email> timestamp tz`.
    pub fn author(&self) -> Option<&[u8]> {
        self.kvlm.get("author")
    }

    /// Raw committer line.
    pub fn committer(&self) -> Option<&[u8]> {
        self.kvlm.get("committer")
    }

    /// Declared charset of the message, if any.
    pub fn encoding(&self) -> Option<&[u8]> {
        self.kvlm.get("encoding")
    }

    /// The message bytes, verbatim.
    pub fn message(&self) -> &[u8] {
        self.kvlm.message()
    }

    /// Encode the payload.
    pub fn serialize(&self) -> Vec<u8> {
        self.kvlm.serialize()
    }

    /// Decode a payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Kvlm::parse(data).map(Self::from_kvlm)
    }
}

/// Builds a commit with headers in conventional order.
#[derive(Debug, Clone)]
pub struct CommitBuilder {
    tree: Hash,
    parents: Vec<Hash>,
    author: Vec<u8>,
    committer: Vec<u8>,
    message: Vec<u8>,
}

impl CommitBuilder {
    /// A commit of `tree` with no parents, identities or message yet.
    pub fn new(tree: Hash) -> Self {
        Self {
            tree,
            parents: Vec::new(),
            author: Vec::new(),
            committer: Vec::new(),
            message: Vec::new(),
        }
    }

    /// Add one parent after those already added.
    pub fn parent(mut self, parent: Hash) -> Self {
        self.parents.push(parent);
        self
    }

    /// Add several parents, in order.
    pub fn parents(mut self, parents: impl IntoIterator<Item = Hash>) -> Self {
        self.parents.extend(parents);
        self
    }

    /// Full identity line, e.g. `Name <email> 1700000000 +0000`.
    pub fn author(mut self, author: impl Into<Vec<u8>>) -> Self {
        self.author = author.into();
        self
    }

    /// Full identity line of the committer.
    pub fn committer(mut self, committer: impl Into<Vec<u8>>) -> Self {
        self.committer = committer.into();
        self
    }

    /// Message stored after the blank line, verbatim.
    pub fn message(mut self, message: impl Into<Vec<u8>>) -> Self {
        self.message = message.into();
        self
    }

    /// Emit `tree`, `parent`..., `author`, `committer`, then the message.
    /// Empty identities are left out.
    pub fn build(self) -> Commit {
        let mut kvlm = Kvlm::new();
        kvlm.append("tree", self.tree.to_hex());
        for parent in self.parents {
            kvlm.append("parent", parent.to_hex());
        }
        if !self.author.is_empty() {
            kvlm.append("author", self.author);
        }
        if !self.committer.is_empty() {
            kvlm.append("committer", self.committer);
        }
        kvlm.set_message(self.message);
        Commit { kvlm }
    }
}

/// An annotated tag object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tag {
    kvlm: Kvlm,
}

impl Tag {
    /// Tag `object` (of type `target_type`) under `name`.
    pub fn new(
        object: Hash,
        target_type: ObjectType,
        name: impl Into<Vec<u8>>,
        tagger: impl Into<Vec<u8>>,
        message: impl Into<Vec<u8>>,
    ) -> Self {
        let mut kvlm = Kvlm::new();
        kvlm.append("object", object.to_hex());
        kvlm.append("type", target_type.as_str());
        kvlm.append("tag", name);
        kvlm.append("tagger", tagger);
        kvlm.set_message(message);
        Self { kvlm }
    }

    /// Wrap an already-populated header block.
    pub fn from_kvlm(kvlm: Kvlm) -> Self {
        Self { kvlm }
    }

    /// The underlying header block.
    pub fn kvlm(&self) -> &Kvlm {
        &self.kvlm
    }

    /// The tagged object.
    pub fn object(&self) -> Result<Hash> {
        let value = self
            .kvlm
            .get("object")
            .ok_or_else(|| Error::malformed("tag has no object"))?;
        parse_hash(value)
    }

    /// Declared type of the tagged object.
    pub fn target_type(&self) -> Result<ObjectType> {
        let value = self
            .kvlm
            .get("type")
            .ok_or_else(|| Error::malformed("tag has no type"))?;
        ObjectType::from_tag(value)
    }

    /// The tag's name.
    pub fn name(&self) -> Option<&[u8]> {
        self.kvlm.get("tag")
    }

    /// Raw tagger line.
    pub fn tagger(&self) -> Option<&[u8]> {
        self.kvlm.get("tagger")
    }

    /// The message bytes, verbatim.
    pub fn message(&self) -> &[u8] {
        self.kvlm.message()
    }

    /// Encode the payload.
    pub fn serialize(&self) -> Vec<u8> {
        self.kvlm.serialize()
    }

    /// Decode a payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Kvlm::parse(data).map(Self::from_kvlm)
    }
}
