//! Tree encoding and directory structure.
//!
//! A tree payload is a concatenation of entries:
//!
//! ```text
//! <mode> SP <name> NUL <20-byte binary address>
//! ```
//!
//! Entries are kept in canonical order: bytewise by name, except that
//! directories compare as if their name ended in `/`.

use crate::error::{Error, Result};
use crate::hash::{HASH_SIZE, Hash};
use std::cmp::Ordering;

/// Width of the mode field once normalised.
pub const MODE_WIDTH: usize = 6;

/// Common file modes.
pub mod file_modes {
    /// Regular file (non-executable).
    pub const REGULAR: &str = "100644";

    /// Executable file.
    pub const EXECUTABLE: &str = "100755";

    /// Symbolic link.
    pub const SYMLINK: &str = "120000";

    /// Directory (subtree).
    pub const DIRECTORY: &str = "040000";

    /// Submodule commit.
    pub const GITLINK: &str = "160000";
}

/// Kind of object an entry points at, derived from its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// A blob (file or symlink).
    Blob,
    /// A subtree (directory).
    Tree,
    /// A commit in another repository.
    Commit,
}

impl EntryType {
    /// Name as printed by `ls-tree`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Blob => "blob",
            EntryType::Tree => "tree",
            EntryType::Commit => "commit",
        }
    }
}

/// An entry in a tree (file or subdirectory).
///
/// Fields are only set through [`TreeEntry::new`] and [`TreeEntry::decode`],
/// so the mode is always in its six-character form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    mode: String,
    name: Vec<u8>,
    hash: Hash,
}

impl TreeEntry {
    /// Create a new tree entry, normalising the mode to six characters.
    pub fn new(mode: &str, name: impl Into<Vec<u8>>, hash: Hash) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(Error::invalid_tree_entry("Name cannot be empty"));
        }

        if name.contains(&0) {
            return Err(Error::invalid_tree_entry("Name cannot contain null bytes"));
        }

        if name.contains(&b'/') {
            return Err(Error::invalid_tree_entry(format!(
                "Name cannot contain '/': {}",
                String::from_utf8_lossy(&name)
            )));
        }

        Ok(Self {
            mode: normalize_mode(mode)?,
            name,
            hash,
        })
    }

    /// Octal mode, left-padded with `0` to six characters.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Raw entry name (no `/` or NUL; not necessarily UTF-8).
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Address of the child object.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// True if this entry names a subtree.
    pub fn is_tree(&self) -> bool {
        self.mode == file_modes::DIRECTORY
    }

    /// Kind of object this entry refers to.
    pub fn entry_type(&self) -> EntryType {
        match self.mode.as_str() {
            file_modes::DIRECTORY => EntryType::Tree,
            file_modes::GITLINK => EntryType::Commit,
            _ => EntryType::Blob,
        }
    }

    /// Encode the entry to bytes.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.mode.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(&self.name);
        buf.push(0);
        buf.extend_from_slice(self.hash.as_bytes());
    }

    /// Decode one entry from the front of `data`, returning it and the bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let space = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| Error::malformed("tree entry has no mode separator"))?;
        let mode = std::str::from_utf8(&data[..space])
            .map_err(|_| Error::malformed("tree entry mode is not ASCII"))?;

        let rest = &data[space + 1..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::malformed("tree entry name is not terminated"))?;
        let name = &rest[..nul];

        let addr = &rest[nul + 1..];
        if addr.len() < HASH_SIZE {
            return Err(Error::truncated_tree(HASH_SIZE, addr.len()));
        }
        let hash = Hash::from_slice(&addr[..HASH_SIZE])?;

        let entry = Self::new(mode, name, hash)
            .map_err(|e| Error::malformed(format!("bad tree entry: {}", e)))?;
        let consumed = space + 1 + nul + 1 + HASH_SIZE;

        Ok((entry, consumed))
    }

    /// The name used for ordering: directories sort as `name/`.
    fn sort_key(&self) -> impl Iterator<Item = u8> + '_ {
        let suffix = if self.is_tree() { Some(b'/') } else { None };
        self.name.iter().copied().chain(suffix)
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(other.sort_key())
            .then_with(|| self.mode.cmp(&other.mode))
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

/// Left-pad a mode with `0` to six characters, rejecting anything that is not octal.
fn normalize_mode(mode: &str) -> Result<String> {
    if mode.is_empty() || mode.len() > MODE_WIDTH {
        return Err(Error::invalid_tree_entry(format!(
            "Mode must be 1 to {} octal digits: {:?}",
            MODE_WIDTH, mode
        )));
    }

    if !mode.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return Err(Error::invalid_tree_entry(format!(
            "Mode is not octal: {:?}",
            mode
        )));
    }

    Ok(format!("{:0>width$}", mode, width = MODE_WIDTH))
}

/// A directory listing. Entries are always held in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree from entries in any order.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort();
        Self { entries }
    }

    /// Insert an entry, keeping canonical order.
    pub fn insert(&mut self, entry: TreeEntry) {
        let index = self.entries.partition_point(|e| e <= &entry);
        self.entries.insert(index, entry);
    }

    /// Entries in canonical order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for the empty tree.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &[u8]) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Encode the entries in canonical order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for entry in &self.entries {
            entry.encode(&mut buf);
        }
        buf
    }

    /// Decode a tree payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let (entry, consumed) = TreeEntry::decode(&data[pos..])?;
            entries.push(entry);
            pos += consumed;
        }

        Ok(Self::new(entries))
    }
}

impl FromIterator<TreeEntry> for Tree {
    fn from_iter<I: IntoIterator<Item = TreeEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
