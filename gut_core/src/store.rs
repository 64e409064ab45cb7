//! Loose object storage and object I/O.

use crate::error::{Error, Result};
use crate::hash::{HEX_LEN, Hash, compress, decompress};
use crate::object::{Object, ObjectType, decode_header};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Name of the objects directory under the repository metadata root.
pub const OBJECTS_DIR: &str = "objects";

/// Minimum prefix length accepted by [`ObjectStore::resolve_prefix`].
pub const MIN_PREFIX_LEN: usize = 2;

/// A content-addressed object store rooted at `<metadata>/objects`.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    objects_dir: PathBuf,
}

impl ObjectStore {
    /// Open the store under a repository metadata directory.
    ///
    /// The `objects/` directory must already exist; creating it is the job of
    /// repository initialisation.
    pub fn open<P: AsRef<Path>>(metadata_dir: P) -> Result<Self> {
        let metadata_dir = metadata_dir.as_ref();
        let objects_dir = metadata_dir.join(OBJECTS_DIR);

        if !objects_dir.is_dir() {
            return Err(Error::invalid_repository(
                metadata_dir,
                "objects directory missing",
            ));
        }

        Ok(Self { objects_dir })
    }

    /// Get the path to an object file given its hash.
    ///
    /// Returns: `objects/{prefix}/{suffix}`
    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        self.objects_dir.join(hash.prefix()).join(hash.suffix())
    }

    /// Get the objects directory.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// True if an object is stored under `hash`.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.object_path(hash).is_file()
    }

    /// Write an object and return its address.
    ///
    /// Writing content that is already present is a no-op.
    pub fn write_object(&self, object: &Object) -> Result<Hash> {
        let encoded = object.encode();
        let hash = Hash::hash_bytes(&encoded);

        // Check if object already exists (deduplication)
        let obj_path = self.object_path(&hash);
        if obj_path.exists() {
            debug!(%hash, kind = %object.object_type(), "object already stored");
            return Ok(hash);
        }

        let compressed = compress(&encoded)?;
        trace!(%hash, raw = encoded.len(), compressed = compressed.len(), "compressed object");

        self.write_object_atomic(&obj_path, &compressed)?;
        debug!(%hash, kind = %object.object_type(), "wrote object");

        Ok(hash)
    }

    /// Write an object atomically using tempfile.
    fn write_object_atomic(&self, obj_path: &Path, data: &[u8]) -> Result<()> {
        let parent = obj_path.parent().ok_or_else(|| {
            Error::invalid_repository(&self.objects_dir, "object path has no parent")
        })?;

        // Create parent directory if needed
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(data)?;
        temp_file.flush()?;

        // Persist atomically. Losing a race to another writer of the same
        // address leaves identical bytes in place.
        match temp_file.persist(obj_path) {
            Ok(_) => Ok(()),
            Err(err) if obj_path.exists() => {
                debug!(path = %obj_path.display(), error = %err.error, "concurrent writer won");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read and decode the object stored under `hash`.
    pub fn read_object(&self, hash: &Hash) -> Result<Object> {
        let (object_type, payload) = self.read_raw(hash)?;
        Object::parse(object_type, &payload).map_err(|e| e.for_object(*hash))
    }

    /// Read an object's type and raw payload without parsing the payload.
    pub fn read_raw(&self, hash: &Hash) -> Result<(ObjectType, Vec<u8>)> {
        let obj_path = self.object_path(hash);

        let compressed = match fs::read(&obj_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::object_not_found(hash.to_hex()));
            }
            Err(e) => return Err(e.into()),
        };

        let raw = decompress(&compressed).map_err(|e| e.for_object(*hash))?;
        trace!(%hash, compressed = compressed.len(), raw = raw.len(), "decompressed object");

        let (object_type, payload) = decode_header(&raw).map_err(|e| e.for_object(*hash))?;

        // Verify hash matches (corruption detection)
        let computed_hash = Hash::hash_bytes(&raw);
        if computed_hash != *hash {
            return Err(Error::malformed_object(
                *hash,
                format!("Hash mismatch: content hashes to {}", computed_hash),
            ));
        }

        debug!(%hash, kind = %object_type, size = payload.len(), "read object");
        Ok((object_type, payload.to_vec()))
    }

    /// Read an object and require it to be of `expected` type.
    pub fn read_typed(&self, hash: &Hash, expected: ObjectType) -> Result<Object> {
        let object = self.read_object(hash)?;
        if object.object_type() != expected {
            return Err(Error::type_mismatch(*hash, expected, object.object_type()));
        }
        Ok(object)
    }

    /// Expand a short hex prefix to the unique full address it names.
    ///
    /// Only the first-level directory matching the first two characters is
    /// scanned. More than one match is an error; no candidate is picked.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<Hash> {
        let prefix = prefix.to_ascii_lowercase();

        if prefix.len() < MIN_PREFIX_LEN || prefix.len() > HEX_LEN {
            return Err(Error::invalid_hash(format!(
                "Prefix must be {} to {} hex characters, got {}",
                MIN_PREFIX_LEN,
                HEX_LEN,
                prefix.len()
            )));
        }

        if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::invalid_hash(format!("Invalid hex prefix: {}", prefix)));
        }

        if prefix.len() == HEX_LEN {
            let hash = Hash::from_hex(&prefix)?;
            return if self.contains(&hash) {
                Ok(hash)
            } else {
                Err(Error::object_not_found(prefix))
            };
        }

        let (dir_name, rest) = prefix.split_at(MIN_PREFIX_LEN);
        let dir = self.objects_dir.join(dir_name);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::object_not_found(prefix));
            }
            Err(e) => return Err(e.into()),
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            // Skip temporaries and anything else that is not an object file.
            if name.len() != HEX_LEN - MIN_PREFIX_LEN
                || !name.bytes().all(|b| b.is_ascii_hexdigit())
            {
                continue;
            }

            if name.starts_with(rest) {
                candidates.push(format!("{}{}", dir_name, name));
            }
        }

        candidates.sort();
        debug!(%prefix, matches = candidates.len(), "resolved prefix");

        match candidates.len() {
            0 => Err(Error::object_not_found(prefix)),
            1 => Hash::from_hex(&candidates[0]),
            _ => Err(Error::ambiguous_address(prefix, candidates)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvlm::{Commit, Tag};
    use crate::object::Blob;
    use crate::tree::{Tree, TreeEntry, file_modes};
    use tempfile::TempDir;

    fn new_store() -> (TempDir, ObjectStore) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join(OBJECTS_DIR)).unwrap();
        let store = ObjectStore::open(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    fn blob(data: &[u8]) -> Object {
        Object::from(Blob::new(data))
    }

    /// Replace the stored bytes of `hash` with `raw`, compressed.
    fn overwrite_raw(store: &ObjectStore, hash: &Hash, raw: &[u8]) {
        let path = store.object_path(hash);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, compress(raw).unwrap()).unwrap();
    }

    #[test]
    fn test_open_requires_objects_dir() {
        let temp_dir = TempDir::new().unwrap();
        let result = ObjectStore::open(temp_dir.path());
        assert!(matches!(result, Err(Error::InvalidRepository { .. })));
    }

    #[test]
    fn test_object_path() {
        let (_temp_dir, store) = new_store();
        let hash = Hash::hash_bytes(b"test");
        let path = store.object_path(&hash);

        assert!(path.ends_with(format!("objects/{}/{}", hash.prefix(), hash.suffix())));
        assert!(path.extension().is_none());
    }

    #[test]
    fn test_write_blob_golden() {
        let (_temp_dir, store) = new_store();

        let hash = store.write_object(&blob(b"hello\n")).unwrap();
        assert_eq!(hash.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");

        let path = store.object_path(&hash);
        assert!(path.ends_with("objects/ce/013625030ba8dba906f756967f9e9ca394464a"));

        // On-disk bytes are the zlib form of the framed object.
        let stored = fs::read(&path).unwrap();
        assert_eq!(decompress(&stored).unwrap(), b"blob 6\0hello\n");
    }

    #[test]
    fn test_write_read_all_kinds() {
        let (_temp_dir, store) = new_store();

        let blob_hash = store.write_object(&blob(b"content")).unwrap();
        let tree = Tree::new(vec![
            TreeEntry::new(file_modes::REGULAR, "file.txt", blob_hash).unwrap(),
        ]);
        let tree_hash = store.write_object(&tree.clone().into()).unwrap();

        let commit = Commit::builder(tree_hash)
            .author("A <a@example.com> 0 +0000")
            .committer("A <a@example.com> 0 +0000")
            .message("msg\n")
            .build();
        let commit_hash = store.write_object(&commit.clone().into()).unwrap();

        let tag = Tag::new(
            commit_hash,
            ObjectType::Commit,
            "v1",
            "A <a@example.com> 0 +0000",
            "tagged\n",
        );
        let tag_hash = store.write_object(&tag.clone().into()).unwrap();

        assert_eq!(store.read_object(&blob_hash).unwrap(), blob(b"content"));
        assert_eq!(store.read_object(&tree_hash).unwrap(), Object::Tree(tree));
        assert_eq!(store.read_object(&commit_hash).unwrap(), Object::Commit(commit));
        assert_eq!(store.read_object(&tag_hash).unwrap(), Object::Tag(tag));
    }

    #[test]
    fn test_empty_blob_and_tree() {
        let (_temp_dir, store) = new_store();

        let empty_blob = store.write_object(&blob(b"")).unwrap();
        assert_eq!(empty_blob.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
        assert_eq!(store.read_object(&empty_blob).unwrap(), blob(b""));

        let empty_tree = store.write_object(&Tree::default().into()).unwrap();
        assert_eq!(empty_tree.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
        let read = store.read_object(&empty_tree).unwrap();
        assert!(read.as_tree().unwrap().is_empty());
    }

    #[test]
    fn test_write_is_idempotent() {
        let (_temp_dir, store) = new_store();

        let hash1 = store.write_object(&blob(b"hello\n")).unwrap();
        let path = store.object_path(&hash1);
        let before = fs::metadata(&path).unwrap().modified().unwrap();
        let bytes_before = fs::read(&path).unwrap();

        let hash2 = store.write_object(&blob(b"hello\n")).unwrap();
        assert_eq!(hash1, hash2);

        let after = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(before, after);
        assert_eq!(fs::read(&path).unwrap(), bytes_before);

        // Exactly one file in the shard directory: no stray temporaries.
        let files: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_tree_may_reference_missing_children() {
        let (_temp_dir, store) = new_store();

        let missing = Hash::hash_bytes(b"not stored");
        let tree = Tree::new(vec![
            TreeEntry::new(file_modes::DIRECTORY, "later", missing).unwrap(),
        ]);
        let tree_hash = store.write_object(&tree.into()).unwrap();

        assert!(store.contains(&tree_hash));
        assert!(!store.contains(&missing));
    }

    #[test]
    fn test_read_not_found() {
        let (_temp_dir, store) = new_store();

        let hash = Hash::hash_bytes(b"nonexistent");
        let err = store.read_object(&hash).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_declared_length_off_by_one() {
        let (_temp_dir, store) = new_store();
        let hash = store.write_object(&blob(b"hello\n")).unwrap();

        for raw in [&b"blob 5\0hello\n"[..], &b"blob 7\0hello\n"[..]] {
            overwrite_raw(&store, &hash, raw);
            match store.read_object(&hash) {
                Err(Error::MalformedObject { hash: Some(h), .. }) => assert_eq!(h, hash),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_type_carries_address() {
        let (_temp_dir, store) = new_store();
        let hash = Hash::hash_bytes(b"whatever");
        overwrite_raw(&store, &hash, b"note 2\0hi");

        match store.read_object(&hash) {
            Err(Error::UnknownObjectType { hash: Some(h), type_name }) => {
                assert_eq!(h, hash);
                assert_eq!(type_name, "note");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_digest_mismatch_detected() {
        let (_temp_dir, store) = new_store();
        let hash = store.write_object(&blob(b"hello\n")).unwrap();

        // Well-framed but different content under the same address.
        overwrite_raw(&store, &hash, b"blob 6\0HELLO\n");
        assert!(matches!(
            store.read_object(&hash),
            Err(Error::MalformedObject { .. })
        ));
    }

    #[test]
    fn test_truncated_tree_surfaces_as_malformed() {
        let (_temp_dir, store) = new_store();

        let mut raw = b"tree 17\0100644 a\0".to_vec();
        raw.extend_from_slice(&[0u8; 8]);
        let hash = Hash::hash_bytes(&raw);
        overwrite_raw(&store, &hash, &raw);

        match store.read_object(&hash) {
            Err(Error::MalformedObject { hash: Some(h), reason }) => {
                assert_eq!(h, hash);
                assert!(reason.contains("truncated"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_not_zlib_is_malformed() {
        let (_temp_dir, store) = new_store();
        let hash = Hash::hash_bytes(b"x");
        let path = store.object_path(&hash);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"plain bytes").unwrap();

        assert!(matches!(
            store.read_object(&hash),
            Err(Error::MalformedObject { hash: Some(_), .. })
        ));
    }

    #[test]
    fn test_read_typed() {
        let (_temp_dir, store) = new_store();
        let hash = store.write_object(&blob(b"data")).unwrap();

        assert!(store.read_typed(&hash, ObjectType::Blob).is_ok());
        match store.read_typed(&hash, ObjectType::Commit) {
            Err(Error::TypeMismatch {
                hash: h,
                expected,
                found,
            }) => {
                assert_eq!(h, hash);
                assert_eq!(expected, ObjectType::Commit);
                assert_eq!(found, ObjectType::Blob);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_commit_with_legacy_encoding() {
        let (_temp_dir, store) = new_store();
        let tree_hash = store.write_object(&Tree::default().into()).unwrap();

        let mut payload = format!("tree {}\n", tree_hash).into_bytes();
        payload.extend_from_slice(b"author Ren\xe9 <r@example.com> 0 +0000\n");
        payload.extend_from_slice(b"encoding ISO-8859-1\n\ncaf\xe9\n");
        let commit = Object::parse(ObjectType::Commit, &payload).unwrap();

        let hash = store.write_object(&commit).unwrap();
        let encoded = crate::object::encode_header(ObjectType::Commit, &payload);
        assert_eq!(hash, Hash::hash_bytes(&encoded));

        let read = store.read_object(&hash).unwrap();
        assert_eq!(read.as_commit().unwrap().message(), b"caf\xe9\n");
        assert_eq!(read, commit);
    }

    /// Create empty object files at the given addresses (resolution never reads them).
    fn touch(store: &ObjectStore, hex: &str) {
        let hash = Hash::from_hex(hex).unwrap();
        let path = store.object_path(&hash);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_resolve_prefix() {
        let (_temp_dir, store) = new_store();
        let a = format!("a1b2{}01", "0".repeat(34));
        let b = format!("a1b2{}02", "0".repeat(34));
        touch(&store, &a);
        touch(&store, &b);

        match store.resolve_prefix("a1b2") {
            Err(Error::AmbiguousAddress { prefix, candidates }) => {
                assert_eq!(prefix, "a1b2");
                assert_eq!(candidates, vec![a.clone(), b.clone()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert_eq!(store.resolve_prefix(&a).unwrap().to_hex(), a);
        assert_eq!(store.resolve_prefix(&b).unwrap().to_hex(), b);
        assert_eq!(store.resolve_prefix(&a[..39]).unwrap().to_hex(), a);

        assert!(store.resolve_prefix("ffff").unwrap_err().is_not_found());
        assert!(store.resolve_prefix("a1b3").unwrap_err().is_not_found());
    }

    #[test]
    fn test_resolve_prefix_case_and_validation() {
        let (_temp_dir, store) = new_store();
        let hash = store.write_object(&blob(b"hello\n")).unwrap();

        assert_eq!(store.resolve_prefix("CE0136").unwrap(), hash);
        assert_eq!(store.resolve_prefix("ce").unwrap(), hash);

        assert!(matches!(
            store.resolve_prefix("c"),
            Err(Error::InvalidHash { .. })
        ));
        assert!(matches!(
            store.resolve_prefix("cez1"),
            Err(Error::InvalidHash { .. })
        ));
        assert!(matches!(
            store.resolve_prefix(&"c".repeat(41)),
            Err(Error::InvalidHash { .. })
        ));
    }

    #[test]
    fn test_resolve_prefix_ignores_temporaries() {
        let (_temp_dir, store) = new_store();
        let hash = store.write_object(&blob(b"hello\n")).unwrap();
        fs::write(store.objects_dir().join("ce").join(".tmpXYZ"), b"junk").unwrap();

        assert_eq!(store.resolve_prefix("ce01").unwrap(), hash);
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            max_shrink_iters: 1000,
            ..ProptestConfig::default()
        })]

        /// Blobs read back byte-identical and the address is the content hash
        #[test]
        fn prop_blob_store_roundtrip(data in prop::collection::vec(any::<u8>(), 0..10_000)) {
            let (_temp_dir, store) = new_store();
            let object = blob(&data);

            let hash = store.write_object(&object)?;
            prop_assert_eq!(hash, object.hash());
            prop_assert_eq!(store.read_object(&hash)?, object);
        }
    }
}
