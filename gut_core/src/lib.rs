//! # Gut Core
//!
//! A content-addressed object store laid out like a version-control
//! database: immutable blobs, trees, commits and tags stored under the SHA-1
//! of their own encoding.
//!
//! ## Features
//!
//! - Loose objects: `objects/<2 hex>/<38 hex>`, zlib-compressed
//! - Header framing (`<type> <len>\0`) with length validation on read
//! - Typed parsing and serialization for all four object kinds
//! - Unique short-prefix resolution
//! - Atomic, idempotent writes
//!
//! ## Example
//!
//! ```no_run
//! use gut_core::{Blob, Object, Repository};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Initialize a new repository
//! let repo = Repository::init("./my-repo")?;
//! let store = repo.objects()?;
//!
//! // Store a blob and read it back
//! let hash = store.write_object(&Object::from(Blob::new(b"hello\n".to_vec())))?;
//! assert_eq!(hash.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
//!
//! let object = store.read_object(&store.resolve_prefix("ce0136")?)?;
//! println!("{} {}", object.object_type(), hash);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod hash;
mod kvlm;
mod object;
mod repo;
mod store;
mod tree;

pub use config::RepoConfig;
pub use error::{Error, Result};
pub use hash::{Algorithm, HASH_SIZE, HEX_LEN, Hash, compress, decompress};
pub use kvlm::{Commit, CommitBuilder, Kvlm, Tag};
pub use object::{Blob, Object, ObjectType, decode_header, encode_header};
pub use repo::{METADATA_DIR, Repository};
pub use store::{MIN_PREFIX_LEN, OBJECTS_DIR, ObjectStore};
pub use tree::{EntryType, Tree, TreeEntry, file_modes};
