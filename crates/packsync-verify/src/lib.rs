//! Content hashing and verification for packsync.
//!
//! Hashes are computed incrementally while bytes move, so downloads and
//! local scans touch each byte once.
//!
//! ```
//! use packsync_verify::{Sha256Hasher, VerifiedReader};
//! use std::io::Read;
//!
//! let expected = Sha256Hasher::digest(b"hello world");
//! let mut reader = VerifiedReader::new(&b"hello world"[..], Sha256Hasher::new());
//! let mut buffer = Vec::new();
//! reader.read_to_end(&mut buffer).unwrap();
//! reader.finish(&expected).unwrap();
//! ```

pub use self::error::{Result, VerifyError};
pub use self::hash::ContentHash;
pub use self::hasher::{Hasher, Sha256Hasher};
pub use self::reader::{VerifiedReader, hash_file, hash_reader};

mod error;
mod hash;
mod hasher;
mod reader;
