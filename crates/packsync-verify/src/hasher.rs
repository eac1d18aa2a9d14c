use sha2::Digest;

use crate::ContentHash;

/// Incremental hasher fed chunk by chunk as data moves.
pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> ContentHash;
}

#[derive(Clone, Default)]
pub struct Sha256Hasher(sha2::Sha256);

impl Sha256Hasher {
    pub fn new() -> Self {
        Self(sha2::Sha256::new())
    }

    pub fn digest(data: &[u8]) -> ContentHash {
        to_content_hash(&sha2::Sha256::digest(data))
    }
}

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self) -> ContentHash {
        to_content_hash(&self.0.finalize())
    }
}

fn to_content_hash(digest: &[u8]) -> ContentHash {
    let mut bytes = [0u8; ContentHash::LEN];
    bytes.copy_from_slice(digest);
    ContentHash::from_bytes(bytes)
}
