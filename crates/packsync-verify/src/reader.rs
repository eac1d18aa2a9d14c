use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::{ContentHash, Hasher, Result, Sha256Hasher, VerifyError};

/// Reader that hashes data as it passes through.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
    bytes: u64,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self {
            reader,
            hasher,
            bytes: 0,
        }
    }

    /// Bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }
}

impl<R, H: Hasher> VerifiedReader<R, H> {
    pub fn into_hash(self) -> ContentHash {
        self.hasher.finalize()
    }

    /// Finalize against `expected`.
    pub fn finish(self, expected: &ContentHash) -> Result<()> {
        let actual = self.hasher.finalize();
        if actual == *expected {
            Ok(())
        } else {
            Err(VerifyError::Mismatch {
                expected: *expected,
                actual,
            })
        }
    }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes += n as u64;
        }
        Ok(n)
    }
}

/// Hash everything `reader` yields, returning the digest and byte count.
pub fn hash_reader(reader: impl Read) -> Result<(ContentHash, u64)> {
    let mut verified = VerifiedReader::new(reader, Sha256Hasher::new());
    io::copy(&mut verified, &mut io::sink())?;
    let size = verified.bytes_read();
    Ok((verified.into_hash(), size))
}

/// Blocking SHA-256 of a file's contents.
pub fn hash_file(path: impl AsRef<Path>) -> Result<(ContentHash, u64)> {
    let file = File::open(path.as_ref())?;
    hash_reader(io::BufReader::with_capacity(64 * 1024, file))
}
