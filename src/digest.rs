use std::fmt;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::fsutil::{self, FileReadError};

/// A SHA-256 digest, rendered as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl serde::Serialize for Sha256Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Hashes everything `reader` yields.
pub fn sha256_reader(mut reader: impl Read) -> io::Result<Sha256Digest> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(Sha256Digest(hasher.finalize().into()))
}

/// Hashes the file at `path` through a buffered reader.
///
/// # Errors
///
/// Returns a [`FileReadError`] if the file cannot be opened or read.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<Sha256Digest, FileReadError> {
    let path = path.as_ref();
    let reader = fsutil::open_file_reader(path)?;
    sha256_reader(reader).map_err(|source| FileReadError::Read {
        path: path.to_path_buf(),
        source,
    })
}
