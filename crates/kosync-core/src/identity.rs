//! Document identity
//!
//! Derives the key a book is known by on the sync service. The key is
//! independent of where the file lives on disk.
//!
//! Two strategies are available and they do not agree with each other:
//!
//! - **Filename**: MD5 of the base name. Two books with the same file name
//!   collide; this is accepted.
//! - **PartialContent**: MD5 over 1024-byte samples taken at exponentially
//!   spaced offsets, so large files are identified without reading them in
//!   full.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Size of each sampled block and the base step of the offset series
const SAMPLE_SIZE: u64 = 1024;

/// Exponent range of the offset series: `SAMPLE_SIZE * 4^i`
const FIRST_EXPONENT: i32 = -1;
const LAST_EXPONENT: i32 = 10;

/// Opaque document key sent to the sync service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap an existing key (e.g. one read back from the service)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How a document key is derived from a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStrategy {
    /// Hash of the file's base name
    #[default]
    Filename,
    /// Hash of sparse content samples
    #[serde(alias = "partial")]
    PartialContent,
}

impl IdentityStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityStrategy::Filename => "filename",
            IdentityStrategy::PartialContent => "partial",
        }
    }
}

impl fmt::Display for IdentityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "filename" => Ok(IdentityStrategy::Filename),
            "partial" | "partial_content" | "partial-content" => {
                Ok(IdentityStrategy::PartialContent)
            }
            other => Err(format!(
                "Unknown identity strategy '{}'. Use 'filename' or 'partial'.",
                other
            )),
        }
    }
}

/// Resolve the document key for a file using the given strategy
pub fn resolve(path: impl AsRef<Path>, strategy: IdentityStrategy) -> SyncResult<DocumentId> {
    let path = path.as_ref();
    match strategy {
        IdentityStrategy::Filename => filename_id(path),
        IdentityStrategy::PartialContent => {
            let mut file = File::open(path).map_err(|source| SyncError::IdentityResolution {
                path: path.to_path_buf(),
                source,
            })?;
            partial_content_id(&mut file).map_err(|source| SyncError::IdentityResolution {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Key derived from the base name only
///
/// The raw bytes of the name are hashed, so names that are not valid UTF-8
/// still get distinct keys.
pub fn filename_id(path: &Path) -> SyncResult<DocumentId> {
    let name = path
        .file_name()
        .ok_or_else(|| SyncError::IdentityResolution {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        })?;

    let digest = Md5::digest(name.as_encoded_bytes());
    Ok(DocumentId(hex::encode(digest)))
}

/// Key derived from sparse samples of a seekable byte source
///
/// Stops at the first sample that reads zero bytes. Samples already fed to
/// the hasher are kept, so the key depends on which offsets the length of
/// the source makes reachable.
pub fn partial_content_id<R: Read + Seek>(reader: &mut R) -> io::Result<DocumentId> {
    let mut hasher = Md5::new();
    let mut block = Vec::with_capacity(SAMPLE_SIZE as usize);

    for exponent in FIRST_EXPONENT..=LAST_EXPONENT {
        reader.seek(SeekFrom::Start(sample_offset(exponent)))?;

        block.clear();
        reader.by_ref().take(SAMPLE_SIZE).read_to_end(&mut block)?;
        if block.is_empty() {
            break;
        }
        hasher.update(&block);
    }

    Ok(DocumentId(hex::encode(hasher.finalize())))
}

/// Byte offset of the sample with the given exponent
///
/// `SAMPLE_SIZE * 4^exponent`, with negative exponents dividing (flooring)
/// rather than shifting by a negative count. The first sample therefore
/// starts at byte 256.
fn sample_offset(exponent: i32) -> u64 {
    let factor = 4u64.pow(exponent.unsigned_abs());
    if exponent < 0 {
        SAMPLE_SIZE / factor
    } else {
        SAMPLE_SIZE * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_sample_offsets() {
        assert_eq!(sample_offset(-1), 256);
        assert_eq!(sample_offset(0), 1024);
        assert_eq!(sample_offset(1), 4096);
        assert_eq!(sample_offset(2), 16384);
        assert_eq!(sample_offset(10), 1024 * 1_048_576);
    }

    #[test]
    fn test_filename_id_ignores_directory() {
        let a = resolve("/a/b.epub", IdentityStrategy::Filename).unwrap();
        let b = resolve("/c/b.epub", IdentityStrategy::Filename).unwrap();
        assert_eq!(a, b);

        let other = resolve("/a/other.epub", IdentityStrategy::Filename).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_filename_id_is_md5_of_name() {
        // md5("abc")
        let id = filename_id(Path::new("/library/abc")).unwrap();
        assert_eq!(id.as_str(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[cfg(unix)]
    #[test]
    fn test_filename_id_distinguishes_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let a = Path::new("/lib").join(OsStr::from_bytes(b"\xff.epub"));
        let b = Path::new("/lib").join(OsStr::from_bytes(b"\xfe.epub"));

        assert_ne!(filename_id(&a).unwrap(), filename_id(&b).unwrap());
    }

    #[test]
    fn test_filename_id_without_name_fails() {
        let result = filename_id(Path::new("/"));
        assert!(matches!(
            result,
            Err(SyncError::IdentityResolution { .. })
        ));
    }

    #[test]
    fn test_partial_id_is_deterministic() {
        let data = patterned(20_000);
        let first = partial_content_id(&mut Cursor::new(&data)).unwrap();
        let second = partial_content_id(&mut Cursor::new(&data)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 32);
    }

    #[test]
    fn test_partial_id_matches_manual_samples() {
        let data = patterned(5000);

        // Reachable samples: 256..1280, 1024..2048, 4096..5000
        let mut hasher = Md5::new();
        hasher.update(&data[256..1280]);
        hasher.update(&data[1024..2048]);
        hasher.update(&data[4096..5000]);
        let expected = hex::encode(hasher.finalize());

        let id = partial_content_id(&mut Cursor::new(&data)).unwrap();
        assert_eq!(id.as_str(), expected);
    }

    #[test]
    fn test_partial_id_changes_when_truncated_before_sample() {
        let data = patterned(20_000);
        let full = partial_content_id(&mut Cursor::new(&data)).unwrap();

        // 16384 is the last reachable offset; cutting before it drops a block
        let truncated = partial_content_id(&mut Cursor::new(&data[..16_000])).unwrap();
        assert_ne!(full, truncated);
    }

    #[test]
    fn test_partial_id_ignores_bytes_outside_samples() {
        let mut data = patterned(20_000);
        let original = partial_content_id(&mut Cursor::new(&data)).unwrap();

        // Byte 3000 lies between the 1024 and 4096 samples
        data[3000] ^= 0xFF;
        let edited = partial_content_id(&mut Cursor::new(&data)).unwrap();
        assert_eq!(original, edited);

        // Byte 300 lies inside the first sample
        data[300] ^= 0xFF;
        let edited = partial_content_id(&mut Cursor::new(&data)).unwrap();
        assert_ne!(original, edited);
    }

    #[test]
    fn test_partial_id_of_tiny_file() {
        // Shorter than the first offset: nothing is hashed
        let empty_digest = hex::encode(Md5::new().finalize());
        let id = partial_content_id(&mut Cursor::new(vec![7u8; 100])).unwrap();
        assert_eq!(id.as_str(), empty_digest);
    }

    #[test]
    fn test_resolve_partial_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("book.epub");
        let data = patterned(12_000);
        File::create(&path).unwrap().write_all(&data).unwrap();

        let from_file = resolve(&path, IdentityStrategy::PartialContent).unwrap();
        let from_memory = partial_content_id(&mut Cursor::new(&data)).unwrap();
        assert_eq!(from_file, from_memory);
    }

    #[test]
    fn test_resolve_partial_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.epub");

        let result = resolve(&path, IdentityStrategy::PartialContent);
        assert!(matches!(
            result,
            Err(SyncError::IdentityResolution { .. })
        ));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "filename".parse::<IdentityStrategy>().unwrap(),
            IdentityStrategy::Filename
        );
        assert_eq!(
            "Partial".parse::<IdentityStrategy>().unwrap(),
            IdentityStrategy::PartialContent
        );
        assert!("sha1".parse::<IdentityStrategy>().is_err());
    }
}
