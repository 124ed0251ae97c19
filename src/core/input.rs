//! Scan input abstraction.
//!
//! The two `ns_clamav` subcommands map onto the two variants here:
//! `scanbuff` scans in-memory bytes, `scanfile` scans a path.

use std::path::{Path, PathBuf};

/// Content to scan: a file on disk or an in-memory buffer.
///
/// # Examples
///
/// ```rust
/// use clamcmd::core::FileInput;
///
/// let input = FileInput::from_path("/srv/uploads/report.doc");
/// assert_eq!(input.filename(), Some("report.doc"));
///
/// let input = FileInput::from_bytes(b"hello".to_vec()).with_filename("greeting.txt");
/// assert_eq!(input.size_hint(), Some(5));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum FileInput {
    /// A file path on disk.
    Path(PathBuf),

    /// In-memory bytes with optional filename.
    Bytes {
        /// The buffer.
        data: Vec<u8>,
        /// Optional filename for logs.
        filename: Option<String>,
    },
}

impl std::fmt::Debug for FileInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes { data, filename } => f
                .debug_struct("Bytes")
                .field("data_len", &data.len())
                .field("filename", filename)
                .finish(),
        }
    }
}

impl FileInput {
    /// Creates a `FileInput` from a file path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Creates a `FileInput` from bytes.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            data: data.into(),
            filename: None,
        }
    }

    /// Sets the filename for byte inputs. Paths keep their own name.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        if let Self::Bytes { filename: f, .. } = &mut self {
            *f = Some(filename.into());
        }
        self
    }

    /// Returns the filename, if known.
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Path(path) => path.file_name().and_then(|n| n.to_str()),
            Self::Bytes { filename, .. } => filename.as_deref(),
        }
    }

    /// Returns the size in bytes, if known without touching the filesystem.
    pub fn size_hint(&self) -> Option<u64> {
        match self {
            Self::Path(_) => None,
            Self::Bytes { data, .. } => Some(data.len() as u64),
        }
    }

    /// Returns the path, if this is a path-based input.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Bytes { .. } => None,
        }
    }

    /// Returns the bytes, if this is a bytes-based input.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes { data, .. } => Some(data),
            Self::Path(_) => None,
        }
    }
}

impl From<PathBuf> for FileInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for FileInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for FileInput {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&[u8]> for FileInput {
    fn from(data: &[u8]) -> Self {
        Self::from_bytes(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_input_from_path() {
        let input = FileInput::from_path("/test/file.exe");
        assert_eq!(input.filename(), Some("file.exe"));
        assert_eq!(input.as_path(), Some(Path::new("/test/file.exe")));
        assert_eq!(input.size_hint(), None);
        assert!(input.as_bytes().is_none());
    }

    #[test]
    fn test_file_input_from_bytes() {
        let data = vec![1, 2, 3, 4];
        let input = FileInput::from_bytes(data.clone()).with_filename("test.bin");
        assert_eq!(input.filename(), Some("test.bin"));
        assert_eq!(input.as_bytes(), Some(data.as_slice()));
        assert_eq!(input.size_hint(), Some(4));
    }

    #[test]
    fn test_with_filename_ignored_for_paths() {
        let input = FileInput::from_path("/a/b.txt").with_filename("other");
        assert_eq!(input.filename(), Some("b.txt"));
    }

    #[test]
    fn test_debug_hides_buffer_contents() {
        let input = FileInput::from_bytes(b"secret".to_vec());
        let dbg = format!("{:?}", input);
        assert!(dbg.contains("data_len: 6"));
        assert!(!dbg.contains("secret"));
    }
}
