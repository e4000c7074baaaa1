//! Capabilities the engine consumes from its host.

use std::{fs::File, path::Path};

use crate::error::{Error, Result};

/// An open handle onto a stored archive member: read `length` bytes at `offset`.
#[derive(Debug)]
pub struct RawFileDescriptor {
    pub handle: File,
    pub offset: u64,
    pub length: u64,
}

/// Byte access to members of a packaged archive.
///
/// Implementations open, read and close the archive per call; the engine never
/// holds a handle between requests.
///
/// # Example
///
/// ```rust,no_run
/// use resindex::traits::ArchiveReader;
/// use resindex::reader::FsArchiveReader;
/// use std::path::Path;
///
/// let reader = FsArchiveReader;
/// let bytes = reader.read(Path::new("entry.hap"), "resources.index")?;
/// # Ok::<(), resindex::Error>(())
/// ```
pub trait ArchiveReader: Send + Sync {
    /// Whether the archive has a member with this name.
    fn contains(&self, archive: &Path, member: &str) -> bool;

    /// Reads a whole member.
    fn read(&self, archive: &Path, member: &str) -> Result<Vec<u8>>;

    /// Opens a member for direct access without copying it.
    fn open_raw(&self, archive: &Path, member: &str) -> Result<RawFileDescriptor>;

    /// Reads a member as UTF-8 text.
    fn read_to_string(&self, archive: &Path, member: &str) -> Result<String> {
        let bytes = self.read(archive, member)?;
        String::from_utf8(bytes).map_err(|_| {
            Error::Manifest(format!(
                "{} in {} is not UTF-8",
                member,
                archive.display()
            ))
        })
    }
}
