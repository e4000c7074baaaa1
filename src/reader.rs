//! Filesystem-backed [`ArchiveReader`]s: unpacked directories and zip containers.

use std::{
    fs::{self, File},
    io::Read,
    path::{Component, Path, PathBuf},
};

use zip::{CompressionMethod, ZipArchive, result::ZipError};

use crate::{
    error::{Error, Result},
    traits::{ArchiveReader, RawFileDescriptor},
};

/// Reads members of an unpacked archive directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryReader;

impl DirectoryReader {
    fn member_path(archive: &Path, member: &str) -> Result<PathBuf> {
        let relative = Path::new(member);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if member.is_empty() || escapes {
            return Err(Error::NotFound(format!("member `{}`", member)));
        }
        Ok(archive.join(relative))
    }
}

impl ArchiveReader for DirectoryReader {
    fn contains(&self, archive: &Path, member: &str) -> bool {
        Self::member_path(archive, member).is_ok_and(|p| p.is_file())
    }

    fn read(&self, archive: &Path, member: &str) -> Result<Vec<u8>> {
        let path = Self::member_path(archive, member)?;
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "member `{}` in {}",
                member,
                archive.display()
            )));
        }
        Ok(fs::read(path)?)
    }

    fn open_raw(&self, archive: &Path, member: &str) -> Result<RawFileDescriptor> {
        let path = Self::member_path(archive, member)?;
        let handle = File::open(&path).map_err(|_| {
            Error::NotFound(format!("member `{}` in {}", member, archive.display()))
        })?;
        let length = handle.metadata()?.len();
        Ok(RawFileDescriptor {
            handle,
            offset: 0,
            length,
        })
    }
}

/// Upper bound on the buffer reserved up front for one zip member.
const PREALLOC_LIMIT: u64 = 1 << 20;

/// Reads members of a zip container (`.hap`, `.hsp`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipReader;

impl ZipReader {
    fn open(archive: &Path) -> Result<ZipArchive<File>> {
        Ok(ZipArchive::new(File::open(archive)?)?)
    }

    fn not_found(archive: &Path, member: &str) -> impl FnOnce(ZipError) -> Error {
        let message = format!("member `{}` in {}", member, archive.display());
        move |err| match err {
            ZipError::FileNotFound => Error::NotFound(message),
            other => Error::Zip(other),
        }
    }
}

impl ArchiveReader for ZipReader {
    fn contains(&self, archive: &Path, member: &str) -> bool {
        Self::open(archive).is_ok_and(|mut zip| zip.by_name(member).is_ok())
    }

    fn read(&self, archive: &Path, member: &str) -> Result<Vec<u8>> {
        let mut zip = Self::open(archive)?;
        let mut entry = zip
            .by_name(member)
            .map_err(Self::not_found(archive, member))?;
        // The declared size comes from the archive and is not trusted.
        let mut bytes = Vec::with_capacity(entry.size().min(PREALLOC_LIMIT) as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn open_raw(&self, archive: &Path, member: &str) -> Result<RawFileDescriptor> {
        let mut zip = Self::open(archive)?;
        let entry = zip
            .by_name(member)
            .map_err(Self::not_found(archive, member))?;
        if entry.compression() != CompressionMethod::Stored {
            return Err(Error::Manifest(format!(
                "member `{}` is compressed and cannot be opened in place",
                member
            )));
        }
        let (offset, length) = (entry.data_start(), entry.size());
        drop(entry);
        Ok(RawFileDescriptor {
            handle: File::open(archive)?,
            offset,
            length,
        })
    }
}

/// Dispatches to [`DirectoryReader`] for directories and [`ZipReader`] otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArchiveReader;

impl FsArchiveReader {
    fn pick(archive: &Path) -> &'static dyn ArchiveReader {
        if archive.is_dir() {
            &DirectoryReader
        } else {
            &ZipReader
        }
    }
}

impl ArchiveReader for FsArchiveReader {
    fn contains(&self, archive: &Path, member: &str) -> bool {
        Self::pick(archive).contains(archive, member)
    }

    fn read(&self, archive: &Path, member: &str) -> Result<Vec<u8>> {
        Self::pick(archive).read(archive, member)
    }

    fn open_raw(&self, archive: &Path, member: &str) -> Result<RawFileDescriptor> {
        Self::pick(archive).open_raw(archive, member)
    }
}
