pub mod error;
pub mod fs;
pub mod memfs;

pub use error::{FsError, FsResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Seek, Write};
use std::ops::BitOr;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Abstract filesystem trait.
///
/// Every backend and every decorator speaks this surface, so a `LogFs`
/// can be handed anywhere a plain filesystem is expected.
pub trait Fs: Send + Sync {
    fn create(&self, path: &Path) -> FsResult<Box<dyn File>>;
    fn mkdir(&self, path: &Path, mode: u32) -> FsResult<()>;
    fn mkdir_all(&self, path: &Path, mode: u32) -> FsResult<()>;
    fn open(&self, path: &Path) -> FsResult<Box<dyn File>>;
    fn open_file(&self, path: &Path, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>>;
    fn remove(&self, path: &Path) -> FsResult<()>;
    fn remove_all(&self, path: &Path) -> FsResult<()>;
    fn rename(&self, from: &Path, to: &Path) -> FsResult<()>;
    fn stat(&self, path: &Path) -> FsResult<Metadata>;
    fn chmod(&self, path: &Path, mode: u32) -> FsResult<()>;
    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> FsResult<()>;
    fn name(&self) -> &str;
}

/// An open file handle returned by [`Fs::create`], [`Fs::open`] and [`Fs::open_file`].
pub trait File: Read + Write + Seek + Send + fmt::Debug {
    fn path(&self) -> &Path;
    fn stat(&self) -> FsResult<Metadata>;
    fn sync(&mut self) -> FsResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub len: u64,
    /// Permission bits only (no file type bits).
    pub mode: u32,
    pub is_dir: bool,
    pub modified: SystemTime,
    pub accessed: SystemTime,
}

impl Metadata {
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}

/// POSIX-style open flags. The low two bits hold the access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpenFlags(u32);

impl OpenFlags {
    pub const RDONLY: OpenFlags = OpenFlags(0x0);
    pub const WRONLY: OpenFlags = OpenFlags(0x1);
    pub const RDWR: OpenFlags = OpenFlags(0x2);
    pub const APPEND: OpenFlags = OpenFlags(0x400);
    pub const CREATE: OpenFlags = OpenFlags(0x40);
    pub const EXCL: OpenFlags = OpenFlags(0x80);
    pub const TRUNC: OpenFlags = OpenFlags(0x200);

    const ACCESS_MASK: u32 = 0x3;

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        OpenFlags(bits)
    }

    pub const fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn readable(self) -> bool {
        matches!(self.0 & Self::ACCESS_MASK, 0x0 | 0x2)
    }

    pub fn writable(self) -> bool {
        matches!(self.0 & Self::ACCESS_MASK, 0x1 | 0x2)
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![match self.0 & Self::ACCESS_MASK {
            0x1 => "WRONLY",
            0x2 => "RDWR",
            _ => "RDONLY",
        }];
        for (flag, label) in [
            (Self::APPEND, "APPEND"),
            (Self::CREATE, "CREATE"),
            (Self::EXCL, "EXCL"),
            (Self::TRUNC, "TRUNC"),
        ] {
            if self.contains(flag) {
                parts.push(label);
            }
        }
        write!(f, "{}", parts.join("|"))
    }
}

macro_rules! forward_fs {
    ($($ty:ty),*) => {$(
        impl<F: Fs + ?Sized> Fs for $ty {
            fn create(&self, path: &Path) -> FsResult<Box<dyn File>> {
                (**self).create(path)
            }
            fn mkdir(&self, path: &Path, mode: u32) -> FsResult<()> {
                (**self).mkdir(path, mode)
            }
            fn mkdir_all(&self, path: &Path, mode: u32) -> FsResult<()> {
                (**self).mkdir_all(path, mode)
            }
            fn open(&self, path: &Path) -> FsResult<Box<dyn File>> {
                (**self).open(path)
            }
            fn open_file(&self, path: &Path, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
                (**self).open_file(path, flags, perm)
            }
            fn remove(&self, path: &Path) -> FsResult<()> {
                (**self).remove(path)
            }
            fn remove_all(&self, path: &Path) -> FsResult<()> {
                (**self).remove_all(path)
            }
            fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
                (**self).rename(from, to)
            }
            fn stat(&self, path: &Path) -> FsResult<Metadata> {
                (**self).stat(path)
            }
            fn chmod(&self, path: &Path, mode: u32) -> FsResult<()> {
                (**self).chmod(path, mode)
            }
            fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
                (**self).chtimes(path, atime, mtime)
            }
            fn name(&self) -> &str {
                (**self).name()
            }
        }
    )*};
}

// Lets a decorator borrow or share a filesystem it does not own.
forward_fs!(&F, Box<F>, Arc<F>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_mode() {
        assert!(OpenFlags::RDONLY.readable());
        assert!(!OpenFlags::RDONLY.writable());
        assert!(OpenFlags::WRONLY.writable());
        assert!(!OpenFlags::WRONLY.readable());
        let rw = OpenFlags::RDWR | OpenFlags::CREATE;
        assert!(rw.readable() && rw.writable());
        assert!(rw.contains(OpenFlags::CREATE));
        assert!(!rw.contains(OpenFlags::TRUNC));
    }

    #[test]
    fn test_flags_display() {
        let flags = OpenFlags::WRONLY | OpenFlags::CREATE | OpenFlags::TRUNC;
        assert_eq!(flags.to_string(), "WRONLY|CREATE|TRUNC");
        assert_eq!(OpenFlags::RDONLY.to_string(), "RDONLY");
    }
}
