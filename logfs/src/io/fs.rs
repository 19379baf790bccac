use super::{File, Fs, FsError, FsResult, Metadata, OpenFlags};
use crate::util::paths::base_name;
use filetime::FileTime;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

/// Filesystem backed by the host OS through `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

fn convert_metadata(md: &fs::Metadata, path: &Path) -> Metadata {
    #[cfg(unix)]
    let mode = md.permissions().mode() & 0o7777;
    #[cfg(not(unix))]
    let mode = if md.permissions().readonly() { 0o444 } else { 0o666 };

    Metadata {
        name: base_name(path),
        len: md.len(),
        mode,
        is_dir: md.is_dir(),
        modified: md.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        accessed: md.accessed().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

impl RealFs {
    fn open_with(&self, path: &Path, options: &fs::OpenOptions) -> FsResult<Box<dyn File>> {
        let file = options.open(path).map_err(|e| FsError::from_io(e, path))?;
        Ok(Box::new(RealFile {
            path: path.to_path_buf(),
            file,
        }))
    }
}

impl Fs for RealFs {
    fn create(&self, path: &Path) -> FsResult<Box<dyn File>> {
        let mut options = fs::OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);
        self.open_with(path, &options)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> FsResult<()> {
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(path).map_err(|e| FsError::from_io(e, path))
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> FsResult<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(path).map_err(|e| FsError::from_io(e, path))
    }

    fn open(&self, path: &Path) -> FsResult<Box<dyn File>> {
        let mut options = fs::OpenOptions::new();
        options.read(true);
        self.open_with(path, &options)
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        let mut options = fs::OpenOptions::new();
        options
            .read(flags.readable())
            .write(flags.writable())
            .append(flags.contains(OpenFlags::APPEND))
            .truncate(flags.contains(OpenFlags::TRUNC));
        if flags.contains(OpenFlags::CREATE | OpenFlags::EXCL) {
            options.create_new(true);
        } else if flags.contains(OpenFlags::CREATE) {
            options.create(true);
        }
        #[cfg(unix)]
        options.mode(perm);
        #[cfg(not(unix))]
        let _ = perm;
        self.open_with(path, &options)
    }

    fn remove(&self, path: &Path) -> FsResult<()> {
        let md = fs::symlink_metadata(path).map_err(|e| FsError::from_io(e, path))?;
        let res = if md.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        res.map_err(|e| FsError::from_io(e, path))
    }

    fn remove_all(&self, path: &Path) -> FsResult<()> {
        let md = match fs::symlink_metadata(path) {
            Ok(md) => md,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(FsError::from_io(e, path)),
        };
        let res = if md.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        res.map_err(|e| FsError::from_io(e, path))
    }

    fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        fs::rename(from, to).map_err(|e| FsError::from_io(e, from))
    }

    fn stat(&self, path: &Path) -> FsResult<Metadata> {
        let md = fs::metadata(path).map_err(|e| FsError::from_io(e, path))?;
        Ok(convert_metadata(&md, path))
    }

    fn chmod(&self, path: &Path, mode: u32) -> FsResult<()> {
        #[cfg(unix)]
        let perms = fs::Permissions::from_mode(mode & 0o7777);
        #[cfg(not(unix))]
        let perms = {
            let mut perms = fs::metadata(path)
                .map_err(|e| FsError::from_io(e, path))?
                .permissions();
            perms.set_readonly(mode & 0o222 == 0);
            perms
        };
        fs::set_permissions(path, perms).map_err(|e| FsError::from_io(e, path))
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        // Never opens the target; opening a FIFO blocks until a writer shows up.
        filetime::set_file_times(
            path,
            FileTime::from_system_time(atime),
            FileTime::from_system_time(mtime),
        )
        .map_err(|e| FsError::from_io(e, path))
    }

    fn name(&self) -> &str {
        "RealFs"
    }
}

#[derive(Debug)]
pub struct RealFile {
    path: PathBuf,
    file: fs::File,
}

impl Read for RealFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for RealFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for RealFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl File for RealFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn stat(&self) -> FsResult<Metadata> {
        let md = self
            .file
            .metadata()
            .map_err(|e| FsError::from_io(e, &self.path))?;
        Ok(convert_metadata(&md, &self.path))
    }

    fn sync(&mut self) -> FsResult<()> {
        self.file
            .sync_all()
            .map_err(|e| FsError::from_io(e, &self.path))
    }
}
