use super::{File, Fs, FsError, FsResult, Metadata, OpenFlags};
use crate::util::paths::{base_name, normalize_path};
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

const DEFAULT_FILE_MODE: u32 = 0o666;
const DEFAULT_DIR_MODE: u32 = 0o755;
/// Largest size a `MemFile` may grow to through writes.
pub const MAX_FILE_LEN: usize = 1 << 30;

#[derive(Debug)]
struct Inode {
    data: Vec<u8>,
    mode: u32,
    is_dir: bool,
    modified: SystemTime,
    accessed: SystemTime,
}

type Node = Arc<Mutex<Inode>>;

impl Inode {
    fn new(is_dir: bool, mode: u32) -> Node {
        let now = SystemTime::now();
        Arc::new(Mutex::new(Inode {
            data: Vec::new(),
            mode: mode & 0o7777,
            is_dir,
            modified: now,
            accessed: now,
        }))
    }

    fn metadata(&self, name: String) -> Metadata {
        Metadata {
            name,
            len: if self.is_dir { 0 } else { self.data.len() as u64 },
            mode: self.mode,
            is_dir: self.is_dir,
            modified: self.modified,
            accessed: self.accessed,
        }
    }
}

/// In-memory filesystem.
///
/// Paths are normalized and rooted at `/`; the root always exists. Errors
/// carry the path exactly as the caller passed it.
#[derive(Debug)]
pub struct MemFs {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
}

impl Default for MemFs {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Inode::new(true, DEFAULT_DIR_MODE));
        Self {
            nodes: Mutex::new(nodes),
        }
    }
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a file, creating missing parent directories.
    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) {
        let key = normalize_path(&path.into());
        let mut nodes = self.lock();
        Self::ensure_parent(&mut nodes, &key);
        let node = Inode::new(false, DEFAULT_FILE_MODE);
        node.lock().unwrap().data = content.as_ref().to_vec();
        nodes.insert(key, node);
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let key = normalize_path(&path.into());
        let mut nodes = self.lock();
        Self::ensure_parent(&mut nodes, &key);
        nodes
            .entry(key)
            .or_insert_with(|| Inode::new(true, DEFAULT_DIR_MODE));
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(&normalize_path(path))
    }

    /// Current contents of a regular file.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        let nodes = self.lock();
        let node = nodes.get(&normalize_path(path))?;
        let inode = node.lock().unwrap();
        if inode.is_dir {
            None
        } else {
            Some(inode.data.clone())
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.lock().unwrap()
    }

    fn ensure_parent(nodes: &mut BTreeMap<PathBuf, Node>, key: &Path) {
        if let Some(parent) = key.parent() {
            if !nodes.contains_key(parent) {
                nodes.insert(parent.to_path_buf(), Inode::new(true, DEFAULT_DIR_MODE));
                Self::ensure_parent(nodes, parent);
            }
        }
    }

    fn check_parent(nodes: &BTreeMap<PathBuf, Node>, key: &Path, path: &Path) -> FsResult<()> {
        let Some(parent) = key.parent() else {
            return Ok(());
        };
        match nodes.get(parent) {
            Some(node) if node.lock().unwrap().is_dir => Ok(()),
            Some(_) => Err(FsError::NotADirectory {
                path: path.to_path_buf(),
            }),
            None => Err(FsError::not_found(path)),
        }
    }

    fn has_children(nodes: &BTreeMap<PathBuf, Node>, key: &Path) -> bool {
        nodes
            .range::<Path, _>((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(p, _)| p.starts_with(key))
            .unwrap_or(false)
    }

    /// Keys of `key` and everything beneath it. Descendants sort directly after
    /// their ancestor because `PathBuf` orders component-wise.
    fn subtree(nodes: &BTreeMap<PathBuf, Node>, key: &Path) -> Vec<PathBuf> {
        nodes
            .range::<Path, _>((Bound::Included(key), Bound::Unbounded))
            .take_while(|(p, _)| p.starts_with(key))
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn open_node(&self, path: &Path, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        let key = normalize_path(path);
        let node = {
            let mut nodes = self.lock();
            match nodes.get(&key) {
                Some(node) => {
                    if flags.contains(OpenFlags::CREATE | OpenFlags::EXCL) {
                        return Err(FsError::AlreadyExists {
                            path: path.to_path_buf(),
                        });
                    }
                    node.clone()
                }
                None => {
                    if !flags.contains(OpenFlags::CREATE) {
                        return Err(FsError::not_found(path));
                    }
                    Self::check_parent(&nodes, &key, path)?;
                    let node = Inode::new(false, perm);
                    nodes.insert(key, node.clone());
                    node
                }
            }
        };

        {
            let mut inode = node.lock().unwrap();
            if inode.is_dir && flags.writable() {
                return Err(FsError::IsADirectory {
                    path: path.to_path_buf(),
                });
            }
            if flags.contains(OpenFlags::TRUNC) && flags.writable() {
                inode.data.clear();
                inode.modified = SystemTime::now();
            }
        }

        Ok(Box::new(MemFile {
            path: path.to_path_buf(),
            node,
            flags,
            pos: 0,
        }))
    }
}

impl Fs for MemFs {
    fn create(&self, path: &Path) -> FsResult<Box<dyn File>> {
        self.open_node(
            path,
            OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::TRUNC,
            DEFAULT_FILE_MODE,
        )
    }

    fn mkdir(&self, path: &Path, mode: u32) -> FsResult<()> {
        let key = normalize_path(path);
        let mut nodes = self.lock();
        if nodes.contains_key(&key) {
            return Err(FsError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        Self::check_parent(&nodes, &key, path)?;
        nodes.insert(key, Inode::new(true, mode));
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> FsResult<()> {
        let key = normalize_path(path);
        let mut nodes = self.lock();
        let mut current = PathBuf::from("/");
        for part in key.iter().skip(1) {
            current.push(part);
            match nodes.get(&current) {
                Some(node) if node.lock().unwrap().is_dir => {}
                Some(_) => {
                    return Err(FsError::NotADirectory {
                        path: path.to_path_buf(),
                    })
                }
                None => {
                    nodes.insert(current.clone(), Inode::new(true, mode));
                }
            }
        }
        Ok(())
    }

    fn open(&self, path: &Path) -> FsResult<Box<dyn File>> {
        self.open_node(path, OpenFlags::RDONLY, 0)
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        self.open_node(path, flags, perm)
    }

    fn remove(&self, path: &Path) -> FsResult<()> {
        let key = normalize_path(path);
        if key.parent().is_none() {
            return Err(FsError::invalid_input(path, "cannot remove the root"));
        }
        let mut nodes = self.lock();
        let is_dir = match nodes.get(&key) {
            Some(node) => node.lock().unwrap().is_dir,
            None => return Err(FsError::not_found(path)),
        };
        if is_dir && Self::has_children(&nodes, &key) {
            return Err(FsError::DirectoryNotEmpty {
                path: path.to_path_buf(),
            });
        }
        nodes.remove(&key);
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> FsResult<()> {
        let key = normalize_path(path);
        if key.parent().is_none() {
            return Err(FsError::invalid_input(path, "cannot remove the root"));
        }
        let mut nodes = self.lock();
        for doomed in Self::subtree(&nodes, &key) {
            nodes.remove(&doomed);
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        let from_key = normalize_path(from);
        let to_key = normalize_path(to);
        let mut nodes = self.lock();

        let src_is_dir = match nodes.get(&from_key) {
            Some(node) => node.lock().unwrap().is_dir,
            None => return Err(FsError::not_found(from)),
        };
        if from_key == to_key {
            return Ok(());
        }
        if !src_is_dir && to_key.starts_with(&from_key) {
            return Err(FsError::NotADirectory {
                path: to.to_path_buf(),
            });
        }
        if from_key.parent().is_none() || to_key.starts_with(&from_key) {
            return Err(FsError::invalid_input(
                to,
                "cannot move a directory into itself",
            ));
        }
        Self::check_parent(&nodes, &to_key, to)?;

        if let Some(dst) = nodes.get(&to_key) {
            let dst_is_dir = dst.lock().unwrap().is_dir;
            match (src_is_dir, dst_is_dir) {
                (false, true) => {
                    return Err(FsError::IsADirectory {
                        path: to.to_path_buf(),
                    })
                }
                (true, false) => {
                    return Err(FsError::NotADirectory {
                        path: to.to_path_buf(),
                    })
                }
                (true, true) if Self::has_children(&nodes, &to_key) => {
                    return Err(FsError::DirectoryNotEmpty {
                        path: to.to_path_buf(),
                    })
                }
                _ => {}
            }
            nodes.remove(&to_key);
        }

        for old in Self::subtree(&nodes, &from_key) {
            if let Some(node) = nodes.remove(&old) {
                let rel = old.strip_prefix(&from_key).unwrap_or(Path::new(""));
                let new = if rel.as_os_str().is_empty() {
                    to_key.clone()
                } else {
                    to_key.join(rel)
                };
                nodes.insert(new, node);
            }
        }
        Ok(())
    }

    fn stat(&self, path: &Path) -> FsResult<Metadata> {
        let key = normalize_path(path);
        let nodes = self.lock();
        let node = nodes.get(&key).ok_or_else(|| FsError::not_found(path))?;
        let inode = node.lock().unwrap();
        Ok(inode.metadata(base_name(&key)))
    }

    fn chmod(&self, path: &Path, mode: u32) -> FsResult<()> {
        let nodes = self.lock();
        let node = nodes
            .get(&normalize_path(path))
            .ok_or_else(|| FsError::not_found(path))?;
        node.lock().unwrap().mode = mode & 0o7777;
        Ok(())
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let nodes = self.lock();
        let node = nodes
            .get(&normalize_path(path))
            .ok_or_else(|| FsError::not_found(path))?;
        let mut inode = node.lock().unwrap();
        inode.accessed = atime;
        inode.modified = mtime;
        Ok(())
    }

    fn name(&self) -> &str {
        "MemFs"
    }
}

/// Handle onto a `MemFs` node. Shares the node with the tree, so writes are
/// visible to later opens and survive a rename.
#[derive(Debug)]
pub struct MemFile {
    path: PathBuf,
    node: Node,
    flags: OpenFlags,
    pos: u64,
}

fn bad_descriptor(action: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("file not opened for {}", action),
    )
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.flags.readable() {
            return Err(bad_descriptor("reading"));
        }
        let mut inode = self.node.lock().unwrap();
        if inode.is_dir {
            return Err(FsError::IsADirectory {
                path: self.path.clone(),
            }
            .into());
        }
        let start = usize::try_from(self.pos)
            .unwrap_or(usize::MAX)
            .min(inode.data.len());
        let n = buf.len().min(inode.data.len() - start);
        buf[..n].copy_from_slice(&inode.data[start..start + n]);
        self.pos += n as u64;
        inode.accessed = SystemTime::now();
        Ok(n)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.flags.writable() {
            return Err(bad_descriptor("writing"));
        }
        let mut inode = self.node.lock().unwrap();
        if self.flags.contains(OpenFlags::APPEND) {
            self.pos = inode.data.len() as u64;
        }
        let end = usize::try_from(self.pos)
            .ok()
            .and_then(|start| start.checked_add(buf.len()))
            .filter(|end| *end <= MAX_FILE_LEN)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("write at offset {} exceeds the in-memory file limit", self.pos),
                )
            })?;
        let start = end - buf.len();
        if inode.data.len() < end {
            inode.data.resize(end, 0);
        }
        inode.data[start..end].copy_from_slice(buf);
        inode.modified = SystemTime::now();
        self.pos = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.node.lock().unwrap().data.len() as i128;
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(delta) => len + delta as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
        };
        if target < 0 || target > u64::MAX as i128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl File for MemFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn stat(&self) -> FsResult<Metadata> {
        let inode = self.node.lock().unwrap();
        Ok(inode.metadata(base_name(&normalize_path(&self.path))))
    }

    fn sync(&mut self) -> FsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_create_write_read_back() {
        let fs = MemFs::new();
        let mut f = fs.create(Path::new("foo")).unwrap();
        f.write_all(b"hello").unwrap();
        drop(f);

        let mut f = fs.open(Path::new("/foo")).unwrap();
        let mut s = String::new();
        f.read_to_string(&mut s).unwrap();
        assert_eq!(s, "hello");
        assert_eq!(f.stat().unwrap().len, 5);
    }

    #[test]
    fn test_create_truncates() {
        let fs = MemFs::new();
        fs.add_file("/a", "old contents");
        fs.create(Path::new("/a")).unwrap();
        assert_eq!(fs.contents(Path::new("/a")).unwrap(), b"");
    }

    #[test]
    fn test_create_requires_parent() {
        let fs = MemFs::new();
        let err = fs.create(Path::new("/no/such/file")).unwrap_err();
        assert_eq!(err, FsError::not_found("/no/such/file"));
    }

    #[test]
    fn test_open_read_only_rejects_writes() {
        let fs = MemFs::new();
        fs.add_file("/a", "x");
        let mut f = fs.open(Path::new("/a")).unwrap();
        assert!(f.write(b"y").is_err());
    }

    #[test]
    fn test_open_file_flags() {
        let fs = MemFs::new();
        fs.add_file("/log", "one\n");

        let excl = OpenFlags::WRONLY | OpenFlags::CREATE | OpenFlags::EXCL;
        let err = fs.open_file(Path::new("/log"), excl, 0o600).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists { .. }));

        let append = OpenFlags::WRONLY | OpenFlags::APPEND;
        let mut f = fs.open_file(Path::new("/log"), append, 0).unwrap();
        f.write_all(b"two\n").unwrap();
        assert_eq!(fs.contents(Path::new("/log")).unwrap(), b"one\ntwo\n");

        let created = fs.open_file(Path::new("/new"), excl, 0o600).unwrap();
        assert_eq!(created.stat().unwrap().mode, 0o600);

        let err = fs
            .open_file(Path::new("/absent"), OpenFlags::RDONLY, 0)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_seek_and_overwrite() {
        let fs = MemFs::new();
        let mut f = fs.create(Path::new("/s")).unwrap();
        f.write_all(b"abcdef").unwrap();
        f.seek(SeekFrom::Start(2)).unwrap();
        f.write_all(b"XY").unwrap();
        assert_eq!(fs.contents(Path::new("/s")).unwrap(), b"abXYef");
        assert_eq!(f.seek(SeekFrom::End(-1)).unwrap(), 5);
        assert!(f.seek(SeekFrom::Current(-10)).is_err());
    }

    #[test]
    fn test_write_past_limit_is_rejected() {
        let fs = MemFs::new();
        let mut f = fs.create(Path::new("/big")).unwrap();

        f.seek(SeekFrom::Start(u64::MAX)).unwrap();
        let err = f.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        f.seek(SeekFrom::Start(1 << 40)).unwrap();
        let err = f.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        assert_eq!(fs.contents(Path::new("/big")).unwrap(), b"");
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_mkdir_and_mkdir_all() {
        let fs = MemFs::new();
        fs.mkdir(Path::new("/d"), 0o700).unwrap();
        assert_eq!(
            fs.mkdir(Path::new("/d"), 0o700).unwrap_err(),
            FsError::AlreadyExists {
                path: PathBuf::from("/d")
            }
        );
        assert!(fs.mkdir(Path::new("/x/y"), 0o755).unwrap_err().is_not_found());

        fs.mkdir_all(Path::new("/x/y/z"), 0o755).unwrap();
        fs.mkdir_all(Path::new("/x/y/z"), 0o755).unwrap();
        assert!(fs.stat(Path::new("/x/y")).unwrap().is_dir);

        fs.add_file("/f", "");
        let err = fs.mkdir_all(Path::new("/f/g"), 0o755).unwrap_err();
        assert!(matches!(err, FsError::NotADirectory { .. }));
    }

    #[test]
    fn test_remove() {
        let fs = MemFs::new();
        fs.add_file("/d/f", "");
        assert!(matches!(
            fs.remove(Path::new("/d")).unwrap_err(),
            FsError::DirectoryNotEmpty { .. }
        ));
        fs.remove(Path::new("/d/f")).unwrap();
        fs.remove(Path::new("/d")).unwrap();
        assert!(fs.remove(Path::new("/d")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_all() {
        let fs = MemFs::new();
        fs.add_file("/a/b/c", "");
        fs.add_file("/a b", "sibling");
        fs.remove_all(Path::new("/a")).unwrap();
        assert!(!fs.exists(Path::new("/a")));
        assert!(!fs.exists(Path::new("/a/b/c")));
        assert!(fs.exists(Path::new("/a b")));
        fs.remove_all(Path::new("/missing")).unwrap();
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = MemFs::new();
        fs.add_file("/src/inner/file", "data");
        fs.rename(Path::new("/src"), Path::new("/dst")).unwrap();
        assert!(!fs.exists(Path::new("/src")));
        assert_eq!(fs.contents(Path::new("/dst/inner/file")).unwrap(), b"data");
    }

    #[test]
    fn test_rename_errors() {
        let fs = MemFs::new();
        assert_eq!(
            fs.rename(Path::new("a"), Path::new("b")).unwrap_err(),
            FsError::not_found("a")
        );
        fs.add_dir("/d");
        fs.add_file("/f", "");
        assert!(matches!(
            fs.rename(Path::new("/f"), Path::new("/d")).unwrap_err(),
            FsError::IsADirectory { .. }
        ));
        assert!(matches!(
            fs.rename(Path::new("/d"), Path::new("/d/sub")).unwrap_err(),
            FsError::InvalidInput { .. }
        ));
        assert_eq!(
            fs.rename(Path::new("/f"), Path::new("/f/x")).unwrap_err(),
            FsError::NotADirectory {
                path: PathBuf::from("/f/x")
            }
        );
    }

    #[test]
    fn test_chmod_and_chtimes() {
        let fs = MemFs::new();
        fs.add_file("/f", "");
        fs.chmod(Path::new("/f"), 0o100644).unwrap();
        assert_eq!(fs.stat(Path::new("/f")).unwrap().mode, 0o644);

        let atime = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(20);
        fs.chtimes(Path::new("/f"), atime, mtime).unwrap();
        let md = fs.stat(Path::new("/f")).unwrap();
        assert_eq!(md.accessed, atime);
        assert_eq!(md.modified, mtime);
        assert_eq!(md.name, "f");
    }

    #[test]
    fn test_root_is_protected() {
        let fs = MemFs::new();
        assert!(fs.stat(Path::new("/")).unwrap().is_dir);
        assert!(fs.remove(Path::new("/")).is_err());
        assert!(fs.remove_all(Path::new("/")).is_err());
    }
}
