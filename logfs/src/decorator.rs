use crate::io::{File, Fs, FsError, FsResult, Metadata, OpenFlags};
use crate::record::sink::Logger;
use crate::record::{Arg, Op, Record};
use std::path::Path;
use std::time::{Instant, SystemTime};

/// Wraps a filesystem and hands one [`Record`] per call to a [`Logger`].
///
/// Arguments, results and errors pass through untouched. `name()` is
/// delegated without a record.
#[derive(Debug, Clone)]
pub struct LogFs<F, L> {
    fs: F,
    logger: L,
}

impl<F: Fs, L: Logger> LogFs<F, L> {
    pub fn new(fs: F, logger: L) -> Self {
        Self { fs, logger }
    }

    pub fn inner(&self) -> &F {
        &self.fs
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn into_parts(self) -> (F, L) {
        (self.fs, self.logger)
    }

    fn begin(&self, op: Op, args: Vec<Arg>) -> Pending<'_, L> {
        Pending {
            logger: &self.logger,
            op,
            args,
            err: None,
            start: Instant::now(),
        }
    }
}

/// A call in flight. Dropping it emits the record, so the sink sees the call
/// on every exit path including unwinding.
struct Pending<'a, L: Logger> {
    logger: &'a L,
    op: Op,
    args: Vec<Arg>,
    err: Option<FsError>,
    start: Instant,
}

impl<L: Logger> Pending<'_, L> {
    fn finish<T>(mut self, result: FsResult<T>) -> FsResult<T> {
        self.err = result.as_ref().err().cloned();
        result
    }
}

impl<L: Logger> Drop for Pending<'_, L> {
    fn drop(&mut self) {
        let record = Record {
            op: self.op,
            args: std::mem::take(&mut self.args),
            err: self.err.take(),
            time: self.start.elapsed(),
            panicked: std::thread::panicking(),
        };
        self.logger.log(record);
    }
}

impl<F: Fs, L: Logger> Fs for LogFs<F, L> {
    fn create(&self, path: &Path) -> FsResult<Box<dyn File>> {
        let call = self.begin(Op::Create, vec![path.into()]);
        call.finish(self.fs.create(path))
    }

    fn mkdir(&self, path: &Path, mode: u32) -> FsResult<()> {
        let call = self.begin(Op::Mkdir, vec![path.into(), Arg::Mode(mode)]);
        call.finish(self.fs.mkdir(path, mode))
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> FsResult<()> {
        let call = self.begin(Op::MkdirAll, vec![path.into(), Arg::Mode(mode)]);
        call.finish(self.fs.mkdir_all(path, mode))
    }

    fn open(&self, path: &Path) -> FsResult<Box<dyn File>> {
        let call = self.begin(Op::Open, vec![path.into()]);
        call.finish(self.fs.open(path))
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn File>> {
        let call = self.begin(
            Op::OpenFile,
            vec![path.into(), flags.into(), Arg::Mode(perm)],
        );
        call.finish(self.fs.open_file(path, flags, perm))
    }

    fn remove(&self, path: &Path) -> FsResult<()> {
        let call = self.begin(Op::Remove, vec![path.into()]);
        call.finish(self.fs.remove(path))
    }

    fn remove_all(&self, path: &Path) -> FsResult<()> {
        let call = self.begin(Op::RemoveAll, vec![path.into()]);
        call.finish(self.fs.remove_all(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        let call = self.begin(Op::Rename, vec![from.into(), to.into()]);
        call.finish(self.fs.rename(from, to))
    }

    fn stat(&self, path: &Path) -> FsResult<Metadata> {
        let call = self.begin(Op::Stat, vec![path.into()]);
        call.finish(self.fs.stat(path))
    }

    fn chmod(&self, path: &Path, mode: u32) -> FsResult<()> {
        let call = self.begin(Op::Chmod, vec![path.into(), Arg::Mode(mode)]);
        call.finish(self.fs.chmod(path, mode))
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let call = self.begin(
            Op::Chtimes,
            vec![path.into(), atime.into(), mtime.into()],
        );
        call.finish(self.fs.chtimes(path, atime, mtime))
    }

    fn name(&self) -> &str {
        self.fs.name()
    }
}
