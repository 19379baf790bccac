pub mod sink;

use crate::io::{FsError, OpenFlags};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Which filesystem operation a [`Record`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Create,
    Mkdir,
    MkdirAll,
    Open,
    OpenFile,
    Remove,
    RemoveAll,
    Rename,
    Stat,
    Chmod,
    Chtimes,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Create => "create",
            Op::Mkdir => "mkdir",
            Op::MkdirAll => "mkdirall",
            Op::Open => "open",
            Op::OpenFile => "openfile",
            Op::Remove => "remove",
            Op::RemoveAll => "removeall",
            Op::Rename => "rename",
            Op::Stat => "stat",
            Op::Chmod => "chmod",
            Op::Chtimes => "chtimes",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One positional argument of a recorded call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    Path(PathBuf),
    Mode(u32),
    Flags(OpenFlags),
    /// Serialized as signed nanoseconds since the Unix epoch.
    Time(#[serde(serialize_with = "serialize_epoch_nanos")] SystemTime),
}

/// Signed nanoseconds between the Unix epoch and `time`.
pub fn epoch_nanos(time: SystemTime) -> i128 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(before) => -(before.duration().as_nanos() as i128),
    }
}

fn serialize_epoch_nanos<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_i128(epoch_nanos(*time))
}

impl From<&Path> for Arg {
    fn from(path: &Path) -> Self {
        Arg::Path(path.to_path_buf())
    }
}

impl From<OpenFlags> for Arg {
    fn from(flags: OpenFlags) -> Self {
        Arg::Flags(flags)
    }
}

impl From<SystemTime> for Arg {
    fn from(time: SystemTime) -> Self {
        Arg::Time(time)
    }
}

impl PartialEq<&str> for Arg {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Arg::Path(p) if p.as_os_str() == *other)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Path(p) => write!(f, "{:?}", p),
            Arg::Mode(m) => write!(f, "{:#o}", m),
            Arg::Flags(flags) => write!(f, "{}", flags),
            Arg::Time(t) => {
                let nanos = epoch_nanos(*t);
                let sign = if nanos < 0 { "-" } else { "" };
                let abs = nanos.unsigned_abs();
                write!(f, "@{}{}.{:09}", sign, abs / 1_000_000_000, abs % 1_000_000_000)
            }
        }
    }
}

/// A completed filesystem operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub op: Op,
    pub args: Vec<Arg>,
    pub err: Option<FsError>,
    /// Time spent inside the delegated call.
    pub time: Duration,
    /// The delegated call unwound instead of returning; `err` is `None`.
    pub panicked: bool,
}

impl Record {
    pub fn is_ok(&self) -> bool {
        self.err.is_none() && !self.panicked
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        write!(f, "{}({}) {:?}", self.op, args.join(", "), self.time)?;
        match (&self.err, self.panicked) {
            (_, true) => write!(f, " panicked"),
            (Some(err), false) => write!(f, " err={}", err),
            (None, false) => Ok(()),
        }
    }
}
